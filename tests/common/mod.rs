//! Shared test utilities: an in-memory scripted directory standing in for
//! the LDAP server.
//!
//! The stub keeps real mutable state (user entries, group member lists) so
//! writes are observable through subsequent searches, and counts every
//! protocol call so tests can assert an operation never reached the wire.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ldap_user_cache::{
    DirectoryConnection, DirectoryEntry, LdapCacheError, LdapCacheResult, LdapConfig, ModRequest,
    PageCursor, SearchPage, UpdateOp,
};

/// Per-primitive call counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub search: usize,
    pub add: usize,
    pub modify: usize,
    pub delete: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.search + self.add + self.modify + self.delete
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    /// User entries keyed by DN. Ordered so paging is deterministic.
    users: BTreeMap<String, DirectoryEntry>,
    /// Group DN -> member DNs.
    groups: HashMap<String, Vec<String>>,
    calls: CallCounts,
    /// 1-based page index that should fail with a directory error.
    fail_on_page: Option<usize>,
    pages_served: usize,
}

/// Scripted in-memory directory implementing [`DirectoryConnection`].
#[derive(Clone, Default)]
pub struct StubDirectory {
    state: Arc<Mutex<DirectoryState>>,
    /// Artificial latency per search page, to widen rebuild windows in
    /// concurrency tests.
    page_delay: Duration,
}

impl StubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_delay(delay: Duration) -> Self {
        Self {
            state: Arc::default(),
            page_delay: delay,
        }
    }

    /// Seed one user entry with the usual attributes.
    pub fn seed_user(&self, username: &str, mail: Option<&str>) -> String {
        let dn = format!("cn={username},ou=People,dc=example,dc=com");
        let mut attrs: HashMap<String, Vec<String>> = HashMap::new();
        attrs.insert("cn".to_string(), vec![username.to_string()]);
        attrs.insert(
            "userPrincipalName".to_string(),
            vec![format!("{username}@example.com")],
        );
        if let Some(mail) = mail {
            attrs.insert("mail".to_string(), vec![mail.to_string()]);
        }
        let mut state = self.state.lock().unwrap();
        state.users.insert(
            dn.clone(),
            DirectoryEntry {
                dn: dn.clone(),
                attrs,
            },
        );
        dn
    }

    pub fn seed_users(&self, count: usize) {
        for i in 0..count {
            self.seed_user(&format!("user{i:02}"), None);
        }
    }

    pub fn clear_users(&self) {
        self.state.lock().unwrap().users.clear();
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    pub fn fail_on_page(&self, page: usize) {
        self.state.lock().unwrap().fail_on_page = Some(page);
    }

    fn matching_dns(state: &DirectoryState, filter: &str) -> Vec<String> {
        if let Some(username) = filter
            .strip_prefix("(cn=")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            state
                .users
                .values()
                .filter(|entry| {
                    entry
                        .attrs
                        .get("cn")
                        .is_some_and(|values| values.iter().any(|v| v == username))
                })
                .map(|entry| entry.dn.clone())
                .collect()
        } else {
            state.users.keys().cloned().collect()
        }
    }

    fn lossy(values: Vec<Vec<u8>>) -> Vec<String> {
        values
            .into_iter()
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .collect()
    }
}

impl DirectoryConnection for StubDirectory {
    async fn search_page(
        &self,
        _base: &str,
        filter: &str,
        _attributes: &[String],
        cursor: PageCursor,
    ) -> LdapCacheResult<SearchPage> {
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.calls.search += 1;
        state.pages_served += 1;

        if state.fail_on_page == Some(state.pages_served) {
            return Err(LdapCacheError::Directory {
                code: 1,
                message: "operations error".to_string(),
            });
        }

        let dns = Self::matching_dns(&state, filter);
        let page_size = cursor.page_size().max(0) as usize;
        let offset: usize = if cursor.cookie().is_empty() {
            0
        } else {
            String::from_utf8_lossy(cursor.cookie())
                .parse()
                .unwrap_or(0)
        };

        let entries: Vec<DirectoryEntry> = dns
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|dn| state.users[dn].clone())
            .collect();

        let next_offset = offset + entries.len();
        let next_cursor = if next_offset < dns.len() {
            Some(PageCursor::resume(
                next_offset.to_string().into_bytes(),
                cursor.page_size(),
            ))
        } else {
            None
        };

        Ok(SearchPage {
            entries,
            cursor: next_cursor,
            status: 0,
            // Total estimate only on the first boundary, as AD does.
            total_estimate: if offset == 0 {
                Some(dns.len() as u32)
            } else {
                None
            },
        })
    }

    async fn add(&self, dn: &str, attrs: Vec<(String, Vec<Vec<u8>>)>) -> LdapCacheResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.add += 1;

        if state.users.contains_key(dn) {
            return Err(LdapCacheError::Directory {
                code: 68,
                message: "entryAlreadyExists".to_string(),
            });
        }

        let mut entry_attrs: HashMap<String, Vec<String>> = HashMap::new();
        for (name, values) in attrs {
            // Binary-only attributes are write-only on a real server.
            if name == "unicodePwd" {
                continue;
            }
            entry_attrs.insert(name, Self::lossy(values));
        }
        state.users.insert(
            dn.to_string(),
            DirectoryEntry {
                dn: dn.to_string(),
                attrs: entry_attrs,
            },
        );
        Ok(())
    }

    async fn modify(&self, dn: &str, changes: Vec<ModRequest>) -> LdapCacheResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.calls.modify += 1;

        // Group entry: maintain member lists and mirror them into each
        // member's memberOf, the way the server keeps the backlink.
        if dn.contains("ou=Groups") {
            for change in changes {
                let members = Self::lossy(change.values);
                for member_dn in members {
                    let group_members = state.groups.entry(dn.to_string()).or_default();
                    match change.op {
                        UpdateOp::Add => group_members.push(member_dn.clone()),
                        UpdateOp::Remove => group_members.retain(|m| m != &member_dn),
                        UpdateOp::Replace => {
                            group_members.clear();
                            group_members.push(member_dn.clone());
                        }
                    }
                    if let Some(user) = state.users.get_mut(&member_dn) {
                        let member_of = user.attrs.entry("memberOf".to_string()).or_default();
                        match change.op {
                            UpdateOp::Add | UpdateOp::Replace => {
                                member_of.push(dn.to_string());
                            }
                            UpdateOp::Remove => member_of.retain(|g| g != dn),
                        }
                    }
                }
            }
            return Ok(());
        }

        let Some(user) = state.users.get_mut(dn) else {
            return Err(LdapCacheError::Directory {
                code: 32,
                message: "noSuchObject".to_string(),
            });
        };
        for change in changes {
            if change.attribute == "unicodePwd" {
                continue;
            }
            let values = Self::lossy(change.values);
            match change.op {
                UpdateOp::Add => user
                    .attrs
                    .entry(change.attribute)
                    .or_default()
                    .extend(values),
                UpdateOp::Replace => {
                    user.attrs.insert(change.attribute, values);
                }
                UpdateOp::Remove => {
                    if values.is_empty() {
                        user.attrs.remove(&change.attribute);
                    } else if let Some(existing) = user.attrs.get_mut(&change.attribute) {
                        existing.retain(|v| !values.contains(v));
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, dn: &str) -> LdapCacheResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.delete += 1;

        if state.users.remove(dn).is_none() {
            return Err(LdapCacheError::Directory {
                code: 32,
                message: "noSuchObject".to_string(),
            });
        }
        for members in state.groups.values_mut() {
            members.retain(|m| m != dn);
        }
        Ok(())
    }
}

/// Initialize test logging once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config pointing at the stub's naming layout.
pub fn test_config() -> LdapConfig {
    let mut config = LdapConfig::new(
        "ldap://localhost:389",
        "cn=admin,dc=example,dc=com",
        "secret",
        "dc=example,dc=com",
    );
    config.search_base = "ou=People,dc=example,dc=com".to_string();
    config.default_group = "students".to_string();
    config.page_size = 2;
    config
}
