//! Connection manager: one authenticated session to the directory service.
//!
//! [`DirectoryConnection`] is the seam everything above the wire is written
//! against; [`LdapSession`] is the production implementation over `ldap3`.
//! The session never reconnects on its own; the surrounding application
//! controls restart semantics.

use ldap3::controls::{Control, ControlType, PagedResults, RawControl};
use ldap3::{Ldap, LdapConnAsync, Mod, Scope, SearchEntry};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::config::LdapConfig;
use crate::error::{LdapCacheError, LdapCacheResult};
use crate::model::UpdateOp;

/// One raw directory entry: a DN plus its returned attributes.
///
/// Attribute values are always list-typed here; cardinality quirks are the
/// record mapper's problem, not the wire layer's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of an attribute, if present.
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.attrs.get(attr).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values of an attribute, normalized to a (possibly empty) list.
    pub fn all(&self, attr: &str) -> Vec<String> {
        self.attrs.get(attr).cloned().unwrap_or_default()
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
        }
    }
}

/// Protocol-level pagination state: the opaque continuation cookie plus the
/// requested page size. Shared only between the connection and the paged
/// search driver; it never travels past the driver to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    cookie: Vec<u8>,
    page_size: i32,
}

impl PageCursor {
    /// Cursor for the first page of a search.
    pub fn start(page_size: i32) -> Self {
        Self {
            cookie: Vec::new(),
            page_size,
        }
    }

    /// Continuation cursor from a server-supplied cookie, keeping the
    /// requested page size.
    pub fn resume(cookie: Vec<u8>, page_size: i32) -> Self {
        Self { cookie, page_size }
    }

    /// The opaque continuation cookie; empty means "start the search".
    pub fn cookie(&self) -> &[u8] {
        &self.cookie
    }

    /// Requested page size.
    pub fn page_size(&self) -> i32 {
        self.page_size
    }
}

/// One page of raw search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub entries: Vec<DirectoryEntry>,
    /// Continuation cursor; `None` means the server signalled completion.
    pub cursor: Option<PageCursor>,
    /// LDAP result code of the page boundary.
    pub status: u32,
    /// Server's estimate of the total result size, supplied on the first
    /// page boundary only (if at all).
    pub total_estimate: Option<u32>,
}

/// One attribute modification to send to the directory.
///
/// Values are raw bytes so binary attributes (AD's `unicodePwd`) use the
/// same path as string attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModRequest {
    pub op: UpdateOp,
    pub attribute: String,
    pub values: Vec<Vec<u8>>,
}

impl ModRequest {
    /// Modification with UTF-8 string values.
    pub fn from_strings(op: UpdateOp, attribute: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            op,
            attribute: attribute.into(),
            values: values.into_iter().map(String::into_bytes).collect(),
        }
    }
}

/// Request/response primitives over the single directory session.
///
/// Non-success protocol statuses surface as
/// [`LdapCacheError::Directory`] with the server's result code verbatim.
pub trait DirectoryConnection: Send + Sync {
    /// Fetch one page of a sub-scope search. An empty-cookie cursor starts
    /// the search; the returned page carries the next cursor until the
    /// server signals completion.
    fn search_page(
        &self,
        base: &str,
        filter: &str,
        attributes: &[String],
        cursor: PageCursor,
    ) -> impl Future<Output = LdapCacheResult<SearchPage>> + Send;

    /// Add an entry. Attribute values are raw bytes.
    fn add(
        &self,
        dn: &str,
        attrs: Vec<(String, Vec<Vec<u8>>)>,
    ) -> impl Future<Output = LdapCacheResult<()>> + Send;

    /// Apply a change list to an entry.
    fn modify(
        &self,
        dn: &str,
        changes: Vec<ModRequest>,
    ) -> impl Future<Output = LdapCacheResult<()>> + Send;

    /// Delete an entry.
    fn delete(&self, dn: &str) -> impl Future<Output = LdapCacheResult<()>> + Send;
}

/// The production session: a single authenticated `ldap3` handle.
///
/// The handle multiplexes all traffic over one connection; cloning it is
/// cheap and does not open new connections.
#[derive(Clone)]
pub struct LdapSession {
    ldap: Ldap,
}

impl LdapSession {
    /// Connect and bind. Network or authentication failure is
    /// [`LdapCacheError::Connection`]; there is no retry loop.
    pub async fn connect(config: &LdapConfig) -> LdapCacheResult<Self> {
        config.validate()?;

        let (conn, mut ldap) = LdapConnAsync::new(&config.url)
            .await
            .map_err(|e| LdapCacheError::connection(format!("connect failed: {e}")))?;
        ldap3::drive!(conn);

        ldap.simple_bind(&config.bind_dn, &config.bind_credential)
            .await
            .map_err(|e| LdapCacheError::connection(format!("bind failed: {e}")))?
            .success()
            .map_err(|e| LdapCacheError::connection(format!("bind rejected: {e}")))?;

        info!("Bound to directory at {} as {}", config.url, config.bind_dn);
        Ok(Self { ldap })
    }

    /// Close the session. Any in-flight paged search fails terminally.
    pub async fn close(mut self) -> LdapCacheResult<()> {
        self.ldap.unbind().await?;
        Ok(())
    }

    fn check_status(result: ldap3::LdapResult) -> LdapCacheResult<()> {
        if result.rc != 0 {
            return Err(LdapCacheError::directory(result.rc, result.text));
        }
        Ok(())
    }
}

impl DirectoryConnection for LdapSession {
    async fn search_page(
        &self,
        base: &str,
        filter: &str,
        attributes: &[String],
        cursor: PageCursor,
    ) -> LdapCacheResult<SearchPage> {
        let mut ldap = self.ldap.clone();

        let control = PagedResults {
            size: cursor.page_size(),
            cookie: cursor.cookie().to_vec(),
        };
        let attrs: Vec<&str> = attributes.iter().map(String::as_str).collect();

        debug!(
            "Searching {base} with filter {filter} (page size {})",
            cursor.page_size()
        );

        let (raw_entries, result) = ldap
            .with_controls(RawControl::from(control))
            .search(base, Scope::Subtree, filter, attrs)
            .await?
            .success()?;

        let entries: Vec<DirectoryEntry> = raw_entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(DirectoryEntry::from)
            .collect();

        // The paged-results response control carries the continuation
        // cookie and, on the first boundary, the server's size estimate.
        let mut next_cookie: Option<Vec<u8>> = None;
        let mut total_estimate = None;
        for ctrl in &result.ctrls {
            if let Control(Some(ControlType::PagedResults), raw) = ctrl {
                let parsed: PagedResults = raw.parse();
                if parsed.size > 0 {
                    total_estimate = Some(parsed.size as u32);
                }
                if !parsed.cookie.is_empty() {
                    next_cookie = Some(parsed.cookie);
                }
            }
        }

        Ok(SearchPage {
            entries,
            cursor: next_cookie.map(|cookie| PageCursor::resume(cookie, cursor.page_size())),
            status: result.rc,
            total_estimate,
        })
    }

    async fn add(&self, dn: &str, attrs: Vec<(String, Vec<Vec<u8>>)>) -> LdapCacheResult<()> {
        let mut ldap = self.ldap.clone();

        let attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attrs
            .into_iter()
            .map(|(name, values)| (name.into_bytes(), values.into_iter().collect()))
            .collect();

        let result = ldap.add(dn, attrs).await?;
        Self::check_status(result)?;
        debug!("Added directory entry {dn}");
        Ok(())
    }

    async fn modify(&self, dn: &str, changes: Vec<ModRequest>) -> LdapCacheResult<()> {
        let mut ldap = self.ldap.clone();

        let mods: Vec<Mod<Vec<u8>>> = changes
            .into_iter()
            .map(|change| {
                let attr = change.attribute.into_bytes();
                let values: HashSet<Vec<u8>> = change.values.into_iter().collect();
                match change.op {
                    UpdateOp::Add => Mod::Add(attr, values),
                    UpdateOp::Remove => Mod::Delete(attr, values),
                    UpdateOp::Replace => Mod::Replace(attr, values),
                }
            })
            .collect();

        let result = ldap.modify(dn, mods).await?;
        Self::check_status(result)?;
        debug!("Modified directory entry {dn}");
        Ok(())
    }

    async fn delete(&self, dn: &str) -> LdapCacheResult<()> {
        let mut ldap = self.ldap.clone();

        let result = ldap.delete(dn).await?;
        Self::check_status(result)?;
        debug!("Deleted directory entry {dn}");
        Ok(())
    }
}
