//! Directory service facade.
//!
//! Ties the paged search driver, record mapper, cache store, mutation
//! synchronizer and query engine together behind the operations the
//! surrounding application consumes. All directory traffic multiplexes
//! over the one session held by the connection; mutations and their cache
//! reconciliations are serialized so per-entry reconciliations apply in
//! write-completion order.

use log::{debug, info};
use std::time::Instant;
use tokio::sync::Mutex;

use crate::cache::UserCache;
use crate::config::LdapConfig;
use crate::connection::{DirectoryConnection, ModRequest};
use crate::error::{LdapCacheError, LdapCacheResult};
use crate::mapper::compose_display_name;
use crate::model::{
    AttributeUpdate, CacheMetadata, DirectoryUserRecord, GroupOp, MutationOp, NewUser, PagedUsers,
    SearchCriteria, UpdateOp,
};
use crate::query::query;
use crate::search::fetch_all;
use crate::sync::reconcile;

/// AD `userAccountControl` value for a normal enabled account.
const NORMAL_ACCOUNT: &str = "512";

/// The public surface over one directory session and one cache.
pub struct DirectoryService<C> {
    conn: C,
    config: LdapConfig,
    cache: UserCache,
    /// Serializes directory write + cache reconciliation pairs, and full
    /// rebuilds against both.
    mutation_lock: Mutex<()>,
}

impl<C: DirectoryConnection> DirectoryService<C> {
    /// Build a service over an established connection. The cache starts
    /// empty and uninitialized; call [`DirectoryService::init_cache`].
    pub fn new(conn: C, config: LdapConfig) -> LdapCacheResult<Self> {
        config.validate()?;
        Ok(Self {
            conn,
            config,
            cache: UserCache::new(),
            mutation_lock: Mutex::new(()),
        })
    }

    /// Handle to the underlying cache. Prefer the service operations;
    /// writes through this handle bypass the facade's mutation ordering.
    pub fn cache(&self) -> &UserCache {
        &self.cache
    }

    /// Full rebuild: stream the whole user population through the paged
    /// search and replace the snapshot atomically.
    ///
    /// `filter` and `page_size` default to the configured values. Failure
    /// preserves any previously committed snapshot. The mutation lock is
    /// held across the whole fetch + commit, so a write completing during
    /// the rebuild cannot be clobbered by pages fetched before it: the
    /// write queues, and its reconciliation lands on the new snapshot.
    pub async fn init_cache(
        &self,
        filter: Option<&str>,
        page_size: Option<i32>,
    ) -> LdapCacheResult<CacheMetadata> {
        let filter = filter.unwrap_or(&self.config.search_filter);
        let page_size = page_size.unwrap_or(self.config.page_size);
        if page_size <= 0 {
            return Err(LdapCacheError::validation("page_size must be > 0"));
        }

        let _guard = self.mutation_lock.lock().await;

        info!("Rebuilding user cache from {}", self.config.search_base);
        let started = Instant::now();

        let outcome = fetch_all(
            &self.conn,
            &self.config.search_base,
            filter,
            &self.config.search_attributes,
            page_size,
        )
        .await
        .map_err(|e| match e {
            LdapCacheError::NotFound { .. } => {
                LdapCacheError::build_failed("search returned no entries")
            }
            other => other,
        })?;

        if let Some(estimate) = outcome.total_estimate {
            debug!(
                "Server estimated {estimate} entries, accumulated {}",
                outcome.records.len()
            );
        }

        self.cache
            .rebuild(outcome.records, outcome.status, started)
            .await
    }

    /// Single-record read by username, served from the cache.
    pub async fn lookup_user(&self, username: &str) -> LdapCacheResult<DirectoryUserRecord> {
        let snapshot = self.cache.snapshot().await?;
        snapshot
            .records
            .values()
            .find(|record| record.username == username)
            .map(|record| record.as_ref().clone())
            .ok_or_else(|| LdapCacheError::not_found(username))
    }

    /// Filtered, paginated read over the cache. Never contacts the
    /// directory.
    pub async fn list_users(&self, criteria: &SearchCriteria) -> LdapCacheResult<PagedUsers> {
        let snapshot = self.cache.snapshot().await?;
        Ok(query(&snapshot, criteria))
    }

    /// Create a directory user, attach it to the configured default group,
    /// then reconcile the cache from the directory's own copy.
    pub async fn create_user(&self, user: &NewUser) -> LdapCacheResult<()> {
        validate_new_user(user)?;

        let _guard = self.mutation_lock.lock().await;

        let dn = self.config.user_dn(&user.username);
        let display_name = user
            .display_name
            .clone()
            .unwrap_or_else(|| compose_display_name(&user.first_name, &user.last_name));
        let object_class = user.object_class.as_deref().unwrap_or("user");

        let mut attrs: Vec<(String, Vec<Vec<u8>>)> = vec![
            str_attr("cn", &user.username),
            str_attr("name", &user.username),
            str_attr("givenName", &user.first_name),
            str_attr("sn", &user.last_name),
            str_attr("displayName", &display_name),
            str_attr("objectClass", object_class),
            str_attr("sAMAccountName", &user.username),
            str_attr("userAccountControl", NORMAL_ACCOUNT),
            (
                "unicodePwd".to_string(),
                vec![encode_ad_password(&user.password)],
            ),
        ];
        for (name, value) in [
            ("mail", &user.mail),
            ("gender", &user.gender),
            ("dateOfBirth", &user.date_of_birth),
            ("studentID", &user.student_id),
            ("telephoneNumber", &user.telephone_number),
        ] {
            if let Some(value) = value {
                attrs.push(str_attr(name, value));
            }
        }

        self.conn.add(&dn, attrs).await?;
        info!("Created directory user {dn}");

        if !self.config.default_group.is_empty() {
            self.modify_group_member(GroupOp::Add, &user.username, &self.config.default_group)
                .await?;
        }

        reconcile(
            &self.conn,
            &self.config,
            &self.cache,
            &MutationOp::Create {
                username: user.username.clone(),
            },
        )
        .await
    }

    /// Add or remove a user from a group, then reconcile that user's cache
    /// entry.
    pub async fn change_group_membership(
        &self,
        op: GroupOp,
        username: &str,
        group: &str,
    ) -> LdapCacheResult<()> {
        let _guard = self.mutation_lock.lock().await;

        self.modify_group_member(op, username, group).await?;

        reconcile(
            &self.conn,
            &self.config,
            &self.cache,
            &MutationOp::GroupMembership {
                op,
                username: username.to_string(),
                group: group.to_string(),
            },
        )
        .await
    }

    /// Apply a change list to a user entry, then reconcile its cache entry.
    pub async fn update_user_record(
        &self,
        username: &str,
        changes: Vec<AttributeUpdate>,
    ) -> LdapCacheResult<()> {
        if changes.is_empty() {
            return Err(LdapCacheError::validation("change list must not be empty"));
        }

        let _guard = self.mutation_lock.lock().await;

        let mods = changes
            .into_iter()
            .map(|change| ModRequest::from_strings(change.op, change.attribute, change.values))
            .collect();
        self.conn
            .modify(&self.config.user_dn(username), mods)
            .await?;

        reconcile(
            &self.conn,
            &self.config,
            &self.cache,
            &MutationOp::AttributeChange {
                username: username.to_string(),
            },
        )
        .await
    }

    /// Change a user's password. Equal or missing passwords are rejected
    /// before any directory call; the password itself is never cached.
    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> LdapCacheResult<()> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(LdapCacheError::validation(
                "old and new password are required",
            ));
        }
        if old_password == new_password {
            return Err(LdapCacheError::validation(
                "new password must differ from the old one",
            ));
        }

        let _guard = self.mutation_lock.lock().await;

        let mods = vec![
            ModRequest {
                op: UpdateOp::Remove,
                attribute: "unicodePwd".to_string(),
                values: vec![encode_ad_password(old_password)],
            },
            ModRequest {
                op: UpdateOp::Add,
                attribute: "unicodePwd".to_string(),
                values: vec![encode_ad_password(new_password)],
            },
        ];
        self.conn
            .modify(&self.config.user_dn(username), mods)
            .await?;
        info!("Changed password for {username}");
        Ok(())
    }

    /// Delete a user from the directory, then remove it from the cache.
    /// A failed directory delete leaves the cache untouched.
    pub async fn delete_user(&self, username: &str) -> LdapCacheResult<()> {
        let _guard = self.mutation_lock.lock().await;

        self.conn.delete(&self.config.user_dn(username)).await?;
        info!("Deleted directory user {username}");

        reconcile(
            &self.conn,
            &self.config,
            &self.cache,
            &MutationOp::Delete {
                username: username.to_string(),
            },
        )
        .await
    }

    async fn modify_group_member(
        &self,
        op: GroupOp,
        username: &str,
        group: &str,
    ) -> LdapCacheResult<()> {
        let member_dn = self.config.user_dn(username);
        let change = ModRequest::from_strings(
            match op {
                GroupOp::Add => UpdateOp::Add,
                GroupOp::Remove => UpdateOp::Remove,
            },
            "member",
            vec![member_dn],
        );
        self.conn
            .modify(&self.config.group_dn(group), vec![change])
            .await?;
        debug!("Group {group} membership {op:?} for {username}");
        Ok(())
    }
}

fn str_attr(name: &str, value: &str) -> (String, Vec<Vec<u8>>) {
    (name.to_string(), vec![value.as_bytes().to_vec()])
}

fn validate_new_user(user: &NewUser) -> LdapCacheResult<()> {
    if user.username.is_empty() {
        return Err(LdapCacheError::validation("username is required"));
    }
    if user.password.is_empty() {
        return Err(LdapCacheError::validation("password is required"));
    }
    if user.first_name.is_empty() || user.last_name.is_empty() {
        return Err(LdapCacheError::validation(
            "first and last name are required",
        ));
    }
    Ok(())
}

/// Encode a password the way AD's `unicodePwd` attribute expects:
/// UTF-16LE bytes of the password wrapped in double quotes.
pub(crate) fn encode_ad_password(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}
