//! Core data model for the directory user cache.
//!
//! [`DirectoryUserRecord`] is the normalized shape every raw directory entry
//! is mapped into. Records are immutable once mapped; the cache replaces
//! them wholesale instead of mutating fields in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{LdapCacheError, LdapCacheResult};

/// Normalized snapshot of one directory user entry.
///
/// The distinguished name is the unique key. Multi-valued attributes
/// (`member_of`, `controls`) are always lists, even when the directory
/// returned a single scalar. Optional profile attributes map missing
/// values to `None` rather than erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUserRecord {
    /// Distinguished name, the cache's primary key.
    pub dn: String,
    /// Account name (`cn`).
    pub username: String,
    /// Display name, falling back to given + family name when absent.
    pub display_name: Option<String>,
    /// `userPrincipalName`.
    pub email: Option<String>,
    /// `mail` attribute, distinct from the principal name.
    pub mail: Option<String>,
    /// Group membership DNs, always list-typed.
    #[serde(default)]
    pub member_of: Vec<String>,
    /// Entry control strings, always list-typed.
    #[serde(default)]
    pub controls: Vec<String>,
    /// Raw `userAccountControl` flags.
    pub user_account_control: Option<String>,
    /// Raw `lastLogonTimestamp` value.
    pub last_logon_timestamp: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub student_id: Option<String>,
    pub telephone_number: Option<String>,
}

impl DirectoryUserRecord {
    /// Approximate heap footprint of this record in bytes, used for the
    /// cache's memory-delta metadata.
    pub(crate) fn approx_bytes(&self) -> usize {
        let opt = |v: &Option<String>| v.as_ref().map_or(0, String::len);
        self.dn.len()
            + self.username.len()
            + self.member_of.iter().map(String::len).sum::<usize>()
            + self.controls.iter().map(String::len).sum::<usize>()
            + opt(&self.display_name)
            + opt(&self.email)
            + opt(&self.mail)
            + opt(&self.user_account_control)
            + opt(&self.last_logon_timestamp)
            + opt(&self.gender)
            + opt(&self.date_of_birth)
            + opt(&self.student_id)
            + opt(&self.telephone_number)
    }
}

/// Metadata describing one successful cache rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the rebuild committed.
    pub last_update: DateTime<Utc>,
    /// Number of records in the committed snapshot.
    pub total_users: usize,
    /// Elapsed rebuild duration in milliseconds.
    pub elapsed_ms: u64,
    /// Approximate memory usage delta of the record set, in bytes.
    pub memory_bytes_delta: i64,
    /// Terminal LDAP result code of the search that produced the snapshot.
    pub last_status: u32,
}

/// A coherent read-only view of the cache: the record mapping plus the
/// metadata that describes exactly that record set.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// Records keyed by distinguished name.
    pub records: HashMap<String, Arc<DirectoryUserRecord>>,
    /// Rebuild metadata for this record set.
    pub metadata: CacheMetadata,
}

/// Caller-supplied filter plus pagination for cache queries.
///
/// Filter pairs are ANDed; each pair matches when the record attribute
/// contains the value case-insensitively (substring semantics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Attribute name / value pairs, all of which must match.
    pub filters: Vec<(String, String)>,
    /// 1-based page number.
    pub page: usize,
    /// Records per page, greater than zero.
    pub per_page: usize,
}

impl SearchCriteria {
    /// Build criteria, validating pagination bounds.
    pub fn new(
        filters: Vec<(String, String)>,
        page: usize,
        per_page: usize,
    ) -> LdapCacheResult<Self> {
        if page < 1 {
            return Err(LdapCacheError::validation("page must be >= 1"));
        }
        if per_page == 0 {
            return Err(LdapCacheError::validation("per_page must be > 0"));
        }
        Ok(Self {
            filters,
            page,
            per_page,
        })
    }

    /// Unfiltered criteria for a plain page read.
    pub fn page(page: usize, per_page: usize) -> LdapCacheResult<Self> {
        Self::new(Vec::new(), page, per_page)
    }
}

/// One page of query results plus the total filtered count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedUsers {
    pub items: Vec<DirectoryUserRecord>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Group membership operation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOp {
    Add,
    Remove,
}

/// Which directory write just occurred, driving the follow-up cache
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOp {
    /// A new entry was added.
    Create { username: String },
    /// A group's member list changed for this user.
    GroupMembership {
        op: GroupOp,
        username: String,
        group: String,
    },
    /// Entry attributes were modified in place.
    AttributeChange { username: String },
    /// The entry was removed from the directory.
    Delete { username: String },
}

/// Attribute modification kind for `update_user_record` change lists,
/// mirroring the LDAP modify operation set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOp {
    Add,
    Remove,
    Replace,
}

/// One attribute change in an `update_user_record` change list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeUpdate {
    pub op: UpdateOp,
    pub attribute: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Input for creating a directory user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Explicit display name; defaults to `first_name last_name`.
    pub display_name: Option<String>,
    /// Directory object class; defaults to `user`.
    pub object_class: Option<String>,
    pub mail: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub student_id: Option<String>,
    pub telephone_number: Option<String>,
}

impl NewUser {
    /// Minimal user input for the mandatory fields.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            display_name: None,
            object_class: None,
            mail: None,
            gender: None,
            date_of_birth: None,
            student_id: None,
            telephone_number: None,
        }
    }
}
