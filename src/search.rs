//! Paged search driver.
//!
//! Drives the multi-round paged search protocol over a
//! [`DirectoryConnection`], accumulating every returned entry into mapped
//! records. The continuation cursor never leaves this module; callers get a
//! complete result set or an error, no partial accumulations.

use log::{debug, warn};

use crate::connection::{DirectoryConnection, PageCursor};
use crate::error::{LdapCacheError, LdapCacheResult};
use crate::mapper::map_entry;
use crate::model::DirectoryUserRecord;

/// Complete result of a paged user search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub records: Vec<DirectoryUserRecord>,
    /// LDAP result code of the final page boundary.
    pub status: u32,
    /// Server-supplied total estimate from the first page boundary, if any.
    pub total_estimate: Option<u32>,
}

/// Run a sub-scope search to completion, requesting pages until the server
/// omits the continuation cursor.
///
/// The total estimate is captured from the first page only and never
/// recomputed. Zero entries over the whole stream is reported as
/// [`LdapCacheError::NotFound`] rather than an empty success; an error on
/// any page aborts the whole accumulation.
pub async fn fetch_all<C: DirectoryConnection>(
    conn: &C,
    base: &str,
    filter: &str,
    attributes: &[String],
    page_size: i32,
) -> LdapCacheResult<SearchOutcome> {
    let mut records = Vec::new();
    let mut cursor = Some(PageCursor::start(page_size));
    let mut total_estimate: Option<u32> = None;
    let mut status = 0;
    let mut pages = 0u32;

    while let Some(current) = cursor.take() {
        let page = conn.search_page(base, filter, attributes, current).await?;
        pages += 1;

        if total_estimate.is_none() {
            total_estimate = page.total_estimate;
        }
        status = page.status;

        for entry in &page.entries {
            if entry.dn.is_empty() {
                warn!("Skipping search entry with empty DN");
                continue;
            }
            records.push(map_entry(entry));
        }

        cursor = page.cursor;
    }

    debug!(
        "Paged search over {base} finished: {} records in {pages} pages (status {status})",
        records.len()
    );

    if records.is_empty() {
        return Err(LdapCacheError::not_found(filter));
    }

    Ok(SearchOutcome {
        records,
        status,
        total_estimate,
    })
}

/// Re-read a single user by `cn`, as the mutation synchronizer does after a
/// write. Uses one page of the same search machinery.
pub async fn fetch_user<C: DirectoryConnection>(
    conn: &C,
    base: &str,
    username: &str,
    attributes: &[String],
) -> LdapCacheResult<DirectoryUserRecord> {
    let filter = format!("(cn={})", crate::config::escape_filter_value(username));
    let page = conn
        .search_page(base, &filter, attributes, PageCursor::start(1))
        .await?;

    page.entries
        .first()
        .map(map_entry)
        .ok_or_else(|| LdapCacheError::not_found(username))
}
