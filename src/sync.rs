//! Mutation synchronizer: keeps individual cache entries fresh after
//! directory writes.
//!
//! Per mutation the flow is `Requested -> DirectoryWriteSucceeded ->
//! CacheReconciled`; a failed directory write is terminal and leaves the
//! cache untouched. Reconciliation always re-reads the affected entry from
//! the directory; the cached record is never synthesized from the write
//! payload, so server-assigned and server-normalized fields are reflected
//! exactly. A reconciliation failure is surfaced to the caller but the
//! already-committed directory write is never rolled back.

use log::{debug, warn};

use crate::cache::UserCache;
use crate::config::LdapConfig;
use crate::connection::DirectoryConnection;
use crate::error::LdapCacheResult;
use crate::model::MutationOp;
use crate::search::fetch_user;

/// Reconcile the cache after a directory write succeeded.
pub async fn reconcile<C: DirectoryConnection>(
    conn: &C,
    config: &LdapConfig,
    cache: &UserCache,
    op: &MutationOp,
) -> LdapCacheResult<()> {
    match op {
        MutationOp::Create { username }
        | MutationOp::GroupMembership { username, .. }
        | MutationOp::AttributeChange { username } => {
            let record = fetch_user(conn, &config.search_base, username, &config.search_attributes)
                .await
                .inspect_err(|e| {
                    warn!("Reconciliation re-read for {username} failed: {e}");
                })?;
            debug!("Reconciled {} after {op:?}", record.dn);
            cache.upsert(record).await;
        }
        MutationOp::Delete { username } => {
            cache.remove(&config.user_dn(username)).await;
            debug!("Reconciled delete of {username}");
        }
    }
    Ok(())
}
