//! Property tests for the query engine's pagination.

use chrono::Utc;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use ldap_user_cache::query::query;
use ldap_user_cache::{CacheMetadata, CacheSnapshot, DirectoryUserRecord, SearchCriteria};

fn record(i: usize) -> DirectoryUserRecord {
    DirectoryUserRecord {
        dn: format!("cn=user{i:03},ou=People,dc=example,dc=com"),
        username: format!("user{i:03}"),
        display_name: None,
        email: None,
        mail: None,
        member_of: Vec::new(),
        controls: Vec::new(),
        user_account_control: None,
        last_logon_timestamp: None,
        gender: None,
        date_of_birth: None,
        student_id: None,
        telephone_number: None,
    }
}

fn snapshot(count: usize) -> CacheSnapshot {
    let records: HashMap<_, _> = (0..count)
        .map(record)
        .map(|r| (r.dn.clone(), Arc::new(r)))
        .collect();
    CacheSnapshot {
        records,
        metadata: CacheMetadata {
            last_update: Utc::now(),
            total_users: count,
            elapsed_ms: 0,
            memory_bytes_delta: 0,
            last_status: 0,
        },
    }
}

proptest! {
    /// Walking all pages yields every record exactly once, in DN order.
    #[test]
    fn pages_partition_the_record_set(count in 0usize..60, per_page in 1usize..10) {
        let snap = snapshot(count);

        let mut collected = Vec::new();
        let mut page = 1;
        loop {
            let result = query(&snap, &SearchCriteria::page(page, per_page).unwrap());
            prop_assert_eq!(result.total, count);
            if result.items.is_empty() {
                break;
            }
            prop_assert!(result.items.len() <= per_page);
            collected.extend(result.items);
            page += 1;
        }

        prop_assert_eq!(collected.len(), count);
        let mut dns: Vec<&str> = collected.iter().map(|r| r.dn.as_str()).collect();
        prop_assert!(dns.windows(2).all(|w| w[0] < w[1]));
        dns.dedup();
        prop_assert_eq!(dns.len(), count);
    }

    /// Any page past the record set is empty without being an error.
    #[test]
    fn out_of_range_pages_are_empty(count in 0usize..20, per_page in 1usize..10) {
        let snap = snapshot(count);
        let past_end = count / per_page + 2;
        let result = query(&snap, &SearchCriteria::page(past_end, per_page).unwrap());
        prop_assert!(result.items.is_empty());
        prop_assert_eq!(result.total, count);
    }
}
