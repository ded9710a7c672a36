//! Query engine: filtered, paginated reads over a cache snapshot.
//!
//! Never contacts the directory. Match semantics: each criteria pair
//! matches when the named record attribute contains the value
//! case-insensitively (substring match); all pairs must match. Records are
//! ordered by DN so pagination is stable across identical snapshots.

use crate::model::{CacheSnapshot, DirectoryUserRecord, PagedUsers, SearchCriteria};

/// Apply filter and pagination to a snapshot.
///
/// A page beyond the filtered record count yields empty `items`, not an
/// error; `total` is always the full filtered count. The offset is computed
/// with saturating arithmetic, so a page number large enough to overflow
/// still yields an empty page, and a `page` of zero built without the
/// [`SearchCriteria`] constructor is clamped to the first page.
pub fn query(snapshot: &CacheSnapshot, criteria: &SearchCriteria) -> PagedUsers {
    let mut matched: Vec<&DirectoryUserRecord> = snapshot
        .records
        .values()
        .map(|record| record.as_ref())
        .filter(|record| matches_all(record, &criteria.filters))
        .collect();
    matched.sort_by(|a, b| a.dn.cmp(&b.dn));

    let total = matched.len();
    let skip = criteria
        .page
        .saturating_sub(1)
        .saturating_mul(criteria.per_page);
    let items = matched
        .into_iter()
        .skip(skip)
        .take(criteria.per_page)
        .cloned()
        .collect();

    PagedUsers {
        items,
        total,
        page: criteria.page,
        per_page: criteria.per_page,
    }
}

fn matches_all(record: &DirectoryUserRecord, filters: &[(String, String)]) -> bool {
    filters
        .iter()
        .all(|(attribute, value)| attribute_matches(record, attribute, value))
}

fn attribute_matches(record: &DirectoryUserRecord, attribute: &str, value: &str) -> bool {
    let needle = value.to_lowercase();
    let contains = |field: &str| field.to_lowercase().contains(&needle);
    let contains_opt = |field: &Option<String>| field.as_deref().is_some_and(contains);

    match attribute {
        "dn" => contains(&record.dn),
        "username" | "cn" => contains(&record.username),
        "displayName" | "display_name" => contains_opt(&record.display_name),
        "email" | "userPrincipalName" => contains_opt(&record.email),
        "mail" => contains_opt(&record.mail),
        "memberOf" | "member_of" => record.member_of.iter().any(|g| contains(g)),
        "userAccountControl" | "user_account_control" => {
            contains_opt(&record.user_account_control)
        }
        "gender" => contains_opt(&record.gender),
        "dateOfBirth" | "date_of_birth" => contains_opt(&record.date_of_birth),
        "studentID" | "student_id" => contains_opt(&record.student_id),
        "telephoneNumber" | "telephone_number" => contains_opt(&record.telephone_number),
        // Unknown attributes match nothing rather than everything.
        _ => false,
    }
}
