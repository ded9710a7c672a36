//! Record mapper: raw directory entries to normalized user records.
//!
//! Pure functions only. The directory returns multi-valued attributes as a
//! single scalar when an entry has exactly one value; everything here is
//! normalized to list-typed fields so downstream code never branches on
//! cardinality. Missing optional attributes map to `None`, never an error.

use crate::connection::DirectoryEntry;
use crate::model::DirectoryUserRecord;

/// Map one raw entry into a [`DirectoryUserRecord`].
///
/// The display name falls back to `givenName` + `sn` when the directory
/// carries no explicit `displayName`.
pub fn map_entry(entry: &DirectoryEntry) -> DirectoryUserRecord {
    let display_name = entry
        .first("displayName")
        .map(String::from)
        .or_else(|| fallback_display_name(entry));

    DirectoryUserRecord {
        dn: entry.dn.clone(),
        username: entry.first("cn").unwrap_or_default().to_string(),
        display_name,
        email: entry.first("userPrincipalName").map(String::from),
        mail: entry.first("mail").map(String::from),
        member_of: entry.all("memberOf"),
        controls: entry.all("controls"),
        user_account_control: entry.first("userAccountControl").map(String::from),
        last_logon_timestamp: entry.first("lastLogonTimestamp").map(String::from),
        gender: entry.first("gender").map(String::from),
        date_of_birth: entry.first("dateOfBirth").map(String::from),
        student_id: entry.first("studentID").map(String::from),
        telephone_number: entry.first("telephoneNumber").map(String::from),
    }
}

/// Concatenate given + family name when both are present, otherwise use
/// whichever exists.
fn fallback_display_name(entry: &DirectoryEntry) -> Option<String> {
    match (entry.first("givenName"), entry.first("sn")) {
        (Some(given), Some(family)) => Some(format!("{given} {family}")),
        (Some(given), None) => Some(given.to_string()),
        (None, Some(family)) => Some(family.to_string()),
        (None, None) => None,
    }
}

/// Default display name for a newly created user, same fallback policy as
/// the mapper.
pub(crate) fn compose_display_name(first_name: &str, last_name: &str) -> String {
    format!("{first_name} {last_name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry(attrs: &[(&str, &[&str])]) -> DirectoryEntry {
        DirectoryEntry {
            dn: "cn=alice,ou=People,dc=example,dc=com".to_string(),
            attrs: attrs
                .iter()
                .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn maps_core_attributes() {
        let record = map_entry(&entry(&[
            ("cn", &["alice"]),
            ("userPrincipalName", &["alice@example.com"]),
            ("displayName", &["Alice A."]),
            ("memberOf", &["cn=students,ou=Groups,dc=example,dc=com"]),
            ("userAccountControl", &["512"]),
        ]));

        assert_eq!(record.dn, "cn=alice,ou=People,dc=example,dc=com");
        assert_eq!(record.username, "alice");
        assert_eq!(record.email.as_deref(), Some("alice@example.com"));
        assert_eq!(record.display_name.as_deref(), Some("Alice A."));
        assert_eq!(record.user_account_control.as_deref(), Some("512"));
    }

    #[test]
    fn member_of_single_scalar_normalizes_to_list() {
        let record = map_entry(&entry(&[
            ("cn", &["bob"]),
            ("memberOf", &["cn=students,ou=Groups,dc=example,dc=com"]),
        ]));
        assert_eq!(
            record.member_of,
            vec!["cn=students,ou=Groups,dc=example,dc=com".to_string()]
        );
    }

    #[test]
    fn missing_member_of_is_empty_list() {
        let record = map_entry(&entry(&[("cn", &["bob"])]));
        assert!(record.member_of.is_empty());
        assert!(record.controls.is_empty());
    }

    #[test]
    fn display_name_falls_back_to_given_plus_family() {
        let record = map_entry(&entry(&[
            ("cn", &["carol"]),
            ("givenName", &["Carol"]),
            ("sn", &["Jones"]),
        ]));
        assert_eq!(record.display_name.as_deref(), Some("Carol Jones"));
    }

    #[test]
    fn display_name_fallback_with_only_given_name() {
        let record = map_entry(&entry(&[("cn", &["dave"]), ("givenName", &["Dave"])]));
        assert_eq!(record.display_name.as_deref(), Some("Dave"));
    }

    #[test]
    fn missing_optionals_map_to_none_without_error() {
        let record = map_entry(&entry(&[("cn", &["erin"])]));
        assert_eq!(record.display_name, None);
        assert_eq!(record.email, None);
        assert_eq!(record.gender, None);
        assert_eq!(record.date_of_birth, None);
        assert_eq!(record.student_id, None);
        assert_eq!(record.telephone_number, None);
    }
}
