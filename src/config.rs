//! Directory connection and search configuration.

use serde::{Deserialize, Serialize};

use crate::error::{LdapCacheError, LdapCacheResult};

/// Configuration for the directory session and the user search.
///
/// Loading this from the environment or a file is the surrounding
/// application's responsibility; the core only validates it.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server URL (e.g. `ldap://dc1.example.com:389`).
    pub url: String,

    /// Bind DN for the single authenticated session.
    pub bind_dn: String,

    /// Bind credential for the session.
    pub bind_credential: String,

    /// Base DN for all operations (e.g. `dc=example,dc=com`).
    pub base_dn: String,

    /// Sub-scope search base for the user population.
    pub search_base: String,

    /// Default filter for the full user search.
    #[serde(default = "default_search_filter")]
    pub search_filter: String,

    /// Attributes requested from the directory for user entries.
    #[serde(default = "default_search_attributes")]
    pub search_attributes: Vec<String>,

    /// DN fragment new users are created under, relative to `base_dn`
    /// (e.g. `ou=Students,ou=People`).
    pub new_user_dn_postfix: String,

    /// Group every new user is attached to after creation.
    pub default_group: String,

    /// Group container fragment, relative to `base_dn`
    /// (e.g. `ou=Groups`).
    #[serde(default = "default_group_container")]
    pub group_container: String,

    /// Page size for the full user search.
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("bind_credential", &"***REDACTED***")
            .field("base_dn", &self.base_dn)
            .field("search_base", &self.search_base)
            .field("search_filter", &self.search_filter)
            .field("search_attributes", &self.search_attributes)
            .field("new_user_dn_postfix", &self.new_user_dn_postfix)
            .field("default_group", &self.default_group)
            .field("group_container", &self.group_container)
            .field("page_size", &self.page_size)
            .finish()
    }
}

fn default_search_filter() -> String {
    "(objectClass=user)".to_string()
}

fn default_search_attributes() -> Vec<String> {
    [
        "dn",
        "cn",
        "memberOf",
        "controls",
        "objectCategory",
        "userAccountControl",
        "lastLogonTimestamp",
        "userPrincipalName",
        "mail",
        "displayName",
        "givenName",
        "sn",
        "gender",
        "dateOfBirth",
        "studentID",
        "telephoneNumber",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_group_container() -> String {
    "ou=Groups".to_string()
}

fn default_page_size() -> i32 {
    1000
}

impl LdapConfig {
    /// Create a config with required fields and defaults for the rest.
    pub fn new(
        url: impl Into<String>,
        bind_dn: impl Into<String>,
        bind_credential: impl Into<String>,
        base_dn: impl Into<String>,
    ) -> Self {
        let base_dn = base_dn.into();
        Self {
            url: url.into(),
            bind_dn: bind_dn.into(),
            bind_credential: bind_credential.into(),
            search_base: base_dn.clone(),
            base_dn,
            search_filter: default_search_filter(),
            search_attributes: default_search_attributes(),
            new_user_dn_postfix: "ou=People".to_string(),
            default_group: String::new(),
            group_container: default_group_container(),
            page_size: default_page_size(),
        }
    }

    /// Validate required fields and bounds.
    pub fn validate(&self) -> LdapCacheResult<()> {
        if self.url.is_empty() {
            return Err(LdapCacheError::validation("url must not be empty"));
        }
        if self.bind_dn.is_empty() {
            return Err(LdapCacheError::validation("bind_dn must not be empty"));
        }
        if self.base_dn.is_empty() {
            return Err(LdapCacheError::validation("base_dn must not be empty"));
        }
        if self.search_base.is_empty() {
            return Err(LdapCacheError::validation("search_base must not be empty"));
        }
        if self.page_size <= 0 {
            return Err(LdapCacheError::validation("page_size must be > 0"));
        }
        Ok(())
    }

    /// DN a user entry lives under: `cn=<username>,<postfix>,<base_dn>`.
    pub fn user_dn(&self, username: &str) -> String {
        format!(
            "cn={},{},{}",
            escape_dn_value(username),
            self.new_user_dn_postfix,
            self.base_dn
        )
    }

    /// DN of a group entry: `cn=<group>,<group_container>,<base_dn>`.
    pub fn group_dn(&self, group: &str) -> String {
        format!(
            "cn={},{},{}",
            escape_dn_value(group),
            self.group_container,
            self.base_dn
        )
    }
}

/// Escape special characters in a DN attribute value (RFC 4514 subset).
pub(crate) fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escape special characters in an LDAP filter value (RFC 4515).
pub(crate) fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}
