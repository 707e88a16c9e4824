//! Connection and request gating.
//!
//! Two checks protect the engine:
//!
//! - [`IpGate`] runs once per connection, before any byte is read
//! - [`Authorizer`] runs on every request, against the `user` credential
//!   carried in the frame
//!
//! ## Credential format
//!
//! Credentials are `username=password`. A credential without `=` is a
//! username with an empty password.
//!
//! ## Admins file
//!
//! ```json
//! {"admins": [{"username": "root", "password": "secret", "permissions": ["ADMIN"]}]}
//! ```
//!
//! `ADMIN` grants both read and write. `WRITE` does not imply read.

use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

/// What a request needs from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Read documents.
    Read,
    /// Create, update or delete documents, or evict collections.
    Write,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => f.write_str("read"),
            Permission::Write => f.write_str("write"),
        }
    }
}

/// A grant held by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserPermission {
    /// May read.
    Read,
    /// May write.
    Write,
    /// May read and write.
    Admin,
}

/// Decides whether a credential may perform an action.
pub trait Authorizer: Send + Sync {
    /// Returns true if the credential belongs to a known user.
    fn authenticate(&self, credential: &str) -> bool;

    /// Returns true if the credential's user holds `permission`.
    fn authorize(&self, credential: &str, permission: Permission) -> bool;
}

/// Decides whether a peer may connect.
pub trait IpGate: Send + Sync {
    /// Returns true if `ip` may open a connection.
    fn is_allowed(&self, ip: IpAddr) -> bool;
}

#[derive(Clone, Deserialize)]
struct User {
    username: String,
    password: String,
    permissions: Vec<UserPermission>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl User {
    fn has(&self, permission: UserPermission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[derive(Deserialize)]
struct AdminsFile {
    #[serde(default)]
    admins: Vec<serde_json::Value>,
}

/// Users loaded from an admins file.
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: Vec<User>,
}

impl UserRegistry {
    /// Creates a registry with no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an admins document.
    ///
    /// Malformed user entries are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the document itself is not valid.
    pub fn from_json(json: &str) -> ServerResult<Self> {
        let file: AdminsFile = serde_json::from_str(json)
            .map_err(|e| ServerError::Config(format!("admins file: {e}")))?;

        let mut users = Vec::with_capacity(file.admins.len());
        for entry in file.admins {
            match serde_json::from_value::<User>(entry) {
                Ok(user) if !user.username.is_empty() => users.push(user),
                Ok(_) => tracing::error!("skipping admin with empty username"),
                Err(e) => tracing::error!(error = %e, "skipping malformed admin entry"),
            }
        }
        tracing::info!(users = users.len(), "user registry loaded");
        Ok(Self { users })
    }

    /// Reads an admins file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Adds a user.
    #[must_use]
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        permissions: &[UserPermission],
    ) -> Self {
        self.users.push(User {
            username: username.into(),
            password: password.into(),
            permissions: permissions.to_vec(),
        });
        self
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns true if there are no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn resolve(&self, credential: &str) -> Option<&User> {
        let (username, password) = credential.split_once('=').unwrap_or((credential, ""));
        self.users.iter().find(|u| {
            u.username == username && constant_time_eq(u.password.as_bytes(), password.as_bytes())
        })
    }
}

impl Authorizer for UserRegistry {
    fn authenticate(&self, credential: &str) -> bool {
        self.resolve(credential).is_some()
    }

    fn authorize(&self, credential: &str, permission: Permission) -> bool {
        let Some(user) = self.resolve(credential) else {
            return false;
        };
        let required = match permission {
            Permission::Read => UserPermission::Read,
            Permission::Write => UserPermission::Write,
        };
        user.has(UserPermission::Admin) || user.has(required)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Allow list of peer addresses.
///
/// The entry `"@"` admits every address.
#[derive(Debug, Clone, Default)]
pub struct IpAllowList {
    allow_all: bool,
    addrs: HashSet<IpAddr>,
}

impl IpAllowList {
    /// Builds a list from textual entries. Unparseable entries are skipped.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry == "@" {
                list.allow_all = true;
                continue;
            }
            match entry.parse::<IpAddr>() {
                Ok(ip) => {
                    list.addrs.insert(ip);
                }
                Err(_) => tracing::warn!(entry, "ignoring invalid allowed ip"),
            }
        }
        list
    }

    /// A list admitting every address.
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            addrs: HashSet::new(),
        }
    }
}

impl IpGate for IpAllowList {
    fn is_allowed(&self, ip: IpAddr) -> bool {
        if self.allow_all || self.addrs.contains(&ip) {
            return true;
        }
        match ip {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .is_some_and(|v4| self.addrs.contains(&IpAddr::V4(v4))),
            IpAddr::V4(_) => false,
        }
    }
}
