use crate::config::Config;
use crate::engine::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;

pub const IP_ATTEMPTS: &str = "ipAttempts";
pub const LOGIN_ATTEMPTS: &str = "loginAttempts";
pub const PASSWORD_ATTEMPTS: &str = "passwordAttempts";

/// One login attempt submitted for a throttling decision.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Attempt {
    pub login: String,
    pub password: String,
    /// Address or CIDR network of the client.
    pub ip: String,
}

impl Attempt {
    pub fn ensure_complete(&self) -> Result<(), EngineError> {
        if self.login.is_empty() || self.password.is_empty() || self.ip.is_empty() {
            return Err(EngineError::InvalidInput(
                "login, password or ip can't be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct User {
    pub login: String,
    pub ip: String,
}

impl User {
    pub fn ensure_complete(&self) -> Result<(), EngineError> {
        if self.login.is_empty() || self.ip.is_empty() {
            return Err(EngineError::InvalidInput("login or ip can't be empty"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListKind {
    White,
    Black,
}

impl ListKind {
    pub fn table(self) -> &'static str {
        match self {
            ListKind::White => "whitelist",
            ListKind::Black => "blacklist",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A network stored in the white or black list.
///
/// `ip` holds the bare address, `mask` the prefix length (possibly empty).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListEntry {
    pub ip: String,
    pub mask: String,
}

impl ListEntry {
    /// Splits `"addr/prefix"` into address and mask; a bare address keeps an empty mask.
    pub fn from_network(network: &str) -> Self {
        match network.split_once('/') {
            Some((ip, mask)) => Self {
                ip: ip.to_string(),
                mask: mask.to_string(),
            },
            None => Self {
                ip: network.to_string(),
                mask: String::new(),
            },
        }
    }

    pub fn normalized(self) -> Self {
        if self.mask.is_empty() && self.ip.contains('/') {
            Self::from_network(&self.ip)
        } else {
            self
        }
    }

    pub fn ensure_complete(&self) -> Result<(), EngineError> {
        if self.ip.is_empty() {
            return Err(EngineError::InvalidInput("IP can't be empty"));
        }
        Ok(())
    }
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mask.is_empty() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{}/{}", self.ip, self.mask)
        }
    }
}

/// Attempt limits per dimension, fixed for the lifetime of an engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub ip: i64,
    pub login: i64,
    pub password: i64,
}

impl Limits {
    pub fn from_map(values: &HashMap<String, i64>) -> Result<Self, EngineError> {
        let get = |key: &str| {
            values
                .get(key)
                .copied()
                .ok_or_else(|| EngineError::Config(format!("limit {key} is missing")))
        };
        Ok(Self {
            ip: get(IP_ATTEMPTS)?,
            login: get(LOGIN_ATTEMPTS)?,
            password: get(PASSWORD_ATTEMPTS)?,
        })
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub ok: bool,
}

/// Whether an address is stored in a list.
#[derive(Serialize, Deserialize, Debug)]
pub struct ListedResponse {
    pub listed: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<Engine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_is_split_into_address_and_mask() {
        let entry = ListEntry::from_network("194.4.4.0/25");
        assert_eq!(entry.ip, "194.4.4.0");
        assert_eq!(entry.mask, "25");
        assert_eq!(entry.to_string(), "194.4.4.0/25");

        let bare = ListEntry::from_network("10.0.0.1");
        assert_eq!(bare.mask, "");
        assert_eq!(bare.to_string(), "10.0.0.1");
    }

    #[test]
    fn explicit_mask_is_kept_as_given() {
        let entry = ListEntry {
            ip: "10.0.0.0".into(),
            mask: "255.0.0.0".into(),
        }
        .normalized();
        assert_eq!(entry.ip, "10.0.0.0");
        assert_eq!(entry.mask, "255.0.0.0");
    }

    #[test]
    fn limits_require_every_dimension() {
        let mut values = HashMap::new();
        values.insert(IP_ATTEMPTS.to_string(), 1000);
        values.insert(LOGIN_ATTEMPTS.to_string(), 10);
        assert!(matches!(
            Limits::from_map(&values),
            Err(EngineError::Config(msg)) if msg.contains(PASSWORD_ATTEMPTS)
        ));

        values.insert(PASSWORD_ATTEMPTS.to_string(), 100);
        assert_eq!(
            Limits::from_map(&values).unwrap(),
            Limits {
                ip: 1000,
                login: 10,
                password: 100
            }
        );
    }

    #[test]
    fn empty_fields_are_rejected() {
        let attempt = Attempt {
            login: String::new(),
            password: "qwerty".into(),
            ip: "192.1.1.0/25".into(),
        };
        assert!(matches!(
            attempt.ensure_complete(),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(User {
            login: "login".into(),
            ip: String::new()
        }
        .ensure_complete()
        .is_err());
        assert!(ListEntry::default().ensure_complete().is_err());
    }
}
