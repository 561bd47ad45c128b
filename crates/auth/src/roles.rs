use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role name used for RBAC.
///
/// Names are stored lower-cased, so equality is case-insensitive. Whether a
/// role exists is decided by the role directory (storage), not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const CUSTOMER: &'static str = "customer";
    pub const ADMIN: &'static str = "admin";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        if name.chars().any(|c| c.is_uppercase()) || name.trim().len() != name.len() {
            Self(Cow::Owned(name.trim().to_lowercase()))
        } else {
            Self(name)
        }
    }

    pub fn customer() -> Self {
        Self(Cow::Borrowed(Self::CUSTOMER))
    }

    pub fn admin() -> Self {
        Self(Cow::Borrowed(Self::ADMIN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::new(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0.into_owned()
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_compare_case_insensitively() {
        assert_eq!(Role::new("Admin"), Role::admin());
        assert_eq!(Role::new(" CUSTOMER "), Role::customer());
        assert!(Role::new("ADMIN").is_admin());
    }

    #[test]
    fn deserialization_normalizes() {
        let role: Role = serde_json::from_str("\"Customer\"").unwrap();
        assert_eq!(role.as_str(), "customer");
    }
}
