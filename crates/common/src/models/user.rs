//! Users, roles and the auth payloads exchanged with the backend

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authors reports
    Analyst,
    /// Reads reports on opposing teams
    Coach,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Analyst => f.write_str("analyst"),
            Role::Coach => f.write_str("coach"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analyst" => Ok(Role::Analyst),
            "coach" => Ok(Role::Coach),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
}

impl User {
    /// "First Last", or the username when no name is set
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Access / refresh token pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access", &"<redacted>")
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8))]
    pub password: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub tokens: AuthTokens,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = User {
            id: 1,
            username: "jdoe".into(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Analyst,
        };
        assert_eq!(user.display_name(), "jdoe");
        user.first_name = "Jane".into();
        user.last_name = "Doe".into();
        assert_eq!(user.display_name(), "Jane Doe");
    }

    #[test]
    fn test_tokens_are_redacted_in_debug() {
        let tokens = AuthTokens {
            access: "abc.def.ghi".into(),
            refresh: Some("xyz".into()),
        };
        let printed = format!("{:?}", tokens);
        assert!(!printed.contains("abc.def.ghi"));
        assert!(!printed.contains("xyz"));
    }

    #[test]
    fn test_register_validation() {
        let request = RegisterRequest {
            username: "ana".into(),
            email: "not-an-email".into(),
            password: "longenough".into(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Coach,
        };
        assert!(request.validate().is_err());
    }
}
