//! Team entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn default_color() -> String {
    "#000000".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,

    pub name: String,

    #[serde(default)]
    pub logo: String,

    /// Hex color, e.g. `#6CABDD`
    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub league: String,

    #[serde(default)]
    pub created_by: Option<i64>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Team {
    /// Stand-in used when team metadata could not be fetched
    pub fn placeholder(id: i64) -> Self {
        Self {
            id,
            name: "Team".to_string(),
            logo: String::new(),
            color: default_color(),
            league: String::new(),
            created_by: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Create / update body for a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TeamInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[serde(default)]
    pub logo: String,

    #[serde(default = "default_color")]
    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub league: String,
}

fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let digits = color.strip_prefix('#').unwrap_or("");
    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_defaults_to_black() {
        let team: Team = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Arsenal",
            "league": "Premier League"
        }))
        .unwrap();
        assert_eq!(team.color, "#000000");
        assert!(team.logo.is_empty());
    }

    #[test]
    fn test_hex_color_validation() {
        let mut input = TeamInput {
            name: "Brentford".into(),
            logo: String::new(),
            color: "#E30613".into(),
            league: "Premier League".into(),
        };
        assert!(input.validate().is_ok());

        input.color = "red".into();
        assert!(input.validate().is_err());

        input.color = "#12345".into();
        assert!(input.validate().is_err());
    }
}
