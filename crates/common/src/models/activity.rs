//! Activity feed entries, surfaced to users as notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityVerb {
    Created,
    Updated,
    Completed,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,

    /// Display name of the user who acted
    pub actor: String,

    pub verb: ActivityVerb,

    #[serde(default)]
    pub report_id: Option<i64>,

    #[serde(default)]
    pub team_id: Option<i64>,

    pub message: String,

    pub created_at: DateTime<Utc>,
}
