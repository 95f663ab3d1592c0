//! Wire models
//!
//! Typed mirrors of the JSON resources exchanged with the REST backend

mod activity;
mod report;
mod team;
mod user;

pub use activity::{Activity, ActivityVerb};

pub use report::{
    Formation,
    KeyPlayer,
    MatchStats,
    Panel,
    Report,
    ReportForm,
    ReportPayload,
    ReportStatus,
    StatusUpdate,
    TacticalSummary,
};

pub use team::{Team, TeamInput};

pub use user::{
    AuthTokens,
    LoginRequest,
    LoginResponse,
    RefreshRequest,
    RefreshResponse,
    RegisterRequest,
    Role,
    User,
};
