//! REST API client
//!
//! Wraps `reqwest` with the session store so that every request carries the
//! current bearer token. A 401 triggers a single token refresh and retry;
//! when the refresh fails the session is cleared and the caller gets
//! [`AppError::Unauthorized`].

use crate::auth::{Session, SessionStore};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::metrics::{record_token_refresh, RequestMetrics};
use crate::models::{
    Activity, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, RegisterRequest,
    Report, ReportPayload, ReportStatus, StatusUpdate, Team, TeamInput, User,
};
use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Report operations the editor and dashboard depend on
#[async_trait]
pub trait ReportsApi: Send + Sync {
    async fn get_team(&self, team_id: i64) -> Result<Team>;

    async fn list_teams(&self) -> Result<Vec<Team>>;

    /// Reports filed on a team (all of them for a coach, own for an analyst)
    async fn team_reports(&self, team_id: i64) -> Result<Vec<Report>>;

    /// The current analyst's report for a team, `None` when there is none yet
    async fn my_report_for_team(&self, team_id: i64) -> Result<Option<Report>>;

    async fn create_report(&self, payload: &ReportPayload) -> Result<Report>;

    async fn update_report(&self, report_id: i64, payload: &ReportPayload) -> Result<Report>;
}

/// Best human-readable message in an error payload.
///
/// A bare string is used as is, then `detail`, then `message`; anything else
/// is rendered as compact JSON.
pub fn error_message_from_payload(payload: &Value) -> String {
    fn text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("detail")
            .or_else(|| map.get("message"))
            .map(text)
            .unwrap_or_else(|| payload.to_string()),
        other => other.to_string(),
    }
}

/// HTTP client for the ScoutDeck REST API
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<SessionStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scoutdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn from_config(config: &AppConfig, session: Arc<SessionStore>) -> Result<Self> {
        Self::new(&config.client.api_url, config.request_timeout(), session)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(session) = self.session.get() {
            request = request.header(reqwest::header::AUTHORIZATION, session.bearer());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Authenticated request with the refresh-and-retry-once policy
    async fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let metrics = RequestMetrics::start(method.as_str(), path);
        let mut response = self.dispatch(method.clone(), path, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "Access token rejected, attempting refresh");
            if self.refresh_session().await {
                response = self.dispatch(method, path, body).await?;
            }
            if response.status() == StatusCode::UNAUTHORIZED {
                metrics.finish(StatusCode::UNAUTHORIZED.as_u16());
                self.session.clear()?;
                return Err(AppError::Unauthorized {
                    message: "login required".to_string(),
                });
            }
        }

        metrics.finish(response.status().as_u16());
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response, path).await)
        }
    }

    /// Request that never carries or refreshes credentials
    async fn execute_public(&self, path: &str, body: &Value) -> Result<Response> {
        let metrics = RequestMetrics::start("POST", path);
        let response = self.http.post(self.url(path)).json(body).send().await?;
        metrics.finish(response.status().as_u16());
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response, path).await)
        }
    }

    async fn error_from(response: Response, path: &str) -> AppError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND {
            return AppError::NotFound {
                resource_type: "resource".to_string(),
                id: path.to_string(),
            };
        }

        let payload = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        let message = match &payload {
            Value::Null => status.canonical_reason().unwrap_or("request failed").to_string(),
            other => error_message_from_payload(other),
        };

        AppError::Api {
            status: status.as_u16(),
            message,
            payload,
        }
    }

    /// Swap in a session with a fresh access token. False when there is no
    /// refresh token or the backend refused it.
    async fn refresh_session(&self) -> bool {
        let Some(current) = self.session.get() else {
            return false;
        };
        let Some(refresh) = current.tokens.refresh.clone() else {
            return false;
        };

        let body = match serde_json::to_value(RefreshRequest { refresh }) {
            Ok(body) => body,
            Err(_) => return false,
        };
        let refreshed = match self.execute_public("/auth/token/refresh/", &body).await {
            Ok(response) => response.json::<RefreshResponse>().await.ok(),
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                None
            }
        };

        record_token_refresh(refreshed.is_some());
        match refreshed {
            Some(RefreshResponse { access }) => self.session.replace(current.with_access(access)).is_ok(),
            None => false,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self.execute(Method::GET, path, None).await?.json().await?)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        Ok(self.execute(method, path, Some(&body)).await?.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.execute(Method::DELETE, path, None).await?;
        Ok(())
    }

    // =====================================
    // Auth
    // =====================================

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let body = serde_json::to_value(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let response = self
            .execute_public("/auth/login/", &body)
            .await
            .map_err(|e| match e {
                AppError::Api { status: 401, .. } => AppError::InvalidCredentials,
                other => other,
            })?;
        self.adopt_login(response.json().await?)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        let body = serde_json::to_value(request)?;
        let response = self.execute_public("/auth/register/", &body).await?;
        self.adopt_login(response.json().await?)
    }

    fn adopt_login(&self, login: LoginResponse) -> Result<User> {
        let LoginResponse { tokens, user } = login;
        self.session.replace(Session::new(tokens, Some(user.clone())))?;
        debug!(user = %user.username, role = %user.role, "Logged in");
        Ok(user)
    }

    pub async fn current_user(&self) -> Result<User> {
        self.get_json("/auth/user/").await
    }

    /// Local only: the backend keeps no server-side session
    pub fn logout(&self) -> Result<()> {
        self.session.clear()
    }

    // =====================================
    // Teams
    // =====================================

    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        self.get_json("/teams/").await
    }

    pub async fn get_team(&self, team_id: i64) -> Result<Team> {
        self.get_json(&format!("/teams/{}/", team_id))
            .await
            .map_err(|e| not_found_as(e, || AppError::TeamNotFound { id: team_id.to_string() }))
    }

    pub async fn create_team(&self, input: &TeamInput) -> Result<Team> {
        self.send_json(Method::POST, "/teams/", input).await
    }

    pub async fn update_team(&self, team_id: i64, input: &TeamInput) -> Result<Team> {
        self.send_json(Method::PUT, &format!("/teams/{}/", team_id), input).await
    }

    pub async fn delete_team(&self, team_id: i64) -> Result<()> {
        self.delete(&format!("/teams/{}/", team_id)).await
    }

    pub async fn leagues(&self) -> Result<Vec<String>> {
        self.get_json("/leagues/").await
    }

    // =====================================
    // Reports
    // =====================================

    pub async fn list_reports(&self) -> Result<Vec<Report>> {
        self.get_json("/reports/").await
    }

    pub async fn get_report(&self, report_id: i64) -> Result<Report> {
        self.get_json(&format!("/reports/{}/", report_id))
            .await
            .map_err(|e| not_found_as(e, || AppError::ReportNotFound { id: report_id.to_string() }))
    }

    pub async fn team_reports(&self, team_id: i64) -> Result<Vec<Report>> {
        self.get_json(&format!("/reports/team/{}/", team_id)).await
    }

    pub async fn my_report_for_team(&self, team_id: i64) -> Result<Option<Report>> {
        match self.get_json(&format!("/reports/my-report/team/{}/", team_id)).await {
            Ok(report) => Ok(Some(report)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_report(&self, payload: &ReportPayload) -> Result<Report> {
        self.send_json(Method::POST, "/reports/", payload).await
    }

    pub async fn update_report(&self, report_id: i64, payload: &ReportPayload) -> Result<Report> {
        self.send_json(Method::PUT, &format!("/reports/{}/", report_id), payload).await
    }

    pub async fn update_report_status(&self, report_id: i64, status: ReportStatus) -> Result<Report> {
        self.send_json(
            Method::PUT,
            &format!("/reports/{}/status/", report_id),
            &StatusUpdate { status },
        )
        .await
    }

    pub async fn delete_report(&self, report_id: i64) -> Result<()> {
        self.delete(&format!("/reports/{}/", report_id))
            .await
            .map_err(|e| not_found_as(e, || AppError::ReportNotFound { id: report_id.to_string() }))
    }

    // =====================================
    // Activities
    // =====================================

    pub async fn list_activities(&self) -> Result<Vec<Activity>> {
        self.get_json("/activities/").await
    }
}

fn not_found_as(err: AppError, specific: impl FnOnce() -> AppError) -> AppError {
    if matches!(err, AppError::NotFound { .. }) {
        specific()
    } else {
        err
    }
}

#[async_trait]
impl ReportsApi for ApiClient {
    async fn get_team(&self, team_id: i64) -> Result<Team> {
        ApiClient::get_team(self, team_id).await
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        ApiClient::list_teams(self).await
    }

    async fn team_reports(&self, team_id: i64) -> Result<Vec<Report>> {
        ApiClient::team_reports(self, team_id).await
    }

    async fn my_report_for_team(&self, team_id: i64) -> Result<Option<Report>> {
        ApiClient::my_report_for_team(self, team_id).await
    }

    async fn create_report(&self, payload: &ReportPayload) -> Result<Report> {
        ApiClient::create_report(self, payload).await
    }

    async fn update_report(&self, report_id: i64, payload: &ReportPayload) -> Result<Report> {
        ApiClient::update_report(self, report_id, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_string_payload() {
        assert_eq!(error_message_from_payload(&json!("boom")), "boom");
    }

    #[test]
    fn test_message_prefers_detail_then_message() {
        assert_eq!(
            error_message_from_payload(&json!({ "detail": "Not allowed", "message": "ignored" })),
            "Not allowed"
        );
        assert_eq!(error_message_from_payload(&json!({ "message": "Bad input" })), "Bad input");
    }

    #[test]
    fn test_non_string_detail_is_stringified() {
        assert_eq!(
            error_message_from_payload(&json!({ "detail": ["a", "b"] })),
            r#"["a","b"]"#
        );
    }

    #[test]
    fn test_other_payloads_render_as_compact_json() {
        assert_eq!(
            error_message_from_payload(&json!({ "team_id": ["required"] })),
            r#"{"team_id":["required"]}"#
        );
        assert_eq!(
            error_message_from_payload(&json!(["You have already created a report for this team."])),
            r#"["You have already created a report for this team."]"#
        );
    }

    #[test]
    fn test_base_url_is_normalised() {
        let client = ApiClient::new(
            "http://localhost:8000/api/",
            Duration::from_secs(5),
            Arc::new(SessionStore::in_memory()),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.url("/reports/"), "http://localhost:8000/api/reports/");
    }

    #[test]
    fn test_not_found_is_specialised() {
        let err = not_found_as(
            AppError::NotFound {
                resource_type: "resource".into(),
                id: "/reports/4/".into(),
            },
            || AppError::ReportNotFound { id: "4".into() },
        );
        assert!(matches!(err, AppError::ReportNotFound { .. }));

        let untouched = not_found_as(AppError::SaveInFlight, || AppError::ReportNotFound { id: "4".into() });
        assert!(matches!(untouched, AppError::SaveInFlight));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let store = Arc::new(SessionStore::in_memory());
        store
            .replace(Session::new(
                crate::models::AuthTokens {
                    access: "a".into(),
                    refresh: None,
                },
                None,
            ))
            .unwrap();
        let client = ApiClient::new("http://localhost:1", Duration::from_secs(1), store.clone()).unwrap();
        client.logout().unwrap();
        assert!(!store.is_authenticated());
    }
}
