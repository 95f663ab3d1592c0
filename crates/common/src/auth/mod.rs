//! Authentication utilities
//!
//! Provides:
//! - The client-side session store (the only shared mutable credential)
//! - Session persistence backends (memory, JSON file)
//! - JWT token issuing and validation for the reference backend
//! - Password hashing

use crate::errors::{AppError, Result};
use crate::models::{AuthTokens, Role, User};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

// =====================================
// Client session
// =====================================

/// A logged-in session: the token pair plus the user it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub tokens: AuthTokens,
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    pub fn new(tokens: AuthTokens, user: Option<User>) -> Self {
        Self { tokens, user }
    }

    /// A new session carrying a refreshed access token; the original is untouched
    pub fn with_access(&self, access: String) -> Self {
        Self {
            tokens: AuthTokens {
                access,
                refresh: self.tokens.refresh.clone(),
            },
            user: self.user.clone(),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.tokens.access)
    }
}

/// Where sessions survive between runs
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn store(&self, session: &Session) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// Keeps nothing beyond the process lifetime
#[derive(Debug, Default)]
pub struct MemoryPersistence;

impl SessionPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Session>> {
        Ok(None)
    }

    fn store(&self, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        Ok(())
    }
}

/// JSON file on disk, replaced via write-to-temp and rename
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionPersistence for FilePersistence {
    fn load(&self) -> Result<Option<Session>> {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Holder of the current session.
///
/// The session is only ever swapped as a whole: readers get an `Arc`
/// snapshot, writers replace or clear it. There is no way to edit a field of
/// the stored value in place.
pub struct SessionStore {
    current: RwLock<Option<Arc<Session>>>,
    persistence: Box<dyn SessionPersistence>,
}

impl SessionStore {
    /// In-memory store with no session
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(None),
            persistence: Box::new(MemoryPersistence),
        }
    }

    /// Store backed by `persistence`, seeded with whatever it already holds
    pub fn with_persistence(persistence: Box<dyn SessionPersistence>) -> Result<Self> {
        let initial = persistence.load()?.map(Arc::new);
        Ok(Self {
            current: RwLock::new(initial),
            persistence,
        })
    }

    /// Snapshot of the current session
    pub fn get(&self) -> Option<Arc<Session>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    /// Swap in a new session
    pub fn replace(&self, session: Session) -> Result<Arc<Session>> {
        self.persistence.store(&session)?;
        let session = Arc::new(session);
        self.swap(Some(session.clone()));
        debug!("Session replaced");
        Ok(session)
    }

    /// Drop the session (logout, or a 401 that refresh could not fix)
    pub fn clear(&self) -> Result<()> {
        self.swap(None);
        debug!("Session cleared");
        self.persistence.remove()
    }

    fn swap(&self, next: Option<Arc<Session>>) {
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =====================================
// Token issuing (reference backend)
// =====================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    pub role: Role,

    pub kind: TokenKind,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl JwtClaims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| AppError::Unauthorized {
            message: "Malformed token subject".to_string(),
        })
    }
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs: access_ttl_secs as i64,
            refresh_ttl_secs: refresh_ttl_secs as i64,
        }
    }

    fn generate(&self, user_id: i64, role: Role, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };

        let claims = JwtClaims {
            sub: user_id.to_string(),
            role,
            kind,
            exp: (now + Duration::seconds(ttl)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Issue an access / refresh pair for a user
    pub fn issue_pair(&self, user: &User) -> Result<AuthTokens> {
        Ok(AuthTokens {
            access: self.generate(user.id, user.role, TokenKind::Access)?,
            refresh: Some(self.generate(user.id, user.role, TokenKind::Refresh)?),
        })
    }

    /// Issue a fresh access token from a valid refresh token
    pub fn refresh_access(&self, refresh_token: &str) -> Result<String> {
        let claims = self.validate_token(refresh_token, TokenKind::Refresh)?;
        self.generate(claims.user_id()?, claims.role, TokenKind::Access)
    }

    /// Validate and decode a JWT token of the expected kind
    pub fn validate_token(&self, token: &str, expected: TokenKind) -> Result<JwtClaims> {
        let claims = decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid token".to_string(),
                },
            })?;

        if claims.kind != expected {
            return Err(AppError::Unauthorized {
                message: format!("Expected a {:?} token", expected).to_lowercase(),
            });
        }
        Ok(claims)
    }
}

/// Extract the token from a `Bearer` Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =====================================
// Passwords
// =====================================

pub fn hash_password(password: &str) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal {
        message: format!("Failed to encode salt: {}", e),
    })?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(access: &str) -> Session {
        Session::new(
            AuthTokens {
                access: access.to_string(),
                refresh: Some("refresh-token".to_string()),
            },
            None,
        )
    }

    fn analyst() -> User {
        User {
            id: 42,
            username: "scout".into(),
            email: "scout@example.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Analyst,
        }
    }

    fn temp_dir(test_name: &str) -> PathBuf {
        let nonce: u64 = rand::random();
        let dir = std::env::temp_dir().join(format!(
            "scoutdeck_{}_{}_{}",
            test_name,
            std::process::id(),
            nonce
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn test_store_replaces_whole_session() {
        let store = SessionStore::in_memory();
        assert!(store.get().is_none());

        let first = store.replace(session("a1")).unwrap();
        let snapshot = store.get().unwrap();
        assert_eq!(snapshot.tokens.access, "a1");

        store.replace(first.with_access("a2".into())).unwrap();
        // earlier snapshots are unaffected by the swap
        assert_eq!(snapshot.tokens.access, "a1");
        let now = store.get().unwrap();
        assert_eq!(now.tokens.access, "a2");
        assert_eq!(now.tokens.refresh.as_deref(), Some("refresh-token"));

        store.clear().unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_file_persistence_roundtrip() {
        let dir = temp_dir("session_file");
        let path = dir.join("nested").join("session.json");

        let store = SessionStore::with_persistence(Box::new(FilePersistence::new(&path))).unwrap();
        assert!(store.get().is_none());
        store.replace(session("persisted")).unwrap();
        assert!(path.exists());

        let reopened = SessionStore::with_persistence(Box::new(FilePersistence::new(&path))).unwrap();
        assert_eq!(reopened.get().unwrap().tokens.access, "persisted");

        reopened.clear().unwrap();
        assert!(!path.exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_corrupt_session_file_is_ignored() {
        let dir = temp_dir("corrupt_session");
        let path = dir.join("session.json");
        fs::write(&path, b"{not json").unwrap();
        let persistence = FilePersistence::new(&path);
        assert!(persistence.load().unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("abc"), None);
    }

    #[test]
    fn test_jwt_pair_and_refresh() {
        let manager = JwtManager::new("test_secret", 300, 3600);
        let tokens = manager.issue_pair(&analyst()).unwrap();

        let claims = manager.validate_token(&tokens.access, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Analyst);

        let refresh = tokens.refresh.unwrap();
        assert!(manager.validate_token(&refresh, TokenKind::Access).is_err());

        let access = manager.refresh_access(&refresh).unwrap();
        assert!(manager.validate_token(&access, TokenKind::Access).is_ok());
        assert!(manager.refresh_access(&access).is_err());
    }

    #[test]
    fn test_jwt_wrong_secret_is_rejected() {
        let issuer = JwtManager::new("one", 300, 3600);
        let verifier = JwtManager::new("two", 300, 3600);
        let tokens = issuer.issue_pair(&analyst()).unwrap();
        assert!(matches!(
            verifier.validate_token(&tokens.access, TokenKind::Access),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
