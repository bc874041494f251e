use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::authz;

/// Canonical session cookie. `session_token` is a legacy alias that is still
/// read for compatibility but never written.
pub const SESSION_COOKIE: &str = "auth-token";
pub const LEGACY_SESSION_COOKIE: &str = "session_token";
pub const SESSION_TTL_DAYS: i64 = 7;

const TOKEN_TYPE_PROFESSOR: &str = "professor";

/// Authenticated professor identity, as resolved from a live session.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Professor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub role: String,
    pub is_active: bool,
}

#[derive(Clone, sqlx::FromRow)]
struct ProfessorCredentials {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    department: Option<String>,
    role: String,
    is_active: bool,
}

/// Claims embedded in the signed session token. `jti` keeps every mint
/// distinct; without it two logins in the same second would produce equal
/// tokens and collide on the unique session column.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    professor_id: Uuid,
    token_type: String,
    jti: Uuid,
    exp: i64,
}

/// Successful authentication: the professor plus the freshly minted token.
#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub professor: Professor,
    pub token: String,
}

/// Failure cases the login handler must tell apart. Credential problems are
/// deliberately a single variant so the response cannot leak which check
/// failed.
#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    DuplicateEmail,
    Backend(anyhow::Error),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "invalid credentials"),
            AuthError::DuplicateEmail => write!(f, "email already registered"),
            AuthError::Backend(err) => write!(f, "auth backend error: {err}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Backend(err.into())
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Mint a signed session token bound to a professor id, valid for 7 days.
pub fn generate_token(secret: &str, professor_id: Uuid) -> anyhow::Result<String> {
    let exp = (Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS)).timestamp();
    let claims = SessionClaims {
        professor_id,
        token_type: TOKEN_TYPE_PROFESSOR.to_string(),
        jti: Uuid::new_v4(),
        exp,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(Into::into)
}

/// Cryptographic half of session validation. Returns the embedded professor
/// id only when the signature, expiry and type discriminator all check out.
pub fn verify_token(secret: &str, token: &str) -> Option<Uuid> {
    let data = jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    if data.claims.token_type != TOKEN_TYPE_PROFESSOR {
        return None;
    }

    Some(data.claims.professor_id)
}

/// Look up a professor by email and verify the password. Missing account,
/// inactive account and wrong password all collapse into
/// `AuthError::InvalidCredentials`; only infrastructure failures surface as
/// `Backend`.
pub async fn authenticate(
    pool: &PgPool,
    secret: &str,
    email: &str,
    password: &str,
) -> Result<AuthSuccess, AuthError> {
    let email = email.trim().to_lowercase();

    let row = sqlx::query_as::<_, ProfessorCredentials>(
        "SELECT id, name, email, password_hash, department, role, is_active
         FROM professors WHERE email = $1 AND is_active = TRUE",
    )
    .bind(&email)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &row.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    let professor = Professor {
        id: row.id,
        name: row.name,
        email: row.email,
        department: row.department,
        role: row.role,
        is_active: row.is_active,
    };

    let token = generate_token(secret, professor.id).map_err(AuthError::Backend)?;
    save_session(pool, professor.id, &token).await?;

    Ok(AuthSuccess { professor, token })
}

/// Persist the mirrored session row with an expiry matching the token's.
pub async fn save_session(pool: &PgPool, professor_id: Uuid, token: &str) -> sqlx::Result<()> {
    let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);

    sqlx::query(
        "INSERT INTO professor_sessions (id, professor_id, session_token, expires_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(professor_id)
    .bind(token)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Two-phase session validation: token signature first, then the persisted
/// session row joined to a still-active professor. A token that verifies but
/// has no live row (logout, expiry sweep) is invalid.
pub async fn validate_session(
    pool: &PgPool,
    secret: &str,
    token: &str,
) -> sqlx::Result<Option<Professor>> {
    if verify_token(secret, token).is_none() {
        return Ok(None);
    }

    sqlx::query_as::<_, Professor>(
        "SELECT p.id, p.name, p.email, p.department, p.role, p.is_active
         FROM professor_sessions ps
         JOIN professors p ON p.id = ps.professor_id
         WHERE ps.session_token = $1 AND ps.expires_at > NOW() AND p.is_active = TRUE",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

/// Delete the session row for a token. Idempotent: a missing row reports
/// `false`, not an error.
pub async fn logout_session(pool: &PgPool, token: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM professor_sessions WHERE session_token = $1")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove every session past its expiry. Safe to run concurrently with login
/// traffic: only rows already expired are touched.
pub async fn clean_expired_sessions(pool: &PgPool) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM professor_sessions WHERE expires_at < NOW()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn count_expired_sessions(pool: &PgPool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM professor_sessions WHERE expires_at < NOW()")
        .fetch_one(pool)
        .await
}

/// Register a professor account. Allowlisted emails become administrators.
pub async fn create_professor(
    pool: &PgPool,
    name: &str,
    email: &str,
    password: &str,
    department: Option<&str>,
) -> Result<Professor, AuthError> {
    let email = email.trim().to_lowercase();

    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM professors WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AuthError::DuplicateEmail);
    }

    let password_hash = hash_password(password)
        .map_err(|err| AuthError::Backend(anyhow::anyhow!("failed to hash password: {err}")))?;

    let role = if authz::is_admin_email(&email) {
        authz::ROLE_ADMIN
    } else {
        authz::ROLE_PROFESSOR
    };

    let professor = sqlx::query_as::<_, Professor>(
        "INSERT INTO professors (id, name, email, password_hash, department, role)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id, name, email, department, role, is_active",
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .bind(&email)
    .bind(password_hash)
    .bind(department.map(str::trim))
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(professor)
}

/// Session token from the cookie jar, canonical name first.
pub fn token_from_jar(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .or_else(|| jar.get(LEGACY_SESSION_COOKIE))
        .map(|cookie| cookie.value().to_string())
}

pub fn build_session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));
    cookie
}

pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::seconds(0));
    cookie
}

/// Clear both cookie names in one pass.
pub fn clear_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(removal_cookie(SESSION_COOKIE))
        .remove(removal_cookie(LEGACY_SESSION_COOKIE))
}

/// Resolve the caller from the jar, logging backend failures and treating
/// them as "not authenticated".
pub async fn current_professor(pool: &PgPool, secret: &str, jar: &CookieJar) -> Option<Professor> {
    let token = token_from_jar(jar)?;

    match validate_session(pool, secret, &token).await {
        Ok(professor) => professor,
        Err(err) => {
            error!(?err, "failed to validate session");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("hunter2").expect("hash");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn verify_password_rejects_malformed_hash() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn token_round_trips_professor_id() {
        let id = Uuid::new_v4();
        let token = generate_token(SECRET, id).expect("token");
        assert_eq!(verify_token(SECRET, &token), Some(id));
    }

    #[test]
    fn back_to_back_tokens_are_distinct() {
        let id = Uuid::new_v4();
        let first = generate_token(SECRET, id).expect("token");
        let second = generate_token(SECRET, id).expect("token");

        assert_ne!(first, second);
        assert_eq!(verify_token(SECRET, &first), Some(id));
        assert_eq!(verify_token(SECRET, &second), Some(id));
    }

    #[test]
    fn token_rejected_with_wrong_secret() {
        let token = generate_token(SECRET, Uuid::new_v4()).expect("token");
        assert_eq!(verify_token("other-secret", &token), None);
    }

    #[test]
    fn token_rejected_with_wrong_discriminator() {
        let claims = SessionClaims {
            professor_id: Uuid::new_v4(),
            token_type: "student".to_string(),
            jti: Uuid::new_v4(),
            exp: (Utc::now() + ChronoDuration::days(1)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        assert_eq!(verify_token(SECRET, &token), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = SessionClaims {
            professor_id: Uuid::new_v4(),
            token_type: TOKEN_TYPE_PROFESSOR.to_string(),
            jti: Uuid::new_v4(),
            exp: (Utc::now() - ChronoDuration::hours(2)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");

        assert_eq!(verify_token(SECRET, &token), None);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_eq!(verify_token(SECRET, "not.a.jwt"), None);
    }
}
