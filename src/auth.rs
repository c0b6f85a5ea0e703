use crate::config::Config;
use crate::errors::ApiError;
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use futures_util::future::{err, ok, Ready};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "droplink_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // admin username
    pub exp: usize,
}

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|_| ApiError::Internal)?
        .to_string())
}

pub fn verify_password(hash: &str, plain: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// The one admin identity allowed into the admin pages.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    password_hash: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password_hash: String) -> Self {
        Self {
            username: username.into(),
            password_hash,
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let hash = match (&cfg.admin_password_hash, &cfg.admin_password) {
            (Some(hash), _) => {
                PasswordHash::new(hash)
                    .map_err(|e| anyhow::anyhow!("admin_password_hash is not a valid PHC string: {e}"))?;
                hash.clone()
            }
            (None, Some(plain)) => hash_password(plain)
                .map_err(|e| anyhow::anyhow!("failed to hash admin password: {e}"))?,
            (None, None) => {
                let generated = Alphanumeric.sample_string(&mut rand::thread_rng(), 20);
                log::warn!(
                    "no admin password configured; generated one for this run: username={} password={}",
                    cfg.admin_username,
                    generated
                );
                hash_password(&generated)
                    .map_err(|e| anyhow::anyhow!("failed to hash admin password: {e}"))?
            }
        };
        Ok(Self::new(cfg.admin_username.clone(), hash))
    }

    pub fn check(&self, username: &str, password: &str) -> bool {
        username == self.username && verify_password(&self.password_hash, password)
    }
}

pub fn create_session_token(username: &str, cfg: &Config) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::seconds(cfg.session_ttl_secs)).timestamp() as usize;
    let claims = Claims {
        sub: username.to_string(),
        exp,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.session_secret_bytes()),
    )
    .map_err(|_| ApiError::Internal)
}

pub fn verify_session_token(token: &str, cfg: &Config) -> Result<Claims, ApiError> {
    let mut v = Validation::new(Algorithm::HS256);
    v.validate_exp = true;
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(cfg.session_secret_bytes()), &v)
        .map(|data| data.claims)
        .map_err(|_| ApiError::LoginRequired)
}

pub fn session_cookie(token: String, cfg: &Config) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(cfg.session_ttl_secs))
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut c = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    c.make_removal();
    c
}

/// Request-scoped proof that the caller logged in as the admin.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
}

impl AdminSession {
    pub fn from_http(req: &HttpRequest) -> Result<Self, ApiError> {
        let cfg = req
            .app_data::<actix_web::web::Data<Config>>()
            .ok_or(ApiError::Internal)?;
        let cookie = req.cookie(SESSION_COOKIE).ok_or(ApiError::LoginRequired)?;
        let claims = verify_session_token(cookie.value(), cfg)?;
        Ok(AdminSession {
            username: claims.sub,
        })
    }
}

impl FromRequest for AdminSession {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match AdminSession::from_http(req) {
            Ok(session) => ok(session),
            Err(e) => err(e),
        }
    }
}
