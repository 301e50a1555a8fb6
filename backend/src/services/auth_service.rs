//! Authentication service.
//!
//! Handles login, session token management, password hashing and the
//! first-boot administrator.

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::department::Department;
use crate::models::unit::{Unit, UnitUser};
use crate::models::user::{AuthorityLevel, User};
use crate::services::validation;
use crate::services::visibility::CallerContext;
use crate::storage::Store;

/// Username of the first-boot administrator
pub const ADMIN_USERNAME: &str = "admin";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Username
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Session token response
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn Store>,
    config: Arc<Config>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(store: Arc<dyn Store>, config: Arc<Config>) -> Self {
        let secret = config.jwt_secret.clone();
        Self {
            store,
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Authenticate user with username and password
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(User, SessionToken)> {
        let invalid = || AppError::Authentication("Invalid username or password".to_string());

        let user = self
            .store
            .find_user_by_username(username.trim())
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or_else(invalid)?;

        let password_hash = user.password_hash.as_ref().ok_or_else(invalid)?;
        if !Self::verify_password(password, password_hash)? {
            return Err(invalid());
        }

        let token = self.generate_token(&user)?;
        tracing::info!(username = %user.username, "User logged in");
        Ok((user, token))
    }

    /// Generate a session token for a user
    pub fn generate_token(&self, user: &User) -> Result<SessionToken> {
        let now = Utc::now();
        let exp = Duration::try_minutes(self.config.jwt_expiry_minutes)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Session lifetime of {} minutes is out of range",
                    self.config.jwt_expiry_minutes
                ))
            })?;

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))?;

        Ok(SessionToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: (self.config.jwt_expiry_minutes.max(0) * 60) as u64,
        })
    }

    /// Validate and decode a session token
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        Ok(self.decode_token(token)?.claims)
    }

    /// Resolve a session token to the caller it belongs to.
    ///
    /// Authority levels and unit grants are read fresh from the store, so
    /// changes apply to sessions that are already open.
    pub async fn resolve_caller(&self, token: &str) -> Result<CallerContext> {
        let claims = self.validate_token(token)?;
        let user = self
            .store
            .get_user(claims.sub)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or_else(|| AppError::Authentication("User not found".to_string()))?;
        CallerContext::load(self.store.as_ref(), &user).await
    }

    /// Change the caller's own password after checking the current one
    pub async fn change_password(
        &self,
        caller: &CallerContext,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut user = self
            .store
            .get_user(caller.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let matches = match &user.password_hash {
            Some(hash) => Self::verify_password(current_password, hash)?,
            None => false,
        };
        if !matches {
            return Err(AppError::Authentication(
                "Current password is incorrect".to_string(),
            ));
        }
        validation::password(new_password)?;
        user.password_hash = Some(Self::hash_password(new_password)?);
        self.store.update_user(&user).await?;
        tracing::info!(username = %user.username, "Password changed");
        Ok(())
    }

    /// Create the SuperAdmin account when the store holds no users.
    ///
    /// Returns the generated password when `admin_password` is not given,
    /// `None` when the password was supplied or users already exist.
    pub async fn provision_admin(&self, admin_password: Option<String>) -> Result<Option<String>> {
        if !self.store.list_users().await?.is_empty() {
            return Ok(None);
        }

        let (password, generated) = match admin_password {
            Some(p) if !p.is_empty() => (p, false),
            _ => (generate_password(), true),
        };

        let department = Department::new("Administration");
        let unit = Unit::new(department.id, "Administrators");
        let mut admin = User::new(ADMIN_USERNAME, "System", "Administrator", unit.id)
            .with_authority(AuthorityLevel::SuperAdmin, AuthorityLevel::SuperAdmin);
        admin.password_hash = Some(Self::hash_password(&password)?);

        self.store.insert_department(&department).await?;
        self.store.insert_unit(&unit).await?;
        self.store.insert_user(&admin).await?;
        self.store
            .upsert_unit_user(&UnitUser::new(unit.id, admin.id))
            .await?;

        tracing::info!("Initial admin user '{}' created", ADMIN_USERNAME);
        Ok(generated.then_some(password))
    }

    /// Decode and validate a token
    fn decode_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }

    /// Hash a password
    pub fn hash_password(password: &str) -> Result<String> {
        hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}

/// Generate a random password
pub(crate) fn generate_password() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%&*";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
