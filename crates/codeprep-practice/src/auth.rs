// Identity providers and the signed-in session.
//
// `IdentityProvider` verifies who someone is; `Session` holds the current
// user and makes sure every verified identity has a profile record under
// `users/{id}`.

use std::sync::Arc;

use anyhow::Context;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{info, warn};

use codeprep_core::db::Database;
use codeprep_core::model::{new_id, now_millis, ExternalIdentity, Millis, User, DEFAULT_ROLE};

pub const MIN_PASSWORD_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email is required")]
    MissingEmail,

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    #[error("an account with this email already exists")]
    EmailInUse,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("must be logged in")]
    NotSignedIn,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// A verified identity as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Accept an identity verified elsewhere (e.g. an OAuth popup).
    async fn sign_in_federated(&self, external: ExternalIdentity) -> Result<Identity, AuthError>;
}

/// Email/password accounts stored next to the practice data, hashed with
/// Argon2id.
pub struct LocalIdentityProvider {
    db: Arc<Database>,
}

impl LocalIdentityProvider {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("stored hash is invalid: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::MissingEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        if self.db.credentials_by_email(&email)?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")??;

        let uid = new_id();
        self.db.insert_credentials(&uid, &email, &hash)?;
        info!("Created local account {}", uid);

        Ok(Identity {
            uid,
            email,
            display_name: display_name.map(str::to_string),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        let Some(creds) = self.db.credentials_by_email(&email)? else {
            return Err(AuthError::InvalidCredentials);
        };

        let password = password.to_string();
        let hash = creds.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("password verification task failed")??;
        if !ok {
            warn!("Failed sign-in for {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Identity {
            uid: creds.user_id,
            email: creds.email,
            display_name: None,
        })
    }

    async fn sign_in_federated(&self, external: ExternalIdentity) -> Result<Identity, AuthError> {
        if external.uid.trim().is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(Identity {
            uid: external.uid,
            email: external.email.map(|e| normalize_email(&e)).unwrap_or_default(),
            display_name: external.display_name,
        })
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Profile name: explicit name, then the provider's display name, then the
/// email's local part, then `"User"`.
pub fn profile_name(explicit: Option<&str>, identity: &Identity) -> String {
    non_empty(explicit)
        .or_else(|| non_empty(identity.display_name.as_deref()))
        .or_else(|| non_empty(identity.email.split('@').next()))
        .unwrap_or("User")
        .to_string()
}

/// Create the profile on first sign-in, otherwise refresh `last_login`.
pub fn ensure_user_profile(
    db: &Database,
    identity: &Identity,
    explicit_name: Option<&str>,
    now: Millis,
) -> anyhow::Result<User> {
    if let Some(mut user) = db.get_user(&identity.uid)? {
        db.touch_last_login(&identity.uid, now)?;
        user.last_login = now;
        return Ok(user);
    }

    let user = User {
        id: identity.uid.clone(),
        name: profile_name(explicit_name, identity),
        email: identity.email.clone(),
        role: DEFAULT_ROLE.to_string(),
        avatar: None,
        created_at: now,
        last_login: now,
    };
    db.insert_user(&user).context("failed to create user profile")?;
    info!("Created profile for {}", user.id);
    Ok(user)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The signed-in user, if any.
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    db: Arc<Database>,
    user: Option<User>,
}

impl Session {
    pub fn new(provider: Arc<dyn IdentityProvider>, db: Arc<Database>) -> Self {
        Self {
            provider,
            db,
            user: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// The current user or `AuthError::NotSignedIn`.
    pub fn require_user(&self) -> Result<&User, AuthError> {
        self.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&User, AuthError> {
        let identity = self.provider.sign_in(email, password).await?;
        self.establish(identity, None)
    }

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<&User, AuthError> {
        let identity = self.provider.sign_up(email, password, name).await?;
        self.establish(identity, name)
    }

    pub async fn sign_in_with(&mut self, external: ExternalIdentity) -> Result<&User, AuthError> {
        let identity = self.provider.sign_in_federated(external).await?;
        self.establish(identity, None)
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            info!("Signed out {}", user.id);
        }
    }

    /// Reload the profile after it was edited.
    pub fn reload(&mut self) -> anyhow::Result<()> {
        if let Some(id) = self.user_id().map(str::to_string) {
            self.user = self.db.get_user(&id)?;
        }
        Ok(())
    }

    fn establish(&mut self, identity: Identity, name: Option<&str>) -> Result<&User, AuthError> {
        let user = ensure_user_profile(&self.db, &identity, name, now_millis())?;
        info!("Signed in {}", user.id);
        let user: &User = self.user.insert(user);
        Ok(user)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
