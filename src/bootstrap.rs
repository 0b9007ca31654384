//! First-run account setup.

use crate::{
    auth::password::{self, PasswordError},
    config::AppConfig,
    models::Role,
    repository::{RepositoryError, RepositoryState},
};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// What `ensure_admin` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// At least one admin already existed.
    AdminExists,
    /// No admin existed and no credentials were configured.
    NotConfigured,
    /// A new admin was created with this username.
    Created(String),
}

/// ensure_admin
///
/// Creates the configured admin account when the store holds no admin at all. If the
/// username is taken by a staff account, that account is left alone and the outcome is
/// `NotConfigured`.
pub async fn ensure_admin(
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<BootstrapOutcome, BootstrapError> {
    if repo.count_users(Some(Role::Admin)).await? > 0 {
        return Ok(BootstrapOutcome::AdminExists);
    }

    let (Some(username), Some(plain)) = (
        config.admin_username.as_deref().map(str::trim).filter(|u| !u.is_empty()),
        config.admin_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        tracing::warn!("no admin account exists and ADMIN_USERNAME/ADMIN_PASSWORD are not set");
        return Ok(BootstrapOutcome::NotConfigured);
    };

    let hash = password::hash_password(plain)?;
    match repo.create_user(username, &hash, Role::Admin).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "bootstrap admin created");
            Ok(BootstrapOutcome::Created(user.username))
        }
        Err(RepositoryError::Conflict(_)) => {
            tracing::warn!(%username, "bootstrap admin username is taken by a non-admin account");
            Ok(BootstrapOutcome::NotConfigured)
        }
        Err(e) => Err(e.into()),
    }
}
