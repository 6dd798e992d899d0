use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{NewUser, User, UserChanges};
use super::repo::{CreateUserError, UserRepo};
use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;

const NAME_MAX_LEN: usize = 255;

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Presence and format check. Returns the normalized address.
fn validate_email(raw: Option<&str>) -> Result<String, AppError> {
    let email = normalize_email(raw.unwrap_or_default());
    if email.is_empty() {
        return Err(AppError::required("email"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::invalid("email", "Enter a valid email address."));
    }
    Ok(email)
}

pub fn validate_password(plain: &str, min_len: usize) -> Result<(), AppError> {
    if plain.is_empty() {
        return Err(AppError::required("password"));
    }
    if plain.chars().count() < min_len {
        return Err(AppError::Validation {
            field: "password",
            code: "min_length",
            message: format!("Ensure this field has at least {min_len} characters."),
        });
    }
    Ok(())
}

fn validate_name(raw: Option<String>) -> Result<String, AppError> {
    let name = raw.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.chars().count() > NAME_MAX_LEN {
        return Err(AppError::invalid(
            "name",
            format!("Ensure this field has no more than {NAME_MAX_LEN} characters."),
        ));
    }
    Ok(name)
}

fn email_taken() -> AppError {
    AppError::Validation {
        field: "email",
        code: "unique",
        message: "user with this email already exists.".into(),
    }
}

#[derive(Debug, Default)]
pub struct Registration {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Validates and persists a new user. Nothing is written unless every check passes.
pub async fn register(
    repo: &dyn UserRepo,
    input: Registration,
    min_password_len: usize,
) -> Result<User, AppError> {
    create_user(repo, input, min_password_len, false).await
}

pub async fn create_superuser(
    repo: &dyn UserRepo,
    email: &str,
    password: &str,
    min_password_len: usize,
) -> Result<User, AppError> {
    let input = Registration {
        email: Some(email.to_string()),
        password: Some(password.to_string()),
        name: None,
    };
    create_user(repo, input, min_password_len, true).await
}

/// Creates the superuser unless the (normalized) email is already registered.
/// Returns `None` when an account already exists; that account is left untouched.
pub async fn ensure_superuser(
    repo: &dyn UserRepo,
    email: &str,
    password: &str,
    min_password_len: usize,
) -> Result<Option<User>, AppError> {
    let normalized = normalize_email(email);
    if repo.find_by_email(&normalized).await?.is_some() {
        info!(email = %normalized, "superuser already present");
        return Ok(None);
    }
    create_superuser(repo, &normalized, password, min_password_len)
        .await
        .map(Some)
}

async fn create_user(
    repo: &dyn UserRepo,
    input: Registration,
    min_password_len: usize,
    superuser: bool,
) -> Result<User, AppError> {
    let email = validate_email(input.email.as_deref())?;
    let password = input.password.unwrap_or_default();
    validate_password(&password, min_password_len)?;
    let name = validate_name(input.name)?;

    if repo.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(email_taken());
    }

    let password_hash = hash_password(&password)?;
    let user = repo
        .create(NewUser {
            email,
            name,
            password_hash,
            is_staff: superuser,
            is_superuser: superuser,
        })
        .await
        .map_err(|e| match e {
            CreateUserError::EmailTaken => email_taken(),
            CreateUserError::Other(e) => AppError::Internal(e),
        })?;

    info!(user_id = %user.id, email = %user.email, superuser, "user created");
    Ok(user)
}

/// Exchanges credentials for the matching active user.
pub async fn authenticate(
    repo: &dyn UserRepo,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<User, AppError> {
    let email = normalize_email(email.unwrap_or_default());
    if email.is_empty() {
        return Err(AppError::required("email"));
    }
    let password = password.unwrap_or_default();
    if password.is_empty() {
        return Err(AppError::required("password"));
    }

    let bad_credentials = || AppError::Validation {
        field: "non_field_errors",
        code: "authorization",
        message: "Unable to authenticate with provided credentials".into(),
    };

    let Some(user) = repo.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(bad_credentials());
    };
    if !user.is_active || !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login rejected");
        return Err(bad_credentials());
    }
    Ok(user)
}

/// Loads the caller's own record. A token whose user vanished or was deactivated
/// is treated as no authentication at all.
pub async fn current_user(repo: &dyn UserRepo, user_id: Uuid) -> Result<User, AppError> {
    match repo.find_by_id(user_id).await? {
        Some(user) if user.is_active => Ok(user),
        _ => {
            warn!(%user_id, "token for missing or inactive user");
            Err(AppError::Unauthorized)
        }
    }
}

#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub password: Option<String>,
}

pub async fn update_profile(
    repo: &dyn UserRepo,
    user_id: Uuid,
    update: ProfileUpdate,
    min_password_len: usize,
) -> Result<User, AppError> {
    let name = match update.name {
        Some(n) => Some(validate_name(Some(n))?),
        None => None,
    };
    let password_hash = match update.password {
        Some(p) => {
            validate_password(&p, min_password_len)?;
            Some(hash_password(&p)?)
        }
        None => None,
    };

    repo.update(
        user_id,
        UserChanges {
            name,
            password_hash,
        },
    )
    .await?
    .ok_or(AppError::Unauthorized)
}
