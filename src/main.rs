use std::net::SocketAddr;

use tracing::{info, warn};

mod app;
mod auth;
mod config;
mod error;
mod recipes;
mod state;
mod storage;
#[cfg(test)]
mod test_support;
mod users;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipe_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app_state = AppState::init(config).await?;

    provision_admin(&app_state).await?;

    let app = app::build_app(app_state);

    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Creates the configured superuser unless that email is already registered.
async fn provision_admin(state: &AppState) -> anyhow::Result<()> {
    let Some(admin) = state.config.admin.as_ref() else {
        return Ok(());
    };
    match users::service::ensure_superuser(
        state.users.as_ref(),
        &admin.email,
        &admin.password,
        state.config.password_min_length,
    )
    .await
    {
        Ok(Some(user)) => info!(user_id = %user.id, "admin provisioned"),
        Ok(None) => {}
        Err(error::AppError::Internal(e)) => return Err(e),
        Err(e) => warn!(error = %e, "admin provisioning skipped"),
    }
    Ok(())
}
