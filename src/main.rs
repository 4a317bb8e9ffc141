use dogether_auth::{
    build_router,
    config::{validate_production_config, AppConfig},
    db,
    middleware::with_request_timeout,
    repositories::SqliteUserRepository,
    services::{create_notifier, AuthService, CredentialHasher, TokenService},
    AppState,
};

use axum::http::{header, HeaderValue, Method};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dogether_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    validate_production_config();
    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    // Database connection
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    // Collaborators are built once here and shared read-only by every request
    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let token_service = Arc::new(TokenService::new(&config.jwt_secret));
    let hasher = CredentialHasher::new(config.hash_cost)?;
    let notifier = create_notifier(config.smtp.as_ref());

    let auth_service = Arc::new(AuthService::new(
        user_repository,
        token_service,
        hasher,
        notifier,
        config.public_base_url.clone(),
    ));

    let app_state = AppState { auth_service };

    let cors_layer = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(&config.frontend_url)?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    let app = with_request_timeout(build_router(app_state), config.request_timeout)
        .layer(cors_layer);

    let addr = SocketAddr::from((config.host, config.port));

    tracing::info!("DoGether auth server running on http://{}", addr);
    tracing::info!("  POST /api/auth/signup");
    tracing::info!("  POST /api/auth/login");
    tracing::info!("  POST /api/auth/verify-email");
    tracing::info!("  POST /api/auth/send-verification");
    tracing::info!("  POST /api/auth/refresh");
    tracing::info!("  GET  /api/auth/me");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Draining database pool");
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
