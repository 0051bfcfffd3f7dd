use rbac_portal::{
    AppState, PostgresDirectory, SupabaseSessionProvider,
    config::{AppConfig, Env},
    create_router,
    directory::DirectoryState,
    repository::{PostgresRepository, RepositoryState},
    session::SessionState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, session provider, then the
/// HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging filter: RUST_LOG wins, otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rbac_portal=debug,tower_http=info".into());

    // 3. Log format per environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database (users table and dashboard data share one pool)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;
    let directory = Arc::new(PostgresDirectory::new(pool)) as DirectoryState;

    // 5. Session provider. Missing credentials disable route authorization.
    let session = match config.session_credentials() {
        Some(credentials) => {
            let provider = SupabaseSessionProvider::new(credentials, &config.jwt_secret)
                .expect("FATAL: Failed to build the Supabase Auth client.");
            Some(Arc::new(provider) as SessionState)
        }
        None => {
            tracing::warn!(
                "SUPABASE_URL or SUPABASE_ANON_KEY not set: route authorization is DISABLED"
            );
            None
        }
    };

    // 6. State assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        directory,
        session,
        config,
    };

    // 7. Router and server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/api/docs", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}
