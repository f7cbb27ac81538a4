use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth_session::{
    create_routes, store, AccountService, AppState, Argon2Hasher, AuthConfig,
    AuthenticationGate, Clock, CookiePolicy, JwtProvider, SessionStore, SqliteSessionStore,
    SqliteUserDirectory, Sweepers, SystemClock, TokenProvider, TokenTtl, UserDirectory,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    let config = AuthConfig::from_env()?;
    config.validate()?;

    init_tracing(&config);
    tracing::info!(
        host = %config.host,
        port = config.port,
        environment = ?config.environment,
        "Loaded configuration"
    );

    let pool = store::connect(&config).await?;
    store::ping(&pool).await?;
    store::run_migrations(&pool).await?;
    tracing::info!(db_path = %config.db_path, "Database ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ttl = TokenTtl::from_config(&config);

    let tokens: Arc<dyn TokenProvider> = Arc::new(JwtProvider::from_files(
        &config.private_key_path,
        &config.public_key_path,
        ttl,
        clock.clone(),
    )?);
    tracing::info!("Signing keypair loaded");

    let hasher = Arc::new(Argon2Hasher::from_config(&config)?);
    let sessions: Arc<dyn SessionStore> =
        Arc::new(SqliteSessionStore::new(pool.clone(), clock.clone()));
    let users: Arc<dyn UserDirectory> =
        Arc::new(SqliteUserDirectory::new(pool.clone(), clock.clone()));

    let gate = AuthenticationGate::new(
        tokens.clone(),
        sessions.clone(),
        users.clone(),
        clock.clone(),
    );
    let accounts = AccountService::new(users, sessions.clone(), tokens, hasher, clock);

    let sweepers = Sweepers::spawn(
        sessions,
        Duration::from_secs(config.session_sweep_interval),
        accounts.clone(),
        config.deactivated_retention(),
        Duration::from_secs(config.account_sweep_interval),
    );

    let state = AppState {
        gate,
        accounts,
        cookies: CookiePolicy::new(!config.environment.is_development()),
        ttl,
        db: pool.clone(),
    };

    let app = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(CorsLayer::permissive()),
    );

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped accepting connections, cleaning up");

    sweepers
        .shutdown(Duration::from_secs(config.shutdown_timeout))
        .await;
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing(config: &AuthConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("debug"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.environment.is_development() {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
