use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use energy_adapter::api::{self, AppState};
use energy_adapter::cache::{LocalCache, TieredCache, TokenCache};
use energy_adapter::cli;
use energy_adapter::config::{self, Config};
use energy_adapter::coordinator::Coordinator;
use energy_adapter::jobs;
use energy_adapter::provider::auth::AuthClient;
use energy_adapter::provider::client::HttpProviderClient;
use energy_adapter::store::postgres::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse first so --help and --version work without any environment.
    let args = cli::Cli::parse();

    config::load_env_file();
    init_tracing(config::json_logs());

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => serve(port).await,
        Some(cli::Commands::Migrate) => run_migrations().await,
        Some(cli::Commands::Auth { command }) => handle_auth_command(command).await,
        None => serve(None).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let cfg = config::load()?;
    let port = port.unwrap_or(cfg.port);
    run_server(cfg, port).await
}

async fn run_migrations() -> anyhow::Result<()> {
    let db = PgStore::connect(&config::load_database_url()?).await?;
    db.migrate().await?;
    println!("Migrations applied.");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "energy_adapter=debug,tower_http=debug".into()),
    );
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting energy provider adapter");

    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    tracing::info!("Connecting to Redis...");
    let redis_client = redis::Client::open(cfg.redis_url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let cache = Arc::new(TieredCache::new(redis_conn));
    tracing::info!("Connected to Redis successfully");

    jobs::cache_sweep::spawn(cache.local().clone(), Duration::from_secs(60));

    let token_cache: Arc<dyn TokenCache> = cache.clone();
    let auth = Arc::new(AuthClient::new(
        &cfg.provider.client_id,
        &cfg.provider.client_secret,
        &cfg.provider.oauth_url,
        token_cache,
    )?);
    let provider = Arc::new(HttpProviderClient::new(&cfg.provider.api_url)?);

    let coordinator = Coordinator::new(auth, provider, Arc::new(db.clone()), cfg.timeouts());
    let state = Arc::new(AppState { coordinator });

    let readiness_db = db.clone();
    let readiness_cache = cache.clone();

    let app = axum::Router::new()
        // Health endpoints
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/readyz",
            get(move || readiness_check(readiness_db.clone(), readiness_cache.clone())),
        )
        .nest("/api/v1", api::api_router().with_state(state))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Adapter listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
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
    tracing::info!("Shutting down server gracefully");
}

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with adapter logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn readiness_check(db: PgStore, cache: Arc<TieredCache>) -> (StatusCode, &'static str) {
    if let Err(e) = db.ping().await {
        tracing::warn!(error = %e, "readiness: database unreachable");
        return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable");
    }
    let mut conn = cache.redis();
    if let Err(e) = redis::cmd("PING").query_async::<_, String>(&mut conn).await {
        tracing::warn!(error = %e, "readiness: redis unreachable");
        return (StatusCode::SERVICE_UNAVAILABLE, "redis unavailable");
    }
    (StatusCode::OK, "ok")
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    // Link sessions and device data must not be cached by intermediaries
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.remove("Server");

    resp
}

async fn handle_auth_command(cmd: cli::AuthCommands) -> anyhow::Result<()> {
    match cmd {
        cli::AuthCommands::Check => {
            let provider = config::load_provider()?;
            // A throwaway local cache: the check must not disturb the shared token.
            let auth = AuthClient::new(
                &provider.client_id,
                &provider.client_secret,
                &provider.oauth_url,
                Arc::new(LocalCache::new()),
            )?;
            let token = auth.exchange().await?;
            println!("Authentication succeeded:");
            println!("  Token type: {}", token.token_type);
            println!("  Scope:      {}", token.scope);
            println!("  Expires in: {}s", token.expires_in);
            println!("  Cache TTL:  {}s", token.cache_ttl().as_secs());
        }
    }
    Ok(())
}
