use anyhow::{Context, Result};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{Level, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use pong_oracle::{
    ApiState, DatabasePool, GameStore, InMemoryTokenLedger, MemoryGameStore, OracleConfig,
    ReferralLedger, RewardSettler, RpcTokenClient, SessionValidator, TokenLedger,
    api::{
        SecurityMiddlewareConfig, SecurityState, auth_middleware, body_size_middleware,
        logging_middleware, rate_limit_middleware, security_headers_middleware,
    },
    config::sanitize_url,
    create_router,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates all scoring and security settings
    let config = OracleConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check PONG_* environment variables.");
        e
    })?;

    init_secure_logging(&config)?;

    info!("Starting PONG Reward Oracle");
    info!(
        "Scoring: growth_rate={}, cap={:?}, max_bounces_per_second={}, max_staleness_ms={}, threshold={}",
        config.scoring.growth_rate,
        config.scoring.multiplier_cap,
        config.scoring.max_bounces_per_second,
        config.scoring.max_staleness_ms,
        config.scoring.minimum_score_threshold
    );

    match (config.database.postgres_enabled, config.chain.enabled) {
        (true, true) => {
            let store = connect_database(&config).await?;
            serve(&config, store, rpc_client(&config)?).await
        }
        (true, false) => {
            let store = connect_database(&config).await?;
            serve(&config, store, in_memory_ledger()).await
        }
        (false, true) => serve(&config, in_memory_store(), rpc_client(&config)?).await,
        (false, false) => serve(&config, in_memory_store(), in_memory_ledger()).await,
    }
}

/// Initialize secure logging with sanitization
fn init_secure_logging(config: &OracleConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_requests {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Secure logging initialized with data sanitization enabled");
    }

    Ok(())
}

async fn connect_database(config: &OracleConfig) -> Result<Arc<DatabasePool>> {
    let pool = DatabasePool::new(
        &config.database.postgres_url,
        config.database.max_connections,
    )
    .await
    .map_err(|e| anyhow::anyhow!(e))?;
    pool.init_schema().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(Arc::new(pool))
}

fn in_memory_store() -> Arc<MemoryGameStore> {
    warn!("PostgreSQL disabled - leaderboard and referrals are kept in memory only");
    Arc::new(MemoryGameStore::new())
}

fn rpc_client(config: &OracleConfig) -> Result<Arc<RpcTokenClient>> {
    info!(
        "Minting through JSON-RPC node at {}",
        sanitize_url(&config.chain.rpc_url)
    );
    let client = RpcTokenClient::new(config.chain.to_client_config()?)
        .context("Failed to create token client")?;
    Ok(Arc::new(client))
}

fn in_memory_ledger() -> Arc<InMemoryTokenLedger> {
    warn!("Chain disabled - rewards are minted to an in-memory ledger");
    Arc::new(InMemoryTokenLedger::new())
}

async fn serve<S: GameStore, T: TokenLedger>(
    config: &OracleConfig,
    store: Arc<S>,
    token: Arc<T>,
) -> Result<()> {
    let validator = SessionValidator::new(config.scoring.curve(), config.scoring.limits());
    let settler = RewardSettler::new(validator, config.scoring.policy(), store.clone(), token);
    let referrals = ReferralLedger::new(store.clone(), config.referral.base_url.clone());
    let state = ApiState::new(settler, referrals, store);

    // Initialize security middleware
    let security_state = SecurityState::new(SecurityMiddlewareConfig::from_config(
        config,
        get_api_keys_from_env(),
    ));
    spawn_rate_limit_cleanup(&security_state);

    // Build the application with routes and security middleware
    let app: Router = create_router(state)
        // Apply security middleware layers (order matters!)
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            body_size_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            security_state,
            logging_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("PONG Reward Oracle listening on {}", bind_addr);
    info!(
        "Security middleware: Auth={}, Rate limit={}/min, Max body={}KB",
        config.security.enable_auth,
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Evict stale rate limit windows once a minute
fn spawn_rate_limit_cleanup(security_state: &SecurityState) {
    let limiter = security_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    });
}

/// Load gateway API keys from environment variables
fn get_api_keys_from_env() -> Vec<String> {
    let mut keys = Vec::new();

    if let Ok(key) = std::env::var("PONG_API_KEY")
        && !key.is_empty()
    {
        keys.push(key);
    }

    // Additional API keys (comma-separated)
    if let Ok(extra_keys) = std::env::var("PONG_API_KEYS") {
        keys.extend(
            extra_keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
        );
    }

    if keys.is_empty() {
        warn!("No API keys configured - authentication will fail if enabled");
    } else {
        info!("Loaded {} API key(s) for authentication", keys.len());
    }

    keys
}
