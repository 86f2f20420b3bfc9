use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, bail};
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use graph_config::api::{self, AppState};

/// Graph configuration service
#[derive(Parser, Debug)]
#[command(name = "graph_config_server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Keep everything in process memory instead of Postgres
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1", env = "GRAPH_CONFIG_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "GRAPH_CONFIG_PORT")]
    port: u16,

    /// Upper bound on pooled database connections
    #[arg(long, default_value = "5", env = "GRAPH_CONFIG_MAX_CONNECTIONS")]
    max_connections: u32,

    /// Comma-separated browser origins allowed by CORS
    #[arg(
        long,
        default_value = "http://localhost:3000",
        env = "GRAPH_CONFIG_CORS_ORIGINS"
    )]
    cors_origins: String,
}

fn build_cors_layer(origins: &str) -> anyhow::Result<CorsLayer> {
    let origin_list = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin '{}'", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::info!("CORS: restricted to {} origin(s)", origin_list.len());

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origin_list))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]))
}

async fn build_state(args: &Args) -> anyhow::Result<AppState> {
    if args.in_memory {
        tracing::warn!("Storage: in-memory, nothing survives a restart");
        return Ok(AppState::in_memory());
    }

    let Some(database_url) = args.database_url.as_deref() else {
        bail!("DATABASE_URL is required unless --in-memory is set");
    };

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .context("failed to connect to postgres")?;

    graph_config::db::create_tables(&pool)
        .await
        .context("failed to run graph_config migrations")?;
    tracing::info!("Storage: postgres (max {} connections)", args.max_connections);

    Ok(AppState::postgres(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let bind = format!("{}:{}", args.host, args.port);
    let bind_addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", bind))?;

    let state = build_state(&args).await?;
    let app = Router::new()
        .merge(api::routes::<AppState>())
        .layer(build_cors_layer(&args.cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;
    tracing::info!("graph_config listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .await
        .context("graph_config server failed")
}
