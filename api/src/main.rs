// ============================================================================
// USERS & POSTS API - standalone server or serverless function
// ============================================================================

// - Users and posts CRUD over PostgreSQL
// - Queue deliveries and HTTP events through one function entry point
// - SES / SQS diagnostics endpoints
// - CORS configuration
// - Structured logging

use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::{Credentials, Region};
use blog_api::{
    AppState, build_router,
    config::{Config, DatabaseConfig, RunMode},
    db::{MemoryStore, PgStore, Store},
    dispatch::{self, Dispatcher},
    notify::{NotificationGateway, SesMailer, SqsSender},
    queue::QueueRegistry,
};
use std::{error::Error, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn Error + Send + Sync>;

fn init_logging(mode: RunMode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    match mode {
        RunMode::Server => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init(),
        RunMode::Function => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .without_time()
            .json()
            .init(),
    }
}

async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, BoxError> {
    match config {
        DatabaseConfig::Postgres {
            url,
            max_connections,
            migrate,
        } => {
            let store = PgStore::connect(url, *max_connections).await?;
            if *migrate {
                store.migrate().await?;
            }
            info!("Connected to PostgreSQL");
            Ok(Arc::new(store))
        }
        DatabaseConfig::Memory => {
            warn!("Using the in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn load_aws(config: &Config) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));
    if let Some(credentials) = &config.credentials {
        loader = loader.credentials_provider(Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            "environment",
        ));
    }
    loader.load().await
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    init_logging(config.mode);

    let store = connect_store(&config.database).await?;

    let aws = load_aws(&config).await;
    let queues = Arc::new(QueueRegistry::with_default_queue(config.queue_url.clone()));
    let notifications = NotificationGateway::new(
        Arc::new(SesMailer::new(&aws, config.from_email.clone())),
        Arc::new(SqsSender::new(&aws)),
        queues.clone(),
    );

    let state = AppState::new(store, notifications);
    let app = build_router(state, &config.cors_origins);

    match config.mode {
        RunMode::Function => {
            info!("Starting function runtime");
            dispatch::run(Dispatcher::new(app, queues)).await?;
        }
        RunMode::Server => {
            let addr = format!("0.0.0.0:{}", config.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            info!("Server running on http://{}", addr);
            info!("API Endpoints:");
            info!("  GET    /                      - Health check");
            info!("  GET    /api/users             - List users");
            info!("  POST   /api/users             - Create user");
            info!("  GET    /api/users/:id         - Get user");
            info!("  PUT    /api/users/:id         - Update user");
            info!("  DELETE /api/users/:id         - Delete user");
            info!("  GET    /api/posts             - List posts with authors");
            info!("  POST   /api/posts             - Create post");
            info!("  GET    /api/posts/:id         - Get post");
            info!("  GET    /api/posts/user/:id    - List posts by author");
            info!("  PUT    /api/posts/:id         - Update post");
            info!("  DELETE /api/posts/:id         - Delete post");
            info!("  POST   /api/tests/send-mail   - Send a test email");
            info!("  POST   /api/tests/send-sqs    - Enqueue a test message");

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
