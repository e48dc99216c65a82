use crate::server::ServerState;
use megaphone_common::model::auth::TokenSigner;
use megaphone_db::client::{DbClient, DbError};
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

use server::{
    auth::AdminBypass, sentiment::SentimentClassifier, summary::CommentSummarizer,
    upload::UploadStore,
};

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to database: {0}")]
    DbConnect(sqlx::Error),
    #[error("Error preparing database: {0}")]
    DbMigrate(#[from] DbError),
    #[error("Error creating upload directory: {0}")]
    UploadDir(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    jwt_secret: String,
    admin_email: String,
    admin_password: String,
    #[serde(default = "default_upload_dir")]
    upload_dir: PathBuf,
    #[serde(default = "default_python_command")]
    classifier_command: String,
    classifier_script: PathBuf,
    #[serde(default = "default_python_command")]
    summarizer_command: String,
    summarizer_script: PathBuf,
    summarizer_api_key: Option<String>,
    #[serde(default = "default_external_timeout_secs")]
    external_timeout_secs: u64,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("public/uploads")
}

fn default_python_command() -> String {
    "python3".to_owned()
}

fn default_external_timeout_secs() -> u64 {
    30
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "megaphone_api=debug,\
                megaphone_common=debug,\
                megaphone_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let pool = PgPoolOptions::new()
        .connect(&env.database_url)
        .await
        .map_err(InitError::DbConnect)?;
    let db_client = Arc::new(DbClient::new(pool));
    db_client.run_migrations().await?;

    tokio::fs::create_dir_all(&env.upload_dir)
        .await
        .map_err(InitError::UploadDir)?;

    let external_timeout = Duration::from_secs(env.external_timeout_secs);
    let state = ServerState {
        db_client,
        token_signer: Arc::new(TokenSigner::new(env.jwt_secret.as_bytes())),
        admin_bypass: Arc::new(AdminBypass::new(env.admin_email, env.admin_password)),
        classifier: Arc::new(SentimentClassifier::new(
            env.classifier_command,
            env.classifier_script,
            external_timeout,
        )),
        summarizer: Arc::new(CommentSummarizer::new(
            env.summarizer_command,
            env.summarizer_script,
            env.summarizer_api_key,
            external_timeout,
        )),
        uploads: Arc::new(UploadStore::new(env.upload_dir.clone())),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes()
        .nest_service("/uploads", ServeDir::new(&env.upload_dir))
        .with_state(state)
        .layer(tracing_layer);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
