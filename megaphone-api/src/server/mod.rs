use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use megaphone_common::model::{
    Id,
    auth::{PasswordHashError, TokenIssueError, TokenSigner, TokenVerifyError},
    post::PostMarker,
};
use megaphone_db::client::{DbClient, DbError};
use sentiment::SentimentClassifier;
use serde::Serialize;
use std::sync::Arc;
use summary::{CommentSummarizer, SummarizeError};
use thiserror::Error;
use tracing::error;
use upload::{UploadError, UploadStore};

pub mod auth;
mod json;
mod routes;
pub mod sentiment;
pub mod summary;
pub mod upload;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub token_signer: Arc<TokenSigner>,
    pub admin_bypass: Arc<auth::AdminBypass>,
    pub classifier: Arc<SentimentClassifier>,
    pub summarizer: Arc<CommentSummarizer>,
    pub uploads: Arc<UploadStore>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Incoming multipart form rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Reading multipart form failed: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error(transparent)]
    InvalidToken(#[from] TokenVerifyError),
    #[error("Admin privileges are required")]
    AdminRequired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Post with id {0} was not found")]
    PostByIdNotFound(Id<PostMarker>),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error("Signing token failed: {0}")]
    TokenIssue(#[from] TokenIssueError),
    #[error("Hashing password failed: {0}")]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for ServerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateEmail => ServerError::DuplicateEmail,
            other => ServerError::Database(other),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidToken(_)
            | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::AdminRequired => StatusCode::FORBIDDEN,
            ServerError::JsonRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_)
            | ServerError::Validation(_)
            | ServerError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ServerError::Upload(err) => err.status(),
            ServerError::Summarize(_)
            | ServerError::JsonResponse(_)
            | ServerError::TokenIssue(_)
            | ServerError::PasswordHash(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to clients. Server-side failures keep their
    /// detail in the logs only.
    fn public_message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            match self {
                ServerError::Summarize(SummarizeError::MissingCredentials) => {
                    "Summarization service is not configured".to_owned()
                }
                ServerError::Summarize(_) => "Summarization failed".to_owned(),
                _ => "Internal server error".to_owned(),
            }
        } else {
            self.to_string()
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}
