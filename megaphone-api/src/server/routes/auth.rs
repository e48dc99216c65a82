use crate::server::{Result, ServerError, ServerRouter, ServerState, auth::AdminBypass, json::Json};
use axum::{Router, extract::State, http::StatusCode};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar},
    routing::{RouterExt, TypedPath},
};
use megaphone_common::model::auth::{TokenSigner, hash_password, verify_password};
use megaphone_common::model::user::{CreateUser, Email};
use megaphone_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub fn routes() -> ServerRouter {
    Router::new().typed_post(register).typed_post(login)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct TokenResponse {
    message: String,
    token: String,
}

#[axum::debug_handler(state = ServerState)]
async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    State(signer): State<Arc<TokenSigner>>,
    Json(body): Json<CreateUser>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    if body.password.is_empty() {
        return Err(ServerError::Validation(
            "Name, email, and password are required".to_owned(),
        ));
    }

    // The unique index still backstops this check under concurrent
    // registrations.
    if db.email_taken(&body.email).await? {
        return Err(ServerError::DuplicateEmail);
    }

    let password_hash = hash_password(&body.password)?;
    let user_id = db.create_user(&body, &password_hash).await?;

    let token = signer.issue(user_id, body.name.into_inner(), false)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            message: "User registered successfully".to_owned(),
            token,
        }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/login", rejection(ServerError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[axum::debug_handler(state = ServerState)]
async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(signer): State<Arc<TokenSigner>>,
    State(bypass): State<Arc<AdminBypass>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>)> {
    if body.email.is_empty() || body.password.is_empty() {
        return Err(ServerError::Validation(
            "Email and password are required".to_owned(),
        ));
    }

    let token = if bypass.matches(&body.email, &body.password) {
        warn!("Admin bypass credentials used for login");
        signer.issue(0.into(), "Admin".to_owned(), true)?
    } else {
        // A malformed email address cannot match a stored user, so it gets
        // the same response as an unknown one.
        let email = Email::new(body.email).map_err(|_| ServerError::InvalidCredentials)?;

        let user = db
            .fetch_user_by_email(&email)
            .await?
            .ok_or(ServerError::InvalidCredentials)?;

        if !verify_password(&body.password, &user.password_hash) {
            return Err(ServerError::InvalidCredentials);
        }

        signer.issue(user.user_id.into(), user.name, user.is_admin)?
    };

    let jar = jar.add(
        Cookie::build(("token", token.clone()))
            .path("/")
            .http_only(true)
            .build(),
    );

    Ok((
        jar,
        Json(TokenResponse {
            message: "Login successful".to_owned(),
            token,
        }),
    ))
}
