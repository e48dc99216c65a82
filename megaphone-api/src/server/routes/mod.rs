use crate::server::ServerRouter;
use axum::Router;

mod admin;
mod auth;
mod posts;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(auth::routes())
        .merge(posts::routes())
        .merge(admin::routes())
}
