use crate::server::{
    Result, ServerError, ServerRouter, ServerState,
    auth::{AdminUser, AuthenticatedUser},
    json::Json,
    sentiment::SentimentClassifier,
    summary::CommentSummarizer,
};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use megaphone_common::model::{
    Id,
    post::{CommentText, Post, PostMarker, SentimentLabel},
};
use megaphone_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(list_posts)
        .typed_post(like_post)
        .typed_post(comment_post)
        .typed_post(share_post)
        .typed_get(post_summary)
        .typed_delete(delete_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct ListPostsPath();

/// Public listing, newest first. Drafts are not filtered here; the admin
/// frontend relies on seeing them.
#[axum::debug_handler(state = ServerState)]
async fn list_posts(
    ListPostsPath(): ListPostsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Post>>> {
    let posts = db.list_posts().await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct LikePostPath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
struct LikeResponse {
    likes: u64,
    liked: bool,
}

#[axum::debug_handler(state = ServerState)]
async fn like_post(
    LikePostPath { id }: LikePostPath,
    user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<LikeResponse>> {
    let outcome = db
        .toggle_like(id, user.user_id())
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(LikeResponse {
        likes: outcome.likes,
        liked: outcome.liked,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment", rejection(ServerError))]
struct CommentPostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CommentRequest {
    username: String,
    comment: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct CommentResponse {
    message: String,
    sentiment: SentimentLabel,
}

#[axum::debug_handler(state = ServerState)]
async fn comment_post(
    CommentPostPath { id }: CommentPostPath,
    _user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    State(classifier): State<Arc<SentimentClassifier>>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<CommentResponse>> {
    let comment = CommentText::new(body.comment)
        .map_err(|err| ServerError::Validation(err.to_string()))?;

    // Classification is best-effort enrichment; the comment is stored either
    // way.
    let sentiment = classifier.classify_or_neutral(comment.get()).await;

    let appended = db
        .add_comment(id, &body.username, comment.get(), sentiment)
        .await?;
    if !appended {
        return Err(ServerError::PostByIdNotFound(id));
    }

    Ok(Json(CommentResponse {
        message: "comment added".to_owned(),
        sentiment,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/share", rejection(ServerError))]
struct SharePostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ShareResponse {
    message: String,
}

/// Shares are a plain counter; repeated shares by the same user all count.
#[axum::debug_handler(state = ServerState)]
async fn share_post(
    SharePostPath { id }: SharePostPath,
    _user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<ShareResponse>> {
    db.increment_shares(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(ShareResponse {
        message: "post shared".to_owned(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/summary", rejection(ServerError))]
struct PostSummaryPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct SummaryResponse {
    summary: String,
}

#[axum::debug_handler(state = ServerState)]
async fn post_summary(
    PostSummaryPath { id }: PostSummaryPath,
    _user: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    State(summarizer): State<Arc<CommentSummarizer>>,
) -> Result<Json<SummaryResponse>> {
    let bodies = db
        .fetch_comment_bodies(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    let summary = summarizer.summarize(&bodies).await?;

    Ok(Json(SummaryResponse { summary }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct DeleteResponse {
    success: bool,
    message: String,
    #[serde(rename = "postId")]
    post_id: Id<PostMarker>,
}

#[axum::debug_handler(state = ServerState)]
async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    admin: AdminUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<DeleteResponse>> {
    let deleted = db.delete_post(id).await?;
    if !deleted {
        return Err(ServerError::PostByIdNotFound(id));
    }

    info!(admin = admin.0.name(), %id, "Deleted post");

    Ok(Json(DeleteResponse {
        success: true,
        message: "post deleted".to_owned(),
        post_id: id,
    }))
}
