use crate::server::{
    Result, ServerError, ServerRouter, ServerState,
    auth::AdminUser,
    json::Json,
    upload::{MAX_FILES, UploadError, UploadStore},
};
use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, State},
    http::StatusCode,
};
use axum_extra::routing::{RouterExt, TypedPath};
use megaphone_common::model::post::{Attachment, CreatePost, Post, placeholder_content};
use megaphone_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// Five files at ten megabytes each, plus room for the form fields.
const BODY_LIMIT_BYTES: usize = 55 * 1024 * 1024;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(create_post)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/posts", rejection(ServerError))]
struct CreatePostPath();

#[derive(FromRequest)]
#[from_request(rejection(ServerError))]
struct MultipartForm(Multipart);

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct CreatePostResponse {
    message: String,
    post: Post,
}

#[axum::debug_handler(state = ServerState)]
async fn create_post(
    CreatePostPath(): CreatePostPath,
    admin: AdminUser,
    State(db): State<Arc<DbClient>>,
    State(uploads): State<Arc<UploadStore>>,
    MultipartForm(mut multipart): MultipartForm,
) -> Result<(StatusCode, Json<CreatePostResponse>)> {
    let mut title = None;
    let mut content = String::new();
    let mut embed_link = None;
    let mut is_draft = false;
    let mut attachments: Vec<Attachment> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("title") => title = non_empty(field.text().await?),
            Some("content") => content = field.text().await?,
            Some("embedLink") => embed_link = non_empty(field.text().await?),
            Some("isDraft") => {
                let value = field.text().await?;
                is_draft = matches!(value.as_str(), "true" | "1" | "on");
            }
            Some("files") => {
                if attachments.len() >= MAX_FILES {
                    return Err(UploadError::TooManyFiles.into());
                }

                let original_name = field
                    .file_name()
                    .unwrap_or("upload")
                    .to_owned();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await?;

                attachments.push(uploads.store(&original_name, &media_type, &bytes).await?);
            }
            _ => {}
        }
    }

    if content.trim().is_empty() {
        if attachments.is_empty() {
            return Err(ServerError::Validation(
                "Content is required, or please upload files".to_owned(),
            ));
        }
        content = placeholder_content(attachments.len());
    }

    let create = CreatePost {
        title,
        content,
        embed_link,
        is_draft,
        attachments,
    };
    let post = db.create_post(&create).await?;

    info!(
        admin = admin.0.name(),
        post_id = %post.id,
        is_draft = post.is_draft,
        attachments = post.attachments.len(),
        "Created post"
    );

    let message = if post.is_draft {
        "Post saved as draft".to_owned()
    } else {
        "Post created successfully".to_owned()
    };

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse { message, post }),
    ))
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::server::routes::admin::non_empty;

    #[test]
    fn non_empty_drops_blank_fields() {
        assert_eq!(non_empty(String::new()), None);
        assert_eq!(non_empty("  ".to_owned()), None);
        assert_eq!(non_empty("a title".to_owned()), Some("a title".to_owned()));
    }
}
