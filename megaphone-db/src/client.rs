use crate::record::{AttachmentRecord, CommentRecord, LikeRecord, PostRecord, UserRecord};
use megaphone_common::model::post::{
    Attachment, Comment, CreatePost, Post, PostMarker, SentimentLabel,
};
use megaphone_common::model::user::{CreateUser, Email, UserMarker};
use megaphone_common::model::{Id, ModelValidationError};
use sqlx::PgPool;
use std::collections::HashMap;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The email address is already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Outcome of a like toggle: the new count and whether the caller's like is
/// now active.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct LikeOutcome {
    pub likes: u64,
    pub liked: bool,
}

#[derive(Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn email_taken(&self, email: &Email) -> Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)",
        )
        .bind(email.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    /// Inserts a new user. The unique index on email is the authoritative
    /// duplicate check; a violation maps to [`DbError::DuplicateEmail`].
    pub async fn create_user(
        &self,
        user: &CreateUser,
        password_hash: &str,
    ) -> Result<Id<UserMarker>> {
        let user_id = sqlx::query_scalar::<_, i64>(
            "
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING user_id
            ",
        )
        .bind(user.name.get())
        .bind(user.email.get())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::DuplicateEmail
            }
            _ => DbError::Sqlx(err),
        })?;

        Ok(user_id.into())
    }

    pub async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "
            SELECT user_id, name, email, password_hash, is_admin
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Inserts the post row and its attachment metadata in one transaction
    /// and returns the stored post.
    pub async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, PostRecord>(
            "
            INSERT INTO posts (title, content, embed_link, is_draft)
            VALUES ($1, $2, $3, $4)
            RETURNING post_id, title, content, embed_link, is_draft, shares, created_at
            ",
        )
        .bind(post.title.as_deref())
        .bind(&post.content)
        .bind(post.embed_link.as_deref())
        .bind(post.is_draft)
        .fetch_one(&mut *tx)
        .await?;

        for (position, attachment) in post.attachments.iter().enumerate() {
            sqlx::query(
                "
                INSERT INTO attachments
                    (post_id, position, stored_name, original_name, media_type, size_bytes, path)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(record.post_id)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(&attachment.stored_name)
            .bind(&attachment.original_name)
            .bind(&attachment.media_type)
            .bind(attachment.size_bytes.cast_signed())
            .bind(&attachment.path)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Post {
            id: record.post_id.into(),
            title: record.title,
            content: record.content,
            embed_link: record.embed_link,
            attachments: post.attachments.clone(),
            is_draft: record.is_draft,
            likes: 0,
            liked_by: Vec::new(),
            shares: record.shares.cast_unsigned(),
            comments: Vec::new(),
            created_at: record.created_at.to_utc(),
        })
    }

    /// All posts, newest first, with comments, attachments and like state.
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let post_records = sqlx::query_as::<_, PostRecord>(
            "
            SELECT post_id, title, content, embed_link, is_draft, shares, created_at
            FROM posts
            ORDER BY created_at DESC, post_id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let comment_records = sqlx::query_as::<_, CommentRecord>(
            "
            SELECT post_id, username, body, sentiment, created_at
            FROM comments
            ORDER BY comment_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let attachment_records = sqlx::query_as::<_, AttachmentRecord>(
            "
            SELECT post_id, stored_name, original_name, media_type, size_bytes, path
            FROM attachments
            ORDER BY post_id, position
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let like_records = sqlx::query_as::<_, LikeRecord>(
            "SELECT post_id, user_id FROM post_likes ORDER BY post_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut comments_by_post: HashMap<i64, Vec<Comment>> = HashMap::new();
        for record in comment_records {
            let post_id = record.post_id;
            comments_by_post
                .entry(post_id)
                .or_default()
                .push(Comment::try_from(record)?);
        }

        let mut attachments_by_post: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for record in attachment_records {
            attachments_by_post
                .entry(record.post_id)
                .or_default()
                .push(record.into());
        }

        let mut likers_by_post: HashMap<i64, Vec<Id<UserMarker>>> = HashMap::new();
        for record in like_records {
            likers_by_post
                .entry(record.post_id)
                .or_default()
                .push(record.user_id.into());
        }

        let posts = post_records
            .into_iter()
            .map(|record| {
                let liked_by = likers_by_post.remove(&record.post_id).unwrap_or_default();

                Post {
                    id: record.post_id.into(),
                    title: record.title,
                    content: record.content,
                    embed_link: record.embed_link,
                    attachments: attachments_by_post.remove(&record.post_id).unwrap_or_default(),
                    is_draft: record.is_draft,
                    likes: liked_by.len() as u64,
                    liked_by,
                    shares: record.shares.cast_unsigned(),
                    comments: comments_by_post.remove(&record.post_id).unwrap_or_default(),
                    created_at: record.created_at.to_utc(),
                }
            })
            .collect();

        Ok(posts)
    }

    pub async fn post_exists(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE post_id = $1)",
        )
        .bind(post_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Toggles the caller's like inside one transaction, so concurrent
    /// toggles from different users cannot lose updates. The count is the
    /// row count of the liker set by construction.
    ///
    /// Returns `None` when the post does not exist.
    pub async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<LikeOutcome>> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE post_id = $1)",
        )
        .bind(post_id.get())
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id.get())
            .bind(user_id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = removed == 0;
        if liked {
            sqlx::query(
                "
                INSERT INTO post_likes (post_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(post_id.get())
            .bind(user_id.get())
            .execute(&mut *tx)
            .await?;
        }

        let likes = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM post_likes WHERE post_id = $1",
        )
        .bind(post_id.get())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(LikeOutcome {
            likes: likes.cast_unsigned(),
            liked,
        }))
    }

    /// Appends a comment. Existence check and insert are one statement, so
    /// the append is atomic with respect to concurrent deletes.
    ///
    /// Returns `false` when the post does not exist.
    pub async fn add_comment(
        &self,
        post_id: Id<PostMarker>,
        username: &str,
        body: &str,
        sentiment: SentimentLabel,
    ) -> Result<bool> {
        let inserted = sqlx::query(
            "
            INSERT INTO comments (post_id, username, body, sentiment)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (SELECT 1 FROM posts WHERE post_id = $1)
            ",
        )
        .bind(post_id.get())
        .bind(username)
        .bind(body)
        .bind(sentiment.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    /// Unconditional share increment as a single atomic update.
    ///
    /// Returns the new count, or `None` when the post does not exist.
    pub async fn increment_shares(&self, post_id: Id<PostMarker>) -> Result<Option<u64>> {
        let shares = sqlx::query_scalar::<_, i64>(
            "UPDATE posts SET shares = shares + 1 WHERE post_id = $1 RETURNING shares",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(shares.map(i64::cast_unsigned))
    }

    /// Comment bodies of a post in insertion order, for summarization.
    ///
    /// Returns `None` when the post does not exist.
    pub async fn fetch_comment_bodies(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Option<Vec<String>>> {
        if !self.post_exists(post_id).await? {
            return Ok(None);
        }

        let bodies = sqlx::query_scalar::<_, String>(
            "SELECT body FROM comments WHERE post_id = $1 ORDER BY comment_id",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(bodies))
    }

    /// Deletes a post; comments and attachment metadata cascade. The stored
    /// attachment bytes are not cleaned up. Existence is checked explicitly
    /// first rather than inferred from the delete count.
    ///
    /// Returns `false` when the post does not exist.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        if !self.post_exists(post_id).await? {
            return Ok(false);
        }

        sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(true)
    }
}
