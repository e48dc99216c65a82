use megaphone_common::model::ModelValidationError;
use megaphone_common::model::post::{Attachment, Comment, CommentText, SentimentLabel};
use megaphone_common::model::user::{Email, User, UserName};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Full user row, password hash included. Only the auth path sees this;
/// everything else converts to [`User`] which drops the hash.
#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Clone, PartialEq, Debug, FromRow)]
pub struct PostRecord {
    pub post_id: i64,
    pub title: Option<String>,
    pub content: String,
    pub embed_link: Option<String>,
    pub is_draft: bool,
    pub shares: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, PartialEq, Debug, FromRow)]
pub struct CommentRecord {
    pub post_id: i64,
    pub username: String,
    pub body: String,
    pub sentiment: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub struct AttachmentRecord {
    pub post_id: i64,
    pub stored_name: String,
    pub original_name: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub path: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, FromRow)]
pub struct LikeRecord {
    pub post_id: i64,
    pub user_id: i64,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            name: UserName::new(value.name)?,
            email: Email::new(value.email)?,
            is_admin: value.is_admin,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            username: value.username,
            comment: CommentText::new(value.body)?,
            // Anything unrecognized in storage counts as neutral.
            sentiment: value.sentiment.parse::<SentimentLabel>().unwrap_or_default(),
            timestamp: value.created_at.to_utc(),
        })
    }
}

impl From<AttachmentRecord> for Attachment {
    fn from(value: AttachmentRecord) -> Self {
        Self {
            stored_name: value.stored_name,
            original_name: value.original_name,
            media_type: value.media_type,
            size_bytes: value.size_bytes.cast_unsigned(),
            path: value.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::record::CommentRecord;
    use megaphone_common::model::post::{Comment, SentimentLabel};
    use time::macros::datetime;

    #[test]
    fn unknown_stored_sentiment_becomes_neutral() {
        let record = CommentRecord {
            post_id: 1,
            username: "someone".to_owned(),
            body: "interesting".to_owned(),
            sentiment: "enraged".to_owned(),
            created_at: datetime!(2025-06-01 12:00 UTC),
        };

        let comment = Comment::try_from(record).unwrap();
        assert_eq!(comment.sentiment, SentimentLabel::Neutral);
    }

    #[test]
    fn empty_stored_body_is_invalid() {
        let record = CommentRecord {
            post_id: 1,
            username: "someone".to_owned(),
            body: String::new(),
            sentiment: "neutral".to_owned(),
            created_at: datetime!(2025-06-01 12:00 UTC),
        };

        assert!(Comment::try_from(record).is_err());
    }
}
