use crate::model::{Id, user::UserMarker};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: Option<String>,
    pub content: String,
    pub embed_link: Option<String>,
    pub attachments: Vec<Attachment>,
    pub is_draft: bool,
    pub likes: u64,
    pub liked_by: Vec<Id<UserMarker>>,
    pub shares: u64,
    pub comments: Vec<Comment>,
    pub created_at: UtcDateTime,
}

/// Validated input for admin post creation. `content` is already resolved
/// here: when the submitted content was empty but files were attached, the
/// placeholder from [`placeholder_content`] has been substituted.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub title: Option<String>,
    pub content: String,
    pub embed_link: Option<String>,
    pub is_draft: bool,
    pub attachments: Vec<Attachment>,
}

/// Stand-in content for posts submitted with files but no text.
#[must_use]
pub fn placeholder_content(file_count: usize) -> String {
    format!("Shared {file_count} file(s)")
}

/// Attachment metadata. The bytes themselves live in the upload directory
/// under `stored_name`; only this record is persisted with the post.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub stored_name: String,
    pub original_name: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub path: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Comment {
    pub username: String,
    pub comment: CommentText,
    pub sentiment: SentimentLabel,
    pub timestamp: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The comment text is empty")]
pub struct EmptyCommentError;

impl CommentText {
    pub fn new(text: String) -> Result<Self, EmptyCommentError> {
        if text.trim().is_empty() {
            Err(EmptyCommentError)
        } else {
            Ok(CommentText(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for CommentText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentText::new(inner)
            .map_err(|_| Error::invalid_value(Unexpected::Str(""), &"non-empty comment text"))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    #[default]
    Neutral,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unrecognized sentiment label: {0:?}")]
pub struct UnknownSentimentError(String);

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = UnknownSentimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            other => Err(UnknownSentimentError(other.to_owned())),
        }
    }
}

impl Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-label comment counts for the dashboard.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct SentimentTally {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl SentimentTally {
    pub fn record(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Negative => self.negative += 1,
            SentimentLabel::Neutral => self.neutral += 1,
        }
    }

    #[must_use]
    pub fn total(self) -> u64 {
        self.positive + self.negative + self.neutral
    }
}

/// Tallies sentiment labels across every comment of the given posts.
/// Read-only; labels that failed classification were already stored as
/// neutral, so every comment counts exactly once.
#[must_use]
pub fn aggregate_sentiment<'a>(posts: impl IntoIterator<Item = &'a Post>) -> SentimentTally {
    let mut tally = SentimentTally::default();
    for post in posts {
        for comment in &post.comments {
            tally.record(comment.sentiment);
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use crate::model::post::{
        Comment, CommentText, Post, SentimentLabel, aggregate_sentiment, placeholder_content,
    };
    use std::str::FromStr;
    use time::{UtcDateTime, macros::utc_datetime};

    const TEST_TIME: UtcDateTime = utc_datetime!(2025-06-01 12:00);

    fn comment(label: SentimentLabel) -> Comment {
        Comment {
            username: "someone".to_owned(),
            comment: CommentText::new("a comment".to_owned()).unwrap(),
            sentiment: label,
            timestamp: TEST_TIME,
        }
    }

    fn post_with(comments: Vec<Comment>) -> Post {
        Post {
            id: 1.into(),
            title: None,
            content: "content".to_owned(),
            embed_link: None,
            attachments: Vec::new(),
            is_draft: false,
            likes: 0,
            liked_by: Vec::new(),
            shares: 0,
            comments,
            created_at: TEST_TIME,
        }
    }

    #[test]
    fn sentiment_label_round_trip() {
        for label in [
            SentimentLabel::Positive,
            SentimentLabel::Negative,
            SentimentLabel::Neutral,
        ] {
            assert_eq!(SentimentLabel::from_str(label.as_str()), Ok(label));
        }

        assert!(SentimentLabel::from_str("ecstatic").is_err());
        assert!(SentimentLabel::from_str("Positive").is_err());
    }

    #[test]
    fn unrecognized_labels_default_to_neutral() {
        assert_eq!(
            SentimentLabel::from_str("???").unwrap_or_default(),
            SentimentLabel::Neutral
        );
    }

    #[test]
    fn comment_text_rejects_empty() {
        assert!(CommentText::new(String::new()).is_err());
        assert!(CommentText::new("  \t ".to_owned()).is_err());
        assert!(CommentText::new("great!".to_owned()).is_ok());
    }

    #[test]
    fn placeholder_names_file_count() {
        assert_eq!(placeholder_content(1), "Shared 1 file(s)");
        assert_eq!(placeholder_content(3), "Shared 3 file(s)");
    }

    #[test]
    fn aggregation_tallies_across_posts() {
        let posts = [
            post_with(vec![
                comment(SentimentLabel::Positive),
                comment(SentimentLabel::Positive),
                comment(SentimentLabel::Negative),
            ]),
            post_with(vec![comment(SentimentLabel::Neutral)]),
            post_with(Vec::new()),
        ];

        let tally = aggregate_sentiment(&posts);
        assert_eq!(tally.positive, 2);
        assert_eq!(tally.negative, 1);
        assert_eq!(tally.neutral, 1);
        assert_eq!(tally.total(), 4);
    }

    #[test]
    fn sentiment_serializes_lowercase() {
        let json = serde_json::to_string(&SentimentLabel::Positive).unwrap();
        assert_eq!(json, "\"positive\"");
    }
}
