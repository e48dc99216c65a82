use std::{path::PathBuf, string::FromUtf8Error, time::Duration};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Canned response when there is nothing worth sending to the summarizer.
pub const NO_COMMENTS_MESSAGE: &str = "No comments to summarize.";

/// Prefixes the summarizer script prints on stdout when it failed internally
/// despite exiting zero.
const FAILURE_PREFIXES: [&str; 2] = ["Error", "Failed to generate summary"];

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("The summarizer API key is not configured")]
    MissingCredentials,
    #[error("Spawning the summarizer failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serializing comments failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("The summarizer exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("The summarizer reported: {0}")]
    Reported(String),
    #[error("The summarizer produced non-UTF-8 output: {0}")]
    Output(#[from] FromUtf8Error),
    #[error("The summarizer timed out")]
    Timeout,
}

/// Glue around the external comment summarizer. Comment texts go over as a
/// JSON array in a temp file; stdout is the summary.
#[derive(Debug)]
pub struct CommentSummarizer {
    command: String,
    script: PathBuf,
    api_key: Option<String>,
    timeout: Duration,
}

impl CommentSummarizer {
    #[must_use]
    pub fn new(
        command: String,
        script: PathBuf,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            command,
            script,
            api_key,
            timeout,
        }
    }

    /// Summarizes the given comment bodies. Bodies that are empty after
    /// trimming are dropped first; if nothing remains the canned message is
    /// returned without spawning the summarizer at all.
    pub async fn summarize(&self, bodies: &[String]) -> Result<String, SummarizeError> {
        let filtered: Vec<&str> = bodies
            .iter()
            .map(String::as_str)
            .filter(|body| !body.trim().is_empty())
            .collect();

        if filtered.is_empty() {
            debug!("No usable comments, skipping summarizer call");
            return Ok(NO_COMMENTS_MESSAGE.to_owned());
        }

        let Some(api_key) = &self.api_key else {
            return Err(SummarizeError::MissingCredentials);
        };

        let temp_file = tempfile::NamedTempFile::new()?;
        std::fs::write(temp_file.path(), serde_json::to_vec(&filtered)?)?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.command)
                .arg(&self.script)
                .arg(temp_file.path())
                .env("GEMINI_API_KEY", api_key)
                .output(),
        )
        .await
        .map_err(|_| SummarizeError::Timeout)??;

        if !output.status.success() {
            return Err(SummarizeError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let summary = String::from_utf8(output.stdout)?.trim().to_owned();
        if FAILURE_PREFIXES
            .iter()
            .any(|prefix| summary.starts_with(prefix))
        {
            return Err(SummarizeError::Reported(summary));
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::server::summary::{CommentSummarizer, NO_COMMENTS_MESSAGE, SummarizeError};
    use std::{path::PathBuf, time::Duration};

    fn summarizer(api_key: Option<&str>) -> CommentSummarizer {
        // A nonexistent command, so any test that passes the short-circuit
        // checks would fail loudly if it tried to spawn.
        CommentSummarizer::new(
            "this-command-does-not-exist".to_owned(),
            PathBuf::from("nowhere.py"),
            api_key.map(str::to_owned),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn no_comments_short_circuits() {
        let summary = summarizer(Some("key")).summarize(&[]).await.unwrap();
        assert_eq!(summary, NO_COMMENTS_MESSAGE);
    }

    #[tokio::test]
    async fn whitespace_only_comments_short_circuit() {
        let bodies = vec!["   ".to_owned(), "\t\n".to_owned()];
        let summary = summarizer(Some("key")).summarize(&bodies).await.unwrap();
        assert_eq!(summary, NO_COMMENTS_MESSAGE);
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let bodies = vec!["great product".to_owned()];
        let result = summarizer(None).summarize(&bodies).await;
        assert!(matches!(result, Err(SummarizeError::MissingCredentials)));
    }

    #[tokio::test]
    async fn spawn_failure_surfaces() {
        let bodies = vec!["great product".to_owned()];
        let result = summarizer(Some("key")).summarize(&bodies).await;
        assert!(matches!(result, Err(SummarizeError::Io(_))));
    }
}
