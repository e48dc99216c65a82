use megaphone_common::model::post::{SentimentLabel, UnknownSentimentError};
use std::{path::PathBuf, string::FromUtf8Error, time::Duration};
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Spawning the classifier failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("The classifier exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("The classifier produced non-UTF-8 output: {0}")]
    Output(#[from] FromUtf8Error),
    #[error(transparent)]
    UnknownLabel(#[from] UnknownSentimentError),
    #[error("The classifier timed out")]
    Timeout,
}

/// Glue around the external sentiment classifier: one subprocess call per
/// comment, the comment text handed over through a temp file.
#[derive(Debug)]
pub struct SentimentClassifier {
    command: String,
    script: PathBuf,
    timeout: Duration,
}

impl SentimentClassifier {
    #[must_use]
    pub fn new(command: String, script: PathBuf, timeout: Duration) -> Self {
        Self {
            command,
            script,
            timeout,
        }
    }

    pub async fn classify(&self, text: &str) -> Result<SentimentLabel, ClassifyError> {
        // The guard removes the temp file on every exit path.
        let temp_file = tempfile::NamedTempFile::new()?;
        std::fs::write(temp_file.path(), text)?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.command)
                .arg(&self.script)
                .arg(temp_file.path())
                .output(),
        )
        .await
        .map_err(|_| ClassifyError::Timeout)??;

        if !output.status.success() {
            return Err(ClassifyError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let label = String::from_utf8(output.stdout)?.trim().parse()?;
        Ok(label)
    }

    /// Best-effort classification: any failure degrades to neutral instead
    /// of failing the calling request.
    pub async fn classify_or_neutral(&self, text: &str) -> SentimentLabel {
        match self.classify(text).await {
            Ok(label) => label,
            Err(err) => {
                warn!(error = %err, "Sentiment classification failed, storing neutral");
                SentimentLabel::Neutral
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::sentiment::{ClassifyError, SentimentClassifier};
    use megaphone_common::model::post::SentimentLabel;
    use std::{path::PathBuf, time::Duration};

    fn broken_classifier() -> SentimentClassifier {
        SentimentClassifier::new(
            "this-command-does-not-exist".to_owned(),
            PathBuf::from("nowhere.py"),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn missing_command_is_an_error() {
        let result = broken_classifier().classify("great!").await;
        assert!(matches!(result, Err(ClassifyError::Io(_))));
    }

    #[tokio::test]
    async fn failure_degrades_to_neutral() {
        let label = broken_classifier().classify_or_neutral("great!").await;
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn unparseable_output_is_an_error() {
        // `true` exits 0 with empty stdout, which is not a label.
        let classifier = SentimentClassifier::new(
            "true".to_owned(),
            PathBuf::from("ignored.py"),
            Duration::from_secs(5),
        );

        let result = classifier.classify("great!").await;
        assert!(matches!(result, Err(ClassifyError::UnknownLabel(_))));
    }
}
