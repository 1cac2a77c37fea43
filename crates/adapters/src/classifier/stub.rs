//! Stub classifier for testing and offline mode

use async_trait::async_trait;
use feedwatch_domain::{Classification, Classifier, ClassifyError, SentimentLabel};

const POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "high", "record", "rally", "rallies", "rise", "rises", "surge", "up",
];
const NEGATIVE_WORDS: &[&str] = &[
    "crash", "drop", "drops", "fall", "falls", "loss", "losses", "low", "plunge", "down",
];

/// Stub classifier that returns configurable responses
pub struct StubClassifier {
    response: Option<Classification>,
    error: Option<ClassifyError>,
}

impl StubClassifier {
    /// Create a stub that always answers neutral
    pub fn neutral() -> Self {
        Self::with_response(Classification::neutral())
    }

    /// Create a stub that returns a specific response
    pub fn with_response(response: Classification) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    /// Create a stub that always returns an error
    pub fn with_error(error: ClassifyError) -> Self {
        Self {
            response: None,
            error: Some(error),
        }
    }

    /// Create a stub that scores text against a small built-in word list
    pub fn lexicon() -> Self {
        Self {
            response: None,
            error: None,
        }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::neutral()
    }
}

fn score_words(text: &str) -> Classification {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(w)).count();
    let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(w)).count();

    let label = match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => SentimentLabel::Positive,
        std::cmp::Ordering::Less => SentimentLabel::Negative,
        std::cmp::Ordering::Equal => return Classification::neutral(),
    };

    let margin = positive.abs_diff(negative) as f64;
    Classification::new(label, (0.5 + 0.2 * margin).min(0.95))
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        if let Some(ref error) = self.error {
            return Err(match error {
                ClassifyError::Api(msg) => ClassifyError::Api(msg.clone()),
                ClassifyError::InvalidFormat(msg) => ClassifyError::InvalidFormat(msg.clone()),
                ClassifyError::RateLimited => ClassifyError::RateLimited,
                ClassifyError::Timeout => ClassifyError::Timeout,
                ClassifyError::Config(msg) => ClassifyError::Config(msg.clone()),
            });
        }

        if let Some(response) = self.response {
            return Ok(response);
        }

        Ok(score_words(text))
    }
}
