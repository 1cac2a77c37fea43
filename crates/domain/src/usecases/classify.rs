//! Classification use case - wraps the optional classifier port so that a
//! failing or slow classifier never blocks notification dispatch

use async_trait::async_trait;
use std::time::Duration;

use crate::{
    model::{Classification, SentimentLabel},
    ports::{Classifier, ClassifyError},
};

/// Configuration for the classify use case
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// A label only counts when its score exceeds this value
    pub confidence_threshold: f64,
    /// Upper bound for a single classifier call
    pub timeout: Duration,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Tone a message is rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

/// Classification plus the tone derived from it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub classification: Classification,
    pub tone: Tone,
}

/// Use case for classifying item text
pub struct ClassifyUseCase<C> {
    classifier: Option<C>,
    config: ClassifyConfig,
}

impl<C: Classifier> ClassifyUseCase<C> {
    pub fn new(classifier: Option<C>, config: ClassifyConfig) -> Self {
        Self { classifier, config }
    }

    /// Classify text, falling back to neutral on any failure
    pub async fn classify(&self, text: &str) -> Classification {
        let Some(classifier) = &self.classifier else {
            return Classification::neutral();
        };

        let result = match tokio::time::timeout(self.config.timeout, classifier.classify(text))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ClassifyError::Timeout),
        };

        match result {
            Ok(classification) => Classification::new(classification.label, classification.score),
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed, using neutral");
                Classification::neutral()
            }
        }
    }

    /// Classify text and derive its display tone
    pub async fn assess(&self, text: &str) -> Assessment {
        let classification = self.classify(text).await;
        Assessment {
            classification,
            tone: tone_for(&classification, self.config.confidence_threshold),
        }
    }
}

/// Positive/negative only when the label matches and the score is strictly
/// above the threshold; everything else renders neutral.
pub fn tone_for(classification: &Classification, threshold: f64) -> Tone {
    match classification.label {
        SentimentLabel::Positive if classification.score > threshold => Tone::Positive,
        SentimentLabel::Negative if classification.score > threshold => Tone::Negative,
        _ => Tone::Neutral,
    }
}

#[async_trait]
impl<C: Classifier + ?Sized> Classifier for &C {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        (*self).classify(text).await
    }
}
