//! Sentiment classifier adapters

pub mod huggingface;
pub mod stub;

pub use huggingface::HuggingFaceClassifier;
pub use stub::StubClassifier;

use serde::{Deserialize, Serialize};

/// Common classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model name/ID
    pub model: String,
    /// Inference API base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries on failure
    pub retries: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "savasy/bert-base-turkish-sentiment-cased".to_string(),
            base_url: "https://api-inference.huggingface.co".to_string(),
            timeout_secs: 30,
            retries: 1,
        }
    }
}
