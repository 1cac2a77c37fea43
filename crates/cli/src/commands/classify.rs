//! Classify command - one-shot sentiment classification

use anyhow::{Context, Result, bail};
use feedwatch_adapters::classifier::{
    ClassifierConfig as AdapterClassifierConfig, HuggingFaceClassifier, StubClassifier,
};
use feedwatch_domain::Classifier;
use feedwatch_domain::usecases::{ClassifyConfig, ClassifyUseCase, Tone};
use secrecy::SecretString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::ClassifyArgs;
use crate::config::AppConfig;

pub async fn execute(args: ClassifyArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let text = match args.text {
        Some(text) => text,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;
            text
        }
    };

    if text.trim().is_empty() {
        bail!("No text provided for classification");
    }

    let classifier = build_classifier(&config)?;
    if classifier.is_none() {
        tracing::warn!("Classifier provider is none; every text classifies as neutral");
    }

    let usecase = ClassifyUseCase::new(classifier.as_deref(), classify_config_from_config(&config));
    let assessment = usecase.assess(text.trim()).await;

    if args.json {
        let output = serde_json::json!({
            "label": assessment.classification.label,
            "score": assessment.classification.score,
            "tone": tone_name(assessment.tone),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Classification Results");
        println!("======================");
        println!();
        println!("Label: {:?}", assessment.classification.label);
        println!("Score: {:.2}", assessment.classification.score);
        println!("Tone:  {}", tone_name(assessment.tone));
    }

    Ok(())
}

/// Build the configured classifier; `none` disables classification
pub(crate) fn build_classifier(config: &AppConfig) -> Result<Option<Arc<dyn Classifier>>> {
    let classifier: Arc<dyn Classifier> = match config.classifier.provider.as_str() {
        "huggingface" => {
            let api_key = load_api_key(&config.classifier.api_key_env, "huggingface")?;
            Arc::new(HuggingFaceClassifier::new(
                api_key,
                adapter_classifier_config(&config.classifier),
            ))
        }
        "stub" => Arc::new(StubClassifier::lexicon()),
        "none" => return Ok(None),
        other => bail!("Unknown classifier provider: {}", other),
    };

    Ok(Some(classifier))
}

fn adapter_classifier_config(config: &crate::config::ClassifierConfig) -> AdapterClassifierConfig {
    AdapterClassifierConfig {
        model: config.model.clone(),
        base_url: config.base_url.clone(),
        timeout_secs: config.timeout_secs,
        retries: config.retries,
    }
}

pub(crate) fn classify_config_from_config(config: &AppConfig) -> ClassifyConfig {
    ClassifyConfig {
        confidence_threshold: config.engine.confidence_threshold,
        timeout: Duration::from_secs(config.general.call_timeout_secs),
    }
}

fn tone_name(tone: Tone) -> &'static str {
    match tone {
        Tone::Positive => "positive",
        Tone::Negative => "negative",
        Tone::Neutral => "neutral",
    }
}

pub(crate) fn load_api_key(env_var: &str, provider: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No API key env var configured for provider {}", provider);
    }

    let key = std::env::var(env_var).with_context(|| {
        format!(
            "Missing API key env var {} for provider {}",
            env_var, provider
        )
    })?;

    if key.trim().is_empty() {
        bail!(
            "API key env var {} is empty for provider {}",
            env_var,
            provider
        );
    }

    Ok(SecretString::new(key.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_classifier_none_disables_classification() {
        let mut config = AppConfig::default();
        config.classifier.provider = "none".to_string();

        assert!(build_classifier(&config).unwrap().is_none());
    }

    #[test]
    fn test_build_classifier_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        config.classifier.provider = "openai".to_string();

        let err = build_classifier(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown classifier provider"));
    }

    #[test]
    fn test_huggingface_requires_api_key() {
        let mut config = AppConfig::default();
        config.classifier.api_key_env = "FEEDWATCH_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        let err = build_classifier(&config).err().unwrap();
        assert!(err.to_string().contains("Missing API key"));
    }

    #[tokio::test]
    async fn test_stub_provider_classifies_offline() {
        let mut config = AppConfig::default();
        config.classifier.provider = "stub".to_string();

        let classifier = build_classifier(&config).unwrap();
        assert!(classifier.is_some());
        let usecase =
            ClassifyUseCase::new(classifier.as_deref(), classify_config_from_config(&config));
        let assessment = usecase.assess("Gold prices surge to a record high").await;
        assert_eq!(assessment.tone, Tone::Positive);
    }
}
