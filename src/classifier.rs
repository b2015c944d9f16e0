//! Boundary to the text-classification model.
//!
//! The model is an external collaborator reached through the [`Classifier`]
//! trait so the HTTP implementation can be swapped for a canned one in tests.
//! This service only ever consumes the top-ranked class of a prediction.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Maximum prompt length handed to the model; longer input is truncated.
pub const MAX_INPUT_CHARS: usize = 512;

/// One ranked class from the model.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model returned no predictions")]
    EmptyOutput,
}

/// The classification capability: ranked `(label, score)` pairs, best first.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn predict(&self, text: &str) -> Result<Vec<Prediction>, InferenceError>;
}

/// Classify one prompt under the fixed truncation policy, keeping only the
/// top-ranked class. Not retried; a failure is fatal for the request.
pub async fn classify(model: &dyn Classifier, prompt: &str) -> Result<Prediction, InferenceError> {
    let text = truncate(prompt, MAX_INPUT_CHARS);
    let mut ranked = model.predict(text).await?;
    if ranked.is_empty() {
        return Err(InferenceError::EmptyOutput);
    }
    Ok(ranked.swap_remove(0))
}

/// Cut at a char boundary so multi-byte input never splits a code point.
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Production classifier: POSTs `{"inputs": text}` to a classification server
/// and expects a ranked JSON array of `{"label": ..., "score": ...}` back.
pub struct HttpClassifier {
    url: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(url: String, timeout_ms: u64) -> Self {
        let timeout = std::time::Duration::from_millis(timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self { url, client }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn predict(&self, text: &str) -> Result<Vec<Prediction>, InferenceError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await?
            .error_for_status()?;
        let ranked = response.json::<Vec<Prediction>>().await?;
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ranked(Vec<Prediction>);

    #[async_trait]
    impl Classifier for Ranked {
        async fn predict(&self, _text: &str) -> Result<Vec<Prediction>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct CaptureLen;

    #[async_trait]
    impl Classifier for CaptureLen {
        async fn predict(&self, text: &str) -> Result<Vec<Prediction>, InferenceError> {
            Ok(vec![Prediction {
                label: format!("len={}", text.chars().count()),
                score: 1.0,
            }])
        }
    }

    #[tokio::test]
    async fn keeps_only_top_ranked_class() {
        let model = Ranked(vec![
            Prediction {
                label: "hard".into(),
                score: 0.81,
            },
            Prediction {
                label: "easy".into(),
                score: 0.19,
            },
        ]);
        let top = classify(&model, "some issue").await.unwrap();
        assert_eq!(top.label, "hard");
        assert!((top.score - 0.81).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_model_output_is_an_error() {
        let model = Ranked(Vec::new());
        let err = classify(&model, "some issue").await.unwrap_err();
        assert!(matches!(err, InferenceError::EmptyOutput));
    }

    #[tokio::test]
    async fn long_prompts_are_truncated_to_the_limit() {
        let prompt = "x".repeat(MAX_INPUT_CHARS + 200);
        let top = classify(&CaptureLen, &prompt).await.unwrap();
        assert_eq!(top.label, format!("len={}", MAX_INPUT_CHARS));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes; a byte-indexed cut would panic.
        let text = "é".repeat(10);
        assert_eq!(truncate(&text, 4), "éééé");
        assert_eq!(truncate(&text, 20), text.as_str());
    }
}
