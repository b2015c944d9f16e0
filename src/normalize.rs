//! Request normalization: single-or-batch payloads collapse into one ordered
//! list of prompt texts plus the model identifier to echo back.

use serde::{Deserialize, Serialize};

/// One issue report to score.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Issue {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

/// A batch of issues. `model` is echoed back verbatim in the response and
/// defaults to the configured model identifier when omitted.
#[derive(Debug, Deserialize, Clone)]
pub struct IssueBatch {
    #[serde(default)]
    pub model: Option<String>,
    pub issues: Vec<Issue>,
}

/// Inbound payload: a bare issue or a batch. `Batch` is listed first so the
/// presence of an `issues` field discriminates the two shapes.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum DifficultyRequest {
    Batch(IssueBatch),
    Single(Issue),
}

/// Which shape the caller sent; decides the response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Single,
    Batch,
}

/// Uniform internal form of a request after shape coercion. Prompt order
/// matches issue order exactly.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub model: String,
    pub prompts: Vec<String>,
    pub shape: Shape,
}

/// Collapse either payload shape into one ordered prompt list.
pub fn normalize(request: DifficultyRequest, default_model: &str) -> Normalized {
    match request {
        DifficultyRequest::Single(issue) => Normalized {
            model: default_model.to_string(),
            prompts: vec![prompt_text(&issue)],
            shape: Shape::Single,
        },
        DifficultyRequest::Batch(batch) => Normalized {
            model: batch
                .model
                .unwrap_or_else(|| default_model.to_string()),
            prompts: batch.issues.iter().map(prompt_text).collect(),
            shape: Shape::Batch,
        },
    }
}

/// Prompt construction policy: trimmed title, then the trimmed body joined
/// with a single space. An absent or empty body leaves the title alone.
fn prompt_text(issue: &Issue) -> String {
    match issue
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
    {
        Some(body) => format!("{} {}", issue.title.trim(), body),
        None => issue.title.trim().to_string(),
    }
}
