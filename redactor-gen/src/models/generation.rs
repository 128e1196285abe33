//! Generation request and stage output types

use chrono::{DateTime, Utc};
use redactor_common::{Error, Result, StageId};
use serde::{Deserialize, Serialize};

/// Validated input of one generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    topic: String,
    title: Option<String>,
}

impl GenerationRequest {
    /// Build a request; a missing or blank topic is rejected
    pub fn new(topic: impl Into<String>, title: Option<String>) -> Result<Self> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(Error::InvalidInput("A topic is required.".to_string()));
        }

        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self { topic, title })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Title used for the stored document: the suggested title, else the topic
    pub fn document_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.topic)
    }
}

/// Output of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: StageId,
    pub content: String,
    /// Set when the content is longer than `review_cutoff_chars`, so later
    /// stages see only a prefix of it
    pub truncated: bool,
}

impl StageResult {
    pub fn new(stage: StageId, content: String, truncated: bool) -> Self {
        Self {
            stage,
            content,
            truncated,
        }
    }
}

/// Everything a successful run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArticle {
    pub plan: String,
    pub draft: String,
    pub critique: String,
    pub final_article: String,
}

/// Last topic submitted to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub topic: String,
    #[serde(default)]
    pub title: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl TopicRecord {
    pub fn from_request(request: &GenerationRequest) -> Self {
        Self {
            topic: request.topic().to_string(),
            title: request.title().map(str::to_string),
            submitted_at: Utc::now(),
        }
    }
}
