//! Preview channel: best-effort mirror for live rendering
//!
//! The preview service is non-authoritative. Sync is fire-and-forget: it
//! never blocks the mutation pipeline, has no ordering guarantee relative to
//! commits, may be dropped under load, and a failure is logged and swallowed
//! without ever touching the draft.

use crate::document::SectionId;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Best-effort sink for section previews
#[async_trait]
pub trait PreviewSink: Send + Sync {
    /// Mirror one section's current content for rendering
    async fn sync(
        &self,
        document_id: &str,
        section: SectionId,
        partial: serde_json::Value,
    ) -> Result<()>;
}

/// Schedule a preview sync without waiting for it.
///
/// The spawned task logs and swallows any failure; nothing observes its
/// outcome. Callers continue immediately.
pub fn spawn_sync(
    sink: Arc<dyn PreviewSink>,
    document_id: String,
    section: SectionId,
    partial: serde_json::Value,
) {
    tokio::spawn(async move {
        if let Err(e) = sink.sync(&document_id, section, partial).await {
            tracing::warn!(
                document_id = %document_id,
                section = %section,
                error = %e,
                "Preview sync failed, continuing"
            );
        }
    });
}

/// Request to warm one section in the preview mirror
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewWarmRequest {
    /// Document being previewed
    pub document_id: String,
    /// Section the partial belongs to
    pub section: String,
    /// Current section content
    pub data: serde_json::Value,
    /// TTL in seconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// HTTP preview warmer
///
/// Pushes section partials to the preview service the way content is pushed
/// to a projection cache: one POST per section, no retry, no acknowledgement
/// the pipeline waits on.
#[cfg(feature = "client")]
pub struct PreviewWarmer {
    /// Preview service URL
    preview_url: String,
    /// API key for authentication
    api_key: Option<String>,
    /// TTL attached to warmed sections
    ttl_secs: u64,
    /// HTTP client
    http_client: reqwest::Client,
}

#[cfg(feature = "client")]
impl PreviewWarmer {
    /// Create a new preview warmer
    pub fn new(preview_url: impl Into<String>) -> Self {
        Self {
            preview_url: preview_url.into(),
            api_key: None,
            ttl_secs: 3600,
            http_client: reqwest::Client::new(),
        }
    }

    /// Create a warmer with API key authentication
    pub fn with_api_key(preview_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            preview_url: preview_url.into(),
            api_key: Some(api_key.into()),
            ttl_secs: 3600,
            http_client: reqwest::Client::new(),
        }
    }

    /// Drop a document from the preview mirror
    pub async fn invalidate(&self, document_id: &str) -> Result<()> {
        let url = format!("{}/preview/v1/invalidate", self.preview_url);
        let body = serde_json::json!({ "document_id": document_id });

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| crate::error::StudioError::PreviewSync(e.to_string()))?;
        if !response.status().is_success() {
            return Err(crate::error::StudioError::PreviewSync(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl PreviewSink for PreviewWarmer {
    async fn sync(
        &self,
        document_id: &str,
        section: SectionId,
        partial: serde_json::Value,
    ) -> Result<()> {
        let url = format!("{}/preview/v1/warm", self.preview_url);
        let body = PreviewWarmRequest {
            document_id: document_id.to_string(),
            section: section.as_str().to_string(),
            data: partial,
            ttl_secs: Some(self.ttl_secs),
        };

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| crate::error::StudioError::PreviewSync(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(crate::error::StudioError::PreviewSync(format!(
                "HTTP {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warm_request_serialization() {
        let request = PreviewWarmRequest {
            document_id: "draft-1".to_string(),
            section: SectionId::Recipes.as_str().to_string(),
            data: serde_json::json!([{"title": "Bread"}]),
            ttl_secs: Some(3600),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"section\":\"recipes\""));
        assert!(json.contains("\"document_id\":\"draft-1\""));
    }
}
