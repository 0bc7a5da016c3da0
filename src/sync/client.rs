//! HTTP implementation of `SectionStore` against the course API.
//!
//! Endpoints:
//! - `GET    {base}/lessons/{lessonId}/sections`
//! - `POST   {base}/lessons/{lessonId}/sections`
//! - `PATCH  {base}/sections/{id}`
//! - `DELETE {base}/sections/{id}`
//! - `PUT    {base}/lessons/{lessonId}/sections/order`

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::error::StoreError;
use super::store::{NewSection, OrderChange, SectionPatch, SectionStore};
use crate::config::ApiConfig;
use crate::models::Section;

/// Error payload returned by the API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReorderRequest<'a> {
    order: &'a [OrderChange],
}

pub struct HttpSectionStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSectionStore {
    /// Creates a store from config.
    ///
    /// Returns an error if no base URL is configured.
    pub fn from_config(config: &ApiConfig) -> Result<Self, StoreError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or(StoreError::NotConfigured)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self::with_client(client, base_url, config.api_key.clone()))
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lesson_sections_url(&self, lesson_id: &str) -> String {
        format!(
            "{}/lessons/{}/sections",
            self.base_url,
            urlencoding::encode(lesson_id)
        )
    }

    fn section_url(&self, section_id: &str) -> String {
        format!(
            "{}/sections/{}",
            self.base_url,
            urlencoding::encode(section_id)
        )
    }

    fn reorder_url(&self, lesson_id: &str) -> String {
        format!("{}/order", self.lesson_sections_url(lesson_id))
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Response, StoreError> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        debug!(resource, %status, "Section API response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, resource, &body))
    }

    async fn read_section(response: Response) -> Result<Section, StoreError> {
        let section: Section = response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("Invalid response: {}", e)))?;
        ensure_persisted(&section)?;
        Ok(section)
    }

    async fn read_sections(response: Response) -> Result<Vec<Section>, StoreError> {
        let sections: Vec<Section> = response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("Invalid response: {}", e)))?;
        for section in &sections {
            ensure_persisted(section)?;
        }
        Ok(sections)
    }
}

#[async_trait]
impl SectionStore for HttpSectionStore {
    async fn list_by_lesson(&self, lesson_id: &str) -> Result<Vec<Section>, StoreError> {
        let request = self.client.get(self.lesson_sections_url(lesson_id));
        let response = self.send(request, &format!("lesson {}", lesson_id)).await?;
        Self::read_sections(response).await
    }

    async fn create(&self, lesson_id: &str, section: &NewSection) -> Result<Section, StoreError> {
        let request = self
            .client
            .post(self.lesson_sections_url(lesson_id))
            .json(section);
        let response = self.send(request, &format!("lesson {}", lesson_id)).await?;
        Self::read_section(response).await
    }

    async fn update(&self, section_id: &str, patch: &SectionPatch) -> Result<Section, StoreError> {
        let request = self.client.patch(self.section_url(section_id)).json(patch);
        let response = self.send(request, &format!("section {}", section_id)).await?;
        Self::read_section(response).await
    }

    async fn delete(&self, section_id: &str) -> Result<(), StoreError> {
        let request = self.client.delete(self.section_url(section_id));
        self.send(request, &format!("section {}", section_id)).await?;
        Ok(())
    }

    async fn reorder(
        &self,
        lesson_id: &str,
        changes: &[OrderChange],
    ) -> Result<Vec<Section>, StoreError> {
        let request = self
            .client
            .put(self.reorder_url(lesson_id))
            .json(&ReorderRequest { order: changes });
        let response = self.send(request, &format!("lesson {}", lesson_id)).await?;
        Self::read_sections(response).await
    }
}

/// Map a non-success status to the store error taxonomy.
fn error_for_status(status: StatusCode, resource: &str, body: &str) -> StoreError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.message.or(e.error))
        .unwrap_or_else(|| format!("server returned status {}", status));

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => StoreError::NotFound(resource.to_string()),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            StoreError::Validation(format!("{}: {}", resource, detail))
        }
        _ => StoreError::Network(format!("{}: {}", resource, detail)),
    }
}

fn ensure_persisted(section: &Section) -> Result<(), StoreError> {
    if section.id.is_temporary() {
        return Err(StoreError::Network(format!(
            "server returned unsaved section id {}",
            section.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SectionId, SectionType};

    #[test]
    fn test_urls() {
        let store = HttpSectionStore::new("https://api.example.com/v1", None);
        assert_eq!(
            store.lesson_sections_url("l-1"),
            "https://api.example.com/v1/lessons/l-1/sections"
        );
        assert_eq!(
            store.section_url("s-9"),
            "https://api.example.com/v1/sections/s-9"
        );
        assert_eq!(
            store.reorder_url("l-1"),
            "https://api.example.com/v1/lessons/l-1/sections/order"
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let store = HttpSectionStore::new("http://localhost:4000/", None);
        assert_eq!(store.base_url(), "http://localhost:4000");
        assert_eq!(
            store.section_url("abc"),
            "http://localhost:4000/sections/abc"
        );
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let store = HttpSectionStore::new("http://localhost:4000", None);
        assert_eq!(
            store.lesson_sections_url("intro/part 1"),
            "http://localhost:4000/lessons/intro%2Fpart%201/sections"
        );
    }

    #[test]
    fn test_from_config_requires_base_url() {
        let config = ApiConfig::default();
        assert!(matches!(
            HttpSectionStore::from_config(&config),
            Err(StoreError::NotConfigured)
        ));

        let config = ApiConfig {
            base_url: Some("http://localhost:4000".into()),
            ..Default::default()
        };
        assert!(HttpSectionStore::from_config(&config).is_ok());
    }

    #[test]
    fn test_error_for_status_not_found() {
        let err = error_for_status(StatusCode::NOT_FOUND, "section s1", "");
        assert_eq!(err, StoreError::NotFound("section s1".into()));

        let err = error_for_status(StatusCode::GONE, "section s1", "");
        assert_eq!(err, StoreError::NotFound("section s1".into()));
    }

    #[test]
    fn test_error_for_status_validation_uses_message() {
        let body = r#"{"error":"invalid_body","message":"quizId is required"}"#;
        let err = error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "lesson l1", body);
        assert_eq!(
            err,
            StoreError::Validation("lesson l1: quizId is required".into())
        );
    }

    #[test]
    fn test_error_for_status_other_is_network() {
        let err = error_for_status(StatusCode::SERVICE_UNAVAILABLE, "lesson l1", "<html>");
        assert!(matches!(err, StoreError::Network(msg) if msg.contains("503")));
    }

    #[test]
    fn test_ensure_persisted() {
        let saved = Section::new("l", SectionType::Text).with_id(SectionId::server("1"));
        assert!(ensure_persisted(&saved).is_ok());

        let unsaved = Section::new("l", SectionType::Text);
        assert!(ensure_persisted(&unsaved).is_err());
    }

    #[test]
    fn test_reorder_request_shape() {
        let changes = vec![OrderChange {
            id: "s1".into(),
            order: 2,
        }];
        let json = serde_json::to_value(ReorderRequest { order: &changes }).unwrap();
        assert_eq!(json, serde_json::json!({ "order": [{ "id": "s1", "order": 2 }] }));
    }
}
