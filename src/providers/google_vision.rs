//! Google Cloud Vision API（REST）
//!
//! 物体検出（OBJECT_LOCALIZATION）とテキスト検出（TEXT_DETECTION）を
//! 別々のリクエストとして発行する。

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, http_client, require_key, ProviderError, VisionProvider};

const VISION_API_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

pub struct GoogleVisionProvider {
    api_key: Option<String>,
    endpoint: String,
    http: Client,
}

impl GoogleVisionProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            endpoint: VISION_API_URL.to_string(),
            http: http_client(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    async fn annotate(
        &self,
        image: &[u8],
        feature: &'static str,
        max_results: usize,
    ) -> Result<AnnotateImageResponse, ProviderError> {
        let api_key = require_key(&self.api_key, self.name())?;

        let request = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    feature_type: feature,
                    max_results,
                }],
            }],
        };

        debug!(feature, image_bytes = image.len(), "Vision annotate request");

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: AnnotateResponse = response.json().await?;
        let result = body.responses.into_iter().next().unwrap_or_default();

        if let Some(err) = result.error {
            return Err(ProviderError::Api {
                status: err.code.unwrap_or(0),
                message: err.message.unwrap_or_default(),
            });
        }
        Ok(result)
    }
}

#[async_trait]
impl VisionProvider for GoogleVisionProvider {
    async fn detect_labels(
        &self,
        image: &[u8],
        max_results: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let result = self.annotate(image, "OBJECT_LOCALIZATION", max_results).await?;
        Ok(result
            .localized_object_annotations
            .into_iter()
            .map(|o| o.name)
            .take(max_results)
            .collect())
    }

    async fn detect_text(
        &self,
        image: &[u8],
        max_results: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let result = self.annotate(image, "TEXT_DETECTION", max_results).await?;
        Ok(result
            .text_annotations
            .into_iter()
            .map(|t| t.description)
            .take(max_results)
            .collect())
    }

    fn name(&self) -> &'static str {
        "google-vision"
    }
}

// =============================================
// リクエスト/レスポンス型
// =============================================

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnnotateImageResponse {
    localized_object_annotations: Vec<LocalizedObject>,
    text_annotations: Vec<TextAnnotation>,
    error: Option<StatusBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalizedObject {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextAnnotation {
    description: String,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    code: Option<u16>,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent { content: STANDARD.encode([1u8, 2, 3]) },
                features: vec![Feature { feature_type: "TEXT_DETECTION", max_results: 3 }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"][0]["image"]["content"], "AQID");
        assert_eq!(json["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
        assert_eq!(json["requests"][0]["features"][0]["maxResults"], 3);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "responses": [{
                "localizedObjectAnnotations": [
                    {"mid": "/m/01", "name": "Jacket", "score": 0.91},
                    {"mid": "/m/02", "name": "Person", "score": 0.80}
                ],
                "textAnnotations": [
                    {"locale": "en", "description": "SCHOTT\nNYC"},
                    {"description": "SCHOTT"}
                ]
            }]
        }"#;
        let parsed: AnnotateResponse = serde_json::from_str(body).unwrap();
        let first = &parsed.responses[0];
        assert_eq!(first.localized_object_annotations[0].name, "Jacket");
        assert_eq!(first.text_annotations[0].description, "SCHOTT\nNYC");
        assert!(first.error.is_none());
    }

    #[test]
    fn test_response_with_error_body() {
        let body = r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#;
        let parsed: AnnotateResponse = serde_json::from_str(body).unwrap();
        let err = parsed.responses[0].error.as_ref().unwrap();
        assert_eq!(err.code, Some(3));
        assert_eq!(err.message.as_deref(), Some("Bad image data."));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let provider = GoogleVisionProvider::new(None).with_endpoint("http://127.0.0.1:9/unused");
        let result = provider.detect_labels(&[0xFF, 0xD8], 5).await;
        assert!(matches!(result, Err(ProviderError::MissingApiKey { .. })));
    }
}
