//! Defines the data structures used for API request and response bodies.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServerError;

/// JSON extractor whose rejections render as the API's `{"error": ...}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);

/// Path extractor with the same error body as [`ApiJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServerError))]
pub struct ApiPath<T>(pub T);

// --- Request Bodies ---

/// Request body for creating a template or a new version of one.
///
/// `description` tells an absent key (`None`) apart from an explicit
/// `null` (`Some(None)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContentRequest {
    pub template: String,
    pub title: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub description: Option<Option<String>>,
}

impl TemplateContentRequest {
    /// Description for the version recorded when the template is created;
    /// `None` lets the store apply its default.
    pub fn initial_description(&self) -> Option<Option<&str>> {
        self.description.as_ref().map(|d| d.as_deref())
    }

    /// Description for a version added later; absent and null both mean none.
    pub fn version_description(&self) -> Option<&str> {
        self.description.as_ref().and_then(|d| d.as_deref())
    }
}

/// Request body for rendering a template against a set of variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTemplateRequest {
    pub template: String,
    pub variables: Value,
}

// Responses reuse the core types directly: `Template`, `TemplateVersion`
// and `ProcessedTemplate` already serialize to the API shape.

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> TemplateContentRequest {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_absent_description_defers_to_store_default() {
        let req = parse(r#"{"template": "x", "title": "t"}"#);
        assert_eq!(req.initial_description(), None);
        assert_eq!(req.version_description(), None);
    }

    #[test]
    fn test_null_description_stays_empty() {
        let req = parse(r#"{"template": "x", "title": "t", "description": null}"#);
        assert_eq!(req.description, Some(None));
        assert_eq!(req.initial_description(), Some(None));
        assert_eq!(req.version_description(), None);
    }

    #[test]
    fn test_given_description_is_kept() {
        let req = parse(r#"{"template": "x", "title": "t", "description": "v2"}"#);
        assert_eq!(req.initial_description(), Some(Some("v2")));
        assert_eq!(req.version_description(), Some("v2"));
    }
}
