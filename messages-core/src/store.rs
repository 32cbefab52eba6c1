//! In-memory store of message templates and their version history.
//!
//! The store is a plain value: callers share it behind a lock and persist it
//! through its serde representation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

pub type TemplateId = u64;
pub type VersionId = u64;

/// Description attached to the version recorded when a template is created.
pub const INITIAL_VERSION_DESCRIPTION: &str = "Initial version";

/// Timestamp layout used in API payloads, e.g. `2024-05-01 13:45:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub title: String,
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVersion {
    pub id: VersionId,
    pub template_id: TemplateId,
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateStore {
    next_template_id: TemplateId,
    next_version_id: VersionId,
    templates: BTreeMap<TemplateId, Template>,
    versions: Vec<TemplateVersion>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a template and records its initial version.
    ///
    /// `description` is the initial version's description: `None` uses
    /// [`INITIAL_VERSION_DESCRIPTION`], `Some(None)` leaves it empty.
    pub fn create_template(
        &mut self,
        title: &str,
        content: &str,
        description: Option<Option<&str>>,
    ) -> Template {
        self.create_template_at(title, content, description, Utc::now())
    }

    /// Same as [`create_template`](Self::create_template) with an explicit clock.
    pub fn create_template_at(
        &mut self,
        title: &str,
        content: &str,
        description: Option<Option<&str>>,
        now: DateTime<Utc>,
    ) -> Template {
        let id = Self::bump(&mut self.next_template_id);
        let template = Template {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
        };
        self.templates.insert(id, template.clone());
        self.push_version(
            id,
            title,
            content,
            description.unwrap_or(Some(INITIAL_VERSION_DESCRIPTION)),
            now,
        );
        debug!(template_id = id, "Created template");
        template
    }

    /// Appends a new version to an existing template.
    pub fn create_version(
        &mut self,
        template_id: TemplateId,
        title: &str,
        content: &str,
        description: Option<&str>,
    ) -> CoreResult<TemplateVersion> {
        self.create_version_at(template_id, title, content, description, Utc::now())
    }

    pub fn create_version_at(
        &mut self,
        template_id: TemplateId,
        title: &str,
        content: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<TemplateVersion> {
        if !self.templates.contains_key(&template_id) {
            return Err(CoreError::TemplateNotFound(template_id));
        }
        let version = self.push_version(template_id, title, content, description, now);
        debug!(template_id, version_id = version.id, "Created template version");
        Ok(version)
    }

    /// All versions of a template, newest first.
    pub fn versions(&self, template_id: TemplateId) -> CoreResult<Vec<TemplateVersion>> {
        if !self.templates.contains_key(&template_id) {
            return Err(CoreError::TemplateNotFound(template_id));
        }
        let mut versions: Vec<TemplateVersion> = self
            .versions
            .iter()
            .filter(|v| v.template_id == template_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(versions)
    }

    pub fn get_template(&self, template_id: TemplateId) -> CoreResult<&Template> {
        self.templates
            .get(&template_id)
            .ok_or(CoreError::TemplateNotFound(template_id))
    }

    /// All templates in ascending id order.
    pub fn list_templates(&self) -> Vec<Template> {
        self.templates.values().cloned().collect()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    fn push_version(
        &mut self,
        template_id: TemplateId,
        title: &str,
        content: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> TemplateVersion {
        let version = TemplateVersion {
            id: Self::bump(&mut self.next_version_id),
            template_id,
            title: title.to_string(),
            content: content.to_string(),
            description: description.map(str::to_string),
            created_at: now,
        };
        self.versions.push(version.clone());
        version
    }

    // Ids start at 1 and are never reused.
    fn bump(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }
}

/// Serde adapter for the `YYYY-MM-DD HH:MM:SS` UTC layout.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_template_records_initial_version() {
        let mut store = TemplateStore::new();
        let template = store.create_template_at("Welcome", "Hi {name}", None, t0());
        assert_eq!(template.id, 1);
        assert_eq!(template.title, "Welcome");

        let versions = store.versions(template.id).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].id, 1);
        assert_eq!(versions[0].content, "Hi {name}");
        assert_eq!(versions[0].description.as_deref(), Some(INITIAL_VERSION_DESCRIPTION));
    }

    #[test]
    fn test_create_template_with_description() {
        let mut store = TemplateStore::new();
        let template = store.create_template_at("A", "a", Some(Some("first draft")), t0());
        let versions = store.versions(template.id).unwrap();
        assert_eq!(versions[0].description.as_deref(), Some("first draft"));
    }

    #[test]
    fn test_create_template_with_explicit_empty_description() {
        let mut store = TemplateStore::new();
        let template = store.create_template_at("A", "a", Some(None), t0());
        let versions = store.versions(template.id).unwrap();
        assert_eq!(versions[0].description, None);
    }

    #[test]
    fn test_create_version_unknown_template() {
        let mut store = TemplateStore::new();
        let err = store.create_version(42, "t", "c", None).unwrap_err();
        assert!(matches!(err, CoreError::TemplateNotFound(42)));
        assert!(matches!(store.versions(42), Err(CoreError::TemplateNotFound(42))));
    }

    #[test]
    fn test_versions_newest_first() {
        let mut store = TemplateStore::new();
        let template = store.create_template_at("A", "v1", None, t0());
        store
            .create_version_at(template.id, "A", "v2", Some("second"), t0() + Duration::seconds(10))
            .unwrap();
        // Same timestamp as v2: the later id comes first.
        let v3 = store
            .create_version_at(template.id, "A", "v3", None, t0() + Duration::seconds(10))
            .unwrap();
        assert_eq!(v3.description, None);

        let contents: Vec<String> = store
            .versions(template.id)
            .unwrap()
            .into_iter()
            .map(|v| v.content)
            .collect();
        assert_eq!(contents, vec!["v3", "v2", "v1"]);
    }

    #[test]
    fn test_ids_are_global_and_increasing() {
        let mut store = TemplateStore::new();
        let a = store.create_template_at("A", "a", None, t0());
        let b = store.create_template_at("B", "b", None, t0());
        let va = store.create_version_at(a.id, "A", "a2", None, t0()).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        // Versions 1 and 2 are the initial versions of A and B.
        assert_eq!(va.id, 3);
        assert_eq!(store.versions(b.id).unwrap().len(), 1);
        assert_eq!(store.list_templates().iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_get_template() {
        let mut store = TemplateStore::new();
        let a = store.create_template_at("A", "a", None, t0());
        assert_eq!(store.get_template(a.id).unwrap(), &a);
        assert!(store.get_template(99).is_err());
    }

    #[test]
    fn test_timestamp_format_in_json() {
        let mut store = TemplateStore::new();
        let template = store.create_template_at("A", "a", None, t0());
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["created_at"], "2024-05-01 12:00:00");

        let back: Template = serde_json::from_value(json).unwrap();
        assert_eq!(back, template);
    }

    #[test]
    fn test_store_survives_serde_and_keeps_counters() {
        let mut store = TemplateStore::new();
        store.create_template_at("A", "a", None, t0());
        let json = serde_json::to_string(&store).unwrap();
        let mut restored: TemplateStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, store);

        let next = restored.create_template_at("B", "b", None, t0());
        assert_eq!(next.id, 2);
    }
}
