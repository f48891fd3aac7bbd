//! Records exchanged with the runtime registration backend.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    str::FromStr,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::SiteboxError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A flat snapshot of a sandbox file tree, keyed by absolute sandbox path.
pub type FileSnapshot = BTreeMap<String, String>;

/// The lifecycle status of a sandboxed runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    /// The record exists but the runtime has not been confirmed as running.
    Creating,

    /// The runtime booted and is serving the project.
    Active,

    /// The runtime was stopped.
    Stopped,

    /// The runtime failed.
    Error,
}

/// A backend-persisted description of one sandboxed runtime instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRecord {
    /// Backend-assigned identity.
    pub id: String,

    /// The project this runtime belongs to.
    pub project_id: String,

    /// Display name.
    pub name: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current lifecycle status.
    pub status: RuntimeStatus,

    /// Runtime metadata: workdir, ports, files, url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RuntimeMetadata>,

    /// Owner of the record, assigned by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// When the record was created.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,

    /// When the record was last modified.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_timestamp"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The metadata block of a runtime record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeMetadata {
    /// Name of the sandbox root directory.
    pub workdir_name: String,

    /// Ports the sandbox has opened.
    #[serde(default)]
    pub ports: Vec<u16>,

    /// The last saved file snapshot.
    #[serde(default)]
    pub files: Vec<FileEntry>,

    /// Last known externally reachable address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One file of a saved snapshot, as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute sandbox path.
    pub path: String,

    /// Text content.
    pub content: String,
}

/// The body of a `POST /webcontainers` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuntimeRequest {
    /// The project the runtime belongs to.
    #[builder(setter(into))]
    pub project_id: String,

    /// Display name.
    #[builder(setter(into))]
    pub name: String,

    /// Free-form description.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Initial metadata.
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RuntimeMetadata>,
}

/// The body of a `PUT /webcontainers/{id}` request.
///
/// Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuntimeRequest {
    /// New lifecycle status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RuntimeStatus>,

    /// Metadata fields to change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataPatch>,
}

/// A partial [`RuntimeMetadata`].
///
/// `files` replaces the stored snapshot wholesale. `ports` is always sent as the full set known
/// to the sender, so the stored list only grows whether the backend merges or replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    /// Name of the sandbox root directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir_name: Option<String>,

    /// Ports the sandbox has opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,

    /// Complete file snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,

    /// Last known externally reachable address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeStatus {
    /// Returns `true` if the lifecycle allows moving from `self` to `next`.
    ///
    /// Allowed: `creating -> active`, `creating -> error`, `active -> error`. Nothing leaves
    /// `error`.
    pub fn can_transition_to(self, next: RuntimeStatus) -> bool {
        matches!(
            (self, next),
            (RuntimeStatus::Creating, RuntimeStatus::Active)
                | (RuntimeStatus::Creating, RuntimeStatus::Error)
                | (RuntimeStatus::Active, RuntimeStatus::Error)
        )
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeStatus::Creating => "creating",
            RuntimeStatus::Active => "active",
            RuntimeStatus::Stopped => "stopped",
            RuntimeStatus::Error => "error",
        }
    }
}

impl RuntimeMetadata {
    /// Creates empty metadata for the given workdir.
    pub fn new(workdir_name: impl Into<String>) -> Self {
        Self {
            workdir_name: workdir_name.into(),
            ..Default::default()
        }
    }

    /// Returns the saved files as a path-keyed map.
    pub fn file_map(&self) -> FileSnapshot {
        self.files
            .iter()
            .map(|entry| (entry.path.clone(), entry.content.clone()))
            .collect()
    }
}

impl UpdateRuntimeRequest {
    /// An update that only changes the status.
    pub fn status(status: RuntimeStatus) -> Self {
        Self {
            status: Some(status),
            metadata: None,
        }
    }

    /// An update that only changes metadata.
    pub fn metadata(patch: MetadataPatch) -> Self {
        Self {
            status: None,
            metadata: Some(patch),
        }
    }
}

impl MetadataPatch {
    /// A patch replacing the stored snapshot with `snapshot`.
    pub fn files(workdir_name: impl Into<String>, snapshot: FileSnapshot) -> Self {
        Self {
            workdir_name: Some(workdir_name.into()),
            files: Some(
                snapshot
                    .into_iter()
                    .map(|(path, content)| FileEntry { path, content })
                    .collect(),
            ),
            ..Default::default()
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuntimeStatus {
    type Err = SiteboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(RuntimeStatus::Creating),
            "active" => Ok(RuntimeStatus::Active),
            "stopped" => Ok(RuntimeStatus::Stopped),
            "error" => Ok(RuntimeStatus::Error),
            _ => Err(SiteboxError::InvalidStatus(s.to_string())),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads a backend timestamp, yielding `None` for any shape that cannot be interpreted.
///
/// Accepts RFC 3339 strings, zone-less ISO strings (taken as UTC), epoch milliseconds and
/// `{ "_seconds", "_nanoseconds" }` maps.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let timestamp = value.as_ref().and_then(parse_timestamp);
    if value.is_some() && timestamp.is_none() {
        tracing::debug!("ignoring unrecognized timestamp: {:?}", value);
    }

    Ok(timestamp)
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|t| t.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => {
            let seconds = map.get("_seconds").or_else(|| map.get("seconds"))?.as_i64()?;
            let nanos = map
                .get("_nanoseconds")
                .or_else(|| map.get("nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanos)
        }
        _ => None,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_runtime_status_transitions() {
        use RuntimeStatus::*;

        assert!(Creating.can_transition_to(Active));
        assert!(Creating.can_transition_to(Error));
        assert!(Active.can_transition_to(Error));

        assert!(!Active.can_transition_to(Creating));
        assert!(!Active.can_transition_to(Active));
        assert!(!Error.can_transition_to(Active));
        assert!(!Error.can_transition_to(Creating));
        assert!(!Stopped.can_transition_to(Active));
    }

    #[test]
    fn test_runtime_status_from_str() {
        assert_eq!("active".parse::<RuntimeStatus>().unwrap(), RuntimeStatus::Active);
        assert_eq!("error".parse::<RuntimeStatus>().unwrap(), RuntimeStatus::Error);
        assert!("Active".parse::<RuntimeStatus>().is_err());
        assert!("".parse::<RuntimeStatus>().is_err());
    }

    #[test]
    fn test_update_request_omits_unset_fields() {
        let body = serde_json::to_value(UpdateRuntimeRequest::status(RuntimeStatus::Active)).unwrap();
        assert_eq!(body, json!({ "status": "active" }));

        let patch = MetadataPatch {
            workdir_name: Some("project".to_string()),
            ports: Some(vec![5173]),
            url: Some("http://localhost:5173".to_string()),
            ..Default::default()
        };
        let body = serde_json::to_value(UpdateRuntimeRequest::metadata(patch)).unwrap();
        assert_eq!(
            body,
            json!({
                "metadata": {
                    "workdirName": "project",
                    "ports": [5173],
                    "url": "http://localhost:5173"
                }
            })
        );
    }

    #[test]
    fn test_files_patch_preserves_every_entry() {
        let mut snapshot = FileSnapshot::new();
        snapshot.insert("/index.html".to_string(), "<html></html>".to_string());
        snapshot.insert("/src/main.ts".to_string(), "console.log(1)".to_string());

        let patch = MetadataPatch::files("project", snapshot.clone());
        let metadata = RuntimeMetadata {
            workdir_name: "project".to_string(),
            files: patch.files.unwrap(),
            ..Default::default()
        };

        assert_eq!(metadata.file_map(), snapshot);
    }

    #[test]
    fn test_record_deserializes_backend_payload() {
        let record: RuntimeRecord = serde_json::from_value(json!({
            "id": "wc_1",
            "projectId": "p1",
            "name": "WebContainer-1700000000000",
            "status": "creating",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z",
            "metadata": { "workdirName": "project" },
            "userId": "u1"
        }))
        .unwrap();

        assert_eq!(record.id, "wc_1");
        assert_eq!(record.status, RuntimeStatus::Creating);
        let metadata = record.metadata.unwrap();
        assert!(metadata.ports.is_empty());
        assert!(metadata.files.is_empty());
        assert!(metadata.url.is_none());
    }

    #[test]
    fn test_record_tolerates_foreign_timestamps() {
        let record: RuntimeRecord = serde_json::from_value(json!({
            "id": "wc_2",
            "projectId": "p1",
            "name": "WebContainer-1",
            "status": "active",
            "createdAt": "2024-05-01T10:00:00",
            "updatedAt": { "_seconds": 1714557600, "_nanoseconds": 0 }
        }))
        .unwrap();

        let expected = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(record.created_at, Some(expected));
        assert_eq!(record.updated_at, Some(expected));

        let record: RuntimeRecord = serde_json::from_value(json!({
            "id": "wc_3",
            "projectId": "p1",
            "name": "WebContainer-2",
            "status": "creating",
            "createdAt": "yesterday",
            "updatedAt": null
        }))
        .unwrap();

        assert_eq!(record.id, "wc_3");
        assert!(record.created_at.is_none());
        assert!(record.updated_at.is_none());
    }
}
