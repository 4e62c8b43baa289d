//! Boundary types for the patch engine
//!
//! Declares the operation algebra, the trailing control block, the
//! parsed-response envelope, and the snapshot the applier consumes.
//! Every boundary (YAML control, JSON rename body, header grammar)
//! decodes through here with typed failures; callers decide whether a
//! failure drops the candidate or aborts.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project file snapshot: path -> content, or `None` when the path is
/// tracked but currently has no file. A path missing from the map entirely
/// is unknown, which matters for delete/rename error semantics.
pub type Snapshot = IndexMap<String, Option<String>>;

/// How a write body is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchDialect {
    /// Body is the full new file contents
    #[default]
    Replace,
    /// Body is a unified diff with ---/+++/@@ headers
    StandardDiff,
    /// Body is one or more SEARCH/REPLACE blocks
    SearchReplace,
}

impl PatchDialect {
    /// Parse an explicit strategy token from a block header
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "replace" => Some(Self::Replace),
            "standard-diff" => Some(Self::StandardDiff),
            "search-replace" => Some(Self::SearchReplace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::StandardDiff => "standard-diff",
            Self::SearchReplace => "search-replace",
        }
    }
}

/// A single validated file mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum FileOperation {
    Write {
        path: String,
        content: String,
        #[serde(default)]
        dialect: PatchDialect,
    },
    Delete {
        path: String,
    },
    Rename {
        from: String,
        to: String,
    },
}

/// Commit message field: a single line or a list of lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommitMessage {
    Single(String),
    Lines(Vec<String>),
}

/// Trailing control metadata recovered from the response tail.
/// Unknown fields are tolerated for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlBlock {
    #[serde(rename = "projectId")]
    pub project_id: String,

    pub uuid: String,

    /// Opaque per-change notes; carried through, never interpreted
    #[serde(rename = "changeSummary", default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<Vec<serde_json::Value>>,

    #[serde(rename = "gitCommitMsg", default, skip_serializing_if = "Option::is_none")]
    pub git_commit_msg: Option<CommitMessage>,

    #[serde(rename = "promptSummary", default, skip_serializing_if = "Option::is_none")]
    pub prompt_summary: Option<String>,
}

/// The full parsed response: control metadata, operations in the textual
/// order their blocks appeared, and the leftover prose split into lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub control: ControlBlock,
    pub operations: Vec<FileOperation>,
    pub reasoning: Vec<String>,
}

/// Boundary validation failures. Parsing treats these as "drop the
/// candidate block", never as a pipeline error.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid YAML: {0}")]
    Yaml(String),

    #[error("control block is not a mapping")]
    NotAMapping,

    #[error("projectId must be a non-empty string")]
    EmptyProjectId,

    #[error("uuid is not a valid UUID: {value}")]
    InvalidUuid { value: String },

    #[error("unknown patch dialect: {value}")]
    UnknownDialect { value: String },

    #[error("invalid rename body: {0}")]
    Rename(String),
}

/// Application failures surfaced by the planner and applier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("cannot delete missing file: {path}")]
    CannotDeleteMissing { path: String },

    #[error("cannot rename missing file: {from}")]
    CannotRenameMissing { from: String },

    #[error("search/replace patch targets a file that does not exist: {path}")]
    SearchReplaceOnNewFile { path: String },

    #[error("patch failed for {path}: {reason}")]
    PatchFailed { path: String, reason: String },
}

/// Decode and validate a control block from raw YAML text.
///
/// Parses through serde_yaml into a JSON value first so downstream
/// handling is uniform and unknown fields fall away silently.
pub fn decode_control(raw: &str) -> Result<ControlBlock, SchemaError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| SchemaError::Yaml(e.to_string()))?;

    if !yaml.is_mapping() {
        return Err(SchemaError::NotAMapping);
    }

    let json = serde_json::to_value(yaml).map_err(|e| SchemaError::Yaml(e.to_string()))?;
    let control: ControlBlock =
        serde_json::from_value(json).map_err(|e| SchemaError::Yaml(e.to_string()))?;

    if control.project_id.trim().is_empty() {
        return Err(SchemaError::EmptyProjectId);
    }

    Uuid::parse_str(&control.uuid).map_err(|_| SchemaError::InvalidUuid {
        value: control.uuid.clone(),
    })?;

    Ok(control)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RenameBody {
    from: String,
    to: String,
}

/// Decode a rename block body: a JSON object with exactly {from, to},
/// both non-empty.
pub fn decode_rename(body: &str) -> Result<(String, String), SchemaError> {
    let parsed: RenameBody =
        serde_json::from_str(body.trim()).map_err(|e| SchemaError::Rename(e.to_string()))?;

    if parsed.from.is_empty() || parsed.to.is_empty() {
        return Err(SchemaError::Rename("from/to must be non-empty".to_string()));
    }

    Ok((parsed.from, parsed.to))
}
