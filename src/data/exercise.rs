use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A generated file, addressed relative to the project root with forward slashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: String,
    pub content: String,
}

/// Reasons a descriptor path is refused before anything touches the disk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("file descriptor has an empty path")]
    EmptyPath,

    #[error("file descriptor path '{0}' is absolute")]
    AbsolutePath(String),

    #[error("file descriptor path '{0}' escapes the project root")]
    Traversal(String),
}

impl FileDescriptor {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Checks the path invariant: non-empty, relative, no `..` segment.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let raw = self.path.trim();
        if raw.is_empty() {
            return Err(DescriptorError::EmptyPath);
        }

        let looks_like_drive = raw.len() >= 2 && raw.as_bytes()[1] == b':';
        if raw.starts_with('/') || raw.starts_with('\\') || looks_like_drive {
            return Err(DescriptorError::AbsolutePath(self.path.clone()));
        }

        let mut named_segments = 0;
        for segment in raw.split(['/', '\\']) {
            match segment {
                ".." => return Err(DescriptorError::Traversal(self.path.clone())),
                "" | "." => {}
                _ => named_segments += 1,
            }
        }

        if named_segments == 0 {
            return Err(DescriptorError::EmptyPath);
        }
        Ok(())
    }

    /// The path as platform components. Call [`FileDescriptor::validate`] first.
    pub fn relative_path(&self) -> PathBuf {
        self.path
            .trim()
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect()
    }

    /// True when the path names a bare file with no directory part, e.g. `Bank.java`.
    pub fn is_bare_file_name(&self) -> bool {
        self.relative_path().components().count() == 1
    }
}

/// Body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub code_smells: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Success,
    Failure,
    #[serde(other)]
    Unknown,
}

/// The stored answer to an exercise: either a markdown document with fenced
/// code, or already-structured files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceSolution {
    Markdown(String),
    Files(Vec<FileDescriptor>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationData {
    #[serde(default)]
    pub problem_description: String,
    #[serde(default)]
    pub project_files: Vec<FileDescriptor>,
    #[serde(default)]
    pub test_files: Vec<FileDescriptor>,
    #[serde(default)]
    pub reference_solution: Option<ReferenceSolution>,
}

/// Response of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub status: GenerationStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<GenerationData>,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }
}

/// Body of `POST /review`. Every field is plain text; an empty string stands
/// for "not available".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPayload {
    pub problem_description: String,
    pub original_code: String,
    pub student_code: String,
    #[serde(alias = "answers_list")]
    pub reference_solution: String,
    pub test_results: String,
    pub code_smells: Vec<String>,
}

/// Feedback messages extracted from a review response.
///
/// Accepts `{ messages: [string | {text}] }`, `{ message }` or `{ feedback }`;
/// anything else is an empty feedback set.
pub fn review_messages(body: &serde_json::Value) -> Vec<String> {
    if let Some(items) = body.get("messages").and_then(|m| m.as_array()) {
        return items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(text) => Some(text.clone()),
                other => other
                    .get("text")
                    .and_then(|t| t.as_str())
                    .map(str::to_string),
            })
            .collect();
    }

    for key in ["message", "feedback"] {
        if let Some(text) = body.get(key).and_then(|m| m.as_str()) {
            return vec![text.to_string()];
        }
    }

    Vec::new()
}
