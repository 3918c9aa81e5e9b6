//! Panel protocol: the JSON messages exchanged with the editor-side UI.
//!
//! Both directions are tagged by a `type` field. Shapes are part of the
//! contract with the panel and must not change casually.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The user's live document, as captured by the host editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDocument {
    pub path: String,
    pub content: String,
}

/// What the panel knows when it asks for a review; the controller fills in
/// the rest from disk and session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    #[serde(default)]
    pub document: Option<ActiveDocument>,
    #[serde(default)]
    pub code_smells: Option<Vec<String>>,
    #[serde(default)]
    pub test_results: Option<String>,
}

/// Inbound intents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelIntent {
    Submit {
        topic: String,
        #[serde(default)]
        smells: Vec<String>,
    },
    Review {
        #[serde(default)]
        payload: ReviewDraft,
    },
    ShowAnswerFile,
}

/// The two network-backed actions a session can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightKind {
    Generate,
    Review,
}

impl fmt::Display for FlightKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FlightKind::Generate => write!(f, "generate"),
            FlightKind::Review => write!(f, "review"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    Busy,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Summary sent after a successful generation, matching the panel's
/// historical `response` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    pub topic: String,
    pub smells: Vec<String>,
    pub question: String,
}

/// Outbound messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelMessage {
    Status {
        state: ActivityState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<FlightKind>,
    },
    Rejected {
        kind: FlightKind,
        reason: String,
    },
    GenerateComplete {
        files: Vec<String>,
    },
    Response {
        data: ResponseData,
    },
    ReviewResponse {
        messages: Vec<String>,
    },
    ReviewError {
        error: String,
    },
    AnswerFile {
        path: String,
        content: String,
    },
    Notice {
        level: NoticeLevel,
        text: String,
    },
}

impl PanelMessage {
    pub fn busy(kind: FlightKind) -> Self {
        PanelMessage::Status {
            state: ActivityState::Busy,
            kind: Some(kind),
        }
    }

    pub fn idle() -> Self {
        PanelMessage::Status {
            state: ActivityState::Idle,
            kind: None,
        }
    }

    pub fn notice(level: NoticeLevel, text: impl Into<String>) -> Self {
        PanelMessage::Notice {
            level,
            text: text.into(),
        }
    }
}
