// detectAI Data Models
// Submission, result and session types shared by the controller and the client

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// AI probability (0-100) above which the verdict is `ai`.
pub const AI_THRESHOLD: f64 = 70.0;
/// AI probability (0-100) below which the verdict is `human`.
pub const HUMAN_THRESHOLD: f64 = 30.0;

// ============ Content ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
}

impl ContentKind {
    pub fn parse(val: &str) -> Option<Self> {
        match val.trim().to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Backend route for this kind, relative to the base URL.
    pub fn route(&self) -> &'static str {
        match self {
            Self::Text => "/predict/text",
            Self::Image => "/predict/image",
            Self::Video => "/predict/video",
        }
    }

    /// MIME family prefix a file must carry for this kind. Text takes no file.
    pub fn mime_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Image => Some("image/"),
            Self::Video => Some("video/"),
        }
    }

    pub fn accepts_mime(&self, mime_type: &str) -> bool {
        match self.mime_prefix() {
            Some(prefix) => mime_type.trim().to_ascii_lowercase().starts_with(prefix),
            None => false,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ContentPayload {
    Text(String),
    File(FileUpload),
}

impl ContentPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn file(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::File(FileUpload::new(name, mime_type, bytes))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => format!("text ({} chars)", text.chars().count()),
            Self::File(file) => format!("{} ({}, {} bytes)", file.name, file.mime_type, file.size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSubmission {
    pub kind: ContentKind,
    pub payload: Option<ContentPayload>,
}

impl ContentSubmission {
    pub fn new(kind: ContentKind) -> Self {
        Self { kind, payload: None }
    }

    pub fn with_payload(kind: ContentKind, payload: ContentPayload) -> Self {
        Self {
            kind,
            payload: Some(payload),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.payload.is_some()
    }
}

// ============ Analysis Result ============

/// Serialized as `{"verdict": "<kind>"}`, with the backend text under
/// `label` for `Labeled` so a label that reads "ai" stays distinct from `Ai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "label", rename_all = "lowercase")]
pub enum Verdict {
    Human,
    Ai,
    Uncertain,
    /// Display label supplied verbatim by the backend.
    Labeled(String),
    /// Backend response carried neither a label nor a probability.
    Unknown,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Leaning {
    Ai,
    Human,
    Undetermined,
}

impl Verdict {
    /// Threshold policy over an AI probability expressed in percent.
    pub fn from_probability(ai_probability: f64) -> Self {
        if ai_probability > AI_THRESHOLD {
            Self::Ai
        } else if ai_probability < HUMAN_THRESHOLD {
            Self::Human
        } else {
            Self::Uncertain
        }
    }

    pub fn display(&self) -> &str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::Uncertain => "uncertain",
            Self::Labeled(label) => label.as_str(),
            Self::Unknown => "Unknown",
        }
    }

    pub fn leaning(&self) -> Leaning {
        match self {
            Self::Ai => Leaning::Ai,
            Self::Human => Leaning::Human,
            Self::Uncertain | Self::Unknown => Leaning::Undetermined,
            Self::Labeled(label) => {
                let lower = label.to_lowercase();
                if lower.contains("ai generated") {
                    Leaning::Ai
                } else if lower.contains("human") {
                    Leaning::Human
                } else {
                    Leaning::Undetermined
                }
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// What an uploaded file looked like when it was analyzed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

impl From<&FileUpload> for AnalyzedFile {
    fn from(file: &FileUpload) -> Self {
        Self {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Calibration figure in [0, 100], independent of the verdict.
    pub confidence: f64,
    /// Raw model score in [0, 100]; absent when the backend sent no probability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_probability: Option<f64>,
    /// Request round-trip, filled in by the client that made the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
    /// Set for image and video submissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<AnalyzedFile>,
}

impl AnalysisResult {
    pub fn new(verdict: Verdict, confidence: f64, ai_probability: Option<f64>) -> Self {
        Self {
            verdict,
            confidence,
            ai_probability,
            processing_ms: None,
            analyzed_at: None,
            file: None,
        }
    }

    /// Stamp the result with how long the request took and when it finished.
    pub fn timed(mut self, processing_ms: u64, analyzed_at: DateTime<Utc>) -> Self {
        self.processing_ms = Some(processing_ms);
        self.analyzed_at = Some(analyzed_at);
        self
    }

    pub fn for_file(mut self, file: &FileUpload) -> Self {
        self.file = Some(AnalyzedFile::from(file));
        self
    }

    pub fn leaning(&self) -> Leaning {
        self.verdict.leaning()
    }
}

// ============ Session ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    Start,
    SelectKind,
    Submit,
    Pending,
    Result,
    Done,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SelectKind => "select-kind",
            Self::Submit => "submit",
            Self::Pending => "pending",
            Self::Result => "result",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Created at login, dropped at logout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub user: Option<String>,
}

impl SessionInfo {
    pub fn new(user: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub page: Page,
    pub session: Option<SessionInfo>,
    pub submission: Option<ContentSubmission>,
    pub result: Option<AnalysisResult>,
    /// Message of the most recent analysis failure, cleared by the next accepted event.
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            page: Page::Start,
            session: None,
            submission: None,
            result: None,
            last_error: None,
        }
    }
}
