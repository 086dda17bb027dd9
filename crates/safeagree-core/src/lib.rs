use serde::{Deserialize, Serialize};

/// Hard cap on analyzable text, enforced before any network/model call.
pub const MAX_CHARS: usize = 300_000;
/// Anything shorter than this is rejected as not analyzable.
pub const MIN_ANALYZABLE_CHARS: usize = 50;
/// Hard cap on uploaded PDF bytes.
pub const MAX_PDF_BYTES: usize = 10 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },
    #[error("unreadable pdf: {0}")]
    UnreadablePdf(String),
    #[error("content too short: {chars} chars (min {min})")]
    ContentTooShort { chars: usize, min: usize },
    #[error("provider failed: {0}")]
    Provider(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("all providers exhausted after {} attempts", .0.len())]
    AllProvidersExhausted(Vec<ProviderAttempt>),
    #[error("unparseable model response: {0}")]
    UnparseableResponse(String),
    #[error("shorten failed: {0}")]
    Shorten(String),
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One failed attempt in a failover run. Diagnostics only; never shown
/// verbatim to end users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Url,
    Text,
    File,
}

#[derive(Debug, Clone)]
pub enum EnvelopePayload {
    Text(String),
    Binary(Vec<u8>),
}

impl EnvelopePayload {
    /// Text view of the payload, if it has one. Binary uploads have none.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EnvelopePayload::Text(s) => Some(s),
            EnvelopePayload::Binary(_) => None,
        }
    }
}

/// One incoming submission. Created per request, discarded after extraction.
#[derive(Debug, Clone)]
pub struct InputEnvelope {
    pub kind: SourceKind,
    pub payload: EnvelopePayload,
    /// Declared media type ("application/pdf" for uploads; informational otherwise).
    pub declared_type: String,
}

/// Plain-text, length-bounded representation of the submitted content.
///
/// Invariant: `text.chars().count() <= MAX_CHARS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    pub text: String,
    pub source_kind: SourceKind,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedFlag {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GreenFlag {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrayFlag {
    pub title: String,
    pub value: String,
}

/// The canonical analysis output. Produced once per request (precomputed or
/// model-generated) and never mutated afterwards.
///
/// Field names are camelCase on the wire. Optional arrays tolerate absence:
/// model output is parsed best-effort beyond basic shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub score: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub red_flags: Vec<RedFlag>,
    #[serde(default)]
    pub green_flags: Vec<GreenFlag>,
    #[serde(default)]
    pub gray_flags: Vec<GrayFlag>,
    /// Full document text carried for follow-up chat context. Stripped by the
    /// snapshot codec; must never appear in a shared token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_text: Option<String>,
}

impl AnalysisResult {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_score(self.score)
    }
}

/// Score banding used consistently by every consumer (render, export, share).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Caution,
    Risky,
}

impl Verdict {
    pub fn from_score(score: i64) -> Self {
        if score >= 80 {
            Verdict::Safe
        } else if score >= 60 {
            Verdict::Caution
        } else {
            Verdict::Risky
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Safe => "Safe",
            Verdict::Caution => "Caution",
            Verdict::Risky => "Risky",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Generation knobs for one completion call.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u64>,
    /// Bound on one provider attempt; a hung call advances the chain.
    pub timeout_ms: u64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: None,
            top_p: None,
            max_tokens: None,
            timeout_ms: 60_000,
        }
    }
}

/// An external chat-completion backend invoked with a message list.
///
/// Stateless; configured at process start. A provider with no credential is
/// absent from the chain, not merely disabled.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String>;
}
