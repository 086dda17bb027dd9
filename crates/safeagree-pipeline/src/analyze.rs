use crate::chain::FailoverChain;
use crate::extract::Extractor;
use crate::knowledge::KnownServices;
use crate::parse;
use safeagree_core::{
    AnalysisResult, ChatMessage, GenerationParams, InputEnvelope, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// System prompt for the analysis path. Demands a strict JSON shape; the
/// near-zero temperature in `analysis_params` biases toward conformance.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are SafeAgree, an AI legal document analyzer. Your job is to analyze Terms of Service, Privacy Policies, and Contracts to identify potential risks and benefits for the user.

Analyze the provided text and return a JSON response with this exact structure:
{
  "score": <number 0-100, where 100 is safest>,
  "summary": "<one sentence summary of the document>",
  "redFlags": [
    {
      "title": "<short title>",
      "description": "<explanation of why this is concerning>",
      "severity": "high" | "medium" | "low"
    }
  ],
  "greenFlags": [
    {
      "title": "<short title>",
      "description": "<explanation of why this is good>"
    }
  ],
  "grayFlags": [
    {
      "title": "<category name>",
      "value": "<the value/detail>"
    }
  ]
}

Guidelines:
- Red Flags: Data selling, arbitration clauses, perpetual licenses, hidden fees, difficult cancellation
- Green Flags: GDPR compliance, easy deletion, refund policies, encryption, data portability
- Gray Flags: "Contact" (email/link), "Jurisdiction", "Age", "Notice Period". Keep values SHORT.
- Be concise but specific
- Score 80-100 = Safe, 60-79 = Caution, 0-59 = Risky
- Respond ONLY with valid JSON. No markdown, no explanations."#;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Matches the perceived latency of the live path so precomputed results
    /// do not look suspiciously instant next to real scans.
    pub shortcut_delay: Duration,
    /// Bound on one provider attempt.
    pub provider_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            shortcut_delay: Duration::from_millis(800),
            provider_timeout: Duration::from_secs(60),
        }
    }
}

/// The main pipeline: shortcut -> extract -> failover chain -> parse.
///
/// Stateless per request; the shortcut table and provider chain are read-only
/// after construction.
pub struct Analyzer {
    extractor: Extractor,
    known: KnownServices,
    chain: Arc<FailoverChain>,
    cfg: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(
        extractor: Extractor,
        known: KnownServices,
        chain: Arc<FailoverChain>,
        cfg: AnalyzerConfig,
    ) -> Self {
        Self {
            extractor,
            known,
            chain,
            cfg,
        }
    }

    pub fn chain(&self) -> Arc<FailoverChain> {
        self.chain.clone()
    }

    fn analysis_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: Some(0.0),
            top_p: None,
            max_tokens: Some(4096),
            timeout_ms: self.cfg.provider_timeout.as_millis() as u64,
        }
    }

    pub async fn analyze(&self, envelope: InputEnvelope) -> Result<AnalysisResult> {
        // Shortcut check runs against the raw input, before any extraction or
        // network call. File uploads have no text to match.
        if let Some(raw) = envelope.payload.as_text() {
            if let Some(hit) = self.known.resolve(envelope.kind, raw) {
                info!(kind = ?envelope.kind, "known service matched, returning precomputed result");
                tokio::time::sleep(self.cfg.shortcut_delay).await;
                return Ok(hit);
            }
        }

        let doc = self.extractor.extract(&envelope).await?;
        debug!(
            chars = doc.text.chars().count(),
            truncated = doc.truncated,
            kind = ?doc.source_kind,
            "document normalized"
        );

        let messages = [
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(format!("Analyze this document:\n\n{}", doc.text)),
        ];
        let raw = self.chain.run(&messages, &self.analysis_params()).await?;

        let mut result = parse::extract_analysis(&raw)?;
        // Carried for follow-up chat; the snapshot codec strips it before any
        // result leaves this process as a share token.
        result.document_text = Some(doc.text);
        Ok(result)
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("known_services", &self.known.len())
            .field("chain", &self.chain)
            .finish()
    }
}
