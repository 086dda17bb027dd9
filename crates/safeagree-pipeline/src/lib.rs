//! Document ingestion and multi-provider analysis pipeline.
//!
//! Flow: shortcut table -> content extraction -> provider failover chain ->
//! result parsing. The conversational assistant and the snapshot codec are
//! independent entry points over the same `AnalysisResult`.

pub mod analyze;
pub mod assistant;
pub mod chain;
pub mod extract;
pub mod knowledge;
pub mod openai_compat;
pub mod parse;
pub mod shorten;
pub mod snapshot;

pub use analyze::{Analyzer, AnalyzerConfig};
pub use assistant::Assistant;
pub use chain::FailoverChain;
pub use extract::{Extractor, ExtractorConfig};
pub use knowledge::KnownServices;
pub use openai_compat::OpenAiCompatClient;
pub use shorten::Shortener;

use std::time::Duration;

/// Shared outbound HTTP client with hang-avoidance defaults. Per-request
/// timeouts (fetch, provider attempts) still apply on top.
pub fn default_http_client() -> safeagree_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| safeagree_core::Error::Fetch(e.to_string()))
}
