use safeagree_core::{AnalysisResult, SourceKind};
use serde::Deserialize;

/// A pasted block at or above this length is a document, never a service
/// name; it must be analyzed live even if it mentions a known service.
pub const SHORTCUT_MAX_TEXT_CHARS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
struct KnownServiceEntry {
    key: String,
    result: AnalysisResult,
}

/// Static table of precomputed analyses for well-known services.
///
/// Built once at startup and injected read-only; substring matching against
/// short inputs is a deliberate approximation (a 99-char snippet that happens
/// to contain "google" will match), chosen over triggering live analysis for
/// every bare service name.
#[derive(Debug, Clone)]
pub struct KnownServices {
    entries: Vec<KnownServiceEntry>,
}

impl KnownServices {
    /// Table distilled from previously analyzed mainstream services.
    pub fn builtin() -> Self {
        let entries: Vec<KnownServiceEntry> =
            serde_json::from_str(include_str!("known_services.json"))
                .expect("embedded known_services.json is valid");
        Self { entries }
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring lookup. Eligible only for URL submissions
    /// and short typed inputs; returns the first matching entry in table order.
    pub fn resolve(&self, kind: SourceKind, raw_input: &str) -> Option<AnalysisResult> {
        let eligible = kind == SourceKind::Url
            || raw_input.chars().count() < SHORTCUT_MAX_TEXT_CHARS;
        if !eligible {
            return None;
        }
        let needle_haystack = raw_input.to_lowercase();
        self.entries
            .iter()
            .find(|e| needle_haystack.contains(&e.key))
            .map(|e| e.result.clone())
    }
}
