use safeagree_core::{
    EnvelopePayload, Error, InputEnvelope, NormalizedDocument, Result, SourceKind, MAX_CHARS,
    MAX_PDF_BYTES, MIN_ANALYZABLE_CHARS,
};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

/// Direct fetch results shorter than this suggest a JavaScript-rendered shell
/// that a plain GET cannot see; we retry through the reader proxy.
pub const READER_FALLBACK_THRESHOLD: usize = 500;

/// Sent on outbound page fetches. Some legal-document hosts refuse
/// default library User-Agents outright.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_chars: usize,
    pub min_chars: usize,
    pub reader_threshold: usize,
    pub max_pdf_bytes: usize,
    /// Server-side rendering reader proxy, `None` disables the fallback.
    pub reader_base_url: Option<String>,
    pub fetch_timeout: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_chars: MAX_CHARS,
            min_chars: MIN_ANALYZABLE_CHARS,
            reader_threshold: READER_FALLBACK_THRESHOLD,
            max_pdf_bytes: MAX_PDF_BYTES,
            reader_base_url: Some("https://r.jina.ai".to_string()),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Turns a typed submission (url | text | file) into bounded plain text.
#[derive(Debug, Clone)]
pub struct Extractor {
    client: reqwest::Client,
    cfg: ExtractorConfig,
}

impl Extractor {
    pub fn new(client: reqwest::Client, cfg: ExtractorConfig) -> Self {
        Self { client, cfg }
    }

    pub async fn extract(&self, envelope: &InputEnvelope) -> Result<NormalizedDocument> {
        let (text, truncated) = match (envelope.kind, &envelope.payload) {
            (SourceKind::Url, EnvelopePayload::Text(url)) => self.extract_url(url).await?,
            (SourceKind::Text, EnvelopePayload::Text(content)) => {
                truncate_to_chars(content.trim(), self.cfg.max_chars)
            }
            (SourceKind::File, EnvelopePayload::Binary(bytes)) => {
                self.extract_pdf(bytes, &envelope.declared_type)?
            }
            // A file submission without binary payload (or vice versa) is a
            // caller bug surfaced as an input error, not a panic.
            (kind, _) => {
                return Err(Error::UnsupportedFileType(format!(
                    "payload does not match source kind {kind:?}"
                )))
            }
        };

        let chars = text.chars().count();
        if chars < self.cfg.min_chars {
            return Err(Error::ContentTooShort {
                chars,
                min: self.cfg.min_chars,
            });
        }

        Ok(NormalizedDocument {
            text,
            source_kind: envelope.kind,
            truncated,
        })
    }

    async fn extract_url(&self, raw_url: &str) -> Result<(String, bool)> {
        let url = normalize_url(raw_url)?;

        let body = self.fetch_page(url.as_str()).await?;
        let primary = html_to_text(&body);

        // Reader fallback: script-heavy single-page apps yield near-empty text
        // from a direct fetch. Prefer the rendered variant only when it
        // actually adds content; reader failure is never fatal.
        let text = if primary.chars().count() < self.cfg.reader_threshold {
            match self.fetch_via_reader(url.as_str()).await {
                Ok(rendered) if rendered.chars().count() > primary.chars().count() => {
                    debug!(url = %url, "reader fallback produced more content");
                    rendered
                }
                Ok(_) => primary,
                Err(e) => {
                    warn!(url = %url, error = %e, "reader fallback failed");
                    primary
                }
            }
        } else {
            primary
        };

        Ok(truncate_to_chars(&text, self.cfg.max_chars))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .timeout(self.cfg.fetch_timeout)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {status}")));
        }
        resp.text().await.map_err(|e| Error::Fetch(e.to_string()))
    }

    async fn fetch_via_reader(&self, url: &str) -> Result<String> {
        let base = self
            .cfg
            .reader_base_url
            .as_deref()
            .ok_or_else(|| Error::NotConfigured("reader fallback disabled".to_string()))?;
        let reader_url = format!("{}/{}", base.trim_end_matches('/'), url);
        let body = self.fetch_page(&reader_url).await?;
        // Readers return markdown-ish plain text; normalize the same way.
        Ok(norm_ws(&body))
    }

    fn extract_pdf(&self, bytes: &[u8], declared_type: &str) -> Result<(String, bool)> {
        let declared = declared_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if declared != "application/pdf" && !bytes_look_like_pdf(bytes) {
            return Err(Error::UnsupportedFileType(declared));
        }
        if bytes.len() > self.cfg.max_pdf_bytes {
            return Err(Error::FileTooLarge {
                size: bytes.len(),
                max: self.cfg.max_pdf_bytes,
            });
        }

        let raw = pdf_to_text(bytes).map_err(Error::UnreadablePdf)?;
        let text = norm_ws(&raw);
        // A near-empty extraction means an image-only or encrypted PDF, not a
        // short document.
        if text.chars().count() < self.cfg.min_chars {
            return Err(Error::UnreadablePdf(
                "no extractable text layer".to_string(),
            ));
        }
        Ok(truncate_to_chars(&text, self.cfg.max_chars))
    }
}

fn normalize_url(raw: &str) -> Result<url::Url> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(Error::InvalidUrl("empty url".to_string()));
    }
    // Users paste bare hosts; default to https rather than rejecting.
    let candidate = if s.contains("://") {
        s.to_string()
    } else {
        format!("https://{s}")
    };
    let parsed = url::Url::parse(&candidate).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::InvalidUrl(format!("unsupported scheme: {other}"))),
    }
}

/// Convert an HTML page to whitespace-collapsed plain text.
///
/// Script/style/noscript contents are dropped first so code and CSS never leak
/// into analyzable text; then the remaining markup is rendered and whitespace
/// runs collapse to single spaces.
pub fn html_to_text(html: &str) -> String {
    let html = strip_tag_blocks(html, "script");
    let html = strip_tag_blocks(&html, "style");
    let html = strip_tag_blocks(&html, "noscript");
    // Wrap width is irrelevant once whitespace collapses, but html2text pads
    // some blocks (rules, tables) to the given width, so keep it modest.
    let rendered =
        html2text::from_read(Cursor::new(html.as_bytes()), 200).unwrap_or_else(|_| html.clone());
    norm_ws(&rendered)
}

/// Extract text from in-memory PDF bytes.
pub fn pdf_to_text(bytes: &[u8]) -> std::result::Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
}

/// Best-effort sniff for PDF bytes (magic header).
pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tag_blocks(html: &str, tag: &str) -> String {
    // Minimal, best-effort stripper for <tag ...> ... </tag> blocks; only
    // removes when it finds a close tag, ASCII-case-insensitive on tag names.
    let tag_lc = tag.to_ascii_lowercase();
    let open_pat = format!("<{}", tag_lc);
    let close_pat = format!("</{}>", tag_lc);

    let mut out = String::new();
    let mut i = 0usize;
    let lower = html.to_ascii_lowercase();
    while let Some(rel_start) = lower[i..].find(&open_pat) {
        let start = i + rel_start;
        let after_open = start + open_pat.len();
        if let Some(rel_end) = lower[after_open..].find(&close_pat) {
            let end = after_open + rel_end + close_pat.len();
            out.push_str(&html[i..start]);
            i = end;
        } else {
            break;
        }
    }
    out.push_str(&html[i..]);
    out
}

/// Char-counted truncation; returns (text, clipped).
pub fn truncate_to_chars(s: &str, max_chars: usize) -> (String, bool) {
    let mut out = String::new();
    for (n, ch) in s.chars().enumerate() {
        if n >= max_chars {
            return (out, true);
        }
        out.push(ch);
    }
    (out, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use proptest::prelude::*;
    use std::net::SocketAddr;

    fn extractor_for_test(reader: Option<String>) -> Extractor {
        let cfg = ExtractorConfig {
            reader_base_url: reader,
            ..ExtractorConfig::default()
        };
        Extractor::new(reqwest::Client::new(), cfg)
    }

    async fn spawn(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn text_envelope(content: &str) -> InputEnvelope {
        InputEnvelope {
            kind: SourceKind::Text,
            payload: EnvelopePayload::Text(content.to_string()),
            declared_type: "text/plain".to_string(),
        }
    }

    #[test]
    fn html_to_text_drops_script_and_style_contents() {
        let html = r#"<html><head><style>body { color: red; }</style></head>
            <body><script>var secret = "leak";</script><p>Visible clause text.</p></body></html>"#;
        let out = html_to_text(html);
        assert!(out.contains("Visible clause text."));
        assert!(!out.contains("leak"));
        assert!(!out.contains("color: red"));
    }

    #[test]
    fn html_to_text_collapses_whitespace_runs() {
        let out = html_to_text("<p>a</p>\n\n\n<p>b     c</p>");
        assert_eq!(out, "a b c");
    }

    #[test]
    fn unterminated_script_block_does_not_eat_the_document() {
        let html = "<p>before</p><script>while(true) {}";
        let out = html_to_text(html);
        assert!(out.contains("before"));
    }

    #[tokio::test]
    async fn text_input_is_passed_through_with_truncation_only() {
        let ex = extractor_for_test(None);
        let long = "contract clause ".repeat(40);
        let doc = ex.extract(&text_envelope(&long)).await.unwrap();
        assert!(!doc.truncated);
        assert_eq!(doc.source_kind, SourceKind::Text);
        assert!(doc.text.contains("contract clause"));
    }

    #[tokio::test]
    async fn too_short_content_is_rejected_for_every_source_kind() {
        let ex = extractor_for_test(None);
        let err = ex.extract(&text_envelope("tiny")).await.unwrap_err();
        assert!(matches!(err, Error::ContentTooShort { .. }));
    }

    #[tokio::test]
    async fn url_fetch_failure_maps_to_fetch_error() {
        let ex = extractor_for_test(None);
        let envelope = InputEnvelope {
            kind: SourceKind::Url,
            payload: EnvelopePayload::Text("http://127.0.0.1:1/".to_string()),
            declared_type: String::new(),
        };
        let err = ex.extract(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn url_non_success_status_maps_to_fetch_error() {
        let app = Router::new().route("/", get(|| async { (StatusCode::FORBIDDEN, "nope") }));
        let addr = spawn(app).await;
        let ex = extractor_for_test(None);
        let envelope = InputEnvelope {
            kind: SourceKind::Url,
            payload: EnvelopePayload::Text(format!("http://{addr}/")),
            declared_type: String::new(),
        };
        let err = ex.extract(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn url_extraction_strips_markup_from_fetched_page() {
        let page = format!(
            "<html><body><script>ignore();</script><h1>Terms</h1><p>{}</p></body></html>",
            "You agree to the following conditions of service. ".repeat(20)
        );
        let app = Router::new().route("/", get(move || async move { axum::response::Html(page) }));
        let addr = spawn(app).await;
        let ex = extractor_for_test(None);
        let envelope = InputEnvelope {
            kind: SourceKind::Url,
            payload: EnvelopePayload::Text(format!("http://{addr}/")),
            declared_type: String::new(),
        };
        let doc = ex.extract(&envelope).await.unwrap();
        assert!(doc.text.contains("Terms"));
        assert!(!doc.text.contains("ignore()"));
        assert!(!doc.text.contains('<'));
    }

    #[tokio::test]
    async fn short_direct_fetch_prefers_reader_fallback_content() {
        // Script-only shell: direct fetch yields almost nothing.
        let shell = "<html><body><script>render()</script></body></html>".to_string();
        let rendered = "Rendered terms of service body. ".repeat(30);
        let rendered_for_route = rendered.clone();

        let app = Router::new()
            .route("/", get(move || async move { axum::response::Html(shell) }))
            // The reader proxy receives the full original URL appended to its base.
            .fallback(get(move || async move { rendered_for_route }));
        let addr = spawn(app).await;

        let ex = extractor_for_test(Some(format!("http://{addr}")));
        let envelope = InputEnvelope {
            kind: SourceKind::Url,
            payload: EnvelopePayload::Text(format!("http://{addr}/")),
            declared_type: String::new(),
        };
        let doc = ex.extract(&envelope).await.unwrap();
        assert!(doc.text.contains("Rendered terms of service"));
    }

    #[tokio::test]
    async fn reader_failure_keeps_the_original_short_result() {
        let shell = "<html><body><script>render()</script></body></html>".to_string();
        let app = Router::new().route("/", get(move || async move { axum::response::Html(shell) }));
        let addr = spawn(app).await;

        // Reader base points at a closed port: fallback fails, original (too
        // short) result flows into the final length gate.
        let ex = extractor_for_test(Some("http://127.0.0.1:1".to_string()));
        let envelope = InputEnvelope {
            kind: SourceKind::Url,
            payload: EnvelopePayload::Text(format!("http://{addr}/")),
            declared_type: String::new(),
        };
        let err = ex.extract(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::ContentTooShort { .. }));
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected() {
        let ex = extractor_for_test(None);
        let envelope = InputEnvelope {
            kind: SourceKind::File,
            payload: EnvelopePayload::Binary(b"plain text pretending".to_vec()),
            declared_type: "text/plain".to_string(),
        };
        let err = ex.extract(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
    }

    #[tokio::test]
    async fn oversized_pdf_is_rejected_before_parsing() {
        let ex = extractor_for_test(None);
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(MAX_PDF_BYTES + 1, 0);
        let envelope = InputEnvelope {
            kind: SourceKind::File,
            payload: EnvelopePayload::Binary(bytes),
            declared_type: "application/pdf".to_string(),
        };
        let err = ex.extract(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { .. }));
    }

    /// Minimal single-page PDF drawing `text` with the built-in Helvetica
    /// font. Object offsets in the xref table are computed from the assembled
    /// bytes, so the file is structurally valid. `text` must not contain
    /// parentheses or backslashes.
    fn minimal_pdf(text: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
            format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ),
        ];

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }
        let xref_at = out.len();
        out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
        out.push_str("0000000000 65535 f \n");
        for off in offsets {
            out.push_str(&format!("{off:010} 00000 n \n"));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        ));
        out.into_bytes()
    }

    fn pdf_envelope(bytes: Vec<u8>) -> InputEnvelope {
        InputEnvelope {
            kind: SourceKind::File,
            payload: EnvelopePayload::Binary(bytes),
            declared_type: "application/pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn pdf_text_layer_is_extracted_and_normalized() {
        let ex = extractor_for_test(None);
        let body =
            "This agreement sets out the obligations of both contracting parties in detail.";
        let doc = ex.extract(&pdf_envelope(minimal_pdf(body))).await.unwrap();
        assert_eq!(doc.source_kind, SourceKind::File);
        assert!(!doc.truncated);
        assert!(doc.text.contains("obligations"));
    }

    #[tokio::test]
    async fn valid_pdf_with_tiny_text_layer_is_unreadable() {
        // Parses fine, but the text layer is far below the analyzable
        // minimum; treated like an image-only scan, not a short document.
        let ex = extractor_for_test(None);
        let err = ex
            .extract(&pdf_envelope(minimal_pdf("Hi")))
            .await
            .unwrap_err();
        match err {
            Error::UnreadablePdf(msg) => assert!(msg.contains("text layer")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn garbage_pdf_bytes_map_to_unreadable_pdf() {
        let ex = extractor_for_test(None);
        let envelope = InputEnvelope {
            kind: SourceKind::File,
            payload: EnvelopePayload::Binary(b"%PDF-1.7 not actually a pdf".to_vec()),
            declared_type: "application/pdf".to_string(),
        };
        let err = ex.extract(&envelope).await.unwrap_err();
        assert!(matches!(err, Error::UnreadablePdf(_)));
    }

    #[test]
    fn bytes_look_like_pdf_sniffs_magic_header() {
        assert!(bytes_look_like_pdf(b"%PDF-1.7\n%..."));
        assert!(!bytes_look_like_pdf(b"<!doctype html>"));
        assert!(!bytes_look_like_pdf(b""));
    }

    #[test]
    fn normalize_url_defaults_to_https_for_bare_hosts() {
        let u = normalize_url("example.com/terms").unwrap();
        assert_eq!(u.scheme(), "https");
        let u = normalize_url("http://example.com/").unwrap();
        assert_eq!(u.scheme(), "http");
        assert!(normalize_url("ftp://example.com").is_err());
        assert!(normalize_url("  ").is_err());
    }

    proptest! {
        #[test]
        fn truncate_to_chars_never_exceeds_the_bound(s in any::<String>(), max in 0usize..1000) {
            let (out, clipped) = truncate_to_chars(&s, max);
            prop_assert!(out.chars().count() <= max);
            prop_assert_eq!(clipped, s.chars().count() > max);
        }

        #[test]
        fn html_to_text_output_has_no_whitespace_runs(s in "[ -~]{0,200}") {
            let out = html_to_text(&s);
            prop_assert!(!out.contains("  "));
            prop_assert!(!out.contains('\n'));
        }
    }
}
