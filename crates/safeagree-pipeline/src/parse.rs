use safeagree_core::{AnalysisResult, Error, Result};

/// Extract the analysis object from free-form model output.
///
/// Models wrap JSON in prose or markdown fences despite instructions; take
/// the span from the first `{` to the last `}` and parse that strictly. A
/// parse failure is terminal for the request: malformed output does not mean
/// the provider is down, so it is never routed back into the failover chain.
pub fn extract_analysis(raw: &str) -> Result<AnalysisResult> {
    let start = raw
        .find('{')
        .ok_or_else(|| Error::UnparseableResponse("no JSON object in output".to_string()))?;
    let end = raw
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| Error::UnparseableResponse("unbalanced JSON object".to_string()))?;

    serde_json::from_str(&raw[start..=end]).map_err(|e| Error::UnparseableResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{"score": 72, "summary": "Mostly fair terms."}"#;

    #[test]
    fn parses_bare_json() {
        let r = extract_analysis(MINIMAL).unwrap();
        assert_eq!(r.score, 72);
        assert_eq!(r.summary, "Mostly fair terms.");
        assert!(r.red_flags.is_empty());
    }

    #[test]
    fn parses_json_wrapped_in_prose_and_fences() {
        let raw = format!("Sure! Here is the analysis:\n```json\n{MINIMAL}\n```\nHope that helps.");
        let r = extract_analysis(&raw).unwrap();
        assert_eq!(r.score, 72);
    }

    #[test]
    fn greedy_span_keeps_nested_objects_intact() {
        let raw = r#"prefix {"score": 10, "summary": "s", "redFlags": [{"title": "t", "description": "d", "severity": "high"}]} suffix"#;
        let r = extract_analysis(raw).unwrap();
        assert_eq!(r.red_flags.len(), 1);
        assert_eq!(
            r.red_flags[0].severity,
            Some(safeagree_core::Severity::High)
        );
    }

    #[test]
    fn out_of_range_score_is_tolerated() {
        // Shape validation only; downstream renders best-effort.
        let r = extract_analysis(r#"{"score": -5, "summary": "odd"}"#).unwrap();
        assert_eq!(r.score, -5);
    }

    #[test]
    fn output_without_braces_is_unparseable() {
        let err = extract_analysis("I could not analyze this document.").unwrap_err();
        assert!(matches!(err, Error::UnparseableResponse(_)));
    }

    #[test]
    fn brace_in_wrong_order_is_unparseable() {
        let err = extract_analysis("} nothing here {").unwrap_err();
        assert!(matches!(err, Error::UnparseableResponse(_)));
    }

    #[test]
    fn non_conforming_object_is_unparseable() {
        let err = extract_analysis(r#"{"verdict": "fine"}"#).unwrap_err();
        assert!(matches!(err, Error::UnparseableResponse(_)));
    }
}
