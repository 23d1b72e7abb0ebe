//! Recover the JSON object from a model reply.
//!
//! Models are told to answer with a bare JSON object but routinely wrap it in
//! prose ("Here is the result: … Thanks") or markdown fences. The payload is
//! taken to be everything from the **first** `{` to the **last** `}` of the
//! reply, across lines. This is a greedy span, not a balanced-brace scanner:
//!
//! ```text
//! Here is the result: {"a": {"b": 1}} Thanks   →  {"a": {"b": 1}}
//! {"a":1} noise {"b":2}                        →  {"a":1} noise {"b":2}   (fails to parse)
//! ```
//!
//! The second case is accepted behaviour: two independent objects in one
//! reply produce an unparseable span and therefore no record. Nothing is
//! repaired; trailing commas, comments or unescaped quotes are hard failures.

use crate::error::AnalyzerError;
use crate::record::InvoiceRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Longest payload excerpt written to logs and error values.
const LOG_EXCERPT_CHARS: usize = 500;

static RE_OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Return the first-`{`-to-last-`}` span of `reply`, if any.
pub fn extract_payload(reply: &str) -> Option<&str> {
    RE_OBJECT_SPAN.find(reply).map(|m| m.as_str())
}

/// Extract and strictly parse the JSON object in `reply`.
///
/// # Errors
/// * [`AnalyzerError::PayloadNotFound`]: no `{`…`}` span.
/// * [`AnalyzerError::JsonDecode`]: the span is not a valid JSON object.
///   The offending substring is logged together with the parser position.
pub fn parse_record(reply: &str) -> Result<InvoiceRecord, AnalyzerError> {
    let Some(span) = extract_payload(reply) else {
        warn!(
            reply = %truncate(reply, LOG_EXCERPT_CHARS),
            "No JSON object in model reply"
        );
        return Err(AnalyzerError::PayloadNotFound);
    };

    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(span) {
        Ok(map) => {
            debug!(fields = map.len(), "Parsed invoice record");
            Ok(InvoiceRecord::from(map))
        }
        Err(e) => {
            let excerpt = truncate(span, LOG_EXCERPT_CHARS);
            warn!(
                line = e.line(),
                column = e.column(),
                error = %e,
                payload = %excerpt,
                "Model reply span is not valid JSON"
            );
            Err(AnalyzerError::JsonDecode {
                line: e.line(),
                column: e.column(),
                detail: e.to_string(),
                payload: excerpt,
            })
        }
    }
}

/// Cut `s` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
