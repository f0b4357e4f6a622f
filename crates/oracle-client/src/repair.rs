//! Extraction of a JSON object from free-form oracle text.
//!
//! Replies often arrive wrapped in markdown fences, surrounded by prose, or
//! with raw line breaks inside string literals. Extraction strips the fences,
//! keeps the greedy `{ ... }` span and escapes control characters that sit
//! inside quoted strings before handing the text to `serde_json`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

const FENCE: &str = "```";

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("reply is empty")]
    Empty,
    #[error("reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Removes markdown code fences together with an immediately following
/// `json` language tag.
pub fn strip_code_fences(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out
}

/// Greedy span from the first `{` to the last `}`.
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Escapes raw line breaks (and tabs) that appear inside quoted strings.
/// Characters outside string literals are left untouched.
pub fn escape_control_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Runs the full extraction and decodes into `T`.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T, RepairError> {
    if raw.trim().is_empty() {
        return Err(RepairError::Empty);
    }
    let unfenced = strip_code_fences(raw);
    let candidate = brace_span(&unfenced).unwrap_or(unfenced.as_str());
    let repaired = escape_control_in_strings(candidate);
    Ok(serde_json::from_str(&repaired)?)
}

/// Untyped variant: `None` when nothing usable could be parsed.
pub fn extract_json_value(raw: &str) -> Option<Value> {
    extract_json::<Value>(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_fenced_block() {
        let input = "Here you go:\n```json\n{\"action\": \"respond_to_user\"}\n```";
        assert_eq!(
            extract_json_value(input),
            Some(json!({"action": "respond_to_user"}))
        );
    }

    #[test]
    fn greedy_span_keeps_nested_objects() {
        let input = "prefix {\"a\": {\"b\": 1}} suffix";
        assert_eq!(extract_json_value(input), Some(json!({"a": {"b": 1}})));
    }

    #[test]
    fn raw_line_breaks_match_pre_escaped_text() {
        let cases = [
            "{\"thought\": \"line one\nline two\", \"n\": 1}",
            "```json\n{\"text\": \"a\r\nb\",\n \"list\": [\"x\ny\"]}\n```",
            "noise {\"q\": \"say \\\"hi\\\"\nthen\"} noise",
        ];
        for raw in cases {
            let pre_escaped = raw
                .replace("\\\"", "\u{1}")
                .split('"')
                .enumerate()
                .map(|(i, part)| {
                    if i % 2 == 1 {
                        part.replace('\r', "\\r").replace('\n', "\\n")
                    } else {
                        part.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("\"")
                .replace('\u{1}', "\\\"");
            let repaired = extract_json_value(raw).expect("repaired parse");
            let reference = extract_json_value(&pre_escaped).expect("reference parse");
            assert_eq!(repaired, reference, "case: {raw:?}");
        }
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let raw = "{\"text\": \"he said \\\"go\\\"\nnow\"}";
        assert_eq!(
            extract_json_value(raw),
            Some(json!({"text": "he said \"go\"\nnow"}))
        );
    }

    #[test]
    fn unparseable_reply_is_an_error() {
        assert!(matches!(extract_json::<Value>(""), Err(RepairError::Empty)));
        assert!(matches!(
            extract_json::<Value>("I cannot decide."),
            Err(RepairError::Parse(_))
        ));
        assert!(extract_json_value("{ broken").is_none());
    }

    #[test]
    fn typed_extraction() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Regions {
            regions: Vec<String>,
        }
        let parsed: Regions =
            extract_json("```\n{\"regions\": [\"广东省\"]}\n```").expect("typed parse");
        assert_eq!(parsed.regions, vec!["广东省".to_string()]);
    }
}
