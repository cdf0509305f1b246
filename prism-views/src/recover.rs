//! Recovering a JSON array from a free-form model reply.
//!
//! Strategies run in order and the first one that parses wins. Each is a pure
//! function so it can be tested on its own. Brackets inside string values can
//! still defeat the boundary heuristics.

use prism_common::PrismError;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

pub type Strategy = fn(&str) -> Result<Value, String>;

pub const STRATEGIES: [(&str, Strategy); 3] = [
    ("strict", strict),
    ("bracketed", bracketed),
    ("sanitized", sanitized),
];

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").expect("static pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryError {
    pub raw: String,
    /// `(strategy, reason)` for every strategy tried, in order.
    pub attempts: Vec<(&'static str, String)>,
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no JSON array could be recovered")?;
        for (name, reason) in &self.attempts {
            write!(f, "; {name}: {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RecoveryError {}

impl From<RecoveryError> for PrismError {
    fn from(err: RecoveryError) -> Self {
        PrismError::Parse {
            reason: err.to_string(),
            raw: err.raw,
        }
    }
}

/// Run the strategy ladder over `raw`.
///
/// ```
/// use prism_views::recover::recover_json;
///
/// let v = recover_json("Sure! [1, 2, 3] Hope that helps.").unwrap();
/// assert_eq!(v, serde_json::json!([1, 2, 3]));
/// assert!(recover_json("no json here").is_err());
/// ```
pub fn recover_json(raw: &str) -> Result<Value, RecoveryError> {
    let mut attempts = Vec::with_capacity(STRATEGIES.len());
    for (name, strategy) in STRATEGIES {
        match strategy(raw) {
            Ok(value) => {
                debug!(strategy = name, failed = attempts.len(), "recovered JSON");
                return Ok(value);
            }
            Err(reason) => attempts.push((name, reason)),
        }
    }
    Err(RecoveryError {
        raw: raw.to_string(),
        attempts,
    })
}

pub fn strict(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw.trim()).map_err(|e| e.to_string())
}

/// Greedy match from the first `[` to the last `]`.
pub fn bracketed(raw: &str) -> Result<Value, String> {
    let m = BRACKETED
        .find(raw)
        .ok_or_else(|| "no bracketed span".to_string())?;
    serde_json::from_str(m.as_str()).map_err(|e| e.to_string())
}

/// Slice to the outer brackets, then repair the usual model noise: fence
/// markers, raw control characters and trailing commas. Fences and commas
/// are only touched outside string literals.
pub fn sanitized(raw: &str) -> Result<Value, String> {
    let start = raw.find('[').ok_or_else(|| "no opening bracket".to_string())?;
    let end = raw.rfind(']').ok_or_else(|| "no closing bracket".to_string())?;
    if end < start {
        return Err("closing bracket precedes opening bracket".into());
    }

    let repaired = repair(&raw[start..=end]);
    serde_json::from_str(&repaired).map_err(|e| e.to_string())
}

fn repair(slice: &str) -> String {
    let chars: Vec<char> = slice
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    let mut out = String::with_capacity(slice.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '`' if chars[i..].starts_with(&['`', '`', '`']) => {
                i += 3;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                continue;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some(']' | '}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ARRAY: &str = r#"[{"id":1,"title":"A","content":"x","imageGenerationPrompt":"p"}]"#;

    #[test]
    fn strict_accepts_clean_json_only() {
        assert_eq!(strict(ARRAY).unwrap()[0]["id"], 1);
        assert!(strict(&format!("Here you go: {ARRAY}")).is_err());
    }

    #[test]
    fn prose_around_the_array_matches_direct_parse() {
        let raw = format!("Here is the result:\n{ARRAY}\nThanks");
        let direct: Value = serde_json::from_str(ARRAY).unwrap();

        assert_eq!(bracketed(&raw).unwrap(), direct);
        assert_eq!(recover_json(&raw).unwrap(), direct);
    }

    #[test]
    fn sanitized_repairs_fences_and_trailing_commas() {
        let raw = "```json\n[\n  {\"id\": 1, \"title\": \"A\",},\n  {\"id\": 2,},\n]\n```";
        assert!(strict(raw).is_err());
        assert!(bracketed(raw).is_err());
        assert_eq!(sanitized(raw).unwrap(), json!([{"id": 1, "title": "A"}, {"id": 2}]));
    }

    #[test]
    fn sanitized_drops_control_characters() {
        let raw = "[{\"title\": \"a\u{0007}b\"}]";
        assert_eq!(sanitized(raw).unwrap(), json!([{"title": "ab"}]));
    }

    #[test]
    fn no_brackets_reports_every_strategy() {
        let err = recover_json("I cannot help with that.").unwrap_err();
        assert_eq!(err.raw, "I cannot help with that.");
        let names: Vec<_> = err.attempts.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["strict", "bracketed", "sanitized"]);

        match PrismError::from(err) {
            PrismError::Parse { raw, .. } => assert_eq!(raw, "I cannot help with that."),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn hostile_inputs_fail_without_panicking() {
        for raw in ["", "]", "][", "[", "[[[", "] text [", "\u{0}", "[\"unterminated]"] {
            assert!(recover_json(raw).is_err(), "{raw:?} should not recover");
        }
    }

    #[test]
    fn repairs_leave_string_contents_alone() {
        let raw = "```json\n[{\"title\": \"A list, ]\", \"content\": \"x\"},]\n```";
        let v = recover_json(raw).unwrap();
        assert_eq!(v, json!([{"title": "A list, ]", "content": "x"}]));

        let fenced = r#"[{"content": "use ```rust blocks, }", "title": "\"q\", }"},]"#;
        let v = sanitized(fenced).unwrap();
        assert_eq!(v[0]["content"], "use ```rust blocks, }");
        assert_eq!(v[0]["title"], "\"q\", }");
    }

    #[test]
    fn brackets_inside_strings_can_defeat_boundaries() {
        let raw = r#"Views: [{"title": "A"}] and also [sic]"#;
        assert!(recover_json(raw).is_err());
    }
}
