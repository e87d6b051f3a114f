// crates/core/src/derived.rs
//! Tool-specific interpretation of captured stdout.
//!
//! Each job kind gets a strongly typed variant; kinds without a structured
//! output format (fuzzers, binary analyzers) fall back to `RawText`. A
//! parse failure on a structured kind degrades the job to
//! raw-capture-only — it never turns a completed job into a failed one.

use serde::{Deserialize, Serialize};

use crate::job::JobKind;

/// Structured payload derived from a job's raw captured output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DerivedResult {
    /// Discovered URLs, one per input line.
    UrlCorpus { urls: Vec<String> },
    /// Secret findings parsed from gitleaks-style JSON.
    SecretFindings { findings: Vec<SecretFinding> },
    /// Generated test cases, one per input line.
    GeneratedCases { cases: Vec<String> },
    /// Unstructured output, capped at the configured preview length.
    RawText { text: String },
}

impl DerivedResult {
    /// Number of addressable items, used for windowing and reports.
    pub fn item_count(&self) -> usize {
        match self {
            DerivedResult::UrlCorpus { urls } => urls.len(),
            DerivedResult::SecretFindings { findings } => findings.len(),
            DerivedResult::GeneratedCases { cases } => cases.len(),
            DerivedResult::RawText { .. } => 1,
        }
    }

    /// A windowed copy: the first `limit` items. The stored full result is
    /// untouched; repeated calls with different limits are side-effect-free.
    pub fn windowed(&self, limit: Option<usize>) -> DerivedResult {
        let Some(limit) = limit else {
            return self.clone();
        };
        match self {
            DerivedResult::UrlCorpus { urls } => DerivedResult::UrlCorpus {
                urls: urls.iter().take(limit).cloned().collect(),
            },
            DerivedResult::SecretFindings { findings } => DerivedResult::SecretFindings {
                findings: findings.iter().take(limit).cloned().collect(),
            },
            DerivedResult::GeneratedCases { cases } => DerivedResult::GeneratedCases {
                cases: cases.iter().take(limit).cloned().collect(),
            },
            DerivedResult::RawText { .. } => self.clone(),
        }
    }
}

/// One secret finding, with the secret value masked.
#[derive(Debug, Clone, Serialize)]
pub struct SecretFinding {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Gitleaks report entry as it appears on the wire (PascalCase keys).
#[derive(Debug, Deserialize)]
struct RawGitleaksFinding {
    #[serde(rename = "RuleID")]
    rule_id: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "Secret")]
    secret: Option<String>,
    #[serde(rename = "File")]
    file: Option<String>,
    #[serde(rename = "StartLine")]
    start_line: Option<u64>,
    #[serde(rename = "Commit")]
    commit: Option<String>,
    #[serde(rename = "Author")]
    author: Option<String>,
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
}

/// Mask a secret value, keeping only the first few characters visible.
fn mask_secret(secret: &str) -> String {
    const VISIBLE: usize = 4;
    let chars = secret.chars().count();
    if chars <= VISIBLE {
        return "****".to_string();
    }
    let head: String = secret.chars().take(VISIBLE).collect();
    format!("{}{}", head, "*".repeat(chars - VISIBLE))
}

/// Parse captured stdout into the derived result for `kind`.
///
/// Returns `None` when a structured kind produced no parsable output;
/// the caller leaves `derived` absent in that case.
pub fn parse(kind: JobKind, stdout: &str, preview_cap: usize) -> Option<DerivedResult> {
    match kind {
        JobKind::UrlArchive => {
            let urls: Vec<String> = stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            if urls.is_empty() {
                None
            } else {
                Some(DerivedResult::UrlCorpus { urls })
            }
        }
        JobKind::SecretScan => parse_gitleaks(stdout),
        JobKind::GrammarGen => {
            let cases: Vec<String> = stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            if cases.is_empty() {
                None
            } else {
                Some(DerivedResult::GeneratedCases { cases })
            }
        }
        JobKind::ProtocolFuzz | JobKind::BinaryAnalysis => {
            if stdout.trim().is_empty() {
                None
            } else {
                let mut text: String = stdout.chars().take(preview_cap).collect();
                if stdout.chars().count() > preview_cap {
                    text.push_str("\n...(truncated)...");
                }
                Some(DerivedResult::RawText { text })
            }
        }
    }
}

fn parse_gitleaks(stdout: &str) -> Option<DerivedResult> {
    let raw: Vec<RawGitleaksFinding> = match serde_json::from_str(stdout) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse gitleaks JSON output");
            return None;
        }
    };
    let findings = raw
        .into_iter()
        .map(|f| SecretFinding {
            rule_id: f.rule_id.unwrap_or_else(|| "unknown".to_string()),
            description: f.description,
            secret: f.secret.as_deref().map(mask_secret),
            file: f.file,
            line: f.start_line,
            commit: f.commit,
            author: f.author,
            tags: f.tags,
        })
        .collect();
    Some(DerivedResult::SecretFindings { findings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_corpus_from_lines() {
        let out = "https://a.example.com/x\n\n  http://example.com/y?q=1  \n";
        let derived = parse(JobKind::UrlArchive, out, 4000).unwrap();
        match derived {
            DerivedResult::UrlCorpus { urls } => {
                assert_eq!(
                    urls,
                    vec!["https://a.example.com/x", "http://example.com/y?q=1"]
                );
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_empty_stdout_gives_no_derived() {
        assert!(parse(JobKind::UrlArchive, "\n  \n", 4000).is_none());
        assert!(parse(JobKind::GrammarGen, "", 4000).is_none());
        assert!(parse(JobKind::BinaryAnalysis, "   ", 4000).is_none());
    }

    #[test]
    fn test_gitleaks_findings_parsed_and_masked() {
        let out = r#"[
            {"RuleID": "aws-access-key", "Description": "AWS key", "Secret": "AKIA1234567890SECRET",
             "File": "config.py", "StartLine": 12, "Commit": "deadbeef", "Author": "dev", "Tags": ["key"]},
            {"Secret": "abc"}
        ]"#;
        let derived = parse(JobKind::SecretScan, out, 4000).unwrap();
        match derived {
            DerivedResult::SecretFindings { findings } => {
                assert_eq!(findings.len(), 2);
                assert_eq!(findings[0].rule_id, "aws-access-key");
                assert_eq!(
                    findings[0].secret.as_deref(),
                    Some("AKIA****************")
                );
                assert_eq!(findings[0].line, Some(12));
                // Short secrets are fully masked, missing rule ids default.
                assert_eq!(findings[1].rule_id, "unknown");
                assert_eq!(findings[1].secret.as_deref(), Some("****"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_gitleaks_parse_failure_is_none() {
        assert!(parse(JobKind::SecretScan, "not json at all", 4000).is_none());
    }

    #[test]
    fn test_raw_text_respects_preview_cap() {
        let out = "x".repeat(100);
        let derived = parse(JobKind::ProtocolFuzz, &out, 10).unwrap();
        match derived {
            DerivedResult::RawText { text } => {
                assert!(text.starts_with("xxxxxxxxxx"));
                assert!(text.ends_with("...(truncated)..."));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_windowed_limits_items_without_mutating() {
        let full = DerivedResult::UrlCorpus {
            urls: (0..5).map(|i| format!("https://e.com/{i}")).collect(),
        };
        let window = full.windowed(Some(2));
        assert_eq!(window.item_count(), 2);
        // The original is untouched.
        assert_eq!(full.item_count(), 5);
        // Absent limit returns everything.
        assert_eq!(full.windowed(None).item_count(), 5);
    }

    #[test]
    fn test_mask_secret_keeps_four_chars() {
        assert_eq!(mask_secret("supersecretvalue"), "supe************");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret(""), "****");
    }
}
