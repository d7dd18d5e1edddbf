//! Backend execution.
//!
//! The `BackendExecutor` trait abstracts over dispatching a task to the
//! backend chosen by the routing decision. `SimulatedExecutor` stands in for
//! real model calls: it derives output heuristically per task kind and
//! reports the catalog latency plus a bounded, reproducible jitter.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use taskroute_core::{Result, TaskKind};
use taskroute_router::BackendProfile;

/// One execution attempt handed to a backend.
#[derive(Debug, Clone)]
pub struct ExecutionRequest<'a> {
    pub task_id: &'a str,
    /// 1-based attempt number for this task.
    pub attempt: i64,
    pub kind: TaskKind,
    pub backend: &'a BackendProfile,
    pub text: &'a str,
}

/// Measured result of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub output: String,
    pub latency_ms: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// Trait for execution backends.
pub trait BackendExecutor: Send + Sync {
    /// Run one attempt. Transient failures are reported as
    /// `Error::BackendExecution`.
    fn execute(&self, request: &ExecutionRequest<'_>) -> Result<ExecutionOutput>;
}

/// Heuristic stand-in for the real backends.
pub struct SimulatedExecutor {
    jitter_ms: u64,
}

impl SimulatedExecutor {
    pub fn new(jitter_ms: u64) -> Self {
        Self { jitter_ms }
    }

    /// Jitter in `[0, jitter_ms]`, stable for a given task and attempt.
    pub fn jitter(&self, task_id: &str, attempt: i64) -> i64 {
        if self.jitter_ms == 0 {
            return 0;
        }
        let mut hasher = Sha256::new();
        hasher.update(task_id.as_bytes());
        hasher.update(attempt.to_le_bytes());
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % (self.jitter_ms + 1)) as i64
    }
}

impl BackendExecutor for SimulatedExecutor {
    fn execute(&self, request: &ExecutionRequest<'_>) -> Result<ExecutionOutput> {
        let output = match request.kind {
            TaskKind::Summary => summarize(request.text),
            TaskKind::Classification => classify(request.text).to_string(),
            TaskKind::Extraction => extract_terms(request.text).join(", "),
        };
        Ok(ExecutionOutput {
            latency_ms: request.backend.expected_latency_ms
                + self.jitter(request.task_id, request.attempt),
            input_tokens: count_tokens(request.text),
            output_tokens: count_tokens(&output),
            output,
        })
    }
}

/// Whitespace-delimited token count.
pub fn count_tokens(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

static PROPER_TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][A-Za-z0-9]+(?:\s+[A-Z][A-Za-z0-9]+)*").unwrap());

const SUMMARY_SENTENCES: usize = 2;
const MAX_TERMS: usize = 10;

fn summarize(text: &str) -> String {
    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .take(SUMMARY_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ")
}

const LABELS: &[(&str, &[&str])] = &[
    ("finance", &["budget", "revenue", "cost", "invoice", "price", "payment"]),
    ("engineering", &["deploy", "release", "bug", "code", "server", "build"]),
    ("meeting", &["agenda", "meeting", "standup", "minutes", "attendees"]),
    ("support", &["customer", "ticket", "complaint", "refund", "issue"]),
];

fn classify(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = ("general", 0usize);
    for (label, keywords) in LABELS {
        let hits = words
            .iter()
            .filter(|w| keywords.iter().any(|k| w.starts_with(k)))
            .count();
        if hits > best.1 {
            best = (label, hits);
        }
    }
    best.0
}

fn extract_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for m in PROPER_TERM_RE.find_iter(text) {
        let term = m.as_str().to_string();
        if !terms.contains(&term) {
            terms.push(term);
        }
        if terms.len() == MAX_TERMS {
            break;
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskroute_router::BackendTier;

    fn profile() -> BackendProfile {
        BackendProfile {
            id: "rules-engine".into(),
            tier: BackendTier::MinimalCost,
            cost_per_task: 1,
            expected_latency_ms: 40,
        }
    }

    fn request<'a>(kind: TaskKind, text: &'a str, backend: &'a BackendProfile) -> ExecutionRequest<'a> {
        ExecutionRequest {
            task_id: "task-1",
            attempt: 1,
            kind,
            backend,
            text,
        }
    }

    #[test]
    fn test_latency_within_jitter_bound() {
        let backend = profile();
        let exec = SimulatedExecutor::new(25);
        for attempt in 1..20 {
            let mut req = request(TaskKind::Summary, "One. Two.", &backend);
            req.attempt = attempt;
            let out = exec.execute(&req).unwrap();
            assert!(out.latency_ms >= 40 && out.latency_ms <= 65, "{}", out.latency_ms);
        }
    }

    #[test]
    fn test_jitter_is_reproducible() {
        let exec = SimulatedExecutor::new(100);
        assert_eq!(exec.jitter("abc", 1), exec.jitter("abc", 1));
        assert_eq!(SimulatedExecutor::new(0).jitter("abc", 1), 0);
    }

    #[test]
    fn test_summary_takes_leading_sentences() {
        let backend = profile();
        let text = "Revenue grew 8%. Costs were flat! Hiring resumes in May. Nothing else.";
        let out = SimulatedExecutor::new(0)
            .execute(&request(TaskKind::Summary, text, &backend))
            .unwrap();
        assert_eq!(out.output, "Revenue grew 8%. Costs were flat!");
        assert_eq!(out.input_tokens, 12);
        assert_eq!(out.output_tokens, 6);
    }

    #[test]
    fn test_classification_labels() {
        assert_eq!(classify("We deploy the release after the build passes"), "engineering");
        assert_eq!(classify("The invoice exceeded the budget"), "finance");
        assert_eq!(classify("Lovely weather today"), "general");
    }

    #[test]
    fn test_extraction_terms() {
        let terms = extract_terms("Alice met Bob at Acme Corp in Berlin. Alice left.");
        assert_eq!(terms, vec!["Alice", "Bob", "Acme Corp", "Berlin"]);
    }
}
