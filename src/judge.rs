//! Judge client: the external semantic arbiter behind `=~=` and the
//! semantic built-ins.
//!
//! The default judge speaks the OpenAI-compatible chat-completions
//! protocol with a JSON-schema response pin. Every failure mode (network,
//! non-2xx, malformed JSON) maps to "no" — a score of 0, a false result,
//! or an empty string — so a judge outage degrades to failed goals rather
//! than aborted queries. An embedding-based judge is available as an
//! alternative; a null judge serves offline runs.

use std::time::Duration;

use serde_json::{json, Value};

/// Default chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9090/v1/chat/completions";
/// Default similarity threshold for a match to succeed.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Judge configuration, from defaults, environment, or CLI flags.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub endpoint: String,
    pub model: String,
    pub threshold: f64,
    pub timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: "default".to_string(),
            threshold: DEFAULT_THRESHOLD,
            timeout_secs: 30,
        }
    }
}

impl JudgeConfig {
    /// Load configuration, letting environment variables override defaults:
    /// `SEMALOG_JUDGE_URL`, `SEMALOG_JUDGE_MODEL`, `SEMALOG_THRESHOLD`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("SEMALOG_JUDGE_URL") {
            config.endpoint = url;
        }
        if let Ok(model) = std::env::var("SEMALOG_JUDGE_MODEL") {
            config.model = model;
        }
        if let Ok(threshold) = std::env::var("SEMALOG_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                config.threshold = clamp_score(t);
            }
        }
        config
    }
}

/// The external semantic arbiter.
///
/// Scores are clamped to `[0, 1]`; thresholding is done by the caller so
/// that every judge implementation stays comparable.
pub trait Judge {
    /// Conceptual identity score between two texts.
    fn similarity(&self, left: &str, right: &str) -> f64;
    /// Does the subject possess the characteristic?
    fn has_attribute(&self, attribute: &str, subject: &str) -> bool;
    /// Do both subjects possess the characteristic?
    fn share_attribute(&self, attribute: &str, a: &str, b: &str) -> bool;
    /// The distinguishing difference between two things, as prose.
    fn differentia(&self, a: &str, b: &str) -> String;
    /// Similarity between two texts along a named axis.
    fn axis_similarity(&self, axis: &str, a: &str, b: &str) -> f64;
}

pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Chat-completions judge
// ---------------------------------------------------------------------------

const IDENTITY_PROMPT: &str = "You judge conceptual identity. Given two texts, \
reply with how strongly they refer to the same underlying concept, as a \
similarity between 0.0 (unrelated) and 1.0 (the same concept).";

const HAS_ATTR_PROMPT: &str = "You judge attribution. Given a characteristic \
and a subject, reply whether the subject genuinely possesses the \
characteristic.";

const SHARE_ATTR_PROMPT: &str = "You judge shared attribution. Given a \
characteristic and two subjects, reply whether both subjects genuinely \
possess the characteristic.";

const DIFFERENTIA_PROMPT: &str = "You articulate differentia. Given two \
things, reply with the single most essential difference that distinguishes \
the first from the second, as one short sentence.";

const AXIS_PROMPT: &str = "You judge similarity along an axis. Given an axis \
of comparison and two subjects, reply with how similar the subjects are \
along that axis only, as a similarity between 0.0 and 1.0.";

/// Judge backed by an OpenAI-compatible chat-completions endpoint.
pub struct HttpJudge {
    client: reqwest::blocking::Client,
    config: JudgeConfig,
}

impl HttpJudge {
    pub fn new(config: JudgeConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// One round trip: system prompt, user payload, JSON-schema pin.
    /// None on any failure.
    fn ask(&self, system: &str, user: String, schema_name: &str, schema: Value) -> Option<Value> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": schema_name, "schema": schema },
            },
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| log::warn!("judge request failed: {}", e))
            .ok()?;

        if !response.status().is_success() {
            log::warn!("judge returned status {}", response.status());
            return None;
        }

        let data: Value = response
            .json()
            .map_err(|e| log::warn!("judge response was not JSON: {}", e))
            .ok()?;
        let content = data["choices"][0]["message"]["content"].as_str()?;
        serde_json::from_str(content)
            .map_err(|e| log::warn!("judge content was not valid JSON: {}", e))
            .ok()
    }

    fn score(&self, system: &str, user: String) -> f64 {
        let schema = json!({
            "type": "object",
            "properties": { "similarity": { "type": "number" } },
            "required": ["similarity"],
        });
        let answer = self.ask(system, user, "similarity", schema);
        clamp_score(
            answer
                .and_then(|v| v["similarity"].as_f64())
                .unwrap_or(0.0),
        )
    }

    fn verdict(&self, system: &str, user: String) -> bool {
        let schema = json!({
            "type": "object",
            "properties": { "result": { "type": "boolean" } },
            "required": ["result"],
        });
        self.ask(system, user, "verdict", schema)
            .and_then(|v| v["result"].as_bool())
            .unwrap_or(false)
    }
}

impl Judge for HttpJudge {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        self.score(
            IDENTITY_PROMPT,
            format!("First: {}\nSecond: {}", left, right),
        )
    }

    fn has_attribute(&self, attribute: &str, subject: &str) -> bool {
        self.verdict(
            HAS_ATTR_PROMPT,
            format!("Characteristic: {}\nSubject: {}", attribute, subject),
        )
    }

    fn share_attribute(&self, attribute: &str, a: &str, b: &str) -> bool {
        self.verdict(
            SHARE_ATTR_PROMPT,
            format!("Characteristic: {}\nFirst: {}\nSecond: {}", attribute, a, b),
        )
    }

    fn differentia(&self, a: &str, b: &str) -> String {
        let schema = json!({
            "type": "object",
            "properties": { "result": { "type": "string" } },
            "required": ["result"],
        });
        self.ask(
            DIFFERENTIA_PROMPT,
            format!("First: {}\nSecond: {}", a, b),
            "differentia",
            schema,
        )
        .and_then(|v| v["result"].as_str().map(str::to_string))
        .unwrap_or_default()
    }

    fn axis_similarity(&self, axis: &str, a: &str, b: &str) -> f64 {
        self.score(
            AXIS_PROMPT,
            format!("Axis: {}\nFirst: {}\nSecond: {}", axis, a, b),
        )
    }
}

// ---------------------------------------------------------------------------
// Embedding judge
// ---------------------------------------------------------------------------

/// Judge backed by an OpenAI-compatible `/embeddings` endpoint: cosine
/// similarity over normalized vectors, same thresholds as the chat judge.
///
/// `differentia` cannot be produced from embeddings and always comes back
/// empty, failing the goal.
pub struct EmbeddingJudge {
    client: reqwest::blocking::Client,
    config: JudgeConfig,
}

impl EmbeddingJudge {
    pub fn new(config: JudgeConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn embed(&self, texts: &[&str]) -> Option<Vec<Vec<f32>>> {
        let body = json!({ "model": self.config.model, "input": texts });
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| log::warn!("embedding request failed: {}", e))
            .ok()?;
        if !response.status().is_success() {
            log::warn!("embedding endpoint returned status {}", response.status());
            return None;
        }
        let data: Value = response.json().ok()?;
        let vectors = data["data"]
            .as_array()?
            .iter()
            .map(|item| {
                item["embedding"]
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect::<Vec<f32>>()
                    })
                    .unwrap_or_default()
            })
            .collect();
        Some(vectors)
    }

    fn cosine_pair(&self, a: &str, b: &str) -> f64 {
        match self.embed(&[a, b]) {
            Some(vectors) if vectors.len() == 2 => {
                clamp_score(cosine(&vectors[0], &vectors[1]) as f64)
            }
            _ => 0.0,
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl Judge for EmbeddingJudge {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        self.cosine_pair(left, right)
    }

    fn has_attribute(&self, attribute: &str, subject: &str) -> bool {
        self.cosine_pair(attribute, subject) >= self.config.threshold
    }

    fn share_attribute(&self, attribute: &str, a: &str, b: &str) -> bool {
        self.has_attribute(attribute, a) && self.has_attribute(attribute, b)
    }

    fn differentia(&self, _a: &str, _b: &str) -> String {
        String::new()
    }

    fn axis_similarity(&self, axis: &str, a: &str, b: &str) -> f64 {
        self.cosine_pair(&format!("{}: {}", axis, a), &format!("{}: {}", axis, b))
    }
}

// ---------------------------------------------------------------------------
// Null judge
// ---------------------------------------------------------------------------

/// Offline judge: every semantic goal fails.
#[derive(Debug, Default)]
pub struct NullJudge;

impl Judge for NullJudge {
    fn similarity(&self, _left: &str, _right: &str) -> f64 {
        0.0
    }

    fn has_attribute(&self, _attribute: &str, _subject: &str) -> bool {
        false
    }

    fn share_attribute(&self, _attribute: &str, _a: &str, _b: &str) -> bool {
        false
    }

    fn differentia(&self, _a: &str, _b: &str) -> String {
        String::new()
    }

    fn axis_similarity(&self, _axis: &str, _a: &str, _b: &str) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_score(0.5), 0.5);
        assert_eq!(clamp_score(-1.0), 0.0);
        assert_eq!(clamp_score(3.0), 1.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }

    #[test]
    fn test_cosine() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_null_judge_fails_everything() {
        let judge = NullJudge;
        assert_eq!(judge.similarity("a", "a"), 0.0);
        assert!(!judge.has_attribute("wings", "bird"));
        assert_eq!(judge.differentia("a", "b"), "");
    }

    #[test]
    fn test_default_config() {
        let config = JudgeConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
    }
}
