//! Multi-stage validation of knowledge submissions.
//!
//! [`ContentValidator`] runs structure, content quality, dependency and
//! version checks in order, short-circuiting on the first failure, and caches
//! passing outcomes by canonical digest. It fails closed: every internal
//! problem is reported as a rejection, never as a panic or propagated error.

mod cache;
pub mod scoring;

use std::sync::Mutex;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use parentheses_shared::{
    KnowledgeContent, REQUIRED_FIELDS, SemVer, ValidatorConfig, canonical, parse_timestamp,
};

pub use cache::ValidationCache;

/// Why a submission was rejected, by pipeline stage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("structure: {0}")]
    Structure(String),

    #[error("content score {score:.3} below threshold {threshold:.3}")]
    ContentScore { score: f64, threshold: f64 },

    #[error("dependencies: {0}")]
    Dependencies(String),

    #[error("version: {0}")]
    Version(String),

    #[error("internal: {0}")]
    Internal(String),
}

/// Outcome of a passing validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Whether the result was served from the cache.
    pub cached: bool,
    /// Content-type quality score (absent for cache hits).
    pub content_score: Option<f64>,
    /// Size score (absent for cache hits).
    pub size_score: Option<f64>,
}

/// Validates submissions and caches passing results.
#[derive(Debug)]
pub struct ContentValidator {
    config: ValidatorConfig,
    cache: Mutex<ValidationCache>,
}

impl ContentValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        let cache = ValidationCache::new(config.cache_ttl, config.cache_max_entries);
        Self {
            config,
            cache: Mutex::new(cache),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// `true` iff the submission passes every stage.
    pub fn validate(&self, submission: &Value) -> bool {
        self.evaluate(submission).is_ok()
    }

    /// Run the full pipeline and report the failing stage on rejection.
    #[instrument(skip_all)]
    pub fn evaluate(&self, submission: &Value) -> Result<ValidationReport, Rejection> {
        let key = canonical::hex_digest(submission);

        if self.lookup(&key)? == Some(true) {
            debug!(key = %key, "validation cache hit");
            return Ok(ValidationReport {
                cached: true,
                content_score: None,
                size_score: None,
            });
        }

        let result = self.run_stages(submission);
        match &result {
            Ok(report) => {
                self.store(key, Instant::now())?;
                debug!(
                    content_score = report.content_score,
                    size_score = report.size_score,
                    "submission passed validation"
                );
            }
            Err(rejection) => {
                debug!(%rejection, "submission rejected");
            }
        }
        result
    }

    fn lookup(&self, key: &str) -> Result<Option<bool>, Rejection> {
        let mut cache = self.cache.lock().map_err(|_| {
            warn!("validation cache lock poisoned");
            Rejection::Internal("validation cache unavailable".into())
        })?;
        Ok(cache.get(key, Instant::now()))
    }

    fn store(&self, key: String, now: Instant) -> Result<(), Rejection> {
        let mut cache = self.cache.lock().map_err(|_| {
            warn!("validation cache lock poisoned");
            Rejection::Internal("validation cache unavailable".into())
        })?;
        cache.insert(key, true, now);
        Ok(())
    }

    fn run_stages(&self, submission: &Value) -> Result<ValidationReport, Rejection> {
        let record = check_structure(submission)?;

        let content = record
            .get("content")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| Rejection::Structure("content must be a record".into()))?;
        let content = KnowledgeContent::try_from(content)
            .map_err(|e| Rejection::Structure(e.to_string()))?;

        let content_score = scoring::content_score(&content);
        let size_score = scoring::size_score(&content, self.config.max_content_bytes);
        let score = (content_score + size_score) / 2.0;
        if score < self.config.threshold {
            return Err(Rejection::ContentScore {
                score,
                threshold: self.config.threshold,
            });
        }

        check_dependencies(record.get("dependencies"))?;
        check_version(record.get("version")).map_err(Rejection::Version)?;

        Ok(ValidationReport {
            cached: false,
            content_score: Some(content_score),
            size_score: Some(size_score),
        })
    }
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn check_structure(submission: &Value) -> Result<&Map<String, Value>, Rejection> {
    let record = submission
        .as_object()
        .ok_or_else(|| Rejection::Structure("submission must be a record".into()))?;

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !record.contains_key(**f)) {
        return Err(Rejection::Structure(format!("missing field '{missing}'")));
    }

    match record.get("content") {
        Some(Value::Object(content)) if content.contains_key("type") => {}
        _ => {
            return Err(Rejection::Structure(
                "content must be a record with a 'type'".into(),
            ));
        }
    }

    if !record.get("domain").is_some_and(Value::is_string) {
        return Err(Rejection::Structure("domain must be a string".into()));
    }

    if !matches!(record.get("contributor"), Some(Value::String(_) | Value::Null)) {
        return Err(Rejection::Structure(
            "contributor must be a string or null".into(),
        ));
    }

    if !record.get("metadata").is_some_and(Value::is_object) {
        return Err(Rejection::Structure("metadata must be a record".into()));
    }

    let timestamp = record.get("timestamp").and_then(Value::as_str).unwrap_or("");
    if parse_timestamp(timestamp).is_none() {
        return Err(Rejection::Structure(format!(
            "timestamp '{timestamp}' is not a valid date-time"
        )));
    }

    Ok(record)
}

fn check_dependencies(dependencies: Option<&Value>) -> Result<(), Rejection> {
    let Some(Value::Array(dependencies)) = dependencies else {
        return Err(Rejection::Dependencies("dependencies must be a list".into()));
    };

    for (i, dependency) in dependencies.iter().enumerate() {
        let Some(dependency) = dependency.as_object() else {
            return Err(Rejection::Dependencies(format!("entry {i} is not a record")));
        };
        if !dependency.get("id").is_some_and(Value::is_string) {
            return Err(Rejection::Dependencies(format!(
                "entry {i} needs a string id"
            )));
        }
        check_version(dependency.get("version"))
            .map_err(|e| Rejection::Dependencies(format!("entry {i}: {e}")))?;
    }
    Ok(())
}

fn check_version(version: Option<&Value>) -> Result<(), String> {
    let raw = version
        .and_then(Value::as_str)
        .ok_or_else(|| "version must be a string".to_string())?;
    raw.parse::<SemVer>().map(|_| ()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn algorithm_submission() -> Value {
        json!({
            "content": {
                "type": "algorithm",
                "algorithm": {
                    "name": "test_algo",
                    "parameters": {"param1": 1},
                    "complexity": "O(n)"
                }
            },
            "domain": "test_domain",
            "contributor": "test_user",
            "metadata": {},
            "dependencies": [],
            "version": "1.0.0",
            "timestamp": "2024-05-01T10:00:00"
        })
    }

    #[test]
    fn valid_algorithm_passes() {
        let validator = ContentValidator::default();
        let report = validator.evaluate(&algorithm_submission()).expect("valid");
        assert!(!report.cached);
        assert_eq!(report.content_score, Some(1.0));
        assert!(report.size_score.unwrap() > 0.99);
    }

    #[test]
    fn missing_any_required_field_fails() {
        let validator = ContentValidator::default();
        for field in REQUIRED_FIELDS {
            let mut submission = algorithm_submission();
            submission.as_object_mut().unwrap().remove(field);
            assert!(
                !validator.validate(&submission),
                "submission without '{field}' should fail"
            );
        }
    }

    #[test]
    fn structural_checks() {
        let validator = ContentValidator::default();

        let mut no_type = algorithm_submission();
        no_type["content"] = json!({"algorithm": {}});
        assert!(matches!(
            validator.evaluate(&no_type),
            Err(Rejection::Structure(_))
        ));

        let mut bad_metadata = algorithm_submission();
        bad_metadata["metadata"] = json!("none");
        assert!(!validator.validate(&bad_metadata));

        let mut bad_timestamp = algorithm_submission();
        bad_timestamp["timestamp"] = json!("not-a-date");
        assert!(!validator.validate(&bad_timestamp));

        assert!(!validator.validate(&json!(["not", "a", "record"])));

        let mut numeric_contributor = algorithm_submission();
        numeric_contributor["contributor"] = json!(7);
        assert!(matches!(
            validator.evaluate(&numeric_contributor),
            Err(Rejection::Structure(_))
        ));

        let mut numeric_domain = algorithm_submission();
        numeric_domain["domain"] = json!(3);
        assert!(!validator.validate(&numeric_domain));
    }

    #[test]
    fn null_contributor_is_accepted() {
        let validator = ContentValidator::default();
        let mut submission = algorithm_submission();
        submission["contributor"] = Value::Null;
        assert!(validator.validate(&submission));
    }

    #[test]
    fn bad_versions_fail() {
        let validator = ContentValidator::default();
        for bad in ["1.0", "1.0.0.0", "1.x.0", "", "1.0.-1"] {
            let mut submission = algorithm_submission();
            submission["version"] = json!(bad);
            assert!(
                matches!(validator.evaluate(&submission), Err(Rejection::Version(_))),
                "version {bad:?} should fail"
            );
        }

        let mut numeric = algorithm_submission();
        numeric["version"] = json!(1);
        assert!(!validator.validate(&numeric));
    }

    #[test]
    fn dependency_checks() {
        let validator = ContentValidator::default();

        let mut ok = algorithm_submission();
        ok["dependencies"] = json!([{"id": "dep", "version": "0.1.12"}]);
        assert!(validator.validate(&ok));

        for bad in [
            json!([{"id": "dep", "version": "0.1"}]),
            json!([{"id": "dep"}]),
            json!([{"version": "1.0.0"}]),
            json!([{"id": 42, "version": "1.0.0"}]),
            json!(["dep@1.0.0"]),
            json!({"id": "dep", "version": "1.0.0"}),
        ] {
            let mut submission = algorithm_submission();
            submission["dependencies"] = bad.clone();
            assert!(
                matches!(
                    validator.evaluate(&submission),
                    Err(Rejection::Dependencies(_))
                ),
                "dependencies {bad} should fail"
            );
        }
    }

    #[test]
    fn unknown_type_fails_threshold() {
        let validator = ContentValidator::default();
        let mut submission = algorithm_submission();
        submission["content"] = json!({"type": "unknown_type", "payload": "abc"});

        match validator.evaluate(&submission) {
            Err(Rejection::ContentScore { score, threshold }) => {
                // Only the size score contributes: at most 0.5.
                assert!(score <= 0.5);
                assert_eq!(threshold, 0.85);
            }
            other => panic!("expected content score rejection, got {other:?}"),
        }
    }

    #[test]
    fn partial_training_data_below_threshold() {
        let validator = ContentValidator::default();
        let mut submission = algorithm_submission();
        submission["content"] = json!({
            "type": "training_data",
            "data": [
                {"input": [1], "output": [0], "metadata": {}},
                {"input": [2]}
            ]
        });
        // (0.5 + ~1.0) / 2 < 0.85
        assert!(!validator.validate(&submission));
    }

    #[test]
    fn lower_threshold_admits_partial_content() {
        let validator = ContentValidator::new(ValidatorConfig {
            threshold: 0.7,
            ..ValidatorConfig::default()
        });
        let mut submission = algorithm_submission();
        submission["content"] = json!({
            "type": "training_data",
            "data": [
                {"input": [1], "output": [0], "metadata": {}},
                {"input": [2]}
            ]
        });
        assert!(validator.validate(&submission));
    }

    #[test]
    fn pass_is_cached_by_canonical_digest() {
        let validator = ContentValidator::default();
        assert!(!validator.evaluate(&algorithm_submission()).unwrap().cached);

        let reordered: Value = serde_json::from_str(
            r#"{
                "version": "1.0.0",
                "timestamp": "2024-05-01T10:00:00",
                "metadata": {},
                "dependencies": [],
                "contributor": "test_user",
                "domain": "test_domain",
                "content": {
                    "algorithm": {"complexity": "O(n)", "parameters": {"param1": 1}, "name": "test_algo"},
                    "type": "algorithm"
                }
            }"#,
        )
        .unwrap();
        assert!(validator.evaluate(&reordered).unwrap().cached);
    }

    #[test]
    fn failures_are_not_cached() {
        let validator = ContentValidator::default();
        let mut submission = algorithm_submission();
        submission["version"] = json!("1.0");
        assert!(!validator.validate(&submission));
        assert!(!validator.validate(&submission));
        assert!(validator.cache.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_ttl_never_serves_from_cache() {
        let validator = ContentValidator::new(ValidatorConfig {
            cache_ttl: Duration::ZERO,
            ..ValidatorConfig::default()
        });
        assert!(!validator.evaluate(&algorithm_submission()).unwrap().cached);
        assert!(!validator.evaluate(&algorithm_submission()).unwrap().cached);
    }
}
