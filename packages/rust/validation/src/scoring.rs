//! Content-type specific quality scores and the size score.

use serde_json::{Map, Value};

use parentheses_shared::KnowledgeContent;

/// Fields every `training_data` entry must carry.
const TRAINING_ENTRY_FIELDS: [&str; 3] = ["input", "output", "metadata"];

/// Fields an `algorithm` record must declare.
const ALGORITHM_FIELDS: [&str; 3] = ["name", "parameters", "complexity"];

/// Quality score in [0, 1] for the payload, dispatched on its content type.
pub fn content_score(content: &KnowledgeContent) -> f64 {
    match content {
        KnowledgeContent::ModelWeights(record) => model_weights_score(record),
        KnowledgeContent::TrainingData(record) => training_data_score(record),
        KnowledgeContent::Algorithm(record) => algorithm_score(record),
        KnowledgeContent::Other { .. } => 0.0,
    }
}

/// 1.0 iff `weights` is a mapping whose every value is a number. A missing
/// `weights` counts as an empty mapping.
fn model_weights_score(record: &Map<String, Value>) -> f64 {
    match record.get("weights") {
        None => 1.0,
        Some(Value::Object(weights)) if weights.values().all(Value::is_number) => 1.0,
        _ => 0.0,
    }
}

/// Fraction of well-formed entries in `data`; 0.0 when empty or not a list.
fn training_data_score(record: &Map<String, Value>) -> f64 {
    let Some(Value::Array(entries)) = record.get("data") else {
        return 0.0;
    };
    if entries.is_empty() {
        return 0.0;
    }

    let valid = entries
        .iter()
        .filter(|entry| {
            entry
                .as_object()
                .is_some_and(|e| TRAINING_ENTRY_FIELDS.iter().all(|f| e.contains_key(*f)))
        })
        .count();

    valid as f64 / entries.len() as f64
}

/// 1.0 iff the `algorithm` record declares name, parameters and complexity.
fn algorithm_score(record: &Map<String, Value>) -> f64 {
    match record.get("algorithm") {
        Some(Value::Object(algorithm))
            if ALGORITHM_FIELDS.iter().all(|f| algorithm.contains_key(*f)) =>
        {
            1.0
        }
        _ => 0.0,
    }
}

/// `1 - size / cap` over the compact JSON size of the content, 0.0 past the cap.
pub fn size_score(content: &KnowledgeContent, cap: usize) -> f64 {
    let size = Value::Object(content.record().clone()).to_string().len();
    if cap == 0 || size > cap {
        return 0.0;
    }
    1.0 - size as f64 / cap as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> KnowledgeContent {
        serde_json::from_value(value).expect("content")
    }

    #[test]
    fn model_weights_all_numeric() {
        let ok = content(json!({"type": "model_weights", "weights": {"w1": 0.5, "w2": -3}}));
        assert_eq!(content_score(&ok), 1.0);

        let mixed = content(json!({"type": "model_weights", "weights": {"w1": 0.5, "w2": "x"}}));
        assert_eq!(content_score(&mixed), 0.0);

        let list = content(json!({"type": "model_weights", "weights": [1, 2]}));
        assert_eq!(content_score(&list), 0.0);

        let missing = content(json!({"type": "model_weights"}));
        assert_eq!(content_score(&missing), 1.0);

        let null = content(json!({"type": "model_weights", "weights": null}));
        assert_eq!(content_score(&null), 0.0);
    }

    #[test]
    fn training_data_fraction() {
        let c = content(json!({
            "type": "training_data",
            "data": [
                {"input": 1, "output": 2, "metadata": {}},
                {"input": 1, "output": 2, "metadata": {}},
                {"input": 1, "output": 2, "metadata": {}},
                {"input": 1}
            ]
        }));
        assert!((content_score(&c) - 0.75).abs() < 1e-12);

        let empty = content(json!({"type": "training_data", "data": []}));
        assert_eq!(content_score(&empty), 0.0);

        let malformed = content(json!({"type": "training_data", "data": "rows"}));
        assert_eq!(content_score(&malformed), 0.0);

        let scalar_entries = content(json!({"type": "training_data", "data": ["input output metadata"]}));
        assert_eq!(content_score(&scalar_entries), 0.0);
    }

    #[test]
    fn algorithm_requires_declared_fields() {
        let ok = content(json!({
            "type": "algorithm",
            "algorithm": {"name": "bfs", "parameters": {}, "complexity": "O(V+E)"}
        }));
        assert_eq!(content_score(&ok), 1.0);

        let partial = content(json!({"type": "algorithm", "algorithm": {"name": "bfs"}}));
        assert_eq!(content_score(&partial), 0.0);
    }

    #[test]
    fn unknown_type_scores_zero() {
        let c = content(json!({"type": "unknown_type", "payload": {"a": 1}}));
        assert_eq!(content_score(&c), 0.0);
    }

    #[test]
    fn size_score_shrinks_with_size() {
        let small = content(json!({"type": "algorithm"}));
        let size = r#"{"type":"algorithm"}"#.len();
        let expected = 1.0 - size as f64 / 1024.0;
        assert!((size_score(&small, 1024) - expected).abs() < 1e-12);

        let big = content(json!({"type": "algorithm", "blob": "x".repeat(2048)}));
        assert_eq!(size_score(&big, 1024), 0.0);
    }
}
