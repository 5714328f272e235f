//! Token-set Jaccard similarity over serialized content payloads.

use std::collections::HashSet;
use std::io;

use serde::Serialize;

use parentheses_shared::KnowledgeContent;

/// JSON formatter that puts a space after `,` and `:`, so serialized
/// payloads split into one token per key and value.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serialize `content` and split it on whitespace into a token set.
pub fn tokenize(content: &KnowledgeContent) -> HashSet<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    if content.serialize(&mut serializer).is_err() {
        return HashSet::new();
    }

    String::from_utf8_lossy(&buf)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / |A ∪ B|, or 0.0 when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: serde_json::Value) -> KnowledgeContent {
        serde_json::from_value(value).expect("content")
    }

    fn set(tokens: &[&str]) -> HashSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn tokens_split_on_separators() {
        let c = content(json!({"type": "algorithm", "steps": ["a", "b"]}));
        let tokens = tokenize(&c);
        assert_eq!(
            tokens,
            set(&[r#"{"steps":"#, r#"["a","#, r#""b"],"#, r#""type":"#, r#""algorithm"}"#])
        );
    }

    #[test]
    fn string_values_split_on_inner_whitespace() {
        let c = content(json!({"type": "other", "text": "gradient descent step"}));
        let tokens = tokenize(&c);
        assert!(tokens.contains("descent"));
    }

    #[test]
    fn self_similarity_is_one() {
        let c = content(json!({"type": "algorithm", "algorithm": {"name": "bfs"}}));
        let tokens = tokenize(&c);
        assert!(!tokens.is_empty());
        assert_eq!(jaccard(&tokens, &tokens), 1.0);
    }

    #[test]
    fn disjoint_sets_score_zero() {
        assert_eq!(jaccard(&set(&["a", "b"]), &set(&["c", "d"])), 0.0);
    }

    #[test]
    fn empty_sets_score_zero() {
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn partial_overlap() {
        let a = set(&["a", "b", "c"]);
        let b = set(&["b", "c", "d"]);
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-12);
    }
}
