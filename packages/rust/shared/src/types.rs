//! Core domain types for knowledge items and pathway reporting.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical;
use crate::error::{ParenthesesError, Result};

/// Fields every submission must carry.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "content",
    "domain",
    "contributor",
    "timestamp",
    "version",
    "metadata",
    "dependencies",
];

// ---------------------------------------------------------------------------
// KnowledgeId / Signature / TransactionId
// ---------------------------------------------------------------------------

/// Hex SHA-256 of a submission's canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeId(pub String);

impl KnowledgeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KnowledgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KnowledgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Raw digest bytes handed to the ledger alongside a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 32]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Ledger-assigned transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SemVer
// ---------------------------------------------------------------------------

/// A `major.minor.patch` version of three non-negative integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl FromStr for SemVer {
    type Err = ParenthesesError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(ParenthesesError::validation(format!(
                "version '{s}' must have exactly three dot-separated parts"
            )));
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParenthesesError::validation(format!(
                    "version '{s}' has a non-numeric part '{part}'"
                )));
            }
            *slot = part.parse().map_err(|_| {
                ParenthesesError::validation(format!("version part '{part}' is out of range"))
            })?;
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
        })
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl TryFrom<String> for SemVer {
    type Error = ParenthesesError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SemVer> for String {
    fn from(v: SemVer) -> Self {
        v.to_string()
    }
}

/// A dependency on another knowledge item at a specific version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub version: SemVer,
}

// ---------------------------------------------------------------------------
// KnowledgeContent
// ---------------------------------------------------------------------------

/// Content payload, tagged by its `type` discriminator.
///
/// Each variant keeps the full record (including `type`) so the payload
/// serializes back exactly as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub enum KnowledgeContent {
    ModelWeights(Map<String, Value>),
    TrainingData(Map<String, Value>),
    Algorithm(Map<String, Value>),
    Other { kind: String, record: Map<String, Value> },
}

impl KnowledgeContent {
    /// The `type` discriminator as submitted.
    pub fn kind(&self) -> &str {
        match self {
            Self::ModelWeights(_) => "model_weights",
            Self::TrainingData(_) => "training_data",
            Self::Algorithm(_) => "algorithm",
            Self::Other { kind, .. } => kind,
        }
    }

    /// The full content record.
    pub fn record(&self) -> &Map<String, Value> {
        match self {
            Self::ModelWeights(record)
            | Self::TrainingData(record)
            | Self::Algorithm(record)
            | Self::Other { record, .. } => record,
        }
    }
}

impl TryFrom<Map<String, Value>> for KnowledgeContent {
    type Error = ParenthesesError;

    fn try_from(record: Map<String, Value>) -> Result<Self> {
        let kind = match record.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(ParenthesesError::validation(
                    "content record has no 'type' discriminator",
                ));
            }
        };

        Ok(match kind.as_str() {
            "model_weights" => Self::ModelWeights(record),
            "training_data" => Self::TrainingData(record),
            "algorithm" => Self::Algorithm(record),
            _ => Self::Other { kind, record },
        })
    }
}

impl From<KnowledgeContent> for Map<String, Value> {
    fn from(content: KnowledgeContent) -> Self {
        match content {
            KnowledgeContent::ModelWeights(record)
            | KnowledgeContent::TrainingData(record)
            | KnowledgeContent::Algorithm(record)
            | KnowledgeContent::Other { record, .. } => record,
        }
    }
}

// ---------------------------------------------------------------------------
// KnowledgeItem
// ---------------------------------------------------------------------------

/// An accepted knowledge item. Immutable once stored in a pathway.
///
/// The submission record is kept as received and is what the item
/// serializes to, so query filters and responses see the submitted values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct KnowledgeItem {
    /// Digest of the submission's canonical serialization.
    pub id: KnowledgeId,
    pub domain: String,
    pub content: KnowledgeContent,
    /// `None` when the submission's contributor is null or empty.
    pub contributor: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub version: SemVer,
    pub metadata: Map<String, Value>,
    pub dependencies: Vec<Dependency>,
    /// Signature submitted to the ledger; checked again on query.
    pub signature: Option<Signature>,
    record: Map<String, Value>,
}

impl KnowledgeItem {
    /// Build an item from a raw submission, deriving its id and signature
    /// from the canonical serialization. Every failure is a validation error.
    pub fn from_submission(submission: &Value) -> Result<Self> {
        let record = submission
            .as_object()
            .ok_or_else(|| ParenthesesError::validation("submission must be a JSON object"))?;
        Self::from_record(record.clone())
    }

    fn from_record(record: Map<String, Value>) -> Result<Self> {
        let field = |name: &str| {
            record
                .get(name)
                .ok_or_else(|| ParenthesesError::validation(format!("missing field '{name}'")))
        };
        let string_field = |name: &str| -> Result<String> {
            field(name)?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ParenthesesError::validation(format!("'{name}' must be a string")))
        };
        let decode = |name: &str| -> Result<Value> { field(name).cloned() };
        let invalid = |name: &str, e: serde_json::Error| {
            ParenthesesError::validation(format!("invalid '{name}': {e}"))
        };

        let contributor = match field("contributor")? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            _ => {
                return Err(ParenthesesError::validation(
                    "'contributor' must be a string or null",
                ));
            }
        };

        let timestamp_raw = string_field("timestamp")?;
        let timestamp = parse_timestamp(&timestamp_raw).ok_or_else(|| {
            ParenthesesError::validation(format!("invalid timestamp '{timestamp_raw}'"))
        })?;

        let digest = canonical::digest(&Value::Object(record.clone()));

        Ok(Self {
            id: KnowledgeId(hex::encode(digest)),
            domain: string_field("domain")?,
            content: serde_json::from_value(decode("content")?)
                .map_err(|e| invalid("content", e))?,
            contributor,
            timestamp,
            version: string_field("version")?.parse()?,
            metadata: serde_json::from_value(decode("metadata")?)
                .map_err(|e| invalid("metadata", e))?,
            dependencies: serde_json::from_value(decode("dependencies")?)
                .map_err(|e| invalid("dependencies", e))?,
            signature: Some(Signature(digest)),
            record,
        })
    }

    /// The submission exactly as received.
    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    /// Usage count from the top-level `usage_count`, then
    /// `metadata.usage_count`, 0 if neither is set.
    pub fn usage_count(&self) -> u64 {
        self.record
            .get("usage_count")
            .or_else(|| self.metadata.get("usage_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

impl TryFrom<Map<String, Value>> for KnowledgeItem {
    type Error = ParenthesesError;

    fn try_from(record: Map<String, Value>) -> Result<Self> {
        Self::from_record(record)
    }
}

impl From<KnowledgeItem> for Map<String, Value> {
    fn from(item: KnowledgeItem) -> Self {
        item.record
    }
}

/// Parse an ISO-8601 date-time. Offset-less values are taken as UTC and a
/// bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Query and stats results
// ---------------------------------------------------------------------------

/// A query hit annotated with its current performance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: KnowledgeItem,
    pub performance_score: f64,
}

/// A contributor and their accumulated score within one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorScore {
    pub contributor: String,
    pub score: u64,
}

/// Per-domain stats read exposed to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainStats {
    pub domain: String,
    pub item_count: usize,
    pub top_contributors: Vec<ContributorScore>,
    pub performance_metrics: BTreeMap<KnowledgeId, f64>,
}
