//! Shared types, error model, and configuration for the knowledge pathway engine.
//!
//! This crate is the foundation depended on by all other Parentheses crates.
//! It provides:
//! - [`ParenthesesError`], the unified error type
//! - Domain types ([`KnowledgeItem`], [`KnowledgeContent`], [`SemVer`], [`KnowledgeId`])
//! - Canonical serialization and content digests
//! - Configuration ([`AppConfig`], [`ExchangeConfig`], config loading)

pub mod canonical;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExchangeConfig, ExchangeSection, PathwayConfig, PathwaySection, ValidationSection,
    ValidatorConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ParenthesesError, Result};
pub use types::{
    ContributorScore, Dependency, DomainStats, KnowledgeContent, KnowledgeId, KnowledgeItem,
    REQUIRED_FIELDS, ScoredItem, SemVer, Signature, TransactionId, parse_timestamp,
};
