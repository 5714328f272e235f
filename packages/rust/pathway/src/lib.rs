//! Per-domain knowledge pathway graph.
//!
//! A [`PathwayGraph`] owns the knowledge items of one domain, links them by
//! content similarity, keeps a smoothed performance score per item and an
//! accumulated score per contributor, and periodically re-scores items by
//! eigenvector centrality before pruning edges into weak items.

pub mod centrality;
pub mod similarity;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use parentheses_shared::{
    ContributorScore, DomainStats, KnowledgeId, KnowledgeItem, ParenthesesError, PathwayConfig,
    Result, ScoredItem,
};

/// Weight of the age-decay term in the initial performance score.
const AGE_WEIGHT: f64 = 0.4;

/// Weight of the log-scaled usage term in the initial performance score.
const USAGE_WEIGHT: f64 = 0.6;

/// Relative slack when comparing scores against the prune threshold, so
/// equal scores are not lost to rounding in the mean.
const PRUNE_EPSILON: f64 = 1e-12;

/// Summary of one [`PathwayGraph::optimize`] pass.
#[derive(Debug, Clone, Default)]
pub struct OptimizeReport {
    pub nodes: usize,
    pub edges_before: usize,
    pub edges_after: usize,
    /// Mean performance score edges were pruned against.
    pub prune_threshold: f64,
    /// Centrality contribution per item; sums to 1 for a non-empty graph.
    pub centrality: BTreeMap<KnowledgeId, f64>,
}

/// Knowledge graph and scoring state for a single domain.
#[derive(Debug)]
pub struct PathwayGraph {
    domain: String,
    config: PathwayConfig,
    items: BTreeMap<KnowledgeId, KnowledgeItem>,
    tokens: HashMap<KnowledgeId, HashSet<String>>,
    adjacency: BTreeMap<KnowledgeId, BTreeSet<KnowledgeId>>,
    performance: BTreeMap<KnowledgeId, f64>,
    contributors: HashMap<String, u64>,
}

impl PathwayGraph {
    pub fn new(domain: impl Into<String>, config: PathwayConfig) -> Self {
        Self {
            domain: domain.into(),
            config,
            items: BTreeMap::new(),
            tokens: HashMap::new(),
            adjacency: BTreeMap::new(),
            performance: BTreeMap::new(),
            contributors: HashMap::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &KnowledgeId) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &KnowledgeId) -> Option<&KnowledgeItem> {
        self.items.get(id)
    }

    /// Outbound adjacency of `id`.
    pub fn neighbors(&self, id: &KnowledgeId) -> Option<&BTreeSet<KnowledgeId>> {
        self.adjacency.get(id)
    }

    pub fn performance_score(&self, id: &KnowledgeId) -> Option<f64> {
        self.performance.get(id).copied()
    }

    pub fn contributor_score(&self, contributor: &str) -> u64 {
        self.contributors.get(contributor).copied().unwrap_or(0)
    }

    /// Number of directed edges currently in the graph.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    /// Insert `item` under `id`, scoring its age and usage as of now.
    pub fn add(&mut self, id: KnowledgeId, item: KnowledgeItem) -> Result<Vec<KnowledgeId>> {
        self.add_at(id, item, Utc::now())
    }

    /// Insert `item` under `id`, linking it to similar items, and return the
    /// ids it was linked to. `now` is the reference time for age decay.
    pub fn add_at(
        &mut self,
        id: KnowledgeId,
        item: KnowledgeItem,
        now: DateTime<Utc>,
    ) -> Result<Vec<KnowledgeId>> {
        if self.items.contains_key(&id) {
            return Err(ParenthesesError::validation(format!(
                "item {id} is already in pathway '{}'",
                self.domain
            )));
        }
        if item.domain != self.domain {
            return Err(ParenthesesError::validation(format!(
                "item domain '{}' does not match pathway '{}'",
                item.domain, self.domain
            )));
        }

        let tokens = similarity::tokenize(&item.content);
        let related: Vec<KnowledgeId> = self
            .tokens
            .iter()
            .filter(|(_, other)| {
                similarity::jaccard(&tokens, other) > self.config.similarity_threshold
            })
            .map(|(other_id, _)| other_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for other in &related {
            self.adjacency
                .entry(other.clone())
                .or_default()
                .insert(id.clone());
        }
        self.adjacency
            .insert(id.clone(), related.iter().cloned().collect());

        if let Some(contributor) = item.contributor.as_deref().filter(|c| !c.is_empty()) {
            *self.contributors.entry(contributor.to_string()).or_insert(0) += 1;
        }

        let score = initial_performance(&item, now);
        self.performance.insert(id.clone(), score);
        self.tokens.insert(id.clone(), tokens);

        debug!(
            domain = %self.domain,
            id = %id,
            related = related.len(),
            score,
            "added knowledge item"
        );

        self.items.insert(id, item);
        Ok(related)
    }

    /// Items whose submitted fields equal every filter value, best first.
    pub fn query(&self, filters: &Map<String, Value>) -> Vec<ScoredItem> {
        let mut matched: Vec<(&KnowledgeId, ScoredItem)> = self
            .items
            .iter()
            .filter(|(_, item)| {
                filters
                    .iter()
                    .all(|(key, expected)| item.record().get(key) == Some(expected))
            })
            .map(|(id, item)| {
                let scored = ScoredItem {
                    item: item.clone(),
                    performance_score: self.performance.get(id).copied().unwrap_or(0.0),
                };
                (id, scored)
            })
            .collect();

        matched.sort_by(|(a_id, a), (b_id, b)| {
            b.performance_score
                .total_cmp(&a.performance_score)
                .then_with(|| a_id.cmp(b_id))
        });
        matched.into_iter().map(|(_, scored)| scored).collect()
    }

    /// Re-score every item by centrality, then prune edges into items
    /// scoring below the mean. Leaves the graph untouched on error.
    #[instrument(skip_all, fields(domain = %self.domain, nodes = self.items.len()))]
    pub fn optimize(&mut self) -> Result<OptimizeReport> {
        if self.items.is_empty() {
            return Ok(OptimizeReport::default());
        }

        let ids: Vec<&KnowledgeId> = self.items.keys().collect();
        let index: HashMap<&KnowledgeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut edges = Vec::new();
        for (from, targets) in &self.adjacency {
            let Some(&i) = index.get(from) else {
                continue;
            };
            edges.extend(targets.iter().filter_map(|to| index.get(to).map(|&j| (i, j))));
        }
        let edges_before = edges.len();

        let scores = centrality::eigenvector_centrality(ids.len(), &edges)?;
        let centrality: BTreeMap<KnowledgeId, f64> = ids
            .iter()
            .zip(&scores)
            .map(|(id, score)| ((*id).clone(), *score))
            .collect();

        let retention = self.config.smoothing_retention;
        let smoothed: BTreeMap<KnowledgeId, f64> = centrality
            .iter()
            .map(|(id, c)| {
                let current = self.performance.get(id).copied().unwrap_or(0.0);
                (id.clone(), retention * current + (1.0 - retention) * c)
            })
            .collect();
        if let Some((id, score)) = smoothed.iter().find(|(_, s)| !s.is_finite()) {
            return Err(ParenthesesError::Graph(format!(
                "performance score for {id} is not finite ({score})"
            )));
        }
        self.performance = smoothed;

        let threshold =
            self.performance.values().sum::<f64>() / self.performance.len() as f64;
        let floor = threshold - PRUNE_EPSILON * threshold.abs().max(1.0);
        let performance = &self.performance;
        for targets in self.adjacency.values_mut() {
            targets.retain(|to| performance.get(to).is_some_and(|&p| p >= floor));
        }
        let edges_after = self.edge_count();

        info!(
            edges_before,
            edges_after,
            prune_threshold = threshold,
            "pathway optimized"
        );

        Ok(OptimizeReport {
            nodes: self.items.len(),
            edges_before,
            edges_after,
            prune_threshold: threshold,
            centrality,
        })
    }

    /// Up to `n` contributors by score, ties broken by contributor id.
    pub fn top_contributors(&self, n: usize) -> Vec<ContributorScore> {
        let mut ranked: Vec<ContributorScore> = self
            .contributors
            .iter()
            .map(|(contributor, &score)| ContributorScore {
                contributor: contributor.clone(),
                score,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.contributor.cmp(&b.contributor))
        });
        ranked.truncate(n);
        ranked
    }

    /// Item count, top contributors and performance scores.
    pub fn stats(&self) -> DomainStats {
        DomainStats {
            domain: self.domain.clone(),
            item_count: self.items.len(),
            top_contributors: self.top_contributors(self.config.top_contributors),
            performance_metrics: self.performance.clone(),
        }
    }
}

/// `0.4 / (1 + age_days) + 0.6 * ln(1 + usage_count)`. Future timestamps
/// count as age zero.
pub fn initial_performance(item: &KnowledgeItem, now: DateTime<Utc>) -> f64 {
    let age_days = (now - item.timestamp).num_days().max(0) as f64;
    let age_factor = 1.0 / (1.0 + age_days);
    let usage_factor = (item.usage_count() as f64).ln_1p();
    AGE_WEIGHT * age_factor + USAGE_WEIGHT * usage_factor
}
