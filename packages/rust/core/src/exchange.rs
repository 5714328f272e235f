//! The knowledge exchange: validated submission, verified query and the
//! periodic optimize-and-reward cycle over every domain pathway.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use parentheses_pathway::PathwayGraph;
use parentheses_shared::{
    DomainStats, ExchangeConfig, KnowledgeId, KnowledgeItem, ParenthesesError, Result,
    ScoredItem, TransactionId,
};
use parentheses_validation::ContentValidator;

use crate::cycle::{self, CycleHandle};
use crate::ledger::{Ledger, with_timeout};

type SharedGraph = Arc<RwLock<PathwayGraph>>;

/// Outcome of one optimize-and-reward pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Domains visited, in name order.
    pub domains: Vec<String>,
    /// Domains whose optimization failed; their contributors are still paid.
    pub optimize_failures: Vec<String>,
    pub rewards_paid: usize,
    pub reward_failures: usize,
    /// Total base units successfully paid.
    pub amount_paid: u64,
}

/// Owns the domain registry and mediates every ledger interaction.
pub struct ExchangeOrchestrator {
    config: ExchangeConfig,
    validator: ContentValidator,
    ledger: Arc<dyn Ledger>,
    domains: RwLock<BTreeMap<String, SharedGraph>>,
    cycle: Mutex<Option<CycleHandle>>,
}

impl ExchangeOrchestrator {
    pub fn new(config: ExchangeConfig, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            validator: ContentValidator::new(config.validator.clone()),
            config,
            ledger,
            domains: RwLock::new(BTreeMap::new()),
            cycle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Validate, record on the ledger, then add to the domain's pathway.
    /// Returns the ledger transaction id.
    #[instrument(skip_all)]
    pub async fn submit(&self, submission: &Value) -> Result<TransactionId> {
        if let Err(rejection) = self.validator.evaluate(submission) {
            info!(%rejection, "submission rejected");
            return Err(ParenthesesError::validation(rejection.to_string()));
        }

        let item = KnowledgeItem::from_submission(submission)?;
        let signature = item
            .signature
            .ok_or_else(|| ParenthesesError::validation("submission has no signature"))?;

        self.check_admissible(&item).await?;

        let tx = with_timeout(
            self.config.ledger_timeout,
            "submit_knowledge",
            self.ledger.submit_knowledge(&item, &signature),
        )
        .await
        .inspect_err(|e| error!(id = %item.id, error = %e, "ledger submission failed"))?;

        let graph = self.graph_or_create(&item.domain).await?;
        let id = item.id.clone();
        let domain = item.domain.clone();
        let related = graph.write().await.add(id.clone(), item)?;

        info!(
            domain = %domain,
            id = %id,
            tx = %tx,
            related = related.len(),
            "knowledge submitted"
        );
        Ok(tx)
    }

    /// Items in `domain` matching `filters` whose signature still verifies,
    /// best first. Unknown domains yield an empty list.
    #[instrument(skip(self, filters))]
    pub async fn query(&self, domain: &str, filters: &Map<String, Value>) -> Vec<ScoredItem> {
        let Some(graph) = self.graph(domain).await else {
            return Vec::new();
        };
        let candidates = graph.read().await.query(filters);

        let mut verified = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(signature) = candidate.item.signature else {
                debug!(id = %candidate.item.id, "dropping unsigned item");
                continue;
            };
            let check = with_timeout(
                self.config.ledger_timeout,
                "verify",
                self.ledger.verify(&signature),
            )
            .await;
            match check {
                Ok(true) => verified.push(candidate),
                Ok(false) => debug!(id = %candidate.item.id, "signature not verified"),
                Err(e) => debug!(id = %candidate.item.id, error = %e, "verification failed"),
            }
        }
        verified
    }

    /// Snapshot of a domain's pathway, or `None` if it has none.
    pub async fn stats(&self, domain: &str) -> Option<DomainStats> {
        let graph = self.graph(domain).await?;
        let stats = graph.read().await.stats();
        Some(stats)
    }

    /// Ids `id` links to in `domain`. Empty when either is unknown.
    pub async fn related(&self, domain: &str, id: &KnowledgeId) -> Vec<KnowledgeId> {
        let Some(graph) = self.graph(domain).await else {
            return Vec::new();
        };
        let graph = graph.read().await;
        graph
            .neighbors(id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Registered domains in sorted order.
    pub async fn domains(&self) -> Vec<String> {
        self.domains.read().await.keys().cloned().collect()
    }

    /// Optimize every pathway and reward its top contributors.
    ///
    /// Failures are isolated: a domain that fails to optimize is logged and
    /// its contributors are still paid, and a failed payout does not stop
    /// the remaining ones.
    #[instrument(skip_all)]
    pub async fn run_cycle_once(&self) -> CycleReport {
        let graphs: Vec<(String, SharedGraph)> = self
            .domains
            .read()
            .await
            .iter()
            .map(|(domain, graph)| (domain.clone(), Arc::clone(graph)))
            .collect();

        let mut report = CycleReport::default();
        for (domain, graph) in graphs {
            let top = {
                let mut graph = graph.write().await;
                if let Err(e) = graph.optimize() {
                    warn!(domain = %domain, error = %e, "pathway optimization failed");
                    report.optimize_failures.push(domain.clone());
                }
                graph.top_contributors(self.config.pathway.top_contributors)
            };

            for entry in top {
                let amount = entry.score.saturating_mul(self.config.reward_unit);
                let paid = with_timeout(
                    self.config.ledger_timeout,
                    "distribute_reward",
                    self.ledger.distribute_reward(&entry.contributor, amount),
                )
                .await;
                match paid {
                    Ok(tx) => {
                        debug!(
                            domain = %domain,
                            contributor = %entry.contributor,
                            amount,
                            tx = %tx,
                            "reward paid"
                        );
                        report.rewards_paid += 1;
                        report.amount_paid = report.amount_paid.saturating_add(amount);
                    }
                    Err(e) => {
                        warn!(
                            domain = %domain,
                            contributor = %entry.contributor,
                            amount,
                            error = %e,
                            "reward failed"
                        );
                        report.reward_failures += 1;
                    }
                }
            }
            report.domains.push(domain);
        }

        info!(
            domains = report.domains.len(),
            optimize_failures = report.optimize_failures.len(),
            rewards_paid = report.rewards_paid,
            reward_failures = report.reward_failures,
            "exchange cycle complete"
        );
        report
    }

    /// Start the background cycle. Returns `false` if one is already running.
    pub async fn start_cycle(self: &Arc<Self>) -> bool {
        let mut slot = self.cycle.lock().await;
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        *slot = Some(cycle::spawn(self));
        true
    }

    /// Cancel the background cycle and wait for it to exit. Returns `false`
    /// if none was running.
    pub async fn stop_cycle(&self) -> bool {
        let handle = self.cycle.lock().await.take();
        match handle {
            Some(handle) => {
                handle.shutdown().await;
                true
            }
            None => false,
        }
    }

    async fn graph(&self, domain: &str) -> Option<SharedGraph> {
        self.domains.read().await.get(domain).cloned()
    }

    /// Reject duplicates and domains past the cap before touching the ledger.
    async fn check_admissible(&self, item: &KnowledgeItem) -> Result<()> {
        let domains = self.domains.read().await;
        match domains.get(&item.domain) {
            Some(graph) => {
                if graph.read().await.contains(&item.id) {
                    return Err(ParenthesesError::validation(format!(
                        "item {} already exists in domain '{}'",
                        item.id, item.domain
                    )));
                }
            }
            None if domains.len() >= self.config.max_domains => {
                return Err(ParenthesesError::validation(format!(
                    "domain limit of {} reached; cannot create '{}'",
                    self.config.max_domains, item.domain
                )));
            }
            None => {}
        }
        Ok(())
    }

    async fn graph_or_create(&self, domain: &str) -> Result<SharedGraph> {
        if let Some(graph) = self.graph(domain).await {
            return Ok(graph);
        }

        let mut domains = self.domains.write().await;
        if let Some(graph) = domains.get(domain) {
            return Ok(Arc::clone(graph));
        }
        if domains.len() >= self.config.max_domains {
            return Err(ParenthesesError::validation(format!(
                "domain limit of {} reached; cannot create '{domain}'",
                self.config.max_domains
            )));
        }

        info!(domain, "creating pathway");
        let graph = Arc::new(RwLock::new(PathwayGraph::new(
            domain,
            self.config.pathway.clone(),
        )));
        domains.insert(domain.to_string(), Arc::clone(&graph));
        Ok(graph)
    }
}

impl std::fmt::Debug for ExchangeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
