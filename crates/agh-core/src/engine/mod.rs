//! Cluster sync engine
//!
//! The SyncEngine is responsible for:
//! - Walking every managed node in registry order, one at a time
//! - Running the [`Reconciler`] against each node
//! - Isolating per-node request failures so the rest of the run continues
//! - Collecting per-node outcomes into a [`SyncReport`]
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   nodes + canonical   ┌──────────────┐
//! │ NodeRegistry │──────────────────────▶│  SyncEngine  │
//! └──────────────┘                       └──────────────┘
//!                                               │ per node, sequential
//!                                               ▼
//!                                        ┌──────────────┐
//!                                        │  Reconciler  │
//!                                        └──────────────┘
//!                                               │ list / delete / add
//!                                               ▼
//!                                        ┌──────────────┐
//!                                        │  NodeClient  │──▶ remote node
//!                                        └──────────────┘
//! ```
//!
//! ## Failure Isolation
//!
//! A [`RequestError`] from one node (including failing to build its client)
//! becomes a [`NodeOutcome::Failed`] entry and the loop moves on. Any other
//! error aborts the run. There are no retries and no backoff.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, RequestError, Result};
use crate::model::{Node, Record, RecordSet, merge, to_record_set};
use crate::reconcile::{ReconcileError, Reconciler, SyncCounts};
use crate::traits::{NodeClientFactory, NodeRegistry};

/// Why a node could not be converged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    /// The failing request
    pub error: RequestError,
    /// Mutating calls that succeeded before the failure (left in place)
    pub applied: usize,
    /// Domain whose stale record was deleted without its replacement landing
    pub stranded: Option<Record>,
}

/// Result of syncing one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// The node now matches the canonical set
    Synced(SyncCounts),
    /// The node was skipped after a request failure
    Failed(NodeFailure),
}

/// Outcome for one node, by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResult {
    pub node_name: String,
    pub outcome: NodeOutcome,
}

impl NodeResult {
    /// Counts, if the node synced
    pub fn counts(&self) -> Option<SyncCounts> {
        match &self.outcome {
            NodeOutcome::Synced(counts) => Some(*counts),
            NodeOutcome::Failed(_) => None,
        }
    }

    /// Failure, if the node failed
    pub fn failure(&self) -> Option<&NodeFailure> {
        match &self.outcome {
            NodeOutcome::Synced(_) => None,
            NodeOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Outcome of a whole sync run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Per-node outcomes, in the order nodes were processed
    pub results: Vec<NodeResult>,
    /// Whether mutations were only planned
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Whether any node failed
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.failure().is_some())
    }

    /// Number of failed nodes
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.failure().is_some()).count()
    }

    /// Counts summed over every synced node
    pub fn totals(&self) -> SyncCounts {
        let mut totals = SyncCounts::default();
        for counts in self.results.iter().filter_map(NodeResult::counts) {
            totals += counts;
        }
        totals
    }

    /// Look up one node's result
    pub fn get(&self, node_name: &str) -> Option<&NodeResult> {
        self.results.iter().find(|r| r.node_name == node_name)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.results.is_empty() {
            return writeln!(f, "No nodes are being managed yet.");
        }

        let width = self
            .results
            .iter()
            .map(|r| r.node_name.len())
            .max()
            .unwrap_or(0);

        for result in &self.results {
            write!(f, "    {:<width$}  ", result.node_name, width = width)?;
            match &result.outcome {
                NodeOutcome::Synced(counts) if self.dry_run => {
                    writeln!(f, "PLAN ({})", counts)?;
                }
                NodeOutcome::Synced(counts) => writeln!(f, "OK ({})", counts)?,
                NodeOutcome::Failed(failure) => {
                    match failure.error.status() {
                        Some(code) => write!(f, "FAIL (HTTP {})", code)?,
                        None => write!(f, "FAIL ({})", failure.error)?,
                    }
                    if let Some(record) = &failure.stranded {
                        write!(f, " [{} left without a record]", record.domain)?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

/// Outcome of folding every node's records together
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Merged record set; later nodes win on conflicting domains
    pub records: RecordSet,
    /// `(node name, records reported)` in the order nodes were queried
    pub per_node: Vec<(String, usize)>,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_node
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        for (name, count) in &self.per_node {
            writeln!(f, "    {:<width$}  OK ({} record(s))", name, count, width = width)?;
        }
        Ok(())
    }
}

/// Core sync engine
///
/// Holds the factory used to reach nodes. Everything else (nodes, canonical
/// records, the registry) is passed into each call, so the engine carries no
/// state between runs.
pub struct SyncEngine {
    /// Builds one client per node
    factory: Box<dyn NodeClientFactory>,

    /// Plan only, never mutate
    dry_run: bool,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(factory: Box<dyn NodeClientFactory>, config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory,
            dry_run: config.dry_run,
        })
    }

    /// Create an engine with default settings
    pub fn with_factory(factory: Box<dyn NodeClientFactory>) -> Self {
        Self {
            factory,
            dry_run: false,
        }
    }

    /// Enable or disable dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Converge every node in `nodes` onto `canonical`, in order.
    ///
    /// # Returns
    ///
    /// - `Ok(SyncReport)`: one entry per node, successes and request failures
    /// - `Err(Error)`: a non-request error, fatal to the run
    pub async fn sync(&self, nodes: &[Node], canonical: &RecordSet) -> Result<SyncReport> {
        let started_at = Utc::now();
        info!(
            "Syncing {} record(s) to {} node(s){}",
            canonical.len(),
            nodes.len(),
            if self.dry_run { " [DRY-RUN]" } else { "" }
        );

        let mut results = Vec::with_capacity(nodes.len());
        for node in nodes {
            let outcome = self.sync_node(node, canonical).await?;
            results.push(NodeResult {
                node_name: node.name.clone(),
                outcome,
            });
        }

        let report = SyncReport {
            results,
            dry_run: self.dry_run,
            started_at,
            finished_at: Utc::now(),
        };

        if report.has_failures() {
            warn!(
                "Sync finished: {} of {} node(s) failed",
                report.failed_count(),
                report.results.len()
            );
        } else {
            info!("Sync finished: {} node(s), {}", report.results.len(), report.totals());
        }

        Ok(report)
    }

    /// Sync using the nodes and canonical records held by `registry`.
    ///
    /// Registry errors are fatal.
    pub async fn sync_registry(&self, registry: &dyn NodeRegistry) -> Result<SyncReport> {
        let nodes = registry.list_nodes().await?;
        let canonical = registry.canonical_records().await?;
        self.sync(&nodes, &canonical).await
    }

    /// Reconcile one node, turning request failures into an outcome
    async fn sync_node(&self, node: &Node, canonical: &RecordSet) -> Result<NodeOutcome> {
        debug!("Syncing node {} ({})", node.name, node.base_url);

        let client = match self.factory.create(node) {
            Ok(client) => client,
            Err(Error::Request(e)) => {
                error!("Node {}: cannot build client: {}", node.name, e);
                return Ok(NodeOutcome::Failed(NodeFailure {
                    error: e,
                    applied: 0,
                    stranded: None,
                }));
            }
            Err(e) => return Err(e),
        };

        let reconciler = Reconciler::new(client.as_ref()).with_dry_run(self.dry_run);
        match reconciler.reconcile(canonical).await {
            Ok(counts) => {
                info!("Node {}: OK ({})", node.name, counts);
                Ok(NodeOutcome::Synced(counts))
            }
            Err(ReconcileError {
                source: Error::Request(e),
                applied,
                stranded,
            }) => {
                error!(
                    "Node {}: FAIL ({}) after {} applied change(s)",
                    node.name, e, applied
                );
                Ok(NodeOutcome::Failed(NodeFailure {
                    error: e,
                    applied,
                    stranded,
                }))
            }
            Err(ReconcileError { source, .. }) => Err(source),
        }
    }

    /// Query every node and merge their records.
    ///
    /// Nodes are folded in order with [`merge`], so a later node's answer
    /// wins over an earlier one for the same domain. The first failing node
    /// aborts the fetch: a partial result must not replace the canonical set.
    pub async fn fetch(&self, nodes: &[Node]) -> Result<FetchReport> {
        let mut report = FetchReport::default();

        for node in nodes {
            let client = self.factory.create(node)?;
            let fetched = client.list().await?;
            debug!("Fetched {} record(s) from {}", fetched.len(), node.name);

            report.records = merge(&report.records, &to_record_set(&fetched));
            report.per_node.push((node.name.clone(), fetched.len()));
        }

        info!(
            "Fetched {} distinct record(s) from {} node(s)",
            report.records.len(),
            nodes.len()
        );
        Ok(report)
    }

    /// Fetch from every registered node and store the result as the new
    /// canonical record set (skipped in dry-run mode).
    ///
    /// Fails with `Error::InvalidInput` when no nodes are registered: an
    /// empty fetch would otherwise wipe the canonical set.
    pub async fn fetch_into_registry(&self, registry: &dyn NodeRegistry) -> Result<FetchReport> {
        let nodes = registry.list_nodes().await?;
        if nodes.is_empty() {
            return Err(Error::invalid_input(
                "No nodes are being managed yet; nothing to fetch from",
            ));
        }

        let report = self.fetch(&nodes).await?;

        if self.dry_run {
            info!(
                "[DRY-RUN] Would replace canonical records with {} fetched record(s)",
                report.records.len()
            );
        } else {
            registry.replace_records(report.records.clone()).await?;
        }
        Ok(report)
    }
}
