//! Per-node reconciliation
//!
//! The reconciler converges one node onto the canonical record set with the
//! fewest mutating calls. It works in two steps:
//!
//! 1. [`plan()`] diffs the node's reported records against the canonical set
//!    and produces an ordered list of [`Mutation`]s. Pure, no I/O.
//! 2. [`Reconciler::reconcile`] fetches the node's records, plans, and issues
//!    the mutations in order through a [`NodeClient`].
//!
//! ## Diff rules
//!
//! ```text
//! remote record             canonical answer     action
//! ─────────────────────────────────────────────────────────────────
//! domain not in canonical   (absent)             delete            → removed
//! answer differs            Some(other)          delete, then add  → updated
//! answer equal              Some(same)           nothing
//! (domain not on node)      Some(answer)         add               → added
//! ```
//!
//! The remote snapshot is taken once; the node is never re-listed between
//! the two passes.
//!
//! ## Duplicate remote domains
//!
//! If a node reports several records for one domain, exactly one record
//! matching the canonical answer is kept and every other one is deleted
//! (counted as removed). When none matches, all are deleted and the canonical
//! answer is added once (counted as one update). Without duplicates this
//! reduces to the table above.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::model::{Record, RecordSet};
use crate::traits::NodeClient;

/// Change counts for one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    /// Canonical domains that were missing on the node
    pub added: usize,
    /// Node domains foreign to the canonical set (or surplus duplicates)
    pub removed: usize,
    /// Node domains holding a stale answer
    pub updated: usize,
}

impl SyncCounts {
    /// Whether the node was already converged
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

impl std::ops::AddAssign for SyncCounts {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.removed += other.removed;
        self.updated += other.updated;
    }
}

impl fmt::Display for SyncCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added: {}, removed: {}, updated: {}",
            self.added, self.removed, self.updated
        )
    }
}

/// Which mutation class a call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeClass {
    Added,
    Removed,
    Updated,
}

/// A single mutating call against a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// `POST /control/rewrite/delete`
    Delete { record: Record, class: ChangeClass },
    /// `POST /control/rewrite/add`
    Add { record: Record, class: ChangeClass },
}

impl Mutation {
    /// The record this call carries
    pub fn record(&self) -> &Record {
        match self {
            Mutation::Delete { record, .. } | Mutation::Add { record, .. } => record,
        }
    }

    /// The mutation class this call belongs to
    pub fn class(&self) -> ChangeClass {
        match self {
            Mutation::Delete { class, .. } | Mutation::Add { class, .. } => *class,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Delete { record, .. } => write!(f, "delete {}", record),
            Mutation::Add { record, .. } => write!(f, "add {}", record),
        }
    }
}

/// Ordered mutations needed to converge one node, plus their counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub mutations: Vec<Mutation>,
    pub counts: SyncCounts,
}

impl ReconcilePlan {
    fn delete(&mut self, record: &Record, class: ChangeClass) {
        if class == ChangeClass::Removed {
            self.counts.removed += 1;
        }
        self.mutations.push(Mutation::Delete {
            record: record.clone(),
            class,
        });
    }

    fn add(&mut self, record: Record, class: ChangeClass) {
        match class {
            ChangeClass::Added => self.counts.added += 1,
            ChangeClass::Updated => self.counts.updated += 1,
            ChangeClass::Removed => {}
        }
        self.mutations.push(Mutation::Add { record, class });
    }

    /// Whether the node is already converged
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Diff a node's reported records against the canonical set.
///
/// Pass one walks the remote records (grouped by domain, in first-seen
/// order) and emits deletes and update pairs. Pass two adds every canonical
/// domain the remote snapshot did not contain, in canonical order.
pub fn plan(remote: &[Record], canonical: &RecordSet) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    let mut order: Vec<&str> = Vec::new();
    let mut by_domain: HashMap<&str, Vec<&Record>> = HashMap::new();
    for record in remote {
        by_domain
            .entry(record.domain.as_str())
            .or_insert_with(|| {
                order.push(record.domain.as_str());
                Vec::new()
            })
            .push(record);
    }

    // First pass: remote records
    for domain in &order {
        let records = &by_domain[domain];

        let Some(answer) = canonical.get(*domain) else {
            for record in records {
                plan.delete(record, ChangeClass::Removed);
            }
            continue;
        };

        let keep = records.iter().position(|r| &r.answer == answer);
        for (i, record) in records.iter().enumerate() {
            if Some(i) == keep {
                continue;
            }
            if keep.is_none() && i == 0 {
                plan.delete(record, ChangeClass::Updated);
            } else {
                plan.delete(record, ChangeClass::Removed);
            }
        }

        if keep.is_none() {
            plan.add(Record::new(*domain, answer.clone()), ChangeClass::Updated);
        }
    }

    // Second pass: canonical domains missing from the snapshot
    for (domain, answer) in canonical {
        if !by_domain.contains_key(domain.as_str()) {
            plan.add(Record::new(domain.clone(), answer.clone()), ChangeClass::Added);
        }
    }

    plan
}

/// Reconciliation of one node stopped at a failing call.
///
/// Mutations issued before the failure stay applied; nothing is rolled back.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct ReconcileError {
    /// The error raised by the failing call
    pub source: Error,
    /// Number of mutating calls that succeeded before the failure
    pub applied: usize,
    /// Set when the failing call was the add half of an update: the stale
    /// record is already deleted, so the node now has no record at all for
    /// this domain
    pub stranded: Option<Record>,
}

impl ReconcileError {
    fn new(source: Error, applied: usize, stranded: Option<Record>) -> Self {
        Self {
            source,
            applied,
            stranded,
        }
    }
}

/// Converges one node onto the canonical record set
pub struct Reconciler<'a> {
    client: &'a dyn NodeClient,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for the node behind `client`
    pub fn new(client: &'a dyn NodeClient) -> Self {
        Self {
            client,
            dry_run: false,
        }
    }

    /// When set, the node is listed and a plan computed, but no mutating
    /// call is issued
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fetch, diff and apply.
    ///
    /// # Returns
    ///
    /// - `Ok(SyncCounts)`: the node now matches `canonical` (or, in dry-run
    ///   mode, the counts it would take)
    /// - `Err(ReconcileError)`: the first failing call, unretried
    pub async fn reconcile(&self, canonical: &RecordSet) -> Result<SyncCounts, ReconcileError> {
        let node = self.client.node_name();

        let remote = self
            .client
            .list()
            .await
            .map_err(|e| ReconcileError::new(e, 0, None))?;
        debug!("Node {} reports {} record(s)", node, remote.len());

        let plan = plan(&remote, canonical);
        if plan.is_empty() {
            debug!("Node {} already in sync", node);
            return Ok(plan.counts);
        }

        if self.dry_run {
            for mutation in &plan.mutations {
                info!("[DRY-RUN] {}: would {}", node, mutation);
            }
            return Ok(plan.counts);
        }

        for (applied, mutation) in plan.mutations.iter().enumerate() {
            let result = match mutation {
                Mutation::Delete { record, .. } => self.client.delete(record).await,
                Mutation::Add { record, .. } => self.client.add(record).await,
            };

            if let Err(e) = result {
                let stranded = match mutation {
                    Mutation::Add {
                        record,
                        class: ChangeClass::Updated,
                    } => {
                        warn!(
                            "Node {}: stale record for {} was deleted but the corrected answer was not added",
                            node, record.domain
                        );
                        Some(record.clone())
                    }
                    _ => None,
                };
                return Err(ReconcileError::new(e, applied, stranded));
            }

            debug!("Node {}: {}", node, mutation);
        }

        Ok(plan.counts)
    }
}
