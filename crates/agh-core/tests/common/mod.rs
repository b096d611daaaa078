//! Test doubles and common utilities for sync contract tests
//!
//! `FakeNode` behaves like a rewrite control API held in memory: `add`
//! appends (duplicates allowed, as on a real node), `delete` removes the
//! first exact `{domain, answer}` match, and every call is recorded.

#![allow(dead_code)]

use agh_core::error::{Error, RequestError, Result};
use agh_core::traits::{NodeClient, NodeClientFactory};
use agh_core::{Credential, Node, Record, RecordSet};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Add(Record),
    Delete(Record),
}

/// Which call kind an injected failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    List,
    Add,
    Delete,
}

#[derive(Debug, Default)]
struct FakeState {
    records: Vec<Record>,
    calls: Vec<Call>,
    fail_on: Option<(CallKind, RequestError)>,
    fatal_on_list: bool,
}

/// In-memory node; clones share state
#[derive(Debug, Clone)]
pub struct FakeNode {
    name: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    /// Create a node already holding `pairs`
    pub fn with_records(name: &str, pairs: &[(&str, &str)]) -> Self {
        let node = Self::new(name);
        node.state.lock().unwrap().records = pairs.iter().map(|(d, a)| Record::new(*d, *a)).collect();
        node
    }

    /// Make every call of `kind` fail with `error`
    pub fn fail_on(&self, kind: CallKind, error: RequestError) {
        self.state.lock().unwrap().fail_on = Some((kind, error));
    }

    /// Make `list()` fail with a non-request error
    pub fn fatal_on_list(&self) {
        self.state.lock().unwrap().fatal_on_list = true;
    }

    /// Current records held by the node
    pub fn records(&self) -> Vec<Record> {
        self.state.lock().unwrap().records.clone()
    }

    /// Current records as a mapping
    pub fn record_set(&self) -> RecordSet {
        agh_core::model::to_record_set(&self.records())
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only add/delete calls
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::List))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn check(&self, state: &FakeState, kind: CallKind) -> Result<()> {
        match &state.fail_on {
            Some((k, e)) if *k == kind => Err(Error::Request(e.clone())),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl NodeClient for FakeNode {
    async fn list(&self) -> Result<Vec<Record>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        if state.fatal_on_list {
            return Err(Error::Other("simulated internal failure".to_string()));
        }
        self.check(&state, CallKind::List)?;
        Ok(state.records.clone())
    }

    async fn add(&self, record: &Record) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Add(record.clone()));
        self.check(&state, CallKind::Add)?;
        state.records.push(record.clone());
        Ok(())
    }

    async fn delete(&self, record: &Record) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(record.clone()));
        self.check(&state, CallKind::Delete)?;
        if let Some(pos) = state.records.iter().position(|r| r == record) {
            state.records.remove(pos);
        }
        Ok(())
    }

    fn node_name(&self) -> &str {
        &self.name
    }
}

/// Hands out the registered `FakeNode` for each node name
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    nodes: HashMap<String, FakeNode>,
    created: Arc<Mutex<Vec<String>>>,
}

impl FakeFactory {
    pub fn new(nodes: &[FakeNode]) -> Self {
        Self {
            nodes: nodes.iter().map(|n| (n.name.clone(), n.clone())).collect(),
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Node names clients were requested for, in order
    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl NodeClientFactory for FakeFactory {
    fn create(&self, node: &Node) -> Result<Box<dyn NodeClient>> {
        self.created.lock().unwrap().push(node.name.clone());
        self.nodes
            .get(&node.name)
            .map(|n| Box::new(n.clone()) as Box<dyn NodeClient>)
            .ok_or_else(|| Error::transport(format!("unknown host for {}", node.base_url)))
    }
}

/// Registry entry for a fake node
pub fn node(name: &str) -> Node {
    Node::new(
        name,
        format!("https://{}.example.org", name),
        Credential::from_login("admin", "secret"),
    )
}

/// Build a canonical set from pairs
pub fn canonical(pairs: &[(&str, &str)]) -> RecordSet {
    pairs
        .iter()
        .map(|(d, a)| (d.to_string(), a.to_string()))
        .collect()
}
