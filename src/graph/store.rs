//! Concurrent reachability graph store
//!
//! Every node carries a set of outgoing dependency edges and one reference
//! counter per shrink type. Nodes live in a sharded map and are handed out
//! as `Arc`s, so counter updates never hold a map lock while propagating.

use super::{MemberId, NodeRef, ShrinkType};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// File holding the persisted graph inside the state directory
pub const STATE_FILE_NAME: &str = "reachability-graph.json";

/// Current state format version
const STATE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Reference count of {node} for {shrink_type} would drop below zero")]
    CounterUnderflow { node: NodeRef, shrink_type: ShrinkType },
    #[error("Method {0} is already registered")]
    DuplicateMember(NodeRef),
    #[error("Class {0} is not registered")]
    UnknownClass(NodeRef),
    #[error("Failed to access graph state: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse graph state: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Graph state version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

#[derive(Debug, Default)]
struct Node {
    dependencies: DashSet<NodeRef>,
    counters: [AtomicU32; ShrinkType::COUNT],
    is_virtual: AtomicBool,
}

#[derive(Debug)]
struct ClassRecord {
    file: PathBuf,
    members: DashMap<NodeRef, MemberId>,
}

/// Reachability graph shared by the scanner and the shrinking engine
#[derive(Debug)]
pub struct GraphStore {
    state_dir: PathBuf,
    nodes: DashMap<NodeRef, Arc<Node>>,
    classes: DashMap<NodeRef, ClassRecord>,
}

impl GraphStore {
    /// Create an empty store persisting under `state_dir`
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            nodes: DashMap::new(),
            classes: DashMap::new(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE_NAME)
    }

    /// Fetch a node, creating it on first use. Dependencies on library
    /// classes that are never registered end up here too.
    fn node(&self, reference: &NodeRef) -> Arc<Node> {
        if let Some(node) = self.nodes.get(reference) {
            return Arc::clone(node.value());
        }
        Arc::clone(self.nodes.entry(reference.clone()).or_default().value())
    }

    fn existing_node(&self, reference: &NodeRef) -> Option<Arc<Node>> {
        self.nodes.get(reference).map(|node| Arc::clone(node.value()))
    }

    /// Register a class and the file it was read from
    pub fn add_class(&self, internal_name: &str, file: &Path) -> NodeRef {
        let reference = NodeRef::class(internal_name);
        self.classes
            .entry(reference.clone())
            .and_modify(|record| record.file = file.to_path_buf())
            .or_insert_with(|| ClassRecord {
                file: file.to_path_buf(),
                members: DashMap::new(),
            });
        self.node(&reference);
        reference
    }

    /// Register a method under an already registered class
    pub fn add_method(&self, class: &NodeRef, method: &MemberId) -> Result<NodeRef, GraphError> {
        let reference = NodeRef::member(class.as_str(), &method.name, &method.descriptor);
        {
            let record = self
                .classes
                .get(class)
                .ok_or_else(|| GraphError::UnknownClass(class.clone()))?;
            if record.members.insert(reference.clone(), method.clone()).is_some() {
                return Err(GraphError::DuplicateMember(reference));
            }
        }
        self.node(&reference);
        Ok(reference)
    }

    pub fn add_dependency(&self, from: &NodeRef, to: &NodeRef) {
        self.node(from).dependencies.insert(to.clone());
    }

    pub fn remove_dependency(&self, from: &NodeRef, to: &NodeRef) {
        if let Some(node) = self.existing_node(from) {
            node.dependencies.remove(to);
        }
    }

    /// Snapshot of a node's outgoing edges
    pub fn dependencies(&self, node: &NodeRef) -> Vec<NodeRef> {
        self.existing_node(node)
            .map(|n| n.dependencies.iter().map(|d| d.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn mark_virtual(&self, node: &NodeRef) {
        self.node(node).is_virtual.store(true, Ordering::Relaxed);
    }

    pub fn is_virtual(&self, node: &NodeRef) -> bool {
        self.existing_node(node)
            .map(|n| n.is_virtual.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Increment the counter, returning its value before the increment
    pub fn get_and_increment(&self, node: &NodeRef, shrink_type: ShrinkType) -> u32 {
        self.node(node).counters[shrink_type.index()].fetch_add(1, Ordering::SeqCst)
    }

    /// Decrement the counter, returning its value after the decrement
    ///
    /// A counter that is already zero is left untouched and reported as
    /// [`GraphError::CounterUnderflow`].
    pub fn decrement_and_get(&self, node: &NodeRef, shrink_type: ShrinkType) -> Result<u32, GraphError> {
        let underflow = || GraphError::CounterUnderflow {
            node: node.clone(),
            shrink_type,
        };
        let target = self.existing_node(node).ok_or_else(underflow)?;
        target.counters[shrink_type.index()]
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1))
            .map(|previous| previous - 1)
            .map_err(|_| underflow())
    }

    pub fn counter(&self, node: &NodeRef, shrink_type: ShrinkType) -> u32 {
        self.existing_node(node)
            .map(|n| n.counters[shrink_type.index()].load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Registered classes that have a live class node or at least one live
    /// member for `shrink_type`, sorted
    pub fn classes_to_keep(&self, shrink_type: ShrinkType) -> Vec<NodeRef> {
        let mut kept: Vec<NodeRef> = self
            .classes
            .iter()
            .filter(|entry| {
                self.counter(entry.key(), shrink_type) > 0
                    || entry
                        .value()
                        .members
                        .iter()
                        .any(|member| self.counter(member.key(), shrink_type) > 0)
            })
            .map(|entry| entry.key().clone())
            .collect();
        kept.sort();
        kept
    }

    /// Members of `class` with a positive count for `shrink_type`
    pub fn members_to_keep(&self, class: &NodeRef, shrink_type: ShrinkType) -> HashSet<MemberId> {
        self.classes
            .get(class)
            .map(|record| {
                record
                    .members
                    .iter()
                    .filter(|member| self.counter(member.key(), shrink_type) > 0)
                    .map(|member| member.value().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All members registered for `class`, keyed by node reference
    pub fn members_of(&self, class: &NodeRef) -> Option<BTreeMap<NodeRef, MemberId>> {
        self.classes.get(class).map(|record| {
            record
                .members
                .iter()
                .map(|member| (member.key().clone(), member.value().clone()))
                .collect()
        })
    }

    /// The file a class was read from
    pub fn class_file(&self, class: &NodeRef) -> Option<PathBuf> {
        self.classes.get(class).map(|record| record.file.clone())
    }

    pub fn is_registered_class(&self, class: &NodeRef) -> bool {
        self.classes.contains_key(class)
    }

    /// Registered classes, sorted
    pub fn classes(&self) -> Vec<NodeRef> {
        let mut classes: Vec<NodeRef> = self.classes.iter().map(|c| c.key().clone()).collect();
        classes.sort();
        classes
    }

    /// All node references, sorted
    pub fn node_refs(&self) -> Vec<NodeRef> {
        let mut nodes: Vec<NodeRef> = self.nodes.iter().map(|n| n.key().clone()).collect();
        nodes.sort();
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.value().dependencies.len()).sum()
    }

    /// Drop every node and class record held in memory
    pub fn clear(&self) {
        self.nodes.clear();
        self.classes.clear();
    }

    /// Point-in-time copy of the whole store in a deterministic order
    pub fn snapshot(&self) -> GraphSnapshot {
        let classes = self
            .classes
            .iter()
            .map(|entry| {
                let members = entry
                    .value()
                    .members
                    .iter()
                    .map(|m| (m.key().clone(), m.value().clone()))
                    .collect();
                (
                    entry.key().clone(),
                    ClassSnapshot {
                        file: entry.value().file.clone(),
                        members,
                    },
                )
            })
            .collect();

        let nodes = self
            .nodes
            .iter()
            .map(|entry| {
                let node = entry.value();
                let mut counters = [0u32; ShrinkType::COUNT];
                for (slot, counter) in counters.iter_mut().zip(node.counters.iter()) {
                    *slot = counter.load(Ordering::SeqCst);
                }
                (
                    entry.key().clone(),
                    NodeSnapshot {
                        dependencies: node.dependencies.iter().map(|d| d.key().clone()).collect(),
                        counters,
                        is_virtual: node.is_virtual.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        GraphSnapshot {
            version: STATE_VERSION,
            classes,
            nodes,
        }
    }

    /// Replace the in-memory graph with the contents of a snapshot
    pub fn restore(&self, snapshot: GraphSnapshot) {
        self.clear();
        for (reference, class) in snapshot.classes {
            self.classes.insert(
                reference,
                ClassRecord {
                    file: class.file,
                    members: class.members.into_iter().collect(),
                },
            );
        }
        for (reference, state) in snapshot.nodes {
            let node = Node {
                dependencies: state.dependencies.into_iter().collect(),
                counters: state.counters.map(AtomicU32::new),
                is_virtual: AtomicBool::new(state.is_virtual),
            };
            self.nodes.insert(reference, Arc::new(node));
        }
    }

    /// Persist the graph to the state directory
    pub fn save_state(&self) -> Result<(), GraphError> {
        fs::create_dir_all(&self.state_dir)?;
        let path = self.state_file();
        let writer = BufWriter::new(fs::File::create(&path)?);
        serde_json::to_writer(writer, &self.snapshot())?;
        debug!(
            "Saved {} nodes, {} edges to {}",
            self.node_count(),
            self.edge_count(),
            path.display()
        );
        Ok(())
    }

    /// Replace the in-memory graph with the persisted one
    pub fn load_state(&self) -> Result<(), GraphError> {
        let path = self.state_file();
        let reader = BufReader::new(fs::File::open(&path)?);
        let snapshot: GraphSnapshot = serde_json::from_reader(reader)?;
        if snapshot.version != STATE_VERSION {
            return Err(GraphError::VersionMismatch {
                found: snapshot.version,
                expected: STATE_VERSION,
            });
        }
        self.restore(snapshot);
        debug!(
            "Loaded {} nodes, {} edges from {}",
            self.node_count(),
            self.edge_count(),
            path.display()
        );
        Ok(())
    }

    /// Delete the persisted graph. Other files in the state directory are
    /// left alone.
    pub fn remove_stored_state(&self) -> Result<(), GraphError> {
        match fs::remove_file(self.state_file()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Serialized form of a [`GraphStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub classes: BTreeMap<NodeRef, ClassSnapshot>,
    pub nodes: BTreeMap<NodeRef, NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSnapshot {
    pub file: PathBuf,
    pub members: BTreeMap<NodeRef, MemberId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub dependencies: BTreeSet<NodeRef>,
    pub counters: [u32; ShrinkType::COUNT],
    #[serde(default)]
    pub is_virtual: bool,
}
