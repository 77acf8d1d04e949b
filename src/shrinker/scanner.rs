//! Builds graph nodes and edges from compiled classes

use super::keep::KeepRules;
use super::ShrinkError;
use crate::classfile::{code, descriptor, ClassFile, ClassFileError};
use crate::graph::{GraphError, GraphStore, MemberId, NodeRef, ShrinkType};
use dashmap::DashSet;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::trace;

/// A method and the nodes its code depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedMethod {
    pub id: MemberId,
    pub reference: NodeRef,
    pub dependencies: BTreeSet<NodeRef>,
}

/// The dependency view of one class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedClass {
    pub name: String,
    pub reference: NodeRef,
    pub methods: Vec<ScannedMethod>,
}

/// Extract every method of a class and its dependencies
///
/// Dependencies are the classes of object-typed parameters plus the target
/// of every `invokevirtual`. Return types, primitive and array parameters,
/// fields and annotations are not tracked.
pub fn scan_class(bytes: &[u8]) -> Result<ScannedClass, ClassFileError> {
    let class = ClassFile::parse(bytes)?;
    let name = class.class_name()?.to_string();

    let mut methods = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        let id = class.member_id(method)?;
        let reference = NodeRef::member(&name, &id.name, &id.descriptor);

        let mut dependencies = BTreeSet::new();
        for param in descriptor::parameter_types(&id.descriptor)? {
            if let Some(type_ref) = NodeRef::from_type_descriptor(param) {
                dependencies.insert(type_ref);
            }
        }
        if let Some(body) = class.code_attribute(method)? {
            for target in code::invoked_virtual_methods(body, &class.constant_pool)? {
                dependencies.insert(NodeRef::member(target.class, target.name, target.descriptor));
            }
        }

        methods.push(ScannedMethod {
            id,
            reference,
            dependencies,
        });
    }

    Ok(ScannedClass {
        reference: NodeRef::class(&name),
        name,
        methods,
    })
}

/// Entry points discovered during graph construction, one concurrent set
/// per shrink type
#[derive(Debug)]
pub struct EntryPoints {
    sets: HashMap<ShrinkType, DashSet<NodeRef>>,
}

impl EntryPoints {
    pub fn new() -> Self {
        Self {
            sets: ShrinkType::ALL.iter().map(|&t| (t, DashSet::new())).collect(),
        }
    }

    pub fn insert(&self, shrink_type: ShrinkType, node: NodeRef) {
        if let Some(set) = self.sets.get(&shrink_type) {
            set.insert(node);
        }
    }

    /// Entry points of a shrink type, sorted
    pub fn get(&self, shrink_type: ShrinkType) -> Vec<NodeRef> {
        let mut nodes: Vec<NodeRef> = self
            .sets
            .get(&shrink_type)
            .map(|set| set.iter().map(|n| n.key().clone()).collect())
            .unwrap_or_default();
        nodes.sort();
        nodes
    }

    pub fn len(&self, shrink_type: ShrinkType) -> usize {
        self.sets.get(&shrink_type).map_or(0, |set| set.len())
    }
}

impl Default for EntryPoints {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers scanned classes in the graph. Holds no per-file state, so one
/// scanner is shared by every worker.
pub struct ClassScanner<'a> {
    graph: &'a GraphStore,
    keep_rules: &'a KeepRules,
    entry_points: &'a EntryPoints,
}

impl<'a> ClassScanner<'a> {
    pub fn new(graph: &'a GraphStore, keep_rules: &'a KeepRules, entry_points: &'a EntryPoints) -> Self {
        Self {
            graph,
            keep_rules,
            entry_points,
        }
    }

    /// Read, scan and register one class file
    pub fn scan_file(&self, file: &Path) -> Result<(), ShrinkError> {
        let bytes = fs::read(file).map_err(|e| ShrinkError::io(file, e))?;
        let scanned = scan_class(&bytes).map_err(|e| ShrinkError::class_file(file, e))?;
        self.register(file, &scanned)?;
        Ok(())
    }

    /// Add a scanned class, its methods, edges and entry points to the graph
    pub fn register(&self, file: &Path, scanned: &ScannedClass) -> Result<(), GraphError> {
        let class = self.graph.add_class(&scanned.name, file);

        for method in &scanned.methods {
            let reference = self.graph.add_method(&class, &method.id)?;
            // Private, static and final methods are not told apart yet
            self.graph.mark_virtual(&reference);

            for dependency in &method.dependencies {
                self.graph.add_dependency(&reference, dependency);
            }

            for (&shrink_type, rule) in self.keep_rules {
                if rule.matches(&scanned.name, &method.id) {
                    trace!("Entry point for {}: {}", shrink_type, reference);
                    self.entry_points.insert(shrink_type, reference.clone());
                }
            }
        }

        Ok(())
    }
}
