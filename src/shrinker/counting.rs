//! Reference-counted reachability
//!
//! A node's counter for a shrink type is the number of live increments
//! pinning it. Edges are only followed when a counter moves between zero and
//! positive, so repeated increments of a reachable node are O(1).
//!
//! Propagation uses an explicit worklist instead of recursion. Each popped
//! entry is exactly one increment (or decrement) call, so the resulting
//! counts are identical to the recursive formulation. Dependency cycles
//! terminate because the second visit finds a positive counter, but a cycle
//! keeps its own members pinned after every external root is gone.

use crate::graph::{GraphError, GraphStore, NodeRef, ShrinkType};
use dashmap::DashSet;
use tracing::trace;

/// Classes whose kept member set changed during an incremental update
pub type ModifiedClasses = DashSet<NodeRef>;

/// Increment `node` and, if it just became reachable, everything it depends
/// on. Returns the number of nodes that went from zero to positive.
pub fn increment_counter(
    graph: &GraphStore,
    node: &NodeRef,
    shrink_type: ShrinkType,
    modified: Option<&ModifiedClasses>,
) -> usize {
    let mut newly_reachable = 0;
    let mut worklist = vec![node.clone()];

    while let Some(current) = worklist.pop() {
        if graph.get_and_increment(&current, shrink_type) != 0 {
            continue;
        }
        trace!("{} reachable for {}", current, shrink_type);
        newly_reachable += 1;
        if let Some(modified) = modified {
            modified.insert(current.owner_class());
        }
        worklist.extend(graph.dependencies(&current));
    }

    newly_reachable
}

/// Decrement `node` and, if it just became unreachable, everything it
/// depends on. Returns the number of nodes that dropped to zero.
///
/// Decrementing a zero counter means the graph is inconsistent and fails
/// with [`GraphError::CounterUnderflow`].
pub fn decrement_counter(
    graph: &GraphStore,
    node: &NodeRef,
    shrink_type: ShrinkType,
    modified: Option<&ModifiedClasses>,
) -> Result<usize, GraphError> {
    let mut newly_unreachable = 0;
    let mut worklist = vec![node.clone()];

    while let Some(current) = worklist.pop() {
        if graph.decrement_and_get(&current, shrink_type)? != 0 {
            continue;
        }
        trace!("{} unreachable for {}", current, shrink_type);
        newly_unreachable += 1;
        if let Some(modified) = modified {
            modified.insert(current.owner_class());
        }
        worklist.extend(graph.dependencies(&current));
    }

    Ok(newly_unreachable)
}
