//! Reachability graph between classes and their members

pub mod reference;
mod store;

pub use reference::{MemberId, NodeRef, ShrinkType};
pub use store::{ClassSnapshot, GraphError, GraphSnapshot, GraphStore, NodeSnapshot, STATE_FILE_NAME};
