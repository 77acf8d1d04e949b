//! Diagnostics over the reachability graph

mod cycles;

pub use cycles::{CycleDetector, CycleInfo};
