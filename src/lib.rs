//! class-shrinker - Mark-and-sweep shrinking of JVM class files
//!
//! This library removes methods that no entry point can reach and keeps a
//! persistent reachability graph so edited classes can be reprocessed
//! without a full rebuild.
//!
//! # Architecture
//!
//! The pipeline consists of:
//! 1. **Discovery** - Find the `.class` files of every stream
//! 2. **Scanning** - Parse class files and record method dependencies
//! 3. **Counting** - Reference-count reachability from the keep rules
//! 4. **Rewriting** - Write classes without their unreachable methods
//! 5. **Persistence** - Save the graph and file fingerprints
//! 6. **Reporting** - ProGuard-style usage reports and run summaries

pub mod analysis;
pub mod cache;
pub mod classfile;
pub mod config;
pub mod discovery;
pub mod graph;
pub mod report;
pub mod rewriter;
pub mod session;
pub mod shrinker;
pub mod watch;

pub use config::Config;
pub use discovery::ClassFinder;
pub use graph::{GraphStore, MemberId, NodeRef, ShrinkType};
pub use report::{JsonReporter, TerminalReporter, UsageReport};
pub use session::{RunOutcome, ShrinkSession};
pub use shrinker::{ClassStream, FileStatus, KeepRule, KeepRules, ShrinkError, ShrinkSummary, Shrinker};
