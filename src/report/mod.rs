mod json;
mod terminal;
mod usage;

pub use json::JsonReporter;
pub use terminal::TerminalReporter;
pub use usage::{UsageClass, UsageReport};
