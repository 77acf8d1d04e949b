mod loader;

pub use loader::{Config, KeepRuleConfig, OutputsConfig, StreamConfig};
