// Keep rules select the entry points of a shrink type

use crate::graph::{MemberId, ShrinkType};
use regex::Regex;
use std::collections::HashMap;

/// Decides whether a method is an entry point
pub trait KeepRule: Send + Sync {
    /// `class` is the internal name of the declaring class
    fn matches(&self, class: &str, method: &MemberId) -> bool;
}

impl<F> KeepRule for F
where
    F: Fn(&str, &MemberId) -> bool + Send + Sync,
{
    fn matches(&self, class: &str, method: &MemberId) -> bool {
        self(class, method)
    }
}

/// Keep rules per shrink type; shrink types without a rule are not processed
pub type KeepRules = HashMap<ShrinkType, Box<dyn KeepRule>>;

/// Matches methods by regular expressions over the class internal name,
/// the method name and optionally the descriptor. Patterns are anchored.
#[derive(Debug, Clone)]
pub struct PatternKeepRule {
    class: Regex,
    method: Regex,
    descriptor: Option<Regex>,
}

impl PatternKeepRule {
    pub fn new(class: &str, method: &str, descriptor: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            class: anchored(class)?,
            method: anchored(method)?,
            descriptor: descriptor.map(anchored).transpose()?,
        })
    }
}

impl KeepRule for PatternKeepRule {
    fn matches(&self, class: &str, method: &MemberId) -> bool {
        self.class.is_match(class)
            && self.method.is_match(&method.name)
            && self
                .descriptor
                .as_ref()
                .map_or(true, |d| d.is_match(&method.descriptor))
    }
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

/// Matches when any of its rules matches
#[derive(Default)]
pub struct AnyKeepRule {
    rules: Vec<Box<dyn KeepRule>>,
}

impl AnyKeepRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Box<dyn KeepRule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl KeepRule for AnyKeepRule {
    fn matches(&self, class: &str, method: &MemberId) -> bool {
        self.rules.iter().any(|rule| rule.matches(class, method))
    }
}
