// ProGuard-style usage report
//
// Lists everything a shrink type removed, in the format of ProGuard's
// `-printusage` output:
// ```
// com.example.UnusedClass
// com.example.PartiallyUsedClass
//     void onlyThisMethodIsUnused()
// ```
// A class line without member lines means the whole class was dropped.

use crate::classfile::descriptor;
use crate::graph::{GraphStore, MemberId, ShrinkType};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;

/// Removed code of one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageClass {
    /// The class has no kept members and no output file
    pub whole_class: bool,
    /// Java-style signatures of removed methods, sorted
    pub methods: Vec<String>,
}

/// Everything removed for one shrink type, keyed by dotted class name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageReport {
    classes: BTreeMap<String, UsageClass>,
}

impl UsageReport {
    /// Default file name of the report for a shrink type
    pub fn file_name(shrink_type: ShrinkType) -> String {
        format!("usage-{}.txt", shrink_type)
    }

    /// Collect removed classes and methods from a counted graph
    pub fn from_graph(graph: &GraphStore, shrink_type: ShrinkType) -> Self {
        let kept: HashSet<_> = graph.classes_to_keep(shrink_type).into_iter().collect();
        let mut classes = BTreeMap::new();

        for class in graph.classes() {
            let name = class.as_str().replace('/', ".");
            if !kept.contains(&class) {
                classes.insert(
                    name,
                    UsageClass {
                        whole_class: true,
                        methods: Vec::new(),
                    },
                );
                continue;
            }

            let keep = graph.members_to_keep(&class, shrink_type);
            let mut methods: Vec<String> = graph
                .members_of(&class)
                .unwrap_or_default()
                .values()
                .filter(|m| !keep.contains(*m))
                .map(format_member)
                .collect();
            if methods.is_empty() {
                continue;
            }
            methods.sort();
            classes.insert(
                name,
                UsageClass {
                    whole_class: false,
                    methods,
                },
            );
        }

        Self { classes }
    }

    /// Read a report file written by [`UsageReport::write`] or by ProGuard
    pub fn parse(path: &Path) -> io::Result<Self> {
        Ok(Self::parse_content(&fs::read_to_string(path)?))
    }

    /// Parse report text
    pub fn parse_content(content: &str) -> Self {
        let mut classes: BTreeMap<String, UsageClass> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(class) = &current {
                    let entry = classes.entry(class.clone()).or_default();
                    entry.whole_class = false;
                    entry.methods.push(line.trim().to_string());
                }
            } else {
                classes.insert(
                    line.to_string(),
                    UsageClass {
                        whole_class: true,
                        methods: Vec::new(),
                    },
                );
                current = Some(line.to_string());
            }
        }

        Self { classes }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (class, usage) in &self.classes {
            out.push_str(class);
            out.push('\n');
            for method in &usage.methods {
                out.push_str("    ");
                out.push_str(method);
                out.push('\n');
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_text())
    }

    pub fn is_class_removed(&self, class: &str) -> bool {
        self.classes.get(class).map_or(false, |c| c.whole_class)
    }

    pub fn removed_methods(&self, class: &str) -> &[String] {
        self.classes.get(class).map_or(&[], |c| c.methods.as_slice())
    }

    pub fn removed_class_count(&self) -> usize {
        self.classes.values().filter(|c| c.whole_class).count()
    }

    pub fn removed_method_count(&self) -> usize {
        self.classes.values().map(|c| c.methods.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn format_member(member: &MemberId) -> String {
    descriptor::java_method_signature(&member.name, &member.descriptor).unwrap_or_else(|_| member.to_string())
}
