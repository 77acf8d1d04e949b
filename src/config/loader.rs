use crate::graph::ShrinkType;
use crate::shrinker::{AnyKeepRule, ClassStream, KeepRules, PatternKeepRule};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration of a shrinker run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the persisted graph, fingerprints and usage reports
    pub state_dir: PathBuf,

    /// Worker threads, zero for one per core
    pub threads: usize,

    /// Patterns to exclude from class discovery
    pub exclude: Vec<String>,

    /// Input class streams
    pub streams: Vec<StreamConfig>,

    /// Entry point rules
    pub keep: Vec<KeepRuleConfig>,
}

/// One input root and where its shrunk classes go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,

    /// Directory searched for `.class` files
    pub root: PathBuf,

    #[serde(default)]
    pub outputs: OutputsConfig,
}

/// Output directories per shrink type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    pub full: Option<PathBuf>,
    pub legacy_multidex: Option<PathBuf>,
}

/// Methods matching all patterns are entry points of `shrink_type`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepRuleConfig {
    pub shrink_type: ShrinkType,

    /// Regex over the class internal name, e.g. `com/example/.*Activity`
    pub class: String,

    /// Regex over the method name
    #[serde(default = "any_pattern")]
    pub method: String,

    /// Regex over the method descriptor
    #[serde(default)]
    pub descriptor: Option<String>,
}

/// True when `dir` is `root` or one of its ancestors
fn overlaps(dir: &Path, root: &Path) -> bool {
    root.starts_with(dir)
}

fn any_pattern() -> String {
    ".*".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".shrinker"),
            threads: 0,
            exclude: vec![],
            streams: vec![],
            keep: vec![],
        }
    }
}

impl OutputsConfig {
    pub fn get(&self, shrink_type: ShrinkType) -> Option<&PathBuf> {
        match shrink_type {
            ShrinkType::Full => self.full.as_ref(),
            ShrinkType::LegacyMultidex => self.legacy_multidex.as_ref(),
        }
    }
}

impl StreamConfig {
    /// Build the engine stream over the discovered `files`
    pub fn to_stream(&self, files: Vec<PathBuf>) -> ClassStream {
        let mut stream = ClassStream::new(self.name.clone(), self.root.clone()).with_files(files);
        for shrink_type in ShrinkType::ALL {
            if let Some(dir) = self.outputs.get(shrink_type) {
                stream = stream.with_output(shrink_type, dir.clone());
            }
        }
        stream
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML); relative paths in it
    /// are resolved against the file's directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut config: Self = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config")?,
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config")?,
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    config
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")?
                }
            }
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self> {
        let default_names = [
            ".shrinker.yml",
            ".shrinker.yaml",
            ".shrinker.toml",
            "shrinker.yml",
            "shrinker.yaml",
            "shrinker.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        let mut config = Self::default();
        config.resolve_paths(project_root);
        Ok(config)
    }

    /// Make every relative path absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.state_dir);
        for stream in &mut self.streams {
            resolve(&mut stream.root);
            if let Some(dir) = stream.outputs.full.as_mut() {
                resolve(dir);
            }
            if let Some(dir) = stream.outputs.legacy_multidex.as_mut() {
                resolve(dir);
            }
        }
    }

    /// Reject configurations the shrinker cannot run
    pub fn validate(&self) -> Result<()> {
        if self.streams.is_empty() {
            return Err(miette!("No class streams configured"));
        }

        let mut names = HashSet::new();
        for stream in &self.streams {
            if !names.insert(stream.name.as_str()) {
                return Err(miette!("Duplicate stream name '{}'", stream.name));
            }
        }

        for shrink_type in self.shrink_types() {
            for stream in &self.streams {
                if stream.outputs.get(shrink_type).is_none() {
                    return Err(miette!(
                        "Stream '{}' has no output directory for shrink type {}",
                        stream.name,
                        shrink_type
                    ));
                }
            }
        }

        // A full run clears every output directory, so none may hold inputs
        for stream in &self.streams {
            if overlaps(&self.state_dir, &stream.root) {
                return Err(miette!(
                    "State directory {} overlaps class root {} of stream '{}'",
                    self.state_dir.display(),
                    stream.root.display(),
                    stream.name
                ));
            }
            for other in &self.streams {
                for dir in ShrinkType::ALL.into_iter().filter_map(|t| stream.outputs.get(t)) {
                    if overlaps(dir, &other.root) {
                        return Err(miette!(
                            "Output directory {} of stream '{}' overlaps class root {} of stream '{}'",
                            dir.display(),
                            stream.name,
                            other.root.display(),
                            other.name
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Shrink types that have at least one keep rule
    pub fn shrink_types(&self) -> Vec<ShrinkType> {
        ShrinkType::ALL
            .into_iter()
            .filter(|t| self.keep.iter().any(|k| k.shrink_type == *t))
            .collect()
    }

    /// Compile the keep rules, grouped by shrink type
    pub fn keep_rules(&self) -> Result<KeepRules> {
        let mut grouped: BTreeMap<ShrinkType, AnyKeepRule> = BTreeMap::new();
        for rule in &self.keep {
            let pattern = PatternKeepRule::new(&rule.class, &rule.method, rule.descriptor.as_deref())
                .into_diagnostic()
                .wrap_err_with(|| format!("Invalid keep rule for class pattern '{}'", rule.class))?;
            grouped
                .entry(rule.shrink_type)
                .or_default()
                .push(Box::new(pattern));
        }

        let mut rules = KeepRules::new();
        for (shrink_type, rule) in grouped {
            rules.insert(shrink_type, Box::new(rule));
        }
        Ok(rules)
    }

    /// Check if a pattern matches for exclusion
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude.iter().any(|pattern| glob_match(pattern, &path_str))
    }

    /// Output directories of every stream, which discovery and watching
    /// must skip
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        self.streams
            .iter()
            .flat_map(|s| ShrinkType::ALL.into_iter().filter_map(|t| s.outputs.get(t).cloned()))
            .collect()
    }
}

/// Simple glob matching for patterns like "*Test.class" or "**/generated/**"
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern.starts_with('*') && !pattern.contains('/') {
        // "*Test.class" matches "a/FooTest.class"
        return text.ends_with(&pattern[1..]);
    }

    if pattern.ends_with('*') && !pattern.contains('/') {
        return text.starts_with(&pattern[..pattern.len() - 1]);
    }

    if pattern.contains("**") {
        // "**/dir/**" matches a complete directory name anywhere in the path
        if pattern.starts_with("**/") && pattern.ends_with("/**") {
            let dir_name = pattern.trim_start_matches("**/").trim_end_matches("/**");
            return text.contains(&format!("/{}/", dir_name));
        }

        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');

            if prefix.is_empty() && suffix.is_empty() {
                return true;
            }

            if prefix.is_empty() {
                return text.ends_with(suffix) || text.contains(&format!("/{}", suffix));
            }

            if suffix.is_empty() {
                return text.starts_with(prefix) || text.contains(&format!("{}/", prefix));
            }

            return (text.starts_with(prefix) || text.contains(&format!("/{}/", prefix)))
                && (text.ends_with(suffix) || text.contains(&format!("/{}", suffix)));
        }
    }

    text == pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemberId;
    use crate::shrinker::KeepRule;
    use tempfile::TempDir;

    const YAML: &str = r#"
state_dir: state
threads: 2
exclude:
  - "**/generated/**"
streams:
  - name: app
    root: classes
    outputs:
      full: out/full
  - name: lib
    root: /opt/lib
    outputs:
      full: /opt/out
keep:
  - shrink_type: full
    class: "com/example/Main"
    method: main
  - shrink_type: full
    class: "com/example/.*Activity"
"#;

    #[test]
    fn test_glob_match_suffix() {
        assert!(glob_match("*Test.class", "a/FooTest.class"));
        assert!(!glob_match("*Test.class", "a/Test.java"));
    }

    #[test]
    fn test_glob_match_path() {
        assert!(glob_match("**/generated/**", "/project/generated/A.class"));
        assert!(!glob_match("**/generated/**", "/project/generatedx/A.class"));
    }

    #[test]
    fn test_load_yaml_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shrinker.yml");
        std::fs::write(&path, YAML).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.state_dir, dir.path().join("state"));
        assert_eq!(config.streams[0].root, dir.path().join("classes"));
        assert_eq!(config.streams[0].outputs.full, Some(dir.path().join("out/full")));
        assert_eq!(config.streams[1].root, PathBuf::from("/opt/lib"));
        assert_eq!(config.keep[1].method, ".*");
        assert!(config.validate().is_ok());
        assert_eq!(config.shrink_types(), vec![ShrinkType::Full]);
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shrinker.toml");
        std::fs::write(
            &path,
            r#"
[[streams]]
name = "app"
root = "classes"
outputs = { full = "out", legacy_multidex = "main-dex" }

[[keep]]
shrink_type = "legacy_multidex"
class = "a/App"
descriptor = "\\(\\)V"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.state_dir, dir.path().join(".shrinker"));
        assert_eq!(config.keep[0].shrink_type, ShrinkType::LegacyMultidex);
        assert_eq!(config.output_dirs().len(), 2);
    }

    #[test]
    fn test_keep_rules_grouped_by_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shrinker.yml");
        std::fs::write(&path, YAML).unwrap();

        let rules = Config::from_file(&path).unwrap().keep_rules().unwrap();
        assert_eq!(rules.len(), 1);
        let full = &rules[&ShrinkType::Full];
        assert!(full.matches("com/example/Main", &MemberId::new("main", "([Ljava/lang/String;)V")));
        assert!(full.matches("com/example/LoginActivity", &MemberId::new("onCreate", "()V")));
        assert!(!full.matches("com/example/Main", &MemberId::new("helper", "()V")));
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let config = Config {
            keep: vec![KeepRuleConfig {
                shrink_type: ShrinkType::Full,
                class: "(".to_string(),
                method: any_pattern(),
                descriptor: None,
            }],
            ..Config::default()
        };
        assert!(config.keep_rules().is_err());
    }

    #[test]
    fn test_validate_missing_output() {
        let config = Config {
            streams: vec![StreamConfig {
                name: "app".to_string(),
                root: PathBuf::from("/classes"),
                outputs: OutputsConfig::default(),
            }],
            keep: vec![KeepRuleConfig {
                shrink_type: ShrinkType::Full,
                class: ".*".to_string(),
                method: any_pattern(),
                descriptor: None,
            }],
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dirs_overlapping_roots() {
        let base = Config {
            state_dir: PathBuf::from("/project/.shrinker"),
            streams: vec![StreamConfig {
                name: "app".to_string(),
                root: PathBuf::from("/project/classes"),
                outputs: OutputsConfig {
                    full: Some(PathBuf::from("/project/out/full")),
                    legacy_multidex: None,
                },
            }],
            keep: vec![KeepRuleConfig {
                shrink_type: ShrinkType::Full,
                class: ".*".to_string(),
                method: any_pattern(),
                descriptor: None,
            }],
            ..Config::default()
        };
        assert!(base.validate().is_ok());

        let mut state_is_root = base.clone();
        state_is_root.state_dir = PathBuf::from("/project/classes");
        assert!(state_is_root.validate().is_err());

        let mut state_above_root = base.clone();
        state_above_root.state_dir = PathBuf::from("/project");
        assert!(state_above_root.validate().is_err());

        let mut output_is_root = base.clone();
        output_is_root.streams[0].outputs.full = Some(PathBuf::from("/project/classes"));
        assert!(output_is_root.validate().is_err());

        let mut output_above_root = base.clone();
        output_above_root.streams[0].outputs.full = Some(PathBuf::from("/project"));
        assert!(output_above_root.validate().is_err());

        // Output nested inside the root is skipped by discovery
        let mut output_inside_root = base;
        output_inside_root.streams[0].outputs.full = Some(PathBuf::from("/project/classes/shrunk"));
        assert!(output_inside_root.validate().is_ok());
    }

    #[test]
    fn test_stream_from_config() {
        let stream = StreamConfig {
            name: "app".to_string(),
            root: PathBuf::from("/classes"),
            outputs: OutputsConfig {
                full: Some(PathBuf::from("/out")),
                legacy_multidex: None,
            },
        }
        .to_stream(vec![PathBuf::from("a/A.class")]);

        assert_eq!(stream.files(), &[PathBuf::from("/classes/a/A.class")]);
        assert_eq!(stream.output_dir(ShrinkType::Full), Some(Path::new("/out")));
        assert_eq!(stream.output_dir(ShrinkType::LegacyMultidex), None);
    }
}
