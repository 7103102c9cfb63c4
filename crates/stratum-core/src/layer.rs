//! Layers: path-scoped settings and ignore vetoes
//!
//! [`LayerSpec`] is the uncompiled declaration of one layer. Building a
//! resolver compiles each spec into a [`Layer`]: selectors are parsed, the
//! merge policy of every key is looked up and checked against the value's
//! shape. Any failure names the layer index.

use crate::error::{Result, StratumError};
use crate::policy::{MergePolicies, MergePolicy};
use crate::selector::{GlobSelector, Selector};
use crate::value::SettingValue;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use tracing::warn;

/// Uncompiled layer declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSpec {
    pub name: Option<String>,
    /// Inclusion selectors; entries starting with `!` are exclusions
    pub files: Vec<String>,
    /// Exclusion selectors
    pub ignores: Vec<String>,
    /// Marks the layer as an ignore-layer
    pub ignore: bool,
    pub settings: IndexMap<String, SettingValue>,
}

impl LayerSpec {
    /// Settings layer scoped to `files`
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Ignore-layer vetoing every path matched by `files`
    pub fn ignore<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore: true,
            ..Self::new(files)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add exclusion selectors
    pub fn excluding<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignores.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// A layer with only `ignores` is a global ignore list
    fn is_global_ignores(&self) -> bool {
        !self.ignore && self.files.is_empty() && self.settings.is_empty() && !self.ignores.is_empty()
    }
}

/// Inclusion and exclusion selectors of one layer
#[derive(Debug, Clone, Default)]
pub struct SelectorSet {
    include: Vec<Arc<dyn Selector>>,
    exclude: Vec<Arc<dyn Selector>>,
}

impl SelectorSet {
    pub fn new(include: Vec<Arc<dyn Selector>>, exclude: Vec<Arc<dyn Selector>>) -> Self {
        Self { include, exclude }
    }

    /// A path matches when at least one inclusion selector matches and no
    /// exclusion selector does. An empty set matches nothing.
    pub fn matches(&self, path: &str) -> bool {
        self.include.iter().any(|selector| selector.matches(path))
            && !self.exclude.iter().any(|selector| selector.matches(path))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.include.iter().map(|selector| selector.pattern())
    }

    pub fn exclude_patterns(&self) -> impl Iterator<Item = &str> {
        self.exclude.iter().map(|selector| selector.pattern())
    }
}

/// One setting with the merge policy resolved for its key
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub value: SettingValue,
    pub policy: MergePolicy,
}

/// What a layer does for the paths it matches
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// Contributes settings to the fold
    Settings(IndexMap<String, Setting>),
    /// Vetoes the path outright
    Ignore,
}

/// Compiled, immutable layer
#[derive(Debug, Clone)]
pub struct Layer {
    index: usize,
    name: Option<String>,
    selectors: SelectorSet,
    kind: LayerKind,
}

impl Layer {
    /// Assemble a layer from already-built parts, for callers that bring
    /// their own [`Selector`] implementations.
    pub fn from_parts(
        index: usize,
        name: Option<String>,
        selectors: SelectorSet,
        kind: LayerKind,
    ) -> Self {
        Self {
            index,
            name,
            selectors,
            kind,
        }
    }

    /// Compile the spec declared at position `index`
    pub fn compile(index: usize, spec: LayerSpec, policies: &MergePolicies) -> Result<Self> {
        let name = spec.name.as_deref();
        let global_ignores = spec.is_global_ignores();

        // Global ignores use `ignores` as their inclusion list; a `!` entry
        // there un-ignores, as a `!` entry in `files` excludes.
        let selector_source = if global_ignores { &spec.ignores } else { &spec.files };
        let (include_patterns, mut exclude_patterns) = split_negated(selector_source);
        if !global_ignores {
            exclude_patterns.extend(spec.ignores.iter().cloned());
        }
        let include_patterns: Vec<String> = include_patterns.into_iter().collect();
        let exclude_patterns: Vec<String> = exclude_patterns.into_iter().collect();

        let compile_all = |patterns: &[String]| -> Result<Vec<Arc<dyn Selector>>> {
            patterns
                .iter()
                .map(|pattern| {
                    GlobSelector::new(pattern)
                        .map(|selector| Arc::new(selector) as Arc<dyn Selector>)
                        .map_err(|e| StratumError::validation(index, name, pattern, e.message))
                })
                .collect()
        };
        let selectors = SelectorSet::new(
            compile_all(&include_patterns)?,
            compile_all(&exclude_patterns)?,
        );

        let kind = if spec.ignore || global_ignores {
            if let Some(key) = spec.settings.keys().next() {
                return Err(StratumError::validation(
                    index,
                    name,
                    key,
                    "ignore-layers cannot carry settings",
                ));
            }
            LayerKind::Ignore
        } else {
            let mut settings = IndexMap::with_capacity(spec.settings.len());
            for (key, value) in spec.settings {
                let policy = policies.policy_for(&key);
                if !policy.accepts(&value) {
                    return Err(StratumError::validation(
                        index,
                        name,
                        &key,
                        format!(
                            "{} policy does not apply to {} values",
                            policy,
                            value.kind_name()
                        ),
                    ));
                }
                settings.insert(key, Setting { value, policy });
            }
            LayerKind::Settings(settings)
        };

        if selectors.is_empty() {
            warn!(
                "Layer #{}{} has no inclusion selectors and will never match",
                index,
                name.map(|n| format!(" ({n})")).unwrap_or_default()
            );
        }

        Ok(Self {
            index,
            name: spec.name,
            selectors,
            kind,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self.kind, LayerKind::Ignore)
    }

    /// Settings contributed by this layer (empty for ignore-layers)
    pub fn settings(&self) -> impl Iterator<Item = (&str, &Setting)> {
        let settings = match &self.kind {
            LayerKind::Settings(settings) => Some(settings),
            LayerKind::Ignore => None,
        };
        settings
            .into_iter()
            .flat_map(|settings| settings.iter().map(|(key, setting)| (key.as_str(), setting)))
    }

    pub fn matches(&self, path: &str) -> bool {
        self.selectors.matches(path)
    }
}

/// Partition selector strings into inclusions and `!`-prefixed exclusions,
/// dropping repeats while keeping first-appearance order.
fn split_negated(patterns: &[String]) -> (IndexSet<String>, IndexSet<String>) {
    let mut include = IndexSet::new();
    let mut exclude = IndexSet::new();
    for pattern in patterns {
        match pattern.strip_prefix('!') {
            Some(negated) => exclude.insert(negated.to_string()),
            None => include.insert(pattern.clone()),
        };
    }
    (include, exclude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::Severity;
    use serde_json::json;

    #[test]
    fn test_compile_settings_layer() {
        let spec = LayerSpec::new(["**/*.ts", "!**/*.d.ts"])
            .named("base")
            .with_setting("no-debugger", Severity::Error);
        let layer = Layer::compile(0, spec, &MergePolicies::default()).unwrap();

        assert_eq!(layer.name(), Some("base"));
        assert!(!layer.is_ignore());
        assert!(layer.matches("src/index.ts"));
        assert!(!layer.matches("src/types.d.ts"));
        assert_eq!(layer.selectors().exclude_patterns().collect::<Vec<_>>(), vec!["**/*.d.ts"]);
        let (key, setting) = layer.settings().next().unwrap();
        assert_eq!(key, "no-debugger");
        assert_eq!(setting.policy, MergePolicy::Replace);
    }

    #[test]
    fn test_excluding_combines_with_negated_files() {
        let spec = LayerSpec::new(["packages/**"]).excluding(["packages/legacy/**"]);
        let layer = Layer::compile(0, spec, &MergePolicies::default()).unwrap();
        assert!(layer.matches("packages/web/a.ts"));
        assert!(!layer.matches("packages/legacy/a.ts"));
    }

    #[test]
    fn test_global_ignores_become_ignore_layer() {
        let spec = LayerSpec::default().excluding(["**/dist/", "**/node_modules/"]);
        let layer = Layer::compile(4, spec, &MergePolicies::default()).unwrap();
        assert!(layer.is_ignore());
        assert!(layer.matches("packages/web/dist/bundle.js"));
        assert!(!layer.matches("packages/web/src/App.tsx"));
        assert_eq!(layer.settings().count(), 0);
    }

    #[test]
    fn test_global_ignores_negation_unignores() {
        let spec = LayerSpec::default().excluding(["dist/**", "!dist/keep.ts"]);
        let layer = Layer::compile(1, spec, &MergePolicies::default()).unwrap();
        assert!(layer.is_ignore());
        assert!(layer.matches("dist/bundle.js"));
        assert!(!layer.matches("dist/keep.ts"));
        assert!(!layer.matches("!dist/keep.ts"));
        assert_eq!(layer.selectors().include_patterns().collect::<Vec<_>>(), vec!["dist/**"]);
        assert_eq!(
            layer.selectors().exclude_patterns().collect::<Vec<_>>(),
            vec!["dist/keep.ts"]
        );
    }

    #[test]
    fn test_repeated_exclusions_compile_once() {
        let spec = LayerSpec::new(["src/**", "!src/gen/**"])
            .excluding(["src/vendor/**", "src/gen/**", "src/vendor/**"]);
        let layer = Layer::compile(0, spec, &MergePolicies::default()).unwrap();
        assert_eq!(
            layer.selectors().exclude_patterns().collect::<Vec<_>>(),
            vec!["src/gen/**", "src/vendor/**"]
        );
        assert!(layer.matches("src/main.ts"));
        assert!(!layer.matches("src/vendor/lib.ts"));
    }

    #[test]
    fn test_ignore_layer_with_settings_is_rejected() {
        let spec = LayerSpec::ignore(["vendor/**"]).with_setting("no-console", Severity::Off);
        let err = Layer::compile(2, spec, &MergePolicies::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.layer_index(), Some(2));
        assert!(err.to_string().contains("no-console"));
    }

    #[test]
    fn test_bad_selector_names_layer_and_pattern() {
        let spec = LayerSpec::new(["**/*.ts", "src/**x"]).named("broken");
        let err = Layer::compile(7, spec, &MergePolicies::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("#7"));
        assert!(message.contains("(broken)"));
        assert!(message.contains("src/**x"));
    }

    #[test]
    fn test_policy_shape_checked_at_compile_time() {
        let policies = MergePolicies::new().with("globals", MergePolicy::Append);
        let spec = LayerSpec::new(["**"]).with_setting("globals", json!({"window": "readonly"}));
        let err = Layer::compile(1, spec, &policies).unwrap_err();
        assert!(err.to_string().contains("append policy does not apply to option object values"));
    }

    #[test]
    fn test_empty_selector_set_matches_nothing() {
        let spec = LayerSpec::new(Vec::<String>::new()).with_setting("semi", Severity::Error);
        let layer = Layer::compile(0, spec, &MergePolicies::default()).unwrap();
        assert!(layer.selectors().is_empty());
        assert!(!layer.matches("anything.ts"));
        assert!(!layer.matches(""));
    }
}
