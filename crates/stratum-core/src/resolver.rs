//! The layer resolver
//!
//! Resolution is a pure fold over the ordered layer list:
//!
//! 1. any matching ignore-layer vetoes the path ([`Resolution::Excluded`]),
//!    wherever it sits in the list;
//! 2. otherwise every matching settings layer is folded in declaration
//!    order, each key combined by the merge policy fixed when the layer was
//!    compiled.
//!
//! Declaration order is the only tie-breaker. Selector specificity plays no
//! part: a later `**/*` layer still overrides an earlier
//! `packages/web/**` layer.

use crate::error::Result;
use crate::layer::{Layer, LayerSpec};
use crate::policy::MergePolicies;
use crate::value::{SettingValue, Severity};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

/// Effective settings for one path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EffectiveConfig {
    settings: IndexMap<String, SettingValue>,
}

impl EffectiveConfig {
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }

    /// Severity of a severity or rule-entry setting
    pub fn severity(&self, key: &str) -> Option<Severity> {
        self.get(key).and_then(SettingValue::severity)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    /// Keys in first-appearance order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.settings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.settings.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, SettingValue> {
        self.settings
    }
}

/// Outcome of resolving one path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "settings", rename_all = "lowercase")]
pub enum Resolution {
    /// Path is in scope; an unmatched path yields an empty config
    Effective(EffectiveConfig),
    /// An ignore-layer vetoed the path
    Excluded,
}

impl Resolution {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Resolution::Excluded)
    }

    pub fn effective(&self) -> Option<&EffectiveConfig> {
        match self {
            Resolution::Effective(config) => Some(config),
            Resolution::Excluded => None,
        }
    }

    pub fn into_effective(self) -> Option<EffectiveConfig> {
        match self {
            Resolution::Effective(config) => Some(config),
            Resolution::Excluded => None,
        }
    }
}

/// Reference to a layer in an [`Explanation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerMatch {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub ignore: bool,
}

impl LayerMatch {
    fn of(layer: &Layer) -> Self {
        Self {
            index: layer.index(),
            name: layer.name().map(str::to_string),
            ignore: layer.is_ignore(),
        }
    }
}

/// Why a path resolved the way it did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub path: String,
    /// Every matching layer, ignore-layers included, in declaration order
    pub matched: Vec<LayerMatch>,
    /// First ignore-layer that vetoed the path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_by: Option<LayerMatch>,
    /// Layer indices that contributed to each effective key, in fold order
    pub origins: IndexMap<String, Vec<usize>>,
    pub resolution: Resolution,
}

/// Ordered, immutable layer list with the fold over it
#[derive(Debug, Clone, Default)]
pub struct LayerResolver {
    layers: Vec<Layer>,
    policies: MergePolicies,
}

impl LayerResolver {
    /// Build a resolver where every key uses the replace policy
    pub fn new(specs: Vec<LayerSpec>) -> Result<Self> {
        Self::with_policies(specs, &MergePolicies::default())
    }

    /// Compile `specs` in order; the first invalid layer aborts construction
    pub fn with_policies(specs: Vec<LayerSpec>, policies: &MergePolicies) -> Result<Self> {
        let layers = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Layer::compile(index, spec, policies))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Built resolver with {} layers ({} ignore)",
            layers.len(),
            layers.iter().filter(|layer| layer.is_ignore()).count()
        );
        Ok(Self {
            layers,
            policies: policies.clone(),
        })
    }

    /// Wrap layers that were compiled elsewhere. Order is taken as given;
    /// `policies` is the table their settings were compiled with.
    pub fn from_layers(layers: Vec<Layer>, policies: MergePolicies) -> Self {
        Self { layers, policies }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Policy table the layers were compiled with
    pub fn policies(&self) -> &MergePolicies {
        &self.policies
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// First ignore-layer matching `path`
    fn veto(&self, path: &str) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|layer| layer.is_ignore() && layer.matches(path))
    }

    /// Whether an ignore-layer vetoes `path`
    pub fn is_excluded(&self, path: &str) -> bool {
        self.veto(path).is_some()
    }

    /// Compute the effective configuration for `path`
    pub fn resolve(&self, path: &str) -> Resolution {
        if let Some(layer) = self.veto(path) {
            trace!("{} excluded by layer #{}", path, layer.index());
            return Resolution::Excluded;
        }

        let mut acc = IndexMap::new();
        for layer in self.settings_layers_matching(path) {
            trace!("{} matched layer #{}", path, layer.index());
            fold_layer(&mut acc, layer);
        }
        Resolution::Effective(EffectiveConfig { settings: acc })
    }

    /// Resolve a batch of paths in parallel; output order follows input order
    pub fn resolve_many<P>(&self, paths: &[P]) -> Vec<Resolution>
    where
        P: AsRef<str> + Sync,
    {
        paths
            .par_iter()
            .map(|path| self.resolve(path.as_ref()))
            .collect()
    }

    /// Resolve `path` and record which layers shaped the result
    pub fn explain(&self, path: &str) -> Explanation {
        let matched: Vec<LayerMatch> = self
            .layers
            .iter()
            .filter(|layer| layer.matches(path))
            .map(LayerMatch::of)
            .collect();
        let excluded_by = self.veto(path).map(LayerMatch::of);

        let mut origins: IndexMap<String, Vec<usize>> = IndexMap::new();
        if excluded_by.is_none() {
            for layer in self.settings_layers_matching(path) {
                for (key, _) in layer.settings() {
                    origins.entry(key.to_string()).or_default().push(layer.index());
                }
            }
        }

        Explanation {
            path: path.to_string(),
            matched,
            excluded_by,
            origins,
            resolution: self.resolve(path),
        }
    }

    fn settings_layers_matching<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Layer> {
        self.layers
            .iter()
            .filter(move |layer| !layer.is_ignore() && layer.matches(path))
    }
}

/// Fold one matching layer into the accumulator. Re-inserting an existing
/// key keeps its position.
fn fold_layer(acc: &mut IndexMap<String, SettingValue>, layer: &Layer) {
    for (key, setting) in layer.settings() {
        let prev = acc.get(key).cloned();
        let merged = setting.policy.apply(prev, setting.value.clone());
        acc.insert(key.to_string(), merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerKind, SelectorSet};
    use crate::policy::MergePolicy;
    use crate::selector::Selector;
    use serde_json::json;
    use std::sync::Arc;

    fn sev(severity: Severity) -> SettingValue {
        SettingValue::Severity(severity)
    }

    #[test]
    fn test_later_layer_overrides_earlier() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["**/*.ts"]).with_setting("severity", Severity::Warn),
            LayerSpec::new(["packages/web/**/*.tsx"]).with_setting("severity", Severity::Error),
        ])
        .unwrap();

        let web = resolver.resolve("packages/web/App.tsx").into_effective().unwrap();
        assert_eq!(web.get("severity"), Some(&sev(Severity::Error)));
        assert_eq!(web.len(), 1);

        let shared = resolver.resolve("packages/shared/util.ts").into_effective().unwrap();
        assert_eq!(shared.get("severity"), Some(&sev(Severity::Warn)));
    }

    #[test]
    fn test_off_in_later_layer_wins() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["**/*.ts"]).with_setting("no-console", json!(["error", {"allow": ["warn"]}])),
            LayerSpec::new(["**/*.test.ts"]).with_setting("no-console", Severity::Off),
        ])
        .unwrap();

        let config = resolver.resolve("src/a.test.ts").into_effective().unwrap();
        assert_eq!(config.severity("no-console"), Some(Severity::Off));
        assert_eq!(config.get("no-console"), Some(&sev(Severity::Off)));
    }

    #[test]
    fn test_specificity_does_not_break_ties() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["packages/web/src/App.tsx"]).with_setting("k", Severity::Error),
            LayerSpec::new(["**"]).with_setting("k", Severity::Warn),
        ])
        .unwrap();
        let config = resolver.resolve("packages/web/src/App.tsx").into_effective().unwrap();
        assert_eq!(config.severity("k"), Some(Severity::Warn));
    }

    #[test]
    fn test_ignore_layer_position_does_not_matter() {
        let ignore = LayerSpec::ignore(["**/dist/**"]);
        let settings = LayerSpec::new(["**/*.ts"]).with_setting("k", Severity::Error);

        let ignore_first = LayerResolver::new(vec![ignore.clone(), settings.clone()]).unwrap();
        let ignore_last = LayerResolver::new(vec![settings, ignore]).unwrap();

        for resolver in [&ignore_first, &ignore_last] {
            assert_eq!(resolver.resolve("packages/web/dist/bundle.ts"), Resolution::Excluded);
            assert!(resolver.is_excluded("dist/a.ts"));
            assert!(!resolver.resolve("src/a.ts").is_excluded());
        }
    }

    #[test]
    fn test_unmatched_path_yields_empty_config() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["**/*.ts"]).with_setting("k", Severity::Error),
        ])
        .unwrap();
        let resolution = resolver.resolve("README.md");
        assert_eq!(resolution, Resolution::Effective(EffectiveConfig::default()));
        assert!(resolution.effective().unwrap().is_empty());
    }

    #[test]
    fn test_append_policy_concatenates_in_layer_order() {
        let policies = MergePolicies::new().with("no-restricted-syntax", MergePolicy::Append);
        let resolver = LayerResolver::with_policies(
            vec![
                LayerSpec::new(["**/*.ts"])
                    .with_setting("no-restricted-syntax", json!(["error", "A", "B"])),
                LayerSpec::new(["packages/**"])
                    .with_setting("no-restricted-syntax", json!(["error", "C"])),
            ],
            &policies,
        )
        .unwrap();

        let config = resolver.resolve("packages/x.ts").into_effective().unwrap();
        assert_eq!(
            config.get("no-restricted-syntax"),
            Some(&SettingValue::from_json(json!(["error", "A", "B", "C"])))
        );
        let only_base = resolver.resolve("x.ts").into_effective().unwrap();
        assert_eq!(
            only_base.get("no-restricted-syntax"),
            Some(&SettingValue::from_json(json!(["error", "A", "B"])))
        );
        assert_eq!(
            resolver.policies().policy_for("no-restricted-syntax"),
            MergePolicy::Append
        );
    }

    #[test]
    fn test_key_order_is_first_appearance() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["**"])
                .with_setting("b", Severity::Warn)
                .with_setting("a", Severity::Warn),
            LayerSpec::new(["**"])
                .with_setting("c", Severity::Warn)
                .with_setting("b", Severity::Error),
        ])
        .unwrap();
        let config = resolver.resolve("x").into_effective().unwrap();
        assert_eq!(config.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(config.severity("b"), Some(Severity::Error));
    }

    #[test]
    fn test_explain_records_origins() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["**/*.ts"])
                .named("base")
                .with_setting("a", Severity::Warn)
                .with_setting("b", Severity::Warn),
            LayerSpec::new(["web/**"]).named("web").with_setting("a", Severity::Off),
            LayerSpec::ignore(["**/dist/**"]).named("ignores"),
        ])
        .unwrap();

        let explanation = resolver.explain("web/App.ts");
        assert_eq!(explanation.matched.len(), 2);
        assert!(explanation.excluded_by.is_none());
        assert_eq!(explanation.origins.get("a"), Some(&vec![0, 1]));
        assert_eq!(explanation.origins.get("b"), Some(&vec![0]));

        let excluded = resolver.explain("web/dist/App.ts");
        assert_eq!(excluded.excluded_by.as_ref().map(|m| m.index), Some(2));
        assert!(excluded.origins.is_empty());
        assert!(excluded.resolution.is_excluded());
    }

    #[test]
    fn test_resolve_many_preserves_order() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["**/*.ts"]).with_setting("k", Severity::Warn),
            LayerSpec::ignore(["dist/**"]),
        ])
        .unwrap();
        let paths: Vec<String> = (0..200)
            .map(|i| if i % 2 == 0 { format!("src/{i}.ts") } else { format!("dist/{i}.ts") })
            .collect();

        let results = resolver.resolve_many(&paths);
        assert_eq!(results.len(), paths.len());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.is_excluded(), i % 2 == 1);
        }
    }

    #[derive(Debug)]
    struct PrefixSelector(&'static str);

    impl Selector for PrefixSelector {
        fn matches(&self, path: &str) -> bool {
            path.starts_with(self.0)
        }

        fn pattern(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_custom_selector_implementation() {
        let mut settings = IndexMap::new();
        settings.insert(
            "k".to_string(),
            crate::layer::Setting {
                value: sev(Severity::Error),
                policy: MergePolicy::Replace,
            },
        );
        settings.insert(
            "plugins".to_string(),
            crate::layer::Setting {
                value: SettingValue::from_json(json!(["import-x"])),
                policy: MergePolicy::Append,
            },
        );
        let layer = Layer::from_parts(
            0,
            Some("prefix".to_string()),
            SelectorSet::new(
                vec![Arc::new(PrefixSelector("src/")) as Arc<dyn Selector>],
                vec![],
            ),
            LayerKind::Settings(settings),
        );
        let policies = MergePolicies::new().with("plugins", MergePolicy::Append);
        let resolver = LayerResolver::from_layers(vec![layer], policies);
        assert_eq!(resolver.policies().policy_for("plugins"), MergePolicy::Append);

        assert_eq!(
            resolver.resolve("src/anything").effective().unwrap().severity("k"),
            Some(Severity::Error)
        );
        assert!(resolver.resolve("lib/anything").effective().unwrap().is_empty());
    }

    #[test]
    fn test_resolution_serialization() {
        let resolver = LayerResolver::new(vec![
            LayerSpec::new(["**"]).with_setting("k", Severity::Warn),
            LayerSpec::ignore(["dist/**"]),
        ])
        .unwrap();
        assert_eq!(
            serde_json::to_value(resolver.resolve("a.ts")).unwrap(),
            json!({"status": "effective", "settings": {"k": "warn"}})
        );
        assert_eq!(
            serde_json::to_value(resolver.resolve("dist/a.ts")).unwrap(),
            json!({"status": "excluded"})
        );
    }
}
