//! Declaration document types

use crate::error::Result;
use crate::layer::LayerSpec;
use crate::policy::MergePolicies;
use crate::resolver::LayerResolver;
use crate::value::SettingValue;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A declaration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Declaration {
    /// JSON Schema reference for editor support
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "JSON Schema reference")]
    pub schema: Option<String>,

    /// Declaration files whose layers come before this file's layers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Paths of declarations to extend, relative to this file")]
    pub extends: Vec<String>,

    /// Merge policy per key family
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    #[schemars(
        description = "Merge policy per key family: 'replace' (default), 'append' or 'merge'. A trailing '*' matches a key prefix"
    )]
    pub policies: IndexMap<String, String>,

    /// Ordered layers; later layers override earlier ones
    #[serde(default)]
    #[schemars(description = "Ordered configuration layers")]
    pub layers: Vec<LayerDeclaration>,
}

/// One layer as written in a declaration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LayerDeclaration {
    /// Label used in diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Human-readable layer name")]
    pub name: Option<String>,

    /// Inclusion selectors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(description = "Glob selectors the layer applies to; a leading '!' excludes")]
    pub files: Vec<String>,

    /// Exclusion selectors, or global ignores when nothing else is set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(
        description = "Glob selectors excluded from this layer. A layer with only 'ignores' vetoes those paths everywhere"
    )]
    pub ignores: Vec<String>,

    /// Ignore-layer flag
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    #[schemars(description = "Veto every path matched by 'files'")]
    pub ignore: bool,

    /// Setting key to value
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    #[schemars(description = "Settings contributed to matching paths")]
    pub settings: IndexMap<String, Value>,

    /// File the layer was read from and its position in that file
    #[serde(skip)]
    pub origin: Option<(PathBuf, usize)>,
}

impl LayerDeclaration {
    /// Convert into an uncompiled layer, classifying every value
    pub fn to_spec(&self) -> LayerSpec {
        LayerSpec {
            name: self.name.clone(),
            files: self.files.clone(),
            ignores: self.ignores.clone(),
            ignore: self.ignore,
            settings: self
                .settings
                .iter()
                .map(|(key, value)| (key.clone(), SettingValue::from_json(value.clone())))
                .collect(),
        }
    }
}

impl Declaration {
    /// Merge a parent declaration into this one (current takes precedence)
    ///
    /// - parent layers are placed before this declaration's layers
    /// - policy families present here win; parent-only families are added
    /// - `$schema` and `extends` are file-specific and not merged
    pub fn merge_with(&mut self, parent: Declaration) {
        let own_layers = std::mem::take(&mut self.layers);
        self.layers = parent.layers;
        self.layers.extend(own_layers);

        for (family, policy) in parent.policies {
            self.policies.entry(family).or_insert(policy);
        }
    }

    /// Policy table named by this declaration
    pub fn merge_policies(&self) -> Result<MergePolicies> {
        MergePolicies::from_names(
            self.policies
                .iter()
                .map(|(family, policy)| (family.clone(), policy.as_str())),
        )
    }

    /// Record `file` as the origin of every layer that has none yet
    pub fn mark_origin(&mut self, file: &Path) {
        for (index, layer) in self.layers.iter_mut().enumerate() {
            if layer.origin.is_none() {
                layer.origin = Some((file.to_path_buf(), index));
            }
        }
    }

    /// Compile the declared layers into a resolver
    ///
    /// Validation errors carry the declaring file when the layer list was
    /// assembled through `extends`.
    pub fn build_resolver(&self) -> Result<LayerResolver> {
        let policies = self.merge_policies()?;
        let specs = self.layers.iter().map(LayerDeclaration::to_spec).collect();
        LayerResolver::with_policies(specs, &policies).map_err(|err| {
            let origin = err
                .layer_index()
                .and_then(|index| self.layers.get(index))
                .and_then(|layer| layer.origin.as_ref());
            match origin {
                Some((file, index)) => err.declared_in(file, *index),
                None => err,
            }
        })
    }

    /// JSON Schema of the declaration format
    pub fn json_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(Declaration)).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StratumError};
    use crate::value::Severity;
    use serde_json::json;

    fn layer(name: &str, files: &[&str]) -> LayerDeclaration {
        LayerDeclaration {
            name: Some(name.to_string()),
            files: files.iter().map(|f| f.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_places_parent_layers_first() {
        let mut child = Declaration {
            extends: vec!["base.yaml".to_string()],
            policies: IndexMap::from([("globals".to_string(), "merge".to_string())]),
            layers: vec![layer("child", &["src/**"])],
            ..Default::default()
        };
        let parent = Declaration {
            policies: IndexMap::from([
                ("globals".to_string(), "replace".to_string()),
                ("no-restricted-syntax".to_string(), "append".to_string()),
            ]),
            layers: vec![layer("parent", &["**"])],
            ..Default::default()
        };

        child.merge_with(parent);

        let names: Vec<_> = child.layers.iter().map(|l| l.name.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["parent", "child"]);
        assert_eq!(child.policies.get("globals").map(String::as_str), Some("merge"));
        assert_eq!(
            child.policies.get("no-restricted-syntax").map(String::as_str),
            Some("append")
        );
        assert_eq!(child.extends, vec!["base.yaml".to_string()]);
    }

    #[test]
    fn test_build_resolver_classifies_values() {
        let declaration: Declaration = serde_json::from_value(json!({
            "layers": [
                {
                    "files": ["**/*.ts"],
                    "settings": {
                        "no-console": ["error", {"allow": ["warn"]}],
                        "no-debugger": "error"
                    }
                }
            ]
        }))
        .unwrap();

        let resolver = declaration.build_resolver().unwrap();
        let config = resolver.resolve("a.ts").into_effective().unwrap();
        assert_eq!(config.severity("no-console"), Some(Severity::Error));
        assert_eq!(config.severity("no-debugger"), Some(Severity::Error));
    }

    #[test]
    fn test_unknown_policy_surfaces_on_build() {
        let declaration = Declaration {
            policies: IndexMap::from([("globals".to_string(), "deep".to_string())]),
            ..Default::default()
        };
        let err = declaration.build_resolver().unwrap_err();
        assert!(matches!(err, StratumError::UnknownMergePolicy { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validation_error_names_declaring_file() {
        let mut parent = Declaration {
            layers: vec![layer("base", &["**"]), layer("broken", &["src/{a,b"])],
            ..Default::default()
        };
        parent.mark_origin(Path::new("/repo/shared/base.yaml"));
        let mut child = Declaration {
            layers: vec![layer("local", &["src/**"])],
            ..Default::default()
        };
        child.mark_origin(Path::new("/repo/stratum.yaml"));
        child.merge_with(parent);

        let err = child.build_resolver().unwrap_err();
        assert_eq!(err.layer_index(), Some(1));
        let message = err.to_string();
        assert!(message.contains("(broken)"));
        assert!(message.contains("layer #1 of /repo/shared/base.yaml"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: std::result::Result<Declaration, _> =
            serde_json::from_value(json!({"layers": [{"file": ["**"]}]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_schema_describes_layers() {
        let schema = Declaration::json_schema();
        let text = schema.to_string();
        assert!(text.contains("layers"));
        assert!(text.contains("ignores"));
    }
}
