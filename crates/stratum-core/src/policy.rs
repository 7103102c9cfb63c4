//! Per-key merge policies
//!
//! A policy decides what happens when two matching layers set the same key.
//! Policies are looked up once per setting while layers are built, so the
//! fold never consults this table.

use crate::error::{Result, StratumError};
use crate::value::SettingValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How a later layer's value combines with the accumulated one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Later value overwrites the earlier one
    #[default]
    Replace,
    /// Later items are concatenated after the earlier ones
    Append,
    /// Option objects are merged key by key, later keys win
    Merge,
}

impl MergePolicy {
    /// Whether a value of this shape can be folded under this policy
    pub fn accepts(&self, value: &SettingValue) -> bool {
        match self {
            MergePolicy::Replace => true,
            MergePolicy::Append => matches!(
                value,
                SettingValue::List(_) | SettingValue::Rule { .. } | SettingValue::Severity(_)
            ),
            MergePolicy::Merge => matches!(value, SettingValue::Options(_)),
        }
    }

    /// Fold `next` into the accumulated value for one key
    pub fn apply(&self, prev: Option<SettingValue>, next: SettingValue) -> SettingValue {
        let Some(prev) = prev else {
            return next;
        };

        match self {
            MergePolicy::Replace => next,
            MergePolicy::Append => match (prev.into_sequence(), next.clone().into_sequence()) {
                (Some((prev_severity, mut items)), Some((next_severity, next_items))) => {
                    items.extend(next_items);
                    SettingValue::from_sequence(next_severity.or(prev_severity), items)
                }
                _ => next,
            },
            MergePolicy::Merge => match (prev, next) {
                (SettingValue::Options(mut merged), SettingValue::Options(overlay)) => {
                    for (key, value) in overlay {
                        merged.insert(key, value);
                    }
                    SettingValue::Options(merged)
                }
                (_, next) => next,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::Replace => "replace",
            MergePolicy::Append => "append",
            MergePolicy::Merge => "merge",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replace" => Ok(MergePolicy::Replace),
            "append" => Ok(MergePolicy::Append),
            "merge" => Ok(MergePolicy::Merge),
            other => Err(format!("unknown merge policy '{other}'")),
        }
    }
}

/// Policy table keyed by key family
///
/// A family is either an exact key (`no-restricted-syntax`) or a prefix
/// ending in `*` (`react/*`). Exact families win over prefixes and longer
/// prefixes win over shorter ones. Unlisted keys use [`MergePolicy::Replace`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePolicies {
    exact: HashMap<String, MergePolicy>,
    /// Sorted longest prefix first
    prefixes: Vec<(String, MergePolicy)>,
}

impl MergePolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a family
    pub fn with(mut self, family: impl Into<String>, policy: MergePolicy) -> Self {
        self.insert(family, policy);
        self
    }

    pub fn insert(&mut self, family: impl Into<String>, policy: MergePolicy) {
        let family = family.into();
        match family.strip_suffix('*') {
            Some(prefix) => {
                let prefix = prefix.to_string();
                self.prefixes.retain(|(existing, _)| *existing != prefix);
                self.prefixes.push((prefix, policy));
                self.prefixes
                    .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            }
            None => {
                self.exact.insert(family, policy);
            }
        }
    }

    /// Build a table from policy names, rejecting unknown names
    pub fn from_names<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut policies = Self::new();
        for (family, name) in entries {
            let family = family.into();
            let policy = name.as_ref().parse::<MergePolicy>().map_err(|_| {
                StratumError::UnknownMergePolicy {
                    key: family.clone(),
                    policy: name.as_ref().to_string(),
                }
            })?;
            policies.insert(family, policy);
        }
        Ok(policies)
    }

    /// Policy that applies to `key`
    pub fn policy_for(&self, key: &str) -> MergePolicy {
        if let Some(policy) = self.exact.get(key) {
            return *policy;
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, policy)| *policy)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Severity;
    use serde_json::json;

    #[test]
    fn test_replace_takes_later_value() {
        let merged = MergePolicy::Replace.apply(
            Some(SettingValue::Severity(Severity::Error)),
            SettingValue::Severity(Severity::Off),
        );
        assert_eq!(merged, SettingValue::Severity(Severity::Off));
    }

    #[test]
    fn test_append_concatenates_lists_in_order() {
        let merged = MergePolicy::Append.apply(
            Some(SettingValue::from_json(json!(["a", "b"]))),
            SettingValue::from_json(json!(["c"])),
        );
        assert_eq!(merged, SettingValue::from_json(json!(["a", "b", "c"])));
    }

    #[test]
    fn test_append_rule_entries_keeps_later_severity() {
        let merged = MergePolicy::Append.apply(
            Some(SettingValue::from_json(json!(["error", {"selector": "A"}]))),
            SettingValue::from_json(json!(["warn", {"selector": "B"}])),
        );
        assert_eq!(
            merged,
            SettingValue::from_json(json!(["warn", {"selector": "A"}, {"selector": "B"}]))
        );
    }

    #[test]
    fn test_append_bare_severity_keeps_options() {
        let merged = MergePolicy::Append.apply(
            Some(SettingValue::from_json(json!(["error", {"selector": "A"}]))),
            SettingValue::Severity(Severity::Off),
        );
        assert_eq!(merged.severity(), Some(Severity::Off));
        assert_eq!(merged, SettingValue::from_json(json!(["off", {"selector": "A"}])));
    }

    #[test]
    fn test_append_with_absent_prior_is_identity() {
        let value = SettingValue::from_json(json!(["x"]));
        assert_eq!(MergePolicy::Append.apply(None, value.clone()), value);
    }

    #[test]
    fn test_merge_overlays_option_objects() {
        let merged = MergePolicy::Merge.apply(
            Some(SettingValue::from_json(json!({"window": "readonly", "fetch": "off"}))),
            SettingValue::from_json(json!({"fetch": "readonly", "process": "readonly"})),
        );
        assert_eq!(
            merged,
            SettingValue::from_json(
                json!({"window": "readonly", "fetch": "readonly", "process": "readonly"})
            )
        );
    }

    #[test]
    fn test_accepts_by_shape() {
        let options = SettingValue::from_json(json!({"a": 1}));
        let list = SettingValue::from_json(json!([1, 2]));
        assert!(MergePolicy::Merge.accepts(&options));
        assert!(!MergePolicy::Merge.accepts(&list));
        assert!(MergePolicy::Append.accepts(&list));
        assert!(!MergePolicy::Append.accepts(&options));
        assert!(!MergePolicy::Append.accepts(&SettingValue::Scalar(json!(true))));
    }

    #[test]
    fn test_family_lookup_precedence() {
        let policies = MergePolicies::new()
            .with("react/*", MergePolicy::Merge)
            .with("react/hooks/*", MergePolicy::Append)
            .with("react/hooks/exhaustive", MergePolicy::Replace);

        assert_eq!(policies.policy_for("react/prop-types"), MergePolicy::Merge);
        assert_eq!(policies.policy_for("react/hooks/rules"), MergePolicy::Append);
        assert_eq!(
            policies.policy_for("react/hooks/exhaustive"),
            MergePolicy::Replace
        );
        assert_eq!(policies.policy_for("no-console"), MergePolicy::Replace);
        assert_eq!(policies.len(), 3);
    }

    #[test]
    fn test_from_names_rejects_unknown_policy() {
        let err = MergePolicies::from_names([("globals", "concat")]).unwrap_err();
        assert!(matches!(err, StratumError::UnknownMergePolicy { ref policy, .. } if policy == "concat"));

        let ok = MergePolicies::from_names([("globals", "merge")]).unwrap();
        assert_eq!(ok.policy_for("globals"), MergePolicy::Merge);
    }
}
