use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnableImage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry_url: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
}

impl RunnableImage {
    /// Full image reference, e.g. `ghcr.io/fuseml/mlflow-builder:1.0`.
    #[must_use]
    pub fn reference(&self) -> String {
        let mut reference = String::new();
        if !self.registry_url.is_empty() {
            reference.push_str(self.registry_url.trim_end_matches('/'));
            reference.push('/');
        }
        reference.push_str(&self.repository);
        if !self.tag.is_empty() {
            reference.push(':');
            reference.push_str(&self.tag);
        }
        reference
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnableInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnableOutput {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// A container-packaged unit (builder, trainer, predictor) usable as a workflow step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Runnable {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub image: RunnableImage,
    #[serde(default)]
    pub inputs: Vec<RunnableInput>,
    #[serde(default)]
    pub outputs: Vec<RunnableOutput>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_reference() {
        let image = RunnableImage {
            registry_url: "ghcr.io/".into(),
            repository: "fuseml/mlflow-builder".into(),
            tag: "1.0".into(),
        };
        assert_eq!(image.reference(), "ghcr.io/fuseml/mlflow-builder:1.0");

        let bare = RunnableImage {
            repository: "busybox".into(),
            ..Default::default()
        };
        assert_eq!(bare.reference(), "busybox");
    }

    #[test]
    fn test_camel_case_wire_names() {
        let runnable: Runnable = serde_json::from_str(
            r#"{"name": "builder", "kind": "builder",
                "image": {"registryUrl": "ghcr.io", "repository": "fuseml/b"},
                "inputs": [{"name": "mlflow-codeset", "kind": "codeset", "defaultValue": "x"}]}"#,
        )
        .unwrap();
        assert_eq!(runnable.image.registry_url, "ghcr.io");
        assert_eq!(runnable.inputs[0].default_value.as_deref(), Some("x"));
    }
}
