use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub type Configuration = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionStatus {
    pub registered: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsStatus {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// A registered external system. Owns its services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Extension {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub product: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zone: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: Configuration,
    #[serde(default)]
    pub services: Vec<ExtensionService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExtensionStatus>,
}

/// A capability exposed by an extension, identified by its `resource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionService {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub extension_id: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: Configuration,
    #[serde(default)]
    pub endpoints: Vec<ExtensionEndpoint>,
    #[serde(default)]
    pub credentials: Vec<ExtensionCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExtensionStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointType {
    Internal,
    #[default]
    External,
}

impl EndpointType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointType::Internal => "internal",
            EndpointType::External => "external",
        }
    }
}

impl FromStr for EndpointType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(EndpointType::Internal),
            "external" => Ok(EndpointType::External),
            other => Err(Error::bad_request(format!(
                "invalid endpoint type '{other}': expected internal or external"
            ))),
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reachable URL of a service. The URL is the natural key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionEndpoint {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub extension_id: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(rename = "type", default)]
    pub endpoint_type: EndpointType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: Configuration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsScope {
    #[default]
    Global,
    Project,
    User,
}

impl CredentialsScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialsScope::Global => "global",
            CredentialsScope::Project => "project",
            CredentialsScope::User => "user",
        }
    }
}

impl FromStr for CredentialsScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(CredentialsScope::Global),
            "project" => Ok(CredentialsScope::Project),
            "user" => Ok(CredentialsScope::User),
            other => Err(Error::bad_request(format!(
                "invalid credentials scope '{other}': expected global, project or user"
            ))),
        }
    }
}

impl fmt::Display for CredentialsScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access configuration for a service, scoped globally, to projects, or to users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionCredentials {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub extension_id: String,
    #[serde(default)]
    pub service_id: String,
    #[serde(rename = "default", default)]
    pub is_default: bool,
    #[serde(default)]
    pub scope: CredentialsScope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: Configuration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CredentialsStatus>,
}

impl ExtensionCredentials {
    /// Whether this record and `other` address an overlapping set of
    /// `(scope, project, user)` coordinates.
    #[must_use]
    pub fn overlaps(&self, other: &ExtensionCredentials) -> bool {
        if self.scope != other.scope {
            return false;
        }
        let intersects = |a: &[String], b: &[String]| a.iter().any(|x| b.contains(x));
        match self.scope {
            CredentialsScope::Global => true,
            CredentialsScope::Project => intersects(&self.projects, &other.projects),
            CredentialsScope::User => {
                intersects(&self.users, &other.users)
                    && (self.projects.is_empty()
                        || other.projects.is_empty()
                        || intersects(&self.projects, &other.projects))
            }
        }
    }
}

/// Compound extension query. Every field is optional; absent fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_constraint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<EndpointType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_scope: Option<CredentialsScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_user: Option<String>,
    pub strict_labels: bool,
}

impl ExtensionQuery {
    /// True when no field would narrow the result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == ExtensionQuery::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(scope: CredentialsScope, projects: &[&str], users: &[&str]) -> ExtensionCredentials {
        ExtensionCredentials {
            scope,
            projects: projects.iter().map(ToString::to_string).collect(),
            users: users.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_wire_names() {
        let endpoint: ExtensionEndpoint =
            serde_json::from_str(r#"{"url": "http://a", "type": "internal"}"#).unwrap();
        assert_eq!(endpoint.endpoint_type, EndpointType::Internal);

        let credentials: ExtensionCredentials =
            serde_json::from_str(r#"{"id": "c1", "default": true, "scope": "user", "users": ["u"]}"#)
                .unwrap();
        assert!(credentials.is_default);
        assert_eq!(credentials.scope, CredentialsScope::User);

        let json = serde_json::to_value(&credentials).unwrap();
        assert_eq!(json["default"], true);
        assert_eq!(json["scope"], "user");
    }

    #[test]
    fn test_overlaps() {
        use CredentialsScope::*;
        assert!(creds(Global, &[], &[]).overlaps(&creds(Global, &[], &[])));
        assert!(!creds(Global, &[], &[]).overlaps(&creds(Project, &["a"], &[])));
        assert!(creds(Project, &["a", "b"], &[]).overlaps(&creds(Project, &["b"], &[])));
        assert!(!creds(Project, &["a"], &[]).overlaps(&creds(Project, &["b"], &[])));
        assert!(creds(User, &[], &["u"]).overlaps(&creds(User, &["p"], &["u"])));
        assert!(!creds(User, &["p"], &["u"]).overlaps(&creds(User, &["q"], &["u"])));
        assert!(!creds(User, &[], &["u"]).overlaps(&creds(User, &[], &["v"])));
    }

    #[test]
    fn test_query_is_empty() {
        assert!(ExtensionQuery::default().is_empty());
        let query = ExtensionQuery {
            zone: Some("z1".into()),
            ..Default::default()
        };
        assert!(!query.is_empty());
    }
}
