//! Wire and domain types for the TeamCity REST API.
//!
//! # Design
//! `Build` decodes straight from the server's JSON. Fields whose wire shape
//! differs from what callers want (flag strings, nested `{count, tag: [..]}`
//! wrappers, property lists) land in private `raw_*` fields first and are
//! moved into the public ones by [`Build::normalize`]. Unknown keys are
//! ignored because TeamCity adds fields freely between versions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One build instance, queued, running or finished.
///
/// Values returned by `TeamCityClient` are always normalized.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: i64,
    #[serde(default)]
    pub build_type_id: String,
    #[serde(skip)]
    pub number: Option<String>,
    pub status: Option<String>,
    pub state: Option<String>,
    pub branch_name: Option<String>,
    #[serde(skip)]
    pub default_branch: bool,
    #[serde(skip)]
    pub personal: bool,
    pub status_text: Option<String>,
    pub href: Option<String>,
    pub web_url: Option<String>,
    pub queued_date: Option<String>,
    pub start_date: Option<String>,
    pub finish_date: Option<String>,
    #[serde(skip)]
    pub tags: Vec<String>,
    pub triggered: Option<Triggered>,
    #[serde(skip)]
    pub properties: HashMap<String, String>,
    /// Server-relative path listing this build's changes; feed it to
    /// `TeamCityClient::get_changes`.
    #[serde(skip)]
    pub changes_href: Option<String>,

    #[serde(default, rename = "number")]
    pub(crate) raw_number: Option<serde_json::Value>,
    #[serde(default, rename = "defaultBranch")]
    pub(crate) raw_default_branch: Option<serde_json::Value>,
    #[serde(default, rename = "personal")]
    pub(crate) raw_personal: Option<serde_json::Value>,
    #[serde(default, rename = "tags")]
    pub(crate) raw_tags: Option<TagList>,
    #[serde(default, rename = "properties")]
    pub(crate) raw_properties: Option<PropertyList>,
    #[serde(default, rename = "changes")]
    pub(crate) raw_changes: Option<ChangesRef>,
}

/// What caused a build to be queued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triggered {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub details: Option<String>,
    pub date: Option<String>,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub name: Option<String>,
}

/// A single build parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

/// The wire form of a property collection: `{"count": n, "property": [..]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property: Vec<Property>,
}

impl PropertyList {
    /// Fold the list into a map. Later duplicates overwrite earlier ones.
    pub fn into_map(self) -> HashMap<String, String> {
        self.property
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect()
    }
}

impl FromIterator<(String, String)> for PropertyList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            count: None,
            property: iter
                .into_iter()
                .map(|(name, value)| Property { name, value })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct TagList {
    #[serde(default)]
    pub tag: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Tag {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct ChangesRef {
    pub href: Option<String>,
}

/// A VCS change picked up by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: i64,
    pub version: Option<String>,
    pub username: Option<String>,
    pub date: Option<String>,
    pub href: Option<String>,
    pub web_url: Option<String>,
}

/// Response of the build search endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BuildPage {
    #[serde(default)]
    pub build: Vec<Build>,
}

/// Response of a change listing. `change` is absent when TeamCity has
/// nothing to report for the locator.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChangePage {
    pub change: Option<Vec<Change>>,
}

/// Request payload for `POST /buildQueue`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBuildRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub build_type_id: String,
    pub properties: PropertyList,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
}

impl QueueBuildRequest {
    /// Qualifies a non-empty `branch_name` as `refs/heads/<branch_name>`.
    pub fn new(
        build_type_id: &str,
        branch_name: &str,
        properties: &HashMap<String, String>,
    ) -> Self {
        Self {
            build_type_id: build_type_id.to_string(),
            properties: properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            branch_name: (!branch_name.is_empty()).then(|| format!("refs/heads/{branch_name}")),
        }
    }
}

/// Request payload for cancelling a build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBuildRequest {
    pub build_cancel_request: CancelBuildOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBuildOptions {
    pub comment: String,
    pub read_into_queue: bool,
}
