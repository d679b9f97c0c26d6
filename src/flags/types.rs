//! Feature flag records and request payloads.

use crate::storage::query::ID_FIELD;
use crate::storage::{FieldUpdates, FlagId, StorageError};
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// A stored feature flag.
///
/// `enabled` is never stored. It is filled in by the service for the
/// environment a caller asked about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl FeatureFlag {
    /// Decode a stored record.
    ///
    /// Non-boolean environment values are ignored; a missing `environments`
    /// field decodes as an empty map.
    pub fn from_document(record: &Document) -> Result<Self, StorageError> {
        let id = record
            .get(ID_FIELD)
            .and_then(FlagId::from_bson)
            .ok_or_else(|| StorageError::InvalidDocument("missing or invalid _id".into()))?;

        let name = record
            .get_str("name")
            .map_err(|_| StorageError::InvalidDocument(format!("flag {} has no name", id)))?
            .to_string();

        let description = record.get_str("description").ok().map(str::to_string);

        let environments = match record.get_document("environments") {
            Ok(envs) => envs
                .iter()
                .filter_map(|(env, value)| value.as_bool().map(|on| (env.clone(), on)))
                .collect(),
            Err(_) => BTreeMap::new(),
        };

        Ok(Self {
            id: id.to_string(),
            name,
            description,
            environments,
            enabled: None,
        })
    }

    /// Whether the flag is on in `environment`. Unknown environments are off.
    pub fn is_enabled_in(&self, environment: &str) -> bool {
        self.environments.get(environment).copied().unwrap_or(false)
    }

    /// Attach the `enabled` projection for `environment`.
    pub fn with_enabled_for(mut self, environment: &str) -> Self {
        self.enabled = Some(self.is_enabled_in(environment));
        self
    }
}

/// Payload for creating a flag.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewFlag {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub environments: Option<BTreeMap<String, bool>>,
}

impl NewFlag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>, enabled: bool) -> Self {
        self.environments
            .get_or_insert_with(BTreeMap::new)
            .insert(environment.into(), enabled);
        self
    }

    /// Record to store. `environments` is always present, possibly empty.
    pub(crate) fn to_document(&self) -> Document {
        let mut record = Document::new();
        record.insert("name", self.name.clone().unwrap_or_default());
        if let Some(description) = &self.description {
            record.insert("description", description.clone());
        }
        record.insert(
            "environments",
            environments_document(self.environments.as_ref().unwrap_or(&BTreeMap::new())),
        );
        record
    }
}

/// Payload for a partial update. Absent or null fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct FlagUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub environments: Option<BTreeMap<String, bool>>,
}

impl FlagUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.environments.is_none()
    }

    pub(crate) fn to_field_updates(&self) -> FieldUpdates {
        let mut updates = FieldUpdates::new();
        if let Some(name) = &self.name {
            updates = updates.set("name", name.clone());
        }
        if let Some(description) = &self.description {
            updates = updates.set("description", description.clone());
        }
        if let Some(environments) = &self.environments {
            updates = updates.set("environments", environments_document(environments));
        }
        updates
    }
}

fn environments_document(environments: &BTreeMap<String, bool>) -> Document {
    environments
        .iter()
        .map(|(env, on)| (env.clone(), Bson::Boolean(*on)))
        .collect()
}
