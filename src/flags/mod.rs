//! Feature flag lifecycle on top of the storage engine.

pub mod types;

pub use types::{FeatureFlag, FlagUpdate, NewFlag};

use crate::storage::{FieldUpdates, FlagId, FlagStore, Query, StorageError};
use futures::TryStreamExt;
use std::sync::Arc;
use validator::Validate;

pub const NAME_REQUIRED: &str = "Name required";
pub const NAME_EMPTY: &str = "Name must not be empty";
pub const NAME_TOO_LONG: &str = "Name must be at most 255 characters";
pub const NO_FIELDS: &str = "No fields to update";
pub const INVALID_ENVIRONMENT: &str = "Invalid environment name";
pub const NOT_FOUND: &str = "Feature flag not found";

/// Expected failures of a flag operation, plus anything the storage engine
/// could not absorb.
#[derive(Debug)]
pub enum FlagError {
    /// The request is malformed
    Validation(String),
    /// No flag has the requested identifier
    NotFound,
    /// Storage failed in a way the fallback could not recover from
    Storage(StorageError),
}

impl std::fmt::Display for FlagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagError::Validation(msg) => write!(f, "{}", msg),
            FlagError::NotFound => write!(f, "{}", NOT_FOUND),
            FlagError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for FlagError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlagError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for FlagError {
    fn from(e: StorageError) -> Self {
        FlagError::Storage(e)
    }
}

/// Flag operations. Cheap to clone; clones share one store.
#[derive(Clone)]
pub struct FlagService {
    store: Arc<FlagStore>,
    default_environment: String,
}

impl FlagService {
    pub fn new(store: Arc<FlagStore>, default_environment: impl Into<String>) -> Self {
        Self {
            store,
            default_environment: default_environment.into(),
        }
    }

    /// Environment used when a caller does not name one.
    pub fn default_environment(&self) -> &str {
        &self.default_environment
    }

    pub fn store(&self) -> &FlagStore {
        &self.store
    }

    /// Every flag, with `enabled` computed for `environment`.
    ///
    /// Records that cannot be decoded are skipped.
    pub async fn list_flags(&self, environment: &str) -> Result<Vec<FeatureFlag>, FlagError> {
        let mut records = self.store.find_all().await?;
        let mut flags = Vec::new();

        while let Some(record) = records.try_next().await? {
            match FeatureFlag::from_document(&record) {
                Ok(flag) => flags.push(flag.with_enabled_for(environment)),
                Err(e) => log::warn!("Skipping unreadable flag record: {}", e),
            }
        }

        Ok(flags)
    }

    /// Store a new flag. Duplicate names are allowed.
    pub async fn create_flag(&self, new_flag: NewFlag) -> Result<FeatureFlag, FlagError> {
        new_flag.validate().map_err(|e| {
            log::debug!("Flag creation rejected: {}", e);
            name_error(new_flag.name.as_deref(), NAME_REQUIRED)
        })?;

        let id = self.store.insert(new_flag.to_document()).await?;
        log::info!("Created feature flag {}", id);

        Ok(FeatureFlag {
            id: id.to_string(),
            name: new_flag.name.unwrap_or_default(),
            description: new_flag.description,
            environments: new_flag.environments.unwrap_or_default(),
            enabled: None,
        })
    }

    pub async fn get_flag(&self, id: &str) -> Result<FeatureFlag, FlagError> {
        self.fetch(&id_query(id)).await
    }

    /// Replace the supplied fields and return the flag as now stored.
    pub async fn update_flag(&self, id: &str, update: FlagUpdate) -> Result<FeatureFlag, FlagError> {
        if update.is_empty() {
            return Err(FlagError::Validation(NO_FIELDS.to_string()));
        }
        update.validate().map_err(|e| {
            log::debug!("Flag update rejected: {}", e);
            name_error(update.name.as_deref(), NAME_EMPTY)
        })?;

        let query = id_query(id);
        let outcome = self.store.update(&query, &update.to_field_updates()).await?;
        if !outcome.is_matched() {
            return Err(FlagError::NotFound);
        }

        self.fetch(&query).await
    }

    /// Remove a flag. Returns whether anything was removed.
    pub async fn delete_flag(&self, id: &str) -> Result<bool, FlagError> {
        let outcome = self.store.delete(&id_query(id)).await?;
        if outcome.is_deleted() {
            log::info!("Deleted feature flag {}", id);
        }
        Ok(outcome.is_deleted())
    }

    /// Flip the flag in one environment. An environment the flag has never
    /// mentioned counts as off, so its first toggle turns it on.
    pub async fn toggle_flag(&self, id: &str, environment: &str) -> Result<FeatureFlag, FlagError> {
        validate_environment(environment)?;

        let query = id_query(id);
        let current = self.fetch(&query).await?;
        let new_state = !current.is_enabled_in(environment);

        let updates = FieldUpdates::new().set(format!("environments.{}", environment), new_state);
        let outcome = self.store.update(&query, &updates).await?;
        if !outcome.is_modified() {
            return Err(FlagError::NotFound);
        }

        let mut flag = self.fetch(&query).await?;
        flag.enabled = Some(new_state);
        Ok(flag)
    }

    async fn fetch(&self, query: &Query) -> Result<FeatureFlag, FlagError> {
        match self.store.find_one(query).await? {
            Some(record) => Ok(FeatureFlag::from_document(&record)?),
            None => Err(FlagError::NotFound),
        }
    }
}

/// Query for a caller-supplied identifier, resolved on every call.
fn id_query(id: &str) -> Query {
    Query::by_id(&FlagId::resolve(id))
}

/// Names fail validation either by being blank or by being too long.
fn name_error(name: Option<&str>, blank_message: &str) -> FlagError {
    match name {
        Some(name) if !name.is_empty() => FlagError::Validation(NAME_TOO_LONG.to_string()),
        _ => FlagError::Validation(blank_message.to_string()),
    }
}

/// A toggled environment becomes a path segment in the update.
fn validate_environment(environment: &str) -> Result<(), FlagError> {
    if environment.is_empty() || environment.starts_with('$') || environment.contains('.') {
        return Err(FlagError::Validation(INVALID_ENVIRONMENT.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;
    use crate::storage::FlagBackend;
    use mongodb::bson::doc;

    fn service() -> FlagService {
        FlagService::new(Arc::new(FlagStore::in_memory()), "staging")
    }

    #[actix_rt::test]
    async fn test_list_computes_enabled_per_environment() {
        let service = service();
        service
            .create_flag(NewFlag::named("x").environment("production", true))
            .await
            .unwrap();

        let production = service.list_flags("production").await.unwrap();
        assert_eq!(production.len(), 1);
        assert_eq!(production[0].enabled, Some(true));

        let staging = service.list_flags("staging").await.unwrap();
        assert_eq!(staging[0].enabled, Some(false));
    }

    #[actix_rt::test]
    async fn test_list_returns_every_flag() {
        let service = service();
        for name in ["a", "b", "c"] {
            service
                .create_flag(NewFlag::named(name).environment("production", name == "b"))
                .await
                .unwrap();
        }

        let flags = service.list_flags("production").await.unwrap();
        let enabled: Vec<_> = flags.iter().map(|f| (f.name.as_str(), f.enabled)).collect();
        assert_eq!(
            enabled,
            vec![("a", Some(false)), ("b", Some(true)), ("c", Some(false))]
        );
    }

    #[actix_rt::test]
    async fn test_create_requires_name() {
        let service = service();
        for payload in [NewFlag::default(), NewFlag::named("")] {
            let err = service.create_flag(payload).await.unwrap_err();
            assert!(matches!(err, FlagError::Validation(ref msg) if msg == NAME_REQUIRED));
        }
        assert!(service.list_flags("staging").await.unwrap().is_empty());

        let err = service
            .create_flag(NewFlag::named("x".repeat(300)))
            .await
            .unwrap_err();
        assert!(matches!(err, FlagError::Validation(ref msg) if msg == NAME_TOO_LONG));
    }

    #[actix_rt::test]
    async fn test_create_allows_duplicate_names() {
        let service = service();
        let first = service.create_flag(NewFlag::named("dup")).await.unwrap();
        let second = service.create_flag(NewFlag::named("dup")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(service.list_flags("staging").await.unwrap().len(), 2);
    }

    #[actix_rt::test]
    async fn test_create_then_get_round_trips() {
        let service = service();
        let created = service
            .create_flag(
                NewFlag::named("x")
                    .description("desc")
                    .environment("production", true),
            )
            .await
            .unwrap();

        let fetched = service.get_flag(&created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.enabled, None);
        assert_eq!(fetched.environments.get("production"), Some(&true));
    }

    #[actix_rt::test]
    async fn test_get_unknown_flag() {
        let service = service();
        assert!(matches!(
            service.get_flag("507f1f77bcf86cd799439011").await,
            Err(FlagError::NotFound)
        ));
        assert!(matches!(
            service.get_flag("nope").await,
            Err(FlagError::NotFound)
        ));
    }

    #[actix_rt::test]
    async fn test_native_identifiers_round_trip() {
        let primary = Arc::new(MemoryBackend::new());
        let oid = mongodb::bson::oid::ObjectId::new();
        primary
            .insert(doc! { "name": "placeholder" })
            .await
            .unwrap();
        let store = FlagStore::with_primary(primary.clone());
        let service = FlagService::new(Arc::new(store), "staging");

        // Stand in for a record created by MongoDB.
        primary
            .update(
                &Query::new().eq("name", "placeholder"),
                &FieldUpdates::new().set("_id", oid).set("name", "native"),
            )
            .await
            .unwrap();

        let flag = service.get_flag(&oid.to_hex()).await.unwrap();
        assert_eq!(flag.name, "native");
        assert_eq!(flag.id, oid.to_hex());
    }

    #[actix_rt::test]
    async fn test_update_replaces_supplied_fields_only() {
        let service = service();
        let created = service
            .create_flag(
                NewFlag::named("x")
                    .description("old")
                    .environment("staging", true),
            )
            .await
            .unwrap();

        let updated = service
            .update_flag(
                &created.id,
                FlagUpdate {
                    description: Some("new".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "x");
        assert_eq!(updated.description.as_deref(), Some("new"));
        assert_eq!(updated.environments, created.environments);
    }

    #[actix_rt::test]
    async fn test_noop_update_still_returns_flag() {
        let service = service();
        let created = service.create_flag(NewFlag::named("x")).await.unwrap();

        let updated = service
            .update_flag(
                &created.id,
                FlagUpdate {
                    name: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated, created);
    }

    #[actix_rt::test]
    async fn test_update_unknown_flag() {
        let service = service();
        let err = service
            .update_flag(
                "missing",
                FlagUpdate {
                    name: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlagError::NotFound));
    }

    #[actix_rt::test]
    async fn test_update_rejects_empty_name() {
        let service = service();
        let created = service.create_flag(NewFlag::named("x")).await.unwrap();
        let err = service
            .update_flag(
                &created.id,
                FlagUpdate {
                    name: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlagError::Validation(ref msg) if msg == NAME_EMPTY));
    }

    #[actix_rt::test]
    async fn test_delete_then_get() {
        let service = service();
        let created = service.create_flag(NewFlag::named("x")).await.unwrap();

        assert!(service.delete_flag(&created.id).await.unwrap());
        assert!(matches!(
            service.get_flag(&created.id).await,
            Err(FlagError::NotFound)
        ));
        assert!(!service.delete_flag(&created.id).await.unwrap());
    }

    #[actix_rt::test]
    async fn test_toggle_creates_missing_environment() {
        let service = service();
        let created = service
            .create_flag(NewFlag::named("x").environment("production", false))
            .await
            .unwrap();

        let toggled = service.toggle_flag(&created.id, "beta").await.unwrap();
        assert_eq!(toggled.enabled, Some(true));
        assert_eq!(toggled.environments.get("beta"), Some(&true));
        assert_eq!(toggled.environments.get("production"), Some(&false));

        let stored = service.get_flag(&created.id).await.unwrap();
        assert_eq!(stored.environments.get("beta"), Some(&true));
        assert_eq!(stored.enabled, None);
    }

    #[actix_rt::test]
    async fn test_toggle_twice_restores_value() {
        let service = service();
        let created = service
            .create_flag(NewFlag::named("x").environment("staging", true))
            .await
            .unwrap();

        let once = service.toggle_flag(&created.id, "staging").await.unwrap();
        assert_eq!(once.enabled, Some(false));
        let twice = service.toggle_flag(&created.id, "staging").await.unwrap();
        assert_eq!(twice.enabled, Some(true));
        assert_eq!(twice.environments, created.environments);
    }

    #[actix_rt::test]
    async fn test_toggle_unknown_flag() {
        let service = service();
        assert!(matches!(
            service.toggle_flag("missing", "staging").await,
            Err(FlagError::NotFound)
        ));
    }

    #[actix_rt::test]
    async fn test_toggle_rejects_path_like_environment() {
        let service = service();
        let created = service.create_flag(NewFlag::named("x")).await.unwrap();
        for env in ["", "a.b", "$set"] {
            let err = service.toggle_flag(&created.id, env).await.unwrap_err();
            assert!(matches!(err, FlagError::Validation(ref msg) if msg == INVALID_ENVIRONMENT));
        }
    }

    #[actix_rt::test]
    async fn test_environment_maps_accept_any_key() {
        let service = service();
        let created = service
            .create_flag(NewFlag::named("y").environment("eu.prod", true))
            .await
            .unwrap();
        assert_eq!(created.environments.get("eu.prod"), Some(&true));

        let updated = service
            .update_flag(
                &created.id,
                FlagUpdate {
                    environments: Some([("".to_string(), false)].into_iter().collect()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.environments.get(""), Some(&false));
        assert_eq!(updated.environments.len(), 1);

        let listed = service.list_flags("eu.prod").await.unwrap();
        assert_eq!(listed[0].enabled, Some(false));
    }

    #[actix_rt::test]
    async fn test_unreadable_records_are_skipped_in_list() {
        let primary = Arc::new(MemoryBackend::new());
        primary.insert(doc! { "description": "no name" }).await.unwrap();
        let service = FlagService::new(Arc::new(FlagStore::with_primary(primary)), "staging");
        service.create_flag(NewFlag::named("ok")).await.unwrap();

        let flags = service.list_flags("staging").await.unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].name, "ok");
    }
}
