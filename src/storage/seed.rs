//! Starter flags for an empty document store.

use super::{FlagBackend, StorageError};
use mongodb::bson::{doc, Document};

/// (name, description, [development, staging, production])
const STARTER_FLAGS: [(&str, &str, [bool; 3]); 6] = [
    (
        "new-dashboard",
        "Ship the redesigned dashboard.",
        [true, true, false],
    ),
    (
        "beta-checkout",
        "New checkout flow for selected users.",
        [true, true, true],
    ),
    (
        "recommendations",
        "Product recommendations widget.",
        [true, false, false],
    ),
    (
        "ab-test-home-hero",
        "A/B test variant of the home hero section.",
        [true, true, true],
    ),
    (
        "dark-mode",
        "Enable dark theme toggle for all users.",
        [true, true, true],
    ),
    (
        "limit-rate-api",
        "Enable request rate limiting on APIs.",
        [false, true, true],
    ),
];

/// Starter records, ready for insertion.
pub fn starter_flags() -> Vec<Document> {
    STARTER_FLAGS
        .iter()
        .map(|(name, description, [development, staging, production])| {
            doc! {
                "name": *name,
                "description": *description,
                "environments": {
                    "development": *development,
                    "staging": *staging,
                    "production": *production,
                },
            }
        })
        .collect()
}

/// Insert the starter flags if, and only if, the backend holds no records.
///
/// Returns the number of records inserted.
pub async fn seed_if_empty(backend: &dyn FlagBackend) -> Result<usize, StorageError> {
    if backend.count().await? > 0 {
        log::debug!("Skipping seed: {} already holds flags", backend.name());
        return Ok(0);
    }

    log::info!("Seeding {} with starter feature flags", backend.name());
    let flags = starter_flags();
    let total = flags.len();
    for flag in flags {
        backend.insert(flag).await?;
    }
    log::info!("Seeded {} feature flags", total);

    Ok(total)
}
