use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{PackageLimit, QuotaLimit, SubscriptionPackage};
use crate::quota::ResourceType;

const DEFAULT_CATALOG: &str = include_str!("../../fixtures/packages.yaml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// One package as written in a catalog file. Ids are assigned on load.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    price: Decimal,
    duration_days: i32,
    #[serde(default)]
    limits: Vec<CatalogLimit>,
}

/// Raw limit, kept as an integer so values below the sentinel can be refused.
#[derive(Debug, Deserialize)]
struct CatalogLimit {
    resource_type: ResourceType,
    limit: i64,
}

pub fn parse_catalog(yaml: &str) -> Result<Vec<SubscriptionPackage>, CatalogError> {
    let entries: Vec<CatalogEntry> = serde_yaml::from_str(yaml)?;
    let mut names = HashSet::new();

    entries
        .into_iter()
        .map(|entry| {
            if !names.insert(entry.name.clone()) {
                return Err(CatalogError::Invalid(format!("duplicate package '{}'", entry.name)));
            }
            if entry.duration_days <= 0 {
                return Err(CatalogError::Invalid(format!(
                    "package '{}' must last at least one day",
                    entry.name
                )));
            }
            let mut resources = HashSet::new();
            if let Some(dup) = entry.limits.iter().find(|l| !resources.insert(l.resource_type)) {
                return Err(CatalogError::Invalid(format!(
                    "package '{}' declares {} twice",
                    entry.name, dup.resource_type
                )));
            }
            if let Some(bad) = entry.limits.iter().find(|l| l.limit < QuotaLimit::UNBOUNDED_SENTINEL) {
                return Err(CatalogError::Invalid(format!(
                    "package '{}' sets {} limit to {}; use {} for unlimited",
                    entry.name,
                    bad.resource_type,
                    bad.limit,
                    QuotaLimit::UNBOUNDED_SENTINEL
                )));
            }
            let limits = entry
                .limits
                .into_iter()
                .map(|l| PackageLimit {
                    resource_type: l.resource_type,
                    limit_value: QuotaLimit::from(l.limit),
                })
                .collect();
            Ok(SubscriptionPackage {
                id: Uuid::new_v4(),
                name: entry.name,
                description: entry.description,
                price: entry.price,
                duration_days: entry.duration_days,
                limits,
            })
        })
        .collect()
}

pub fn load_catalog(path: &Path) -> Result<Vec<SubscriptionPackage>, CatalogError> {
    parse_catalog(&std::fs::read_to_string(path)?)
}

/// Catalog shipped with the binary, used by the in-memory store.
pub fn default_catalog() -> Result<Vec<SubscriptionPackage>, CatalogError> {
    parse_catalog(DEFAULT_CATALOG)
}
