#![allow(clippy::result_large_err)]

//! Domain allow-list the agent firewall enforces.

use crate::core::error::AppError;
use crate::core::workflow::model::NetworkPermissions;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

const ECOSYSTEMS_JSON: &str = include_str!("../data/ecosystem_domains.json");

static ECOSYSTEMS: LazyLock<Result<BTreeMap<String, Vec<String>>, String>> =
    LazyLock::new(|| serde_json::from_str(ECOSYSTEMS_JSON).map_err(|e| e.to_string()));

pub const DEFAULT_ECOSYSTEM: &str = "defaults";

/// Ecosystem name to domain list, loaded from embedded data.
pub fn ecosystem_domains() -> Result<&'static BTreeMap<String, Vec<String>>, AppError> {
    ECOSYSTEMS.as_ref().map_err(|e| {
        AppError::compiler_bug(format!("embedded ecosystem domain table is invalid: {}", e)).with_code("AW-BUG-013")
    })
}

/// Sorted, deduplicated domains for `network.allowed` plus the engine's own.
///
/// An absent `allowed` list means `defaults`. Entries naming an ecosystem
/// expand to its domains; everything else is taken as a domain.
pub fn allowed_domains(network: &NetworkPermissions, engine_domains: &[&str]) -> Result<Vec<String>, AppError> {
    let table = ecosystem_domains()?;
    let requested = network
        .allowed
        .clone()
        .unwrap_or_else(|| vec![DEFAULT_ECOSYSTEM.to_string()]);

    let mut domains = BTreeSet::new();
    for entry in &requested {
        match table.get(entry) {
            Some(ecosystem) => domains.extend(ecosystem.iter().cloned()),
            None => {
                domains.insert(entry.trim().to_lowercase());
            }
        }
    }
    domains.extend(engine_domains.iter().map(|d| d.to_string()));
    domains.remove("");
    tracing::debug!("{} allowed domain(s) from {:?}", domains.len(), requested);
    Ok(domains.into_iter().collect())
}
