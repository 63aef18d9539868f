//! Store key and hash-field derivation.
//!
//! Every hash key is a fixed prefix followed by the verbatim deployment key, so
//! each derivation is injective and the three prefixes never overlap. One
//! deployment's counters can never land in another deployment's hash.

use crate::domain::DeploymentStatus;

const SCOPE_PREFIX: &str = "deploymentKey:";
const LABELS_PREFIX: &str = "deploymentKeyLabels:";
const CLIENTS_PREFIX: &str = "deploymentKeyClients:";

/// Field suffix of the per-label active-install counter.
pub const ACTIVE: &str = "Active";

/// Response-cache scope key for all cached URLs of a deployment.
pub fn scope_key(deployment_key: &str) -> String {
    format!("{SCOPE_PREFIX}{deployment_key}")
}

/// Labels hash holding the per-label counters of a deployment.
pub fn labels_hash_key(deployment_key: &str) -> String {
    format!("{LABELS_PREFIX}{deployment_key}")
}

/// Legacy clients hash mapping client ids to their current label.
pub fn clients_hash_key(deployment_key: &str) -> String {
    format!("{CLIENTS_PREFIX}{deployment_key}")
}

/// `label:status` counter field; `None` for an empty label or an unknown status.
pub fn label_status_field(label: &str, status: &str) -> Option<String> {
    let status = DeploymentStatus::parse(status)?;
    status_field(label, status)
}

/// `label:status` counter field for an already validated status.
pub fn status_field(label: &str, status: DeploymentStatus) -> Option<String> {
    composite_field(label, status.as_str())
}

/// `label:Active` counter field; `None` for an empty label.
pub fn label_active_field(label: &str) -> Option<String> {
    composite_field(label, ACTIVE)
}

fn composite_field(label: &str, suffix: &str) -> Option<String> {
    (!label.is_empty()).then(|| format!("{label}:{suffix}"))
}
