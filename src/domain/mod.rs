//! Domain types shared by the cache and the metrics ledger.

mod response;
mod status;

pub use response::SerializedResponse;
#[cfg(test)]
pub(crate) use response::arb_json_value;
pub use status::{DeploymentStatus, UnknownStatus};
