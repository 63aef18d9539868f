//! Response cache.
//!
//! Cached origin responses are grouped per scope key: one store hash per scope,
//! one field per URL. The scope receives a single expiry when it is first
//! written, so every URL cached under it disappears together:
//!
//! ```text
//! deploymentKey:<key>  (hash, TTL 3600s)
//!   /updateCheck?label=v3  -> {"statusCode":200,"body":{..}}
//!   /updateCheck?label=v4  -> {"statusCode":200,"body":{..}}
//! ```

mod store;

pub use store::{CACHE_EXPIRY, ResponseCache};
