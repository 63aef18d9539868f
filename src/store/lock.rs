use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Locks the in-memory keyspace, recovering the guard if a holder panicked.
///
/// Batches are applied only after validation, so a panic can never leave a
/// half-applied batch behind the poisoned lock.
pub(crate) fn keyspace_lock<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                store = "memory",
                result = "poisoned_recovered",
                "Recovered from poisoned keyspace lock"
            );
            poisoned.into_inner()
        }
    }
}
