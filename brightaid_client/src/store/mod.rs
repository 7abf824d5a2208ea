//! Per-role caches of backend data.
//!
//! A store holds the last snapshot it fetched and replaces it wholesale on
//! `refresh`. Individual fetch failures are logged and degrade to an empty
//! value; they never fail the refresh. At most one refresh per store is in
//! flight at a time.

pub mod donor;
pub mod ngo;
pub mod school;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::warn;

use crate::error::Result;

pub use donor::{DonorSnapshot, DonorStore, DonorSummary, PaymentMessage, PaymentNotice};
pub use ngo::{NgoSnapshot, NgoStore};
pub use school::{SchoolSnapshot, SchoolStore, SchoolSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed,
    /// Another refresh of the same store was still running; nothing was fetched.
    AlreadyInFlight,
    /// No user id was given and none is stored.
    NoIdentity,
    /// The user has no profile for this role.
    NoProfile,
}

/// Claims a store's in-flight flag until dropped.
pub(crate) struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Snapshot state shared between refreshes and readers.
#[derive(Debug, Default)]
pub(crate) struct Cell<T> {
    inner: RwLock<T>,
}

impl<T: Clone> Cell<T> {
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> T {
        self.read().clone()
    }
}

/// The value on success, `T::default()` (logged) on failure.
pub(crate) fn or_default<T: Default>(what: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "failed to fetch {what}");
            T::default()
        }
    }
}

pub(crate) fn or_none<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "failed to fetch {what}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let first = RefreshGuard::try_acquire(&flag);
        assert!(first.is_some());
        assert!(RefreshGuard::try_acquire(&flag).is_none());
        drop(first);
        assert!(!flag.load(Ordering::Acquire));
        assert!(RefreshGuard::try_acquire(&flag).is_some());
    }

    #[test]
    fn failures_degrade_to_typed_defaults() {
        let list: Vec<i64> = or_default("list", Err(Error::Validation("boom".into())));
        assert!(list.is_empty());
        let count: i64 = or_default("count", Err(Error::Validation("boom".into())));
        assert_eq!(count, 0);
        let record: Option<String> = or_none("record", Err(Error::Validation("boom".into())));
        assert!(record.is_none());
        assert_eq!(or_default("ok", Ok(vec![1])), vec![1]);
    }
}
