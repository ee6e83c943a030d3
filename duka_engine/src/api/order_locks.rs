//! Per-order serialization of payment writes.
//!
//! Every read-check-insert-sync sequence against an order's payments runs while holding that order's lock, so two
//! concurrent balance payments cannot both pass the balance check. The locks are process-local.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use log::*;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db_types::OrderId;

#[derive(Debug, Clone, Default)]
pub struct OrderLocks {
    locks: Arc<Mutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for, and takes, the lock for `order_id`. The lock is released when the guard is dropped.
    pub async fn lock(&self, order_id: &OrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries that only the map refers to are idle
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(order_id.clone()).or_default())
        };
        trace!("🔒️ Waiting for the lock on order {order_id}. {} orders are locked.", self.active());
        lock.lock_owned().await
    }

    /// The number of orders with a held or awaited lock
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}
