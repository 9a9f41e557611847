use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::entities::entitlement::{EntitlementRecord, EntitlementStatus, EntitlementWrite},
    errors::EntitlementError,
};

/// Durable entitlement table, unique on (user_id, product_id).
///
/// Every method is a single statement. Implementations must not require
/// transactions spanning several rows.
#[async_trait]
pub trait EntitlementStoreDatasource: Send + Sync {
    /// Insert, or overwrite the row with the same (user_id, product_id).
    async fn upsert(&self, write: EntitlementWrite) -> Result<EntitlementRecord, EntitlementError>;

    /// The user's `active` row with the latest expiry, if any.
    async fn select_active(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, EntitlementError>;

    async fn update_status(
        &self,
        record_id: u64,
        status: EntitlementStatus,
    ) -> Result<(), EntitlementError>;

    /// All `active` rows (any user) whose expiry is before `now`.
    async fn select_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntitlementRecord>, EntitlementError>;
}

#[async_trait]
impl<T: EntitlementStoreDatasource + ?Sized> EntitlementStoreDatasource for Arc<T> {
    async fn upsert(&self, write: EntitlementWrite) -> Result<EntitlementRecord, EntitlementError> {
        (**self).upsert(write).await
    }

    async fn select_active(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, EntitlementError> {
        (**self).select_active(user_id).await
    }

    async fn update_status(
        &self,
        record_id: u64,
        status: EntitlementStatus,
    ) -> Result<(), EntitlementError> {
        (**self).update_status(record_id, status).await
    }

    async fn select_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntitlementRecord>, EntitlementError> {
        (**self).select_expired_active(now).await
    }
}

/// Process-local store. Suitable for tests and for hosts that mirror the
/// backend table in memory.
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    next_id: u64,
    rows: HashMap<(String, String), EntitlementRecord>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EntitlementRecord> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let mut rows: Vec<_> = state.rows.values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    pub fn get(&self, user_id: &str, product_id: &str) -> Option<EntitlementRecord> {
        self.state
            .lock()
            .ok()?
            .rows
            .get(&(user_id.to_string(), product_id.to_string()))
            .cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InMemoryState>, EntitlementError> {
        self.state
            .lock()
            .map_err(|_| EntitlementError::Store("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl EntitlementStoreDatasource for InMemoryEntitlementStore {
    async fn upsert(&self, write: EntitlementWrite) -> Result<EntitlementRecord, EntitlementError> {
        if write.status == EntitlementStatus::None {
            return Err(EntitlementError::Store(
                "status 'none' cannot be persisted".into(),
            ));
        }
        let mut state = self.lock()?;
        let key = (write.user_id.clone(), write.product_id.clone());
        let id = match state.rows.get(&key) {
            Some(existing) => existing.id,
            None => {
                state.next_id += 1;
                state.next_id
            }
        };
        let record = EntitlementRecord {
            id,
            user_id: write.user_id,
            product_id: write.product_id,
            transaction_id: write.transaction_id,
            platform: write.platform,
            subscription_type: write.subscription_type,
            status: write.status,
            purchase_date: write.purchase_date,
            expiry_date: write.expiry_date,
            original_transaction_id: write.original_transaction_id,
            receipt_data: write.receipt_data,
            auto_renew_enabled: write.auto_renew_enabled,
            updated_at: write.updated_at,
        };
        state.rows.insert(key, record.clone());
        Ok(record)
    }

    async fn select_active(
        &self,
        user_id: &str,
    ) -> Result<Option<EntitlementRecord>, EntitlementError> {
        Ok(self
            .lock()?
            .rows
            .values()
            .filter(|r| r.user_id == user_id && r.status == EntitlementStatus::Active)
            .max_by_key(|r| (r.expiry_date, r.id))
            .cloned())
    }

    async fn update_status(
        &self,
        record_id: u64,
        status: EntitlementStatus,
    ) -> Result<(), EntitlementError> {
        if status == EntitlementStatus::None {
            return Err(EntitlementError::Store(
                "status 'none' cannot be persisted".into(),
            ));
        }
        let mut state = self.lock()?;
        let record = state
            .rows
            .values_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| EntitlementError::Store(format!("record {record_id} not found")))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn select_expired_active(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EntitlementRecord>, EntitlementError> {
        let mut rows: Vec<_> = self
            .lock()?
            .rows
            .values()
            .filter(|r| r.status == EntitlementStatus::Active && r.is_expired_at(now))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }
}
