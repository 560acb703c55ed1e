// libs/scheduling-cell/src/services/locking.rs
//
// Advisory date locks for booking serialization. A conflict check followed by
// an insert is only safe if no other writer can commit between the two steps;
// the lock closes that window. Locks are scoped per calendar date, coarser
// than per dentist, because slot exclusivity is clinic-wide.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::SchedulingError;

pub struct DateLockService {
    supabase: Arc<SupabaseClient>,
    lock_timeout_seconds: i64,
    max_retry_attempts: u32,
}

impl DateLockService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            lock_timeout_seconds: 30,
            max_retry_attempts: 3,
        }
    }

    /// Acquire the advisory lock for `date`, retrying with backoff while
    /// another writer holds it. A caller that cannot acquire within the retry
    /// budget lost the race and receives `SlotConflict`.
    pub async fn acquire(&self, date: NaiveDate) -> Result<(), SchedulingError> {
        let lock_key = Self::lock_key(date);

        for attempt in 1..=self.max_retry_attempts {
            debug!("Lock acquisition attempt {} for {}", attempt, lock_key);

            if self.try_acquire(&lock_key).await? {
                debug!("Date lock acquired: {}", lock_key);
                return Ok(());
            }

            if attempt < self.max_retry_attempts {
                tokio::time::sleep(tokio::time::Duration::from_millis(100 * attempt as u64)).await;
            }
        }

        warn!("Could not acquire date lock {} - concurrent writer holds it", lock_key);
        Err(SchedulingError::SlotConflict)
    }

    /// Release the advisory lock for `date`.
    pub async fn release(&self, date: NaiveDate) -> Result<(), SchedulingError> {
        let lock_key = Self::lock_key(date);

        let _deleted: Vec<Value> = self
            .supabase
            .request_returning(
                Method::DELETE,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key),
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::PersistenceError(format!("Lock release failed: {}", e)))?;

        debug!("Date lock released: {}", lock_key);
        Ok(())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// One acquisition round: insert the lock row, and when that fails, clear
    /// an expired holder and try once more. The unique constraint on
    /// `lock_key` is what makes the insert race-safe.
    async fn try_acquire(&self, lock_key: &str) -> Result<bool, SchedulingError> {
        if self.try_insert_lock(lock_key).await {
            return Ok(true);
        }

        if self.cleanup_expired_lock(lock_key).await? {
            return Ok(self.try_insert_lock(lock_key).await);
        }

        Ok(false)
    }

    async fn try_insert_lock(&self, lock_key: &str) -> bool {
        let now = Utc::now();
        let lock_data = json!({
            "lock_key": lock_key,
            "acquired_at": now.to_rfc3339(),
            "expires_at": (now + Duration::seconds(self.lock_timeout_seconds)).to_rfc3339(),
            "process_id": format!("scheduler_{}", Uuid::new_v4()),
        });

        self.supabase
            .request_returning::<Vec<Value>>(
                Method::POST,
                "/rest/v1/scheduling_locks",
                None,
                Some(lock_data),
            )
            .await
            .is_ok()
    }

    /// Returns true when an expired lock row was removed and acquisition is
    /// worth retrying.
    async fn cleanup_expired_lock(&self, lock_key: &str) -> Result<bool, SchedulingError> {
        let response: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                &format!("/rest/v1/scheduling_locks?lock_key=eq.{}&select=*", lock_key),
                None,
                None,
            )
            .await
            .map_err(|e| SchedulingError::PersistenceError(format!("Lock check failed: {}", e)))?;

        let Some(lock) = response.first() else {
            // Holder released between our insert attempt and this check.
            return Ok(true);
        };

        let expired = lock
            .get("expires_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|expires_at| expires_at.with_timezone(&Utc) < Utc::now())
            .unwrap_or(false);

        if expired {
            warn!("Cleaning up expired date lock: {}", lock_key);
            let _deleted: Vec<Value> = self
                .supabase
                .request_returning(
                    Method::DELETE,
                    &format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key),
                    None,
                    None,
                )
                .await
                .map_err(|e| {
                    SchedulingError::PersistenceError(format!("Lock cleanup failed: {}", e))
                })?;
            return Ok(true);
        }

        Ok(false)
    }

    fn lock_key(date: NaiveDate) -> String {
        format!("date_{}", date)
    }
}
