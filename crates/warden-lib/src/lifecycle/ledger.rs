//! Daily recovery budget per container

use crate::error::{Result, WardenError};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Counts recovery workflows per (container, calendar day, UTC)
///
/// One workflow invocation takes one unit, regardless of how many tiers it
/// runs through.
#[derive(Debug)]
pub struct RecoveryLedger {
    cap: u32,
    counts: Mutex<HashMap<(String, NaiveDate), u32>>,
}

impl RecoveryLedger {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Take one unit of `container`'s budget for `day`
    ///
    /// Returns the attempt number on success, `RecoveryExhausted` once the
    /// cap is reached. Entries for earlier days are dropped.
    pub async fn try_acquire(&self, container: &str, day: NaiveDate) -> Result<u32> {
        let mut counts = self.counts.lock().await;
        counts.retain(|(_, d), _| *d >= day);

        let count = counts.entry((container.to_string(), day)).or_insert(0);
        if *count >= self.cap {
            return Err(WardenError::RecoveryExhausted {
                container: container.to_string(),
                attempts: *count,
                cap: self.cap,
            });
        }
        *count += 1;
        Ok(*count)
    }

    pub async fn attempts(&self, container: &str, day: NaiveDate) -> u32 {
        self.counts
            .lock()
            .await
            .get(&(container.to_string(), day))
            .copied()
            .unwrap_or(0)
    }

    pub async fn attempts_today(&self, container: &str) -> u32 {
        self.attempts(container, Self::today()).await
    }

    /// Remaining budget for today
    pub async fn remaining_today(&self, container: &str) -> u32 {
        self.cap.saturating_sub(self.attempts_today(container).await)
    }
}
