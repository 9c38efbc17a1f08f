use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::TicketError;

/// One row of sale history: a single sold ticket attributed to the vendor
/// that released it and the customer that bought it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub event_name: String,
    pub price: f64,
    pub vendor_id: u32,
    pub customer_id: u32,
    pub quantity: u32,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        event_name: String,
        price: f64,
        vendor_id: u32,
        customer_id: u32,
        quantity: u32,
    ) -> Self {
        TransactionRecord {
            event_name,
            price,
            vendor_id,
            customer_id,
            quantity,
            timestamp: Utc::now(),
        }
    }
}

/// Collaborator that persists completed sales. Invoked by the pool, never by
/// workers directly; a failure is logged by the caller and never aborts the
/// in-progress purchase.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransactionSink: Send + Sync {
    async fn record(&self, record: TransactionRecord) -> Result<(), TicketError>;

    async fn clear_history(&self) -> Result<(), TicketError>;
}

/// In-memory sale history. Stands in for an external transactions table.
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    records: RwLock<Vec<TransactionRecord>>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<TransactionRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl TransactionSink for InMemoryTransactionLog {
    async fn record(&self, record: TransactionRecord) -> Result<(), TicketError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn clear_history(&self) -> Result<(), TicketError> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_clears_history() {
        let log = InMemoryTransactionLog::new();
        log.record(TransactionRecord::new(
            "Rock Concert".to_string(),
            45.0,
            1,
            7,
            1,
        ))
        .await
        .unwrap();
        log.record(TransactionRecord::new(
            "Comedy Night".to_string(),
            25.5,
            2,
            3,
            1,
        ))
        .await
        .unwrap();

        let records = log.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_name, "Rock Concert");
        assert_eq!(records[1].customer_id, 3);

        log.clear_history().await.unwrap();
        assert!(log.records().await.is_empty());
    }
}
