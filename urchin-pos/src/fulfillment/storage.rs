//! redb-based storage for the print queue, printed ledger and print policy

use super::types::PrintPolicy;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Pending prints, FIFO: key = insertion sequence, value = order_id
const PRINT_QUEUE_TABLE: TableDefinition<u64, &str> = TableDefinition::new("print_queue");

/// Queue membership index: order_id -> sequence
const PRINT_QUEUE_INDEX_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("print_queue_index");

/// Printed ledger: order_id -> printed_at (Unix millis)
const PRINTED_LEDGER_TABLE: TableDefinition<&str, i64> = TableDefinition::new("printed_ledger");

/// Print policy singleton: "policy" -> JSON
const PRINT_POLICY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("print_policy");

const POLICY_KEY: &str = "policy";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Fulfillment storage
///
/// Owns the durable state of the pipeline: the queue of order ids
/// awaiting print, the ledger of order ids already printed, and the
/// operator's print policy. Writes commit before returning, so both
/// survive a crash mid-batch.
#[derive(Clone)]
pub struct FulfillmentStorage {
    db: Arc<Database>,
}

impl FulfillmentStorage {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRINT_QUEUE_TABLE)?;
            let _ = write_txn.open_table(PRINT_QUEUE_INDEX_TABLE)?;
            let _ = write_txn.open_table(PRINTED_LEDGER_TABLE)?;
            let _ = write_txn.open_table(PRINT_POLICY_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Print Queue ==========

    /// Append an order id to the queue if absent
    ///
    /// Returns true if the id was newly added, false if it was already
    /// queued. Committed before returning.
    pub fn enqueue(&self, order_id: &str) -> StorageResult<bool> {
        let txn = self.db.begin_write()?;
        let added = {
            let mut idx_table = txn.open_table(PRINT_QUEUE_INDEX_TABLE)?;
            if idx_table.get(order_id)?.is_some() {
                false
            } else {
                let mut queue_table = txn.open_table(PRINT_QUEUE_TABLE)?;
                let next_seq = queue_table
                    .last()?
                    .map(|(key, _)| key.value() + 1)
                    .unwrap_or(0);
                queue_table.insert(next_seq, order_id)?;
                idx_table.insert(order_id, next_seq)?;
                true
            }
        };
        txn.commit()?;
        Ok(added)
    }

    /// Non-destructive read of all queued order ids, insertion order
    pub fn peek_all(&self) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINT_QUEUE_TABLE)?;

        let mut ids = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            ids.push(value.value().to_string());
        }
        Ok(ids)
    }

    /// Remove exactly the given batch from the queue
    ///
    /// Ids enqueued after the batch was peeked are left in place. Unknown
    /// ids are ignored. Returns the number of entries removed.
    pub fn remove_batch(&self, order_ids: &[String]) -> StorageResult<usize> {
        let txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut queue_table = txn.open_table(PRINT_QUEUE_TABLE)?;
            let mut idx_table = txn.open_table(PRINT_QUEUE_INDEX_TABLE)?;

            for order_id in order_ids {
                let seq = idx_table.get(order_id.as_str())?.map(|g| g.value());
                if let Some(seq) = seq {
                    queue_table.remove(seq)?;
                    idx_table.remove(order_id.as_str())?;
                    removed += 1;
                }
            }
        }
        txn.commit()?;
        Ok(removed)
    }

    /// Number of queued order ids
    pub fn queue_len(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINT_QUEUE_TABLE)?;
        Ok(table.len()?)
    }

    // ========== Printed Ledger ==========

    /// Whether an order id was ever successfully printed
    pub fn is_printed(&self, order_id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINTED_LEDGER_TABLE)?;
        Ok(table.get(order_id)?.is_some())
    }

    /// Record a successful print, idempotent
    ///
    /// The first recorded timestamp wins. Committed before returning, so
    /// a crash right after the physical print still leaves the order
    /// marked.
    pub fn mark_printed(&self, order_id: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PRINTED_LEDGER_TABLE)?;
            if table.get(order_id)?.is_none() {
                table.insert(order_id, chrono::Utc::now().timestamp_millis())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Number of ledger entries
    pub fn ledger_len(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINTED_LEDGER_TABLE)?;
        Ok(table.len()?)
    }

    /// Remove ledger entries older than max_age_secs
    ///
    /// Maintenance hook for an out-of-band task; nothing in the pipeline
    /// schedules this.
    pub fn prune_ledger(&self, max_age_secs: i64) -> StorageResult<usize> {
        let cutoff = chrono::Utc::now().timestamp_millis() - max_age_secs * 1000;

        let txn = self.db.begin_write()?;
        let mut deleted = 0;
        {
            let mut table = txn.open_table(PRINTED_LEDGER_TABLE)?;

            let mut to_delete = Vec::new();
            for result in table.iter()? {
                let (key, guard) = result?;
                if guard.value() < cutoff {
                    to_delete.push(key.value().to_string());
                }
            }

            for id in &to_delete {
                table.remove(id.as_str())?;
                deleted += 1;
            }
        }
        txn.commit()?;
        Ok(deleted)
    }

    // ========== Print Policy ==========

    /// Load the persisted print policy, None if never saved
    pub fn load_policy(&self) -> StorageResult<Option<PrintPolicy>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINT_POLICY_TABLE)?;

        match table.get(POLICY_KEY)? {
            Some(guard) => {
                let policy: PrintPolicy = serde_json::from_slice(guard.value())?;
                Ok(Some(policy))
            }
            None => Ok(None),
        }
    }

    /// Persist the print policy singleton
    pub fn save_policy(&self, policy: &PrintPolicy) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PRINT_POLICY_TABLE)?;
            let value = serde_json::to_vec(policy)?;
            table.insert(POLICY_KEY, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl std::fmt::Debug for FulfillmentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentStorage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_is_idempotent() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();

        assert!(storage.enqueue("order-1").unwrap());
        assert!(!storage.enqueue("order-1").unwrap());

        assert_eq!(storage.peek_all().unwrap(), vec!["order-1".to_string()]);
    }

    #[test]
    fn test_peek_all_fifo_order() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();

        storage.enqueue("b").unwrap();
        storage.enqueue("a").unwrap();
        storage.enqueue("c").unwrap();

        assert_eq!(storage.peek_all().unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_remove_batch_spares_late_entries() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();

        storage.enqueue("a").unwrap();
        storage.enqueue("b").unwrap();
        let batch = storage.peek_all().unwrap();

        // Enqueued while the batch is being worked
        storage.enqueue("c").unwrap();

        assert_eq!(storage.remove_batch(&batch).unwrap(), 2);
        assert_eq!(storage.peek_all().unwrap(), vec!["c"]);
    }

    #[test]
    fn test_fifo_survives_partial_removal() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();

        storage.enqueue("a").unwrap();
        storage.enqueue("b").unwrap();
        storage.remove_batch(&["a".to_string()]).unwrap();
        storage.enqueue("c").unwrap();

        assert_eq!(storage.peek_all().unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_ledger_roundtrip() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();

        assert!(!storage.is_printed("order-1").unwrap());
        storage.mark_printed("order-1").unwrap();
        storage.mark_printed("order-1").unwrap();
        assert!(storage.is_printed("order-1").unwrap());
        assert_eq!(storage.ledger_len().unwrap(), 1);
    }

    #[test]
    fn test_policy_none_until_saved() {
        let storage = FulfillmentStorage::open_in_memory().unwrap();
        assert!(storage.load_policy().unwrap().is_none());

        let policy = PrintPolicy {
            auto_print_enabled: true,
            ..Default::default()
        };
        storage.save_policy(&policy).unwrap();

        let loaded = storage.load_policy().unwrap().unwrap();
        assert!(loaded.auto_print_enabled);
    }

    #[test]
    fn test_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fulfillment.redb");

        {
            let storage = FulfillmentStorage::open(&path).unwrap();
            storage.enqueue("order-1").unwrap();
            storage.mark_printed("order-0").unwrap();
        }

        let storage = FulfillmentStorage::open(&path).unwrap();
        assert_eq!(storage.peek_all().unwrap(), vec!["order-1"]);
        assert!(storage.is_printed("order-0").unwrap());
    }
}
