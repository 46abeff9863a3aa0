use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use log::{Level, log};
use tokio::sync::Mutex;
use crate::repository::row::Row;
use crate::sheets::{StoreError, TabularStore, a1};

const DEFAULT_LOCK_STRIPES: u16 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Sheet row number that was written.
    Updated { row: usize },
    NotFound,
}

/// Reads and updates sheet rows. Nothing is cached, every call goes to the store.
///
/// Updates to one sheet are serialized through a lock stripe picked by hashing
/// the sheet name, so two updates never interleave their read and write.
pub struct SheetRepository {
    store: Arc<dyn TabularStore>,
    stripes: Vec<Mutex<()>>,
    size: u64,
}

impl SheetRepository {
    pub fn new(store: Arc<dyn TabularStore>, lock_stripes: u16) -> Self {
        let stripe_count = if lock_stripes == 0 { DEFAULT_LOCK_STRIPES } else { lock_stripes };
        let mut stripes: Vec<Mutex<()>> = Vec::with_capacity(stripe_count as usize);
        for _ in 0..stripe_count {
            stripes.push(Mutex::new(()));
        }
        let size = stripes.len() as u64;
        SheetRepository {
            store,
            stripes,
            size,
        }
    }

    fn stripe(&self, partition: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        partition.hash(&mut hasher);
        &self.stripes[(hasher.finish() % self.size) as usize]
    }

    pub async fn fetch_rows(&self, partition: &str) -> Result<Vec<Row>, StoreError> {
        let range = a1::rows_range(partition);
        let cells = self.store.get_values(&range).await?;
        Ok(cells.into_iter().map(Row::from_cells).collect())
    }

    /// Writes `new_value` into the count cell of the first row keyed `key`.
    /// Keys compare as text, `"7"` never matches `"07"`, and blank rows are
    /// skipped.
    pub async fn update_count(&self, partition: &str, key: &str, new_value: i64) -> Result<UpdateOutcome, StoreError> {
        let _guard = self.stripe(partition).lock().await;
        let rows = self.fetch_rows(partition).await?;
        let Some(index) = rows.iter().position(|row| row.is_keyed(key)) else {
            log!(Level::Debug, "No row keyed {key} in {partition}");
            return Ok(UpdateOutcome::NotFound);
        };
        let cell = a1::count_cell(partition, index);
        self.store.set_value(&cell, new_value).await?;
        log!(Level::Info, "Set {cell} to {new_value}");
        Ok(UpdateOutcome::Updated {
            row: index + a1::FIRST_DATA_ROW,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use crate::repository::row::format_rows;
    use crate::sheets::fake::FakeStore;
    use super::*;

    fn repository(store: &Arc<FakeStore>) -> SheetRepository {
        SheetRepository::new(store.clone(), 0)
    }

    fn people() -> Arc<FakeStore> {
        Arc::new(FakeStore::with_sheet("People", &[&["1", "Alice", "3"], &["2", "Bob", ""]]))
    }

    #[tokio::test]
    async fn fetch_reads_key_to_count_columns() {
        let store = people();
        let rows = repository(&store).fetch_rows("People").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].label, "Bob");
        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_writes_one_cell_at_row_offset() {
        let store = people();
        let outcome = repository(&store).update_count("People", "2", 9).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated { row: 3 });
        assert_eq!(store.written(), vec![("People!C3".to_string(), 9)]);
    }

    #[tokio::test]
    async fn unknown_key_is_not_written() {
        let store = people();
        let outcome = repository(&store).update_count("People", "99", 9).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert!(store.written().is_empty());
    }

    #[tokio::test]
    async fn keys_are_compared_as_text() {
        let store = people();
        let outcome = repository(&store).update_count("People", "01", 5).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn first_duplicate_wins() {
        let store = Arc::new(FakeStore::with_sheet("Dup", &[&["5", "a", "1"], &["5", "b", "2"]]));
        let outcome = repository(&store).update_count("Dup", "5", 0).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated { row: 2 });
    }

    #[tokio::test]
    async fn blank_rows_are_never_written() {
        let store = Arc::new(FakeStore::with_sheet("S", &[&["1", "A", "3"], &[], &["2", "B", "1"]]));
        let repository = repository(&store);
        assert_eq!(repository.update_count("S", "", 5).await.unwrap(), UpdateOutcome::NotFound);
        assert!(store.written().is_empty());
        // The blank row still counts towards the offset of the rows below it.
        assert_eq!(repository.update_count("S", "2", 5).await.unwrap(), UpdateOutcome::Updated { row: 4 });
        assert_eq!(store.written(), vec![("S!C4".to_string(), 5)]);
    }

    #[tokio::test]
    async fn update_then_fetch_reflects_new_value() {
        let store = people();
        let repository = repository(&store);
        repository.update_count("People", "2", 9).await.unwrap();
        let rows = repository.fetch_rows("People").await.unwrap();
        assert_eq!(format_rows(&rows), "ID: 1, Name: Alice, Count: 3\nID: 2, Name: Bob, Count: 9");
    }

    #[tokio::test]
    async fn empty_sheet_is_not_found() {
        let store = Arc::new(FakeStore::default());
        let repository = repository(&store);
        assert!(repository.fetch_rows("Empty").await.unwrap().is_empty());
        assert_eq!(repository.update_count("Empty", "1", 1).await.unwrap(), UpdateOutcome::NotFound);
        assert!(store.written().is_empty());
    }

    #[tokio::test]
    async fn store_failure_propagates_without_write() {
        let store = people();
        store.failing.store(true, Ordering::SeqCst);
        let err = repository(&store).update_count("People", "1", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 503, .. }));
        assert!(store.written().is_empty());
    }

    #[tokio::test]
    async fn concurrent_updates_on_one_sheet_are_serialized() {
        let store = people();
        let repository = Arc::new(repository(&store));
        let mut handles = Vec::new();
        for value in 0..8 {
            let repository = repository.clone();
            handles.push(tokio::spawn(async move {
                repository.update_count("People", "1", value).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), UpdateOutcome::Updated { row: 2 });
        }
        let events = store.events.lock().unwrap().clone();
        assert_eq!(events.len(), 16);
        assert!(events.chunks(2).all(|pair| pair == ["read", "write"]));
    }
}
