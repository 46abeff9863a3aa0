use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use crate::sheets::{StoreError, TabularStore};

/// In-memory store keyed by plain sheet name, recording every call.
#[derive(Default)]
pub(crate) struct FakeStore {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    pub reads: AtomicUsize,
    pub writes: Mutex<Vec<(String, i64)>>,
    pub failing: AtomicBool,
    pub events: Mutex<Vec<&'static str>>,
}

impl FakeStore {
    pub fn with_sheet(name: &str, rows: &[&[&str]]) -> Self {
        let store = FakeStore::default();
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        store.sheets.lock().unwrap().insert(name.to_string(), rows);
        store
    }

    pub fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.lock().unwrap().len()
    }

    pub fn written(&self) -> Vec<(String, i64)> {
        self.writes.lock().unwrap().clone()
    }

    fn fail_if_asked(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 503,
                body: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn read(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("read");
        self.fail_if_asked()?;
        let (sheet, _) = range.rsplit_once('!').unwrap_or((range, ""));
        Ok(self.sheets.lock().unwrap().get(sheet).cloned().unwrap_or_default())
    }

    fn write(&self, range: &str, value: i64) -> Result<(), StoreError> {
        self.fail_if_asked()?;
        self.writes.lock().unwrap().push((range.to_string(), value));
        self.events.lock().unwrap().push("write");
        let (sheet, cell) = range.rsplit_once('!').unwrap_or((range, ""));
        let row: usize = cell.trim_start_matches('C').parse().unwrap_or(0);
        let mut sheets = self.sheets.lock().unwrap();
        let rows = sheets.entry(sheet.to_string()).or_default();
        if let Some(cells) = row.checked_sub(2).and_then(|i| rows.get_mut(i)) {
            cells.resize(cells.len().max(3), String::new());
            cells[2] = value.to_string();
        }
        Ok(())
    }
}

impl TabularStore for FakeStore {
    fn get_values<'a>(&'a self, range: &'a str) -> BoxFuture<'a, Result<Vec<Vec<String>>, StoreError>> {
        async move {
            // Yield so concurrent callers interleave like real round trips.
            tokio::task::yield_now().await;
            self.read(range)
        }
        .boxed()
    }

    fn set_value<'a>(&'a self, range: &'a str, value: i64) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            tokio::task::yield_now().await;
            self.write(range, value)
        }
        .boxed()
    }
}
