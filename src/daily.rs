use anyhow::Result;
use chrono::{DateTime, Local};
use rand::Rng;
use std::sync::Mutex;

use crate::models::Joke;

/// The featured joke for the current calendar day. At most one selection is
/// active at a time; an expired one reads as absent and gets replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySelection {
    pub joke_id: u32,
    pub expires_at: DateTime<Local>,
}

impl DailySelection {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Local::now()
    }
}

/// Where the daily selection lives. Backed by sqlite in the app and by
/// memory in tests.
pub trait DailySelectionStore {
    /// The active selection, or `None` when there is none or it expired.
    fn get(&self) -> Result<Option<DailySelection>>;

    fn set(&self, selection: &DailySelection) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// 23:59:59.999 local time today.
pub fn end_of_today() -> DateTime<Local> {
    let now = Local::now();
    now.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .unwrap_or(now)
}

/// Returns the day's featured joke id. An unexpired selection wins even if
/// the sorted input changed since it was made; otherwise a uniformly random
/// element of `sorted` is picked and persisted until end of day.
pub fn select_daily_joke(
    store: &dyn DailySelectionStore,
    sorted: &[Joke],
) -> Result<Option<u32>> {
    if let Some(selection) = store.get()? {
        return Ok(Some(selection.joke_id));
    }

    if sorted.is_empty() {
        return Ok(None);
    }

    let index = rand::thread_rng().gen_range(0..sorted.len());
    let selection = DailySelection {
        joke_id: sorted[index].id,
        expires_at: end_of_today(),
    };
    store.set(&selection)?;
    Ok(Some(selection.joke_id))
}

/// In-memory selection store for tests.
#[derive(Default)]
pub struct MemoryDailyStore {
    selection: Mutex<Option<DailySelection>>,
}

impl DailySelectionStore for MemoryDailyStore {
    fn get(&self) -> Result<Option<DailySelection>> {
        let guard = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone().filter(|selection| !selection.is_expired()))
    }

    fn set(&self, selection: &DailySelection) -> Result<()> {
        let mut guard = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(selection.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
        Ok(())
    }
}
