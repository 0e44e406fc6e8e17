//! Cache Module
//!
//! Day-bucketed cache lifecycle on top of a [`DayStore`]: pruning of stale
//! day-directories, newest-first reads and writes into today's directory.
//! Day names use the sortable `YYYYMMDD` format, so a descending sort of the
//! names is newest-first.
use crate::canonical::CanonicalKey;
use crate::error::Result;
use crate::models::{CacheLookup, Location};
use crate::store::DayStore;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

pub const DAY_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Directory name for the given date.
pub fn day_name(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Parses an 8-digit `YYYYMMDD` directory name.
pub fn parse_day(name: &str) -> Option<NaiveDate> {
    if name.len() != 8 || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(name, DAY_FORMAT).ok()
}

/// Deletes every day partition whose date lies more than `retention_days`
/// away from `today`. Names that are not dates are skipped. Returns the
/// removed day names.
pub fn prune(store: &dyn DayStore, today: NaiveDate, retention_days: i64) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for day in store.list_days()? {
        let Some(date) = parse_day(&day) else {
            warn!("Skipping cache directory with malformed name: {}", day);
            continue;
        };
        if (today - date).num_days().abs() > retention_days {
            store.delete_day(&day)?;
            info!("Pruned cache day {}", day);
            removed.push(day);
        }
    }
    Ok(removed)
}

/// Looks `key` up in every day partition, newest first.
///
/// A partition that cannot be read, or an entry that does not decode, counts
/// as a miss for that day. With `skip_null` set, cached failures are passed
/// over as well so an older location can still be found.
pub fn read(store: &dyn DayStore, key: &CanonicalKey, skip_null: bool) -> Result<CacheLookup> {
    let mut days = store.list_days()?;
    days.sort_unstable_by(|a, b| b.cmp(a));
    for day in days {
        let contents = match store.get(&day, key) {
            Ok(Some(contents)) => contents,
            Ok(None) => continue,
            Err(e) => {
                debug!("Cache read {}/{} failed: {}", day, key, e);
                continue;
            }
        };
        match serde_json::from_str::<Option<Location>>(&contents) {
            Ok(None) if skip_null => debug!("Skipping cached failure {}/{}", day, key),
            Ok(location) => return Ok(CacheLookup::Hit(location)),
            Err(e) => warn!("Ignoring undecodable cache entry {}/{}: {}", day, key, e),
        }
    }
    Ok(CacheLookup::Miss)
}

/// Stores `location` (or `null`) under today's partition.
pub fn write(
    store: &dyn DayStore,
    today: NaiveDate,
    key: &CanonicalKey,
    location: Option<&Location>,
) -> Result<()> {
    let value = serde_json::to_string(&location)?;
    store.put(&day_name(today), key, &value)
}
