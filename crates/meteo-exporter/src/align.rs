//! Nearest-timestamp lookup for hourly forecast series.
//!
//! Open-Meteo reports `current_weather.time` at minute resolution while
//! the hourly series is aligned to whole hours, so the current timestamp
//! usually falls between two entries. This module finds the hourly index
//! closest in absolute time to the current observation.

use chrono::NaiveDateTime;

/// Index of the series entry closest to `target`.
///
/// `series` must be sorted ascending and non-empty; Open-Meteo returns
/// hourly timestamps already ordered. A `target` before the first entry
/// clamps to index 0 and one past the last entry clamps to the last
/// index. When `target` falls exactly halfway between two entries the
/// earlier index wins.
pub fn nearest_index(series: &[NaiveDateTime], target: NaiveDateTime) -> usize {
    // First entry >= target, i.e. the insertion point for `target`.
    let pos = series.partition_point(|entry| *entry < target);

    if pos == 0 {
        return 0;
    }
    if pos == series.len() {
        return series.len() - 1;
    }

    let before = target - series[pos - 1];
    let after = series[pos] - target;
    if after < before {
        pos
    } else {
        pos - 1
    }
}
