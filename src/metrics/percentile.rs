//! Nearest-rank latency percentiles.
//!
//! Samples are sorted ascending and percentile `p` selects the sample at index
//! `floor(n * p / 100)`, clamped to the last sample. The 100th percentile is always
//! the slowest sample. Values are never interpolated.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::time::Duration;

use crate::util::duration_ms;

/// Number of entries in a percentile table, 0 through 100 inclusive.
pub const PERCENTILES: usize = 101;

/// Index into `total` sorted samples selected for `percentile`.
///
/// # Example
/// ```rust
/// use kaskade::metrics::percentile::percentile_index;
///
/// assert_eq!(percentile_index(4, 0), 0);
/// assert_eq!(percentile_index(4, 50), 2);
/// assert_eq!(percentile_index(4, 99), 3);
/// assert_eq!(percentile_index(4, 100), 3);
/// ```
pub fn percentile_index(total: usize, percentile: usize) -> usize {
    if total == 0 {
        return 0;
    }
    let last = total - 1;
    if percentile >= 100 {
        last
    } else {
        (total * percentile / 100).min(last)
    }
}

/// Arithmetic mean of all samples in milliseconds, `None` without samples.
pub fn mean_ms(samples: &[Duration]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let total: Duration = samples.iter().sum();
    Some(duration_ms(total) / samples.len() as f64)
}

/// Latency in milliseconds for every percentile from 0 to 100.
///
/// Serialized as a map keyed by the percentile as a string, `{"0": 1.2, ..., "100": 9.7}`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>")]
pub struct PercentileTable {
    values: [f64; PERCENTILES],
}
impl PercentileTable {
    /// Build the table from unsorted samples, `None` without samples.
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    /// use kaskade::metrics::percentile::PercentileTable;
    ///
    /// let samples = vec![
    ///     Duration::from_millis(30),
    ///     Duration::from_millis(10),
    ///     Duration::from_millis(20),
    /// ];
    /// let table = PercentileTable::from_samples(&samples).unwrap();
    /// assert_eq!(table.get(0), Some(10.0));
    /// assert_eq!(table.get(50), Some(20.0));
    /// assert_eq!(table.get(100), Some(30.0));
    ///
    /// assert!(PercentileTable::from_samples(&[]).is_none());
    /// ```
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let mut values = [0.0; PERCENTILES];
        for (percentile, value) in values.iter_mut().enumerate() {
            *value = duration_ms(sorted[percentile_index(sorted.len(), percentile)]);
        }
        Some(PercentileTable { values })
    }

    /// Latency at `percentile` in milliseconds, `None` above 100.
    pub fn get(&self, percentile: usize) -> Option<f64> {
        self.values.get(percentile).copied()
    }

    /// Iterate over `(percentile, milliseconds)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().copied().enumerate()
    }
}

impl Serialize for PercentileTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(PERCENTILES))?;
        for (percentile, value) in self.iter() {
            map.serialize_entry(&percentile.to_string(), &value)?;
        }
        map.end()
    }
}

impl TryFrom<BTreeMap<String, f64>> for PercentileTable {
    type Error = String;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        let mut values = [0.0; PERCENTILES];
        for (percentile, value) in values.iter_mut().enumerate() {
            *value = *map
                .get(&percentile.to_string())
                .ok_or_else(|| format!("missing percentile {}", percentile))?;
        }
        Ok(PercentileTable { values })
    }
}
