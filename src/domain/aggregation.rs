use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::calendar::{Granularity, utc_from_epoch};
use crate::domain::session_log::{EnergySlice, JOULES_PER_KWH};

/// Bucket key to delivered kWh, ordered chronologically by key.
pub type BucketTotals = BTreeMap<String, f64>;

/// How a slice's energy is attributed to buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttributionPolicy {
    /// Energy is spread over every bucket the interval touches, proportional to the
    /// wall-clock time spent in each.
    #[default]
    #[serde(rename = "split")]
    TimeProportional,
    /// The whole energy of the interval lands in the bucket where it starts.
    #[serde(rename = "start")]
    StartBucket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketShare {
    pub key: String,
    pub kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Splits the energy of `[start, end)` across the buckets it overlaps.
///
/// Empty when the interval has no positive length or its length overflows.
pub fn split_interval(
    start: i64,
    end: i64,
    joules: f64,
    granularity: Granularity,
) -> Vec<BucketShare> {
    let Some(total_seconds) = end.checked_sub(start).filter(|seconds| *seconds > 0) else {
        return Vec::new();
    };
    let (Some(start_at), Some(end_at)) = (utc_from_epoch(start), utc_from_epoch(end)) else {
        return Vec::new();
    };

    let total_kwh = energy_kwh(joules);
    let mut shares = Vec::new();
    let mut cursor = start_at;

    while cursor < end_at {
        let slice_end = granularity
            .next_boundary(cursor)
            .filter(|boundary| *boundary > cursor && *boundary < end_at)
            .unwrap_or(end_at);
        let slice_seconds = (slice_end - cursor).num_seconds();
        let fraction = slice_seconds as f64 / total_seconds as f64;

        shares.push(BucketShare {
            key: granularity.bucket_key(cursor),
            kwh: total_kwh * fraction,
        });
        cursor = slice_end;
    }

    shares
}

/// Sums the energy of every slice into per-bucket totals.
pub fn aggregate(
    slices: &[EnergySlice],
    granularity: Granularity,
    policy: AttributionPolicy,
) -> BucketTotals {
    let mut totals = BucketTotals::new();

    for slice in slices {
        let shares = match policy {
            AttributionPolicy::TimeProportional => {
                split_interval(slice.start, slice.end, slice.joules, granularity)
            }
            AttributionPolicy::StartBucket => start_bucket_share(slice, granularity)
                .into_iter()
                .collect(),
        };

        for share in shares {
            *totals.entry(share.key).or_insert(0.0) += share.kwh;
        }
    }

    totals
}

/// The trailing `count` buckets up to and including the one containing `now`, with
/// buckets nobody charged in filled with zero.
pub fn last_n(
    totals: &BucketTotals,
    count: usize,
    granularity: Granularity,
    now: DateTime<Utc>,
) -> ChartSeries {
    let mut window = totals.clone();
    for key in granularity.recent_keys(now, count) {
        window.entry(key).or_insert(0.0);
    }

    let skip = window.len().saturating_sub(count);
    let (labels, values) = window.into_iter().skip(skip).unzip();

    ChartSeries { labels, values }
}

fn start_bucket_share(slice: &EnergySlice, granularity: Granularity) -> Option<BucketShare> {
    if slice.end <= slice.start {
        return None;
    }

    Some(BucketShare {
        key: granularity.bucket_key(utc_from_epoch(slice.start)?),
        kwh: energy_kwh(slice.joules),
    })
}

fn energy_kwh(joules: f64) -> f64 {
    if joules.is_finite() {
        joules / JOULES_PER_KWH
    } else {
        0.0
    }
}
