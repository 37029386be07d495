//! Rank-based quantile binning of one indicator column.
//!
//! Values are ranked ordinally (ties keep input order), then rank `r` out of
//! `n` falls into bucket `floor((r - 1) * 5 / n)`. For the 77 community areas
//! this yields bucket sizes 16, 15, 16, 15, 15.

use crate::types::{AreaId, BucketAssignment, Rgb};

pub const BUCKET_COUNT: usize = 5;

/// Five colors interpolated in RGB space, index 0 lightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gradient {
    colors: [Rgb; BUCKET_COUNT],
}

impl Gradient {
    pub fn linear(start: Rgb, end: Rgb) -> Self {
        let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        let mut colors = [start; BUCKET_COUNT];
        for (i, color) in colors.iter_mut().enumerate() {
            let t = i as f64 / (BUCKET_COUNT - 1) as f64;
            *color = Rgb(
                lerp(start.0, end.0, t),
                lerp(start.1, end.1, t),
                lerp(start.2, end.2, t),
            );
        }
        Self { colors }
    }

    pub fn color(&self, bucket: usize) -> Rgb {
        self.colors[bucket.min(BUCKET_COUNT - 1)]
    }

    pub fn colors(&self) -> &[Rgb; BUCKET_COUNT] {
        &self.colors
    }
}

impl Default for Gradient {
    fn default() -> Self {
        Self::linear(Rgb(0xCC, 0xCC, 0xCC), Rgb(0x66, 0x00, 0x66))
    }
}

/// 1-based ordinal ranks; equal values are ranked in input order.
pub fn ranks(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    // stable sort keeps input order among ties
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0; values.len()];
    for (position, &idx) in order.iter().enumerate() {
        ranks[idx] = position + 1;
    }
    ranks
}

pub fn bucket_for_rank(rank: usize, n: usize) -> usize {
    debug_assert!(rank >= 1 && rank <= n);
    (rank - 1) * BUCKET_COUNT / n
}

/// Buckets one indicator column. Output is in input order.
pub fn bucketize(
    indicator: &str,
    values: &[(AreaId, f64)],
    gradient: &Gradient,
) -> Vec<BucketAssignment> {
    let column: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    let n = column.len();

    values
        .iter()
        .zip(ranks(&column))
        .map(|((area_id, _), rank)| {
            let bucket = bucket_for_rank(rank, n);
            BucketAssignment {
                area_id: *area_id,
                indicator: indicator.to_string(),
                bucket,
                color: gradient.color(bucket),
            }
        })
        .collect()
}
