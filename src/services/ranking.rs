// src/services/ranking.rs
use crate::models::ImageRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Popularity score in `0..=5`: sales saturate at 4, earnings above 200 add one.
pub fn rating(sales_count: f64, total_earnings: f64) -> u8 {
    let sales = if sales_count.is_finite() {
        sales_count.floor().clamp(0.0, 4.0) as u8
    } else if sales_count > 0.0 {
        4
    } else {
        0
    };
    sales + u8::from(total_earnings > 200.0)
}

/// How a record list is ordered before review.
///
/// All strategies sort stably, so records that compare equal keep their
/// input order, and duplicates collapse onto their first (best) occurrence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Descending by [`rating`].
    #[default]
    Rating,
    /// Descending by raw earnings, then sales count.
    Earnings,
    /// Keep intake order, only deduplicate.
    InputOrder,
}

impl RankingStrategy {
    pub fn rank(&self, records: Vec<ImageRecord>) -> Vec<ImageRecord> {
        let mut records: Vec<ImageRecord> = records
            .into_iter()
            .map(|mut r| {
                r.rating = rating(r.sales_count, r.total_earnings);
                r
            })
            .collect();

        match self {
            RankingStrategy::Rating => records.sort_by(|a, b| b.rating.cmp(&a.rating)),
            RankingStrategy::Earnings => records.sort_by(|a, b| {
                descending(a.total_earnings, b.total_earnings)
                    .then_with(|| descending(a.sales_count, b.sales_count))
            }),
            RankingStrategy::InputOrder => {}
        }

        dedup_by_id(records)
    }
}

// NaN sorts last.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

fn dedup_by_id(records: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}
