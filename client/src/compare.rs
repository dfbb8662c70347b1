//! Competitor comparison view-model.
//!
//! Pure derivations over already-fetched data: the ordered, filtered
//! candidate list for the detail screen plus aggregate price statistics over
//! the confirmed competitors. No I/O, no shared state.

use std::collections::HashSet;

use crate::model::{Candidate, Competitor};

/// Price ceiling filter: when enabled, candidates priced above
/// `own_price * (1 + max_over_percent/100)` are dropped.
#[derive(Debug, Clone, Copy)]
pub struct PriceFilter {
    pub enabled: bool,
    /// Clamped to 0..=50 by the UI.
    pub max_over_percent: u8,
}

impl Default for PriceFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            max_over_percent: 0,
        }
    }
}

/// Per-product suppression set chosen by the user.
#[derive(Debug, Clone, Copy)]
pub struct HiddenFilter<'a> {
    pub apply: bool,
    pub ids: &'a HashSet<u64>,
}

/// How the seller's price relates to the cheapest confirmed competitor.
/// The denominator is asymmetric on purpose: "how much cheaper am I" is
/// relative to the seller's own price, "how much pricier am I" is relative
/// to the competitor's price. Observed behavior, kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDelta {
    /// Seller is cheaper by this rounded percentage of the seller's price.
    Cheaper(u32),
    /// Seller is pricier by this rounded percentage of the competitor's price.
    Pricier(u32),
}

#[derive(Debug, Clone, Default)]
pub struct CompareStats {
    /// Cheapest confirmed competitor with a positive price; first occurrence
    /// wins a tie. Absent when no competitor has a usable price.
    pub lowest: Option<Competitor>,
    /// Rounded mean over positive-priced competitors; 0 when there are none.
    pub average: u64,
    /// Absent when there is no `lowest` or prices are exactly equal.
    pub delta: Option<PriceDelta>,
}

/// Order and filter the candidate list for display: price ceiling, hidden-id
/// suppression, then a stable ascending price sort with already-added
/// competitors sinking to the end of each price tie-group so that cheap,
/// not-yet-added candidates surface first.
pub fn filter_candidates(
    candidates: &[Candidate],
    own_price: u64,
    filter: PriceFilter,
    hidden: HiddenFilter<'_>,
) -> Vec<Candidate> {
    let ceiling = own_price as f64 * (1.0 + f64::from(filter.max_over_percent) / 100.0);
    let mut out: Vec<Candidate> = candidates
        .iter()
        .filter(|c| !filter.enabled || (c.price as f64) <= ceiling)
        .filter(|c| !hidden.apply || !hidden.ids.contains(&c.id))
        .cloned()
        .collect();
    // sort_by is stable: equal (price, is_competitor) keys keep input order
    out.sort_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then(a.is_competitor.cmp(&b.is_competitor))
    });
    out
}

/// Aggregate statistics over the confirmed competitors. Records without a
/// strictly positive price are excluded, never fatal.
pub fn competitor_stats(confirmed: &[Competitor], own_price: u64) -> CompareStats {
    let priced: Vec<&Competitor> = confirmed.iter().filter(|c| c.price > 0).collect();
    if priced.is_empty() {
        return CompareStats::default();
    }

    let mut lowest = priced[0];
    for c in &priced[1..] {
        if c.price < lowest.price {
            lowest = c;
        }
    }

    let sum: u64 = priced.iter().map(|c| c.price).sum();
    let average = (sum as f64 / priced.len() as f64).round() as u64;

    let delta = if own_price < lowest.price {
        let diff = lowest.price - own_price;
        Some(PriceDelta::Cheaper(
            (diff as f64 / own_price as f64 * 100.0).round() as u32,
        ))
    } else if own_price > lowest.price {
        let diff = own_price - lowest.price;
        Some(PriceDelta::Pricier(
            (diff as f64 / lowest.price as f64 * 100.0).round() as u32,
        ))
    } else {
        None
    };

    CompareStats {
        lowest: Some(lowest.clone()),
        average,
        delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: u64, price: u64, is_competitor: bool) -> Candidate {
        Candidate {
            id,
            title: format!("candidate {id}"),
            price,
            photo: String::new(),
            listing_url: String::new(),
            vendor_id: 1,
            is_competitor,
            busy: false,
        }
    }

    fn comp(id: u64, price: u64) -> Competitor {
        Competitor {
            id,
            title: format!("competitor {id}"),
            price,
            photo: String::new(),
            vendor_id: 1,
            listing_url: String::new(),
        }
    }

    fn no_hidden() -> HiddenFilter<'static> {
        static EMPTY: std::sync::OnceLock<HashSet<u64>> = std::sync::OnceLock::new();
        HiddenFilter {
            apply: false,
            ids: EMPTY.get_or_init(HashSet::new),
        }
    }

    #[test]
    fn ceiling_never_admits_candidates_above_allowance() {
        let candidates = vec![
            cand(1, 80_000, false),
            cand(2, 120_000, false),
            cand(3, 60_000, false),
            cand(4, 100_000, false),
            cand(5, 90_000, false),
        ];
        let filter = PriceFilter {
            enabled: true,
            max_over_percent: 10,
        };
        let out = filter_candidates(&candidates, 100_000, filter, no_hidden());
        // ceiling 110k drops the 120k item, rest ascend
        let prices: Vec<u64> = out.iter().map(|c| c.price).collect();
        assert_eq!(prices, vec![60_000, 80_000, 90_000, 100_000]);
        assert!(out.iter().all(|c| c.price as f64 <= 110_000.0));
    }

    #[test]
    fn ceiling_is_inclusive_at_exactly_the_allowance() {
        let candidates = vec![cand(1, 110_000, false), cand(2, 110_001, false)];
        let filter = PriceFilter {
            enabled: true,
            max_over_percent: 10,
        };
        let out = filter_candidates(&candidates, 100_000, filter, no_hidden());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 1);
    }

    #[test]
    fn disabled_filter_admits_everything() {
        let candidates = vec![cand(1, 1_000_000, false), cand(2, 1, false)];
        let out = filter_candidates(&candidates, 100, PriceFilter::default(), no_hidden());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn hidden_filter_removes_exactly_the_listed_ids() {
        let candidates = vec![cand(1, 50, false), cand(2, 10, true), cand(3, 70, false)];
        let ids: HashSet<u64> = [2].into_iter().collect();
        let applied = filter_candidates(
            &candidates,
            100,
            PriceFilter::default(),
            HiddenFilter { apply: true, ids: &ids },
        );
        assert_eq!(applied.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 3]);

        // hidden id removed regardless of price or competitor flag; retained
        // when apply is off
        let not_applied = filter_candidates(
            &candidates,
            100,
            PriceFilter::default(),
            HiddenFilter { apply: false, ids: &ids },
        );
        assert_eq!(not_applied.len(), 3);
    }

    #[test]
    fn sort_is_stable_ascending_with_competitors_after_price_ties() {
        let candidates = vec![
            cand(1, 500, true),
            cand(2, 500, false),
            cand(3, 300, false),
            cand(4, 500, false),
            cand(5, 500, true),
        ];
        let out = filter_candidates(&candidates, 1_000, PriceFilter::default(), no_hidden());
        // 300 first; within the 500 tie-group non-competitors keep input
        // order (2, 4), competitors follow in input order (1, 5)
        assert_eq!(out.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3, 2, 4, 1, 5]);
    }

    #[test]
    fn stats_empty_when_no_competitor_has_a_price() {
        let stats = competitor_stats(&[comp(1, 0), comp(2, 0)], 100);
        assert!(stats.lowest.is_none());
        assert_eq!(stats.average, 0);
        assert!(stats.delta.is_none());

        let stats = competitor_stats(&[], 100);
        assert_eq!(stats.average, 0);
    }

    #[test]
    fn stats_scenario_seller_pricier() {
        // own 100k vs [90k, 110k, 90k]: lowest is the first 90k, average
        // rounds to 96,667, delta is +11% relative to the competitor price
        let confirmed = vec![comp(1, 90_000), comp(2, 110_000), comp(3, 90_000)];
        let stats = competitor_stats(&confirmed, 100_000);
        let lowest = stats.lowest.expect("lowest present");
        assert_eq!(lowest.id, 1);
        assert_eq!(lowest.price, 90_000);
        assert_eq!(stats.average, 96_667);
        assert_eq!(stats.delta, Some(PriceDelta::Pricier(11)));
    }

    #[test]
    fn stats_seller_cheaper_uses_own_price_denominator() {
        let confirmed = vec![comp(1, 120_000)];
        let stats = competitor_stats(&confirmed, 100_000);
        // 20,000 / 100,000 = 20%, relative to the seller's price
        assert_eq!(stats.delta, Some(PriceDelta::Cheaper(20)));
    }

    #[test]
    fn stats_equal_prices_have_no_delta() {
        let stats = competitor_stats(&[comp(1, 100_000)], 100_000);
        assert!(stats.lowest.is_some());
        assert!(stats.delta.is_none());
    }

    #[test]
    fn unpriced_records_are_excluded_from_aggregates() {
        let confirmed = vec![comp(1, 0), comp(2, 80_000), comp(3, 0), comp(4, 120_000)];
        let stats = competitor_stats(&confirmed, 100_000);
        assert_eq!(stats.lowest.as_ref().map(|c| c.id), Some(2));
        assert_eq!(stats.average, 100_000);
        assert_eq!(stats.delta, Some(PriceDelta::Pricier(25)));
    }
}
