//! Pick-winner-per-group resolution over candidate rows.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ForecastCandidate, ForecastQuery};

/// Precedence between two candidates for the same (site, interval).
///
/// Greater wins: later `forecast.timestamp_utc`, then later
/// `forecast.created_utc`, then later value `created_utc`, then the smaller
/// `forecast_value_uuid` so the choice is total.
pub fn precedence(a: &ForecastCandidate, b: &ForecastCandidate) -> Ordering {
    a.forecast_timestamp_utc
        .cmp(&b.forecast_timestamp_utc)
        .then_with(|| a.forecast_created_utc.cmp(&b.forecast_created_utc))
        .then_with(|| a.created_utc.cmp(&b.created_utc))
        .then_with(|| b.forecast_value_uuid.cmp(&a.forecast_value_uuid))
}

/// Keep the candidates that pass every filter of `query`; works over owned or borrowed rows
pub fn eligible<'q, I, C>(candidates: I, query: &'q ForecastQuery) -> impl Iterator<Item = C> + 'q
where
    I: IntoIterator<Item = C>,
    I::IntoIter: 'q,
    C: Borrow<ForecastCandidate>,
{
    candidates
        .into_iter()
        .filter(move |c| query.accepts(<C as Borrow<ForecastCandidate>>::borrow(c)))
}

/// One winning candidate per (site, start_utc), grouped by site and ordered by start
pub fn select_latest(
    candidates: Vec<ForecastCandidate>,
    query: &ForecastQuery,
) -> BTreeMap<Uuid, Vec<ForecastCandidate>> {
    let mut winners: BTreeMap<(Uuid, DateTime<Utc>), ForecastCandidate> = BTreeMap::new();

    for candidate in eligible(candidates, query) {
        let key = (candidate.site_uuid, candidate.start_utc);
        match winners.get(&key) {
            Some(current) if precedence(&candidate, current) != Ordering::Greater => {}
            _ => {
                winners.insert(key, candidate);
            }
        }
    }

    let mut by_site: BTreeMap<Uuid, Vec<ForecastCandidate>> = BTreeMap::new();
    // key order is (site, start) so each site's list comes out sorted
    for ((site_uuid, _), candidate) in winners {
        by_site.entry(site_uuid).or_default().push(candidate);
    }
    by_site
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{forecast::horizon_minutes, DayAheadCutoff};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    }

    fn candidate(
        site: Uuid,
        forecast_ts: DateTime<Utc>,
        created: DateTime<Utc>,
        start: DateTime<Utc>,
        power: f64,
    ) -> ForecastCandidate {
        ForecastCandidate {
            site_uuid: site,
            forecast_uuid: Uuid::new_v4(),
            forecast_timestamp_utc: forecast_ts,
            forecast_created_utc: created,
            forecast_value_uuid: Uuid::new_v4(),
            start_utc: start,
            end_utc: start + Duration::minutes(30),
            forecast_power_kw: power,
            horizon_minutes: horizon_minutes(forecast_ts, start),
            created_utc: created,
            ml_model_name: None,
            probabilistic_values: None,
        }
    }

    #[test]
    fn test_most_recent_timestamp_wins() {
        let site = Uuid::new_v4();
        let target = t0() + Duration::hours(2);
        let older = candidate(site, t0(), t0() + Duration::minutes(30), target, 1.0);
        let newer = candidate(site, t0() + Duration::minutes(10), t0() + Duration::minutes(11), target, 2.0);

        let out = select_latest(vec![newer.clone(), older], &ForecastQuery::new(t0()));
        assert_eq!(out[&site], vec![newer]);
    }

    #[test]
    fn test_created_utc_breaks_timestamp_tie() {
        let site = Uuid::new_v4();
        let target = t0() + Duration::hours(1);
        let first = candidate(site, t0(), t0() + Duration::minutes(1), target, 1.0);
        let rewrite = candidate(site, t0(), t0() + Duration::minutes(5), target, 3.0);

        let out = select_latest(vec![rewrite.clone(), first], &ForecastQuery::new(t0()));
        assert_eq!(out[&site][0].forecast_power_kw, 3.0);
    }

    #[test]
    fn test_intervals_resolved_independently_and_sorted() {
        let site = Uuid::new_v4();
        let f1 = candidate(site, t0(), t0(), t0() + Duration::hours(1), 2.0);
        let f2 = candidate(
            site,
            t0() + Duration::minutes(10),
            t0() + Duration::minutes(10),
            t0() + Duration::hours(2),
            4.0,
        );

        let query = ForecastQuery::new(t0() + Duration::hours(1));
        let out = select_latest(vec![f2, f1], &query);
        let powers: Vec<f64> = out[&site].iter().map(|c| c.forecast_power_kw).collect();
        assert_eq!(powers, vec![2.0, 4.0]);
    }

    #[test]
    fn test_horizon_filter_prefers_earlier_forecast() {
        let site = Uuid::new_v4();
        let target = t0() + Duration::hours(3);
        let early = candidate(site, t0(), t0(), target, 1.0);
        let late = candidate(site, t0() + Duration::hours(2), t0() + Duration::hours(2), target, 2.0);

        let query = ForecastQuery::new(t0()).with_horizon_minutes(120);
        let out = select_latest(vec![early.clone(), late], &query);
        assert_eq!(out[&site], vec![early]);
    }

    #[test]
    fn test_day_ahead_excludes_exact_cutoff() {
        let site = Uuid::new_v4();
        let target = Utc.with_ymd_and_hms(2000, 1, 3, 0, 0, 0).unwrap();
        let at_cutoff = Utc.with_ymd_and_hms(2000, 1, 2, 9, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2000, 1, 2, 8, 0, 0).unwrap();
        let fresh = candidate(site, at_cutoff, at_cutoff, target, 5.0);
        let stale = candidate(site, before, before, target, 1.0);

        let query = ForecastQuery::new(target).with_day_ahead(DayAheadCutoff::new(9));
        let out = select_latest(vec![fresh, stale.clone()], &query);
        assert_eq!(out[&site], vec![stale]);
    }

    fn arb_candidates() -> impl Strategy<Value = Vec<ForecastCandidate>> {
        let sites = [Uuid::from_u128(1), Uuid::from_u128(2)];
        prop::collection::vec((0usize..2, 0i64..12, 0i64..6, 0i64..8, 0f64..10.0), 0..40).prop_map(
            move |rows| {
                rows.into_iter()
                    .map(|(site, run, delay, slot, power)| {
                        let ts = t0() + Duration::minutes(run * 30);
                        let start = t0() + Duration::hours(slot);
                        candidate(sites[site], ts, ts + Duration::minutes(delay), start, power)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_one_value_per_interval(rows in arb_candidates()) {
            let out = select_latest(rows, &ForecastQuery::new(t0()));
            for values in out.values() {
                for pair in values.windows(2) {
                    prop_assert!(pair[0].start_utc < pair[1].start_utc);
                }
            }
        }

        #[test]
        fn prop_winner_dominates_eligible_rivals(rows in arb_candidates(), horizon in 0i32..240) {
            let query = ForecastQuery::new(t0()).with_horizon_minutes(horizon);
            let out = select_latest(rows.clone(), &query);
            for rival in eligible(&rows, &query) {
                let winner = out[&rival.site_uuid]
                    .iter()
                    .find(|w| w.start_utc == rival.start_utc)
                    .expect("every eligible interval has a winner");
                prop_assert_ne!(precedence(winner, rival), Ordering::Less);
            }
        }

        #[test]
        fn prop_raising_horizon_never_adds_candidates(
            rows in arb_candidates(),
            low in 0i32..300,
            step in 0i32..300,
        ) {
            let loose = ForecastQuery::new(t0()).with_horizon_minutes(low);
            let strict = ForecastQuery::new(t0()).with_horizon_minutes(low + step);
            let loose_ids: Vec<Uuid> = eligible(&rows, &loose).map(|c| c.forecast_value_uuid).collect();
            for c in eligible(&rows, &strict) {
                prop_assert!(loose_ids.contains(&c.forecast_value_uuid));
            }
        }

        #[test]
        fn prop_selection_is_order_independent(rows in arb_candidates()) {
            let query = ForecastQuery::new(t0());
            let mut reversed = rows.clone();
            reversed.reverse();
            prop_assert_eq!(select_latest(rows, &query), select_latest(reversed, &query));
        }
    }
}
