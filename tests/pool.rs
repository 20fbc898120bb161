mod common;

use approx::assert_relative_eq;
use chrono::{Duration, TimeZone, Utc};
use naturwb::{run_query, EngineConfig, MessageCatalog, NaturwbError, QueryOutcome, QueryPool};

use common::*;

fn outcome(x0: f64) -> QueryOutcome {
    let store = two_group_store(vec![
        lookup(20, 7, 3, 800.0, 0.0),
        lookup(20, 7, 4, 820.0, 0.0),
    ]);
    run_query(
        &store,
        &rect(x0, 0.0, 1000.0, 1000.0),
        &EngineConfig::default(),
        &MessageCatalog::builtin().unwrap(),
    )
    .unwrap()
}

#[test]
fn pool_keeps_the_newest_queries() {
    let mut pool = QueryPool::new(2);
    let first = pool.push(outcome(0.0));
    let second = pool.push(outcome(300.0));
    let third = pool.push(outcome(600.0));

    assert_eq!(pool.len(), 2);
    assert!(pool.get(&first).is_none());
    assert!(pool.get(&second).is_some());
    assert!(pool.get(&third).is_some());
}

#[test]
fn old_queries_expire() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut pool = QueryPool::new(20);
    pool.push_at(outcome(0.0), start);
    pool.push_at(outcome(300.0), start + Duration::minutes(90));

    let dropped = pool.evict_older_than(Duration::hours(2), start + Duration::minutes(150));
    assert_eq!(dropped, 1);
    assert_eq!(pool.len(), 1);
}

#[test]
fn out_of_range_ages_are_rejected() {
    let mut pool = QueryPool::new(20);
    pool.push(outcome(0.0));

    let err = pool.evict_older_than_hours(i64::MAX, Utc::now()).unwrap_err();
    assert!(matches!(err, NaturwbError::InvalidData(_)));
    // Valid, but older than any representable timestamp.
    assert_eq!(pool.evict_older_than_hours(1_000_000_000_000, Utc::now()).unwrap(), 0);
    assert_eq!(pool.evict_older_than_hours(2, Utc::now()).unwrap(), 0);
    assert_eq!(pool.len(), 1);
}

#[test]
fn comparing_frame_has_one_row_per_query() {
    let mut pool = QueryPool::new(20);
    pool.push(outcome(0.0));
    // Only soil group 20 remains east of x = 700.
    pool.push(outcome(700.0));

    let df = pool.comparing_frame().unwrap();
    assert_eq!(df.height(), 2);
    assert!(df.column("lanu_1").is_err());

    let n = df.column("n").unwrap().f64().unwrap();
    assert_relative_eq!(n.get(0).unwrap(), 790.0, epsilon = 1e-9);
    assert_relative_eq!(n.get(1).unwrap(), 1000.0, epsilon = 1e-9);

    let lanu_4 = df.column("lanu_4").unwrap().f64().unwrap();
    assert_relative_eq!(lanu_4.get(0).unwrap(), 0.15, epsilon = 1e-9);
    assert_relative_eq!(lanu_4.get(1).unwrap(), 0.5, epsilon = 1e-9);

    let lanu_0 = df.column("lanu_0").unwrap().f64().unwrap();
    assert_eq!(lanu_0.get(0), Some(0.0));
}
