mod common;

use approx::assert_relative_eq;
use naturwb::coefficients::LanduseSource;
use naturwb::frames::{self, Level};
use naturwb::model::SimulationInfo;
use naturwb::{run_query, run_query_wkt, EngineConfig, InMemoryStore, MessageCatalog, NaturwbError};
use polars::prelude::ChunkAgg;

use common::*;

fn config() -> EngineConfig {
    EngineConfig::builtin().unwrap()
}

fn catalog() -> MessageCatalog {
    MessageCatalog::builtin().unwrap()
}

#[test]
fn single_polygon_reference_is_the_profile_weighted_result() {
    let store = single_polygon_store();
    let outcome = run_query(&store, &rect(0.0, 0.0, 500.0, 500.0), &config(), &catalog()).unwrap();

    let agg = &outcome.aggregation;
    assert_eq!(agg.soil_group.coefficients.get(&10), Some(&1.0));
    assert_eq!(agg.polygon.coefficients.get(&(10, 1)), Some(&1.0));
    assert_eq!(agg.region.coefficients.get(&(1, 7)), Some(&1.0));
    assert_eq!(agg.landuse.coefficients.get(1, 10, 7, 3).unwrap().coef, 1.0);

    let reference = outcome.reference();
    assert_relative_eq!(reference.balance.n, 800.0, epsilon = 1e-9);
    assert_relative_eq!(reference.balance.et, 0.6 * 500.0 + 0.4 * 550.0, epsilon = 1e-9);
    assert_relative_eq!(reference.shares.sum(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(agg.chain_total, 1.0, epsilon = 1e-5);

    assert!(outcome.resolution.missing().is_empty());
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn two_soil_groups_are_weighted_by_area() {
    let store = two_group_store(vec![
        lookup(20, 7, 3, 800.0, 0.0),
        lookup(20, 7, 4, 820.0, 0.0),
    ]);
    let outcome =
        run_query(&store, &rect(0.0, 0.0, 1000.0, 1000.0), &config(), &catalog()).unwrap();

    let coef_gen = &outcome.aggregation.soil_group.coefficients;
    assert_relative_eq!(*coef_gen.get(&10).unwrap(), 0.7, epsilon = 1e-9);
    assert_relative_eq!(*coef_gen.get(&20).unwrap(), 0.3, epsilon = 1e-9);

    let balance = outcome.reference().balance;
    assert_relative_eq!(balance.n, 0.7 * 700.0 + 0.3 * 1000.0, epsilon = 1e-9);
    assert_relative_eq!(balance.et, 0.7 * 450.0 + 0.3 * 550.0, epsilon = 1e-9);

    let dist = outcome.landuse_distribution();
    assert_relative_eq!(dist[&3], 0.7 + 0.15, epsilon = 1e-9);
    assert_relative_eq!(dist[&4], 0.15, epsilon = 1e-9);
}

#[test]
fn missing_landuse_resolves_at_the_first_radius_with_observations() {
    // 49 km east of the input: outside 30 km, inside 60 km.
    let store = two_group_store(vec![
        lookup(20, 9, 3, 50_000.0, 0.0),
        lookup(20, 9, 4, 50_020.0, 0.0),
    ]);
    let outcome =
        run_query(&store, &rect(0.0, 0.0, 1000.0, 1000.0), &config(), &catalog()).unwrap();

    let missing = outcome.resolution.missing().get(&(20, 7)).unwrap();
    assert!(missing.resolved);
    assert_eq!(missing.radius_km, Some(60.0));

    let coefs = &outcome.aggregation.landuse.coefficients;
    for lanu in [3, 4] {
        let coef = coefs.get(2, 20, 7, lanu).unwrap();
        assert_relative_eq!(coef.coef, 0.5, epsilon = 1e-12);
        assert_eq!(coef.source, LanduseSource::Resolved { radius_km: 60.0 });
    }
    assert_relative_eq!(outcome.aggregation.chain_total, 1.0, epsilon = 1e-5);

    let msg = outcome.diagnostics.get("lanu_flag.1").unwrap();
    assert!(msg.text.contains("30.0 %"));
    assert!(msg.text.contains("60 km"));
}

#[test]
fn unresolved_soil_group_falls_back_to_flat_weights() {
    let store = two_group_store(vec![]);
    let outcome =
        run_query(&store, &rect(0.0, 0.0, 1000.0, 1000.0), &config(), &catalog()).unwrap();

    let missing = outcome.resolution.missing().get(&(20, 7)).unwrap();
    assert!(!missing.resolved);
    assert_eq!(missing.radius_km, None);

    let coef = outcome.aggregation.landuse.coefficients.get(2, 20, 7, 4).unwrap();
    assert_eq!(coef.source, LanduseSource::Flat);
    assert_relative_eq!(coef.coef, 0.5, epsilon = 1e-12);
    assert_relative_eq!(outcome.reference().balance.n, 790.0, epsilon = 1e-9);

    let msg = outcome.diagnostics.get("lanu_flag.1").unwrap();
    assert!(msg.text.contains("100.0 %"));
}

#[test]
fn flat_weights_follow_the_landuses_of_each_polygon() {
    // Polygon 3 shares soil group 20 with polygon 2 but only simulated land-use 3.
    let store = two_group_store(vec![])
        .with_simulation_polygon(sim_polygon(3, 20, rect(1000.0, 0.0, 1300.0, 1000.0)))
        .with_results([result(3, 20, 300, 3, 900.0, 500.0, 100.0)]);
    let outcome =
        run_query(&store, &rect(0.0, 0.0, 1300.0, 1000.0), &config(), &catalog()).unwrap();

    let coefs = &outcome.aggregation.landuse.coefficients;
    assert_relative_eq!(coefs.get(2, 20, 7, 4).unwrap().coef, 0.5, epsilon = 1e-12);
    assert_relative_eq!(coefs.get(3, 20, 7, 3).unwrap().coef, 1.0, epsilon = 1e-12);
    assert!(coefs.get(3, 20, 7, 4).is_none());

    let region = &outcome.aggregation.region.values;
    assert_relative_eq!(region.get(&(3, 20)).unwrap().n, 900.0, epsilon = 1e-9);
    assert_relative_eq!(
        outcome.reference().balance.n,
        (700.0 * 700.0 + 600.0 * 950.0) / 1300.0,
        epsilon = 1e-9
    );
    assert_relative_eq!(outcome.aggregation.chain_total, 1.0, epsilon = 1e-9);

    let frame = frames::landuse_coefficients(coefs).unwrap();
    assert_eq!(frame.height(), 4);

    let msg = outcome.diagnostics.get("lanu_flag.1").unwrap();
    assert!(msg.text.contains("46.2 %"));
}

#[test]
fn forced_landuse_renormalizes_profiles_and_reports_flags() {
    // Land-use 0 exists only on the rock profile (30 %), land-use 3 on the other 70 %.
    let mut polygon = sim_polygon(1, 10, rect(0.0, 0.0, 1000.0, 1000.0));
    polygon.info = SimulationInfo {
        sim_id: 1,
        lanu_flag: 2,
        buek_flag: 2,
        wea_flag_n: 2,
        wea_dist_n: Some(1200.0),
        sl_flag: 2,
        sl_dist: Some(350.0),
        sun_flag: 1,
        ..SimulationInfo::default()
    };
    let store = InMemoryStore::new()
        .with_simulation_polygon(polygon)
        .with_natural_region(region(7, rect(-10_000.0, -10_000.0, 10_000.0, 10_000.0)))
        .with_lookup_polygon(lookup(10, 7, 0, 0.0, 0.0))
        .with_lookup_polygon(lookup(10, 7, 3, 20.0, 0.0))
        .with_results([
            result(1, 10, 100, 0, 800.0, 300.0, 30.0),
            result(1, 10, 101, 3, 800.0, 500.0, 50.0),
            result(1, 10, 102, 3, 800.0, 600.0, 20.0),
        ]);
    let outcome = run_query(&store, &rect(0.0, 0.0, 1000.0, 1000.0), &config(), &catalog()).unwrap();

    let profile = &outcome.aggregation.profile;
    assert!(profile.renormalized);
    assert_relative_eq!(*profile.coefficients.get(&(1, 10, 100, 0)).unwrap(), 1.0, epsilon = 1e-12);

    let balance = outcome.reference().balance;
    assert_relative_eq!(balance.n, 800.0, epsilon = 1e-9);
    let et_lanu_3 = (50.0 * 500.0 + 20.0 * 600.0) / 70.0;
    assert_relative_eq!(balance.et, 0.5 * 300.0 + 0.5 * et_lanu_3, epsilon = 1e-9);
    assert_relative_eq!(outcome.aggregation.chain_total, 1.0, epsilon = 1e-9);

    let diagnostics = &outcome.diagnostics;
    assert!(diagnostics.get("lanu_flag.2").unwrap().text.contains("100.0 %"));
    assert!(diagnostics.get("buek_flag").unwrap().text.contains("benachbarte Bodengruppe"));
    assert!(diagnostics.get("wea_flag_n").unwrap().text.contains("maximal 1200 m"));
    assert!(diagnostics.get("sl_flag").unwrap().text.contains("mittlere Entfernung 350 m"));
    assert!(diagnostics.get("sun_flag").unwrap().text.contains("Mittel der Region"));
    assert!(diagnostics.get("wea_flag").is_none());
}

#[test]
fn identical_queries_give_identical_references() {
    let store = two_group_store(vec![lookup(20, 9, 3, 50_000.0, 0.0)]);
    let input = rect(100.0, 100.0, 900.0, 900.0);
    let first = run_query(&store, &input, &config(), &catalog()).unwrap();
    let second = run_query(&store, &input, &config(), &catalog()).unwrap();
    assert_eq!(first.reference(), second.reference());
    assert_eq!(first.chain_rows(), second.chain_rows());
}

#[test]
fn uncovered_landuse_breaks_the_precipitation_check() {
    // Land-use 4 holds half of the reference but was never simulated.
    let store = single_polygon_store().with_lookup_polygon(lookup(10, 7, 4, 20.0, 0.0));
    let err = run_query(&store, &rect(0.0, 0.0, 500.0, 500.0), &config(), &catalog())
        .err()
        .unwrap();
    assert!(matches!(err, NaturwbError::Consistency(_)));
}

#[test]
fn input_outside_the_reference_data_is_an_input_error() {
    let store = single_polygon_store();
    let err = run_query(
        &store,
        &rect(50_000.0, 50_000.0, 51_000.0, 51_000.0),
        &config(),
        &catalog(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, NaturwbError::EmptyIntersection));
    assert!(!err.is_fatal());
}

#[test]
fn non_polygon_wkt_is_rejected() {
    let store = single_polygon_store();
    let err = run_query_wkt(&store, "LINESTRING(0 0, 10 10)", &config(), &catalog())
        .err()
        .unwrap();
    assert!(matches!(err, NaturwbError::InvalidGeometry(_)));
}

#[test]
fn partially_covered_input_reports_the_undefined_share() {
    let store = single_polygon_store();
    // Half of the input lies east of the simulation polygon.
    let outcome = run_query_wkt(
        &store,
        &rect_wkt(500.0, 0.0, 1500.0, 1000.0),
        &config(),
        &catalog(),
    )
    .unwrap();
    let msg = outcome.diagnostics.get("area_undef.part").unwrap();
    assert!(msg.text.contains("50.0 %"));
    assert!(outcome.diagnostics.to_text().starts_with("- "));
}

#[test]
fn audit_frames_match_the_levels() {
    let store = two_group_store(vec![
        lookup(20, 7, 3, 800.0, 0.0),
        lookup(20, 7, 4, 820.0, 0.0),
    ]);
    let outcome =
        run_query(&store, &rect(0.0, 0.0, 1000.0, 1000.0), &config(), &catalog()).unwrap();

    let chain = frames::coefficient_chain(&outcome.chain_rows()).unwrap();
    assert_eq!(chain.height(), 3);
    let total: f64 = chain.column("product").unwrap().f64().unwrap().sum().unwrap();
    assert_relative_eq!(total, 1.0, epsilon = 1e-9);

    let profiles = frames::level_values(&outcome.aggregation, Level::Profile).unwrap();
    assert_eq!(profiles.height(), 3);
    let by_gen = frames::level_values(&outcome.aggregation, Level::Polygon).unwrap();
    assert_eq!(by_gen.height(), 2);

    let clip = frames::clip(&outcome.clip).unwrap();
    assert_eq!(clip.height(), 2);
    let breakdown = frames::results_by_soil_group(&outcome.results_by_soil_group()).unwrap();
    assert_eq!(breakdown.height(), 2);
    assert!(breakdown.column("leg_tkle_kurz").is_ok());
}
