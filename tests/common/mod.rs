#![allow(dead_code)]

use geo::MultiPolygon;
use naturwb::geometry::parse_polygon_wkt;
use naturwb::model::{GenId, LanuId, NatId, SimId, SimulationInfo, SimulationResult};
use naturwb::store::{InMemoryStore, LookupPolygon, NaturalRegion, SimulationPolygon};

pub fn rect_wkt(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
    format!("POLYGON(({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))")
}

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    parse_polygon_wkt(&rect_wkt(x0, y0, x1, y1)).unwrap()
}

pub fn sim_polygon(sim_id: SimId, gen_id: GenId, geometry: MultiPolygon<f64>) -> SimulationPolygon {
    SimulationPolygon {
        sim_id,
        gen_id,
        geometry,
        color: "#8c510a".into(),
        legend_text: format!("Bodengruppe {gen_id}"),
        legend_short: format!("BG{gen_id}"),
        info: SimulationInfo::default(),
    }
}

pub fn region(nat_id: NatId, geometry: MultiPolygon<f64>) -> NaturalRegion {
    NaturalRegion {
        nat_id,
        name: format!("Naturraum {nat_id}"),
        geometry,
    }
}

/// A 10 x 10 m land-use observation with its lower left corner at (x, y).
pub fn lookup(gen_id: GenId, nat_id: NatId, lanu_id: LanuId, x: f64, y: f64) -> LookupPolygon {
    LookupPolygon {
        gen_id,
        nat_id,
        lanu_id,
        lanu_name: format!("lanu {lanu_id}"),
        is_urban: false,
        area: 100.0,
        geometry: rect(x, y, x + 10.0, y + 10.0),
    }
}

pub fn result(
    sim_id: SimId,
    gen_id: GenId,
    bf_id: i64,
    lanu_id: LanuId,
    n: f64,
    et: f64,
    bfid_area: f64,
) -> SimulationResult {
    let surplus = n - et;
    SimulationResult {
        sim_id,
        gen_id,
        bf_id,
        lanu_id,
        n,
        kap_a: 0.0,
        et,
        pet: et + 80.0,
        oa: surplus * 0.1,
        za: surplus * 0.2,
        tp: surplus * 0.7,
        za_gwnah_flag: 0.0,
        bfid_area,
    }
}

/// One simulation polygon of soil group 10 in natural region 7, 1 x 1 km,
/// with two soil profiles (60/40) under land-use 3.
pub fn single_polygon_store() -> InMemoryStore {
    InMemoryStore::new()
        .with_simulation_polygon(sim_polygon(1, 10, rect(0.0, 0.0, 1000.0, 1000.0)))
        .with_natural_region(region(7, rect(-10_000.0, -10_000.0, 10_000.0, 10_000.0)))
        .with_lookup_polygon(lookup(10, 7, 3, 0.0, 0.0))
        .with_results([
            result(1, 10, 100, 3, 800.0, 500.0, 60.0),
            result(1, 10, 101, 3, 800.0, 550.0, 40.0),
        ])
}

/// Soil group 10 on the western 70 % and soil group 20 on the eastern 30 %
/// of a 1 x 1 km square, both in natural region 7.
///
/// Soil group 20 has two simulated land-uses (3 and 4) but no observation in
/// region 7; `gen20_lookups` adds observations for it elsewhere.
pub fn two_group_store(gen20_lookups: Vec<LookupPolygon>) -> InMemoryStore {
    let mut store = InMemoryStore::new()
        .with_simulation_polygon(sim_polygon(1, 10, rect(0.0, 0.0, 700.0, 1000.0)))
        .with_simulation_polygon(sim_polygon(2, 20, rect(700.0, 0.0, 1000.0, 1000.0)))
        .with_natural_region(region(7, rect(-10_000.0, -10_000.0, 10_000.0, 10_000.0)))
        .with_lookup_polygon(lookup(10, 7, 3, 0.0, 0.0))
        .with_results([
            result(1, 10, 100, 3, 700.0, 450.0, 100.0),
            result(2, 20, 200, 3, 1000.0, 520.0, 100.0),
            result(2, 20, 200, 4, 1000.0, 580.0, 100.0),
        ]);
    for lookup in gen20_lookups {
        store = store.with_lookup_polygon(lookup);
    }
    store
}
