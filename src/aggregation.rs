//! The five-level roll-up from soil profiles to the NatUrWB reference.
//!
//! Every step takes the previous level, computes a fresh coefficient table,
//! multiplies and sums away one identifier:
//!
//! 1. soil profile (`bf_id`)   → (sim_id, gen_id, lanu_id)
//! 2. land-use (`lanu_id`)     → (sim_id, gen_id, nat_id)
//! 3. natural region (`nat_id`) → (sim_id, gen_id), checked against the raw precipitation
//! 4. simulation polygon       → gen_id
//! 5. soil group               → reference
//!
//! Afterwards the coefficient chain must sum to 1.

use std::collections::BTreeMap;

use crate::chain::{ChainTables, CoefficientChain};
use crate::clip::ClipSet;
use crate::coefficients::{self, LanduseCoefficient, LanduseCoefficients, LanduseKey};
use crate::config::EngineConfig;
use crate::error::{NaturwbError, Result};
use crate::keyed::KeyedTable;
use crate::model::{
    ClipKey, GenId, LanuId, NatId, NaturwbReference, RelativeShares, ResultKey, SimId,
    SimulationInfo, SimulationResult, WaterBalance,
};
use crate::resolver::Resolution;

// ── 1. Soil profile ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ProfileLevel {
    /// Applied share of each soil profile, `bfid_area / 100` after renormalization.
    pub coefficients: KeyedTable<ResultKey, f64>,
    /// Values per (sim_id, gen_id, lanu_id).
    pub values: KeyedTable<(SimId, GenId, LanuId), WaterBalance>,
    /// True if `bfid_area` was renormalized because of a forced land-use.
    pub renormalized: bool,
}

pub fn aggregate_profiles(
    results: &[SimulationResult],
    infos: &[SimulationInfo],
    forced_landuse_flag: u8,
) -> Result<ProfileLevel> {
    let renormalized = infos.iter().any(|i| i.lanu_flag == forced_landuse_flag);
    let coefficients = coefficients::profile_shares(results, renormalized)?;

    let mut sums: BTreeMap<(SimId, GenId, LanuId), WaterBalance> = BTreeMap::new();
    for result in results {
        let coef = coefficients.get(&result.key()).copied().unwrap_or(0.0);
        *sums
            .entry((result.sim_id, result.gen_id, result.lanu_id))
            .or_default() += result.balance().scaled(coef);
    }

    tracing::debug!(
        target: "naturwb::aggregation",
        rows = results.len(),
        groups = sums.len(),
        renormalized,
        "aggregation.profiles"
    );

    Ok(ProfileLevel {
        coefficients,
        values: KeyedTable::from_rows("res_gat_1", sums)?,
        renormalized,
    })
}

// ── 2. Land-use ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LanduseLevel {
    pub coefficients: LanduseCoefficients,
    /// Values per (sim_id, gen_id, nat_id).
    pub values: KeyedTable<ClipKey, WaterBalance>,
}

/// Merge reference, resolved and flat land-use coefficients.
///
/// A pair the resolver could not resolve gets equal weights per simulation
/// polygon over the land-uses that polygon simulated.
pub fn landuse_coefficients(
    reference: &KeyedTable<LanduseKey, LanduseCoefficient>,
    resolution: &Resolution,
    profile: &ProfileLevel,
    clip: &ClipSet,
) -> Result<LanduseCoefficients> {
    let mut rows: Vec<(LanduseKey, LanduseCoefficient)> = reference
        .iter()
        .filter(|((gen, nat, _), _)| !resolution.is_missing(*gen, *nat))
        .map(|(k, v)| (*k, *v))
        .collect();
    rows.extend(resolution.landuse_coefficients());

    let mut flat = KeyedTable::new("coef_flat");
    for missing in resolution.unresolved_pairs() {
        let sims = clip
            .areas()
            .keys()
            .filter(|(_, gen, nat)| *gen == missing.gen_id && *nat == missing.nat_id)
            .map(|(sim, _, _)| *sim);
        for sim in sims {
            let lanus: Vec<LanuId> = profile
                .values
                .range((sim, missing.gen_id, LanuId::MIN)..=(sim, missing.gen_id, LanuId::MAX))
                .map(|((_, _, lanu), _)| *lanu)
                .collect();
            let count = lanus.len() as f64;
            for lanu in lanus {
                flat.insert((sim, missing.gen_id, missing.nat_id, lanu), 1.0 / count)?;
            }
        }
    }

    Ok(LanduseCoefficients {
        shared: KeyedTable::from_rows("coef_lanu", rows)?,
        flat,
    })
}

pub fn aggregate_landuses(
    profile: &ProfileLevel,
    coefficients: LanduseCoefficients,
    clip: &ClipSet,
) -> Result<LanduseLevel> {
    let mut values = KeyedTable::new("res_gat_2");
    for &(sim, gen, nat) in clip.areas().keys() {
        let mut total = WaterBalance::default();
        for (&(_, _, lanu), balance) in profile
            .values
            .range((sim, gen, LanuId::MIN)..=(sim, gen, LanuId::MAX))
        {
            // Simulated land-uses without a coefficient carry no weight.
            if let Some(coef) = coefficients.get(sim, gen, nat, lanu) {
                total += balance.scaled(coef.coef);
            }
        }
        values.insert((sim, gen, nat), total)?;
    }

    tracing::debug!(
        target: "naturwb::aggregation",
        coefficients = coefficients.len(),
        flat = coefficients.flat.len(),
        groups = values.len(),
        "aggregation.landuses"
    );

    Ok(LanduseLevel {
        coefficients,
        values,
    })
}

// ── 3. Natural region ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RegionLevel {
    pub coefficients: KeyedTable<(SimId, NatId), f64>,
    /// Values per (sim_id, gen_id).
    pub values: KeyedTable<(SimId, GenId), WaterBalance>,
}

pub fn aggregate_regions(
    landuse: &LanduseLevel,
    clip: &ClipSet,
    results: &[SimulationResult],
    tolerance_mm: f64,
) -> Result<RegionLevel> {
    let coefficients = coefficients::region(clip)?;

    let mut sums: BTreeMap<(SimId, GenId), WaterBalance> = BTreeMap::new();
    for (&(sim, gen, nat), balance) in &landuse.values {
        let coef = coefficients.get(&(sim, nat)).copied().unwrap_or(0.0);
        *sums.entry((sim, gen)).or_default() += balance.scaled(coef);
    }
    let values = KeyedTable::from_rows("res_sim", sums)?;

    check_precipitation(&values, results, tolerance_mm)?;

    tracing::debug!(
        target: "naturwb::aggregation",
        groups = values.len(),
        "aggregation.regions"
    );

    Ok(RegionLevel {
        coefficients,
        values,
    })
}

/// The aggregated precipitation of every simulation polygon must equal its raw value.
fn check_precipitation(
    values: &KeyedTable<(SimId, GenId), WaterBalance>,
    results: &[SimulationResult],
    tolerance_mm: f64,
) -> Result<()> {
    let mut raw: BTreeMap<SimId, (ResultKey, f64)> = BTreeMap::new();
    for result in results {
        let entry = raw.entry(result.sim_id).or_insert((result.key(), result.n));
        if result.key() < entry.0 {
            *entry = (result.key(), result.n);
        }
    }

    for (sim, (_, n_control)) in raw {
        let aggregated: Vec<f64> = values
            .range((sim, GenId::MIN)..=(sim, GenId::MAX))
            .map(|(_, balance)| balance.n)
            .collect();
        let Some(&n_gat) = aggregated.first() else {
            return Err(NaturwbError::Consistency(format!(
                "simulation polygon {sim} has results but no aggregated value"
            )));
        };
        if aggregated.len() > 1 || (n_control - n_gat).abs() > tolerance_mm {
            return Err(NaturwbError::Consistency(format!(
                "aggregated precipitation {n_gat} of simulation polygon {sim} \
                 differs from the input precipitation {n_control}"
            )));
        }
    }
    Ok(())
}

// ── 4. Simulation polygon ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PolygonLevel {
    pub coefficients: KeyedTable<(GenId, SimId), f64>,
    /// Values per gen_id.
    pub values: KeyedTable<GenId, WaterBalance>,
}

pub fn aggregate_polygons(region: &RegionLevel, clip: &ClipSet) -> Result<PolygonLevel> {
    let coefficients = coefficients::polygon(clip)?;

    let mut sums: BTreeMap<GenId, WaterBalance> = BTreeMap::new();
    for (&(sim, gen), balance) in &region.values {
        let coef = coefficients.get(&(gen, sim)).copied().unwrap_or(0.0);
        *sums.entry(gen).or_default() += balance.scaled(coef);
    }

    Ok(PolygonLevel {
        coefficients,
        values: KeyedTable::from_rows("res_gen", sums)?,
    })
}

// ── 5. Soil group ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SoilGroupLevel {
    pub coefficients: KeyedTable<GenId, f64>,
    pub reference: NaturwbReference,
}

pub fn aggregate_soil_groups(polygon: &PolygonLevel, clip: &ClipSet) -> Result<SoilGroupLevel> {
    let coefficients = coefficients::soil_group(clip)?;

    let mut balance = WaterBalance::default();
    for (gen, values) in &polygon.values {
        let coef = coefficients.get(gen).copied().unwrap_or(0.0);
        balance += values.scaled(coef);
    }

    let shares = RelativeShares::of(&balance).ok_or_else(|| {
        NaturwbError::InvalidData(
            "the reference has neither runoff, groundwater recharge nor evapotranspiration".into(),
        )
    })?;

    Ok(SoilGroupLevel {
        coefficients,
        reference: NaturwbReference { balance, shares },
    })
}

// ── Full run ────────────────────────────────────────────────────────────────

/// All levels of one aggregation run.
pub struct Aggregation {
    pub profile: ProfileLevel,
    pub landuse: LanduseLevel,
    pub region: RegionLevel,
    pub polygon: PolygonLevel,
    pub soil_group: SoilGroupLevel,
    pub chain: CoefficientChain,
    /// Sum of the coefficient products, 1 within the configured tolerance.
    pub chain_total: f64,
}

impl Aggregation {
    pub fn reference(&self) -> &NaturwbReference {
        &self.soil_group.reference
    }

    pub fn chain_tables(&self) -> ChainTables<'_> {
        ChainTables {
            soil_group: &self.soil_group.coefficients,
            polygon: &self.polygon.coefficients,
            region: &self.region.coefficients,
            landuse: &self.landuse.coefficients,
            profile: &self.profile.coefficients,
        }
    }
}

/// Run the five roll-up steps and both consistency checks.
pub fn aggregate(
    clip: &ClipSet,
    results: &[SimulationResult],
    infos: &[SimulationInfo],
    reference: &KeyedTable<LanduseKey, LanduseCoefficient>,
    resolution: &Resolution,
    config: &EngineConfig,
) -> Result<Aggregation> {
    let profile = aggregate_profiles(results, infos, config.forced_landuse_flag)?;
    let landuse_coefs = landuse_coefficients(reference, resolution, &profile, clip)?;
    let landuse = aggregate_landuses(&profile, landuse_coefs, clip)?;
    let region = aggregate_regions(&landuse, clip, results, config.precipitation_tolerance_mm)?;
    let polygon = aggregate_polygons(&region, clip)?;
    let soil_group = aggregate_soil_groups(&polygon, clip)?;

    let chain = CoefficientChain::build(
        clip,
        &ChainTables {
            soil_group: &soil_group.coefficients,
            polygon: &polygon.coefficients,
            region: &region.coefficients,
            landuse: &landuse.coefficients,
            profile: &profile.coefficients,
        },
    );
    let chain_total = chain.check(config.coefficient_tolerance)?;

    tracing::info!(
        target: "naturwb::aggregation",
        n = soil_group.reference.balance.n,
        et = soil_group.reference.balance.et,
        tp = soil_group.reference.balance.tp,
        runoff = soil_group.reference.balance.runoff,
        chain_total,
        "aggregation.done"
    );

    Ok(Aggregation {
        profile,
        landuse,
        region,
        polygon,
        soil_group,
        chain,
        chain_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::LanduseSource;
    use crate::model::{ClipRow, LanduseObservation};
    use approx::assert_relative_eq;
    use geo::MultiPolygon;

    fn clip(rows: &[(SimId, GenId, NatId, f64)]) -> ClipSet {
        ClipSet::from_rows(
            rows.iter().map(|r| r.3).sum(),
            rows.iter()
                .map(|&(sim_id, gen_id, nat_id, area)| ClipRow {
                    sim_id,
                    gen_id,
                    nat_id,
                    geometry: MultiPolygon::new(vec![]),
                    area,
                    color: String::new(),
                    legend_text: String::new(),
                    legend_short: String::new(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn result(sim_id: SimId, gen_id: GenId, bf_id: i64, lanu_id: LanuId, n: f64, et: f64, bfid_area: f64) -> SimulationResult {
        SimulationResult {
            sim_id,
            gen_id,
            bf_id,
            lanu_id,
            n,
            kap_a: 0.0,
            et,
            pet: et + 100.0,
            oa: (n - et) * 0.2,
            za: (n - et) * 0.3,
            tp: (n - et) * 0.5,
            za_gwnah_flag: 1.0,
            bfid_area,
        }
    }

    fn reference(obs: &[(GenId, NatId, LanuId, f64)]) -> KeyedTable<LanduseKey, LanduseCoefficient> {
        let obs: Vec<LanduseObservation> = obs
            .iter()
            .map(|&(gen_id, nat_id, lanu_id, area)| LanduseObservation {
                gen_id,
                nat_id,
                lanu_id,
                area,
                lanu_name: String::new(),
            })
            .collect();
        coefficients::reference_landuse(&obs).unwrap()
    }

    fn info(sim_id: SimId, lanu_flag: u8) -> SimulationInfo {
        SimulationInfo {
            sim_id,
            lanu_flag,
            ..SimulationInfo::default()
        }
    }

    #[test]
    fn profiles_are_weighted_by_bfid_area() {
        let results = vec![
            result(1, 10, 100, 3, 800.0, 400.0, 25.0),
            result(1, 10, 101, 3, 800.0, 600.0, 75.0),
        ];
        let level = aggregate_profiles(&results, &[info(1, 0)], 2).unwrap();
        assert!(!level.renormalized);
        let balance = level.values.get(&(1, 10, 3)).unwrap();
        assert_relative_eq!(balance.n, 800.0, epsilon = 1e-9);
        assert_relative_eq!(balance.et, 550.0, epsilon = 1e-9);
    }

    #[test]
    fn unresolved_pairs_get_flat_coefficients() {
        let clip = clip(&[(1, 10, 7, 100.0)]);
        let results = vec![
            result(1, 10, 100, 3, 800.0, 400.0, 100.0),
            result(1, 10, 100, 4, 800.0, 500.0, 100.0),
        ];
        let profile = aggregate_profiles(&results, &[info(1, 1)], 2).unwrap();
        let resolution = Resolution::unresolved(&clip, &[(10, 7)]);
        let coefs = landuse_coefficients(&reference(&[]), &resolution, &profile, &clip).unwrap();
        assert!(coefs.shared.is_empty());
        assert_eq!(coefs.get(1, 10, 7, 3).unwrap().coef, 0.5);
        assert_eq!(coefs.get(1, 10, 7, 4).unwrap().source, LanduseSource::Flat);
    }

    #[test]
    fn flat_weights_follow_the_landuses_of_each_polygon() {
        // Both polygons share (10, 7); polygon 2 only simulated land-use 3.
        let clip = clip(&[(1, 10, 7, 100.0), (2, 10, 7, 100.0)]);
        let results = vec![
            result(1, 10, 100, 3, 800.0, 400.0, 100.0),
            result(1, 10, 100, 4, 800.0, 500.0, 100.0),
            result(2, 10, 100, 3, 900.0, 450.0, 100.0),
        ];
        let infos = [info(1, 1), info(2, 1)];
        let resolution = Resolution::unresolved(&clip, &[(10, 7)]);
        let agg = aggregate(
            &clip,
            &results,
            &infos,
            &reference(&[]),
            &resolution,
            &EngineConfig::default(),
        )
        .unwrap();

        let coefs = &agg.landuse.coefficients;
        assert_eq!(coefs.get(1, 10, 7, 4).unwrap().coef, 0.5);
        assert_eq!(coefs.get(2, 10, 7, 3).unwrap().coef, 1.0);
        assert_relative_eq!(agg.region.values.get(&(2, 10)).unwrap().n, 900.0, epsilon = 1e-9);
        assert_relative_eq!(agg.reference().balance.n, 850.0, epsilon = 1e-9);
        assert_relative_eq!(agg.chain_total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn precipitation_mismatch_is_fatal() {
        let clip = clip(&[(1, 10, 7, 100.0)]);
        // Land-use 4 is simulated but only land-use 3 has reference weight of 0.5.
        let results = vec![
            result(1, 10, 100, 3, 800.0, 400.0, 100.0),
            result(1, 10, 100, 4, 800.0, 500.0, 100.0),
        ];
        let refs = reference(&[(10, 7, 3, 50.0), (10, 7, 5, 50.0)]);
        let err = aggregate(
            &clip,
            &results,
            &[info(1, 0)],
            &refs,
            &Resolution::empty(),
            &EngineConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, NaturwbError::Consistency(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn two_regions_of_one_polygon() {
        let clip = clip(&[(1, 10, 7, 300.0), (1, 10, 8, 100.0)]);
        let results = vec![
            result(1, 10, 100, 3, 800.0, 400.0, 100.0),
            result(1, 10, 100, 4, 800.0, 600.0, 100.0),
        ];
        let refs = reference(&[(10, 7, 3, 10.0), (10, 8, 4, 10.0)]);
        let agg = aggregate(
            &clip,
            &results,
            &[info(1, 0)],
            &refs,
            &Resolution::empty(),
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(agg.region.coefficients.get(&(1, 7)), Some(&0.75));
        let reference = agg.reference();
        assert_relative_eq!(reference.balance.n, 800.0, epsilon = 1e-9);
        assert_relative_eq!(reference.balance.et, 0.75 * 400.0 + 0.25 * 600.0, epsilon = 1e-9);
        assert_relative_eq!(agg.chain_total, 1.0, epsilon = 1e-12);
        assert_relative_eq!(reference.shares.sum(), 1.0, epsilon = 1e-9);
    }
}
