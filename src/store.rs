//! The read-only query interface against the geospatial reference data.

use std::collections::{BTreeMap, BTreeSet};

use geo::MultiPolygon;

use crate::error::{NaturwbError, Result};
use crate::geometry;
use crate::model::{
    BufferedLanduse, ClipKey, ClipRow, GenId, LanduseObservation, LanuId, NatId, SimId,
    SimulationInfo, SimulationResult,
};

/// The five query shapes the engine needs from the reference database.
///
/// Implementations are blocking and read-only. Failures are reported as
/// [`NaturwbError::Store`] and are never retried by the engine.
pub trait ReferenceStore {
    /// Intersect the input with the simulation-polygon and natural-region layers.
    fn clip(&self, input: &MultiPolygon<f64>) -> Result<Vec<ClipRow>>;

    /// Non-urban land-use areas for the given (gen_id, nat_id) pairs.
    fn reference_landuses(&self, pairs: &BTreeSet<(GenId, NatId)>)
        -> Result<Vec<LanduseObservation>>;

    /// Non-urban land-use areas of the given soil groups within `radius_m` of the input.
    fn buffered_landuses(
        &self,
        input: &MultiPolygon<f64>,
        radius_m: f64,
        gen_ids: &BTreeSet<GenId>,
    ) -> Result<Vec<BufferedLanduse>>;

    /// Raw simulation results of the given simulation polygons.
    fn results(&self, sim_ids: &BTreeSet<SimId>) -> Result<Vec<SimulationResult>>;

    /// Quality flags of the given simulation polygons.
    fn simulation_info(&self, sim_ids: &BTreeSet<SimId>) -> Result<Vec<SimulationInfo>>;
}

// ── In-memory layers ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SimulationPolygon {
    pub sim_id: SimId,
    pub gen_id: GenId,
    pub geometry: MultiPolygon<f64>,
    pub color: String,
    pub legend_text: String,
    pub legend_short: String,
    pub info: SimulationInfo,
}

#[derive(Debug, Clone)]
pub struct NaturalRegion {
    pub nat_id: NatId,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// A land-use observation polygon on one soil group inside one natural region.
#[derive(Debug, Clone)]
pub struct LookupPolygon {
    pub gen_id: GenId,
    pub nat_id: NatId,
    pub lanu_id: LanuId,
    pub lanu_name: String,
    pub is_urban: bool,
    pub area: f64,
    pub geometry: MultiPolygon<f64>,
}

/// Reference store holding all layers in memory and answering the queries
/// with planar geometry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    simulation_polygons: Vec<SimulationPolygon>,
    natural_regions: Vec<NaturalRegion>,
    lookup_polygons: Vec<LookupPolygon>,
    results: Vec<SimulationResult>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_simulation_polygon(mut self, polygon: SimulationPolygon) -> Self {
        self.simulation_polygons.push(polygon);
        self
    }

    pub fn with_natural_region(mut self, region: NaturalRegion) -> Self {
        self.natural_regions.push(region);
        self
    }

    pub fn with_lookup_polygon(mut self, polygon: LookupPolygon) -> Self {
        self.lookup_polygons.push(polygon);
        self
    }

    pub fn with_results(mut self, results: impl IntoIterator<Item = SimulationResult>) -> Self {
        self.results.extend(results);
        self
    }

    pub fn simulation_polygons(&self) -> &[SimulationPolygon] {
        &self.simulation_polygons
    }

    pub fn natural_regions(&self) -> &[NaturalRegion] {
        &self.natural_regions
    }

    pub fn lookup_polygons(&self) -> &[LookupPolygon] {
        &self.lookup_polygons
    }

    /// Fail on duplicate simulation or region ids.
    pub fn validate(&self) -> Result<()> {
        let mut sims = BTreeSet::new();
        for polygon in &self.simulation_polygons {
            if !sims.insert(polygon.sim_id) {
                return Err(NaturwbError::DuplicateKey {
                    table: "simulation_polygons",
                    key: polygon.sim_id.to_string(),
                });
            }
        }
        let mut nats = BTreeSet::new();
        for region in &self.natural_regions {
            if !nats.insert(region.nat_id) {
                return Err(NaturwbError::DuplicateKey {
                    table: "natural_regions",
                    key: region.nat_id.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl ReferenceStore for InMemoryStore {
    fn clip(&self, input: &MultiPolygon<f64>) -> Result<Vec<ClipRow>> {
        let mut rows: BTreeMap<ClipKey, ClipRow> = BTreeMap::new();

        for sim in &self.simulation_polygons {
            let clipped = geometry::intersection(&sim.geometry, input);
            if geometry::area(&clipped) <= 0.0 {
                continue;
            }
            for region in &self.natural_regions {
                let part = geometry::intersection(&clipped, &region.geometry);
                let area = geometry::area(&part);
                if area <= 0.0 {
                    continue;
                }
                let row = rows
                    .entry((sim.sim_id, sim.gen_id, region.nat_id))
                    .or_insert_with(|| ClipRow {
                        sim_id: sim.sim_id,
                        gen_id: sim.gen_id,
                        nat_id: region.nat_id,
                        geometry: MultiPolygon::new(vec![]),
                        area: 0.0,
                        color: sim.color.clone(),
                        legend_text: sim.legend_text.clone(),
                        legend_short: sim.legend_short.clone(),
                    });
                row.area += area;
                row.geometry.0.extend(part.0);
            }
        }

        Ok(rows.into_values().collect())
    }

    fn reference_landuses(
        &self,
        pairs: &BTreeSet<(GenId, NatId)>,
    ) -> Result<Vec<LanduseObservation>> {
        let mut areas: BTreeMap<(GenId, NatId, LanuId), (f64, &str)> = BTreeMap::new();
        for lookup in &self.lookup_polygons {
            if lookup.is_urban || !pairs.contains(&(lookup.gen_id, lookup.nat_id)) {
                continue;
            }
            let entry = areas
                .entry((lookup.gen_id, lookup.nat_id, lookup.lanu_id))
                .or_insert((0.0, lookup.lanu_name.as_str()));
            entry.0 += lookup.area;
        }

        Ok(areas
            .into_iter()
            .map(|((gen_id, nat_id, lanu_id), (area, name))| LanduseObservation {
                gen_id,
                nat_id,
                lanu_id,
                area,
                lanu_name: name.to_string(),
            })
            .collect())
    }

    fn buffered_landuses(
        &self,
        input: &MultiPolygon<f64>,
        radius_m: f64,
        gen_ids: &BTreeSet<GenId>,
    ) -> Result<Vec<BufferedLanduse>> {
        let mut areas: BTreeMap<(GenId, LanuId), f64> = BTreeMap::new();
        for lookup in &self.lookup_polygons {
            if lookup.is_urban || !gen_ids.contains(&lookup.gen_id) {
                continue;
            }
            if geometry::within_buffer(&lookup.geometry, input, radius_m) {
                *areas.entry((lookup.gen_id, lookup.lanu_id)).or_insert(0.0) += lookup.area;
            }
        }

        Ok(areas
            .into_iter()
            .map(|((gen_id, lanu_id), area)| BufferedLanduse {
                gen_id,
                lanu_id,
                area,
            })
            .collect())
    }

    fn results(&self, sim_ids: &BTreeSet<SimId>) -> Result<Vec<SimulationResult>> {
        Ok(self
            .results
            .iter()
            .filter(|r| sim_ids.contains(&r.sim_id))
            .copied()
            .collect())
    }

    fn simulation_info(&self, sim_ids: &BTreeSet<SimId>) -> Result<Vec<SimulationInfo>> {
        Ok(self
            .simulation_polygons
            .iter()
            .filter(|p| sim_ids.contains(&p.sim_id))
            .map(|p| SimulationInfo {
                sim_id: p.sim_id,
                ..p.info.clone()
            })
            .collect())
    }
}
