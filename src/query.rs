//! One request: input polygon in, NatUrWB reference and audit trail out.

use std::collections::BTreeMap;

use geo::MultiPolygon;

use crate::aggregation::{self, Aggregation};
use crate::chain::ChainRow;
use crate::clip::{self, ClipSet};
use crate::coefficients;
use crate::config::EngineConfig;
use crate::diagnostics::{self, Diagnostics, MessageCatalog};
use crate::error::Result;
use crate::geometry;
use crate::model::{ClipKey, LanduseObservation, LanuId, NaturwbReference, SimulationInfo, SimulationResult, WaterBalance};
use crate::resolver::{self, Resolution};
use crate::store::ReferenceStore;

/// Level-2 result of one clipped area, with the legend of its soil group.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipResult {
    pub key: ClipKey,
    pub geometry: MultiPolygon<f64>,
    pub area: f64,
    pub color: String,
    pub legend_text: String,
    pub legend_short: String,
    pub balance: WaterBalance,
}

/// Everything one query produced.
pub struct QueryOutcome {
    pub input: MultiPolygon<f64>,
    pub clip: ClipSet,
    pub reference_landuses: Vec<LanduseObservation>,
    pub results: Vec<SimulationResult>,
    pub infos: Vec<SimulationInfo>,
    pub resolution: Resolution,
    pub aggregation: Aggregation,
    pub diagnostics: Diagnostics,
}

impl QueryOutcome {
    pub fn reference(&self) -> &NaturwbReference {
        self.aggregation.reference()
    }

    pub fn chain_rows(&self) -> Vec<ChainRow> {
        self.aggregation.chain.rows()
    }

    /// Share of each land-use in the reference.
    pub fn landuse_distribution(&self) -> BTreeMap<LanuId, f64> {
        self.aggregation.chain.landuse_distribution()
    }

    /// The level-2 values per clipped area, joined with the soil legend.
    pub fn results_by_soil_group(&self) -> Vec<ClipResult> {
        self.clip
            .areas()
            .iter()
            .filter_map(|(key, clipped)| {
                let balance = self.aggregation.landuse.values.get(key)?;
                Some(ClipResult {
                    key: *key,
                    geometry: clipped.row.geometry.clone(),
                    area: clipped.row.area,
                    color: clipped.row.color.clone(),
                    legend_text: clipped.row.legend_text.clone(),
                    legend_short: clipped.row.legend_short.clone(),
                    balance: *balance,
                })
            })
            .collect()
    }
}

/// Compute the NatUrWB reference for `input`.
pub fn run_query<S: ReferenceStore>(
    store: &S,
    input: &MultiPolygon<f64>,
    config: &EngineConfig,
    catalog: &MessageCatalog,
) -> Result<QueryOutcome> {
    let clip = clip::clip_input(store, input)?;

    let sim_ids = clip.sim_ids();
    let reference_landuses = store.reference_landuses(&clip.gen_nat_pairs())?;
    let results = store.results(&sim_ids)?;
    let infos = store.simulation_info(&sim_ids)?;
    tracing::debug!(
        target: "naturwb::query",
        sims = sim_ids.len(),
        results = results.len(),
        landuses = reference_landuses.len(),
        "query.loaded"
    );

    let reference = coefficients::reference_landuse(&reference_landuses)?;
    let missing = resolver::missing_pairs(&clip, &reference);
    let resolution = resolver::resolve(store, input, &clip, &missing, &config.search_radii_km)?;

    let aggregation = aggregation::aggregate(
        &clip,
        &results,
        &infos,
        &reference,
        &resolution,
        config,
    )?;
    let diagnostics = diagnostics::diagnose(&clip, &infos, &resolution, config, catalog)?;

    Ok(QueryOutcome {
        input: input.clone(),
        clip,
        reference_landuses,
        results,
        infos,
        resolution,
        aggregation,
        diagnostics,
    })
}

/// Same as [`run_query`] for an input given as WKT.
pub fn run_query_wkt<S: ReferenceStore>(
    store: &S,
    wkt: &str,
    config: &EngineConfig,
    catalog: &MessageCatalog,
) -> Result<QueryOutcome> {
    let input = geometry::parse_polygon_wkt(wkt)?;
    run_query(store, &input, config, catalog)
}
