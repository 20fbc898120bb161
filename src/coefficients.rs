//! Area-weighted coefficients of the five aggregation levels.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::clip::ClipSet;
use crate::error::Result;
use crate::keyed::{group_sum, share, KeyedTable};
use crate::model::{
    GenId, LanduseObservation, LanuId, NatId, ResultKey, SimId, SimulationResult,
};

/// Key of a land-use coefficient: (gen_id, nat_id, lanu_id).
pub type LanduseKey = (GenId, NatId, LanuId);

/// Where a land-use coefficient came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LanduseSource {
    /// Non-urban land-use on the same soil group in the same natural region.
    Reference,
    /// Found by the buffer search on the same soil group, any region.
    Resolved { radius_km: f64 },
    /// Nothing found within the largest radius; equal weights over the simulated land-uses.
    Flat,
}

impl LanduseSource {
    pub fn label(&self) -> &'static str {
        match self {
            LanduseSource::Reference => "reference",
            LanduseSource::Resolved { .. } => "resolved",
            LanduseSource::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LanduseCoefficient {
    pub coef: f64,
    pub source: LanduseSource,
}

/// Key of a flat land-use weight: (sim_id, gen_id, nat_id, lanu_id).
pub type FlatKey = (SimId, GenId, NatId, LanuId);

/// The land-use coefficients applied in one query.
///
/// Reference and resolved coefficients hold for every simulation polygon of a
/// (gen_id, nat_id) pair. Flat weights belong to one simulation polygon and sum
/// to 1 over the land-uses that polygon simulated.
#[derive(Debug, Clone)]
pub struct LanduseCoefficients {
    pub shared: KeyedTable<LanduseKey, LanduseCoefficient>,
    pub flat: KeyedTable<FlatKey, f64>,
}

impl LanduseCoefficients {
    pub fn len(&self) -> usize {
        self.shared.len() + self.flat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.flat.is_empty()
    }

    pub fn get(&self, sim: SimId, gen: GenId, nat: NatId, lanu: LanuId) -> Option<LanduseCoefficient> {
        match self.flat.get(&(sim, gen, nat, lanu)) {
            Some(&coef) => Some(LanduseCoefficient {
                coef,
                source: LanduseSource::Flat,
            }),
            None => self.shared.get(&(gen, nat, lanu)).copied(),
        }
    }

    /// Coefficients of the land-uses of `sim` on soil group `gen` in region `nat`.
    pub fn for_polygon(&self, sim: SimId, gen: GenId, nat: NatId) -> Vec<(LanuId, LanduseCoefficient)> {
        let flat: Vec<_> = self
            .flat
            .range((sim, gen, nat, LanuId::MIN)..=(sim, gen, nat, LanuId::MAX))
            .map(|(&(_, _, _, lanu), &coef)| {
                (
                    lanu,
                    LanduseCoefficient {
                        coef,
                        source: LanduseSource::Flat,
                    },
                )
            })
            .collect();
        if !flat.is_empty() {
            return flat;
        }
        self.shared
            .range((gen, nat, LanuId::MIN)..=(gen, nat, LanuId::MAX))
            .map(|(&(_, _, lanu), coef)| (lanu, *coef))
            .collect()
    }
}

/// Share of each soil profile within its (sim_id, gen_id, lanu_id) group.
///
/// With `renormalize`, `bfid_area` is rescaled to sum to 100 per group; this is
/// needed when a land-use is forced onto a single soil profile.
pub fn profile_shares(
    results: &[SimulationResult],
    renormalize: bool,
) -> Result<KeyedTable<ResultKey, f64>> {
    let group_totals = if renormalize {
        group_sum(results.iter(), |r| ((r.sim_id, r.gen_id, r.lanu_id), r.bfid_area))
    } else {
        BTreeMap::new()
    };

    let mut shares = KeyedTable::new("coef_bfid");
    for result in results {
        let coef = if renormalize {
            let group = (result.sim_id, result.gen_id, result.lanu_id);
            let total = group_totals.get(&group).copied().unwrap_or(0.0);
            share(result.bfid_area, total, group)?
        } else {
            result.bfid_area / 100.0
        };
        shares.insert(result.key(), coef)?;
    }
    Ok(shares)
}

/// Land-use shares within each (gen_id, nat_id) group of the reference data.
pub fn reference_landuse(
    observations: &[LanduseObservation],
) -> Result<KeyedTable<LanduseKey, LanduseCoefficient>> {
    let totals = group_sum(observations.iter(), |o| ((o.gen_id, o.nat_id), o.area));

    let mut table = KeyedTable::new("coef_lanu");
    for obs in observations {
        let group = (obs.gen_id, obs.nat_id);
        let coef = share(obs.area, totals[&group], group)?;
        table.insert(
            (obs.gen_id, obs.nat_id, obs.lanu_id),
            LanduseCoefficient {
                coef,
                source: LanduseSource::Reference,
            },
        )?;
    }
    Ok(table)
}

/// Share of each (sim_id, nat_id) in the clipped area of its simulation polygon.
pub fn region(clip: &ClipSet) -> Result<KeyedTable<(SimId, NatId), f64>> {
    let sim_totals = clip.area_by_sim();
    KeyedTable::from_rows(
        "coef_nat",
        clip.area_by_sim_nat()
            .into_iter()
            .map(|((sim, nat), area)| Ok(((sim, nat), share(area, sim_totals[&sim], sim)?)))
            .collect::<Result<Vec<_>>>()?,
    )
}

/// Share of each simulation polygon in the clipped area of its soil group.
pub fn polygon(clip: &ClipSet) -> Result<KeyedTable<(GenId, SimId), f64>> {
    let gen_totals = clip.area_by_gen();
    KeyedTable::from_rows(
        "coef_sim",
        clip.area_by_gen_sim()
            .into_iter()
            .map(|((gen, sim), area)| Ok(((gen, sim), share(area, gen_totals[&gen], gen)?)))
            .collect::<Result<Vec<_>>>()?,
    )
}

/// Share of each soil group in the whole matched area.
pub fn soil_group(clip: &ClipSet) -> Result<KeyedTable<GenId, f64>> {
    let total = clip.total_area();
    KeyedTable::from_rows(
        "coef_gen",
        clip.area_by_gen()
            .into_iter()
            .map(|(gen, area)| Ok((gen, share(area, total, "total")?)))
            .collect::<Result<Vec<_>>>()?,
    )
}
