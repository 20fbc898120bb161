//! Fallback search for soil groups without a natural land-use in their region.
//!
//! Buffers around the input polygon are searched at increasing radii until
//! every soil group has at least one non-urban land-use observation, or the
//! radii are exhausted.

use std::collections::{BTreeMap, BTreeSet};

use geo::MultiPolygon;

use crate::clip::ClipSet;
use crate::coefficients::{LanduseCoefficient, LanduseKey, LanduseSource};
use crate::error::Result;
use crate::keyed::{group_sum, share, KeyedTable};
use crate::model::{GenId, LanuId, NatId};
use crate::store::ReferenceStore;

/// A (gen_id, nat_id) pair of the clip without a natural land-use reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingLanduse {
    pub gen_id: GenId,
    pub nat_id: NatId,
    /// Clipped area of the pair, m².
    pub area: f64,
    pub resolved: bool,
    /// Radius at which the soil group was resolved.
    pub radius_km: Option<f64>,
}

/// Land-use distribution found for a soil group by the buffer search.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstituteDistribution {
    pub radius_km: f64,
    pub shares: BTreeMap<LanuId, f64>,
}

/// Outcome of the buffer search.
#[derive(Debug, Clone)]
pub struct Resolution {
    missing: KeyedTable<(GenId, NatId), MissingLanduse>,
    substitutes: BTreeMap<GenId, SubstituteDistribution>,
}

impl Resolution {
    /// Nothing was missing.
    pub fn empty() -> Self {
        Self {
            missing: KeyedTable::new("missing_lanus"),
            substitutes: BTreeMap::new(),
        }
    }

    pub fn missing(&self) -> &KeyedTable<(GenId, NatId), MissingLanduse> {
        &self.missing
    }

    pub fn substitutes(&self) -> &BTreeMap<GenId, SubstituteDistribution> {
        &self.substitutes
    }

    pub fn is_missing(&self, gen_id: GenId, nat_id: NatId) -> bool {
        self.missing.contains_key(&(gen_id, nat_id))
    }

    pub fn unresolved_pairs(&self) -> impl Iterator<Item = &MissingLanduse> {
        self.missing.values().filter(|m| !m.resolved)
    }

    #[cfg(test)]
    pub(crate) fn unresolved(clip: &ClipSet, pairs: &[(GenId, NatId)]) -> Self {
        let areas = clip.area_by_gen_nat();
        let missing = pairs
            .iter()
            .map(|&(gen_id, nat_id)| {
                (
                    (gen_id, nat_id),
                    MissingLanduse {
                        gen_id,
                        nat_id,
                        area: areas.get(&(gen_id, nat_id)).copied().unwrap_or(0.0),
                        resolved: false,
                        radius_km: None,
                    },
                )
            })
            .collect::<Vec<_>>();
        Self {
            missing: KeyedTable::from_rows("missing_lanus", missing).unwrap(),
            substitutes: BTreeMap::new(),
        }
    }

    /// Substitute coefficients for every resolved (gen_id, nat_id) pair.
    ///
    /// The distribution is scoped by soil group, so every missing region of a
    /// resolved group receives the same shares.
    pub fn landuse_coefficients(&self) -> Vec<(LanduseKey, LanduseCoefficient)> {
        let mut rows = Vec::new();
        for missing in self.missing.values().filter(|m| m.resolved) {
            let Some(substitute) = self.substitutes.get(&missing.gen_id) else {
                continue;
            };
            for (lanu_id, coef) in &substitute.shares {
                rows.push((
                    (missing.gen_id, missing.nat_id, *lanu_id),
                    LanduseCoefficient {
                        coef: *coef,
                        source: LanduseSource::Resolved {
                            radius_km: substitute.radius_km,
                        },
                    },
                ));
            }
        }
        rows
    }
}

/// (gen_id, nat_id) pairs of the clip that have no reference land-use coefficient.
pub fn missing_pairs(
    clip: &ClipSet,
    reference: &KeyedTable<LanduseKey, LanduseCoefficient>,
) -> BTreeSet<(GenId, NatId)> {
    let covered: BTreeSet<(GenId, NatId)> =
        reference.keys().map(|(gen, nat, _)| (*gen, *nat)).collect();
    clip.gen_nat_pairs()
        .into_iter()
        .filter(|pair| !covered.contains(pair))
        .collect()
}

/// Search the buffers at `radii_km` for the soil groups of the `missing` pairs.
pub fn resolve<S: ReferenceStore>(
    store: &S,
    input: &MultiPolygon<f64>,
    clip: &ClipSet,
    missing: &BTreeSet<(GenId, NatId)>,
    radii_km: &[f64],
) -> Result<Resolution> {
    if missing.is_empty() {
        return Ok(Resolution::empty());
    }

    let mut pending: BTreeSet<GenId> = missing.iter().map(|(gen, _)| *gen).collect();
    let mut substitutes: BTreeMap<GenId, SubstituteDistribution> = BTreeMap::new();

    for &radius_km in radii_km {
        if pending.is_empty() {
            break;
        }
        let found = store.buffered_landuses(input, radius_km * 1000.0, &pending)?;
        let totals = group_sum(found.iter(), |f| (f.gen_id, f.area));

        for (gen_id, total) in totals {
            // Groups without any area are not resolved at this radius.
            if !pending.contains(&gen_id) || !(total > 0.0) {
                continue;
            }
            let mut shares = BTreeMap::new();
            for obs in found.iter().filter(|f| f.gen_id == gen_id) {
                *shares.entry(obs.lanu_id).or_insert(0.0) += share(obs.area, total, gen_id)?;
            }
            pending.remove(&gen_id);
            substitutes.insert(gen_id, SubstituteDistribution { radius_km, shares });
        }

        tracing::debug!(
            target: "naturwb::resolver",
            radius_km,
            resolved = substitutes.len(),
            pending = pending.len(),
            "resolver.radius_searched"
        );
    }

    if !pending.is_empty() {
        tracing::warn!(
            target: "naturwb::resolver",
            unresolved = ?pending,
            max_radius_km = radii_km.last().copied().unwrap_or_default(),
            "resolver.exhausted"
        );
    }

    let areas = clip.area_by_gen_nat();
    let missing = KeyedTable::from_rows(
        "missing_lanus",
        missing.iter().map(|&(gen_id, nat_id)| {
            let substitute = substitutes.get(&gen_id);
            (
                (gen_id, nat_id),
                MissingLanduse {
                    gen_id,
                    nat_id,
                    area: areas.get(&(gen_id, nat_id)).copied().unwrap_or(0.0),
                    resolved: substitute.is_some(),
                    radius_km: substitute.map(|s| s.radius_km),
                },
            )
        }),
    )?;

    Ok(Resolution {
        missing,
        substitutes,
    })
}
