use std::collections::{BTreeMap, BTreeSet};

use geo::MultiPolygon;

use crate::error::{NaturwbError, Result};
use crate::geometry;
use crate::keyed::{group_sum, share, KeyedTable};
use crate::model::{ClipKey, ClipRow, GenId, NatId, SimId};
use crate::store::ReferenceStore;

/// A clipped area with its share of the matched area.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedArea {
    pub row: ClipRow,
    /// `area / total_area` of the whole clip set.
    pub anteil: f64,
}

/// The working geometry set of one query.
#[derive(Debug, Clone)]
pub struct ClipSet {
    input_area: f64,
    total_area: f64,
    areas: KeyedTable<ClipKey, ClippedArea>,
}

impl ClipSet {
    /// Build the clip set from store rows, dropping degenerate rows.
    pub fn from_rows(input_area: f64, rows: Vec<ClipRow>) -> Result<Self> {
        let rows: Vec<ClipRow> = rows
            .into_iter()
            .filter(|r| r.area.is_finite() && r.area > 0.0)
            .collect();
        let total_area: f64 = rows.iter().map(|r| r.area).sum();
        if rows.is_empty() || total_area <= 0.0 {
            return Err(NaturwbError::EmptyIntersection);
        }

        let areas = KeyedTable::from_rows(
            "sim_shps_clip",
            rows.into_iter().map(|row| {
                let anteil = row.area / total_area;
                (row.key(), ClippedArea { row, anteil })
            }),
        )?;

        Ok(Self {
            input_area,
            total_area,
            areas,
        })
    }

    pub fn input_area(&self) -> f64 {
        self.input_area
    }

    /// Sum of all clipped areas, i.e. the area covered by reference data.
    pub fn total_area(&self) -> f64 {
        self.total_area
    }

    pub fn areas(&self) -> &KeyedTable<ClipKey, ClippedArea> {
        &self.areas
    }

    pub fn sim_ids(&self) -> BTreeSet<SimId> {
        self.areas.keys().map(|(sim, _, _)| *sim).collect()
    }

    pub fn gen_nat_pairs(&self) -> BTreeSet<(GenId, NatId)> {
        self.areas.keys().map(|(_, gen, nat)| (*gen, *nat)).collect()
    }

    /// Area per (sim_id, nat_id).
    pub fn area_by_sim_nat(&self) -> BTreeMap<(SimId, NatId), f64> {
        group_sum(self.areas.iter(), |(k, v)| ((k.0, k.2), v.row.area))
    }

    /// Area per sim_id.
    pub fn area_by_sim(&self) -> BTreeMap<SimId, f64> {
        group_sum(self.areas.iter(), |(k, v)| (k.0, v.row.area))
    }

    /// Area per (gen_id, sim_id).
    pub fn area_by_gen_sim(&self) -> BTreeMap<(GenId, SimId), f64> {
        group_sum(self.areas.iter(), |(k, v)| ((k.1, k.0), v.row.area))
    }

    /// Area per gen_id.
    pub fn area_by_gen(&self) -> BTreeMap<GenId, f64> {
        group_sum(self.areas.iter(), |(k, v)| (k.1, v.row.area))
    }

    /// Area per (gen_id, nat_id).
    pub fn area_by_gen_nat(&self) -> BTreeMap<(GenId, NatId), f64> {
        group_sum(self.areas.iter(), |(k, v)| ((k.1, k.2), v.row.area))
    }

    /// Share of the matched area per sim_id.
    pub fn anteil_by_sim(&self) -> Result<BTreeMap<SimId, f64>> {
        self.area_by_sim()
            .into_iter()
            .map(|(sim, area)| Ok((sim, share(area, self.total_area, "clip")?)))
            .collect()
    }
}

/// Intersect the input polygon with the reference layers.
pub fn clip_input<S: ReferenceStore>(store: &S, input: &MultiPolygon<f64>) -> Result<ClipSet> {
    geometry::validate_input(input)?;
    let rows = store.clip(input)?;
    let clip = ClipSet::from_rows(geometry::area(input), rows)?;
    tracing::debug!(
        target: "naturwb::clip",
        rows = clip.areas().len(),
        total_area = clip.total_area(),
        input_area = clip.input_area(),
        "clip.done"
    );
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(sim_id: SimId, gen_id: GenId, nat_id: NatId, area: f64) -> ClipRow {
        ClipRow {
            sim_id,
            gen_id,
            nat_id,
            geometry: MultiPolygon::new(vec![]),
            area,
            color: String::new(),
            legend_text: String::new(),
            legend_short: String::new(),
        }
    }

    #[test]
    fn anteil_is_share_of_total() {
        let clip = ClipSet::from_rows(
            1_000.0,
            vec![row(1, 10, 7, 300.0), row(1, 10, 8, 100.0), row(2, 20, 8, 400.0)],
        )
        .unwrap();
        assert_relative_eq!(clip.total_area(), 800.0);
        let anteil: Vec<f64> = clip.areas().values().map(|a| a.anteil).collect();
        assert_eq!(anteil, vec![0.375, 0.125, 0.5]);
        assert_eq!(clip.area_by_sim().get(&1), Some(&400.0));
        assert_eq!(clip.area_by_gen_nat().get(&(20, 8)), Some(&400.0));
        assert_eq!(clip.sim_ids(), BTreeSet::from([1, 2]));
    }

    #[test]
    fn empty_or_degenerate_clip_is_an_error() {
        assert!(matches!(
            ClipSet::from_rows(10.0, vec![]),
            Err(NaturwbError::EmptyIntersection)
        ));
        assert!(matches!(
            ClipSet::from_rows(10.0, vec![row(1, 10, 7, 0.0)]),
            Err(NaturwbError::EmptyIntersection)
        ));
    }

    #[test]
    fn duplicate_clip_rows_are_rejected() {
        let err = ClipSet::from_rows(10.0, vec![row(1, 10, 7, 1.0), row(1, 10, 7, 2.0)])
            .unwrap_err();
        assert!(matches!(err, NaturwbError::DuplicateKey { .. }));
    }
}
