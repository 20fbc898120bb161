//! Polars exports of the reference and its audit trail.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::aggregation::Aggregation;
use crate::chain::ChainRow;
use crate::clip::ClipSet;
use crate::coefficients::{LanduseCoefficients, LanduseSource};
use crate::error::Result;
use crate::geometry;
use crate::model::{NaturwbReference, WaterBalance};
use crate::query::ClipResult;
use crate::resolver::Resolution;
use crate::schema::{coefficients, ids, layer, resolver, results};

/// Aggregation levels with stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// (sim_id, gen_id, lanu_id)
    Profile,
    /// (sim_id, gen_id, nat_id)
    Landuse,
    /// (sim_id, gen_id)
    Region,
    /// gen_id
    Polygon,
}

/// One row holding the absolute and relative reference values.
pub fn reference(reference: &NaturwbReference) -> Result<DataFrame> {
    let columns = reference
        .named_values()
        .into_iter()
        .map(|(name, value)| Column::new(name.into(), &[value]))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Identifier columns followed by the water-balance columns.
fn balance_frame(id_columns: &[&str], rows: Vec<(Vec<i64>, WaterBalance)>) -> Result<DataFrame> {
    let mut id_values: Vec<Vec<i64>> = vec![Vec::with_capacity(rows.len()); id_columns.len()];
    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); results::AGGREGATED.len()];
    for (key, balance) in rows {
        for (i, id) in key.into_iter().enumerate() {
            id_values[i].push(id);
        }
        for (i, value) in balance.values().into_iter().enumerate() {
            values[i].push(value);
        }
    }

    let mut columns: Vec<Column> = id_columns
        .iter()
        .zip(&id_values)
        .map(|(name, v)| Column::new((*name).into(), v))
        .collect();
    columns.extend(
        results::AGGREGATED
            .iter()
            .zip(&values)
            .map(|(name, v)| Column::new((*name).into(), v)),
    );
    Ok(DataFrame::new(columns)?)
}

/// Values of one intermediate level.
pub fn level_values(aggregation: &Aggregation, level: Level) -> Result<DataFrame> {
    match level {
        Level::Profile => balance_frame(
            &[ids::SIM_ID, ids::GEN_ID, ids::LANU_ID],
            aggregation
                .profile
                .values
                .iter()
                .map(|(&(s, g, l), b)| (vec![s, g, l], *b))
                .collect(),
        ),
        Level::Landuse => balance_frame(
            &[ids::SIM_ID, ids::GEN_ID, ids::NAT_ID],
            aggregation
                .landuse
                .values
                .iter()
                .map(|(&(s, g, n), b)| (vec![s, g, n], *b))
                .collect(),
        ),
        Level::Region => balance_frame(
            &[ids::SIM_ID, ids::GEN_ID],
            aggregation
                .region
                .values
                .iter()
                .map(|(&(s, g), b)| (vec![s, g], *b))
                .collect(),
        ),
        Level::Polygon => balance_frame(
            &[ids::GEN_ID],
            aggregation
                .polygon
                .values
                .iter()
                .map(|(&g, b)| (vec![g], *b))
                .collect(),
        ),
    }
}

/// The full coefficient chain, one row per soil profile path.
pub fn coefficient_chain(rows: &[ChainRow]) -> Result<DataFrame> {
    let mut gen = Vec::with_capacity(rows.len());
    let mut sim = Vec::with_capacity(rows.len());
    let mut nat = Vec::with_capacity(rows.len());
    let mut lanu = Vec::with_capacity(rows.len());
    let mut bf = Vec::with_capacity(rows.len());
    let mut factors: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); 5];
    let mut product = Vec::with_capacity(rows.len());

    for row in rows {
        gen.push(row.gen_id);
        sim.push(row.sim_id);
        nat.push(row.nat_id);
        lanu.push(row.lanu_id);
        bf.push(row.bf_id);
        for (i, f) in row.factors.iter().enumerate() {
            factors[i].push(*f);
        }
        product.push(row.product());
    }

    let mut columns = vec![
        Column::new(ids::GEN_ID.into(), &gen),
        Column::new(ids::SIM_ID.into(), &sim),
        Column::new(ids::NAT_ID.into(), &nat),
        Column::new(ids::LANU_ID.into(), &lanu),
        Column::new(ids::BF_ID.into(), &bf),
    ];
    columns.extend(
        coefficients::CHAIN
            .iter()
            .zip(&factors)
            .map(|(name, v)| Column::new((*name).into(), v)),
    );
    columns.push(Column::new(coefficients::PRODUCT.into(), &product));
    Ok(DataFrame::new(columns)?)
}

/// Land-use coefficients with their source.
///
/// `sim_id` is null for coefficients shared by all polygons of a pair.
pub fn landuse_coefficients(table: &LanduseCoefficients) -> Result<DataFrame> {
    let mut sim: Vec<Option<i64>> = Vec::with_capacity(table.len());
    let mut gen = Vec::with_capacity(table.len());
    let mut nat = Vec::with_capacity(table.len());
    let mut lanu = Vec::with_capacity(table.len());
    let mut coef = Vec::with_capacity(table.len());
    let mut source = Vec::with_capacity(table.len());
    for (&(g, n, l), c) in &table.shared {
        sim.push(None);
        gen.push(g);
        nat.push(n);
        lanu.push(l);
        coef.push(c.coef);
        source.push(c.source.label());
    }
    for (&(s, g, n, l), &c) in &table.flat {
        sim.push(Some(s));
        gen.push(g);
        nat.push(n);
        lanu.push(l);
        coef.push(c);
        source.push(LanduseSource::Flat.label());
    }
    Ok(DataFrame::new(vec![
        Column::new(ids::SIM_ID.into(), &sim),
        Column::new(ids::GEN_ID.into(), &gen),
        Column::new(ids::NAT_ID.into(), &nat),
        Column::new(ids::LANU_ID.into(), &lanu),
        Column::new(coefficients::COEF_LANU.into(), &coef),
        Column::new(coefficients::SOURCE.into(), &source),
    ])?)
}

/// The clipped areas with their share and legend.
pub fn clip(clip: &ClipSet) -> Result<DataFrame> {
    let n = clip.areas().len();
    let mut sim = Vec::with_capacity(n);
    let mut gen = Vec::with_capacity(n);
    let mut nat = Vec::with_capacity(n);
    let mut area = Vec::with_capacity(n);
    let mut anteil = Vec::with_capacity(n);
    let mut color = Vec::with_capacity(n);
    let mut legend_text = Vec::with_capacity(n);
    let mut legend_short = Vec::with_capacity(n);
    let mut wkt = Vec::with_capacity(n);
    for (&(s, g, na), clipped) in clip.areas() {
        sim.push(s);
        gen.push(g);
        nat.push(na);
        area.push(clipped.row.area);
        anteil.push(clipped.anteil);
        color.push(clipped.row.color.clone());
        legend_text.push(clipped.row.legend_text.clone());
        legend_short.push(clipped.row.legend_short.clone());
        wkt.push(geometry::to_wkt(&clipped.row.geometry));
    }
    Ok(DataFrame::new(vec![
        Column::new(ids::SIM_ID.into(), &sim),
        Column::new(ids::GEN_ID.into(), &gen),
        Column::new(ids::NAT_ID.into(), &nat),
        Column::new(layer::AREA.into(), &area),
        Column::new(layer::ANTEIL.into(), &anteil),
        Column::new(layer::COLOR.into(), &color),
        Column::new(layer::LEGEND_TEXT.into(), &legend_text),
        Column::new(layer::LEGEND_SHORT.into(), &legend_short),
        Column::new(layer::GEOMETRY.into(), &wkt),
    ])?)
}

/// The (gen_id, nat_id) pairs that needed the buffer search.
pub fn missing_landuses(resolution: &Resolution) -> Result<DataFrame> {
    let missing = resolution.missing();
    let mut gen = Vec::with_capacity(missing.len());
    let mut nat = Vec::with_capacity(missing.len());
    let mut area = Vec::with_capacity(missing.len());
    let mut resolved = Vec::with_capacity(missing.len());
    let mut dist = Vec::with_capacity(missing.len());
    for m in missing.values() {
        gen.push(m.gen_id);
        nat.push(m.nat_id);
        area.push(m.area);
        resolved.push(m.resolved);
        dist.push(m.radius_km);
    }
    Ok(DataFrame::new(vec![
        Column::new(ids::GEN_ID.into(), &gen),
        Column::new(ids::NAT_ID.into(), &nat),
        Column::new(layer::AREA.into(), &area),
        Column::new(resolver::RESOLVED.into(), &resolved),
        Column::new(resolver::NOLANU_DIST.into(), &dist),
    ])?)
}

/// Level-2 values per clipped area with the soil legend.
pub fn results_by_soil_group(rows: &[ClipResult]) -> Result<DataFrame> {
    let legend: DataFrame = DataFrame::new(vec![
        Column::new(
            layer::LEGEND_TEXT.into(),
            &rows.iter().map(|r| r.legend_text.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            layer::LEGEND_SHORT.into(),
            &rows.iter().map(|r| r.legend_short.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            layer::COLOR.into(),
            &rows.iter().map(|r| r.color.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            layer::AREA.into(),
            &rows.iter().map(|r| r.area).collect::<Vec<_>>(),
        ),
    ])?;
    let values = balance_frame(
        &[ids::SIM_ID, ids::GEN_ID, ids::NAT_ID],
        rows.iter()
            .map(|r| (vec![r.key.0, r.key.1, r.key.2], r.balance))
            .collect(),
    )?;
    Ok(values.hstack(legend.get_columns())?)
}

/// Write `df` as CSV with a header row.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}
