//! Loading an [`InMemoryStore`] from a directory of CSV files.
//!
//! Expected files, all with a header row and geometries as WKT:
//!
//! - `simulation_polygons.csv`: sim_id, gen_id, geometry, color, legend and quality columns
//! - `natural_regions.csv`: nat_id, name, geometry
//! - `lookup_polygons.csv`: gen_id, nat_id, lanu_id, lanu_name, is_urban, geometry, optional area
//! - `results.csv`: sim_id, gen_id, bf_id, lanu_id, water-balance columns, bfid_area

use std::path::Path;

use geo::MultiPolygon;
use polars::prelude::*;

use crate::error::{NaturwbError, Result};
use crate::geometry;
use crate::model::{QualityFlag, SimulationInfo, SimulationResult};
use crate::schema::{ids, layer, results, sim_info};
use crate::store::{InMemoryStore, LookupPolygon, NaturalRegion, SimulationPolygon};

pub const SIMULATION_POLYGONS: &str = "simulation_polygons.csv";
pub const NATURAL_REGIONS: &str = "natural_regions.csv";
pub const LOOKUP_POLYGONS: &str = "lookup_polygons.csv";
pub const RESULTS: &str = "results.csv";

const SIM_INFO_FLOATS: [&str; 11] = [
    sim_info::BFID_UNDEF,
    sim_info::WEA_DIST,
    sim_info::WEA_DIST_N,
    sim_info::SL_DIST,
    sim_info::SL_STD,
    sim_info::SUN_DIST,
    sim_info::RS_STD,
    sim_info::WEA_T_STD,
    sim_info::WEA_ET_STD,
    sim_info::WEA_N_WIHJ_STD,
    sim_info::WEA_N_SOHJ_STD,
];

const SIM_INFO_INTS: [&str; 7] = [
    sim_info::STAT_ID,
    sim_info::BUEK_FLAG,
    sim_info::LANU_FLAG,
    sim_info::WEA_FLAG,
    sim_info::WEA_FLAG_N,
    sim_info::SL_FLAG,
    sim_info::SUN_FLAG,
];

/// A CSV file parsed into typed columns.
struct CsvTable {
    file: &'static str,
    df: DataFrame,
}

impl CsvTable {
    fn load(dir: &Path, file: &'static str, required: &[&str], floats: &[&str], ints: &[&str]) -> Result<Self> {
        let raw = read_csv_as_strings(&dir.join(file))?;
        require_columns(&raw, required)?;

        let schema = raw.schema().clone();
        let mut casts = Vec::new();
        for (names, dtype) in [(floats, DataType::Float64), (ints, DataType::Int64)] {
            for name in names.iter().filter(|n| schema.contains(n)) {
                casts.push(
                    col(*name)
                        .str()
                        .strip_chars(lit(" \t\r\n"))
                        .cast(dtype.clone()),
                );
            }
        }
        let df = raw.lazy().with_columns(casts).collect()?;
        Ok(Self { file, df })
    }

    fn height(&self) -> usize {
        self.df.height()
    }

    fn has(&self, column: &str) -> bool {
        self.df.column(column).is_ok()
    }

    fn missing(&self, column: &str, row: usize) -> NaturwbError {
        NaturwbError::InvalidData(format!(
            "{}: row {} has no valid value in column {column}",
            self.file,
            row + 1
        ))
    }

    fn opt_int(&self, column: &str, row: usize) -> Result<Option<i64>> {
        if !self.has(column) {
            return Ok(None);
        }
        Ok(self.df.column(column)?.i64()?.get(row))
    }

    fn int(&self, column: &str, row: usize) -> Result<i64> {
        self.opt_int(column, row)?.ok_or_else(|| self.missing(column, row))
    }

    fn flag(&self, flag: QualityFlag, row: usize) -> Result<u8> {
        let column = flag.column();
        let value = self.opt_int(column, row)?.unwrap_or(0);
        match u8::try_from(value) {
            Ok(code) if code <= flag.max_code() => Ok(code),
            _ => Err(NaturwbError::InvalidData(format!(
                "{}: row {} has {column} = {value}, expected 0 to {}",
                self.file,
                row + 1,
                flag.max_code()
            ))),
        }
    }

    fn opt_float(&self, column: &str, row: usize) -> Result<Option<f64>> {
        if !self.has(column) {
            return Ok(None);
        }
        Ok(self.df.column(column)?.f64()?.get(row))
    }

    fn float(&self, column: &str, row: usize) -> Result<f64> {
        self.opt_float(column, row)?.ok_or_else(|| self.missing(column, row))
    }

    fn text(&self, column: &str, row: usize) -> Result<String> {
        if !self.has(column) {
            return Ok(String::new());
        }
        Ok(self
            .df
            .column(column)?
            .str()?
            .get(row)
            .map(|s| s.trim().to_string())
            .unwrap_or_default())
    }

    fn boolean(&self, column: &str, row: usize) -> Result<bool> {
        let text = self.text(column, row)?.to_ascii_lowercase();
        Ok(matches!(text.as_str(), "1" | "t" | "true" | "yes"))
    }

    fn geometry(&self, row: usize) -> Result<MultiPolygon<f64>> {
        let text = self.text(layer::GEOMETRY, row)?;
        geometry::parse_polygon_wkt(&text).map_err(|err| {
            NaturwbError::InvalidGeometry(format!("{}: row {}: {err}", self.file, row + 1))
        })
    }
}

/// Read a CSV file with all columns as String dtype and trimmed column names.
fn read_csv_as_strings(path: &Path) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(df)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for &col_name in required {
        if df.column(col_name).is_err() {
            return Err(NaturwbError::MissingColumn(col_name.to_string()));
        }
    }
    Ok(())
}

fn simulation_info(table: &CsvTable, row: usize, sim_id: i64) -> Result<SimulationInfo> {
    Ok(SimulationInfo {
        sim_id,
        stat_id: table.opt_int(sim_info::STAT_ID, row)?,
        buek_flag: table.flag(QualityFlag::BuekFlag, row)?,
        bfid_undef: table.opt_float(sim_info::BFID_UNDEF, row)?.unwrap_or(0.0),
        lanu_flag: table.flag(QualityFlag::LanuFlag, row)?,
        wea_flag: table.flag(QualityFlag::WeaFlag, row)?,
        wea_dist: table.opt_float(sim_info::WEA_DIST, row)?,
        wea_flag_n: table.flag(QualityFlag::WeaFlagN, row)?,
        wea_dist_n: table.opt_float(sim_info::WEA_DIST_N, row)?,
        sl_flag: table.flag(QualityFlag::SlFlag, row)?,
        sl_dist: table.opt_float(sim_info::SL_DIST, row)?,
        sl_std: table.opt_float(sim_info::SL_STD, row)?,
        sun_flag: table.flag(QualityFlag::SunFlag, row)?,
        sun_dist: table.opt_float(sim_info::SUN_DIST, row)?,
        rs_std: table.opt_float(sim_info::RS_STD, row)?,
        wea_t_std: table.opt_float(sim_info::WEA_T_STD, row)?,
        wea_et_std: table.opt_float(sim_info::WEA_ET_STD, row)?,
        wea_n_wihj_std: table.opt_float(sim_info::WEA_N_WIHJ_STD, row)?,
        wea_n_sohj_std: table.opt_float(sim_info::WEA_N_SOHJ_STD, row)?,
    })
}

impl InMemoryStore {
    /// Load a reference snapshot from `dir`.
    pub fn from_csv_dir(dir: &Path) -> Result<Self> {
        let mut store = InMemoryStore::new();

        let sims = CsvTable::load(
            dir,
            SIMULATION_POLYGONS,
            &[ids::SIM_ID, ids::GEN_ID, layer::GEOMETRY],
            &SIM_INFO_FLOATS,
            &[&[ids::SIM_ID, ids::GEN_ID][..], &SIM_INFO_INTS[..]].concat(),
        )?;
        for row in 0..sims.height() {
            let sim_id = sims.int(ids::SIM_ID, row)?;
            store = store.with_simulation_polygon(SimulationPolygon {
                sim_id,
                gen_id: sims.int(ids::GEN_ID, row)?,
                geometry: sims.geometry(row)?,
                color: sims.text(layer::COLOR, row)?,
                legend_text: sims.text(layer::LEGEND_TEXT, row)?,
                legend_short: sims.text(layer::LEGEND_SHORT, row)?,
                info: simulation_info(&sims, row, sim_id)?,
            });
        }

        let nats = CsvTable::load(
            dir,
            NATURAL_REGIONS,
            &[ids::NAT_ID, layer::GEOMETRY],
            &[],
            &[ids::NAT_ID],
        )?;
        for row in 0..nats.height() {
            store = store.with_natural_region(NaturalRegion {
                nat_id: nats.int(ids::NAT_ID, row)?,
                name: nats.text(layer::NAME, row)?,
                geometry: nats.geometry(row)?,
            });
        }

        let lookups = CsvTable::load(
            dir,
            LOOKUP_POLYGONS,
            &[ids::GEN_ID, ids::NAT_ID, ids::LANU_ID, layer::GEOMETRY],
            &[layer::AREA],
            &[ids::GEN_ID, ids::NAT_ID, ids::LANU_ID],
        )?;
        for row in 0..lookups.height() {
            let geometry = lookups.geometry(row)?;
            let area = match lookups.opt_float(layer::AREA, row)? {
                Some(area) => area,
                None => geometry::area(&geometry),
            };
            store = store.with_lookup_polygon(LookupPolygon {
                gen_id: lookups.int(ids::GEN_ID, row)?,
                nat_id: lookups.int(ids::NAT_ID, row)?,
                lanu_id: lookups.int(ids::LANU_ID, row)?,
                lanu_name: lookups.text(layer::LANU_NAME, row)?,
                is_urban: lookups.boolean(layer::IS_URBAN, row)?,
                area,
                geometry,
            });
        }

        let id_columns = [ids::SIM_ID, ids::GEN_ID, ids::BF_ID, ids::LANU_ID];
        let mut result_floats: Vec<&str> = results::RAW.to_vec();
        result_floats.push(results::BFID_AREA);
        let required: Vec<&str> = id_columns.iter().chain(&result_floats).copied().collect();
        let res = CsvTable::load(dir, RESULTS, &required, &result_floats, &id_columns)?;
        let mut rows = Vec::with_capacity(res.height());
        for row in 0..res.height() {
            rows.push(SimulationResult {
                sim_id: res.int(ids::SIM_ID, row)?,
                gen_id: res.int(ids::GEN_ID, row)?,
                bf_id: res.int(ids::BF_ID, row)?,
                lanu_id: res.int(ids::LANU_ID, row)?,
                n: res.float(results::N, row)?,
                kap_a: res.float(results::KAP_A, row)?,
                et: res.float(results::ET, row)?,
                pet: res.float(results::PET, row)?,
                oa: res.float(results::OA, row)?,
                za: res.float(results::ZA, row)?,
                tp: res.float(results::TP, row)?,
                za_gwnah_flag: res.float(results::ZA_GWNAH_FLAG, row)?,
                bfid_area: res.float(results::BFID_AREA, row)?,
            });
        }
        store = store.with_results(rows);

        store.validate()?;
        tracing::info!(
            target: "naturwb::snapshot",
            dir = %dir.display(),
            simulation_polygons = store.simulation_polygons().len(),
            natural_regions = store.natural_regions().len(),
            lookup_polygons = store.lookup_polygons().len(),
            "snapshot.loaded"
        );
        Ok(store)
    }
}
