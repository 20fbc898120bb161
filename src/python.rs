use std::path::PathBuf;

use chrono::Utc;
use pyo3::exceptions::PyKeyError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3_polars::PyDataFrame;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::diagnostics::MessageCatalog;
use crate::error::NaturwbError;
use crate::frames::{self, Level};
use crate::pool::{PooledQuery, QueryPool};
use crate::query;
use crate::store::InMemoryStore;

/// A loaded reference snapshot plus the pool of finished queries.
#[pyclass(name = "ReferenceDatabase")]
pub struct PyReferenceDatabase {
    store: InMemoryStore,
    config: EngineConfig,
    catalog: MessageCatalog,
    pool: QueryPool,
}

#[pymethods]
impl PyReferenceDatabase {
    #[new]
    #[pyo3(signature = (snapshot_dir, config_path=None, messages_path=None))]
    fn new(
        snapshot_dir: String,
        config_path: Option<String>,
        messages_path: Option<String>,
    ) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::from_file(&PathBuf::from(path))?,
            None => EngineConfig::builtin()?,
        };
        let catalog = match messages_path {
            Some(path) => MessageCatalog::from_file(&PathBuf::from(path))?,
            None => MessageCatalog::builtin()?,
        };
        let store = InMemoryStore::from_csv_dir(&PathBuf::from(snapshot_dir))?;
        let pool = QueryPool::new(config.pool_max_queries);
        Ok(Self {
            store,
            config,
            catalog,
            pool,
        })
    }

    /// Run a query for a WKT polygon in EPSG:25832. Returns the query id.
    fn query(&mut self, wkt: &str) -> PyResult<String> {
        let outcome = query::run_query_wkt(&self.store, wkt, &self.config, &self.catalog)?;
        Ok(self.pool.push(outcome).to_string())
    }

    /// Absolute and relative reference values of a query.
    fn reference<'py>(&self, py: Python<'py>, query_id: &str) -> PyResult<Bound<'py, PyDict>> {
        let query = self.lookup(query_id)?;
        let dict = PyDict::new(py);
        for (name, value) in query.outcome.reference().named_values() {
            dict.set_item(name, value)?;
        }
        Ok(dict)
    }

    /// Diagnostic messages as (key, text) pairs.
    fn messages(&self, query_id: &str) -> PyResult<Vec<(String, String)>> {
        let query = self.lookup(query_id)?;
        Ok(query
            .outcome
            .diagnostics
            .messages
            .iter()
            .map(|m| (m.key.clone(), m.text.clone()))
            .collect())
    }

    /// Diagnostic messages as one bullet list.
    fn messages_text(&self, query_id: &str) -> PyResult<String> {
        Ok(self.lookup(query_id)?.outcome.diagnostics.to_text())
    }

    /// One of the audit frames: reference, coef_all, coef_lanu, clip, missing_lanus,
    /// results_genid, res_gat_1, res_gat_2, res_sim, res_gen.
    fn frame(&self, query_id: &str, name: &str) -> PyResult<PyDataFrame> {
        let outcome = &self.lookup(query_id)?.outcome;
        let df = match name {
            "reference" => frames::reference(outcome.reference())?,
            "coef_all" => frames::coefficient_chain(&outcome.chain_rows())?,
            "coef_lanu" => frames::landuse_coefficients(&outcome.aggregation.landuse.coefficients)?,
            "clip" => frames::clip(&outcome.clip)?,
            "missing_lanus" => frames::missing_landuses(&outcome.resolution)?,
            "results_genid" => frames::results_by_soil_group(&outcome.results_by_soil_group())?,
            "res_gat_1" => frames::level_values(&outcome.aggregation, Level::Profile)?,
            "res_gat_2" => frames::level_values(&outcome.aggregation, Level::Landuse)?,
            "res_sim" => frames::level_values(&outcome.aggregation, Level::Region)?,
            "res_gen" => frames::level_values(&outcome.aggregation, Level::Polygon)?,
            other => return Err(PyKeyError::new_err(format!("unknown frame {other}"))),
        };
        Ok(PyDataFrame(df))
    }

    /// All pooled queries side by side.
    fn comparing_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.pool.comparing_frame()?))
    }

    /// Drop queries older than `hours`. Returns the number dropped.
    fn evict_older_than(&mut self, hours: i64) -> PyResult<usize> {
        Ok(self.pool.evict_older_than_hours(hours, Utc::now())?)
    }

    fn query_ids(&self) -> Vec<String> {
        self.pool.iter().map(|q| q.id.to_string()).collect()
    }
}

impl PyReferenceDatabase {
    fn lookup(&self, query_id: &str) -> PyResult<&PooledQuery> {
        let id = Uuid::parse_str(query_id)
            .map_err(|e| NaturwbError::InvalidData(format!("invalid query id {query_id}: {e}")))?;
        self.pool
            .get(&id)
            .ok_or_else(|| PyKeyError::new_err(format!("no query with id {query_id}")))
    }
}
