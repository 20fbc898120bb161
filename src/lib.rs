//! NatUrWB: the natural water balance of an urban area, derived from
//! simulation results of the undeveloped reference state.

pub mod aggregation;
pub mod chain;
pub mod clip;
pub mod coefficients;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod keyed;
pub mod model;
pub mod pool;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod snapshot;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use config::EngineConfig;
pub use diagnostics::{Diagnostics, MessageCatalog};
pub use error::{NaturwbError, Result};
pub use model::{NaturwbReference, RelativeShares, WaterBalance};
pub use pool::QueryPool;
pub use query::{run_query, run_query_wkt, QueryOutcome};
pub use store::{InMemoryStore, ReferenceStore};

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Identifiers
    let ids = PyModule::new(m.py(), "ids")?;
    ids.add("SIM_ID", schema::ids::SIM_ID)?;
    ids.add("GEN_ID", schema::ids::GEN_ID)?;
    ids.add("NAT_ID", schema::ids::NAT_ID)?;
    ids.add("LANU_ID", schema::ids::LANU_ID)?;
    ids.add("BF_ID", schema::ids::BF_ID)?;
    m.add_submodule(&ids)?;

    // Water balance
    let results = PyModule::new(m.py(), "results")?;
    results.add("AGGREGATED", schema::results::AGGREGATED.to_vec())?;
    results.add("BFID_AREA", schema::results::BFID_AREA)?;
    m.add_submodule(&results)?;

    // Relative shares
    let relative = PyModule::new(m.py(), "relative")?;
    relative.add("RUNOFF_REL", schema::relative::RUNOFF_REL)?;
    relative.add("TP_REL", schema::relative::TP_REL)?;
    relative.add("ET_REL", schema::relative::ET_REL)?;
    m.add_submodule(&relative)?;

    // Coefficients
    let coefficients = PyModule::new(m.py(), "coefficients")?;
    coefficients.add("CHAIN", schema::coefficients::CHAIN.to_vec())?;
    coefficients.add("PRODUCT", schema::coefficients::PRODUCT)?;
    coefficients.add("SOURCE", schema::coefficients::SOURCE)?;
    m.add_submodule(&coefficients)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyReferenceDatabase>()?;
    add_schema_exports(m)?;
    Ok(())
}
