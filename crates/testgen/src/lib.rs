//! Workload scripts for `sdslite_core`.
//!
//! A [`Script`](script::Script) is a JSON-serializable list of dataset
//! operations over a fixed number of datasets. [`replay`](replay::replay)
//! executes one against fresh in-memory datasets and reports the outcome of
//! every step, and [`generator`] produces random scripts that mix valid
//! writes with shared-dimension conflicts and cross-dataset references.

pub mod generator;
pub mod replay;
pub mod script;
