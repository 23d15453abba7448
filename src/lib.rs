//! STM-Graph: spatio-temporal graph dataset wizard
//!
//! A terminal wizard that walks a user through preprocessing raw
//! geo-referenced event data, partitioning space into regions, generating a
//! temporal graph dataset, plotting it, and training a GNN on it. The heavy
//! lifting is done by the `stm_graph` Python library behind
//! [`toolkit::GraphToolkit`].

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod toolkit;
pub mod utils;
pub mod viewer;
pub mod wizard;
pub mod worker;
