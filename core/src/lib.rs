//! Avoided-contact gain calculator.
//!
//! Turns loosely labelled channel performance records into
//! transactions-per-access and transactions-per-user ratios, projects
//! avoided contact volume per subchannel, and ranks subchannels with a
//! Pareto cut.

pub mod aggregator;
pub mod batch;
pub mod category;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod pareto;
pub mod projection;
pub mod ratio;
pub mod retention;
pub mod snapshot;
pub mod types;
