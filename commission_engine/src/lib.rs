//! Commission Engine library crate.
//!
//! This crate exposes the tiered commission calculation, the sales
//! aggregation engine and the report API as reusable modules.  External
//! applications may depend on the `commission_engine` crate and call
//! `commission::calculate_commission` or `engine::aggregate_period`
//! directly, or embed the API via `api::build_router`.

pub mod api;
pub mod commission;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;
