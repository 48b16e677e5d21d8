//! Remote compression job relay
//!
//! Submits uploaded media to an external compression API, records the
//! returned job against the object's metadata, and reconciles outstanding
//! jobs by polling the API for status and results.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
