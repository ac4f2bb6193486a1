//! Sensor Fleet - simulated industrial sensors feeding a concurrent
//! classification, alerting and persistence pipeline.
//!
//! This library exposes the core modules for testing and reuse.

pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod services;
