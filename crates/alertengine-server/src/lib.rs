//! Binary wiring: config, logging, and the health/metrics HTTP surface.

pub mod app;
pub mod logging;
