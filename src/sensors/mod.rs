//! Sensor-data processing layer.
//!
//! Depends only on core. Holds the point-set preprocessing strategies the
//! registration pipeline invokes.

pub mod preprocessing;
