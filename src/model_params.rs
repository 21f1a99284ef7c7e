//! Model-specific parameter containers used to tweak calibrators without hard-coding
//! constants in the model implementation. Each model provides its own struct
//! implementing [`ModelParams`] so the calibration entry points can pass
//! arbitrary parameters down to the calibrator in a type-erased fashion.

use serde::{Deserialize, Serialize};
use std::any::Any;

/// Marker trait for type-erased parameter structs.
pub trait ModelParams: Send + Sync + std::fmt::Debug {
    /// Returns the boxed value as `&dyn Any` so that callers can attempt a
    /// concrete `downcast_ref::<T>()` when the concrete type is known.
    fn as_any(&self) -> &dyn Any;
}

/// Uniform ranges the eSSVI calibrator draws each attempt's starting point from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EssviModelParams {
    /// Range for a0 as a multiple of the mean market total variance.
    pub a0_scale: (f64, f64),
    pub a1: (f64, f64),
    pub rho: (f64, f64),
    pub eta: (f64, f64),
}

impl Default for EssviModelParams {
    fn default() -> Self {
        Self {
            a0_scale: (0.001, 1.0),
            a1: (0.0, 1.0),
            rho: (-0.95, 0.95),
            eta: (0.1, 5.0),
        }
    }
}

impl ModelParams for EssviModelParams {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
