pub mod essvi_calibrator;
pub mod essvi_model;
