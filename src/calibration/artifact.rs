//! Calibration artifact: a single CSV row `a0,a1,rho,eta,residual,num_points`.

use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

use crate::calibration::types::CalibrationResult;
use crate::error::{SurfaceError, SurfaceResult};
use crate::models::essvi::essvi_model::EssviParams;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    pub a0: f64,
    pub a1: f64,
    pub rho: f64,
    pub eta: f64,
    pub residual: f64,
    pub num_points: usize,
}

impl From<&CalibrationResult> for CalibrationArtifact {
    fn from(result: &CalibrationResult) -> Self {
        Self {
            a0: result.params.a0,
            a1: result.params.a1,
            rho: result.params.rho,
            eta: result.params.eta,
            residual: result.cost,
            num_points: result.num_points,
        }
    }
}

impl TryFrom<CalibrationArtifact> for CalibrationResult {
    type Error = SurfaceError;

    /// Rejects artifacts whose parameters fall outside the surface domain.
    fn try_from(a: CalibrationArtifact) -> SurfaceResult<Self> {
        Ok(Self {
            params: EssviParams::new(a.a0, a.a1, a.rho, a.eta)?,
            cost: a.residual,
            num_points: a.num_points,
        })
    }
}

pub fn write_artifact<P: AsRef<Path>>(path: P, result: &CalibrationResult) -> SurfaceResult<()> {
    let file = std::fs::File::create(path)?;
    write_artifact_to(file, result)
}

pub fn write_artifact_to<W: Write>(writer: W, result: &CalibrationResult) -> SurfaceResult<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.serialize(CalibrationArtifact::from(result))?;
    wtr.flush()?;
    Ok(())
}

pub fn read_artifact<P: AsRef<Path>>(path: P) -> SurfaceResult<CalibrationResult> {
    let file = std::fs::File::open(path)?;
    read_artifact_from(file)
}

/// Reads the first row; further rows are ignored.
pub fn read_artifact_from<R: Read>(reader: R) -> SurfaceResult<CalibrationResult> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let artifact: CalibrationArtifact = rdr
        .deserialize()
        .next()
        .ok_or_else(|| SurfaceError::invalid_input("calibration artifact has no rows"))??;
    CalibrationResult::try_from(artifact)
}
