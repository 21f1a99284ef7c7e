//! Quoted implied volatility to total variance in log-moneyness coordinates.

use crate::calibration::types::{CalibrationPoint, CalibrationSide};
use crate::models::utils::log_moneyness;
use crate::quotes::NormalizedQuote;

/// Map one quote to `(k, T, w)`, or `None` when the implied vol is missing or
/// any of implied vol, spot, strike or time to expiry is non-positive.
pub fn to_calibration_point(q: &NormalizedQuote) -> Option<CalibrationPoint> {
    let iv = q.implied_vol?;
    let t = q.time_to_expiry_years;
    let positive = |v: f64| v > 0.0 && v.is_finite();
    if !(positive(iv) && positive(q.underlying_last) && positive(q.strike) && positive(t)) {
        return None;
    }

    Some(CalibrationPoint {
        k: log_moneyness(q.strike, q.underlying_last),
        t,
        w: iv * iv * t,
    })
}

/// Calibration points for every quote on the selected side(s), in input order.
pub fn calibration_points(
    quotes: &[NormalizedQuote],
    side: CalibrationSide,
) -> Vec<CalibrationPoint> {
    quotes
        .iter()
        .filter(|q| side.includes(q.option_type))
        .filter_map(to_calibration_point)
        .collect()
}
