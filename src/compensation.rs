//! Host-side temperature compensation for conductivity readings.
//!
//! The sensor firmware normalizes EC to 25 °C with a fixed 2.00 %/°C
//! coefficient. Bench calibration against a 12.88 mS/cm standard shows the
//! real coefficient varies with temperature, so the host recomputes the
//! compensation from the raw (uncompensated) EC value using a bucketed
//! coefficient table.

/// Returns the compensation coefficient k for a given water temperature.
///
/// Step function with inclusive upper bucket edges: 5 °C and below uses
/// 1.80 %, 35 °C uses 1.94 %. There is no hysteresis; repeated calls with
/// the same temperature always return the same coefficient.
pub fn coefficient(temp: f64) -> f64 {
    if temp <= 5.0 {
        0.0180
    } else if temp <= 10.0 {
        0.0184
    } else if temp <= 15.0 {
        0.0190
    } else if temp <= 25.0 {
        0.0190
    } else if temp <= 30.0 {
        0.0192
    } else {
        0.0194
    }
}

/// Normalizes a raw EC reading to the 25 °C reference temperature.
///
/// `C25 = raw_ec / (1 + k * (temp - 25))`
///
/// At exactly 25 °C the denominator is 1 and the raw value passes through
/// unchanged. There is no lower bound on `temp`; negative or extreme
/// temperatures follow the same formula.
pub fn compensate(raw_ec: f64, temp: f64) -> f64 {
    raw_ec / (1.0 + coefficient(temp) * (temp - 25.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_bucket_edges_are_inclusive() {
        assert_eq!(coefficient(5.0), 0.0180);
        assert_eq!(coefficient(10.0), 0.0184);
        assert_eq!(coefficient(15.0), 0.0190);
        assert_eq!(coefficient(25.0), 0.0190);
        assert_eq!(coefficient(30.0), 0.0192);
        assert_eq!(coefficient(35.0), 0.0194);
    }

    #[test]
    fn coefficient_between_edges() {
        assert_eq!(coefficient(-10.0), 0.0180);
        assert_eq!(coefficient(5.1), 0.0184);
        assert_eq!(coefficient(12.0), 0.0190);
        assert_eq!(coefficient(20.0), 0.0190);
        assert_eq!(coefficient(25.1), 0.0192);
        assert_eq!(coefficient(100.0), 0.0194);
    }

    #[test]
    fn coefficient_is_a_pure_step_function() {
        // Same input, same output, regardless of call order.
        let first = coefficient(24.0);
        let _ = coefficient(30.0);
        assert_eq!(coefficient(24.0), first);
    }

    #[test]
    fn compensate_at_reference_temperature_is_identity() {
        // Denominator is exactly 1 at 25 °C.
        assert_eq!(compensate(12.5, 25.0), 12.5);
        assert_eq!(compensate(0.0, 25.0), 0.0);
        assert_eq!(compensate(1234.567, 25.0), 1234.567);
    }

    #[test]
    fn compensate_cold_sample() {
        // 10 / (1 + 0.018 * (5 - 25)) = 10 / 0.64 = 15.625
        let smart = compensate(10.0, 5.0);
        assert!((smart - 15.625).abs() < 1e-9, "got {smart}");
    }

    #[test]
    fn compensate_warm_sample() {
        // 10 / (1 + 0.0192 * 5) = 10 / 1.096
        let smart = compensate(10.0, 30.0);
        assert!((smart - 10.0 / 1.096).abs() < 1e-9, "got {smart}");
    }

    #[test]
    fn compensate_accepts_negative_temperatures() {
        // No clamping below the table: the formula is applied as-is.
        let smart = compensate(10.0, -5.0);
        assert!((smart - 10.0 / (1.0 - 0.018 * 30.0)).abs() < 1e-9);
    }
}
