//! Enrollment pricing.

/// Member discount applied to every booking.
pub const MEMBER_DISCOUNT: f64 = 0.95;
/// Surcharge for sessions starting in the peak window.
pub const PEAK_SURCHARGE: f64 = 1.10;
/// First start time (inclusive) of the peak window.
pub const PEAK_START: &str = "18:00";
/// Last start time (inclusive) of the peak window.
pub const PEAK_END: &str = "22:00";

/// Returns `true` if a session starting at `start_hhmm` is in the peak window.
///
/// `start_hhmm` must be zero-padded `HH:MM`, so string order is time order.
#[must_use]
pub fn is_peak(start_hhmm: &str) -> bool {
    (PEAK_START..=PEAK_END).contains(&start_hhmm)
}

/// Final price of a booking: base price with the member discount, plus the
/// peak surcharge when the session starts between 18:00 and 22:00.
#[must_use]
pub fn compute_final_price(base_price: f64, start_hhmm: &str) -> f64 {
    let discounted = base_price * MEMBER_DISCOUNT;
    if is_peak(start_hhmm) {
        discounted * PEAK_SURCHARGE
    } else {
        discounted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_peak_session_gets_discount_and_surcharge() {
        assert_close(compute_final_price(100.0, "19:00"), 104.5);
    }

    #[test]
    fn test_off_peak_session_only_gets_discount() {
        assert_close(compute_final_price(100.0, "10:00"), 95.0);
    }

    #[test]
    fn test_peak_window_bounds_are_inclusive() {
        assert!(is_peak("18:00"));
        assert!(is_peak("22:00"));
        assert!(!is_peak("17:59"));
        assert!(!is_peak("22:01"));
    }
}
