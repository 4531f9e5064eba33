use super::counters::PulseCounter;

/// Millimetres of rain per bucket tip.
pub const BUCKET_SIZE_MM: f64 = 0.2794;

#[derive(Debug, Clone, Default)]
pub struct RainGauge {
    tips: PulseCounter,
}

impl RainGauge {
    pub fn new() -> RainGauge {
        RainGauge::default()
    }

    /// Counter to hand to the bucket interrupt.
    pub fn counter(&self) -> PulseCounter {
        self.tips.clone()
    }

    /// Rainfall since the last call.
    pub fn take_rainfall_mm(&self) -> f64 {
        self.tips.take() as f64 * BUCKET_SIZE_MM
    }
}

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rainfall_is_read_and_reset() {
        let gauge = RainGauge::new();
        let bucket = gauge.counter();
        for _ in 0..3 {
            bucket.pulse();
        }
        assert_eq!(round_to(gauge.take_rainfall_mm(), 3), 0.838);
        assert_eq!(gauge.take_rainfall_mm(), 0.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(12.345_67, 1), 12.3);
        assert_eq!(round_to(1013.25, 1), 1013.3);
        assert_eq!(round_to(0.0, 3), 0.0);
    }
}
