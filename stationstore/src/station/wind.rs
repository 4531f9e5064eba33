use std::f64::consts::PI;
use std::time::Duration;

use super::counters::PulseCounter;

const CM_IN_A_KM: f64 = 100_000.0;
const SEC_IN_HOUR: f64 = 3600.0;
const ANEMOMETER_RADIUS_CM: f64 = 9.0;
const ANEMOMETER_FACTOR: f64 = 1.18;
const PULSES_PER_ROTATION: f64 = 2.0;

/// Vane output voltage (rounded to 0.1 V) for each compass point.
const VANE_TABLE: [(f64, &str); 16] = [
    (0.4, "N"),
    (1.4, "NNE"),
    (1.2, "NE"),
    (2.8, "ENE"),
    (2.7, "E"),
    (2.9, "ESE"),
    (2.2, "SE"),
    (2.5, "SSE"),
    (1.8, "S"),
    (2.0, "SSW"),
    (0.7, "SW"),
    (0.8, "WSW"),
    (0.1, "W"),
    (0.3, "WNW"),
    (0.2, "NW"),
    (0.6, "NNW"),
];

/// Anemometer speed in km/h for `pulses` counted over `window`.
pub fn wind_speed_kmh(pulses: u64, window: Duration) -> f64 {
    let seconds = window.as_secs_f64();
    if seconds == 0.0 {
        return 0.0;
    }
    let rotations = pulses as f64 / PULSES_PER_ROTATION;
    let circumference_cm = 2.0 * PI * ANEMOMETER_RADIUS_CM;
    let distance_km = circumference_cm * rotations / CM_IN_A_KM;
    distance_km / seconds * SEC_IN_HOUR * ANEMOMETER_FACTOR
}

/// Compass point for a vane reading, `None` when the voltage is between
/// table entries.
pub fn vane_direction(volts: f64) -> Option<&'static str> {
    let tenths = (volts * 10.0).round() as i64;
    VANE_TABLE
        .iter()
        .find(|(v, _)| (v * 10.0).round() as i64 == tenths)
        .map(|(_, point)| *point)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindSummary {
    pub average_kmh: f64,
    pub gust_kmh: f64,
    pub direction: Option<&'static str>,
}

/// Speed and direction samples taken across one reporting interval.
#[derive(Debug, Default)]
pub struct WindWindow {
    speeds: Vec<f64>,
    directions: Vec<&'static str>,
}

impl WindWindow {
    pub fn new() -> WindWindow {
        WindWindow::default()
    }

    /// Takes the pulses counted over `window` plus one vane reading.
    pub fn sample(&mut self, counter: &PulseCounter, window: Duration, vane_volts: f64) {
        let speed = wind_speed_kmh(counter.take(), window);
        log::debug!("wind speed = {speed:.1}");
        self.speeds.push(speed);
        match vane_direction(vane_volts) {
            Some(point) => self.directions.push(point),
            None => log::debug!("vane voltage {vane_volts:.2} is not a compass point"),
        }
    }

    pub fn len(&self) -> usize {
        self.speeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty()
    }

    /// Mean and max speed plus the most common direction (earliest wins a
    /// tie). Clears the window. `None` when nothing was sampled.
    pub fn finish(&mut self) -> Option<WindSummary> {
        if self.speeds.is_empty() {
            return None;
        }
        let average_kmh = self.speeds.iter().sum::<f64>() / self.speeds.len() as f64;
        let gust_kmh = self.speeds.iter().copied().fold(f64::MIN, f64::max);
        let direction = modal(&self.directions);
        self.speeds.clear();
        self.directions.clear();
        Some(WindSummary {
            average_kmh,
            gust_kmh,
            direction,
        })
    }
}

fn modal(points: &[&'static str]) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for point in points {
        let count = points.iter().filter(|p| *p == point).count();
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((point, count));
        }
    }
    best.map(|(point, _)| point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_from_pulses() {
        // One rotation per second: 2π·9 cm/s.
        let expected = 2.0 * PI * 9.0 / 100_000.0 * 3600.0 * 1.18;
        let speed = wind_speed_kmh(2, Duration::from_secs(1));
        assert!((speed - expected).abs() < 1e-9);
        assert_eq!(wind_speed_kmh(0, Duration::from_secs(7)), 0.0);
        assert_eq!(wind_speed_kmh(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn vane_lookup_rounds_to_tenths() {
        assert_eq!(vane_direction(0.41), Some("N"));
        assert_eq!(vane_direction(2.86), Some("ESE"));
        assert_eq!(vane_direction(0.58), Some("NNW"));
        assert_eq!(vane_direction(3.2), None);
    }

    #[test]
    fn window_summary() {
        let counter = PulseCounter::new();
        let mut window = WindWindow::new();
        for (pulses, volts) in [(2, 0.4), (6, 2.7), (4, 0.4), (0, 3.3)] {
            for _ in 0..pulses {
                counter.pulse();
            }
            window.sample(&counter, Duration::from_secs(1), volts);
        }
        assert_eq!(window.len(), 4);

        let one = wind_speed_kmh(2, Duration::from_secs(1));
        let summary = window.finish().unwrap();
        assert!((summary.average_kmh - one * 1.5).abs() < 1e-9);
        assert!((summary.gust_kmh - one * 3.0).abs() < 1e-9);
        assert_eq!(summary.direction, Some("N"));
        assert!(window.is_empty());
        assert_eq!(window.finish(), None);
    }

    #[test]
    fn ties_go_to_the_earliest_direction() {
        assert_eq!(modal(&["SW", "N", "N", "SW"]), Some("SW"));
        assert_eq!(modal(&[]), None);
    }
}
