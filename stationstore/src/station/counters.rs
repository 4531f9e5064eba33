use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counts pulses from an interrupt-driven sensor (anemometer reed switch,
/// rain bucket). Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct PulseCounter {
    count: Arc<AtomicU64>,
}

impl PulseCounter {
    pub fn new() -> PulseCounter {
        PulseCounter::default()
    }

    /// Called from the interrupt handler.
    pub fn pulse(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn peek(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Reads and zeroes the count in one step, so a pulse landing between a
    /// read and a reset is never lost.
    pub fn take(&self) -> u64 {
        self.count.swap(0, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_resets() {
        let counter = PulseCounter::new();
        let handler = counter.clone();
        handler.pulse();
        handler.pulse();
        assert_eq!(counter.peek(), 2);
        assert_eq!(counter.take(), 2);
        assert_eq!(counter.take(), 0);
    }

    #[test]
    fn no_pulse_is_lost_across_concurrent_takes() {
        let counter = PulseCounter::new();
        let pulses_per_thread = 10_000;
        let pulsers: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..pulses_per_thread {
                        counter.pulse();
                    }
                })
            })
            .collect();

        let mut taken = 0;
        while pulsers.iter().any(|p| !p.is_finished()) {
            taken += counter.take();
        }
        for pulser in pulsers {
            pulser.join().unwrap();
        }
        taken += counter.take();
        assert_eq!(taken, 4 * pulses_per_thread);
    }
}
