//! Sampling arithmetic for the weather station sensors. The acquisition loop
//! feeds raw pulses and voltages in and builds a `Record` from the results.

pub mod counters;
pub mod rain;
pub mod wind;
