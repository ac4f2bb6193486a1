//! Synthetic reading source, one per simulated device.

use chrono::Utc;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::DeviceSpec;
use crate::models::{MIN_VIBRATION, Reading};
use crate::pipeline::channel::ReadingSender;

/// Sampling ranges and anomaly odds for a simulated device.
///
/// Baselines are drawn once at construction; each cycle adds noise, and an
/// anomaly replaces the noise term of a single metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorProfile {
    pub base_temperature: (f64, f64),
    pub base_vibration: (f64, f64),
    pub base_voltage: (f64, f64),

    pub temperature_noise: (f64, f64),
    pub vibration_noise: (f64, f64),
    pub voltage_noise: (f64, f64),

    pub temperature_anomaly_probability: f64,
    pub temperature_anomaly: (f64, f64),
    pub vibration_anomaly_probability: f64,
    pub vibration_anomaly: (f64, f64),
    pub voltage_anomaly_probability: f64,
    pub voltage_anomaly: (f64, f64),
}

impl Default for GeneratorProfile {
    fn default() -> Self {
        Self {
            base_temperature: (25.0, 40.0),
            base_vibration: (0.5, 3.0),
            base_voltage: (210.0, 240.0),

            temperature_noise: (-3.0, 3.0),
            vibration_noise: (-0.5, 0.5),
            voltage_noise: (-5.0, 5.0),

            temperature_anomaly_probability: 0.05,
            temperature_anomaly: (20.0, 50.0),
            vibration_anomaly_probability: 0.03,
            vibration_anomaly: (5.0, 15.0),
            voltage_anomaly_probability: 0.02,
            voltage_anomaly: (-50.0, -30.0),
        }
    }
}

/// Pause between cycles, in time units.
const CYCLE_PAUSE_UNITS: (f64, f64) = (1.0, 2.0);

/// Log a progress line every this many packets.
const PROGRESS_EVERY: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid sampling range [{low}, {high}]: {source}")]
    Range {
        low: f64,
        high: f64,
        #[source]
        source: rand::distr::uniform::Error,
    },

    #[error("Invalid anomaly probability {0}")]
    Probability(f64),

    #[error("Generated non-finite {metric} value")]
    NonFinite { metric: &'static str },
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    temperature: f64,
    vibration: f64,
    voltage: f64,
}

/// Produces a noisy time series for one device.
#[derive(Debug)]
pub struct ReadingGenerator {
    device_id: String,
    device_name: String,
    profile: GeneratorProfile,
    baseline: Baseline,
    sequence: u64,
    packets_sent: u64,
    rng: StdRng,
}

impl ReadingGenerator {
    /// Create a generator seeded from the operating system.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the baseline cannot be drawn.
    pub fn new(device: &DeviceSpec) -> Result<Self, GenerationError> {
        Self::with_rng(device, StdRng::from_os_rng())
    }

    /// Create a generator driven by the given RNG (deterministic when seeded).
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the baseline cannot be drawn.
    pub fn with_rng(device: &DeviceSpec, rng: StdRng) -> Result<Self, GenerationError> {
        Self::with_profile(device, GeneratorProfile::default(), rng)
    }

    /// Create a generator with custom sampling ranges.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if the baseline cannot be drawn from the
    /// profile's ranges.
    pub fn with_profile(
        device: &DeviceSpec,
        profile: GeneratorProfile,
        mut rng: StdRng,
    ) -> Result<Self, GenerationError> {
        let baseline = Baseline {
            temperature: draw(&mut rng, profile.base_temperature)?,
            vibration: draw(&mut rng, profile.base_vibration)?,
            voltage: draw(&mut rng, profile.base_voltage)?,
        };

        Ok(Self {
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            profile,
            baseline,
            sequence: 0,
            packets_sent: 0,
            rng,
        })
    }

    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Draw the next reading.
    ///
    /// The sequence number only advances when a reading is actually produced,
    /// so a failed cycle leaves no gap.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if sampling fails or yields a non-finite value.
    pub fn next_reading(&mut self) -> Result<Reading, GenerationError> {
        let profile = self.profile;
        let mut temperature_noise = draw(&mut self.rng, profile.temperature_noise)?;
        let mut vibration_noise = draw(&mut self.rng, profile.vibration_noise)?;
        let mut voltage_noise = draw(&mut self.rng, profile.voltage_noise)?;

        // Independent draws: several anomalies may fire in the same cycle
        if chance(&mut self.rng, profile.temperature_anomaly_probability)? {
            temperature_noise = draw(&mut self.rng, profile.temperature_anomaly)?;
        }
        if chance(&mut self.rng, profile.vibration_anomaly_probability)? {
            vibration_noise = draw(&mut self.rng, profile.vibration_anomaly)?;
        }
        if chance(&mut self.rng, profile.voltage_anomaly_probability)? {
            voltage_noise = draw(&mut self.rng, profile.voltage_anomaly)?;
        }

        let temperature = finite(
            "temperature",
            round2(self.baseline.temperature + temperature_noise),
        )?;
        let vibration = finite(
            "vibration",
            round2((self.baseline.vibration + vibration_noise).max(MIN_VIBRATION)),
        )?;
        let voltage = finite("voltage", round2(self.baseline.voltage + voltage_noise))?;

        self.sequence += 1;

        Ok(Reading {
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
            sequence_number: self.sequence,
            timestamp: Utc::now(),
            temperature,
            vibration,
            voltage,
        })
    }

    fn cycle_pause(&mut self, time_unit: Duration) -> Duration {
        let (low, high) = CYCLE_PAUSE_UNITS;
        time_unit.mul_f64(self.rng.random_range(low..=high))
    }

    /// Generate readings into `tx` until `running` is cleared.
    ///
    /// The flag is checked once per cycle; a send blocked on a full channel is
    /// allowed to complete after a stop request. Returns the number of
    /// readings sent.
    pub async fn run(
        mut self,
        tx: ReadingSender,
        running: Arc<AtomicBool>,
        time_unit: Duration,
    ) -> u64 {
        tracing::info!(
            device_id = %self.device_id,
            device_name = %self.device_name,
            "Device started"
        );

        while running.load(Ordering::Acquire) {
            match self.next_reading() {
                Ok(reading) => {
                    if tx.send(reading).await.is_err() {
                        tracing::warn!(
                            device_id = %self.device_id,
                            "Channel closed, stopping device"
                        );
                        break;
                    }
                    self.packets_sent += 1;

                    if self.packets_sent % PROGRESS_EVERY == 0 {
                        tracing::debug!(
                            device_id = %self.device_id,
                            packets_sent = self.packets_sent,
                            queued = tx.queued(),
                            "Packets sent"
                        );
                    }

                    let pause = self.cycle_pause(time_unit);
                    tokio::time::sleep(pause).await;
                }
                Err(e) => {
                    tracing::error!(
                        device_id = %self.device_id,
                        error = %e,
                        "Reading generation failed, retrying"
                    );
                    tokio::time::sleep(time_unit).await;
                }
            }
        }

        tracing::info!(
            device_id = %self.device_id,
            packets_sent = self.packets_sent,
            "Device stopped"
        );
        self.packets_sent
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, (low, high): (f64, f64)) -> Result<f64, GenerationError> {
    let dist = Uniform::new_inclusive(low, high)
        .map_err(|source| GenerationError::Range { low, high, source })?;
    Ok(dist.sample(rng))
}

/// `random_bool` panics outside `[0, 1]`, so the probability is checked first.
fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> Result<bool, GenerationError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(rng.random_bool(probability))
    } else {
        Err(GenerationError::Probability(probability))
    }
}

fn finite(metric: &'static str, value: f64) -> Result<f64, GenerationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GenerationError::NonFinite { metric })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
