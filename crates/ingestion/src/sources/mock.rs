//! Mock noise source
//!
//! Generates encoded noise readings at a fixed rate, for runs without any
//! producer connected.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use contracts::{PacketSource, RawPacket, SensorRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::decoder::encode_record;

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockNoiseConfig {
    /// Packet tag
    pub tag: u8,

    /// Reported `from` value
    pub source_id: String,

    /// Readings per second
    pub rate_hz: f64,

    /// Noise range (dB)
    pub min_noise: f32,
    pub max_noise: f32,

    /// Stop after this many packets (None = endless)
    pub limit: Option<u64>,

    /// Every n-th packet is deliberately corrupted (0 = never)
    pub corrupt_every: u64,
}

impl Default for MockNoiseConfig {
    fn default() -> Self {
        Self {
            tag: contracts::DEFAULT_TAG,
            source_id: "mock-sensor".to_string(),
            rate_hz: 10.0,
            min_noise: 30.0,
            max_noise: 90.0,
            limit: None,
            corrupt_every: 0,
        }
    }
}

/// Packet source producing synthetic noise readings
pub struct MockNoiseSource {
    config: MockNoiseConfig,
    ticker: Interval,
    rng: StdRng,
    sent: u64,
}

impl MockNoiseSource {
    pub fn new(config: MockNoiseConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic readings, for tests
    pub fn seeded(config: MockNoiseConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: MockNoiseConfig, rng: StdRng) -> Self {
        let rate = if config.rate_hz > 0.0 { config.rate_hz } else { 1.0 };
        let mut ticker = interval(Duration::from_secs_f64(1.0 / rate));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            source_id = %config.source_id,
            rate_hz = rate,
            limit = ?config.limit,
            "mock noise source created"
        );

        Self {
            config,
            ticker,
            rng,
            sent: 0,
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn next_record(&mut self) -> SensorRecord {
        let noise = if self.config.max_noise > self.config.min_noise {
            self.rng
                .random_range(self.config.min_noise..self.config.max_noise)
        } else {
            self.config.min_noise
        };
        SensorRecord::new(noise, unix_millis(), self.config.source_id.clone())
    }
}

impl PacketSource for MockNoiseSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn next_packet(&mut self) -> Option<RawPacket> {
        if self.config.limit.is_some_and(|limit| self.sent >= limit) {
            return None;
        }

        self.ticker.tick().await;
        self.sent += 1;

        let record = self.next_record();
        let frame = match encode_record(self.config.tag, &record) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "mock source cannot encode readings");
                return None;
            }
        };

        if self.config.corrupt_every > 0 && self.sent % self.config.corrupt_every == 0 {
            // Drop the tail so the declared length overruns the frame
            let cut = frame.slice(..frame.len() - 2);
            trace!(seq = self.sent, "mock corrupted packet");
            return Some(RawPacket::new(self.config.tag, cut));
        }

        trace!(seq = self.sent, noise = record.noise, "mock packet");
        Some(RawPacket::new(self.config.tag, frame))
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
