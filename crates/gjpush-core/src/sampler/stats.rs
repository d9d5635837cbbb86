//! Throughput statistics computed once per tick.

use serde::{Deserialize, Serialize};

use super::ring::RingBuffer;

/// One throughput sample. Rates are in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Sequence number, starting at 1.
    pub sample_id: u64,
    /// Rate over the last interval.
    #[serde(rename = "bytesPerSec")]
    pub current: u64,
    pub peak: u64,
    pub low: u64,
    pub average: u64,
    pub moving_peak: u64,
    pub moving_low: u64,
    pub moving_average: u64,
}

/// Sampling rate and window (config section `[sampler]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Ticks per second.
    pub samples_per_second: u32,
    /// Seconds of history used for moving statistics.
    pub window_secs: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples_per_second: 2,
            window_secs: 5,
        }
    }
}

impl SamplerConfig {
    pub fn window_len(&self) -> usize {
        (self.samples_per_second.max(1) as usize) * (self.window_secs.max(1) as usize)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / u64::from(self.samples_per_second.max(1)))
    }
}

/// Running and moving statistics. Owned by a single ticking thread.
#[derive(Debug, Clone)]
pub struct SampleStats {
    samples_per_second: u64,
    taken: u64,
    peak: u64,
    low: Option<u64>,
    average: i64,
    window: RingBuffer<Sample>,
}

impl SampleStats {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            samples_per_second: u64::from(config.samples_per_second.max(1)),
            taken: 0,
            peak: 0,
            low: None,
            average: 0,
            window: RingBuffer::new(config.window_len()),
        }
    }

    /// Records the bytes seen during one interval and returns the new sample.
    pub fn record(&mut self, interval_bytes: u64) -> Sample {
        self.taken += 1;
        let current = interval_bytes.saturating_mul(self.samples_per_second);

        let current_i = i64::try_from(current).unwrap_or(i64::MAX);
        self.average += (current_i - self.average) / self.taken as i64;
        self.peak = self.peak.max(current);
        let low = self.low.map_or(current, |low| low.min(current));
        self.low = Some(low);

        let mut sample = Sample {
            sample_id: self.taken,
            current,
            peak: self.peak,
            low,
            average: self.average.max(0) as u64,
            ..Sample::default()
        };
        self.window.push(sample);

        let mut moving_peak = 0u64;
        let mut moving_low: Option<u64> = None;
        let mut moving_sum = 0u128;
        for s in self.window.iter() {
            moving_peak = moving_peak.max(s.current);
            moving_low = Some(moving_low.map_or(s.current, |l| l.min(s.current)));
            moving_sum += u128::from(s.current);
        }
        sample.moving_peak = moving_peak;
        sample.moving_low = moving_low.unwrap_or(0);
        sample.moving_average = (moving_sum / self.window.len() as u128) as u64;
        sample
    }

    pub fn samples_taken(&self) -> u64 {
        self.taken
    }

    /// Samples currently in the moving window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &Sample> {
        self.window.iter()
    }
}
