//! Throughput sampler: a pass-through reader that reports transfer rates.
//!
//! The reader side only bumps atomic counters. A ticker thread swaps the
//! interval counter out on every tick and owns all statistics state, then
//! publishes the latest sample for `sample()` and the optional callback.

mod ring;
mod stats;

pub use ring::RingBuffer;
pub use stats::{Sample, SampleStats, SamplerConfig};

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Called on every tick with the new sample and the total bytes read so far.
pub type SampleCallback = Arc<dyn Fn(&Sample, u64) + Send + Sync>;

#[derive(Default)]
struct Counters {
    interval: AtomicU64,
    total: AtomicU64,
}

/// Background tick thread. Dropping it stops the thread and joins it.
struct Ticker {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("sampler ticker panicked");
            }
        }
    }
}

/// Wraps a reader and samples how fast bytes flow through it.
pub struct SpeedSampler<R> {
    inner: R,
    config: SamplerConfig,
    counters: Arc<Counters>,
    latest: Arc<Mutex<Option<Sample>>>,
    callback: Option<SampleCallback>,
    ticker: Option<Ticker>,
}

impl<R: Read> SpeedSampler<R> {
    /// Wraps `inner` and starts sampling right away.
    pub fn wrap(inner: R, config: SamplerConfig) -> Self {
        Self::wrap_with_callback(inner, config, None)
    }

    pub fn wrap_with_callback(
        inner: R,
        config: SamplerConfig,
        callback: Option<SampleCallback>,
    ) -> Self {
        let mut sampler = SpeedSampler {
            inner,
            config,
            counters: Arc::new(Counters::default()),
            latest: Arc::new(Mutex::new(None)),
            callback,
            ticker: None,
        };
        sampler.start();
        sampler
    }

    /// (Re)starts sampling with fresh statistics.
    pub fn start(&mut self) {
        self.reset();

        let (stop, stop_rx) = mpsc::channel::<()>();
        let counters = Arc::clone(&self.counters);
        let latest = Arc::clone(&self.latest);
        let callback = self.callback.clone();
        let config = self.config;
        let handle = std::thread::spawn(move || {
            let mut stats = SampleStats::new(config);
            let period = config.tick_interval();
            while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(period) {
                let bytes = counters.interval.swap(0, Ordering::Relaxed);
                let sample = stats.record(bytes);
                *latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(sample);
                if let Some(cb) = &callback {
                    cb(&sample, counters.total.load(Ordering::Relaxed));
                }
            }
        });
        self.ticker = Some(Ticker {
            stop: Some(stop),
            handle: Some(handle),
        });
    }
}

impl<R> SpeedSampler<R> {
    /// Stops the ticker and discards samples. The stream stays readable;
    /// `total()` keeps counting.
    pub fn reset(&mut self) {
        self.ticker = None;
        self.counters.interval.store(0, Ordering::Relaxed);
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Latest sample, if a tick has happened since the last start.
    pub fn sample(&self) -> Option<Sample> {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Total bytes read through the sampler.
    pub fn total(&self) -> u64 {
        self.counters.total.load(Ordering::Relaxed)
    }

    pub fn is_sampling(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Reading through this bypasses the counters.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Stops sampling and hands back the wrapped stream.
    pub fn into_inner(mut self) -> R {
        self.reset();
        self.inner
    }

    /// Stops sampling and closes (drops) the wrapped stream.
    pub fn close(self) {
        drop(self.into_inner());
    }
}

impl<R: Read> Read for SpeedSampler<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counters.interval.fetch_add(n as u64, Ordering::Relaxed);
        self.counters.total.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}
