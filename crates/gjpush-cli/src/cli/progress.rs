//! Progress line printed from sampler ticks during `gjpush push`.

use gjpush_core::upload::{ProgressCallback, UploadProgress};
use std::io::Write;
use std::sync::Arc;

const MIB: f64 = 1_048_576.0;

/// One progress line, e.g. `  12.0 / 100.0 MiB (12.0%)  2.50 MiB/s  avg 2.10 MiB/s  ETA 42s`.
pub fn format_progress(p: &UploadProgress) -> String {
    let pct = if p.total_bytes == 0 {
        100.0
    } else {
        p.bytes_sent as f64 / p.total_bytes as f64 * 100.0
    };
    let rate = p.sample.moving_average;
    let eta = if rate == 0 {
        "?".to_string()
    } else {
        format!("{}s", p.total_bytes.saturating_sub(p.bytes_sent).div_ceil(rate))
    };
    format!(
        "  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  avg {:.2} MiB/s  ETA {}",
        p.bytes_sent as f64 / MIB,
        p.total_bytes as f64 / MIB,
        pct,
        p.sample.current as f64 / MIB,
        p.sample.average as f64 / MIB,
        eta
    )
}

/// Callback that redraws the progress line on stdout.
pub fn stdout_progress() -> ProgressCallback {
    Arc::new(|p: &UploadProgress| {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{}  ", format_progress(p));
        let _ = out.flush();
    })
}

/// Human-readable byte count for summaries.
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
