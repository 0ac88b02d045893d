//! Terminal progress reporting
//!
//! The bar is a plain byte counter: copy loops hand it every buffer they
//! move and it repaints in place. Counters are atomic because the bar is
//! written to from whatever context drives the copy, while descriptions and
//! totals are set between phases. Callers that want silence (tests, library
//! use) pass a [`NullSink`].

use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Byte-counting sink shared by download and decompress pipelines.
pub trait ProgressSink: Send + Sync {
    /// Set the expected total and reset the counter.
    fn set_total(&self, total: u64);
    /// Label printed in front of the bar.
    fn set_description(&self, description: &str);
    /// Count a buffer's worth of bytes and repaint.
    fn record(&self, buf: &[u8]);
    /// Repaint the description alone, padded to erase the previous line.
    fn flush_line(&self);
    /// Finish the current line.
    fn close(&self);
}

/// `\r`-repainting terminal progress bar.
pub struct ProgressBar {
    width: usize,
    current: AtomicU64,
    total: AtomicU64,
    last_line_width: AtomicUsize,
    description: Mutex<String>,
}

impl ProgressBar {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            current: AtomicU64::new(0),
            total: AtomicU64::new(0),
            last_line_width: AtomicUsize::new(0),
            description: Mutex::new(String::new()),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    fn fill(&self, current: u64, total: u64) -> String {
        let mut fill = if total == 0 {
            self.width
        } else {
            (self.width as f64 * current as f64 / total as f64) as usize
        };
        if fill > 0 && total != 0 {
            fill -= 1;
        }

        let mut bar = "=".repeat(fill);
        if total != 0 {
            bar.push('>');
        }

        bar
    }
}

impl ProgressSink for ProgressBar {
    fn set_total(&self, total: u64) {
        self.current.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn set_description(&self, description: &str) {
        *self.description.lock().unwrap() = description.to_string();
    }

    fn record(&self, buf: &[u8]) {
        let current = self.current.fetch_add(buf.len() as u64, Ordering::Relaxed) + buf.len() as u64;
        let total = self.total.load(Ordering::Relaxed);
        let description = self.description.lock().unwrap().clone();

        let line = format!(
            "{}[{:<bar_width$}] {:>7}/{:>7}",
            description,
            self.fill(current, total),
            human_bytes(current),
            human_bytes(total),
            bar_width = self.width,
        );
        self.last_line_width.store(line.len(), Ordering::Relaxed);

        print!("\r{}", line);
        let _ = io::stdout().flush();
    }

    fn flush_line(&self) {
        let mut line = self.description.lock().unwrap().clone();
        for _ in 0..self.last_line_width.swap(0, Ordering::Relaxed) {
            line.push(' ');
        }

        print!("\r{}", line);
        let _ = io::stdout().flush();
    }

    fn close(&self) {
        println!();
    }
}

/// Discards all progress; used by tests and non-terminal callers.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn set_total(&self, _total: u64) {}
    fn set_description(&self, _description: &str) {}
    fn record(&self, _buf: &[u8]) {}
    fn flush_line(&self) {}
    fn close(&self) {}
}

/// Humanize a byte count with base-1000 units and one decimal.
pub fn human_bytes(num: u64) -> String {
    if num == 0 {
        return "0B".to_string();
    }

    let mut value = num as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1000.0 {
            return format!("{:3.1}{}", value, unit);
        }
        value /= 1000.0;
    }

    format!("{:3.1}PiB", value)
}
