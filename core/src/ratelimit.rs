//! Process-wide send pacing.
//!
//! Every datagram, retries included, waits for a slot. Slots are handed out
//! one `interval` apart in call order, so over any window of `T` seconds at
//! most `R * T + 1` sends go out.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// `0` means unlimited.
    pub fn new(max_per_second: u32) -> Self {
        let interval = (max_per_second > 0).then(|| Duration::from_secs(1) / max_per_second);
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Waits until the caller may send one datagram.
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + interval;
            slot
        };
        time::sleep_until(slot).await;
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
