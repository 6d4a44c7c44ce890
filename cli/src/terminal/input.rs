//! Watches the keyboard for `q` or Ctrl-C while a run is in progress.

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, warn};
use udprobe_core::StopSignal;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw mode stays on while the handle lives.
pub struct InputHandle {
    finished: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl InputHandle {
    /// Starts watching if stdin is a terminal, otherwise does nothing.
    pub fn start(stop: StopSignal) -> Self {
        let finished = Arc::new(AtomicBool::new(false));
        if !std::io::stdin().is_terminal() {
            return Self {
                finished,
                thread: None,
            };
        }

        if let Err(e) = enable_raw_mode() {
            debug!("Keyboard watch disabled: {e}");
            return Self {
                finished,
                thread: None,
            };
        }

        let done = finished.clone();
        let thread = thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                match event::poll(POLL_INTERVAL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(_) => break,
                }
                if let Ok(Event::Key(key)) = event::read() {
                    let is_q = key.code == KeyCode::Char('q');
                    let is_ctrl_c = key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL);

                    if (is_q || is_ctrl_c) && key.kind == KeyEventKind::Press {
                        warn!("Stopping, waiting for probes in flight...");
                        stop.stop();
                        break;
                    }
                }
            }
            let _ = disable_raw_mode();
        });

        Self {
            finished,
            thread: Some(thread),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = disable_raw_mode();
    }
}
