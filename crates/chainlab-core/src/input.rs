use std::{io::BufRead, thread, time::Duration};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Producer half. Cloneable; dropping every sender closes the input.
pub type LineSender = UnboundedSender<String>;

#[derive(Debug)]
pub struct LineInput {
    rx: UnboundedReceiver<String>,
    stopped: bool,
    closed: bool,
}

impl LineInput {
    pub fn channel() -> (LineSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                stopped: false,
                closed: false,
            },
        )
    }

    /// Read stdin on a dedicated thread. Blocking reads stay off the runtime
    /// so shutdown never waits on a pending line.
    pub fn stdin() -> Self {
        let (tx, input) = Self::channel();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin reader finished");
        });
        input
    }

    /// Wait up to `timeout` for the next line. Returns `None` at once while
    /// stopped, and after the full timeout once the producer is gone.
    pub async fn next_line(&mut self, timeout: Duration) -> Option<String> {
        if self.stopped {
            return None;
        }
        if self.closed {
            tokio::time::sleep(timeout).await;
            return None;
        }
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(line)) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Ok(None) => {
                self.closed = true;
                tokio::time::sleep(timeout).await;
                None
            }
            Err(_) => None,
        }
    }

    /// Stop handing out lines until [`LineInput::resume`] is called.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Accept lines again. Lines queued while stopped belong to the
    /// finished session and are discarded; returns how many were dropped.
    pub fn resume(&mut self) -> usize {
        if !self.stopped {
            return 0;
        }
        self.stopped = false;
        let mut dropped = 0;
        loop {
            match self.rx.try_recv() {
                Ok(_) => dropped += 1,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        if dropped > 0 {
            debug!(dropped, "discarded stale input lines");
        }
        dropped
    }

    /// Resume and wait, polling every `poll`, until a line arrives. Returns
    /// `None` once the producer is gone.
    pub async fn wait_line(&mut self, poll: Duration) -> Option<String> {
        self.resume();
        loop {
            if let Some(line) = self.next_line(poll).await {
                return Some(line);
            }
            if self.closed {
                return None;
            }
        }
    }

    /// True once the producer has gone away and every queued line was read.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
