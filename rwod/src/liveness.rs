//! Per-connection heartbeat.
//!
//! Every interval the monitor checks whether the client answered the last
//! ping. If it did, the flag is cleared and a fresh ping is queued; if not,
//! the connection is declared dead and the reader loop is woken to tear it
//! down. The monitor never waits on the outbound queue: when it is full the
//! ping is skipped and the interval counts as unanswered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{Instrument, debug, warn};

use crate::connection::Outbound;

/// Outcome of one heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// The client answered since the previous tick; send another ping.
    Ping,
    /// No answer within a full interval.
    Expired,
}

#[derive(Debug)]
pub struct Heartbeat {
    alive: AtomicBool,
    interval: Duration,
}

impl Heartbeat {
    /// A freshly opened connection counts as alive.
    pub fn new(interval: Duration) -> Self {
        Self {
            alive: AtomicBool::new(true),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a pong (or any other proof of life).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Consume the alive flag for this interval.
    pub fn tick(&self) -> Beat {
        if self.alive.swap(false, Ordering::AcqRel) {
            Beat::Ping
        } else {
            Beat::Expired
        }
    }

    /// Run the heartbeat until the connection expires or its outbound queue
    /// closes. Expiry is signalled through `dead`.
    pub fn spawn(
        self: Arc<Self>,
        outbound: mpsc::Sender<Outbound>,
        dead: Arc<Notify>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            loop {
                ticker.tick().await;
                match self.tick() {
                    Beat::Ping => match outbound.try_send(Outbound::Ping) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            debug!("Outbound queue full, ping skipped");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("Outbound queue closed, stopping heartbeat");
                            return;
                        }
                    },
                    Beat::Expired => {
                        warn!(
                            interval_secs = self.interval.as_secs_f64(),
                            "Heartbeat expired, terminating connection"
                        );
                        dead.notify_one();
                        return;
                    }
                }
            }
        }
        .in_current_span())
    }
}
