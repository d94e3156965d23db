//! Single-consumer event dispatcher with a statum lifecycle
//!
//! Input messages and release-timer expiries share one mpsc queue and are
//! handled one at a time by a single task, so per-deck state is never touched
//! concurrently.
//!
//! # State Machine
//!
//! ```text
//! Configured ──► Running ──► Stopped
//! ```
//!
//! # Architecture
//!
//! ```text
//! LineCollector ─[Turn]──────────────┐
//!                                    ▼
//!                          mpsc::channel(1000) ──► EventDispatcher ──► TransportEngine
//!                                    ▲                   │
//! TokioTimerScheduler ─[ReleaseTimerExpired]─────────────┘ (schedule/cancel)
//! ```

use crate::config::JogConfig;
use crate::controller::decoder::Deck;
use crate::controller::midi::MidiMessage;
use crate::engine::{TimerToken, TokioTimerScheduler, TransportEngine};
use crate::jog::{DispatchError, JogWheel};
use chrono::Local;
use statum::{machine, state};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the shared event queue
pub const QUEUE_CAPACITY: usize = 1000;

/// Everything the dispatcher consumes.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A jog message and the monotonic time it was received
    Turn {
        message: MidiMessage,
        received_at: Instant,
    },
    /// A release timer ran out
    ReleaseTimerExpired { deck: Deck, token: TimerToken },
    /// Stop after the events already queued ahead of this one
    Shutdown,
}

/// Counters kept over the dispatcher's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub turns: u64,
    pub releases: u64,
    pub stale_releases: u64,
}

#[state]
#[derive(Debug, Clone)]
pub enum DispatcherState {
    Configured,
    Running,
    Stopped,
}

#[machine]
pub struct EventDispatcher<S: DispatcherState> {
    receiver: mpsc::Receiver<DispatchEvent>,
    jog: JogWheel,
    transport: Box<dyn TransportEngine + Send>,
    timers: TokioTimerScheduler,
    stats: DispatchStats,
}

impl<S: DispatcherState> EventDispatcher<S> {
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn jog(&self) -> &JogWheel {
        &self.jog
    }
}

impl EventDispatcher<Configured> {
    /// `sender` must feed `receiver`; the timer scheduler posts expiries through it.
    pub fn create(
        config: JogConfig,
        transport: Box<dyn TransportEngine + Send>,
        sender: mpsc::Sender<DispatchEvent>,
        receiver: mpsc::Receiver<DispatchEvent>,
    ) -> Self {
        info!(
            "Creating dispatcher: {:?} arbitration, {:?} estimator, {:?} scrub",
            config.arbitration, config.estimator, config.scrub_policy
        );
        Self::new(
            receiver,
            JogWheel::new(config),
            transport,
            TokioTimerScheduler::new(sender),
            DispatchStats::default(),
        )
    }

    pub fn start(self) -> EventDispatcher<Running> {
        info!("Dispatcher running");
        self.transition()
    }
}

impl EventDispatcher<Running> {
    /// Handles one event. Returns `false` when the event asks to stop.
    pub fn handle(&mut self, event: DispatchEvent) -> bool {
        match event {
            DispatchEvent::Turn {
                message,
                received_at,
            } => {
                self.jog
                    .turn(&message, received_at, &mut *self.transport, &mut self.timers);
                self.stats.turns += 1;
            }
            DispatchEvent::ReleaseTimerExpired { deck, token } => {
                if self
                    .jog
                    .release_timer_expired(deck, token, &mut *self.transport)
                {
                    self.stats.releases += 1;
                } else {
                    self.stats.stale_releases += 1;
                }
            }
            DispatchEvent::Shutdown => {
                info!("Shutdown event received");
                return false;
            }
        }
        true
    }

    /// Runs until `shutdown` is cancelled or a [`DispatchEvent::Shutdown`] is
    /// dequeued, then releases every scratch still active.
    pub async fn run_until_shutdown(mut self, shutdown: CancellationToken) -> EventDispatcher<Stopped> {
        info!("Entering dispatch loop");

        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);
        let mut turns_at_last_stats = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                event = self.receiver.recv() => {
                    match event {
                        Some(event) => {
                            if !self.handle(event) {
                                break;
                            }
                        }
                        None => {
                            warn!("Event queue closed");
                            break;
                        }
                    }
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let elapsed = (now - last_stats_time).num_seconds().max(1);
                let turns = self.stats.turns - turns_at_last_stats;
                info!(
                    "Dispatcher stats: {} turns in {} seconds ({:.2}/sec), {} releases, {} stale",
                    turns,
                    elapsed,
                    turns as f64 / elapsed as f64,
                    self.stats.releases,
                    self.stats.stale_releases
                );
                turns_at_last_stats = self.stats.turns;
                last_stats_time = now;
            }
        }

        self.jog.release_all(&mut *self.transport, &mut self.timers);
        info!("Dispatcher stopped after {} turns", self.stats.turns);
        self.transition()
    }
}

impl EventDispatcher<Stopped> {}

/// Owns the dispatcher task and the sending side of its queue.
#[derive(Debug)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<DispatchEvent>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<DispatchStats>>,
}

impl DispatcherHandle {
    /// Spawns a dispatcher for `transport` on the current tokio runtime.
    pub fn spawn(config: JogConfig, transport: Box<dyn TransportEngine + Send>) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        debug!("Created dispatch queue with capacity {}", QUEUE_CAPACITY);

        let shutdown = CancellationToken::new();
        let dispatcher = EventDispatcher::create(config, transport, sender.clone(), receiver).start();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            let stopped = dispatcher.run_until_shutdown(token).await;
            stopped.stats()
        });

        Self {
            sender,
            shutdown,
            task: Some(task),
        }
    }

    pub fn sender(&self) -> mpsc::Sender<DispatchEvent> {
        self.sender.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Queues a jog message stamped with the current time.
    pub async fn turn(&self, message: MidiMessage) -> Result<(), DispatchError> {
        let received_at = tokio::time::Instant::now().into_std();
        self.sender
            .send(DispatchEvent::Turn {
                message,
                received_at,
            })
            .await
            .map_err(|e| DispatchError::ChannelError(e.to_string()))
    }

    /// Stops the dispatcher after the events already queued and waits for it.
    pub async fn shutdown(mut self) -> Result<DispatchStats, DispatchError> {
        if self.sender.send(DispatchEvent::Shutdown).await.is_err() {
            warn!("Dispatcher already gone, cancelling");
            self.shutdown.cancel();
        }
        self.join().await
    }

    /// Cancels the dispatcher without draining the queue and waits for it.
    pub async fn abort(mut self) -> Result<DispatchStats, DispatchError> {
        self.shutdown.cancel();
        self.join().await
    }

    async fn join(&mut self) -> Result<DispatchStats, DispatchError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| {
                error!("Dispatcher task failed: {}", e);
                DispatchError::TaskError(e.to_string())
            }),
            None => Err(DispatchError::TaskError("already joined".to_string())),
        }
    }
}
