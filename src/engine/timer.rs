//! Release timers on the tokio runtime.
//!
//! A scheduled release is a spawned task that sleeps and then posts
//! [`DispatchEvent::ReleaseTimerExpired`] into the dispatcher queue, so the
//! expiry is handled by the same single consumer as input events. Cancelling
//! aborts the task. If the sleep already finished and the event is queued, the
//! token no longer matches the deck's pending one and the handler drops it.

use super::{TimerScheduler, TimerToken};
use crate::controller::decoder::Deck;
use crate::jog::dispatcher::DispatchEvent;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug)]
pub struct TokioTimerScheduler {
    sender: mpsc::Sender<DispatchEvent>,
    next_token: u64,
    tasks: HashMap<TimerToken, JoinHandle<()>>,
}

impl TokioTimerScheduler {
    pub fn new(sender: mpsc::Sender<DispatchEvent>) -> Self {
        Self {
            sender,
            next_token: 0,
            tasks: HashMap::new(),
        }
    }

    /// Timers that have neither fired nor been cancelled.
    pub fn outstanding(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl TimerScheduler for TokioTimerScheduler {
    fn schedule_release(&mut self, deck: Deck, delay: Duration) -> TimerToken {
        self.tasks.retain(|_, task| !task.is_finished());

        self.next_token += 1;
        let token = TimerToken(self.next_token);
        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = sender
                .send(DispatchEvent::ReleaseTimerExpired { deck, token })
                .await
            {
                error!("Failed to deliver {} for {}: {}", token, deck, e);
            }
        });
        self.tasks.insert(token, task);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(task) = self.tasks.remove(&token) {
            task.abort();
            debug!("Aborted {}", token);
        }
    }
}

impl Drop for TokioTimerScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
