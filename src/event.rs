use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Tick,
    Shutdown,
}

/// Drives the sampling loop: one `Tick` per interval, `Shutdown` on ctrl-c.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    _task: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let task = tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(tick_rate);
            // A slow tick must not cause a burst of catch-up samples.
            tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut watch_ctrl_c = true;

            loop {
                tokio::select! {
                    signal = tokio::signal::ctrl_c(), if watch_ctrl_c => {
                        match signal {
                            Ok(()) => {
                                let _ = tx.send(Event::Shutdown);
                                break;
                            }
                            Err(err) => {
                                tracing::warn!(%err, "ctrl-c handler unavailable");
                                watch_ctrl_c = false;
                            }
                        }
                    }
                    _ = tick_interval.tick() => {
                        if tx.send(Event::Tick).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { rx, _task: task }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
