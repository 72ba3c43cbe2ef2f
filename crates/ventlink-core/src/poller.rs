// ── Poller ──
//
// One background task per device. It owns the `DeviceSource`, runs polls on
// the interval, backs off after failures, executes commands between polls,
// and is the sole writer of the device's `EntityCache`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ventlink_api::AirflowMode;

use crate::command::{Command, CommandEnvelope};
use crate::config::PollerConfig;
use crate::error::{CoreError, ErrorKind};
use crate::model::Snapshot;
use crate::source::DeviceSource;
use crate::status::{DeviceStatus, PollError, PollerState};
use crate::store::EntityCache;
use crate::stream::StatusStream;

const COMMAND_CHANNEL_SIZE: usize = 16;

// ── Poller handle ────────────────────────────────────────────────────

/// Handle to a running device poller.
///
/// Cheaply cloneable via `Arc<PollerInner>`. Dropping the last handle
/// cancels the task; [`shutdown`](Self::shutdown) additionally waits for
/// it to finish and release the connection.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    device_id: String,
    config: PollerConfig,
    cache: EntityCache,
    command_tx: mpsc::Sender<CommandEnvelope>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for PollerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Poller {
    /// Validate `config` and start polling `source`. The first poll runs
    /// immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S: DeviceSource>(
        device_id: impl Into<String>,
        source: S,
        config: PollerConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let device_id = device_id.into();
        let cache = EntityCache::new(device_id.clone(), config.stale_after);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let worker = PollLoop {
            source,
            config: config.clone(),
            cache: cache.clone(),
            status: DeviceStatus::new(device_id.clone()),
            next_poll: Instant::now(),
        };
        let task = tokio::spawn(poll_task(worker, command_rx, cancel.clone()));

        info!(
            device_id,
            interval = ?config.interval,
            threshold = config.failure_threshold,
            "poller started"
        );

        Ok(Self {
            inner: Arc::new(PollerInner {
                device_id,
                config,
                cache,
                command_tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    /// Read-only view of this device's entities.
    pub fn cache(&self) -> &EntityCache {
        &self.inner.cache
    }

    pub fn status(&self) -> Arc<DeviceStatus> {
        self.inner.cache.status()
    }

    pub fn subscribe(&self) -> StatusStream {
        self.inner.cache.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Execute a command on the poller task and wait for its result.
    ///
    /// Commands are serialised with polls. A successful airflow command
    /// triggers an immediate refresh.
    pub async fn execute(&self, command: Command) -> Result<(), CoreError> {
        command.validate()?;
        if self.inner.cancel.is_cancelled() {
            return Err(self.stopped());
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command,
                response_tx,
            })
            .await
            .map_err(|_| self.stopped())?;

        response_rx.await.map_err(|_| self.stopped())?
    }

    pub async fn set_airflow_mode(
        &self,
        mode: AirflowMode,
        duration_min: u16,
    ) -> Result<(), CoreError> {
        self.execute(Command::SetAirflowMode { mode, duration_min }).await
    }

    /// Poll now and return that poll's outcome.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.execute(Command::Refresh).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop polling before the next tick, wait for any in-flight fetch,
    /// then close the connection. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(
                    device_id = %self.inner.device_id,
                    error = %e,
                    "poller task ended abnormally"
                );
            }
        }
    }

    fn stopped(&self) -> CoreError {
        CoreError::PollerStopped {
            device_id: self.inner.device_id.clone(),
        }
    }
}

// ── Background task ──────────────────────────────────────────────────

async fn poll_task<S: DeviceSource>(
    mut worker: PollLoop<S>,
    mut commands: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(worker.next_poll) => {
                let _ = worker.poll().await;
            }
            Some(envelope) = commands.recv() => {
                let result = worker.run_command(envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }

    worker.stop().await;
}

/// State owned by the poller task.
struct PollLoop<S> {
    source: S,
    config: PollerConfig,
    cache: EntityCache,
    /// Working copy; published to the cache after every poll.
    status: DeviceStatus,
    next_poll: Instant,
}

impl<S: DeviceSource> PollLoop<S> {
    /// Run one fetch, publish the outcome and schedule the next poll.
    async fn poll(&mut self) -> Result<(), CoreError> {
        let started = Instant::now();
        self.cache.set_state(PollerState::Polling);

        let fetch = self.source.fetch_snapshot();
        let outcome = match tokio::time::timeout(self.config.timeout, fetch).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CoreError::Timeout {
                timeout: self.config.timeout,
            }),
        };

        self.status.polls += 1;
        let result = match outcome {
            Ok(snapshot) => {
                self.record_success(snapshot);
                self.next_poll = next_tick(started, self.config.interval, Instant::now());
                Ok(())
            }
            Err(err) => {
                self.record_failure(&err);
                let delay = backoff_delay(
                    self.status.consecutive_failures,
                    self.config.backoff_initial,
                    self.config.backoff_max,
                );
                debug!(device_id = %self.status.device_id, ?delay, "next attempt after backoff");
                self.next_poll = Instant::now() + delay;
                Err(err)
            }
        };

        self.cache.publish(self.status.clone());
        result
    }

    fn record_success(&mut self, snapshot: Snapshot) {
        let was_available = self.status.available;
        let failures = self.status.consecutive_failures;

        self.status.last_success = Some(snapshot.acquired_at());
        self.status.last_snapshot = Some(Arc::new(snapshot));
        self.status.last_error = None;
        self.status.consecutive_failures = 0;
        self.status.available = true;
        self.status.state = PollerState::Idle;

        if was_available {
            debug!(device_id = %self.status.device_id, polls = self.status.polls, "poll succeeded");
        } else {
            info!(
                device_id = %self.status.device_id,
                after_failures = failures,
                "device available"
            );
        }
    }

    fn record_failure(&mut self, err: &CoreError) {
        let was_available = self.status.available;
        let error = PollError::from_error(err, Utc::now());
        let failures = self.status.consecutive_failures.saturating_add(1);

        self.status.consecutive_failures = failures;
        self.status.available =
            self.status.last_snapshot.is_some() && failures < self.config.failure_threshold;
        self.status.state = PollerState::BackingOff { attempt: failures };

        if error.kind == ErrorKind::Protocol {
            warn!(
                device_id = %self.status.device_id,
                failures,
                error = %err,
                "device response rejected; firmware and client may disagree on the protocol"
            );
        } else {
            warn!(
                device_id = %self.status.device_id,
                kind = %error.kind,
                failures,
                error = %err,
                "poll failed"
            );
        }
        if was_available && !self.status.available {
            warn!(device_id = %self.status.device_id, failures, "device unavailable");
        }

        self.status.last_error = Some(error);
    }

    async fn run_command(&mut self, command: Command) -> Result<(), CoreError> {
        match command {
            Command::Refresh => self.poll().await,
            Command::SetAirflowMode { mode, duration_min } => {
                let sent = tokio::time::timeout(
                    self.config.timeout,
                    self.source.send_airflow_mode(mode, duration_min),
                )
                .await;
                let result = sent.unwrap_or_else(|_| {
                    Err(CoreError::Timeout {
                        timeout: self.config.timeout,
                    })
                });

                match &result {
                    Ok(()) => {
                        info!(
                            device_id = %self.status.device_id,
                            %mode,
                            duration_min,
                            "airflow mode set"
                        );
                        self.next_poll = Instant::now();
                    }
                    Err(e) => {
                        warn!(
                            device_id = %self.status.device_id,
                            %mode,
                            error = %e,
                            "airflow command failed"
                        );
                    }
                }
                result
            }
        }
    }

    async fn stop(mut self) {
        self.source.close().await;
        self.status.state = PollerState::Stopped;
        self.status.available = false;
        self.cache.publish(self.status);
        info!(device_id = %self.cache.device_id(), "poller stopped");
    }
}

// ── Scheduling ───────────────────────────────────────────────────────

/// Delay after the `failures`-th consecutive failure:
/// `min(initial * 2^(failures - 1), max)`.
pub fn backoff_delay(failures: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = failures.saturating_sub(1).min(31);
    initial
        .checked_mul(1_u32 << exponent)
        .map_or(max, |delay| delay.min(max))
}

/// First interval boundary after `now`, counted from `started`. Ticks
/// that fell due while the fetch was running are skipped.
fn next_tick(started: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = started + interval;
    while next <= now {
        next += interval;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let initial = Duration::from_secs(5);
        let max = Duration::from_secs(60);
        let delays: Vec<u64> = (1..=6)
            .map(|n| backoff_delay(n, initial, max).as_secs())
            .collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn backoff_survives_huge_failure_counts() {
        let delay = backoff_delay(u32::MAX, Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn next_tick_skips_missed_boundaries() {
        let start = Instant::now();
        let interval = Duration::from_secs(30);

        assert_eq!(next_tick(start, interval, start + Duration::from_secs(1)), start + interval);
        assert_eq!(
            next_tick(start, interval, start + Duration::from_secs(45)),
            start + Duration::from_secs(60)
        );
        assert_eq!(
            next_tick(start, interval, start + Duration::from_secs(60)),
            start + Duration::from_secs(90)
        );
    }
}
