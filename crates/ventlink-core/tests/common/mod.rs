// Scripted `DeviceSource` shared by the core integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use ventlink_api::{DeviceReport, SummerBypassMode};
use ventlink_core::{AirflowMode, CoreError, DeviceSource, ErrorKind, PollerConfig, Snapshot};

/// Outcome of one scripted fetch.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Ok,
    Fail(ErrorKind),
    Malformed,
    /// Never answers; the caller's timeout has to fire.
    Hang,
}

#[derive(Clone)]
pub struct FakeSource {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    delay: Duration,
    name: Option<String>,
    fetches: Mutex<Vec<Instant>>,
    commands: Mutex<Vec<(Instant, AirflowMode, u16)>>,
    busy: AtomicUsize,
    max_busy: AtomicUsize,
    closed: AtomicBool,
}

impl FakeSource {
    /// Plays `script` in order, then repeats `fallback` forever.
    pub fn scripted(script: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self::build(script, fallback, Duration::ZERO)
    }

    pub fn always(step: Step) -> Self {
        Self::scripted([], step)
    }

    /// Every fetch takes `delay` before answering.
    pub fn slow(delay: Duration) -> Self {
        Self::build([], Step::Ok, delay)
    }

    fn build(script: impl IntoIterator<Item = Step>, fallback: Step, delay: Duration) -> Self {
        Self {
            inner: Arc::new(FakeInner {
                script: Mutex::new(script.into_iter().collect()),
                fallback,
                delay,
                name: Some("Loft MVHR".into()),
                fetches: Mutex::new(Vec::new()),
                commands: Mutex::new(Vec::new()),
                busy: AtomicUsize::new(0),
                max_busy: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Seconds after `start` at which each fetch began.
    pub fn fetch_offsets(&self, start: Instant) -> Vec<u64> {
        self.inner
            .fetches
            .lock()
            .unwrap()
            .iter()
            .map(|t| (*t - start).as_secs())
            .collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<(Instant, AirflowMode, u16)> {
        self.inner.commands.lock().unwrap().clone()
    }

    /// Highest number of fetches and commands that ever overlapped.
    pub fn max_concurrency(&self) -> usize {
        self.inner.max_busy.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Fetches and commands currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.busy.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Busy<'_> {
        let now = self.inner.busy.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_busy.fetch_max(now, Ordering::SeqCst);
        Busy(&self.inner)
    }
}

/// Marks one call in flight until dropped, including when the caller's
/// timeout cancels it.
struct Busy<'a>(&'a FakeInner);

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.busy.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DeviceSource for FakeSource {
    async fn fetch_snapshot(&self) -> Result<Snapshot, CoreError> {
        self.inner.fetches.lock().unwrap().push(Instant::now());
        let _busy = self.enter();

        let step = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.inner.fallback);

        if !self.inner.delay.is_zero() {
            tokio::time::sleep(self.inner.delay).await;
        }
        if matches!(step, Step::Hang) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        match step {
            Step::Ok | Step::Hang => {
                let mut report = sample_report();
                report.name.clone_from(&self.inner.name);
                Ok(Snapshot::from_report(&report, Utc::now()))
            }
            Step::Malformed => Err(ventlink_api::Error::MissingField { field: "pwr" }.into()),
            Step::Fail(kind) => Err(error_of(kind)),
        }
    }

    async fn send_airflow_mode(
        &self,
        mode: AirflowMode,
        duration_min: u16,
    ) -> Result<(), CoreError> {
        let _busy = self.enter();
        self.inner
            .commands
            .lock()
            .unwrap()
            .push((Instant::now(), mode, duration_min));
        Ok(())
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

pub fn error_of(kind: ErrorKind) -> CoreError {
    match kind {
        ErrorKind::Connection => CoreError::ConnectionFailed {
            addr: "10.0.0.9:47819".into(),
            reason: "connection refused".into(),
        },
        ErrorKind::Timeout => CoreError::Timeout {
            timeout: Duration::from_secs(10),
        },
        ErrorKind::Authentication => CoreError::AuthenticationFailed {
            message: "signature mismatch".into(),
        },
        ErrorKind::Protocol => CoreError::Protocol {
            message: "unexpected frame".into(),
        },
    }
}

pub fn sample_report() -> DeviceReport {
    DeviceReport {
        name: Some("Loft MVHR".into()),
        supply_rpm: 1450,
        exhaust_rpm: 1380,
        power_w: 18,
        extract_temp_dc: 214,
        outdoor_temp_dc: 62,
        supply_airflow: 42,
        exhaust_airflow: 40,
        external_rh: 55,
        internal_rh: 61,
        airflow_mode: AirflowMode::Normal,
        airflow_duration_min: 0,
        airflow_remaining_secs: 0,
        filter_months_remaining: 9,
        service_months_remaining: 21,
        summer_bypass_mode: SummerBypassMode::EveningFresh,
        summer_bypass_airflow: AirflowMode::Boost,
        summer_bypass_indoor_dc: 240,
        summer_bypass_outdoor_dc: 140,
    }
}

/// Interval 30 s, threshold 3, backoff 5 s doubling to 60 s.
pub fn config() -> PollerConfig {
    PollerConfig::default()
}
