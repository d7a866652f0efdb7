//! Profiler controls with a cancellable auto-stop.
//!
//! ```text
//!              start (no till / timeout)
//!   Disabled ─────────────────────────────► Enabled-Unbounded
//!      │  ▲                                       │
//!      │  │ stop, or auto-stop fires              │ start (till / timeout)
//!      │  │                                       ▼
//!      └──┼─────────────────────────────────► Enabled-Scheduled ─┐
//!         │      start (till / timeout)              ▲           │ start again:
//!         └──────────────────────────────────────────┴───────────┘ cancel, reschedule
//! ```

use bson::Bson;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::backend::ProfilerBackend;
use super::models::{DEFAULT_SLOW_MS, ProfilerSnapshot, ProfilerStatus, StartProfilerRequest};
use super::state::{AutoStopTask, ProfilerState};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

pub const DEFAULT_RAW_DATA_LIMIT: i64 = 20;

pub struct ProfilerService<B: ProfilerBackend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<ProfilerState>>,
}

impl<B: ProfilerBackend> Clone for ProfilerService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            state: Arc::clone(&self.state),
        }
    }
}

impl<B: ProfilerBackend> ProfilerService<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            clock: Arc::new(SystemClock),
            state: Arc::new(Mutex::new(ProfilerState::new())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enable profiling, replacing any pending auto-stop.
    ///
    /// A stop time that is already in the past schedules nothing; the
    /// profiler stays enabled.
    #[instrument(skip(self, request), fields(level = request.level))]
    pub async fn start(&self, request: StartProfilerRequest) -> Result<ProfilerStatus> {
        request.validate()?;

        if request.level == 0 {
            return self.stop().await;
        }

        let now = self.clock.now();
        let stop_time = request.stop_time(now)?;

        let slowms = request
            .slowms
            .or((request.level == 1).then_some(DEFAULT_SLOW_MS));
        self.backend.set_level(request.level, slowms).await?;
        let snapshot = self.backend.status().await?;

        let mut state = self.state.lock();
        state.cancel_auto_stop();
        state.update_profiler(snapshot.clone());
        if let Some(stop_time) = stop_time {
            self.schedule_locked(&mut state, stop_time, now);
        }

        info!(
            level = snapshot.level,
            slowms = snapshot.slowms,
            till = ?state.scheduled_stop_time(),
            "Profiler started"
        );
        Ok(report(&state, &snapshot))
    }

    /// Disable profiling and clear any pending auto-stop.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<ProfilerStatus> {
        self.backend.set_level(0, None).await?;
        let snapshot = self.backend.status().await?;

        let mut state = self.state.lock();
        state.cancel_auto_stop();
        state.update_profiler(snapshot.clone());

        info!("Profiler stopped");
        Ok(report(&state, &snapshot))
    }

    /// Current profiler configuration; does not change the profiling level.
    pub async fn status(&self) -> Result<ProfilerStatus> {
        let snapshot = self.backend.status().await?;

        let mut state = self.state.lock();
        state.update_profiler(snapshot.clone());
        Ok(report(&state, &snapshot))
    }

    /// Latest profiled operations as relaxed extended JSON.
    pub async fn raw_data(&self, limit: Option<i64>) -> Result<Vec<serde_json::Value>> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_RAW_DATA_LIMIT);
        let entries = self.backend.recent_entries(limit).await?;
        Ok(entries
            .into_iter()
            .map(|entry| Bson::Document(entry).into_relaxed_extjson())
            .collect())
    }

    pub fn has_scheduled_stop(&self) -> bool {
        self.state.lock().has_scheduled_stop()
    }

    pub fn scheduled_stop_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().scheduled_stop_time()
    }

    pub fn task_name(&self) -> String {
        self.state.lock().task_name().to_string()
    }

    pub fn snapshot(&self) -> Option<ProfilerSnapshot> {
        self.state.lock().profiler().cloned()
    }

    /// Spawn the auto-stop while holding the state lock so the task can never
    /// observe state from before its own installation.
    fn schedule_locked(
        &self,
        state: &mut ProfilerState,
        stop_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let delay = match (stop_time - now).to_std() {
            Ok(delay) if !delay.is_zero() => delay,
            _ => {
                info!(%stop_time, "Profiler stop time already passed, not scheduling auto-stop");
                return;
            }
        };

        let id = state.next_task_id();
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            auto_stop(backend, shared, id).await;
        });

        state.schedule_auto_stop(AutoStopTask::new(id, handle), stop_time);
    }
}

fn report(state: &ProfilerState, snapshot: &ProfilerSnapshot) -> ProfilerStatus {
    let mut status = ProfilerStatus::from(snapshot);
    status.till = state.scheduled_stop_time();
    status
}

async fn auto_stop<B: ProfilerBackend>(backend: Arc<B>, state: Arc<Mutex<ProfilerState>>, id: u64) {
    info!(task_id = id, "Profiler auto-stop fired");

    if let Err(e) = backend.set_level(0, None).await {
        error!(task_id = id, error = %e, "Profiler auto-stop could not disable profiling");
    }

    match backend.status().await {
        Ok(snapshot) => state.lock().update_profiler(snapshot),
        Err(e) => warn!(task_id = id, error = %e, "Could not refresh profiler status"),
    }

    state.lock().finish_auto_stop(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::EventError;
    use crate::profiler::backend::MockProfilerBackend;
    use async_trait::async_trait;
    use bson::{Document, doc};
    use chrono::{Duration, TimeZone};

    /// Records every level change and reports the last one.
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<(i32, Option<i64>)>>,
        current: Mutex<(i32, i64)>,
    }

    impl FakeBackend {
        fn disable_calls(&self) -> usize {
            self.calls.lock().iter().filter(|(level, _)| *level == 0).count()
        }
    }

    #[async_trait]
    impl ProfilerBackend for FakeBackend {
        async fn set_level(&self, level: i32, slowms: Option<i64>) -> Result<()> {
            self.calls.lock().push((level, slowms));
            let mut current = self.current.lock();
            current.0 = level;
            if let Some(slowms) = slowms {
                current.1 = slowms;
            }
            Ok(())
        }

        async fn status(&self) -> Result<ProfilerSnapshot> {
            let (level, slowms) = *self.current.lock();
            Ok(ProfilerSnapshot {
                level,
                slowms,
                sample_rate: Some(1.0),
                stop_time: None,
            })
        }

        async fn recent_entries(&self, limit: i64) -> Result<Vec<Document>> {
            Ok((0..limit).map(|i| doc! { "op": "query", "millis": i }).collect())
        }
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn service() -> (ProfilerService<FakeBackend>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(t0()));
        let service = ProfilerService::new(FakeBackend::default()).with_clock(clock.clone());
        (service, clock)
    }

    fn start_request(level: i32, timeout_minutes: Option<i64>) -> StartProfilerRequest {
        StartProfilerRequest {
            level,
            slowms: None,
            timeout_minutes,
            till: None,
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_minutes(minutes: u64) {
        tokio::time::sleep(std::time::Duration::from_secs(minutes * 60)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_stop_condition_is_unbounded() {
        let (service, _) = service();

        let status = service.start(start_request(2, None)).await.unwrap();

        assert_eq!(status.level, 2);
        assert_eq!(status.level_verbose, "All operations");
        assert_eq!(status.till, None);
        assert!(!service.has_scheduled_stop());
        assert_eq!(service.task_name(), "<no task>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_level_one_defaults_slowms() {
        let (service, _) = service();

        let status = service.start(start_request(1, None)).await.unwrap();

        assert_eq!(status.slowms, DEFAULT_SLOW_MS);
        assert_eq!(status.level_verbose, "Slow operations only (>100ms)");
        assert_eq!(service.backend.calls.lock()[0], (1, Some(DEFAULT_SLOW_MS)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_disables_profiler_when_due() {
        let (service, _) = service();

        let status = service.start(start_request(2, Some(10))).await.unwrap();
        assert_eq!(status.till, Some(t0() + Duration::minutes(10)));
        assert!(service.has_scheduled_stop());

        wait_minutes(9).await;
        assert_eq!(service.backend.disable_calls(), 0);

        wait_minutes(2).await;
        assert_eq!(service.backend.disable_calls(), 1);
        assert!(!service.has_scheduled_stop());
        assert_eq!(service.task_name(), "<no task>");

        let snapshot = service.snapshot().unwrap();
        assert_eq!(snapshot.level, 0);
        assert_eq!(snapshot.stop_time, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_pending_auto_stop() {
        let (service, _) = service();

        service.start(start_request(2, Some(10))).await.unwrap();
        let first_task = service.task_name();
        let status = service.start(start_request(2, Some(30))).await.unwrap();

        assert_ne!(service.task_name(), first_task);
        assert_eq!(status.till, Some(t0() + Duration::minutes(30)));

        // The first deadline passes without effect.
        wait_minutes(15).await;
        assert_eq!(service.backend.disable_calls(), 0);
        assert!(service.has_scheduled_stop());

        wait_minutes(16).await;
        assert_eq!(service.backend.disable_calls(), 1);
        assert!(!service.has_scheduled_stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_till_schedules_nothing() {
        let (service, clock) = service();
        clock.advance(Duration::hours(1));

        let request = StartProfilerRequest {
            level: 2,
            slowms: None,
            timeout_minutes: None,
            till: Some(t0()),
        };
        let status = service.start(request).await.unwrap();

        assert!(!service.has_scheduled_stop());
        assert_eq!(status.level, 2);
        assert_eq!(status.till, None);

        wait_minutes(120).await;
        assert_eq!(service.backend.disable_calls(), 0);
        assert_eq!(service.status().await.unwrap().level, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_auto_stop() {
        let (service, _) = service();

        service.start(start_request(2, Some(10))).await.unwrap();
        let status = service.stop().await.unwrap();

        assert_eq!(status.level, 0);
        assert_eq!(status.till, None);
        assert!(!service.has_scheduled_stop());

        wait_minutes(20).await;
        assert_eq!(service.backend.disable_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_level_zero_start_is_stop() {
        let (service, _) = service();

        service.start(start_request(2, Some(5))).await.unwrap();
        let status = service.start(start_request(0, None)).await.unwrap();

        assert_eq!(status.level_verbose, "Disabled - no data collection");
        assert!(!service.has_scheduled_stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_scheduled_stop() {
        let (service, _) = service();
        let till = t0() + Duration::minutes(45);

        service
            .start(StartProfilerRequest {
                level: 1,
                slowms: Some(20),
                timeout_minutes: None,
                till: Some(till),
            })
            .await
            .unwrap();

        let status = service.status().await.unwrap();
        assert_eq!(status.level, 1);
        assert_eq!(status.slowms, 20);
        assert_eq!(status.till, Some(till));
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_backend() {
        let mut backend = MockProfilerBackend::new();
        backend.expect_set_level().never();
        backend.expect_status().never();
        let service = ProfilerService::new(backend);

        let result = service
            .start(StartProfilerRequest {
                level: 2,
                slowms: None,
                timeout_minutes: Some(5),
                till: Some(Utc::now()),
            })
            .await;
        assert!(matches!(result, Err(EventError::Validation(_))));

        let result = service.start(start_request(5, None)).await;
        assert!(matches!(result, Err(EventError::Validation(_))));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_leaves_profiler_untouched() {
        let mut backend = MockProfilerBackend::new();
        backend.expect_set_level().never();
        backend.expect_status().never();
        let service = ProfilerService::new(backend);

        let result = service
            .start(start_request(2, Some(1_000_000_000_000)))
            .await;
        assert!(matches!(result, Err(EventError::Validation(_))));
        assert!(!service.has_scheduled_stop());
        assert!(service.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let mut backend = MockProfilerBackend::new();
        backend
            .expect_set_level()
            .returning(|_, _| Err(EventError::Internal("not authorized".into())));
        let service = ProfilerService::new(backend);

        assert!(service.start(start_request(2, Some(5))).await.is_err());
        assert!(!service.has_scheduled_stop());
    }

    #[tokio::test]
    async fn test_raw_data_defaults_limit() {
        let (service, _) = service();

        let entries = service.raw_data(None).await.unwrap();
        assert_eq!(entries.len(), DEFAULT_RAW_DATA_LIMIT as usize);
        assert_eq!(entries[0]["op"], "query");

        assert_eq!(service.raw_data(Some(3)).await.unwrap().len(), 3);
    }
}
