//! In-memory profiler state and the single pending auto-stop task.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::debug;

use super::models::ProfilerSnapshot;

const NO_TASK: &str = "<no task>";

/// A spawned auto-stop task. `id` distinguishes successive schedules.
#[derive(Debug)]
pub struct AutoStopTask {
    id: u64,
    name: String,
    handle: JoinHandle<()>,
}

impl AutoStopTask {
    pub fn new(id: u64, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            name: format!("profiler-auto-stop-{id}"),
            handle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Mutated only through its methods; callers share it behind a mutex.
#[derive(Debug, Default)]
pub struct ProfilerState {
    profiler: Option<ProfilerSnapshot>,
    task: Option<AutoStopTask>,
    stop_time: Option<DateTime<Utc>>,
    next_id: u64,
}

impl ProfilerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly read snapshot, keeping the scheduled stop time on it.
    pub fn update_profiler(&mut self, mut snapshot: ProfilerSnapshot) {
        snapshot.stop_time = self.stop_time;
        self.profiler = Some(snapshot);
    }

    /// Replace any pending auto-stop with `task`.
    pub fn schedule_auto_stop(&mut self, task: AutoStopTask, stop_time: DateTime<Utc>) {
        self.cancel_auto_stop();
        debug!(task = %task.name, %stop_time, "Scheduled profiler auto-stop");
        self.task = Some(task);
        self.stop_time = Some(stop_time);
        if let Some(profiler) = self.profiler.as_mut() {
            profiler.stop_time = Some(stop_time);
        }
    }

    /// Abort the pending task, if any, and clear the stop time. No-op when idle.
    pub fn cancel_auto_stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.handle.is_finished() {
                task.handle.abort();
                debug!(task = %task.name, "Cancelled profiler auto-stop");
            }
        }
        self.clear_schedule();
    }

    /// Called by a task after it disabled the profiler. Clears scheduling
    /// state only while `id` is still the current task.
    pub(crate) fn finish_auto_stop(&mut self, id: u64) -> bool {
        match &self.task {
            Some(task) if task.id == id => {
                self.task = None;
                self.clear_schedule();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn next_task_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn clear_schedule(&mut self) {
        self.stop_time = None;
        if let Some(profiler) = self.profiler.as_mut() {
            profiler.stop_time = None;
        }
    }

    pub fn profiler(&self) -> Option<&ProfilerSnapshot> {
        self.profiler.as_ref()
    }

    pub fn task_name(&self) -> &str {
        self.task.as_ref().map_or(NO_TASK, |task| task.name.as_str())
    }

    pub fn scheduled_stop_time(&self) -> Option<DateTime<Utc>> {
        self.stop_time
    }

    pub fn has_scheduled_stop(&self) -> bool {
        self.stop_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn snapshot(level: i32) -> ProfilerSnapshot {
        ProfilerSnapshot {
            level,
            slowms: 100,
            sample_rate: Some(1.0),
            stop_time: None,
        }
    }

    fn pending_task(state: &mut ProfilerState) -> AutoStopTask {
        let id = state.next_task_id();
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        AutoStopTask::new(id, handle)
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_idle_state() {
        let mut state = ProfilerState::new();
        assert_eq!(state.task_name(), "<no task>");
        assert!(!state.has_scheduled_stop());
        assert!(state.profiler().is_none());

        state.cancel_auto_stop();
        assert!(!state.has_scheduled_stop());
    }

    #[tokio::test]
    async fn test_schedule_overlays_stop_time_on_snapshot() {
        let mut state = ProfilerState::new();
        state.update_profiler(snapshot(2));

        let task = pending_task(&mut state);
        state.schedule_auto_stop(task, at(10));

        assert!(state.has_scheduled_stop());
        assert_eq!(state.task_name(), "profiler-auto-stop-1");
        assert_eq!(state.profiler().unwrap().stop_time, Some(at(10)));

        // A refreshed snapshot from the server keeps the application's stop time.
        state.update_profiler(snapshot(2));
        assert_eq!(state.profiler().unwrap().stop_time, Some(at(10)));

        state.cancel_auto_stop();
    }

    #[tokio::test]
    async fn test_reschedule_cancels_previous_task() {
        let mut state = ProfilerState::new();
        state.update_profiler(snapshot(1));

        let first = pending_task(&mut state);
        let first_handle = first.handle.abort_handle();
        state.schedule_auto_stop(first, at(10));

        let second = pending_task(&mut state);
        let second_handle = second.handle.abort_handle();
        state.schedule_auto_stop(second, at(20));

        settle().await;

        assert!(first_handle.is_finished(), "first task was not cancelled");
        assert!(!second_handle.is_finished());
        assert_eq!(state.scheduled_stop_time(), Some(at(20)));
        assert_eq!(state.task_name(), "profiler-auto-stop-2");

        state.cancel_auto_stop();
        settle().await;
        assert!(second_handle.is_finished());
        assert!(!state.has_scheduled_stop());
        assert_eq!(state.profiler().unwrap().stop_time, None);
    }

    #[tokio::test]
    async fn test_finish_ignores_stale_task() {
        let mut state = ProfilerState::new();

        let first = pending_task(&mut state);
        let first_id = first.id();
        state.schedule_auto_stop(first, at(5));

        let second = pending_task(&mut state);
        let second_id = second.id();
        state.schedule_auto_stop(second, at(15));

        assert!(!state.finish_auto_stop(first_id));
        assert_eq!(state.scheduled_stop_time(), Some(at(15)));

        assert!(state.finish_auto_stop(second_id));
        assert!(!state.has_scheduled_stop());
        assert_eq!(state.task_name(), "<no task>");
    }
}
