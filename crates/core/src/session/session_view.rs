use std::fmt;
use std::sync::Mutex;

use crate::statistics::domain::statistics_aggregator::StatsSnapshot;

/// Status region contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Loading(String),
    Ready(String),
    Error(String),
}

impl Status {
    pub fn message(&self) -> &str {
        match self {
            Status::Loading(m) | Status::Ready(m) | Status::Error(m) => m,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Loading(m) => write!(f, "[loading] {m}"),
            Status::Ready(m) => write!(f, "[ready] {m}"),
            Status::Error(m) => write!(f, "[error] {m}"),
        }
    }
}

/// User-facing surface the session publishes to.
///
/// Called from both the control thread and the detection loop thread.
pub trait SessionView: Send + Sync {
    fn status(&self, status: &Status);

    fn controls(&self, start_enabled: bool, stop_enabled: bool);

    /// Counters for the latest tick, or all zeros after stop.
    fn counters(&self, stats: &StatsSnapshot);

    fn video_visible(&self, visible: bool);
}

#[derive(Default)]
struct LogState {
    status: Option<Status>,
    counters: StatsSnapshot,
    controls: (bool, bool),
    video_visible: bool,
    counter_updates: usize,
    counter_lines: usize,
}

/// Terminal view that reports through `log`.
///
/// Counter lines are throttled to every `throttle_ticks` updates; a reset
/// to zero is always reported. The latest values stay queryable.
pub struct LogSessionView {
    throttle_ticks: usize,
    state: Mutex<LogState>,
}

impl LogSessionView {
    pub fn new(throttle_ticks: usize) -> Self {
        Self {
            throttle_ticks: throttle_ticks.max(1),
            state: Mutex::new(LogState::default()),
        }
    }

    pub fn last_status(&self) -> Option<Status> {
        self.lock().status.clone()
    }

    pub fn last_counters(&self) -> StatsSnapshot {
        self.lock().counters
    }

    /// `(start_enabled, stop_enabled)`.
    pub fn controls_state(&self) -> (bool, bool) {
        self.lock().controls
    }

    pub fn is_video_visible(&self) -> bool {
        self.lock().video_visible
    }

    fn counter_lines(&self) -> usize {
        self.lock().counter_lines
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LogSessionView {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SessionView for LogSessionView {
    fn status(&self, status: &Status) {
        match status {
            Status::Error(m) => log::error!("{m}"),
            Status::Loading(m) | Status::Ready(m) => log::info!("{m}"),
        }
        self.lock().status = Some(status.clone());
    }

    fn controls(&self, start_enabled: bool, stop_enabled: bool) {
        log::debug!("Controls: start={start_enabled} stop={stop_enabled}");
        self.lock().controls = (start_enabled, stop_enabled);
    }

    fn counters(&self, stats: &StatsSnapshot) {
        let mut state = self.lock();
        state.counters = *stats;
        let is_reset = *stats == StatsSnapshot::default();
        if is_reset {
            state.counter_updates = 0;
        } else {
            state.counter_updates += 1;
        }
        if is_reset || state.counter_updates % self.throttle_ticks == 1 || self.throttle_ticks == 1 {
            state.counter_lines += 1;
            log::info!("{stats}");
        }
    }

    fn video_visible(&self, visible: bool) {
        log::debug!("Video {}", if visible { "shown" } else { "hidden" });
        self.lock().video_visible = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(faces: usize) -> StatsSnapshot {
        StatsSnapshot {
            faces,
            fps: 10,
            confidence: 80,
        }
    }

    #[test]
    fn test_log_view_tracks_latest_values() {
        let view = LogSessionView::default();
        view.status(&Status::Error("boom".into()));
        view.controls(false, true);
        view.counters(&stats(3));
        view.video_visible(true);

        assert_eq!(view.last_status(), Some(Status::Error("boom".into())));
        assert_eq!(view.controls_state(), (false, true));
        assert_eq!(view.last_counters().faces, 3);
        assert!(view.is_video_visible());
    }

    #[test]
    fn test_counter_lines_throttled() {
        let view = LogSessionView::new(10);
        for i in 0..20 {
            view.counters(&stats(i % 3 + 1));
        }
        // updates 1 and 11
        assert_eq!(view.counter_lines(), 2);
    }

    #[test]
    fn test_reset_always_logged() {
        let view = LogSessionView::new(10);
        view.counters(&stats(1));
        view.counters(&stats(1));
        view.counters(&StatsSnapshot::default());
        assert_eq!(view.counter_lines(), 2);
        assert_eq!(view.last_counters(), StatsSnapshot::default());
    }

    #[test]
    fn test_status_message_and_display() {
        let status = Status::Loading("Loading AI models...".into());
        assert_eq!(status.message(), "Loading AI models...");
        assert_eq!(status.to_string(), "[loading] Loading AI models...");
    }
}
