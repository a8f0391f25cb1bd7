use std::fmt;
use std::time::Instant;

use crate::detection::domain::face_analysis::FaceAnalysis;
use crate::statistics::domain::fps_window::FpsWindow;

/// Rounded counters as shown to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub faces: usize,
    pub fps: u32,
    /// Mean detection score of the last tick, in percent.
    pub confidence: u32,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Faces: {} | FPS: {} | Confidence: {}%",
            self.faces, self.fps, self.confidence
        )
    }
}

/// Rolling per-tick statistics: smoothed FPS over the last ticks plus the
/// face count and mean confidence of the latest tick.
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    window: FpsWindow,
    last_tick: Option<Instant>,
    total_detections: u64,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primes the previous timestamp so the first tick yields a sample.
    pub fn start(&mut self, now: Instant) {
        self.last_tick = Some(now);
    }

    pub fn record(&mut self, faces: &[FaceAnalysis]) -> StatsSnapshot {
        self.record_at(Instant::now(), faces)
    }

    pub fn record_at(&mut self, now: Instant, faces: &[FaceAnalysis]) -> StatsSnapshot {
        if let Some(previous) = self.last_tick {
            let elapsed = now.saturating_duration_since(previous).as_secs_f64();
            if elapsed > 0.0 {
                self.window.push(1.0 / elapsed);
            }
        }
        self.last_tick = Some(now);
        self.total_detections += 1;

        let confidence = if faces.is_empty() {
            0.0
        } else {
            faces.iter().map(|f| f.score).sum::<f64>() / faces.len() as f64 * 100.0
        };

        StatsSnapshot {
            faces: faces.len(),
            fps: self.window.mean().round() as u32,
            confidence: confidence.round() as u32,
        }
    }

    pub fn mean_fps(&self) -> f64 {
        self.window.mean()
    }

    pub fn fps_samples(&self) -> usize {
        self.window.len()
    }

    /// Number of recorded ticks, not faces.
    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }
}
