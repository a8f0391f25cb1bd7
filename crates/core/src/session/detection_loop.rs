use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::capture::domain::video_surface::VideoSurface;
use crate::detection::domain::face_analyzer::FaceAnalyzer;
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::session::session_view::SessionView;
use crate::shared::display_size::DisplaySize;
use crate::statistics::domain::statistics_aggregator::StatisticsAggregator;

pub type SharedAnalyzer = Arc<Mutex<Box<dyn FaceAnalyzer>>>;

/// Everything one run of the loop needs. The renderer and aggregator are
/// owned by the loop thread for its whole lifetime.
pub struct LoopContext {
    pub analyzer: SharedAnalyzer,
    pub surface: VideoSurface,
    pub renderer: OverlayRenderer,
    pub aggregator: StatisticsAggregator,
    pub view: Arc<dyn SessionView>,
    pub display_size: DisplaySize,
    pub interval: Duration,
    pub settle_delay: Duration,
}

/// Fixed-period detection loop on a dedicated thread.
///
/// Ticks are serialized: the ticker holds at most one pending tick, so a
/// tick arriving during inference is dropped, never queued.
pub struct DetectionLoop {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionLoop {
    pub fn spawn(ctx: LoopContext) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = std::thread::spawn(move || run(ctx, stop_rx));
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signals the loop and waits for it to exit. An in-flight tick
    /// completes first; its results are the last ones drawn. Idempotent.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Detection loop thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut ctx: LoopContext, stop_rx: Receiver<()>) {
    crossbeam_channel::select! {
        recv(stop_rx) -> _ => return,
        recv(crossbeam_channel::after(ctx.settle_delay)) -> _ => {}
    }

    log::info!("Face detection started ({}ms interval)", ctx.interval.as_millis());
    ctx.renderer.match_dimensions(ctx.display_size);
    ctx.aggregator.start(Instant::now());

    let ticker = crossbeam_channel::tick(ctx.interval);
    let mut sequence: u64 = 0;
    loop {
        crossbeam_channel::select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                    break;
                }
                sequence += 1;
                if let Err(e) = tick(&mut ctx, sequence) {
                    log::warn!("Detection tick {sequence} failed: {e}");
                }
            }
        }
    }

    ctx.renderer.remove();
    log::info!(
        "Face detection stopped after {sequence} ticks ({} analyzed, {:.1} fps)",
        ctx.aggregator.total_detections(),
        ctx.aggregator.mean_fps()
    );
}

fn tick(ctx: &mut LoopContext, sequence: u64) -> Result<(), Box<dyn std::error::Error>> {
    let Some(frame) = ctx.surface.latest() else {
        log::debug!("Tick {sequence}: no frame yet");
        return Ok(());
    };

    let started = Instant::now();
    let faces = {
        let mut analyzer = ctx.analyzer.lock().unwrap_or_else(|e| e.into_inner());
        analyzer.analyze(&frame)?
    };

    let source = DisplaySize::new(frame.width(), frame.height());
    let resized: Vec<_> = faces
        .iter()
        .map(|f| f.resized(source, ctx.display_size))
        .collect();
    ctx.renderer.render(&resized);

    let snapshot = ctx.aggregator.record(&faces);
    ctx.view.counters(&snapshot);

    log::debug!(
        "Tick {sequence}: frame {}: {} face(s) in {:.1}ms",
        frame.sequence(),
        faces.len(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
