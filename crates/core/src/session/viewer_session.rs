use std::sync::{Arc, Mutex};

use crate::capture::domain::camera::{CameraSource, CameraStream};
use crate::capture::domain::video_surface::VideoSurface;
use crate::detection::domain::model_loader::{ModelLoadError, ModelLoader};
use crate::overlay::domain::canvas::Canvas;
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::session::detection_loop::{DetectionLoop, LoopContext, SharedAnalyzer};
use crate::session::session_config::SessionConfig;
use crate::session::session_error::SessionError;
use crate::session::session_view::{SessionView, Status};
use crate::statistics::domain::statistics_aggregator::{StatisticsAggregator, StatsSnapshot};

/// Builds a fresh overlay canvas for each camera start.
pub type CanvasFactory = Box<dyn Fn() -> Box<dyn Canvas> + Send>;

const MSG_LOADING: &str = "Loading AI models...";
const MSG_LOADED: &str = "Models loaded. Start the camera to begin.";
const MSG_REQUESTING: &str = "Requesting camera access...";
const MSG_ACTIVE: &str = "Camera active - detecting faces...";
const MSG_STOPPED: &str = "Camera stopped. Start the camera to continue.";

/// One viewer session: model readiness, the single camera stream and the
/// single detection loop.
///
/// Lifecycle: [`init`](Self::init) once, then any sequence of
/// [`start`](Self::start) / [`stop`](Self::stop).
pub struct Session {
    config: SessionConfig,
    loader: Box<dyn ModelLoader>,
    camera: Box<dyn CameraSource>,
    canvas_factory: CanvasFactory,
    view: Arc<dyn SessionView>,
    surface: VideoSurface,
    analyzer: Option<SharedAnalyzer>,
    load_failure: Option<String>,
    stream: Option<Box<dyn CameraStream>>,
    detection: Option<DetectionLoop>,
    status: Status,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        loader: Box<dyn ModelLoader>,
        camera: Box<dyn CameraSource>,
        canvas_factory: CanvasFactory,
        view: Arc<dyn SessionView>,
    ) -> Self {
        Self {
            config,
            loader,
            camera,
            canvas_factory,
            view,
            surface: VideoSurface::new(),
            analyzer: None,
            load_failure: None,
            stream: None,
            detection: None,
            status: Status::Loading(MSG_LOADING.into()),
        }
    }

    /// Surface the camera presents frames on.
    pub fn surface(&self) -> &VideoSurface {
        &self.surface
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.analyzer.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    pub fn can_start(&self) -> bool {
        self.is_ready() && !self.is_running()
    }

    pub fn can_stop(&self) -> bool {
        self.is_running()
    }

    /// Loads all models. Loading is attempted once; after a failure every
    /// call returns the recorded error.
    pub fn init(&mut self) -> Result<(), SessionError> {
        if self.is_ready() {
            return Ok(());
        }
        if let Some(reason) = &self.load_failure {
            return Err(ModelLoadError::PreviouslyFailed(reason.clone()).into());
        }

        self.set_status(Status::Loading(MSG_LOADING.into()));
        self.publish_controls();
        log::info!("Loading models");

        match self.loader.load() {
            Ok(analyzer) => {
                self.analyzer = Some(Arc::new(Mutex::new(analyzer)));
                log::info!("All models loaded");
                self.set_status(Status::Ready(MSG_LOADED.into()));
                self.publish_controls();
                Ok(())
            }
            Err(e) => {
                self.load_failure = Some(e.to_string());
                let err = SessionError::from(e);
                self.set_status(Status::Error(err.to_string()));
                self.publish_controls();
                Err(err)
            }
        }
    }

    /// Opens the camera and starts detection. A running stream is stopped
    /// first, so at most one stream and one loop exist.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let Some(analyzer) = self.analyzer.clone() else {
            let err = SessionError::ModelsNotReady;
            self.set_status(Status::Error(err.to_string()));
            return Err(err);
        };

        self.set_status(Status::Loading(MSG_REQUESTING.into()));
        let replaced = self.release();

        if let Err(e) = self.acquire(analyzer) {
            self.release();
            if replaced {
                self.reset_view();
            }
            self.set_status(Status::Error(e.to_string()));
            self.publish_controls();
            return Err(e);
        }

        self.view.video_visible(true);
        self.set_status(Status::Ready(MSG_ACTIVE.into()));
        self.publish_controls();
        Ok(())
    }

    /// Stops the stream and the loop and zeroes the counters. Does nothing
    /// when not running.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        log::info!("Stopping video");
        self.release();
        self.reset_view();
        self.set_status(Status::Ready(MSG_STOPPED.into()));
        self.publish_controls();
    }

    fn acquire(&mut self, analyzer: SharedAnalyzer) -> Result<(), SessionError> {
        let constraints = self.config.constraints();
        log::info!(
            "Requesting camera {}x{} ({:?})",
            constraints.width,
            constraints.height,
            constraints.facing
        );
        let stream = self.stream.insert(self.camera.open(&constraints, self.surface.clone())?);

        let display_size = stream.wait_for_metadata(self.config.metadata_timeout())?;
        stream.play()?;
        log::info!("Video playing at {display_size}");

        self.detection = Some(DetectionLoop::spawn(LoopContext {
            analyzer,
            surface: self.surface.clone(),
            renderer: OverlayRenderer::new((self.canvas_factory)()),
            aggregator: StatisticsAggregator::new(),
            view: self.view.clone(),
            display_size,
            interval: self.config.interval(),
            settle_delay: self.config.settle_delay(),
        }));
        Ok(())
    }

    /// Stops the stream, detaches the surface and cancels the loop; each
    /// step is skipped when there is nothing to release. Returns whether a
    /// stream was running.
    fn release(&mut self) -> bool {
        let stream = self.stream.take();
        let was_running = stream.is_some();
        if let Some(mut stream) = stream {
            stream.stop();
            if stream.is_live() {
                log::warn!("Camera stream still live after stop");
            }
        }
        self.surface.clear();
        if let Some(mut detection) = self.detection.take() {
            detection.stop();
        }
        was_running
    }

    /// Hides the video and zeroes the counters once the loop has exited, so
    /// no tick can overwrite them.
    fn reset_view(&self) {
        self.view.video_visible(false);
        self.view.counters(&StatsSnapshot::default());
    }

    fn set_status(&mut self, status: Status) {
        self.view.status(&status);
        self.status = status;
    }

    fn publish_controls(&self) {
        self.view.controls(self.can_start(), self.can_stop());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}
