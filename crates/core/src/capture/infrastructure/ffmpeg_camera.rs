use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::camera::{CameraSource, CameraStream, CaptureConstraints, FacingMode};
use crate::capture::domain::camera_error::CameraError;
use crate::capture::domain::video_surface::VideoSurface;
use crate::shared::display_size::DisplaySize;
use crate::shared::frame::Frame;

#[cfg(target_os = "macos")]
const INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const INPUT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const INPUT_FORMAT: &str = "v4l2";

/// Platform default capture device for [`INPUT_FORMAT`].
///
/// DirectShow addresses devices by friendly name only, so Windows has no
/// default and the device must be configured.
fn default_device() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        Some("0".to_string())
    }
    #[cfg(target_os = "windows")]
    {
        None
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Some("/dev/video0".to_string())
    }
}

/// Opens the system camera through libavdevice.
///
/// The device is opened and decoded on a dedicated capture thread; each
/// decoded frame is converted to RGB24 and presented on the bound
/// [`VideoSurface`].
#[derive(Default)]
pub struct FfmpegCamera;

impl FfmpegCamera {
    pub fn new() -> Self {
        Self
    }
}

impl CameraSource for FfmpegCamera {
    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        surface: VideoSurface,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        if constraints.audio {
            log::warn!("Audio capture is not supported, requesting video only");
        }
        if constraints.facing != FacingMode::User {
            log::debug!("Facing mode {:?} has no effect on desktop devices", constraints.facing);
        }
        let device = constraints
            .device
            .clone()
            .or_else(default_device)
            .ok_or(CameraError::NotFound)?;

        let (opened_tx, opened_rx) = crossbeam_channel::bounded(1);
        let (metadata_tx, metadata_rx) = crossbeam_channel::bounded(1);
        let (play_tx, play_rx) = crossbeam_channel::bounded::<()>(1);
        let cancelled = Arc::new(AtomicBool::new(false));

        let handle = spawn_capture(
            device.clone(),
            (constraints.width, constraints.height),
            surface.clone(),
            opened_tx,
            metadata_tx,
            play_rx,
            cancelled.clone(),
        );

        let opened = opened_rx
            .recv()
            .unwrap_or_else(|_| Err(CameraError::Other("capture thread exited".into())));
        if let Err(e) = opened {
            let _ = handle.join();
            return Err(e);
        }
        log::info!("Camera access granted ({device})");

        Ok(Box::new(FfmpegCameraStream {
            metadata_rx,
            metadata: None,
            play_tx: Some(play_tx),
            cancelled,
            handle: Some(handle),
            surface,
        }))
    }
}

struct FfmpegCameraStream {
    metadata_rx: Receiver<Result<DisplaySize, CameraError>>,
    metadata: Option<DisplaySize>,
    play_tx: Option<Sender<()>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    surface: VideoSurface,
}

impl CameraStream for FfmpegCameraStream {
    fn wait_for_metadata(&mut self, timeout: Duration) -> Result<DisplaySize, CameraError> {
        if let Some(size) = self.metadata {
            return Ok(size);
        }
        match self.metadata_rx.recv_timeout(timeout) {
            Ok(Ok(size)) => {
                log::info!("Video metadata loaded: {size}");
                self.metadata = Some(size);
                Ok(size)
            }
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) => Err(CameraError::Other(
                "Timed out waiting for the video stream.".into(),
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CameraError::Other("The video stream ended.".into()))
            }
        }
    }

    fn play(&mut self) -> Result<(), CameraError> {
        let tx = self
            .play_tx
            .as_ref()
            .ok_or_else(|| CameraError::Other("The video stream was stopped.".into()))?;
        match tx.try_send(()) {
            // Full means play was already requested.
            Ok(()) | Err(crossbeam_channel::TrySendError::Full(())) => Ok(()),
            Err(crossbeam_channel::TrySendError::Disconnected(())) => {
                Err(CameraError::Other("The video stream ended.".into()))
            }
        }
    }

    fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.play_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Capture thread panicked");
            }
            log::info!("Camera stopped");
        }
        self.surface.clear();
    }

    fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for FfmpegCameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_capture(
    device: String,
    preferred_size: (u32, u32),
    surface: VideoSurface,
    opened_tx: Sender<Result<(), CameraError>>,
    metadata_tx: Sender<Result<DisplaySize, CameraError>>,
    play_rx: Receiver<()>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut input = match open_device(&device, preferred_size) {
            Ok(input) => input,
            Err(e) => {
                let _ = opened_tx.send(Err(e));
                return;
            }
        };
        let _ = opened_tx.send(Ok(()));

        let (mut decoder, stream_index) = match video_decoder(&input) {
            Ok(pair) => pair,
            Err(e) => {
                let _ = metadata_tx.send(Err(e));
                return;
            }
        };
        let size = DisplaySize::new(decoder.width(), decoder.height());
        if metadata_tx.send(Ok(size)).is_err() {
            return;
        }

        // Disconnected means the stream was stopped before playback.
        if play_rx.recv().is_err() {
            return;
        }

        if let Err(e) = decode_frames(&mut input, &mut decoder, stream_index, &surface, &cancelled) {
            log::warn!("Camera capture ended: {e}");
        }
    })
}

fn open_device(
    device: &str,
    (width, height): (u32, u32),
) -> Result<ffmpeg_next::format::context::Input, CameraError> {
    ffmpeg_next::init().map_err(camera_error)?;

    let mut options = ffmpeg_next::Dictionary::new();
    options.set("video_size", &format!("{width}x{height}"));

    // The preferred size is a hint; fall back to the device default when
    // the device rejects it for reasons other than access.
    let ctx = match open_input(device, options) {
        Err(CameraError::Other(reason)) => {
            log::debug!("Preferred size {width}x{height} rejected ({reason}), retrying with device default");
            open_input(device, ffmpeg_next::Dictionary::new())?
        }
        other => other?,
    };
    Ok(ctx)
}

fn open_input(
    device: &str,
    options: ffmpeg_next::Dictionary,
) -> Result<ffmpeg_next::format::context::Input, CameraError> {
    let format = ffmpeg_next::device::input::video()
        .find(|f| matches_format_name(f.name(), INPUT_FORMAT))
        .map(ffmpeg_next::format::Format::Input)
        .ok_or_else(|| CameraError::Other(format!("{INPUT_FORMAT} capture is not available.")))?;
    match ffmpeg_next::format::open_with(&device, &format, options).map_err(camera_error)? {
        ffmpeg_next::format::context::Context::Input(input) => Ok(input),
        ffmpeg_next::format::context::Context::Output(_) => {
            Err(CameraError::Other("Device opened as an output.".into()))
        }
    }
}

fn video_decoder(
    input: &ffmpeg_next::format::context::Input,
) -> Result<(ffmpeg_next::decoder::Video, usize), CameraError> {
    let stream = input
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or(CameraError::NotFound)?;
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .map_err(camera_error)?;
    let decoder = codec_ctx.decoder().video().map_err(camera_error)?;
    Ok((decoder, stream.index()))
}

fn decode_frames(
    input: &mut ffmpeg_next::format::context::Input,
    decoder: &mut ffmpeg_next::decoder::Video,
    stream_index: usize,
    surface: &VideoSurface,
    cancelled: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let width = decoder.width();
    let height = decoder.height();
    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        width,
        height,
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?;

    let mut sequence: u64 = 0;
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    let mut rgb = ffmpeg_next::util::frame::video::Video::empty();

    for (stream, packet) in input.packets() {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        if stream.index() != stream_index || decoder.send_packet(&packet).is_err() {
            continue;
        }
        while decoder.receive_frame(&mut decoded).is_ok() {
            scaler.run(&decoded, &mut rgb)?;
            let pixels = extract_rgb_pixels(&rgb, width, height);
            surface.present(Frame::new(pixels, width, height, sequence));
            sequence += 1;
        }
    }
    Ok(())
}

/// Copies pixel data out of an ffmpeg frame, dropping row padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * Frame::CHANNELS;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}

/// libavformat names may list aliases, e.g. `"video4linux2,v4l2"`.
fn matches_format_name(names: &str, wanted: &str) -> bool {
    names.split(',').any(|n| n.trim() == wanted)
}

fn camera_error(e: ffmpeg_next::Error) -> CameraError {
    match e {
        ffmpeg_next::Error::Other { errno } => CameraError::from_errno(errno, e.to_string()),
        other => CameraError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_format_aliases() {
        assert!(matches_format_name("video4linux2,v4l2", "v4l2"));
        assert!(matches_format_name("avfoundation", "avfoundation"));
        assert!(!matches_format_name("lavfi", "v4l2"));
    }

    #[test]
    fn test_camera_error_maps_errno() {
        assert_eq!(
            camera_error(ffmpeg_next::Error::Other { errno: 13 }),
            CameraError::PermissionDenied
        );
        assert_eq!(
            camera_error(ffmpeg_next::Error::Other { errno: 16 }),
            CameraError::Busy
        );
        assert_eq!(
            camera_error(ffmpeg_next::Error::Other { errno: 2 }),
            CameraError::NotFound
        );
    }

    #[test]
    fn test_camera_error_non_errno_is_other() {
        assert!(matches!(
            camera_error(ffmpeg_next::Error::Eof),
            CameraError::Other(_)
        ));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut camera = FfmpegCamera::new();
        let constraints = CaptureConstraints {
            device: Some("/nonexistent/video99".into()),
            ..CaptureConstraints::default()
        };
        let result = camera.open(&constraints, VideoSurface::new());
        assert!(result.is_err());
    }
}
