use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::camera::{
    rank_devices, CameraBackend, CameraDescriptor, CameraStream, FocusMode, FocusPoint,
    PreviewSurface, StreamRequest, ZoomRange,
};
use super::config::ScanConfig;
use super::decode::{CodeDetector, DecodedCode};
use super::error::CameraError;
use super::loop_worker::detection_loop;

/// Events surfaced to the view layer. At most one `Decoded` is ever sent per
/// session; `Closed` follows on every teardown.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started {
        session_id: Uuid,
        device_label: String,
        at: DateTime<Utc>,
    },
    Decoded(DecodedCode),
    Closed,
}

/// State shared between the controller, the detection loop, and the
/// zoom/focus handlers. The stream slot is the single-ownership point: at
/// most one open stream exists per controller, and taking it out of the slot
/// is how every teardown path releases it.
pub(crate) struct SessionShared {
    pub(crate) stream: StdMutex<Option<Box<dyn CameraStream>>>,
    pub(crate) zoom: StdMutex<Option<ZoomRange>>,
    pub(crate) focus_point: StdMutex<Option<FocusPoint>>,
    pub(crate) active: AtomicBool,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            stream: StdMutex::new(None),
            zoom: StdMutex::new(None),
            focus_point: StdMutex::new(None),
            active: AtomicBool::new(false),
        }
    }

    /// Shut down and drop the owned stream, if any. Idempotent; called by
    /// the loop on self-teardown and by the controller on `stop()`.
    pub(crate) fn release_stream(&self) {
        if let Some(mut stream) = self.stream.lock().unwrap().take() {
            stream.shutdown();
        }
        *self.zoom.lock().unwrap() = None;
        *self.focus_point.lock().unwrap() = None;
        self.active.store(false, Ordering::SeqCst);
    }
}

struct Inner {
    worker: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    devices: Vec<CameraDescriptor>,
    device_index: usize,
    surface: Option<Arc<dyn PreviewSurface>>,
    session_id: Option<Uuid>,
}

/// Owns the camera acquisition lifecycle: one session at a time, from
/// "user wants to scan" to either a decoded code or a reported failure,
/// with guaranteed release of the stream on every exit path.
pub struct ScanController {
    backend: Arc<dyn CameraBackend>,
    detector: Arc<dyn CodeDetector>,
    config: ScanConfig,
    shared: Arc<SessionShared>,
    inner: Mutex<Inner>,
    events_tx: UnboundedSender<ScanEvent>,
    events_rx: StdMutex<Option<UnboundedReceiver<ScanEvent>>>,
}

impl ScanController {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        detector: Arc<dyn CodeDetector>,
        config: ScanConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            detector,
            config,
            shared: Arc::new(SessionShared::new()),
            inner: Mutex::new(Inner {
                worker: None,
                cancel_token: None,
                devices: Vec::new(),
                device_index: 0,
                surface: None,
                session_id: None,
            }),
            events_tx,
            events_rx: StdMutex::new(Some(events_rx)),
        }
    }

    /// The event stream for this controller. Yields `Started`, at most one
    /// `Decoded` per session, and `Closed`. Can be taken once.
    pub fn take_events(&self) -> Option<UnboundedReceiver<ScanEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn zoom(&self) -> Option<ZoomRange> {
        *self.shared.zoom.lock().unwrap()
    }

    pub fn last_focus_point(&self) -> Option<FocusPoint> {
        *self.shared.focus_point.lock().unwrap()
    }

    /// Ranked device list from the last `start()`, best candidate first.
    pub async fn devices(&self) -> Vec<CameraDescriptor> {
        self.inner.lock().await.devices.clone()
    }

    /// Start a session: enumerate and rank cameras, open the best one, bind
    /// it to `surface`, and begin polling for a code. Fails without touching
    /// any camera when no decoding backend exists, and performs full
    /// teardown before returning any error.
    pub async fn start(&self, surface: Arc<dyn PreviewSurface>) -> Result<(), CameraError> {
        let mut inner = self.inner.lock().await;
        match inner.worker.as_ref().map(|worker| worker.is_finished()) {
            // The previous session closed itself after a decode; reap it.
            Some(true) => self.stop_session(&mut inner).await,
            Some(false) => return Err(CameraError::AlreadyActive),
            None => {}
        }
        if !self.detector.is_available() {
            // Polling without a decoder would never produce a result.
            return Err(CameraError::Unsupported("no barcode decoding backend".into()));
        }
        if !self.backend.is_available() {
            return Err(CameraError::Unsupported("no camera api".into()));
        }

        let devices = self.backend.list_devices()?;
        if devices.is_empty() {
            return Err(CameraError::NoCameraFound);
        }
        inner.devices = rank_devices(devices);
        inner.device_index = 0;

        self.start_session(&mut inner, surface).await
    }

    /// Idempotent teardown: cancels any scheduled poll, discards an
    /// in-flight result, unbinds the surface, and releases the stream. Safe
    /// to call any number of times, at any point in the lifecycle.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        self.stop_session(&mut inner).await;
    }

    /// Tear the current session down, then restart on the next device in
    /// the ranked list (wrapping). The previous stream is fully released
    /// before the new one is requested.
    pub async fn switch_camera(&self) -> Result<(), CameraError> {
        let mut inner = self.inner.lock().await;
        if !self.is_active() {
            return Err(CameraError::NotActive);
        }
        let surface = match inner.surface.clone() {
            Some(surface) => surface,
            None => return Err(CameraError::NotActive),
        };
        self.stop_session(&mut inner).await;

        if inner.devices.is_empty() {
            return Err(CameraError::NoCameraFound);
        }
        inner.device_index = (inner.device_index + 1) % inner.devices.len();
        self.start_session(&mut inner, surface).await
    }

    /// Nudge digital zoom by `delta`. No-op when inactive or when the track
    /// has no zoom capability. The recorded level is the applied one, which
    /// may differ from `current + delta` after clamping and step rounding.
    pub async fn adjust_zoom(&self, delta: f64) {
        if !self.is_active() {
            return;
        }
        let target = {
            match *self.shared.zoom.lock().unwrap() {
                Some(range) => range.step_by(delta),
                None => return,
            }
        };

        let shared = self.shared.clone();
        let applied = tokio::task::spawn_blocking(move || {
            let mut slot = shared.stream.lock().unwrap();
            let Some(stream) = slot.as_mut() else {
                return false;
            };
            match stream.set_zoom(target) {
                Ok(()) => true,
                Err(err) => {
                    warn!("zoom change rejected: {err}");
                    false
                }
            }
        })
        .await
        .unwrap_or(false);

        if applied {
            if let Some(range) = self.shared.zoom.lock().unwrap().as_mut() {
                range.current = target;
            }
        }
    }

    /// Tap-to-focus: best-effort point-of-interest focus and a single-shot
    /// refocus where supported, then back to continuous autofocus. Never an
    /// error; does nothing when inactive.
    pub async fn focus_at(&self, x: f64, y: f64) {
        if !self.is_active() {
            return;
        }
        let point = FocusPoint::new(x, y);
        *self.shared.focus_point.lock().unwrap() = Some(point);

        let shared = self.shared.clone();
        let modes = tokio::task::spawn_blocking(move || {
            let mut slot = shared.stream.lock().unwrap();
            let Some(stream) = slot.as_mut() else {
                return Vec::new();
            };
            if let Err(err) = stream.focus_at(point) {
                debug!("point focus not applied: {err}");
            }
            let modes = stream.focus_modes();
            if modes.contains(&FocusMode::SingleShot) {
                if let Err(err) = stream.set_focus_mode(FocusMode::SingleShot) {
                    debug!("single-shot focus not applied: {err}");
                }
            }
            modes
        })
        .await
        .unwrap_or_default();

        if modes.contains(&FocusMode::SingleShot) {
            tokio::time::sleep(self.config.focus_settle).await;
        }
        if modes.contains(&FocusMode::Continuous) {
            let shared = self.shared.clone();
            let _ = tokio::task::spawn_blocking(move || {
                let mut slot = shared.stream.lock().unwrap();
                if let Some(stream) = slot.as_mut() {
                    if let Err(err) = stream.set_focus_mode(FocusMode::Continuous) {
                        debug!("continuous focus not restored: {err}");
                    }
                }
            })
            .await;
        }
    }

    async fn start_session(
        &self,
        inner: &mut Inner,
        surface: Arc<dyn PreviewSurface>,
    ) -> Result<(), CameraError> {
        let device = inner.devices[inner.device_index].clone();
        let device_label = device.label.clone();
        let request = StreamRequest {
            width: self.config.target_width,
            height: self.config.target_height,
        };

        let backend = self.backend.clone();
        let config = self.config.clone();
        let (stream, zoom) = tokio::task::spawn_blocking(move || {
            let mut stream = backend.open(&device, &request)?;
            let zoom = apply_initial_tuning(stream.as_mut(), &config);
            Ok::<_, CameraError>((stream, zoom))
        })
        .await
        .map_err(|err| CameraError::Device(format!("camera open worker join failed: {err}")))??;

        {
            let mut slot = self.shared.stream.lock().unwrap();
            debug_assert!(slot.is_none(), "stream slot must be empty before a start");
            *slot = Some(stream);
        }
        *self.shared.zoom.lock().unwrap() = zoom;
        self.shared.active.store(true, Ordering::SeqCst);

        let session_id = Uuid::new_v4();
        let cancel_token = CancellationToken::new();
        let worker = tokio::spawn(detection_loop(
            session_id,
            self.shared.clone(),
            self.detector.clone(),
            surface.clone(),
            self.events_tx.clone(),
            cancel_token.clone(),
            self.config.clone(),
        ));

        inner.worker = Some(worker);
        inner.cancel_token = Some(cancel_token);
        inner.surface = Some(surface);
        inner.session_id = Some(session_id);

        let _ = self.events_tx.send(ScanEvent::Started {
            session_id,
            device_label: device_label.clone(),
            at: Utc::now(),
        });
        info!("scan session {session_id} started on '{device_label}'");
        Ok(())
    }

    async fn stop_session(&self, inner: &mut Inner) {
        if let Some(token) = inner.cancel_token.take() {
            token.cancel();
        }
        if let Some(worker) = inner.worker.take() {
            if let Err(err) = worker.await {
                error!("scan worker failed to join: {err}");
            }
        }
        // The worker releases the stream itself on its way out; this covers
        // sessions torn down before the worker ever ran.
        self.shared.release_stream();
        if let Some(surface) = inner.surface.take() {
            surface.clear();
        }
        if let Some(session_id) = inner.session_id.take() {
            debug!("scan session {session_id} torn down");
        }
    }
}

/// Best-effort zoom and autofocus at stream start. Scanning proceeds without
/// either when the track lacks them; failures are logged and ignored.
fn apply_initial_tuning(stream: &mut dyn CameraStream, config: &ScanConfig) -> Option<ZoomRange> {
    let zoom = match stream.zoom_range() {
        Some(range) => {
            let target = range.snap(config.default_zoom.min(range.max));
            match stream.set_zoom(target) {
                Ok(()) => Some(ZoomRange {
                    current: target,
                    ..range
                }),
                Err(err) => {
                    warn!("initial zoom not applied: {err}");
                    Some(range)
                }
            }
        }
        None => None,
    };

    let modes = stream.focus_modes();
    let preferred = if modes.contains(&FocusMode::Continuous) {
        Some(FocusMode::Continuous)
    } else if modes.contains(&FocusMode::SingleShot) {
        Some(FocusMode::SingleShot)
    } else {
        None
    };
    if let Some(mode) = preferred {
        if let Err(err) = stream.set_focus_mode(mode) {
            warn!("autofocus not applied: {err}");
        }
    }

    zoom
}
