use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::camera::PreviewSurface;
use super::config::ScanConfig;
use super::controller::{ScanEvent, SessionShared};
use super::decode::{CodeDetector, DecodedCode};

/// Detection loop for one live session. Runs until a code is read or the
/// token is cancelled, then tears the live half of the session down itself,
/// so resources are released even when `stop()` is never called.
pub(crate) async fn detection_loop(
    session_id: Uuid,
    shared: Arc<SessionShared>,
    detector: Arc<dyn CodeDetector>,
    surface: Arc<dyn PreviewSurface>,
    events: UnboundedSender<ScanEvent>,
    cancel_token: CancellationToken,
    config: ScanConfig,
) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let decoded = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let attempt = attempt_once(shared.clone(), detector.clone(), surface.clone());
                tokio::select! {
                    result = tokio::time::timeout(config.attempt_timeout, attempt) => {
                        match result {
                            Ok(Some(code)) => break Some(code),
                            Ok(None) => {}
                            Err(_) => warn!(
                                "scan attempt exceeded {:?} in session {session_id}",
                                config.attempt_timeout
                            ),
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        // stop() arrived mid-attempt. The blocking call
                        // finishes in the background and its result is
                        // dropped unseen.
                        break None;
                    }
                }
            }
            _ = cancel_token.cancelled() => break None,
        }
    };

    // A result that raced with stop() is dropped, not delivered.
    let deliver = match decoded {
        Some(code) if !cancel_token.is_cancelled() => Some(code),
        Some(_) => {
            debug!("discarding late decode in session {session_id}");
            None
        }
        None => None,
    };

    cancel_token.cancel();
    // Releasing may have to wait for an abandoned attempt to let go of the
    // stream; that wait belongs on the blocking pool.
    let release = tokio::task::spawn_blocking({
        let shared = shared.clone();
        move || shared.release_stream()
    });
    if let Err(err) = release.await {
        warn!("stream release worker join failed: {err}");
    }
    surface.clear();

    // The session is fully torn down before the code is handed over, and a
    // code is handed over at most once per session.
    if let Some(code) = deliver {
        info!("session {session_id} read a code");
        let _ = events.send(ScanEvent::Decoded(code));
    }
    let _ = events.send(ScanEvent::Closed);
    info!("scan session {session_id} closed");
}

/// One grab-present-detect attempt. Transient failures (a dropped frame, a
/// decode error on a single image) are logged and swallowed; they must never
/// reach the caller or end the session.
async fn attempt_once(
    shared: Arc<SessionShared>,
    detector: Arc<dyn CodeDetector>,
    surface: Arc<dyn PreviewSurface>,
) -> Option<DecodedCode> {
    let joined = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<DecodedCode>> {
        let mut slot = shared.stream.lock().unwrap();
        let Some(stream) = slot.as_mut() else {
            return Ok(None);
        };
        let frame = stream.grab_frame()?;
        surface.present(&frame);
        Ok(detector.detect(&frame)?)
    })
    .await;

    match joined {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            warn!("scan attempt failed: {err:#}");
            None
        }
        Err(err) => {
            warn!("scan attempt worker join failed: {err}");
            None
        }
    }
}
