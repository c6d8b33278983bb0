//! Upload flow state machine.
//!
//! One `UploadFlow` owns the pending asset, the in-flight submission and the
//! displayed result. Every capture or submission starts a new cycle; a
//! response is only installed if its cycle is still current when it
//! arrives. Terminal states (`Succeeded`, `Failed`) persist until the next
//! user action or [`UploadFlow::reset`].

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use safewatch_client::{
    DetectionProfile, InferenceClient, NotificationClient, SubmissionRequest, UploadProgress,
};
use safewatch_models::{CaptureMode, CycleId, DetectionResult, FlowEvent, FlowState, MediaAsset};

use crate::capture::{Camera, CapturedMedia};
use crate::dispatcher::NotificationDispatcher;
use crate::error::{CaptureResult, FlowError, FlowResult};
use crate::metrics;
use crate::reconciler::Reconciler;
use crate::registry::DisplayUrlRegistry;

/// Buffered flow events per subscriber.
pub const EVENT_CAPACITY: usize = 64;

/// A finished submission on display.
#[derive(Debug, Clone)]
pub struct CompletedSubmission {
    pub cycle: CycleId,
    /// The asset that was uploaded
    pub original: MediaAsset,
    pub result: DetectionResult,
    pub completed_at: DateTime<Utc>,
}

/// Returned by a successful [`UploadFlow::submit`].
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub cycle: CycleId,
    pub result: DetectionResult,
    /// Violation notification task, if one was started
    pub notification: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Slot {
    cycle: CycleId,
    state: FlowState,
    mode: CaptureMode,
    pending: Option<MediaAsset>,
    in_flight: Option<MediaAsset>,
    completed: Option<CompletedSubmission>,
    last_error: Option<String>,
    progress: Option<watch::Receiver<u8>>,
}

pub struct UploadFlow {
    client: InferenceClient,
    reconciler: Reconciler,
    dispatcher: NotificationDispatcher,
    registry: Arc<DisplayUrlRegistry>,
    profile: DetectionProfile,
    slot: Mutex<Slot>,
    events: broadcast::Sender<FlowEvent>,
}

impl UploadFlow {
    pub fn new(
        client: InferenceClient,
        notifier: NotificationClient,
        profile: DetectionProfile,
    ) -> Self {
        let registry = Arc::new(DisplayUrlRegistry::new());
        let reconciler = Reconciler::new(client.base_url().clone(), Arc::clone(&registry));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            client,
            reconciler,
            dispatcher: NotificationDispatcher::new(Arc::new(notifier)),
            registry,
            profile,
            slot: Mutex::new(Slot::default()),
            events,
        }
    }

    pub fn profile(&self) -> DetectionProfile {
        self.profile
    }

    pub fn registry(&self) -> &Arc<DisplayUrlRegistry> {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> FlowState {
        self.slot().state
    }

    pub fn mode(&self) -> CaptureMode {
        self.slot().mode
    }

    pub fn cycle(&self) -> CycleId {
        self.slot().cycle
    }

    pub fn pending(&self) -> Option<MediaAsset> {
        self.slot().pending.clone()
    }

    pub fn completed(&self) -> Option<CompletedSubmission> {
        self.slot().completed.clone()
    }

    pub fn result(&self) -> Option<DetectionResult> {
        self.slot().completed.as_ref().map(|c| c.result.clone())
    }

    /// Message of the failure currently on display.
    pub fn last_error(&self) -> Option<String> {
        self.slot().last_error.clone()
    }

    /// Progress of the current cycle's upload, if one was started.
    pub fn progress(&self) -> Option<watch::Receiver<u8>> {
        self.slot().progress.clone()
    }

    /// Switch between file and camera capture. Drops the pending asset and
    /// invalidates any in-flight submission.
    pub fn set_mode(&self, mode: CaptureMode) {
        let mut slot = self.slot();
        if slot.mode == mode {
            return;
        }

        slot.mode = mode;
        slot.cycle = slot.cycle.next();
        let released =
            self.release_asset(slot.pending.take()) + self.release_asset(slot.in_flight.take());
        metrics::record_urls_released(released);
        slot.last_error = None;
        slot.progress = None;

        info!(mode = ?mode, cycle = %slot.cycle, "Capture mode switched");
        self.transition(&mut slot, FlowState::Idle);
    }

    /// Use an in-memory file as the pending asset.
    pub fn choose_file(
        &self,
        filename: impl Into<String>,
        mime: impl Into<String>,
        data: Vec<u8>,
    ) -> FlowResult<MediaAsset> {
        let mut slot = self.slot();
        self.begin_capture(&mut slot, CaptureMode::File);
        let captured = CapturedMedia::from_file(filename, mime, data);
        self.finish_capture(&mut slot, captured)
    }

    /// Load a file from disk as the pending asset.
    pub async fn choose_path(&self, path: &Path) -> FlowResult<MediaAsset> {
        self.capture_with(CaptureMode::File, CapturedMedia::from_path(path))
            .await
    }

    /// Take a camera snapshot as the pending asset.
    pub async fn capture(&self, camera: &dyn Camera) -> FlowResult<MediaAsset> {
        self.capture_with(CaptureMode::Camera, CapturedMedia::from_camera(camera))
            .await
    }

    /// Upload the pending asset and install the reconciled result.
    ///
    /// Returns [`FlowError::Superseded`] without touching visible state if a
    /// newer action replaced this cycle while the request was in flight.
    pub async fn submit(&self) -> FlowResult<SubmissionOutcome> {
        let (cycle, request, progress) = {
            let mut slot = self.slot();
            let Some(asset) = slot.pending.take() else {
                let error = FlowError::validation("no media chosen");
                // Leave an upload in flight untouched
                if slot.in_flight.is_some() {
                    warn!(cycle = %slot.cycle, "Submit rejected while uploading: {}", error);
                    return Err(error);
                }
                return Err(self.fail(&mut slot, error));
            };

            slot.cycle = slot.cycle.next();
            let superseded = self.release_asset(slot.in_flight.take());
            metrics::record_urls_released(superseded);

            let cycle = slot.cycle;
            let events = self.events.clone();
            let progress = UploadProgress::with_observer(move |value| {
                let _ = events.send(FlowEvent::progress(cycle, value));
            });

            slot.in_flight = Some(asset.clone());
            slot.progress = Some(progress.subscribe());
            slot.last_error = None;
            info!(
                cycle = %cycle,
                profile = %self.profile,
                filename = %asset.filename,
                kind = %asset.kind,
                "Submitting media"
            );
            self.transition(&mut slot, FlowState::Submitting);

            (cycle, SubmissionRequest::new(self.profile, asset), progress)
        };

        let response = self.client.submit(&request, &progress).await;

        let mut slot = self.slot();
        if slot.cycle != cycle {
            metrics::record_stale_response();
            debug!(cycle = %cycle, current = %slot.cycle, "Discarding stale response");
            return Err(FlowError::Superseded(cycle));
        }

        let original = slot.in_flight.take();
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                let released = self.release_asset(original);
                metrics::record_urls_released(released);
                return Err(self.fail(&mut slot, e.into()));
            }
        };
        let Some(original) = original else {
            return Err(FlowError::Superseded(cycle));
        };

        let released = self.release_completed(slot.completed.take());
        metrics::record_urls_released(released);

        let result = self.reconciler.reconcile(&response, &original);
        let summary = result.violation_summary();

        slot.completed = Some(CompletedSubmission {
            cycle,
            original,
            result: result.clone(),
            completed_at: Utc::now(),
        });
        self.transition(&mut slot, FlowState::Succeeded);
        self.emit(FlowEvent::succeeded(cycle, result.kind(), summary.total()));
        metrics::record_cycle("succeeded");
        info!(
            cycle = %cycle,
            kind = result.kind().as_str(),
            detections = result.detections().len(),
            violations = summary.total(),
            "Submission succeeded"
        );
        drop(slot);

        let notification = self.dispatcher.dispatch(cycle, &summary);

        Ok(SubmissionOutcome {
            cycle,
            result,
            notification,
        })
    }

    /// Clear everything and return to `Idle`.
    pub fn reset(&self) {
        let mut slot = self.slot();
        slot.cycle = slot.cycle.next();
        let released = self.release_asset(slot.pending.take())
            + self.release_asset(slot.in_flight.take())
            + self.release_completed(slot.completed.take());
        metrics::record_urls_released(released);
        slot.last_error = None;
        slot.progress = None;
        self.transition(&mut slot, FlowState::Idle);
    }

    /// Tear down: invalidate any in-flight submission and release every
    /// display URL this flow allocated.
    pub fn shutdown(&self) {
        let mut slot = self.slot();
        slot.cycle = slot.cycle.next();
        slot.pending = None;
        slot.in_flight = None;
        slot.completed = None;
        slot.last_error = None;
        slot.progress = None;
        let released = self.registry.revoke_all();
        metrics::record_urls_released(released);
        info!(released, "Upload flow shut down");
        self.transition(&mut slot, FlowState::Idle);
    }

    async fn capture_with<F>(&self, mode: CaptureMode, capture: F) -> FlowResult<MediaAsset>
    where
        F: Future<Output = CaptureResult<CapturedMedia>>,
    {
        let cycle = {
            let mut slot = self.slot();
            self.begin_capture(&mut slot, mode)
        };

        let captured = capture.await;

        let mut slot = self.slot();
        if slot.cycle != cycle {
            debug!(cycle = %cycle, current = %slot.cycle, "Discarding stale capture");
            return Err(FlowError::Superseded(cycle));
        }
        self.finish_capture(&mut slot, captured)
    }

    /// Start a capture cycle; invalidates any in-flight submission.
    fn begin_capture(&self, slot: &mut Slot, mode: CaptureMode) -> CycleId {
        slot.cycle = slot.cycle.next();
        slot.mode = mode;
        let released = self.release_asset(slot.in_flight.take());
        metrics::record_urls_released(released);
        slot.progress = None;
        self.transition(slot, FlowState::Capturing);
        slot.cycle
    }

    fn finish_capture(
        &self,
        slot: &mut Slot,
        captured: CaptureResult<CapturedMedia>,
    ) -> FlowResult<MediaAsset> {
        // The previous pending asset is gone either way
        let released = self.release_asset(slot.pending.take());
        metrics::record_urls_released(released);

        let media = match captured {
            Ok(media) => media,
            Err(e) => return Err(self.fail(slot, e.into())),
        };

        let asset = media.into_asset(&self.registry);
        debug!(
            cycle = %slot.cycle,
            filename = %asset.filename,
            kind = %asset.kind,
            url = %asset.display_url,
            "Pending media ready"
        );
        slot.pending = Some(asset.clone());
        slot.last_error = None;
        self.transition(slot, FlowState::Ready);
        Ok(asset)
    }

    fn fail(&self, slot: &mut Slot, error: FlowError) -> FlowError {
        warn!(cycle = %slot.cycle, kind = error.label(), "Flow failed: {}", error);
        slot.last_error = Some(error.to_string());
        self.transition(slot, FlowState::Failed);
        self.emit(FlowEvent::failed(slot.cycle, error.to_string()));
        metrics::record_cycle(error.label());
        error
    }

    fn transition(&self, slot: &mut Slot, state: FlowState) {
        debug!(cycle = %slot.cycle, from = %slot.state, to = %state, "Flow state change");
        slot.state = state;
        self.emit(FlowEvent::state_changed(slot.cycle, state));
    }

    fn emit(&self, event: FlowEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn release_asset(&self, asset: Option<MediaAsset>) -> usize {
        asset
            .map(|asset| usize::from(self.registry.revoke(&asset.display_url)))
            .unwrap_or(0)
    }

    fn release_completed(&self, completed: Option<CompletedSubmission>) -> usize {
        let Some(completed) = completed else {
            return 0;
        };

        let mut released = usize::from(self.registry.revoke(&completed.original.display_url));
        for url in completed.result.local_urls() {
            released += usize::from(self.registry.revoke(url));
        }
        released
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for UploadFlow {
    fn drop(&mut self) {
        let released = self.registry.revoke_all();
        if released > 0 {
            debug!(released, "Released display URLs on teardown");
        }
    }
}
