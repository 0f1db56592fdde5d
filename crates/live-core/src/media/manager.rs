//! Local media manager
//!
//! Owns the local microphone and camera tracks for one participant. Acquisition
//! is best-effort and all-or-nothing: if any requested device fails to open,
//! every device opened by that attempt is closed again and the caller gets an
//! empty [`LocalMediaState`] plus the [`MediaAcquisitionError`] explaining why.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::device::{LocalTrack, LocalTrackRef, MediaDeviceBackend};
use crate::error::MediaAcquisitionError;
use crate::types::MediaKind;

/// Read-only view of the local tracks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalMediaState {
    /// Microphone track, if one is open
    pub audio: Option<LocalTrackRef>,
    /// Camera track, if one is open
    pub video: Option<LocalTrackRef>,
    /// Whether the microphone is muted
    pub audio_muted: bool,
    /// Whether the camera is disabled
    pub video_muted: bool,
}

impl LocalMediaState {
    /// `true` when no local track is held (listener-only)
    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }

    /// Track of the given kind
    pub fn track(&self, kind: MediaKind) -> Option<&LocalTrackRef> {
        match kind {
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Video => self.video.as_ref(),
        }
    }

    /// Mute flag of the given kind
    pub fn is_muted(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio_muted,
            MediaKind::Video => self.video_muted,
        }
    }

    /// All held tracks, audio first
    pub fn tracks(&self) -> Vec<LocalTrackRef> {
        self.audio.iter().chain(self.video.iter()).cloned().collect()
    }
}

/// Result of [`LocalMediaManager::acquire`]
#[derive(Debug, Clone, Default)]
pub struct AcquireOutcome {
    /// Tracks now held by the manager
    pub state: LocalMediaState,
    /// Why nothing was acquired, when a device failed
    pub error: Option<MediaAcquisitionError>,
    /// A `release()` overtook this acquisition and its tracks were closed
    pub superseded: bool,
}

/// Counters for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaStats {
    /// Calls to `acquire`
    pub acquire_calls: u64,
    /// Calls to `release`
    pub release_calls: u64,
    /// Tracks handed out by the backend
    pub tracks_opened: u64,
    /// Tracks closed by the manager
    pub tracks_closed: u64,
}

#[derive(Default)]
struct Slots {
    audio: Option<LocalTrack>,
    video: Option<LocalTrack>,
    audio_muted: bool,
    video_muted: bool,
}

impl Slots {
    fn slot(&mut self, kind: MediaKind) -> (&mut Option<LocalTrack>, &mut bool) {
        match kind {
            MediaKind::Audio => (&mut self.audio, &mut self.audio_muted),
            MediaKind::Video => (&mut self.video, &mut self.video_muted),
        }
    }

    fn take_all(&mut self) -> Vec<LocalTrack> {
        self.audio_muted = false;
        self.video_muted = false;
        self.audio.take().into_iter().chain(self.video.take()).collect()
    }

    fn state(&self) -> LocalMediaState {
        LocalMediaState {
            audio: self.audio.as_ref().map(LocalTrack::reference),
            video: self.video.as_ref().map(LocalTrack::reference),
            audio_muted: self.audio_muted,
            video_muted: self.video_muted,
        }
    }
}

/// Acquires, mutes and releases the local tracks
pub struct LocalMediaManager {
    backend: Arc<dyn MediaDeviceBackend>,
    slots: Mutex<Slots>,
    generation: AtomicU64,
    start_audio_muted: bool,
    start_video_muted: bool,
    stats: Mutex<MediaStats>,
}

impl LocalMediaManager {
    /// Create a manager over a device backend
    pub fn new(backend: Arc<dyn MediaDeviceBackend>) -> Self {
        Self {
            backend,
            slots: Mutex::new(Slots::default()),
            generation: AtomicU64::new(0),
            start_audio_muted: false,
            start_video_muted: false,
            stats: Mutex::new(MediaStats::default()),
        }
    }

    /// Mute freshly acquired tracks
    pub fn with_initial_mute(mut self, audio_muted: bool, video_muted: bool) -> Self {
        self.start_audio_muted = audio_muted;
        self.start_video_muted = video_muted;
        self
    }

    /// Open the requested devices
    ///
    /// Never fails: device errors are reported in [`AcquireOutcome::error`]
    /// and leave the manager without tracks. Tracks still held from an
    /// earlier acquisition are closed first.
    pub async fn acquire(&self, want_audio: bool, want_video: bool) -> AcquireOutcome {
        self.stats.lock().acquire_calls += 1;
        let generation = self.generation.load(Ordering::SeqCst);

        let stale = self.slots.lock().take_all();
        if !stale.is_empty() {
            warn!(count = stale.len(), "Closing local tracks left over from a previous acquisition");
            self.close_tracks(stale);
        }

        let backend = &self.backend;
        let open = |wanted: bool, kind: MediaKind| async move {
            if wanted {
                Some(backend.open(kind).await)
            } else {
                None
            }
        };
        let (audio, video) = join(
            open(want_audio, MediaKind::Audio),
            open(want_video, MediaKind::Video),
        )
        .await;

        let mut opened = Vec::new();
        let mut error = None;
        for result in [audio, video].into_iter().flatten() {
            match result {
                Ok(device) => opened.push(LocalTrack::new(device)),
                Err(e) => {
                    warn!(error = %e, "Local device acquisition failed");
                    error.get_or_insert(e);
                }
            }
        }
        self.stats.lock().tracks_opened += opened.len() as u64;

        if let Some(error) = error {
            self.close_tracks(opened);
            return AcquireOutcome {
                state: LocalMediaState::default(),
                error: Some(error),
                superseded: false,
            };
        }

        let mut slots = self.slots.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            drop(slots);
            debug!(count = opened.len(), "Acquisition settled after release, closing its tracks");
            self.close_tracks(opened);
            return AcquireOutcome {
                superseded: true,
                ..Default::default()
            };
        }

        for track in opened {
            let kind = track.kind();
            let muted = match kind {
                MediaKind::Audio => self.start_audio_muted,
                MediaKind::Video => self.start_video_muted,
            };
            track.set_enabled(!muted);
            let (slot, flag) = slots.slot(kind);
            *flag = muted;
            if let Some(duplicate) = slot.replace(track) {
                duplicate.close();
            }
        }

        let state = slots.state();
        info!(
            audio = state.audio.is_some(),
            video = state.video.is_some(),
            "Local media acquired"
        );
        AcquireOutcome {
            state,
            error: None,
            superseded: false,
        }
    }

    /// Mute or unmute the microphone, returns whether a track was affected
    pub fn set_audio_muted(&self, muted: bool) -> bool {
        self.set_muted(MediaKind::Audio, muted)
    }

    /// Disable or enable the camera, returns whether a track was affected
    pub fn set_video_muted(&self, muted: bool) -> bool {
        self.set_muted(MediaKind::Video, muted)
    }

    /// Set the mute state of one kind; a no-op without a track
    pub fn set_muted(&self, kind: MediaKind, muted: bool) -> bool {
        let mut slots = self.slots.lock();
        let (slot, flag) = slots.slot(kind);
        match slot {
            Some(track) => {
                track.set_enabled(!muted);
                *flag = muted;
                debug!(kind = %kind, muted, "Local track mute changed");
                true
            }
            None => false,
        }
    }

    /// Flip the mute state of one kind, returning the new state
    ///
    /// `None` when no track of that kind is held.
    pub fn toggle(&self, kind: MediaKind) -> Option<bool> {
        let mut slots = self.slots.lock();
        let (slot, flag) = slots.slot(kind);
        let track = slot.as_ref()?;
        let muted = !*flag;
        track.set_enabled(!muted);
        *flag = muted;
        Some(muted)
    }

    /// Stop and close every held track, returning how many were closed
    ///
    /// Idempotent. Any acquisition still in flight will close its own tracks
    /// when it settles.
    pub fn release(&self) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.stats.lock().release_calls += 1;

        let tracks = self.slots.lock().take_all();
        let count = tracks.len();
        self.close_tracks(tracks);
        if count > 0 {
            info!(count, "Local media released");
        }
        count
    }

    /// Current local tracks and mute flags
    pub fn state(&self) -> LocalMediaState {
        self.slots.lock().state()
    }

    /// Reference to the held track of `kind`
    pub fn track(&self, kind: MediaKind) -> Option<LocalTrackRef> {
        let mut slots = self.slots.lock();
        let (slot, _) = slots.slot(kind);
        slot.as_ref().map(LocalTrack::reference)
    }

    /// Whether any track is held
    pub fn has_tracks(&self) -> bool {
        !self.state().is_empty()
    }

    /// Counters since creation
    pub fn stats(&self) -> MediaStats {
        *self.stats.lock()
    }

    fn close_tracks(&self, tracks: Vec<LocalTrack>) {
        if tracks.is_empty() {
            return;
        }
        self.stats.lock().tracks_closed += tracks.len() as u64;
        for track in tracks {
            track.close();
        }
    }
}

impl std::fmt::Debug for LocalMediaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMediaManager")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaErrorKind;
    use crate::sim::{DeviceAvailability, Gate, SimulatedDevices};

    fn manager(devices: &Arc<SimulatedDevices>) -> LocalMediaManager {
        LocalMediaManager::new(devices.clone())
    }

    #[tokio::test]
    async fn test_acquire_both_tracks() {
        let devices = Arc::new(SimulatedDevices::new());
        let media = manager(&devices);

        let outcome = media.acquire(true, true).await;
        assert!(outcome.error.is_none());
        assert!(outcome.state.audio.is_some());
        assert!(outcome.state.video.is_some());
        assert_eq!(devices.live_count(), 2);
        assert!(outcome.state.tracks().iter().all(|t| t.is_enabled()));
    }

    #[tokio::test]
    async fn test_denied_camera_releases_microphone() {
        let devices =
            Arc::new(SimulatedDevices::new().with(MediaKind::Video, DeviceAvailability::Denied));
        let media = manager(&devices);

        let outcome = media.acquire(true, true).await;
        let error = outcome.error.expect("acquisition should report an error");
        assert_eq!(error.kind, MediaErrorKind::PermissionDenied);
        assert!(outcome.state.is_empty());
        assert_eq!(devices.live_count(), 0);
        assert!(!media.has_tracks());
    }

    #[tokio::test]
    async fn test_mute_without_track_is_noop() {
        let devices = Arc::new(SimulatedDevices::new());
        let media = manager(&devices);

        assert!(!media.set_audio_muted(true));
        assert_eq!(media.toggle(MediaKind::Video), None);
        assert!(!media.state().audio_muted);
    }

    #[tokio::test]
    async fn test_toggle_flips_enabled_state() {
        let devices = Arc::new(SimulatedDevices::new());
        let media = manager(&devices);
        media.acquire(true, false).await;

        assert_eq!(media.toggle(MediaKind::Audio), Some(true));
        let audio = media.track(MediaKind::Audio).unwrap();
        assert!(!audio.is_enabled());
        assert!(media.state().audio_muted);

        assert!(media.set_audio_muted(false));
        assert!(media.set_audio_muted(false));
        assert!(audio.is_enabled());
    }

    #[tokio::test]
    async fn test_initial_mute_preferences() {
        let devices = Arc::new(SimulatedDevices::new());
        let media = manager(&devices).with_initial_mute(true, false);

        let outcome = media.acquire(true, true).await;
        assert!(outcome.state.audio_muted);
        assert!(!outcome.state.video_muted);
        assert!(!outcome.state.audio.unwrap().is_enabled());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let devices = Arc::new(SimulatedDevices::new());
        let media = manager(&devices);
        let outcome = media.acquire(true, true).await;
        let audio = outcome.state.audio.unwrap();

        assert_eq!(media.release(), 2);
        assert_eq!(media.release(), 0);
        assert!(!audio.is_open());
        assert_eq!(devices.stop_count(), 2);
        assert_eq!(media.stats().tracks_closed, 2);
    }

    #[tokio::test]
    async fn test_release_before_acquire_settles() {
        let gate = Gate::closed();
        let devices = Arc::new(SimulatedDevices::new().with_gate(gate.clone()));
        let media = Arc::new(manager(&devices));

        let pending = tokio::spawn({
            let media = media.clone();
            async move { media.acquire(true, true).await }
        });
        gate.until_waiting(2).await;

        assert_eq!(media.release(), 0);
        gate.open();

        let outcome = pending.await.unwrap();
        assert!(outcome.superseded);
        assert!(outcome.state.is_empty());
        assert_eq!(devices.live_count(), 0);
        assert_eq!(devices.open_count(), 2);
    }
}
