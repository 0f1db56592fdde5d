//! Remote participant registry
//!
//! Tracks which remote participants are in the session and which media each of
//! them currently provides. The registry only ever holds references to remote
//! tracks; the hub owns them.
//!
//! Entries are kept in insertion order so that [`RemoteParticipantRegistry::snapshot`]
//! gives a stable layout across re-renders.

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::types::{MediaKind, ParticipantId, TrackId};

/// Reference to a subscribed remote track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    /// Hub-assigned track id
    pub id: TrackId,
    /// Who publishes the track
    pub participant_id: ParticipantId,
    /// What the track carries
    pub kind: MediaKind,
}

impl RemoteTrack {
    /// Create a remote track reference
    pub fn new(id: TrackId, participant_id: ParticipantId, kind: MediaKind) -> Self {
        Self {
            id,
            participant_id,
            kind,
        }
    }
}

/// One remote participant as known from hub events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    /// Participant id
    pub id: ParticipantId,
    /// Subscribed microphone track
    pub audio_track: Option<RemoteTrack>,
    /// Subscribed camera track
    pub video_track: Option<RemoteTrack>,
    /// Audio is published but could not be subscribed
    pub audio_degraded: bool,
    /// Video is published but could not be subscribed
    pub video_degraded: bool,
}

impl RemoteParticipant {
    fn new(id: ParticipantId) -> Self {
        Self {
            id,
            audio_track: None,
            video_track: None,
            audio_degraded: false,
            video_degraded: false,
        }
    }

    /// Whether a remote audio track is available
    pub fn has_audio(&self) -> bool {
        self.audio_track.is_some()
    }

    /// Whether a remote video track is available
    pub fn has_video(&self) -> bool {
        self.video_track.is_some()
    }

    /// Track of the given kind
    pub fn track(&self, kind: MediaKind) -> Option<&RemoteTrack> {
        match kind {
            MediaKind::Audio => self.audio_track.as_ref(),
            MediaKind::Video => self.video_track.as_ref(),
        }
    }

    /// Whether subscribing to `kind` failed for good
    pub fn is_degraded(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio_degraded,
            MediaKind::Video => self.video_degraded,
        }
    }

    fn fields(&mut self, kind: MediaKind) -> (&mut Option<RemoteTrack>, &mut bool) {
        match kind {
            MediaKind::Audio => (&mut self.audio_track, &mut self.audio_degraded),
            MediaKind::Video => (&mut self.video_track, &mut self.video_degraded),
        }
    }
}

/// Registry of remote participants keyed by id
#[derive(Debug, Default)]
pub struct RemoteParticipantRegistry {
    participants: RwLock<Vec<RemoteParticipant>>,
}

impl RemoteParticipantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` now provides `track` of `kind`
    ///
    /// Creates the entry on first sight. Returns `false` and changes nothing
    /// when the track does not carry `kind`.
    pub fn on_published(&self, id: &ParticipantId, kind: MediaKind, track: RemoteTrack) -> bool {
        if track.kind != kind {
            warn!(
                participant_id = %id,
                kind = %kind,
                track_kind = %track.kind,
                "Ignoring published track of the wrong kind"
            );
            return false;
        }

        let mut participants = self.participants.write();
        let index = match participants.iter().position(|p| &p.id == id) {
            Some(index) => index,
            None => {
                debug!(participant_id = %id, "New remote participant");
                participants.push(RemoteParticipant::new(id.clone()));
                participants.len() - 1
            }
        };

        let (slot, degraded) = participants[index].fields(kind);
        *slot = Some(track);
        *degraded = false;
        true
    }

    /// Record that `id` stopped providing `kind`
    ///
    /// Never creates an entry. Returns whether anything changed.
    pub fn on_unpublished(&self, id: &ParticipantId, kind: MediaKind) -> bool {
        let mut participants = self.participants.write();
        let Some(participant) = participants.iter_mut().find(|p| &p.id == id) else {
            return false;
        };

        let (slot, degraded) = participant.fields(kind);
        let changed = slot.is_some() || *degraded;
        *slot = None;
        *degraded = false;
        changed
    }

    /// Remove `id`; removing an unknown id is a no-op
    pub fn on_left(&self, id: &ParticipantId) -> bool {
        let mut participants = self.participants.write();
        let before = participants.len();
        participants.retain(|p| &p.id != id);
        before != participants.len()
    }

    /// Flag `kind` of `id` as published but unavailable
    ///
    /// Creates the entry if needed and drops any track of that kind.
    pub fn mark_degraded(&self, id: &ParticipantId, kind: MediaKind) {
        let mut participants = self.participants.write();
        let index = match participants.iter().position(|p| &p.id == id) {
            Some(index) => index,
            None => {
                participants.push(RemoteParticipant::new(id.clone()));
                participants.len() - 1
            }
        };

        let (slot, degraded) = participants[index].fields(kind);
        *slot = None;
        *degraded = true;
    }

    /// Participants in first-published-first order
    pub fn snapshot(&self) -> Vec<RemoteParticipant> {
        self.participants.read().clone()
    }

    /// Look up one participant
    pub fn get(&self, id: &ParticipantId) -> Option<RemoteParticipant> {
        self.participants.read().iter().find(|p| &p.id == id).cloned()
    }

    /// Number of known participants
    pub fn len(&self) -> usize {
        self.participants.read().len()
    }

    /// Whether no participant is known
    pub fn is_empty(&self) -> bool {
        self.participants.read().is_empty()
    }

    /// Forget everyone, returning how many entries were dropped
    pub fn clear(&self) -> usize {
        let mut participants = self.participants.write();
        let count = participants.len();
        participants.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, kind: MediaKind) -> RemoteTrack {
        RemoteTrack::new(TrackId(format!("{}-{}", id, kind)), ParticipantId::from(id), kind)
    }

    #[test]
    fn test_publish_creates_and_updates_entries() {
        let registry = RemoteParticipantRegistry::new();
        let user_a = ParticipantId::from("userA");

        assert!(registry.on_published(&user_a, MediaKind::Video, track("userA", MediaKind::Video)));
        let entry = registry.get(&user_a).unwrap();
        assert!(entry.has_video());
        assert!(!entry.has_audio());

        registry.on_published(&user_a, MediaKind::Audio, track("userA", MediaKind::Audio));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&user_a).unwrap().has_audio());
    }

    #[test]
    fn test_unpublish_never_creates_entries() {
        let registry = RemoteParticipantRegistry::new();
        assert!(!registry.on_unpublished(&ParticipantId::from("ghost"), MediaKind::Audio));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unpublish_clears_only_that_kind() {
        let registry = RemoteParticipantRegistry::new();
        let id = ParticipantId::from("userA");
        registry.on_published(&id, MediaKind::Audio, track("userA", MediaKind::Audio));
        registry.on_published(&id, MediaKind::Video, track("userA", MediaKind::Video));

        assert!(registry.on_unpublished(&id, MediaKind::Audio));
        assert!(!registry.on_unpublished(&id, MediaKind::Audio));

        let entry = registry.get(&id).unwrap();
        assert!(!entry.has_audio());
        assert!(entry.has_video());
    }

    #[test]
    fn test_left_is_idempotent() {
        let registry = RemoteParticipantRegistry::new();
        let id = ParticipantId::from("userA");
        registry.on_published(&id, MediaKind::Audio, track("userA", MediaKind::Audio));

        assert!(registry.on_left(&id));
        assert!(!registry.on_left(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_keeps_insertion_order() {
        let registry = RemoteParticipantRegistry::new();
        for name in ["carol", "alice", "bob"] {
            let id = ParticipantId::from(name);
            registry.on_published(&id, MediaKind::Audio, track(name, MediaKind::Audio));
        }
        registry.on_published(
            &ParticipantId::from("carol"),
            MediaKind::Video,
            track("carol", MediaKind::Video),
        );

        let order: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|p| p.id.0)
            .collect();
        assert_eq!(order, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_mismatched_track_kind_is_rejected() {
        let registry = RemoteParticipantRegistry::new();
        let id = ParticipantId::from("userA");
        assert!(!registry.on_published(&id, MediaKind::Audio, track("userA", MediaKind::Video)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_degraded_flag_lifecycle() {
        let registry = RemoteParticipantRegistry::new();
        let id = ParticipantId::from("userA");

        registry.mark_degraded(&id, MediaKind::Audio);
        let entry = registry.get(&id).unwrap();
        assert!(entry.is_degraded(MediaKind::Audio));
        assert!(!entry.has_audio());

        registry.on_published(&id, MediaKind::Audio, track("userA", MediaKind::Audio));
        assert!(!registry.get(&id).unwrap().is_degraded(MediaKind::Audio));

        registry.mark_degraded(&id, MediaKind::Audio);
        assert!(registry.on_unpublished(&id, MediaKind::Audio));
        assert!(!registry.get(&id).unwrap().is_degraded(MediaKind::Audio));
    }

    #[test]
    fn test_random_event_sequences_stay_consistent() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::SmallRng::seed_from_u64(7);
        let registry = RemoteParticipantRegistry::new();
        let ids: Vec<_> = ["a", "b", "c"].iter().map(|s| ParticipantId::from(*s)).collect();
        // Last event per (participant, kind): true = published
        let mut expected = std::collections::HashMap::new();

        for _ in 0..500 {
            let id = &ids[rng.gen_range(0..ids.len())];
            let kind = MediaKind::ALL[rng.gen_range(0..2)];
            match rng.gen_range(0..3) {
                0 => {
                    registry.on_published(id, kind, track(id.as_str(), kind));
                    expected.insert((id.clone(), kind), true);
                }
                1 => {
                    registry.on_unpublished(id, kind);
                    expected.insert((id.clone(), kind), false);
                }
                _ => {
                    registry.on_left(id);
                    for kind in MediaKind::ALL {
                        expected.insert((id.clone(), kind), false);
                    }
                }
            }

            for participant in registry.snapshot() {
                for kind in MediaKind::ALL {
                    let published = expected.get(&(participant.id.clone(), kind)).copied().unwrap_or(false);
                    assert_eq!(participant.track(kind).is_some(), published);
                }
            }
        }
    }
}
