//! Join command - join a simulated class session

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use classlive_core::render::LoggingSurface;
use classlive_core::sim::{DeviceAvailability, LoopbackHub, SimulatedDevices, StaticCredentialFetcher};
use classlive_core::{
    ConnectionState, CoordinatorBuilder, LiveSessionConfig, LiveSessionEvent, MediaKind,
    RenderSurface, SessionCoordinator, TrackSource,
};

use crate::cli::JoinArgs;

/// Execute join command
pub async fn execute(args: JoinArgs, mut config: LiveSessionConfig) -> Result<()> {
    let session_id = args.session_id()?;
    if args.no_audio {
        config = config.with_audio(false);
    }
    if args.no_video {
        config = config.with_video(false);
    }

    info!("🎓 Joining live class");
    info!("   Session: {}", session_id);
    info!("   Participant: {}", args.participant);
    info!(
        "   Leave after: {}",
        if args.seconds == 0 { "Ctrl+C".to_string() } else { format!("{}s", args.seconds) }
    );

    let devices = if args.deny_devices {
        SimulatedDevices::all(DeviceAvailability::Denied)
    } else {
        SimulatedDevices::new()
    };
    let hub = Arc::new(LoopbackHub::new());

    let mut builder = CoordinatorBuilder::new()
        .participant(args.participant.as_str())
        .session_client(hub.clone())
        .media_backend(Arc::new(devices));
    if config.credential.endpoint.is_none() {
        builder = builder.credential_fetcher(Arc::new(StaticCredentialFetcher::new("demo-token")));
    }
    let coordinator = builder
        .config(config)
        .build()
        .context("building session coordinator")?;

    let surface = Arc::new(LoggingSurface::new("classroom"));
    let printer = tokio::spawn(print_events(coordinator.clone(), surface.clone()));

    let mount = coordinator.mount();
    let joined = coordinator
        .join(session_id.clone())
        .await
        .with_context(|| format!("joining {}", session_id))?;

    if joined.is_listener_only() {
        println!("🎧 Joined {} as listener only", joined.session.session_id);
    } else {
        println!("✅ Joined {}", joined.session.session_id);
    }
    if let Some(preview) = &joined.local_media.video {
        preview.attach_to(surface.as_ref());
    }

    // The remote side of the demo: a host who shares audio and video
    hub.remote_publish("host", MediaKind::Audio);
    hub.remote_publish("host", MediaKind::Video);

    let mut states = coordinator.state_changes();
    let ended = states.wait_for(|state| *state == ConnectionState::Idle);
    tokio::select! {
        _ = linger(args.seconds) => info!("📴 Leaving session..."),
        _ = ended => warn!("Session ended by the hub"),
    }

    mount.unmount().await;
    printer.abort();

    let stats = coordinator.media_stats();
    println!(
        "👋 Left {} ({} local tracks opened, {} closed)",
        session_id, stats.tracks_opened, stats.tracks_closed
    );
    Ok(())
}

async fn linger(seconds: u64) {
    if seconds > 0 {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
    } else if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
}

async fn print_events(coordinator: SessionCoordinator, surface: Arc<LoggingSurface>) {
    let mut events = coordinator.events();
    while let Some(event) = events.next().await {
        match event {
            LiveSessionEvent::StateChanged { current, .. } => println!("🔄 {}", current),
            LiveSessionEvent::ListenerOnly { error } => println!("🎧 {}", error),
            LiveSessionEvent::JoinFailed { cause, .. } => println!("❌ {}", cause),
            LiveSessionEvent::RemoteMediaChanged {
                participant_id,
                kind,
                available,
            } => {
                println!(
                    "📡 {} {} {}",
                    participant_id,
                    if available { "started" } else { "stopped" },
                    kind
                );
                if available {
                    let track = coordinator
                        .registry()
                        .get(&participant_id)
                        .and_then(|p| p.track(kind).cloned());
                    if let Some(track) = track {
                        track.attach_to(surface.as_ref());
                    }
                } else {
                    detach_remote(&surface, |pid, k| *pid == participant_id && k == kind);
                }
            }
            LiveSessionEvent::RemoteParticipantLeft { participant_id } => {
                println!("🚪 {} left", participant_id);
                detach_remote(&surface, |pid, _| *pid == participant_id);
            }
            LiveSessionEvent::SubscribeFailed {
                participant_id,
                kind,
                cause,
            } => println!("⚠️  {} of {} unavailable: {}", kind, participant_id, cause),
            LiveSessionEvent::ConnectionInterrupted { .. } => println!("⏳ Reconnecting..."),
            LiveSessionEvent::ConnectionRestored => println!("✅ Reconnected"),
            LiveSessionEvent::HubException { code, message } => {
                println!("⚠️  Hub exception {}: {}", code, message.unwrap_or_default())
            }
            LiveSessionEvent::LocalMediaToggled { kind, muted } => {
                println!("🎚️  {} {}", kind, if muted { "muted" } else { "unmuted" })
            }
            LiveSessionEvent::SessionEnded { reason, .. } => println!("📴 {}", reason),
        }
    }
}

fn detach_remote(
    surface: &LoggingSurface,
    matches: impl Fn(&classlive_core::ParticipantId, MediaKind) -> bool,
) {
    for source in surface.attached() {
        if let TrackSource::Remote {
            participant_id,
            kind,
            ..
        } = &source
        {
            if matches(participant_id, *kind) {
                surface.detach(source.track_id());
            }
        }
    }
}
