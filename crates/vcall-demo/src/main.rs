//! vcall demo host.
//!
//! Runs a scripted call against a simulated RTC engine and an in-process
//! business server, printing every domain event the core emits.

mod engine;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use vcall_core::engine::{
    AudioRoute, LocalAudioLevel, LocalStreamStats, MediaStreamType, NetworkQuality,
    NetworkQualityStats, RemoteAudioLevel, RemoteAudioStats, RemoteStreamStats,
    RemoteVideoStats, RoomStateChange, StreamIndex, UserInfo,
};
use vcall_core::rts::ON_CLOSE_ROOM;
use vcall_core::{
    AppCredentials, AuthService, CallClient, CallEvent, EngineEvent, LocalUser, Participant,
    Permissions, RtsClient, RtsInfo, SettingsStore, VcallError,
};

use crate::engine::SimulatedEngine;
use crate::server::LoopbackServer;

/// Scripted video call against a simulated engine
#[derive(Parser)]
#[command(name = "vcall-demo")]
#[command(about = "Run a scripted video call and print the events it produces")]
struct Cli {
    /// Room to enter (digits only, up to 18)
    room_id: String,

    /// Settings directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Local user id (derived from the device id if omitted)
    #[arg(long)]
    user_id: Option<String>,

    /// Display name shown to other members
    #[arg(long)]
    user_name: Option<String>,

    /// Pretend camera permission was denied
    #[arg(long)]
    deny_camera: bool,

    /// Pretend microphone permission was denied
    #[arg(long)]
    deny_microphone: bool,

    /// Login service to fetch signaling parameters from (setAppInfo).
    /// Without it, fixed loopback parameters are used.
    #[arg(long)]
    app_info_url: Option<String>,

    /// Scene registered with the login service
    #[arg(long, default_value = "videocall")]
    scenes_name: String,

    #[arg(long, default_value = "vcall-demo")]
    app_id: String,

    #[arg(long, default_value = "")]
    app_key: String,

    #[arg(long, default_value = "")]
    access_key_id: String,

    #[arg(long, default_value = "")]
    secret_access_key: String,
}

struct DemoPermissions {
    camera: bool,
    microphone: bool,
}

impl Permissions for DemoPermissions {
    fn has_camera(&self) -> bool {
        self.camera
    }

    fn has_microphone(&self) -> bool {
        self.microphone
    }
}

fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("vcall_core=debug,vcall_demo=info")
                }),
            )
            .with_ansi(false)
            .init();
    });
}

#[tokio::main]
async fn main() -> Result<(), VcallError> {
    init_logging();
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vcall")
    });
    tracing::info!("data directory: {}", data_dir.display());
    let settings = Arc::new(SettingsStore::new(&data_dir));
    if let Some(name) = &cli.user_name {
        settings.set_display_name(Some(name.clone()));
    }

    let device_id = settings.device_id();
    let user = LocalUser {
        user_id: cli
            .user_id
            .clone()
            .unwrap_or_else(|| format!("user-{}", device_id.chars().take(8).collect::<String>())),
        user_name: settings
            .get()
            .display_name
            .unwrap_or_else(|| "Guest".to_string()),
        device_id,
        login_token: "loopback-login".into(),
    };

    let info = match &cli.app_info_url {
        Some(endpoint) => {
            let credentials = AppCredentials {
                app_id: cli.app_id.clone(),
                app_key: cli.app_key.clone(),
                access_key_id: cli.access_key_id.clone(),
                secret_access_key: cli.secret_access_key.clone(),
            };
            AuthService::fetch_rts_info(
                endpoint,
                &cli.scenes_name,
                &user.login_token,
                &user.device_id,
                &credentials,
            )
            .await?
        }
        None => {
            let info = RtsInfo {
                app_id: cli.app_id.clone(),
                rts_token: "loopback-rts".into(),
                server_url: "http://127.0.0.1/rts".into(),
                server_signature: "loopback".into(),
                bid: "video_call".into(),
            };
            info.validate()?;
            info
        }
    };
    tracing::info!("signaling app {} at {}", info.app_id, info.server_url);

    let server = Arc::new(LoopbackServer::new());
    let engine = SimulatedEngine::new();
    let permissions = Arc::new(DemoPermissions {
        camera: !cli.deny_camera,
        microphone: !cli.deny_microphone,
    });
    let (client, sink) = CallClient::start(
        engine.clone(),
        permissions,
        RtsClient::new(server.clone(), info, user.clone()),
        Some(settings),
    );
    engine.attach(sink);

    let mut events = client.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let joined = client.enter_room(&cli.room_id).await?;
    println!(
        "entered room {} as {}, room closes at {}",
        joined.room_id,
        user.user_name,
        joined.closes_at.format("%H:%M:%S")
    );
    run_script(&client, &engine, &server, &joined.room_id).await?;

    client.shutdown().await?;
    drop(client);
    let _ = printer.await;
    Ok(())
}

async fn run_script(
    client: &CallClient,
    engine: &SimulatedEngine,
    server: &LoopbackServer,
    room_id: &str,
) -> Result<(), VcallError> {
    client.bind_local_canvas(false).await?;
    pause().await;

    let bob = Participant::new("u-bob", "Bob");
    engine.fire(EngineEvent::UserJoined(UserInfo {
        user_id: bob.user_id.clone(),
        extra_info: serde_json::to_string(&bob).unwrap_or_default(),
    }));
    engine.fire(EngineEvent::UserPublishStream {
        user_id: bob.user_id.clone(),
        kind: MediaStreamType::Both,
    });
    pause().await;
    client.bind_remote_canvas(&bob.user_id, false).await?;

    engine.fire(EngineEvent::UserPublishScreen {
        user_id: bob.user_id.clone(),
        kind: MediaStreamType::Video,
    });
    pause().await;
    client.bind_remote_canvas(&bob.user_id, true).await?;

    engine.fire(EngineEvent::RemoteAudioLevels(vec![RemoteAudioLevel {
        user_id: bob.user_id.clone(),
        stream: StreamIndex::Main,
        linear_volume: 87,
    }]));
    engine.fire(EngineEvent::LocalAudioLevels(vec![LocalAudioLevel {
        stream: StreamIndex::Main,
        linear_volume: 3,
    }]));
    engine.fire(EngineEvent::NetworkQuality {
        local: NetworkQualityStats {
            user_id: String::new(),
            tx_quality: NetworkQuality::Excellent,
            rx_quality: NetworkQuality::Excellent,
        },
        remote: vec![NetworkQualityStats {
            user_id: bob.user_id.clone(),
            tx_quality: NetworkQuality::Good,
            rx_quality: NetworkQuality::Poor,
        }],
    });
    engine.fire(EngineEvent::RemoteStreamStats(RemoteStreamStats {
        user_id: bob.user_id.clone(),
        audio: Some(RemoteAudioStats {
            received_kbitrate: 48.0,
            loss_rate: 0.02,
            rtt_ms: 64,
        }),
        video: Some(RemoteVideoStats {
            received_kbitrate: 820.0,
            decoder_output_frame_rate: 15,
            width: 540,
            height: 960,
            loss_rate: 0.01,
            rtt_ms: 64,
        }),
    }));
    engine.fire(EngineEvent::LocalStreamStats(LocalStreamStats {
        audio_sent_kbitrate: 32.0,
        video_sent_kbitrate: 1100.0,
        video_sent_frame_rate: 15,
        encoded_width: 720,
        encoded_height: 1280,
        rtt_ms: 58,
        ..Default::default()
    }));
    pause().await;

    client.set_mic_enabled(false).await?;
    client.set_video_resolution("540*960")?;
    client.set_speakerphone(false)?;
    engine.fire(EngineEvent::AudioRouteChanged(AudioRoute::Headset));
    engine.fire(EngineEvent::AudioRouteChanged(AudioRoute::Earpiece));
    pause().await;

    engine.fire(EngineEvent::UserUnpublishScreen {
        user_id: bob.user_id.clone(),
        kind: MediaStreamType::Video,
    });
    engine.fire(EngineEvent::RoomStateChanged(RoomStateChange {
        room_id: room_id.to_string(),
        user_id: String::new(),
        state: 0,
        extra_info: r#"{"join_type":1}"#.into(),
    }));
    pause().await;

    println!("roster:");
    for p in client.participants().await? {
        println!(
            "  [{}] {} ({}) mic={} camera={}{}",
            p.name_prefix(),
            p.user_name,
            p.user_id,
            p.mic_on,
            p.camera_on,
            if p.is_screen_share { " screen" } else { "" }
        );
    }

    engine.fire(EngineEvent::UserLeft {
        user_id: bob.user_id.clone(),
        reason: 0,
    });
    pause().await;

    let payload = server.close_room(room_id);
    client.deliver_broadcast(ON_CLOSE_ROOM, &payload)?;
    pause().await;
    tracing::info!("engine room after close: {:?}", engine.room());
    Ok(())
}

/// Give the engine callback thread time to deliver.
async fn pause() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn print_event(event: &CallEvent) {
    match event {
        CallEvent::ParticipantJoined(p) => println!("+ {} joined", p.user_name),
        CallEvent::ParticipantLeft(p) => println!("- {} left", p.user_name),
        CallEvent::RosterChanged(list) => println!("  roster: {} tile(s)", list.len()),
        CallEvent::MediaStatusChanged {
            user_id,
            kind,
            status,
        } => println!("  {user_id} {kind:?} {status:?}"),
        CallEvent::ScreenShareChanged { started } => println!("  screen share started={started}"),
        CallEvent::AudioRouteChanged { speakerphone } => {
            println!("  speakerphone={speakerphone}")
        }
        CallEvent::SpeakingChanged {
            user_id, speaking, ..
        } => println!("  {user_id} speaking={speaking}"),
        CallEvent::LocalStreamStats(stats) => println!(
            "  local {}x{} {:.0} kbps",
            stats.encoded_width, stats.encoded_height, stats.video_sent_kbitrate
        ),
        CallEvent::RemoteStreamStats(report) => {
            println!("  {} quality {:?}", report.user_id, report.quality)
        }
        CallEvent::ReconnectOccurred { room_id } => println!("~ rejoined room {room_id}"),
        CallEvent::RoomClosed { room_id } => println!("x room {room_id} closed"),
        CallEvent::Notice(notice) => println!("! {notice}"),
        CallEvent::SessionEnded(reason) => println!("= session ended: {reason:?}"),
    }
}
