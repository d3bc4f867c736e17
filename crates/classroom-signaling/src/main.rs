//! Classroom Signaling Console
//!
//! Runs one side of a classroom over an in-process pub/sub bus: a teacher
//! console that drives hotkeys, admission and meeting end, or a student
//! console that reacts to `CONTROL` and `HIGHLIGHT` messages.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing (`RUST_LOG`, `CLASSROOM_JSON_LOGS`)
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Start health HTTP server (liveness, readiness, metrics)
//! 5. Spawn the host or participant actor for the configured role
//! 6. Read console commands until `q`, EOF, shutdown signal or session expiry

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use classroom_signaling::actors::{
    AdmissionAction, HostActor, HostActorHandle, ParticipantActor, ParticipantActorHandle,
    ParticipantDeps,
};
use classroom_signaling::admission::FnResponder;
use classroom_signaling::config::Config;
use classroom_signaling::console::{ConsoleCommand, ConsoleMeeting, ConsoleMic};
use classroom_signaling::control::MeetingSession;
use classroom_signaling::dispatcher::ControlDispatcher;
use classroom_signaling::errors::SignalingError;
use classroom_signaling::observability::{health_router, init_metrics_recorder, HealthState};
use classroom_signaling::pubsub::{LocalPubSub, PubSub};
use classroom_signaling::roster::{Participant, Roster};
use classroom_signaling::session::SessionFlags;
use common::config::{ObservabilityConfig, DEFAULT_LOG_FILTER};
use common::types::Role;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    init_tracing(&ObservabilityConfig::from_vars(&vars).unwrap_or_default());

    info!("Starting classroom signaling console");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        participant_id = %config.participant_id,
        role = %config.role,
        roster_size = config.roster.len(),
        health_bind_address = %config.health_bind_address,
        rejoin_suppression_seconds = config.rejoin_suppression.as_secs(),
        channel_capacity = config.channel_capacity,
        "Configuration loaded successfully"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    start_health_server(
        &config.health_bind_address,
        Arc::clone(&health_state),
        prometheus_handle,
        shutdown_token.child_token(),
    )
    .await?;

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, initiating graceful shutdown...");
        signal_token.cancel();
    });

    let bus: Arc<dyn PubSub> = Arc::new(LocalPubSub::new(config.channel_capacity));
    let session = Arc::new(SessionFlags::new());
    let console = Console {
        lines: BufReader::new(tokio::io::stdin()).lines(),
        role: config.role,
        shutdown: shutdown_token.clone(),
        expires_at: config.session_ttl.map(|ttl| Instant::now() + ttl),
        session: Arc::clone(&session),
    };

    if config.role.is_host() {
        run_host(&config, bus, &health_state, console, &shutdown_token).await;
    } else {
        run_student(&config, bus, &health_state, session, console, &shutdown_token).await;
    }

    health_state.set_not_ready();
    shutdown_token.cancel();
    info!("Classroom signaling console shutdown complete");

    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // stdout belongs to the console prompt
    let (json, plain) = if config.json_logs {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .init();
}

async fn start_health_server(
    bind_address: &str,
    health_state: Arc<HealthState>,
    prometheus_handle: PrometheusHandle,
    shutdown_token: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let health_addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let app = health_router(health_state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http());

    // Bind before spawning so a taken port fails startup
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    Ok(())
}

/// Line reader that also watches for shutdown and session expiry.
struct Console {
    lines: Lines<BufReader<Stdin>>,
    role: Role,
    shutdown: CancellationToken,
    expires_at: Option<Instant>,
    session: Arc<SessionFlags>,
}

impl Console {
    /// Next command, or `None` when the console should exit.
    async fn next_command(&mut self) -> Option<ConsoleCommand> {
        loop {
            let line = tokio::select! {
                () = self.shutdown.cancelled() => return None,

                () = wait_until(self.expires_at) => {
                    if self.session.mark_token_expired_notice() {
                        warn!(target: "classroom.session", "Session expired, sign in again to continue");
                    }
                    return None;
                }

                line = self.lines.next_line() => line,
            };

            match line {
                Ok(Some(line)) => match ConsoleCommand::parse(&line, self.role) {
                    Ok(Some(ConsoleCommand::Quit)) => return None,
                    Ok(Some(command)) => return Some(command),
                    Ok(None) => {}
                    Err(e) => warn!(target: "classroom.console", error = %e, "Ignoring input"),
                },
                Ok(None) => {
                    debug!(target: "classroom.console", "Console input closed");
                    return None;
                }
                Err(e) => {
                    error!(target: "classroom.console", error = %e, "Failed to read console input");
                    return None;
                }
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_host(
    config: &Config,
    bus: Arc<dyn PubSub>,
    health_state: &HealthState,
    mut console: Console,
    shutdown_token: &CancellationToken,
) {
    let mut roster = Roster::new(Participant::new(
        config.participant_id.clone(),
        &config.display_name,
        config.role,
    ));
    for entry in &config.roster {
        roster.upsert(Participant::new(entry.id.clone(), &entry.name, entry.role));
    }

    let dispatcher =
        ControlDispatcher::new(config.role).with_random_attempts(config.random_pick_attempts);
    let (host, task) = HostActor::spawn(roster, dispatcher, bus, shutdown_token.child_token());
    health_state.set_ready();

    while let Some(command) = console.next_command().await {
        if let Err(e) = host_command(&host, command).await {
            warn!(target: "classroom.console", error = %e, "Command failed");
        }
    }

    host.cancel();
    if let Err(e) = task.await {
        error!(error = %e, "HostActor task failed");
    }
}

async fn host_command(host: &HostActorHandle, command: ConsoleCommand) -> Result<(), SignalingError> {
    match command {
        ConsoleCommand::Key(key) => {
            let published = host.key_pressed(key).await?;
            info!(target: "classroom.console", ?key, published = published.len(), "Hotkey applied");
        }
        ConsoleCommand::Join(entry) => {
            host.participant_joined(Participant::new(entry.id, entry.name, entry.role))
                .await?;
        }
        ConsoleCommand::Leave(id) => host.participant_left(id).await?,
        ConsoleCommand::EntryRequest { id, name } => {
            let admitted = host.clone();
            let joined = Participant::new(id.clone(), name.clone(), Role::Student);
            let denied_id = id.clone();
            let responder = FnResponder::new(
                move || {
                    tokio::spawn(async move {
                        if let Err(e) = admitted.participant_joined(joined).await {
                            warn!(target: "classroom.console", error = %e, "Failed to add admitted participant");
                        }
                    });
                },
                move || {
                    info!(target: "classroom.console", participant_id = %denied_id, "Entry denied");
                },
            );
            host.entry_requested(id, name, Box::new(responder)).await?;
        }
        ConsoleCommand::Allow(id) => {
            let action = id.map_or(AdmissionAction::AllowAll, AdmissionAction::Allow);
            let resolved = host.admission(action).await?;
            info!(target: "classroom.console", resolved, "Admitted");
        }
        ConsoleCommand::Deny(id) => {
            let action = id.map_or(AdmissionAction::DenyAll, AdmissionAction::Deny);
            let resolved = host.admission(action).await?;
            info!(target: "classroom.console", resolved, "Denied");
        }
        ConsoleCommand::EndMeeting(target) => {
            let ended = host.end_meeting(target).await?;
            info!(target: "classroom.console", ended, "Meeting ended");
        }
        ConsoleCommand::LowerHand(id) => {
            let lowered = host.lower_hand(id).await?;
            info!(target: "classroom.console", lowered, "Hands lowered");
        }
        ConsoleCommand::Chat { to, message } => {
            host.send_chat(message, to).await?;
        }
        ConsoleCommand::State => {
            let state = host.get_state().await?;
            info!(
                target: "classroom.console",
                selected = ?state.selected,
                global_mic = ?state.global_mic,
                participants = ?state.participants,
                pending = state.pending_entries.len(),
                raised_hands = state.raised_hands.len(),
                chat = state.chat.len(),
                "Host state"
            );
        }
        other => debug!(target: "classroom.console", ?other, "Command not available"),
    }
    Ok(())
}

async fn run_student(
    config: &Config,
    bus: Arc<dyn PubSub>,
    health_state: &Arc<HealthState>,
    session: Arc<SessionFlags>,
    mut console: Console,
    shutdown_token: &CancellationToken,
) {
    let meeting = Arc::new(ConsoleMeeting::new(Arc::clone(health_state)));
    let deps = ParticipantDeps {
        mic: Arc::new(ConsoleMic::default()),
        meeting: Arc::clone(&meeting) as Arc<dyn MeetingSession>,
        session: Arc::clone(&session),
        bus,
    };
    let local = Participant::new(
        config.participant_id.clone(),
        &config.display_name,
        config.role,
    );
    let spawn = || {
        ParticipantActor::spawn(
            local.clone(),
            deps.clone(),
            config.rejoin_suppression,
            shutdown_token.child_token(),
        )
    };

    meeting.join();
    let (mut participant, mut task) = spawn();

    while let Some(command) = console.next_command().await {
        if command == ConsoleCommand::Rejoin {
            if meeting.in_meeting() {
                info!(target: "classroom.console", "Already in the meeting");
            } else if session.is_rejoin_suppressed() {
                warn!(target: "classroom.console", "Rejoin refused, the host just ended the meeting");
            } else {
                participant.cancel();
                if let Err(e) = task.await {
                    error!(error = %e, "ParticipantActor task failed");
                }
                meeting.join();
                (participant, task) = spawn();
            }
            continue;
        }

        if let Err(e) = student_command(&participant, command).await {
            warn!(target: "classroom.console", error = %e, "Command failed");
        }
    }

    participant.cancel();
    if let Err(e) = task.await {
        error!(error = %e, "ParticipantActor task failed");
    }
}

async fn student_command(
    participant: &ParticipantActorHandle,
    command: ConsoleCommand,
) -> Result<(), SignalingError> {
    match command {
        ConsoleCommand::RaiseHand => {
            participant.raise_hand().await?;
        }
        ConsoleCommand::Chat { to, message } => {
            participant.send_chat(message, to).await?;
        }
        ConsoleCommand::State => {
            let state = participant.get_state().await?;
            info!(
                target: "classroom.console",
                highlight = ?state.highlight,
                highlighted = state.highlighted,
                last_control = ?state.last_control,
                meeting_ended = state.meeting_ended,
                chat = state.chat.len(),
                "Participant state"
            );
        }
        other => debug!(target: "classroom.console", ?other, "Command not available"),
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
