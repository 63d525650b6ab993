//! Lobes daemon: hosts the brain-region mini-games for thin clients.
//!
//! Clients speak newline-delimited JSON over TCP. Each line is a [`Request`];
//! each reply is one [`Response`] line.

mod api;
mod camera;
mod channel;
mod config;
mod daemon;
mod error;
mod game;
mod paths;
mod session;

use crate::api::{Collaborators, Registration};
use crate::camera::{DirectoryCamera, FrameSource};
use crate::config::Config;
use crate::daemon::{CameraOpener, DaemonState, SharedState};
use crate::game::{GameAction, GameView};
use crate::paths::AppPaths;
use crate::session::SessionContext;
use lobe_games::Region;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    /// Home screen: sign-in state, streak and per-region completion.
    Home,

    // Account
    Login {
        email: String,
        password: String,
    },
    Register {
        email: String,
        password: String,
        birthdate: String,
        name: String,
    },
    Verify {
        email: String,
        code: String,
    },
    Logout,

    // Navigation
    Mount {
        region: String,
    },
    Unmount,
    View,

    // Prefrontal
    Submit {
        answer: String,
    },

    // Temporal
    RecallStart,
    RecallClick {
        index: usize,
    },

    // Occipital
    Flip {
        index: usize,
    },
    MatchingRestart,

    // Cerebellum
    TargetStart,
    TargetClick,
}

impl Request {
    fn into_action(self) -> Option<GameAction> {
        Some(match self {
            Request::Submit { answer } => GameAction::Submit(answer),
            Request::RecallStart => GameAction::RecallStart,
            Request::RecallClick { index } => GameAction::RecallClick(index),
            Request::Flip { index } => GameAction::Flip(index),
            Request::MatchingRestart => GameAction::MatchingRestart,
            Request::TargetStart => GameAction::TargetStart,
            Request::TargetClick => GameAction::TargetClick,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegionStatus {
    region: Region,
    title: String,
    completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum Response {
    Home {
        signed_in: bool,
        /// `None` when stats could not be fetched.
        streak: Option<u32>,
        email: Option<String>,
        completed: usize,
        regions: Vec<RegionStatus>,
    },
    View {
        view: Option<GameView>,
    },
    Success {
        message: String,
    },
    Error {
        message: String,
    },
}

fn success(message: impl Into<String>) -> Response {
    Response::Success {
        message: message.into(),
    }
}

fn failure(message: impl std::fmt::Display) -> Response {
    Response::Error {
        message: message.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Request Handling
// ═══════════════════════════════════════════════════════════════════════════

async fn home(state: &SharedState) -> Response {
    let stats = daemon::fetch_stats(state).await;
    let s = state.read().await;

    let done = stats
        .as_ref()
        .map(|st| st.completed_regions())
        .unwrap_or_default();
    let regions: Vec<RegionStatus> = Region::ALL
        .iter()
        .map(|&region| RegionStatus {
            region,
            title: region.title().to_string(),
            completed: done.contains(&region),
        })
        .collect();

    Response::Home {
        signed_in: s.session.is_signed_in(),
        streak: stats.as_ref().map(|st| st.streak),
        email: stats
            .and_then(|st| st.email)
            .or_else(|| s.session.email.clone()),
        completed: regions.iter().filter(|r| r.completed).count(),
        regions,
    }
}

async fn login(state: &SharedState, email: String, password: String) -> Response {
    let auth = Arc::clone(&state.read().await.collaborators().auth);
    match auth.login(&email, &password).await {
        Ok(grant) => {
            let mut s = state.write().await;
            s.session.sign_in(grant.user_id, grant.access_token, email);
            if let Err(e) = s.save_session() {
                warn!("Could not persist session: {}", e);
            }
            info!("Signed in");
            success("Signed in")
        }
        Err(e) => {
            warn!("Login failed: {}", e);
            failure(e)
        }
    }
}

async fn handle_request(state: &SharedState, request: Request) -> Response {
    match request {
        Request::Home => home(state).await,
        Request::Login { email, password } => login(state, email, password).await,
        Request::Register {
            email,
            password,
            birthdate,
            name,
        } => {
            let auth = Arc::clone(&state.read().await.collaborators().auth);
            let registration = Registration {
                email,
                password,
                birthdate,
                name,
            };
            match auth.register(&registration).await {
                Ok(()) => success("Registered. Check your email for a verification code."),
                Err(e) => failure(e),
            }
        }
        Request::Verify { email, code } => {
            let auth = Arc::clone(&state.read().await.collaborators().auth);
            match auth.verify(&email, &code).await {
                Ok(()) => success("Email verified"),
                Err(e) => failure(e),
            }
        }
        Request::Logout => {
            let mut s = state.write().await;
            s.teardown();
            s.session.clear();
            if let Err(e) = s.save_session() {
                warn!("Could not persist session: {}", e);
            }
            info!("Signed out");
            success("Signed out")
        }
        Request::Mount { region } => match Region::from_name(&region) {
            Some(region) => Response::View {
                view: daemon::mount(state, region).await,
            },
            None => failure(format!("Unknown region: {}", region)),
        },
        Request::Unmount => {
            state.write().await.teardown();
            success("Unmounted")
        }
        Request::View => Response::View {
            view: state.read().await.view(),
        },
        other => match other.into_action() {
            Some(action) => {
                let mut s = state.write().await;
                match s.play(state, action) {
                    Ok(view) => Response::View { view: Some(view) },
                    Err(e) => failure(e),
                }
            }
            None => failure("Unsupported request"),
        },
    }
}

async fn handle_client(
    stream: TcpStream,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(&state, request).await,
            Err(e) => failure(format!("Invalid request: {}", e)),
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

fn camera_opener(frames_dir: std::path::PathBuf) -> CameraOpener {
    Box::new(move || {
        DirectoryCamera::open(&frames_dir).map(|cam| Box::new(cam) as Box<dyn FrameSource>)
    })
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Setup application paths and configuration
    let paths = AppPaths::new()?;
    let config = Config::load(&paths)?;
    info!("Data directory: {}", paths.data_dir().display());

    let session = match SessionContext::load(&paths.session_file()) {
        Ok(session) => session,
        Err(e) => {
            warn!("Could not load session: {}", e);
            SessionContext::default()
        }
    };
    if session.is_signed_in() {
        info!("Restored signed-in session");
    }

    let collaborators = Collaborators::http(&config)?;
    let open_camera = camera_opener(config.frames_dir(&paths));
    let listen_addr = config.listen_addr.clone();

    let state: SharedState = Arc::new(RwLock::new(DaemonState::new(
        paths,
        config,
        session,
        collaborators,
        open_camera,
        clock_seed(),
    )));

    // Save on Ctrl-C and release the camera.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let mut s = state.write().await;
                s.teardown();
                if let Err(e) = s.save_session() {
                    error!("Ctrl-C save failed: {}", e);
                } else {
                    info!("Ctrl-C: session saved");
                }
                std::process::exit(0);
            }
        });
    }

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Lobes daemon listening on {}", listen_addr);

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
            info!("Client disconnected: {}", addr);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CameraError;

    fn offline_state(dir: &std::path::Path) -> SharedState {
        let config = Config::default();
        let collaborators = Collaborators::http(&config).unwrap();
        let open_camera: CameraOpener =
            Box::new(|| Err(CameraError::AccessDenied("no camera in tests".into())));
        Arc::new(RwLock::new(DaemonState::new(
            AppPaths::at(dir).unwrap(),
            config,
            SessionContext::default(),
            collaborators,
            open_camera,
            5,
        )))
    }

    async fn roundtrip(lines: &[&str]) -> Vec<serde_json::Value> {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_client(stream, state).await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (r, mut w) = stream.into_split();
        let mut replies = BufReader::new(r).lines();
        let mut out = Vec::new();
        for line in lines {
            w.write_all(line.as_bytes()).await.unwrap();
            w.write_all(b"\n").await.unwrap();
            let reply = replies.next_line().await.unwrap().unwrap();
            out.push(serde_json::from_str(&reply).unwrap());
        }
        drop(w);
        server.await.unwrap();
        out
    }

    #[tokio::test]
    async fn invalid_json_does_not_close_the_connection() {
        let replies = roundtrip(&["{nope", r#"{"type":"View"}"#]).await;
        assert_eq!(replies[0]["type"], "Error");
        assert!(replies[0]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request:"));
        assert_eq!(replies[1]["type"], "View");
        assert!(replies[1]["view"].is_null());
    }

    #[tokio::test]
    async fn mount_then_play_the_mounted_game_only() {
        let replies = roundtrip(&[
            r#"{"type":"Mount","region":"Occipital"}"#,
            r#"{"type":"Flip","index":0}"#,
            r#"{"type":"Submit","answer":"3"}"#,
            r#"{"type":"Mount","region":"brainstem"}"#,
        ])
        .await;

        assert_eq!(replies[0]["view"]["region"], "occipital");
        assert_eq!(replies[0]["view"]["tiles"].as_array().unwrap().len(), 8);
        assert_eq!(replies[1]["view"]["tiles"][0]["face_up"], true);
        assert_eq!(replies[2]["type"], "Error");
        assert_eq!(replies[3]["type"], "Error");
    }

    #[tokio::test]
    async fn home_when_signed_out_skips_stats() {
        let replies = roundtrip(&[r#"{"type":"Home"}"#]).await;
        let home = &replies[0];
        assert_eq!(home["type"], "Home");
        assert_eq!(home["signed_in"], false);
        assert!(home["streak"].is_null());
        assert_eq!(home["completed"], 0);
        assert_eq!(home["regions"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn gameplay_requests_map_to_actions() {
        let req: Request = serde_json::from_str(r#"{"type":"RecallClick","index":4}"#).unwrap();
        assert_eq!(req.into_action(), Some(GameAction::RecallClick(4)));
        assert_eq!(Request::Logout.into_action(), None);
    }
}
