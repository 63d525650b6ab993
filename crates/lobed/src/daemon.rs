//! Daemon state: the mounted game, its pending tasks, and the camera/channel
//! owned by a tracing session.
//!
//! All game transitions happen under the state write lock. Effects that need
//! to wait (timers, report requests, recognition events) run in spawned tasks
//! which re-take the lock and check the mount id before touching the game, so
//! results for a view that was torn down are discarded.

use crate::api::{Collaborators, UserStats};
use crate::camera::FrameSource;
use crate::channel::{ClientEvent, FrameGate, RecognitionLink, ServerEvent};
use crate::config::Config;
use crate::error::CameraError;
use crate::game::{ActiveGame, GameAction, GameView};
use crate::paths::AppPaths;
use crate::session::SessionContext;
use lobe_games::prng::Prng;
use lobe_games::tracing_session::FRAME_INTERVAL;
use lobe_games::{Effect, Region, Timer};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type SharedState = Arc<RwLock<DaemonState>>;

pub type CameraOpener =
    Box<dyn Fn() -> Result<Box<dyn FrameSource>, CameraError> + Send + Sync>;

/// Camera and recognition channel held by a mounted tracing session.
struct Capture {
    camera: Box<dyn FrameSource>,
    link: RecognitionLink,
    gate: FrameGate,
    tasks: Vec<JoinHandle<()>>,
}

impl Capture {
    fn release(mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.camera.release();
        info!("Camera released");
    }
}

struct Mounted {
    id: u64,
    game: ActiveGame,
    tasks: Vec<JoinHandle<()>>,
    capture: Option<Capture>,
}

pub struct DaemonState {
    pub paths: AppPaths,
    pub config: Config,
    pub session: SessionContext,
    collaborators: Collaborators,
    open_camera: CameraOpener,
    mounted: Option<Mounted>,
    next_mount_id: u64,
    rng: Prng,
}

impl DaemonState {
    pub fn new(
        paths: AppPaths,
        config: Config,
        session: SessionContext,
        collaborators: Collaborators,
        open_camera: CameraOpener,
        seed: u64,
    ) -> Self {
        Self {
            paths,
            config,
            session,
            collaborators,
            open_camera,
            mounted: None,
            next_mount_id: 1,
            rng: Prng::new(seed),
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn view(&self) -> Option<GameView> {
        self.mounted.as_ref().map(|m| m.game.view())
    }

    fn is_current(&self, mount_id: u64) -> bool {
        self.mounted.as_ref().is_some_and(|m| m.id == mount_id)
    }

    /// Replace whatever is mounted with a fresh game for `region`.
    fn begin_mount(&mut self, region: Region) -> u64 {
        self.teardown();
        let id = self.next_mount_id;
        self.next_mount_id += 1;
        let seed = self.rng.next_u64();
        self.mounted = Some(Mounted {
            id,
            game: ActiveGame::new(region, seed),
            tasks: Vec::new(),
            capture: None,
        });
        info!("Mounted {} (mount {})", region, id);
        id
    }

    /// Unmount the current game: abort its timers and pending requests and
    /// release the camera.
    pub fn teardown(&mut self) {
        let Some(m) = self.mounted.take() else {
            return;
        };
        for task in &m.tasks {
            task.abort();
        }
        if let Some(capture) = m.capture {
            capture.release();
        }
        info!(
            "Unmounted {} (mount {}, complete: {})",
            m.game.region(),
            m.id,
            m.game.is_complete()
        );
    }

    fn track(&mut self, mount_id: u64, task: JoinHandle<()>) {
        match self.mounted.as_mut() {
            Some(m) if m.id == mount_id => {
                m.tasks.retain(|t| !t.is_finished());
                m.tasks.push(task);
            }
            _ => task.abort(),
        }
    }

    /// Apply a player action to the mounted game.
    pub fn play(&mut self, shared: &SharedState, action: GameAction) -> Result<GameView, String> {
        let Some(m) = self.mounted.as_mut() else {
            return Err(format!("{} is not mounted", action.region().title()));
        };
        let mount_id = m.id;
        let effects = m.game.apply(action)?;
        run_effects(shared, self, mount_id, effects);
        self.view().ok_or_else(|| "No game is mounted".to_string())
    }

    fn fire_timer(&mut self, shared: &SharedState, mount_id: u64, timer: Timer) {
        let effects = match self.mounted.as_mut() {
            Some(m) if m.id == mount_id => m.game.on_timer(timer),
            _ => return,
        };
        run_effects(shared, self, mount_id, effects);
    }

    fn record_completion(&self, region: Region) {
        let Some(user_id) = self.session.user_id().map(str::to_string) else {
            debug!("Not signed in; skipping completion for {}", region);
            return;
        };
        let completion = Arc::clone(&self.collaborators.completion);
        // Not tied to the mount: the streak update should land even if the
        // player navigates away.
        tokio::spawn(async move {
            match completion.record_completion(&user_id, region).await {
                Ok(()) => info!("Recorded completion of {}", region),
                Err(e) => warn!("Failed to record completion of {}: {}", region, e),
            }
        });
    }

    fn send_reset(&self) {
        let Some(capture) = self.mounted.as_ref().and_then(|m| m.capture.as_ref()) else {
            return;
        };
        let event = ClientEvent::ResetGame {
            user_id: self.session.recognition_user().to_string(),
        };
        if let Err(e) = capture.link.send(event) {
            warn!("Could not request a new shape: {}", e);
        }
    }

    fn stop_capture(&mut self) {
        if let Some(capture) = self.mounted.as_mut().and_then(|m| m.capture.take()) {
            capture.release();
        }
    }

    /// Surface a dead recognition channel and give the camera back.
    fn recognizer_lost(&mut self) {
        if let Some(ActiveGame::Tracing(session)) = self.mounted.as_mut().map(|m| &mut m.game) {
            session.on_disconnected();
        }
        self.stop_capture();
    }

    /// Offer one camera frame to the recognizer if the gate allows it.
    fn emit_frame(&mut self) {
        let user_id = self.session.recognition_user().to_string();
        let Some(m) = self.mounted.as_mut() else {
            return;
        };
        let ActiveGame::Tracing(session) = &m.game else {
            return;
        };
        if !session.wants_frame() {
            return;
        }
        let Some(capture) = m.capture.as_mut() else {
            return;
        };
        let Some(id) = capture.gate.try_begin() else {
            return;
        };

        let image = match capture.camera.capture() {
            Ok(image) => image,
            Err(e) => {
                capture.gate.abandon();
                warn!("Frame capture failed: {}", e);
                return;
            }
        };
        if let Err(e) = capture.link.send(ClientEvent::ProcessFrame { id, image, user_id }) {
            capture.gate.abandon();
            warn!("Frame not sent: {}", e);
        }
    }

    fn on_server_event(&mut self, shared: &SharedState, mount_id: u64, event: ServerEvent) {
        match event {
            ServerEvent::Ack { id } => {
                if let Some(capture) = self.mounted.as_mut().and_then(|m| m.capture.as_mut()) {
                    if !capture.gate.acknowledge(id) {
                        debug!("Ignoring ack for frame {} ({} in flight)", id, capture.gate.in_flight());
                    }
                }
            }
            ServerEvent::FrameResult {
                image,
                shape_name,
                status,
            } => {
                let effects = match self.mounted.as_mut().map(|m| &mut m.game) {
                    Some(ActiveGame::Tracing(session)) => {
                        session.on_frame_result(image, &shape_name, status)
                    }
                    _ => return,
                };
                run_effects(shared, self, mount_id, effects);
            }
            ServerEvent::StatusUpdate { message } => info!("Recognizer status: {}", message),
        }
    }

    pub fn save_session(&self) -> Result<(), String> {
        self.session.save(&self.paths.session_file())
    }
}

/// Execute the effects returned by a game transition on mount `mount_id`.
pub fn run_effects(
    shared: &SharedState,
    state: &mut DaemonState,
    mount_id: u64,
    effects: Vec<Effect>,
) {
    for effect in effects {
        match effect {
            Effect::Schedule { after, timer } => {
                let shared_clone = Arc::clone(shared);
                let task = tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let mut s = shared_clone.write().await;
                    s.fire_timer(&shared_clone, mount_id, timer);
                });
                state.track(mount_id, task);
            }
            Effect::RecordCompletion(region) => state.record_completion(region),
            Effect::RequestReport { accuracy, epoch } => {
                let report = Arc::clone(&state.collaborators.report);
                let shared_clone = Arc::clone(shared);
                let task = tokio::spawn(async move {
                    let result = report.generate_report(accuracy).await;
                    if let Err(e) = &result {
                        warn!("Report generation failed, using fallback: {}", e);
                    }
                    let mut s = shared_clone.write().await;
                    if !s.is_current(mount_id) {
                        return;
                    }
                    if let Some(ActiveGame::Target(g)) = s.mounted.as_mut().map(|m| &mut m.game) {
                        g.on_report(epoch, result);
                    }
                });
                state.track(mount_id, task);
            }
            Effect::ResetShape => state.send_reset(),
            Effect::StopCapture => state.stop_capture(),
        }
    }
}

/// Mount the game for `region`, tearing down the previous one. A tracing
/// session also opens the camera and connects to the recognizer.
pub async fn mount(shared: &SharedState, region: Region) -> Option<GameView> {
    let mount_id = shared.write().await.begin_mount(region);
    if region == Region::Parietal {
        start_capture(shared, mount_id).await;
    }
    shared.read().await.view()
}

async fn start_capture(shared: &SharedState, mount_id: u64) {
    let (camera, addr, within) = {
        let mut s = shared.write().await;
        match (s.open_camera)() {
            Ok(camera) => (
                camera,
                s.config.recognition_addr.clone(),
                s.config.request_timeout(),
            ),
            Err(e) => {
                warn!("Camera unavailable: {}", e);
                if let Some(ActiveGame::Tracing(session)) = s.mounted.as_mut().map(|m| &mut m.game)
                {
                    session.on_camera_denied();
                }
                return;
            }
        }
    };

    let (link, inbound) = match RecognitionLink::connect(&addr, within).await {
        Ok(pair) => pair,
        Err(e) => {
            let mut camera = camera;
            camera.release();
            warn!("Recognizer unavailable: {}", e);
            let mut s = shared.write().await;
            if s.is_current(mount_id) {
                s.recognizer_lost();
            }
            return;
        }
    };

    let mut s = shared.write().await;
    if !s.is_current(mount_id) {
        // Navigated away while connecting.
        let mut camera = camera;
        camera.release();
        return;
    }

    let tasks = vec![
        tokio::spawn(pump_events(Arc::clone(shared), mount_id, inbound)),
        tokio::spawn(frame_loop(Arc::clone(shared), mount_id)),
    ];
    if let Some(m) = s.mounted.as_mut() {
        if let ActiveGame::Tracing(session) = &mut m.game {
            session.on_connected();
        }
        m.capture = Some(Capture {
            camera,
            link,
            gate: FrameGate::new(),
            tasks,
        });
    }
    info!("Connected to recognizer at {}", addr);
}

async fn pump_events(shared: SharedState, mount_id: u64, mut inbound: mpsc::Receiver<ServerEvent>) {
    while let Some(event) = inbound.recv().await {
        let mut s = shared.write().await;
        if !s.is_current(mount_id) {
            return;
        }
        s.on_server_event(&shared, mount_id, event);
    }
    warn!("Recognition channel closed");
    let mut s = shared.write().await;
    if s.is_current(mount_id) {
        s.recognizer_lost();
    }
}

async fn frame_loop(shared: SharedState, mount_id: u64) {
    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let mut s = shared.write().await;
        if !s.is_current(mount_id) {
            return;
        }
        s.emit_frame();
    }
}

/// Home screen data: fetched once per home view.
pub async fn fetch_stats(shared: &SharedState) -> Option<UserStats> {
    let (user_id, stats) = {
        let s = shared.read().await;
        let user_id = s.session.user_id()?.to_string();
        (user_id, Arc::clone(&s.collaborators.stats))
    };
    match stats.user_stats(&user_id).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!("Could not fetch stats: {}", e);
            None
        }
    }
}
