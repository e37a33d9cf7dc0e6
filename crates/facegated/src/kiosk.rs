//! Kiosk controller: boot sequence, live match loop, session confirmation
//! and navigation.

use crate::assets::{AssetError, Assets};
use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};
use crate::gallery::build_gallery;
use crate::schedule::ScheduledTask;
use crate::status::{self, OverlayFace, Phase, Snapshot};
use crate::store::{SessionStore, StoreError};
use crate::updater::Updater;
use chrono::Utc;
use facegate_core::guard::PUBLIC_ROOT;
use facegate_core::{
    Account, CountdownCommand, FaceMatcher, LoginTracker, Registry, RouteGuard, Session, SessionConfirmer, Tick,
};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootError {
    #[error("asset error: {0}")]
    Assets(#[from] AssetError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("no profile picture produced a face descriptor")]
    NoDescriptors,
}

#[derive(Error, Debug)]
pub enum KioskError {
    #[error("cannot scan while {0:?}")]
    NotReady(Phase),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

struct State {
    phase: Phase,
    /// Bumped on reload so a superseded boot does not apply its result.
    generation: u64,
    matcher: Option<Arc<FaceMatcher>>,
    tracker: LoginTracker,
    confirmer: SessionConfirmer,
    camera_active: bool,
    overlay: Vec<OverlayFace>,
    route: String,
    match_task: Option<ScheduledTask>,
    countdown_task: Option<ScheduledTask>,
    /// Write-through copy of the persisted marker.
    session: Session,
    /// Set between a confirmed countdown and the marker being persisted.
    login_pending: bool,
}

impl State {
    /// Forget everything about the current scan session.
    fn reset_scan(&mut self) {
        self.match_task = None;
        self.countdown_task = None;
        self.tracker = LoginTracker::new();
        self.confirmer.reset();
        self.camera_active = false;
        self.overlay.clear();
        self.login_pending = false;
    }

    /// Keep `Ready` and `Authenticated` in line with the session validity.
    fn settle(&mut self, authenticated: bool) {
        match self.phase {
            Phase::Authenticated if !authenticated && !self.login_pending => {
                tracing::info!("session no longer valid; kiosk ready");
                self.reset_scan();
                self.phase = Phase::Ready;
            }
            Phase::Ready if authenticated => self.phase = Phase::Authenticated,
            _ => {}
        }
    }
}

struct Inner {
    registry: Arc<Registry>,
    engine: EngineHandle,
    assets: Assets,
    sessions: SessionStore,
    updater: Updater,
    guard: RouteGuard,
    threshold: f32,
    scan_interval: Duration,
    countdown_tick: Duration,
    session_ttl: Option<chrono::Duration>,
    display: (u32, u32),
    state: Mutex<State>,
}

/// Clone-safe handle to the kiosk controller.
#[derive(Clone)]
pub struct Kiosk {
    inner: Arc<Inner>,
}

impl Kiosk {
    pub fn new(
        config: &Config,
        registry: Arc<Registry>,
        engine: EngineHandle,
        assets: Assets,
        sessions: SessionStore,
        updater: Updater,
    ) -> Self {
        let guard = RouteGuard::new(config.protected_paths.clone());
        let kiosk = Self {
            inner: Arc::new(Inner {
                registry,
                engine,
                assets,
                sessions,
                updater,
                guard,
                threshold: config.match_threshold,
                scan_interval: config.scan_interval,
                countdown_tick: config.countdown_tick,
                session_ttl: config.session_ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()),
                display: (config.display_width, config.display_height),
                state: Mutex::new(State {
                    phase: Phase::LoadingModels,
                    generation: 0,
                    matcher: None,
                    tracker: LoginTracker::new(),
                    confirmer: SessionConfirmer::new(config.countdown_from),
                    camera_active: false,
                    overlay: Vec::new(),
                    route: PUBLIC_ROOT.to_string(),
                    match_task: None,
                    countdown_task: None,
                    session: Session::anonymous(),
                    login_pending: false,
                }),
            }),
        };
        kiosk.navigate(PUBLIC_ROOT);
        kiosk
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn updater(&self) -> &Updater {
        &self.inner.updater
    }

    fn valid_account(&self, session: &Session) -> Option<Account> {
        if session.is_valid(&self.inner.registry, self.inner.session_ttl, Utc::now()) {
            session.account.clone()
        } else {
            None
        }
    }

    /// Lock the state after settling the phase against the session.
    fn settled(&self) -> (MutexGuard<'_, State>, Option<Account>) {
        let mut state = self.state();
        let account = self.valid_account(&state.session);
        state.settle(account.is_some());
        (state, account)
    }

    /// Account of the stored session, if it is currently valid.
    pub fn session(&self) -> Option<Account> {
        self.settled().1
    }

    /// Warm the caches, load the models and describe every account photo.
    pub async fn boot(&self) -> Result<(), BootError> {
        let session = self.inner.sessions.load().await;
        let generation = {
            let mut state = self.state();
            state.phase = Phase::LoadingModels;
            state.session = session;
            state.generation
        };
        tracing::info!(accounts = self.inner.registry.len(), "booting kiosk");

        self.inner.assets.warm(&self.inner.registry).await;
        let result = self.load_matcher().await;

        let mut state = self.state();
        if state.generation != generation {
            tracing::debug!("boot superseded by reload");
            return Ok(());
        }
        match result {
            Ok(matcher) => {
                let threshold = matcher.threshold();
                state.matcher = Some(Arc::new(matcher));
                state.phase = Phase::Ready;
                let account = self.valid_account(&state.session);
                state.settle(account.is_some());
                drop(state);
                self.inner.updater.mark_offline_ready();
                tracing::info!(threshold, session = ?account.map(|a| a.id), "kiosk ready");
                Ok(())
            }
            Err(e) => {
                state.phase = Phase::Error;
                tracing::error!(error = %e, "boot failed");
                Err(e)
            }
        }
    }

    async fn load_matcher(&self) -> Result<FaceMatcher, BootError> {
        let weights = self.inner.assets.model_weights().await?;
        self.inner.engine.load_models(weights).await?;
        let gallery = build_gallery(&self.inner.assets, &self.inner.engine, &self.inner.registry).await;
        let matcher = FaceMatcher::new(gallery, self.inner.threshold);
        if matcher.is_empty() {
            return Err(BootError::NoDescriptors);
        }
        Ok(matcher)
    }

    /// Open the camera and start the live match loop.
    pub async fn scan_face(&self) -> Result<(), KioskError> {
        {
            let (mut state, _) = self.settled();
            match state.phase {
                Phase::Scanning => return Ok(()),
                Phase::Ready => {}
                other => return Err(KioskError::NotReady(other)),
            }
            state.reset_scan();
            state.phase = Phase::Scanning;
        }

        if let Err(e) = self.inner.engine.open_camera().await {
            tracing::warn!(error = %e, "camera unavailable");
            let mut state = self.state();
            if state.phase == Phase::Scanning {
                state.phase = Phase::Ready;
            }
            return Err(e.into());
        }

        let kiosk = self.clone();
        let task = ScheduledTask::every("match-loop", self.inner.scan_interval, move || {
            let kiosk = kiosk.clone();
            async move { kiosk.match_tick().await }
        });

        let mut state = self.state();
        if state.phase == Phase::Scanning {
            state.camera_active = true;
            state.match_task = Some(task);
            tracing::info!(interval_ms = self.inner.scan_interval.as_millis() as u64, "scanning started");
        }
        Ok(())
    }

    async fn match_tick(&self) -> ControlFlow<()> {
        let matcher = {
            let state = self.state();
            if state.phase != Phase::Scanning {
                return ControlFlow::Break(());
            }
            match &state.matcher {
                Some(matcher) if !matcher.is_empty() => matcher.clone(),
                _ => return ControlFlow::Continue(()),
            }
        };

        let scan = match self.inner.engine.scan().await {
            Ok(scan) => scan,
            Err(e) => {
                tracing::warn!(error = %e, "frame skipped");
                return ControlFlow::Continue(());
            }
        };
        let best = matcher.best_of(scan.faces.iter().map(|f| &f.descriptor));
        let overlay = status::overlay(&scan, &matcher, self.inner.display);

        let mut state = self.state();
        if state.phase != Phase::Scanning {
            return ControlFlow::Break(());
        }
        state.overlay = overlay;
        let result = state.tracker.observe(best.as_ref(), &self.inner.registry);
        tracing::trace!(?result, faces = scan.faces.len(), "match tick");

        match state.confirmer.on_result(result) {
            CountdownCommand::Start => {
                let kiosk = self.clone();
                state.countdown_task = Some(ScheduledTask::every("countdown", self.inner.countdown_tick, move || {
                    let kiosk = kiosk.clone();
                    async move { kiosk.countdown_tick() }
                }));
                tracing::debug!(from = state.confirmer.counter(), "countdown started");
            }
            CountdownCommand::Stop => {
                state.countdown_task = None;
                tracing::debug!("match lost; countdown reset");
            }
            CountdownCommand::Keep => {}
        }
        ControlFlow::Continue(())
    }

    fn countdown_tick(&self) -> ControlFlow<()> {
        let mut state = self.state();
        if state.phase != Phase::Scanning {
            return ControlFlow::Break(());
        }
        match state.confirmer.tick() {
            Tick::Remaining(n) => {
                tracing::debug!(remaining = n, "countdown");
                ControlFlow::Continue(())
            }
            Tick::Idle => ControlFlow::Break(()),
            Tick::Confirmed => {
                let Some(account) = state.tracker.candidate().cloned() else {
                    state.confirmer.reset();
                    return ControlFlow::Break(());
                };
                state.phase = Phase::Authenticated;
                state.login_pending = true;
                state.match_task = None;
                drop(state);

                // The countdown task cannot cancel itself; hand off.
                let kiosk = self.clone();
                tokio::spawn(async move { kiosk.complete_login(account).await });
                ControlFlow::Break(())
            }
        }
    }

    async fn complete_login(&self, account: Account) {
        {
            let mut state = self.state();
            state.countdown_task = None;
            state.camera_active = false;
            state.overlay.clear();
        }
        if let Err(e) = self.inner.engine.close_camera().await {
            tracing::warn!(error = %e, "failed to release camera");
        }

        let session = Session::authenticated(account.clone());
        if let Err(e) = self.inner.sessions.persist(&session).await {
            tracing::error!(account = %account.id, error = %e, "failed to persist session");
            let mut state = self.state();
            if state.login_pending {
                state.reset_scan();
                state.phase = Phase::Ready;
            }
            return;
        }

        let adopted = {
            let mut state = self.state();
            let pending = std::mem::take(&mut state.login_pending);
            if pending {
                state.session = session;
                state.route = self.inner.guard.protected_root().to_string();
                tracing::info!(account = %account.id, route = %state.route, "session confirmed");
            }
            pending
        };
        // Logout or reload reset the scan while the marker was being written.
        if !adopted {
            tracing::info!(account = %account.id, "login superseded; discarding session");
            if let Err(e) = self.inner.sessions.clear().await {
                tracing::warn!(error = %e, "failed to discard session");
            }
        }
    }

    /// Resolve a navigation request through the route guard.
    pub fn navigate(&self, path: &str) -> String {
        let (mut state, account) = self.settled();
        let authenticated = account.is_some();
        let resolved = self.inner.guard.check(path, authenticated).resolve(path).to_string();
        if resolved != path {
            tracing::debug!(requested = path, resolved = %resolved, authenticated, "navigation redirected");
        }
        state.route = resolved.clone();
        resolved
    }

    /// Clear the stored session and return to the public root.
    pub async fn logout(&self) -> Result<(), KioskError> {
        let had_session = self.inner.sessions.clear().await?;
        {
            let mut state = self.state();
            state.session = Session::anonymous();
            if matches!(state.phase, Phase::Authenticated | Phase::Scanning) {
                state.reset_scan();
                state.phase = if state.matcher.is_some() { Phase::Ready } else { Phase::LoadingModels };
            }
        }
        self.inner.engine.close_camera().await?;
        self.navigate(PUBLIC_ROOT);
        tracing::info!(had_session, "logged out");
        Ok(())
    }

    /// Adopt a new deployment: purge the caches and boot again.
    pub async fn reload(&self) -> Result<(), BootError> {
        {
            let mut state = self.state();
            state.generation += 1;
            state.reset_scan();
            state.matcher = None;
            state.phase = Phase::LoadingModels;
        }
        if let Err(e) = self.inner.engine.close_camera().await {
            tracing::warn!(error = %e, "failed to release camera");
        }
        self.inner.updater.adopt();
        match self.inner.assets.purge().await {
            Ok(purged) => tracing::info!(purged, "caches purged"),
            Err(e) => tracing::warn!(error = %e, "cache purge failed"),
        }
        self.boot().await
    }

    /// Dismiss the update toast.
    pub fn dismiss(&self) {
        self.inner.updater.dismiss();
    }

    pub fn snapshot(&self) -> Snapshot {
        let (offline_ready, need_refresh) = self.inner.updater.flags();
        let (state, session) = self.settled();
        Snapshot {
            phase: state.phase,
            camera_active: state.camera_active,
            result: state.tracker.result(),
            scanned: state.tracker.scanned(),
            counter: state.confirmer.counter(),
            candidate: state.tracker.candidate().cloned(),
            session,
            route: state.route.clone(),
            overlay: state.overlay.clone(),
            offline_ready,
            need_refresh,
        }
    }

    /// Cancel every timer and release the camera.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state();
            state.generation += 1;
            state.reset_scan();
        }
        self.inner.updater.stop();
        if let Err(e) = self.inner.engine.close_camera().await {
            tracing::debug!(error = %e, "camera release on shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MODEL_FILES;
    use crate::engine::spawn_engine;
    use crate::engine::testing::{png, Scene, ScriptedBackend};
    use crate::fetch::testing::{FixedConnectivity, MemoryFetcher};
    use crate::store::{Store, MODELS_CACHE};
    use facegate_core::LoginResult;
    use std::time::Instant;

    const BASE: &str = "http://kiosk.test";
    // Camera scenes; markers below 32 read as dark frames.
    const ALICE_PHOTO: u8 = 50;
    const BOB_PHOTO: u8 = 60;
    const ALICE_LIVE: u8 = 80;
    const BOB_LIVE: u8 = 85;
    const STRANGER_LIVE: u8 = 90;
    const EMPTY_ROOM: u8 = 100;

    struct Harness {
        kiosk: Kiosk,
        scene: Scene,
        store: Store,
        fetcher: Arc<MemoryFetcher>,
    }

    fn account(id: &str, name: &str) -> Account {
        Account { id: id.into(), full_name: name.into(), picture: format!("/{id}.png") }
    }

    async fn harness(photos_have_faces: bool) -> Harness {
        harness_with(photos_have_faces, |_| {}).await
    }

    async fn harness_with(photos_have_faces: bool, tweak: impl FnOnce(&mut Config)) -> Harness {
        let scene = Scene::default();
        if photos_have_faces {
            scene.face(ALICE_PHOTO, &[0.0, 0.0]).face(BOB_PHOTO, &[1.0, 1.0]);
        }
        scene
            .face(ALICE_LIVE, &[0.3, 0.0])
            .face(BOB_LIVE, &[1.0, 0.9])
            .face(STRANGER_LIVE, &[5.0, 5.0]);

        let fetcher = Arc::new(MemoryFetcher::default());
        for path in MODEL_FILES {
            fetcher.serve(&format!("{BASE}{path}"), path.as_bytes());
        }
        fetcher.serve(&format!("{BASE}/temp-accounts/alice.png"), &png(ALICE_PHOTO));
        fetcher.serve(&format!("{BASE}/temp-accounts/bob.png"), &png(BOB_PHOTO));
        fetcher.serve(&format!("{BASE}/sw.js"), b"worker v1");

        let mut config = Config {
            asset_base_url: BASE.into(),
            scan_interval: Duration::from_millis(10),
            countdown_from: 3,
            countdown_tick: Duration::from_millis(50),
            update_period: None,
            ..Config::default()
        };
        tweak(&mut config);
        let store = Store::open_in_memory().await.unwrap();
        let registry = Arc::new(Registry::new(vec![account("alice", "Alice Liddell"), account("bob", "Bob")]));
        let engine = spawn_engine(ScriptedBackend { scene: scene.clone() }).unwrap();
        let assets = Assets::new(&config, &store, fetcher.clone());
        let updater = Updater::new(&config, fetcher.clone(), Arc::new(FixedConnectivity::new(true)));
        let kiosk = Kiosk::new(&config, registry, engine, assets, SessionStore::new(store.clone()), updater);
        Harness { kiosk, scene, store, fetcher }
    }

    async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_boot_reaches_ready() {
        let h = harness(true).await;
        assert_eq!(h.kiosk.snapshot().phase, Phase::LoadingModels);
        h.kiosk.boot().await.unwrap();

        let snap = h.kiosk.snapshot();
        assert_eq!(snap.phase, Phase::Ready);
        assert!(snap.offline_ready);
        assert_eq!(snap.route, "/");
        for path in MODEL_FILES {
            assert!(h.store.cache(MODELS_CACHE).contains(path).await.unwrap());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_descriptors_is_error_state() {
        let h = harness(false).await;
        assert!(matches!(h.kiosk.boot().await, Err(BootError::NoDescriptors)));
        let snap = h.kiosk.snapshot();
        assert_eq!(snap.phase, Phase::Error);
        assert!(snap.headline()[0].contains("no profile picture"));
        assert!(matches!(h.kiosk.scan_face().await, Err(KioskError::NotReady(Phase::Error))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_model_failure_is_error_state() {
        let h = harness(true).await;
        h.scene.fail_models.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(h.kiosk.boot().await, Err(BootError::Engine(_))));
        assert_eq!(h.kiosk.snapshot().phase, Phase::Error);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_matching_face_logs_in_after_countdown() {
        let h = harness(true).await;
        h.kiosk.boot().await.unwrap();
        h.scene.show(ALICE_LIVE);
        h.kiosk.scan_face().await.unwrap();
        assert!(h.scene.camera_is_open());

        let kiosk = h.kiosk.clone();
        wait_for("success", || kiosk.snapshot().result == LoginResult::Success).await;
        let snap = h.kiosk.snapshot();
        assert_eq!(snap.candidate.as_ref().map(|a| a.id.as_str()), Some("alice"));
        assert_eq!(snap.headline()[1], "Logging in as Alice Liddell...");
        assert_eq!(snap.overlay[0].label, "alice");

        wait_for("login", || kiosk.snapshot().route == "/protected").await;
        let snap = h.kiosk.snapshot();
        assert_eq!(snap.phase, Phase::Authenticated);
        assert!(!snap.camera_active);
        assert_eq!(snap.session.map(|a| a.id), Some("alice".to_string()));
        assert!(!h.scene.camera_is_open());

        // Protected routes are now reachable; public ones bounce back.
        assert_eq!(h.kiosk.navigate("/protected"), "/protected");
        assert_eq!(h.kiosk.navigate("/login"), "/protected");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unknown_face_never_logs_in() {
        let h = harness(true).await;
        h.kiosk.boot().await.unwrap();
        h.scene.show(STRANGER_LIVE);
        h.kiosk.scan_face().await.unwrap();

        let kiosk = h.kiosk.clone();
        wait_for("failure", || kiosk.snapshot().result == LoginResult::Failed).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let snap = h.kiosk.snapshot();
        assert_eq!(snap.phase, Phase::Scanning);
        assert_eq!(snap.result, LoginResult::Failed);
        assert_eq!(snap.counter, 3);
        assert!(snap.session.is_none());
        assert_eq!(snap.headline(), vec!["Oops! We did not recognize your face.".to_string()]);
        assert_eq!(h.kiosk.navigate("/protected"), "/");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_losing_the_match_resets_countdown() {
        let h = harness(true).await;
        h.kiosk.boot().await.unwrap();
        h.scene.show(ALICE_LIVE);
        h.kiosk.scan_face().await.unwrap();

        let kiosk = h.kiosk.clone();
        wait_for("countdown", || kiosk.snapshot().counter < 3).await;
        h.scene.show(EMPTY_ROOM);
        wait_for("reset", || kiosk.snapshot().result == LoginResult::Failed).await;
        assert_eq!(h.kiosk.snapshot().counter, 3);

        // The candidate stays fixed: another registered face is rejected.
        h.scene.show(BOB_LIVE);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snap = h.kiosk.snapshot();
        assert_eq!(snap.result, LoginResult::Failed);
        assert_eq!(snap.candidate.map(|a| a.id), Some("alice".to_string()));
        assert_eq!(snap.phase, Phase::Scanning);

        h.scene.show(ALICE_LIVE);
        wait_for("login", || kiosk.snapshot().phase == Phase::Authenticated).await;
        wait_for("route", || kiosk.snapshot().route == "/protected").await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_boot_with_session_then_logout() {
        let h = harness(true).await;
        SessionStore::new(h.store.clone())
            .persist(&Session::authenticated(account("bob", "Bob")))
            .await
            .unwrap();
        h.kiosk.boot().await.unwrap();
        assert_eq!(h.kiosk.snapshot().phase, Phase::Authenticated);
        assert_eq!(h.kiosk.navigate("/"), "/protected");
        assert!(matches!(h.kiosk.scan_face().await, Err(KioskError::NotReady(Phase::Authenticated))));

        h.kiosk.logout().await.unwrap();
        let snap = h.kiosk.snapshot();
        assert!(snap.session.is_none());
        assert_eq!(snap.phase, Phase::Ready);
        assert_eq!(snap.route, "/");
        assert_eq!(h.kiosk.navigate("/protected/settings"), "/");
        assert!(SessionStore::new(h.store.clone()).load().await.account.is_none());

        h.kiosk.scan_face().await.unwrap();
        assert_eq!(h.kiosk.snapshot().phase, Phase::Scanning);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_for_unregistered_account_is_ignored() {
        let h = harness(true).await;
        SessionStore::new(h.store.clone())
            .persist(&Session::authenticated(account("mallory", "Mallory")))
            .await
            .unwrap();
        h.kiosk.boot().await.unwrap();
        assert!(h.kiosk.session().is_none());
        assert_eq!(h.kiosk.snapshot().phase, Phase::Ready);
        assert_eq!(h.kiosk.navigate("/protected"), "/");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stored_session_expires_while_running() {
        let h = harness_with(true, |c| c.session_ttl = Some(Duration::from_millis(500))).await;
        SessionStore::new(h.store.clone())
            .persist(&Session::authenticated(account("alice", "Alice Liddell")))
            .await
            .unwrap();
        h.kiosk.boot().await.unwrap();
        assert_eq!(h.kiosk.snapshot().phase, Phase::Authenticated);
        assert_eq!(h.kiosk.navigate("/"), "/protected");

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(h.kiosk.navigate("/protected"), "/");
        let snap = h.kiosk.snapshot();
        assert_eq!(snap.phase, Phase::Ready);
        assert!(snap.session.is_none());

        h.scene.show(EMPTY_ROOM);
        h.kiosk.scan_face().await.unwrap();
        assert_eq!(h.kiosk.snapshot().phase, Phase::Scanning);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_confirmed_session_expires_while_running() {
        let h = harness_with(true, |c| c.session_ttl = Some(Duration::from_millis(400))).await;
        h.kiosk.boot().await.unwrap();
        h.scene.show(ALICE_LIVE);
        h.kiosk.scan_face().await.unwrap();

        let kiosk = h.kiosk.clone();
        wait_for("login", || kiosk.snapshot().route == "/protected").await;
        assert_eq!(h.kiosk.snapshot().phase, Phase::Authenticated);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.kiosk.snapshot().phase, Phase::Ready);
        assert_eq!(h.kiosk.navigate("/protected"), "/");
        h.kiosk.scan_face().await.unwrap();
        assert_eq!(h.kiosk.snapshot().phase, Phase::Scanning);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reload_purges_and_reboots() {
        let h = harness(true).await;
        h.kiosk.updater().activate().await;
        h.kiosk.boot().await.unwrap();
        let model_url = format!("{BASE}{}", MODEL_FILES[0]);
        assert_eq!(h.fetcher.count(&model_url), 1);

        h.fetcher.serve(&format!("{BASE}/sw.js"), b"worker v2");
        assert!(h.kiosk.updater().check().await);
        assert!(h.kiosk.snapshot().need_refresh);

        h.kiosk.reload().await.unwrap();
        let snap = h.kiosk.snapshot();
        assert_eq!(snap.phase, Phase::Ready);
        assert!(!snap.need_refresh);
        assert_eq!(h.fetcher.count(&model_url), 2);
        assert!(!h.kiosk.updater().check().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dismiss_clears_toast() {
        let h = harness(true).await;
        h.kiosk.boot().await.unwrap();
        assert_eq!(h.kiosk.snapshot().toast(), Some("App ready to work offline"));
        h.kiosk.dismiss();
        assert_eq!(h.kiosk.snapshot().toast(), None);
    }
}
