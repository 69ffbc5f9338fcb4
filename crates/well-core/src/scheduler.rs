//! Adaptive capture scheduler.
//!
//! Each cycle picks a mode in strict priority order (CPU throttle,
//! cooldown, bad-streak backoff, active) and only the active mode pays
//! for a capture and inference. The outcome then updates
//! [`SchedulerState`] exactly once, after the cycle is done.

use crate::collab::*;
use crate::identity::{IdentityResolver, DEFAULT_SIMILARITY_THRESHOLD};
use crate::quality::QualityGate;
use crate::types::{CycleOutcome, Embedding, Frame, Origin, PersonId};
use std::fmt;
use std::time::{Duration, Instant};

/// Tuning knobs for the control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: u32,
    pub cooldown: Duration,
    pub bad_streak_limit: u32,
    /// How long a full bad streak blocks capture after its last bad cycle.
    pub streak_hold: Duration,
    /// CPU percentage at or above which capture is skipped.
    pub cpu_high_threshold: f32,
    pub similarity_threshold: f32,
    /// When false every cycle is active; intervals still back off.
    pub economy: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            backoff_multiplier: 3,
            cooldown: Duration::from_secs(120),
            bad_streak_limit: 3,
            streak_hold: Duration::from_secs(360),
            cpu_high_threshold: 80.0,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            economy: true,
        }
    }
}

impl SchedulerConfig {
    pub fn backed_off_interval(&self) -> Duration {
        self.base_interval
            .saturating_mul(self.backoff_multiplier)
            .min(self.max_interval)
    }
}

/// Stand-in deadline when `Instant + Duration` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

fn later(at: Instant, by: Duration) -> Instant {
    at.checked_add(by)
        .or_else(|| at.checked_add(FAR_FUTURE))
        .unwrap_or(at)
}

/// Mutable loop state, threaded through every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerState {
    pub interval: Duration,
    pub bad_streak: u32,
    pub cooldown_until: Instant,
    pub last_bad_at: Option<Instant>,
}

impl SchedulerState {
    pub fn new(config: &SchedulerConfig, now: Instant) -> Self {
        Self {
            interval: config.base_interval,
            bad_streak: 0,
            cooldown_until: now,
            last_bad_at: None,
        }
    }

    /// Pick this cycle's mode. Checks run in priority order.
    pub fn mode(&self, config: &SchedulerConfig, cpu: f32, now: Instant) -> Mode {
        if !config.economy {
            return Mode::Active;
        }
        if cpu >= config.cpu_high_threshold {
            Mode::Throttled
        } else if now < self.cooldown_until {
            Mode::Cooldown
        } else if self.streak_blocks(config, now) {
            Mode::StreakBackoff
        } else {
            Mode::Active
        }
    }

    fn streak_blocks(&self, config: &SchedulerConfig, now: Instant) -> bool {
        if self.bad_streak < config.bad_streak_limit {
            return false;
        }
        match self.last_bad_at {
            Some(at) => now < later(at, config.streak_hold),
            None => true,
        }
    }

    /// Fold a finished cycle's outcome into the state.
    pub fn apply(&mut self, config: &SchedulerConfig, outcome: CycleOutcome, now: Instant) {
        if outcome == CycleOutcome::Success {
            self.bad_streak = 0;
            self.cooldown_until = now;
            self.last_bad_at = None;
            self.interval = config.base_interval;
            return;
        }
        if outcome.is_bad_signal() {
            self.bad_streak = self.bad_streak.saturating_add(1);
            self.cooldown_until = self.cooldown_until.max(later(now, config.cooldown));
            self.last_bad_at = Some(now);
        }
        self.interval = config.backed_off_interval();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Throttled,
    Cooldown,
    StreakBackoff,
    Active,
}

impl Mode {
    /// Outcome of a skipped cycle, `None` for [`Mode::Active`].
    pub fn skip_outcome(&self) -> Option<CycleOutcome> {
        match self {
            Mode::Throttled => Some(CycleOutcome::CpuThrottled),
            Mode::Cooldown => Some(CycleOutcome::Cooldown),
            Mode::StreakBackoff => Some(CycleOutcome::StreakBackoff),
            Mode::Active => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Throttled => "throttled",
            Mode::Cooldown => "cooldown",
            Mode::StreakBackoff => "streak-backoff",
            Mode::Active => "active",
        })
    }
}

/// Remaining sleep so that a slow cycle does not push the next one back.
pub fn sleep_for(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// The collaborators a scheduler drives.
pub struct Collaborators<F, A, P, S, C, R> {
    pub camera: F,
    pub analyzer: A,
    pub probe: P,
    pub store: S,
    pub cache: C,
    pub sink: R,
}

pub struct CaptureScheduler<F, A, P, S, C, R, K> {
    config: SchedulerConfig,
    gate: QualityGate,
    camera: F,
    analyzer: A,
    probe: P,
    resolver: IdentityResolver<S, C>,
    sink: R,
    clock: K,
    state: SchedulerState,
    person: Option<PersonId>,
    reference: Option<Embedding>,
}

impl<F, A, P, S, C, R, K> CaptureScheduler<F, A, P, S, C, R, K>
where
    F: FrameSource,
    A: FaceAnalyzer,
    P: LoadProbe,
    S: PersonStore,
    C: IdentityCache,
    R: ReadingSink,
    K: Clock,
{
    /// Build a scheduler, picking up the cached identity and its reference.
    pub fn new(
        config: SchedulerConfig,
        gate: QualityGate,
        collab: Collaborators<F, A, P, S, C, R>,
        clock: K,
    ) -> Self {
        let mut resolver = IdentityResolver::new(collab.store, collab.cache);
        let person = resolver.cached_id();
        let reference = match &person {
            Some(id) => load_reference_or_none(&mut resolver, id),
            None => None,
        };
        tracing::info!(
            person_id = person.as_deref().unwrap_or("-"),
            has_reference = reference.is_some(),
            "scheduler starting"
        );

        let state = SchedulerState::new(&config, clock.now());
        Self {
            config,
            gate,
            camera: collab.camera,
            analyzer: collab.analyzer,
            probe: collab.probe,
            resolver,
            sink: collab.sink,
            clock,
            state,
            person,
            reference,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn person(&self) -> Option<&str> {
        self.person.as_deref()
    }

    pub fn reference(&self) -> Option<&Embedding> {
        self.reference.as_ref()
    }

    /// Run cycles until `should_stop` returns true. Checked only between cycles.
    pub fn run(&mut self, mut should_stop: impl FnMut() -> bool) {
        while !should_stop() {
            let started = self.clock.now();
            self.run_cycle();
            let elapsed = self.clock.now().saturating_duration_since(started);
            if should_stop() {
                break;
            }
            self.clock.sleep(sleep_for(self.state.interval, elapsed));
        }
        tracing::info!("scheduler stopped");
    }

    /// One full cycle: mode selection, optional capture, persistence, state update.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let now = self.clock.now();
        let resources = self.probe.resources();
        let mode = self.state.mode(&self.config, resources.cpu, now);

        let mut reading = Reading {
            person_id: None,
            captured_at: self.clock.utc(),
            outcome: CycleOutcome::Absent,
            emotions: None,
            resources,
            quality: None,
            identity_origin: None,
            face_distance: None,
        };

        let outcome = match mode.skip_outcome() {
            Some(skipped) => skipped,
            None => self.attempt(&mut reading),
        };

        reading.outcome = outcome;
        reading.person_id = self.person.clone();
        if let Err(e) = self.sink.persist(&reading) {
            tracing::warn!(error = %e, outcome = %outcome, "failed to persist reading");
        }

        self.state.apply(&self.config, outcome, self.clock.now());
        tracing::debug!(
            mode = %mode,
            outcome = %outcome,
            cpu = resources.cpu,
            bad_streak = self.state.bad_streak,
            interval_secs = self.state.interval.as_secs_f32(),
            "cycle finished"
        );
        outcome
    }

    /// Active-mode pipeline. Every collaborator failure is mapped here.
    fn attempt(&mut self, reading: &mut Reading) -> CycleOutcome {
        if !self.probe.user_active() {
            tracing::debug!("user idle; skipping capture");
            return CycleOutcome::Absent;
        }

        let frame = match self.camera.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => return CycleOutcome::Absent,
            Err(e) => {
                tracing::warn!(error = %e, "capture failed");
                return CycleOutcome::Absent;
            }
        };
        if !frame.is_well_formed() {
            tracing::warn!(?frame, bytes = frame.data.len(), "malformed frame discarded");
            return CycleOutcome::Absent;
        }

        let report = self.gate.assess(&frame);
        reading.quality = Some(report);
        if !report.verdict.is_ok() {
            tracing::debug!(
                verdict = %report.verdict,
                brightness = report.brightness,
                sharpness = report.sharpness,
                contrast = report.contrast,
                "frame rejected"
            );
            return CycleOutcome::LowQuality;
        }

        match self.analyzer.detect_face(&frame) {
            Ok(true) => {}
            Ok(false) => return CycleOutcome::Absent,
            Err(e) => {
                tracing::warn!(error = %e, "face detection unavailable");
                return CycleOutcome::Absent;
            }
        }

        let embedding = match self.analyzer.embed(&frame) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "embedding unavailable");
                return CycleOutcome::Absent;
            }
        };

        let origin = match self.identify(&embedding) {
            Some(origin) => origin,
            None => return CycleOutcome::Error,
        };
        reading.identity_origin = Some(origin);
        reading.face_distance = self.reference.as_ref().map(|r| r.distance(&embedding));

        self.classify(&frame, reading)
    }

    /// Resolve the face, adopting a new identity if it changed.
    fn identify(&mut self, embedding: &Embedding) -> Option<Origin> {
        let resolution = match self.resolver.resolve(
            self.person.as_deref(),
            Some(embedding),
            self.config.similarity_threshold,
        ) {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(error = %e, "identity resolution failed");
                return None;
            }
        };

        if self.person.as_deref() != Some(resolution.id.as_str()) {
            tracing::info!(
                from = self.person.as_deref().unwrap_or("-"),
                to = %resolution.id,
                origin = %resolution.origin,
                distance = ?resolution.distance,
                "identity reassigned"
            );
            self.reference = load_reference_or_none(&mut self.resolver, &resolution.id);
            self.person = Some(resolution.id.clone());
        }

        if resolution.origin == Origin::LocalNoReference {
            match self.resolver.set_reference(&resolution.id, embedding) {
                Ok(()) => {
                    tracing::info!(person_id = %resolution.id, "reference embedding stored");
                    self.reference = Some(embedding.clone());
                }
                Err(e) => tracing::warn!(error = %e, "failed to store reference embedding"),
            }
        }

        Some(resolution.origin)
    }

    fn classify(&mut self, frame: &Frame, reading: &mut Reading) -> CycleOutcome {
        match self.analyzer.classify_emotion(frame) {
            Ok(emotions) => {
                reading.emotions = Some(emotions);
                CycleOutcome::Success
            }
            Err(e) => {
                tracing::warn!(error = %e, "emotion inference unavailable");
                CycleOutcome::Absent
            }
        }
    }
}

fn load_reference_or_none<S: PersonStore, C: IdentityCache>(
    resolver: &mut IdentityResolver<S, C>,
    id: &str,
) -> Option<Embedding> {
    match resolver.load_reference(id) {
        Ok(reference) => reference,
        Err(e) => {
            tracing::warn!(person_id = id, error = %e, "failed to load reference embedding");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::Emotions;
    use crate::fakes::*;
    use crate::quality::QualityVerdict;
    use std::collections::VecDeque;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn sharp_frame() -> Frame {
        let (w, h) = (32u32, 32u32);
        let data = (0..h)
            .flat_map(|y| (0..w).map(move |x| if (x + y) % 2 == 0 { 60 } else { 200 }))
            .collect();
        Frame::new(data, w, h)
    }

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    struct Rig {
        camera: FakeCamera,
        analyzer: FakeAnalyzer,
        probe: FakeProbe,
        store: MemoryStore,
        cache: MemoryCache,
        sink: VecSink,
        clock: FakeClock,
    }

    type Sched<'a> = CaptureScheduler<
        &'a mut FakeCamera,
        &'a mut FakeAnalyzer,
        &'a mut FakeProbe,
        &'a mut MemoryStore,
        &'a mut MemoryCache,
        &'a mut VecSink,
        &'a FakeClock,
    >;

    impl Rig {
        fn new() -> Self {
            Self {
                camera: FakeCamera {
                    frame: Some(sharp_frame()),
                    captures: 0,
                },
                analyzer: FakeAnalyzer {
                    face: true,
                    embeddings: VecDeque::new(),
                    emotions: Ok(Emotions::from_raw([("happy", 70.0), ("neutral", 30.0)])),
                },
                probe: FakeProbe {
                    cpu: 10.0,
                    active: true,
                },
                store: MemoryStore::default(),
                cache: MemoryCache::default(),
                sink: VecSink::default(),
                clock: FakeClock::new(),
            }
        }

        fn scheduler(&mut self, config: SchedulerConfig) -> Sched<'_> {
            CaptureScheduler::new(
                config,
                QualityGate::default(),
                Collaborators {
                    camera: &mut self.camera,
                    analyzer: &mut self.analyzer,
                    probe: &mut self.probe,
                    store: &mut self.store,
                    cache: &mut self.cache,
                    sink: &mut self.sink,
                },
                &self.clock,
            )
        }
    }

    #[test]
    fn test_backed_off_interval_is_capped() {
        let config = SchedulerConfig::default();
        assert_eq!(config.backed_off_interval(), secs(30));
        let config = SchedulerConfig {
            backoff_multiplier: 10,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.backed_off_interval(), secs(60));
    }

    #[test]
    fn test_mode_priority_order() {
        let config = SchedulerConfig::default();
        let now = Instant::now();
        let mut state = SchedulerState::new(&config, now);
        state.bad_streak = 5;
        state.last_bad_at = Some(now);
        state.cooldown_until = now + secs(60);

        assert_eq!(state.mode(&config, 95.0, now), Mode::Throttled);
        assert_eq!(state.mode(&config, 80.0, now), Mode::Throttled);
        assert_eq!(state.mode(&config, 10.0, now), Mode::Cooldown);
        assert_eq!(state.mode(&config, 10.0, now + secs(61)), Mode::StreakBackoff);
        assert_eq!(state.mode(&config, 10.0, now + secs(361)), Mode::Active);
    }

    #[test]
    fn test_economy_off_is_always_active() {
        let config = SchedulerConfig {
            economy: false,
            ..SchedulerConfig::default()
        };
        let now = Instant::now();
        let mut state = SchedulerState::new(&config, now);
        state.bad_streak = 10;
        state.cooldown_until = now + secs(100);
        assert_eq!(state.mode(&config, 99.0, now), Mode::Active);
    }

    #[test]
    fn test_sleep_for_subtracts_elapsed() {
        assert_eq!(sleep_for(secs(10), secs(3)), secs(7));
        assert_eq!(sleep_for(secs(10), secs(15)), Duration::ZERO);
    }

    #[test]
    fn test_three_absent_then_streak_backoff() {
        let mut rig = Rig::new();
        rig.analyzer.face = false;
        let mut s = rig.scheduler(SchedulerConfig::default());

        for _ in 0..3 {
            assert_eq!(s.run_cycle(), CycleOutcome::Absent);
            // Let the cooldown lapse so only the streak can block.
            s.clock.advance(secs(121));
        }
        assert_eq!(s.state().bad_streak, 3);
        assert!(s.clock.now() >= s.state().cooldown_until);

        assert_eq!(s.run_cycle(), CycleOutcome::StreakBackoff);
        drop(s);
        assert_eq!(rig.camera.captures, 3);
    }

    #[test]
    fn test_cooldown_blocks_after_absent() {
        let mut rig = Rig::new();
        rig.probe.active = false;
        let mut s = rig.scheduler(SchedulerConfig::default());

        assert_eq!(s.run_cycle(), CycleOutcome::Absent);
        assert_eq!(s.state().interval, secs(30));
        s.clock.advance(secs(30));
        assert_eq!(s.run_cycle(), CycleOutcome::Cooldown);
        assert_eq!(s.state().bad_streak, 1);
        drop(s);
        assert_eq!(rig.camera.captures, 0);
    }

    #[test]
    fn test_success_after_streak_backoff_restores_interval() {
        let mut rig = Rig::new();
        rig.analyzer.face = false;
        let mut s = rig.scheduler(SchedulerConfig::default());

        for _ in 0..3 {
            s.run_cycle();
            s.clock.advance(secs(121));
        }
        assert_eq!(s.run_cycle(), CycleOutcome::StreakBackoff);
        assert_eq!(s.state().interval, secs(30));

        // Face comes back once the streak hold has lapsed.
        s.analyzer.face = true;
        s.analyzer.embeddings.push_back(emb(&[1.0, 0.0, 0.0]));
        s.clock.advance(secs(400));

        assert_eq!(s.run_cycle(), CycleOutcome::Success);
        assert_eq!(s.state().interval, secs(10));
        assert_eq!(s.state().bad_streak, 0);
    }

    #[test]
    fn test_cpu_throttle_never_counts_as_bad() {
        let mut rig = Rig::new();
        rig.probe.cpu = 97.0;
        let mut s = rig.scheduler(SchedulerConfig::default());

        for _ in 0..10 {
            assert_eq!(s.run_cycle(), CycleOutcome::CpuThrottled);
            s.clock.advance(secs(30));
        }
        assert_eq!(s.state().bad_streak, 0);
        assert_eq!(s.state().interval, secs(30));
        drop(s);
        assert_eq!(rig.camera.captures, 0);
        assert_eq!(rig.sink.readings.len(), 10);
    }

    #[test]
    fn test_low_quality_counts_as_bad() {
        let mut rig = Rig::new();
        rig.camera.frame = Some(Frame::new(vec![8; 64], 8, 8));
        let mut s = rig.scheduler(SchedulerConfig::default());

        assert_eq!(s.run_cycle(), CycleOutcome::LowQuality);
        assert_eq!(s.state().bad_streak, 1);
        drop(s);
        let quality = rig.sink.readings[0].quality.unwrap();
        assert_eq!(quality.verdict.as_str(), "escura");
    }

    #[test]
    fn test_dim_frame_is_kept_as_dark_reading() {
        let mut rig = Rig::new();
        let (w, h) = (32u32, 32u32);
        let dim = (0..w * h).map(|i| if i % 2 == 0 { 20 } else { 30 }).collect();
        rig.camera.frame = Some(Frame::new(dim, w, h));
        let mut s = rig.scheduler(SchedulerConfig::default());

        assert_eq!(s.run_cycle(), CycleOutcome::LowQuality);
        drop(s);
        assert_eq!(rig.camera.captures, 1);
        let reading = &rig.sink.readings[0];
        assert_eq!(reading.outcome, CycleOutcome::LowQuality);
        let quality = reading.quality.unwrap();
        assert_eq!(quality.verdict, QualityVerdict::Dark);
        assert!((quality.brightness - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_huge_cooldown_and_hold_do_not_overflow() {
        let mut rig = Rig::new();
        rig.analyzer.face = false;
        let config = SchedulerConfig {
            cooldown: Duration::from_secs(u64::MAX),
            streak_hold: Duration::from_secs(u64::MAX),
            bad_streak_limit: 1,
            ..SchedulerConfig::default()
        };
        let mut s = rig.scheduler(config.clone());

        assert_eq!(s.run_cycle(), CycleOutcome::Absent);
        s.clock.advance(secs(86_400));
        assert_eq!(s.run_cycle(), CycleOutcome::Cooldown);
        assert_eq!(s.state().bad_streak, 1);

        // Past the cooldown, the streak hold still blocks.
        let mut state = s.state().clone();
        state.cooldown_until = s.clock.now();
        assert_eq!(state.mode(&config, 10.0, s.clock.now()), Mode::StreakBackoff);
    }

    #[test]
    fn test_backed_off_interval_saturates() {
        let config = SchedulerConfig {
            base_interval: Duration::from_secs(u64::MAX),
            max_interval: secs(60),
            backoff_multiplier: u32::MAX,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.backed_off_interval(), secs(60));
    }

    #[test]
    fn test_first_face_enrolls_and_persists_emotions() {
        let mut rig = Rig::new();
        rig.analyzer.embeddings.push_back(emb(&[0.2, 0.9, 0.1]));
        let mut s = rig.scheduler(SchedulerConfig::default());

        assert_eq!(s.person(), None);
        assert_eq!(s.run_cycle(), CycleOutcome::Success);
        let id = s.person().unwrap().to_string();
        assert!(s.reference().is_some());
        drop(s);

        let reading = &rig.sink.readings[0];
        assert_eq!(reading.person_id.as_deref(), Some(id.as_str()));
        assert_eq!(reading.identity_origin, Some(Origin::NewIdentity));
        assert!(reading.face_distance.unwrap() < 1e-5);
        assert!(reading.emotions.is_some());
        assert_eq!(rig.cache.id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_reassignment_is_still_success() {
        let mut rig = Rig::new();
        rig.store = MemoryStore::with(vec![
            ("alice", Some(emb(&[1.0, 0.0, 0.0]))),
            ("bob", Some(emb(&[0.0, 1.0, 0.0]))),
        ]);
        rig.cache = MemoryCache::with("alice");
        rig.analyzer.embeddings.push_back(emb(&[0.05, 1.0, 0.0]));
        let mut s = rig.scheduler(SchedulerConfig::default());

        assert_eq!(s.person(), Some("alice"));
        s.state.bad_streak = 2;
        assert_eq!(s.run_cycle(), CycleOutcome::Success);
        assert_eq!(s.person(), Some("bob"));
        assert_eq!(s.reference(), Some(&emb(&[0.0, 1.0, 0.0])));
        assert_eq!(s.state().bad_streak, 0);
        drop(s);
        assert_eq!(rig.sink.readings[0].identity_origin, Some(Origin::DbMatch));
        assert_eq!(rig.cache.id.as_deref(), Some("bob"));
    }

    #[test]
    fn test_local_without_reference_gets_one() {
        let mut rig = Rig::new();
        rig.cache = MemoryCache::with("carol");
        rig.analyzer.embeddings.push_back(emb(&[0.3, 0.3, 0.9]));
        let mut s = rig.scheduler(SchedulerConfig::default());

        assert!(s.reference().is_none());
        assert_eq!(s.run_cycle(), CycleOutcome::Success);
        assert_eq!(s.person(), Some("carol"));
        assert!(s.reference().is_some());
        drop(s);
        assert_eq!(rig.store.records.len(), 1);
        assert_eq!(rig.store.records[0].0, "carol");
    }

    #[test]
    fn test_store_failure_is_error_and_keeps_streak() {
        let mut rig = Rig::new();
        rig.store.fail = true;
        rig.analyzer.embeddings.push_back(emb(&[1.0, 0.0]));
        let mut s = rig.scheduler(SchedulerConfig::default());
        s.state.bad_streak = 1;

        assert_eq!(s.run_cycle(), CycleOutcome::Error);
        assert_eq!(s.state().bad_streak, 1);
        assert_eq!(s.state().interval, secs(30));
    }

    #[test]
    fn test_emotion_failure_degrades_to_absent() {
        let mut rig = Rig::new();
        rig.analyzer.emotions = Err(CollabError::Timeout);
        rig.analyzer.embeddings.push_back(emb(&[1.0, 0.0]));
        let mut s = rig.scheduler(SchedulerConfig::default());
        assert_eq!(s.run_cycle(), CycleOutcome::Absent);
    }

    #[test]
    fn test_persist_failure_does_not_change_outcome() {
        let mut rig = Rig::new();
        rig.sink.fail = true;
        rig.analyzer.embeddings.push_back(emb(&[1.0, 0.0]));
        let mut s = rig.scheduler(SchedulerConfig::default());
        assert_eq!(s.run_cycle(), CycleOutcome::Success);
    }

    #[test]
    fn test_run_sleeps_interval_and_stops_at_boundary() {
        let mut rig = Rig::new();
        rig.probe.cpu = 99.0;
        let mut s = rig.scheduler(SchedulerConfig::default());

        let mut checks = 0;
        s.run(|| {
            checks += 1;
            checks > 4
        });
        assert_eq!(s.clock.slept.get(), secs(30));
        drop(s);
        assert_eq!(rig.sink.readings.len(), 2);
    }
}
