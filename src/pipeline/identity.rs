use crate::common::config::IdentityConfig;
use crate::core::{cosine_similarity, l2_normalize, largest_index, mean_embedding, Embedding};
use crate::pipeline::channel::LatestOnlyChannel;
use crate::pipeline::parcel::DataParcel;
use crate::storage::{UserId, UserRepository};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[derive(Debug)]
struct EnrollmentSession {
    user_id: UserId,
    samples: Vec<Embedding>,
}

/// Identity and auto-enrollment state, advanced one parcel at a time.
///
/// `step` takes the current instant so timing behaviour can be driven
/// deterministically.
pub struct IdentityEngine<R: UserRepository> {
    repository: R,
    config: IdentityConfig,
    current_user: Option<UserId>,
    last_seen: Option<Instant>,
    unknown_streak: u32,
    enrollment: Option<EnrollmentSession>,
    calibration_left: u32,
}

impl<R: UserRepository> IdentityEngine<R> {
    pub fn new(repository: R, config: IdentityConfig) -> Self {
        Self {
            repository,
            config,
            current_user: None,
            last_seen: None,
            unknown_streak: 0,
            enrollment: None,
            calibration_left: 0,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.current_user
    }

    pub fn unknown_streak(&self) -> u32 {
        self.unknown_streak
    }

    /// Id being enrolled and the samples collected so far.
    pub fn enrollment(&self) -> Option<(UserId, usize)> {
        self.enrollment.as_ref().map(|s| (s.user_id, s.samples.len()))
    }

    /// Advance by one cycle. `None` as input means the receive timed out.
    ///
    /// Returns the parcel to forward downstream, if any.
    pub fn step(&mut self, parcel: Option<DataParcel>, now: Instant) -> Option<DataParcel> {
        let Some(parcel) = parcel else {
            return self.clear_if_absent(now).then(DataParcel::absence_notice);
        };

        if parcel.boxes.is_empty() {
            self.clear_if_absent(now);
            return Some(self.emit(parcel));
        }

        // No embedding to judge presence by; identity passes through untouched.
        if parcel.is_tracking_update() {
            return Some(self.emit(parcel));
        }

        if parcel.boxes.len() != parcel.embeddings.len() {
            tracing::warn!(
                "Box/embedding count mismatch ({} vs {}), skipping",
                parcel.boxes.len(),
                parcel.embeddings.len()
            );
            return Some(self.emit(parcel));
        }

        let Some(idx) = largest_index(&parcel.boxes) else {
            return Some(self.emit(parcel));
        };
        let embedding = l2_normalize(&parcel.embeddings[idx]);

        if self.enrollment.is_some() {
            self.collect_sample(embedding, now);
            return Some(self.emit(parcel));
        }

        let (candidate, best_similarity) = self.best_match(&embedding);
        match candidate {
            Some(user_id) => self.accept_match(user_id, best_similarity, now),
            None => self.record_unknown(embedding, best_similarity, now),
        }

        Some(self.emit(parcel))
    }

    fn absence_expired(&self, now: Instant) -> bool {
        self.last_seen.map_or(true, |seen| {
            now.saturating_duration_since(seen) > self.config.absence_timeout()
        })
    }

    fn clear_if_absent(&mut self, now: Instant) -> bool {
        match self.current_user {
            Some(user_id) if self.absence_expired(now) => {
                tracing::info!("User {} absent, clearing identity", user_id);
                self.current_user = None;
                true
            }
            _ => false,
        }
    }

    fn emit(&mut self, mut parcel: DataParcel) -> DataParcel {
        parcel.current_user_id = self.current_user;
        parcel.calibration_needed = self.calibration_left > 0;
        self.calibration_left = self.calibration_left.saturating_sub(1);
        parcel
    }

    fn arm_calibration(&mut self) {
        self.calibration_left = self.config.calibration_frames.max(1);
    }

    /// Best user by max cosine similarity over their stored embeddings.
    ///
    /// The id is only returned when it clears `match_threshold`; the score
    /// is always returned for logging.
    fn best_match(&self, embedding: &[f32]) -> (Option<UserId>, f32) {
        let mut best: Option<UserId> = None;
        let mut best_similarity = -1.0f32;

        for user_id in self.repository.user_ids() {
            let Some(stored) = self.repository.lookup(user_id) else {
                continue;
            };
            let similarity = stored
                .iter()
                .map(|e| cosine_similarity(embedding, e))
                .fold(f32::NEG_INFINITY, f32::max);

            if similarity > best_similarity {
                best_similarity = similarity;
                best = Some(user_id);
            }
        }

        let accepted = best.filter(|_| best_similarity >= self.config.match_threshold);
        (accepted, best_similarity)
    }

    fn accept_match(&mut self, user_id: UserId, similarity: f32, now: Instant) {
        let changed = self.current_user != Some(user_id);
        if changed || self.absence_expired(now) {
            tracing::info!("Recognized user {} (sim={:.3}), calibration needed", user_id, similarity);
            self.arm_calibration();
        }
        self.current_user = Some(user_id);
        self.last_seen = Some(now);
        self.unknown_streak = 0;
    }

    fn record_unknown(&mut self, embedding: Embedding, best_similarity: f32, now: Instant) {
        self.unknown_streak += 1;
        tracing::debug!("Unknown face, streak={} best_sim={:.3}", self.unknown_streak, best_similarity);

        if self.unknown_streak >= self.config.unknown_streak_for_enroll {
            let user_id = self.repository.allocate_next_id();
            tracing::info!("Starting enrollment of user {}", user_id);
            self.enrollment = Some(EnrollmentSession { user_id, samples: Vec::new() });
            self.collect_sample(embedding, now);
        }
    }

    fn collect_sample(&mut self, embedding: Embedding, now: Instant) {
        self.last_seen = Some(now);
        let Some(session) = self.enrollment.as_mut() else {
            return;
        };
        session.samples.push(embedding);

        if session.samples.len() >= self.config.samples_per_user.max(1) {
            self.commit_enrollment(now);
        }
    }

    fn commit_enrollment(&mut self, now: Instant) {
        let Some(session) = self.enrollment.take() else {
            return;
        };
        let template = l2_normalize(&mean_embedding(&session.samples));

        match self.repository.append_embedding(session.user_id, template) {
            Ok(()) => {
                tracing::info!(
                    "Enrolled user {} from {} sample(s)",
                    session.user_id,
                    session.samples.len()
                );
                self.current_user = Some(session.user_id);
                self.last_seen = Some(now);
                self.unknown_streak = 0;
                self.arm_calibration();
            }
            Err(e) => tracing::warn!("Enrollment of user {} failed: {}", session.user_id, e),
        }
    }
}

/// Runs an [`IdentityEngine`] between two latest-only channels.
pub struct IdentityWorker<R: UserRepository> {
    engine: IdentityEngine<R>,
    input: LatestOnlyChannel<DataParcel>,
    output: LatestOnlyChannel<DataParcel>,
}

impl<R: UserRepository> IdentityWorker<R> {
    pub fn new(
        engine: IdentityEngine<R>,
        input: LatestOnlyChannel<DataParcel>,
        output: LatestOnlyChannel<DataParcel>,
    ) -> Self {
        Self { engine, input, output }
    }

    pub fn run(mut self, running: &AtomicBool) {
        let poll = self.engine.config.poll_interval();
        tracing::info!("Identity worker started (poll {:?})", poll);

        while running.load(Ordering::SeqCst) {
            let parcel = self.input.receive(poll);
            if let Some(out) = self.engine.step(parcel, Instant::now()) {
                self.output.send(out);
            }
        }

        tracing::info!("Identity worker stopped");
    }
}
