mod support;

use posture_sup::common::config::IdentityConfig;
use posture_sup::core::BoundingBox;
use posture_sup::pipeline::{DataParcel, IdentityEngine, TrackState};
use posture_sup::storage::{InMemoryUserStore, UserRepository};
use std::time::{Duration, Instant};
use support::test_frame;

fn store_with(users: &[Vec<f32>]) -> InMemoryUserStore {
    let mut store = InMemoryUserStore::new();
    for embedding in users {
        let id = store.allocate_next_id();
        store.append_embedding(id, embedding.clone()).unwrap();
    }
    store
}

fn one_face(embedding: Vec<f32>) -> DataParcel {
    DataParcel::recognizing(test_frame(), vec![BoundingBox::new(50, 50, 80, 80)], vec![embedding])
}

fn no_faces() -> DataParcel {
    DataParcel::recognizing(test_frame(), vec![], vec![])
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn face_above_threshold_is_accepted_with_calibration() {
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), IdentityConfig::default());
    let now = Instant::now();

    // cos = 0.70 against the stored template; threshold is 0.63.
    let observed = vec![0.7, (1.0f32 - 0.49).sqrt()];
    let out = engine.step(Some(one_face(observed.clone())), now).unwrap();
    assert_eq!(out.current_user_id, Some(1));
    assert!(out.calibration_needed);
    assert!(out.frame.is_some());

    // Two calibration frames by default, then clear.
    let out = engine.step(Some(one_face(observed.clone())), now).unwrap();
    assert!(out.calibration_needed);
    let out = engine.step(Some(one_face(observed)), now).unwrap();
    assert!(!out.calibration_needed);
    assert_eq!(out.current_user_id, Some(1));
}

#[test]
fn face_below_threshold_counts_as_unknown() {
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), IdentityConfig::default());
    let observed = vec![0.5, 0.75f32.sqrt()];
    let out = engine.step(Some(one_face(observed)), Instant::now()).unwrap();
    assert_eq!(out.current_user_id, None);
    assert_eq!(engine.unknown_streak(), 1);
}

#[test]
fn enrollment_starts_on_the_fifth_unknown_frame() {
    let config = IdentityConfig { unknown_streak_for_enroll: 5, ..Default::default() };
    let mut engine = IdentityEngine::new(InMemoryUserStore::new(), config);
    let now = Instant::now();

    for _ in 0..4 {
        engine.step(Some(one_face(vec![0.0, 1.0])), now);
        assert!(engine.enrollment().is_none());
    }
    assert_eq!(engine.unknown_streak(), 4);

    engine.step(Some(one_face(vec![0.0, 1.0])), now);
    assert_eq!(engine.enrollment(), Some((1, 1)));
}

#[test]
fn enrollment_commits_exactly_at_the_sample_count() {
    let config = IdentityConfig {
        unknown_streak_for_enroll: 1,
        samples_per_user: 4,
        ..Default::default()
    };
    let mut engine = IdentityEngine::new(InMemoryUserStore::new(), config);
    let now = Instant::now();

    let samples = [vec![1.0, 0.1], vec![1.0, -0.1], vec![0.9, 0.0], vec![1.1, 0.0]];
    for (i, sample) in samples.iter().take(3).enumerate() {
        let out = engine.step(Some(one_face(sample.clone())), now).unwrap();
        assert_eq!(out.current_user_id, None);
        assert_eq!(engine.enrollment(), Some((1, i + 1)));
    }
    assert!(engine.repository().lookup(1).is_none());

    let out = engine.step(Some(one_face(samples[3].clone())), now).unwrap();
    assert_eq!(out.current_user_id, Some(1));
    assert!(out.calibration_needed);
    assert!(engine.enrollment().is_none());
    assert_eq!(engine.unknown_streak(), 0);

    let stored = engine.repository().lookup(1).unwrap();
    assert_eq!(stored.len(), 1);
    let norm: f32 = stored[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);
    assert!((stored[0][0] - 1.0).abs() < 1e-3);
}

#[test]
fn single_sample_enrollment_commits_immediately() {
    let config = IdentityConfig {
        unknown_streak_for_enroll: 2,
        samples_per_user: 1,
        ..Default::default()
    };
    let mut engine = IdentityEngine::new(InMemoryUserStore::new(), config);
    let now = Instant::now();

    assert_eq!(engine.step(Some(one_face(vec![0.0, 1.0])), now).unwrap().current_user_id, None);
    assert_eq!(engine.step(Some(one_face(vec![0.0, 1.0])), now).unwrap().current_user_id, Some(1));

    // The enrolled face is now recognized.
    let out = engine.step(Some(one_face(vec![0.0, 2.0])), now).unwrap();
    assert_eq!(out.current_user_id, Some(1));
    assert_eq!(engine.repository().user_ids(), vec![1]);
}

#[test]
fn absence_clears_the_user_exactly_once() {
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), IdentityConfig::default());
    let t0 = Instant::now();
    engine.step(Some(one_face(vec![1.0, 0.0])), t0);

    // Still within the timeout.
    assert!(engine.step(None, t0 + secs(5)).is_none());
    let out = engine.step(Some(no_faces()), t0 + secs(9)).unwrap();
    assert_eq!(out.current_user_id, Some(1));

    let notice = engine.step(None, t0 + secs(11)).unwrap();
    assert!(notice.frame.is_none());
    assert_eq!(notice.current_user_id, None);
    assert!(!notice.calibration_needed);
    assert_eq!(engine.current_user(), None);

    assert!(engine.step(None, t0 + secs(12)).is_none());
    assert!(engine.step(None, t0 + secs(30)).is_none());
}

#[test]
fn zero_face_frames_past_timeout_clear_the_user() {
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), IdentityConfig::default());
    let t0 = Instant::now();
    engine.step(Some(one_face(vec![1.0, 0.0])), t0);

    let out = engine.step(Some(no_faces()), t0 + secs(11)).unwrap();
    assert_eq!(out.current_user_id, None);
    assert!(out.frame.is_some());

    let out = engine.step(Some(no_faces()), t0 + secs(12)).unwrap();
    assert_eq!(out.current_user_id, None);
    assert!(engine.step(None, t0 + secs(13)).is_none());
}

#[test]
fn tracking_parcels_pass_identity_through() {
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), IdentityConfig::default());
    let t0 = Instant::now();
    engine.step(Some(one_face(vec![1.0, 0.0])), t0);

    let tracking = DataParcel::tracking(test_frame(), BoundingBox::new(60, 60, 60, 60));
    let out = engine.step(Some(tracking), t0 + secs(9)).unwrap();
    assert_eq!(out.current_user_id, Some(1));
    assert_eq!(out.track_state, TrackState::Tracking);
    assert_eq!(out.boxes.len(), 1);

    // Tracking does not count as a sighting, so the clock still runs from t0.
    let notice = engine.step(None, t0 + secs(11)).unwrap();
    assert!(notice.frame.is_none());
    assert_eq!(engine.current_user(), None);
}

#[test]
fn rematch_after_long_tracking_rearms_calibration() {
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), IdentityConfig::default());
    let t0 = Instant::now();

    assert!(engine.step(Some(one_face(vec![1.0, 0.0])), t0).unwrap().calibration_needed);
    assert!(engine.step(Some(one_face(vec![1.0, 0.0])), t0).unwrap().calibration_needed);
    assert!(!engine.step(Some(one_face(vec![1.0, 0.0])), t0).unwrap().calibration_needed);

    for s in 1..=12 {
        let tracking = DataParcel::tracking(test_frame(), BoundingBox::new(60, 60, 60, 60));
        let out = engine.step(Some(tracking), t0 + secs(s)).unwrap();
        assert_eq!(out.current_user_id, Some(1));
        assert!(!out.calibration_needed);
    }

    let out = engine.step(Some(one_face(vec![1.0, 0.0])), t0 + secs(12)).unwrap();
    assert_eq!(out.current_user_id, Some(1));
    assert!(out.calibration_needed);
}

#[test]
fn returning_after_absence_rearms_calibration() {
    let config = IdentityConfig { calibration_frames: 1, ..Default::default() };
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), config);
    let t0 = Instant::now();

    assert!(engine.step(Some(one_face(vec![1.0, 0.0])), t0).unwrap().calibration_needed);
    assert!(!engine.step(Some(one_face(vec![1.0, 0.0])), t0 + secs(1)).unwrap().calibration_needed);

    // Same user, but unseen for longer than the timeout.
    let out = engine.step(Some(one_face(vec![1.0, 0.0])), t0 + secs(20)).unwrap();
    assert_eq!(out.current_user_id, Some(1));
    assert!(out.calibration_needed);
}

#[test]
fn switching_users_rearms_calibration() {
    let config = IdentityConfig { calibration_frames: 1, ..Default::default() };
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]), config);
    let now = Instant::now();

    engine.step(Some(one_face(vec![1.0, 0.0])), now);
    assert!(!engine.step(Some(one_face(vec![1.0, 0.0])), now).unwrap().calibration_needed);

    let out = engine.step(Some(one_face(vec![0.0, 1.0])), now).unwrap();
    assert_eq!(out.current_user_id, Some(2));
    assert!(out.calibration_needed);
}

#[test]
fn ties_go_to_the_lowest_user_id() {
    let mut engine = IdentityEngine::new(
        store_with(&[vec![1.0, 0.0], vec![1.0, 0.0]]),
        IdentityConfig::default(),
    );
    let out = engine.step(Some(one_face(vec![1.0, 0.0])), Instant::now()).unwrap();
    assert_eq!(out.current_user_id, Some(1));
}

#[test]
fn largest_face_is_the_representative() {
    let mut engine = IdentityEngine::new(
        store_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]),
        IdentityConfig::default(),
    );
    let parcel = DataParcel::recognizing(
        test_frame(),
        vec![BoundingBox::new(0, 0, 30, 30), BoundingBox::new(100, 100, 90, 90)],
        vec![vec![1.0, 0.0], vec![0.0, 1.0]],
    );
    let out = engine.step(Some(parcel), Instant::now()).unwrap();
    assert_eq!(out.current_user_id, Some(2));
}

#[test]
fn count_mismatch_is_skipped() {
    let mut engine = IdentityEngine::new(store_with(&[vec![1.0, 0.0]]), IdentityConfig::default());
    let parcel = DataParcel::recognizing(
        test_frame(),
        vec![BoundingBox::new(0, 0, 30, 30), BoundingBox::new(100, 100, 90, 90)],
        vec![vec![1.0, 0.0]],
    );
    let out = engine.step(Some(parcel), Instant::now()).unwrap();
    assert_eq!(out.current_user_id, None);
    assert_eq!(engine.unknown_streak(), 0);
}
