use posture_sup::core::{cosine_similarity, face_distance, BoundingBox, MIN_BOX_SIDE};
use proptest::prelude::*;

fn any_box() -> impl Strategy<Value = BoundingBox> {
    (-500i32..2000, -500i32..2000, 1i32..1000, 1i32..1000)
        .prop_map(|(x, y, w, h)| BoundingBox::new(x, y, w, h))
}

fn nonzero_vector() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-10.0f32..10.0, 1..64)
        .prop_filter("non-zero", |v| v.iter().any(|x| x.abs() > 1e-3))
}

proptest! {
    #[test]
    fn expand_undoes_shrink(
        x in -1000i32..1000,
        y in -1000i32..1000,
        w in 40i32..2000,
        h in 40i32..2000,
        ratio in 0.0f32..0.5,
    ) {
        let original = BoundingBox::new(x, y, w, h);
        let restored = original.shrink(ratio).expand(ratio);

        prop_assert!((restored.x - original.x).abs() <= 2, "{:?} vs {:?}", restored, original);
        prop_assert!((restored.y - original.y).abs() <= 2, "{:?} vs {:?}", restored, original);
        prop_assert!((restored.width - original.width).abs() <= 4, "{:?} vs {:?}", restored, original);
        prop_assert!((restored.height - original.height).abs() <= 4, "{:?} vs {:?}", restored, original);
    }

    #[test]
    fn shrink_never_goes_below_minimum(b in any_box(), ratio in 0.0f32..=1.0) {
        let shrunk = b.shrink(ratio);
        prop_assert!(shrunk.width >= MIN_BOX_SIDE);
        prop_assert!(shrunk.height >= MIN_BOX_SIDE);
    }

    #[test]
    fn iou_is_symmetric_and_bounded(a in any_box(), b in any_box()) {
        let ab = a.iou(&b);
        let ba = b.iou(&a);
        prop_assert!((ab - ba).abs() < 1e-6);
        prop_assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn iou_with_self_is_one(a in any_box()) {
        prop_assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_boxes_have_zero_iou(a in any_box(), gap in 0i32..100) {
        let b = BoundingBox::new(a.right() + gap, a.y, a.width, a.height);
        prop_assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn cosine_is_bounded(a in nonzero_vector(), b in nonzero_vector()) {
        let len = a.len().min(b.len());
        let s = cosine_similarity(&a[..len], &b[..len]);
        prop_assert!((-1.0..=1.0).contains(&s));
    }

    #[test]
    fn cosine_with_self_is_one(v in nonzero_vector()) {
        prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn face_distance_ignores_scale(v in nonzero_vector(), scale in 0.1f32..10.0) {
        let scaled: Vec<f32> = v.iter().map(|x| x * scale).collect();
        prop_assert!(face_distance(&v, &scaled) < 1e-3);
    }
}
