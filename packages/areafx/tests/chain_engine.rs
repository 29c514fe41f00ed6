//! End-to-end checks of the chain engine through its public API.
//!
//! Run with: cargo test --test chain_engine

use areafx::camera::{Camera, Viewport};
use areafx::chain::Chain;
use areafx::compositor::{render_chain, BackendEvent, BufferId, FrameContext, RecordingBackend};
use areafx::effect::{EffectKind, EffectParameters, TargetingMode};
use areafx::scene::{SceneObject, SceneObjects};
use areafx::session::{Session, SessionConfig};
use areafx::targeting::{PassRegion, SkipReason, TargetingConfig};
use areafx::uniforms::FrameTimers;
use glam::Vec3;

fn kinds(chain: &Chain) -> Vec<EffectKind> {
    chain.steps().iter().map(|s| s.kind()).collect()
}

#[test]
fn edit_session_between_frames() {
    let mut chain = Chain::new();
    chain.append(EffectKind::Tint, TargetingMode::Fullscreen, None, "tint").unwrap();
    chain.append(EffectKind::Blur, TargetingMode::Fullscreen, None, "blur").unwrap();
    chain.append(EffectKind::Inverse, TargetingMode::Fullscreen, None, "inverse").unwrap();

    chain.move_down(0).unwrap();
    assert_eq!(
        kinds(&chain),
        vec![EffectKind::Blur, EffectKind::SecondBlur, EffectKind::Tint, EffectKind::Inverse]
    );

    // live edit of the blur radius between frames
    chain.params_mut(0).unwrap().set_blur_radius(12);
    assert_eq!(chain.params(0), Some(&EffectParameters::Blur { radius: 11 }));

    chain.remove(2).unwrap();
    assert_eq!(kinds(&chain), vec![EffectKind::Blur, EffectKind::SecondBlur, EffectKind::Inverse]);
    assert_eq!(chain.steps().len(), chain.parameters().len());

    chain.clear();
    assert!(chain.is_empty());
}

#[test]
fn frame_plan_chains_buffers_and_skips_close_areas() {
    let camera = Camera {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        ..Camera::default()
    };
    let mut objects = SceneObjects::new();
    let far = objects.add(SceneObject::new("Far", Vec3::new(0.0, 0.0, 90.0)));
    let near = objects.add(SceneObject::new("Near", Vec3::new(0.0, 0.0, 1.5)));

    let mut chain = Chain::new();
    chain.append(EffectKind::Bloom, TargetingMode::Fullscreen, None, "glow").unwrap();
    chain.append(EffectKind::Tint, TargetingMode::Area, Some(near), "near").unwrap();
    chain.append(EffectKind::GreyNoise, TargetingMode::Area, Some(far), "far").unwrap();
    chain.append(EffectKind::Scanlines, TargetingMode::ModelPolygon, Some(far), "lines").unwrap();

    let targeting = TargetingConfig::default();
    let timers = FrameTimers::default();
    let ctx = FrameContext {
        camera: &camera,
        viewport: Viewport::new(1024, 768),
        objects: &objects,
        targeting: &targeting,
        timers: &timers,
    };
    let mut backend = RecordingBackend::new();
    let report = render_chain(&mut backend, &chain, &ctx);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 4);
    assert_eq!(report.skipped[0].reason, SkipReason::BehindNearClip);

    let executed: Vec<usize> = report.passes.iter().map(|p| p.index).collect();
    assert_eq!(executed, vec![0, 1, 2, 3, 5, 6]);
    assert_eq!(report.passes[0].source, BufferId::A);
    for pair in report.passes.windows(2) {
        assert_eq!(pair[0].destination, pair[1].source);
    }
    assert_eq!(report.presented, BufferId::A);
    assert!(matches!(report.passes[4].region, PassRegion::Rect(_)));
    assert!(matches!(report.passes[5].region, PassRegion::Quad(_)));

    // 4 bloom passes + (underlay + effect) twice
    assert_eq!(backend.draws().count(), 8);
    assert_eq!(backend.events.first(), Some(&BackendEvent::BeginFrame));
    assert_eq!(backend.events.last(), Some(&BackendEvent::Present(BufferId::A)));
}

#[test]
fn session_file_drives_the_chain() {
    let config = SessionConfig::from_json(
        r#"{
            "width": 640,
            "height": 360,
            "windowDemo": true,
            "camera": { "position": [25, 18, -45], "rotation": [10, 7, 0] },
            "chain": [
                { "effect": "Underwater", "params": { "underwater": { "speed": 0.5 } } },
                { "effect": "Blur", "mode": "Area", "target": "LargeWindow" }
            ]
        }"#,
    )
    .unwrap();
    let mut session = Session::from_config(&config).unwrap();

    assert_eq!(session.chain.group_count(), 2);
    // window targets are always drawn as their model quad
    assert_eq!(session.chain.steps()[1].mode(), TargetingMode::ModelPolygon);
    assert_eq!(session.chain.steps()[2].mode(), TargetingMode::ModelPolygon);

    session.advance(1.0);
    assert!((session.timers.water_level - 0.5).abs() < 1e-6);

    let mut backend = RecordingBackend::new();
    let report = session.render(&mut backend);
    assert_eq!(report.passes.len(), 3);
    assert_eq!(report.presented, BufferId::B);
}
