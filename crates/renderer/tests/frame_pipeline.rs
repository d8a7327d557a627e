//! End-to-end frame pipelining against the headless backend.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use shapes_core::FrameTime;
use shapes_geometry::{ProceduralShapes, ShapeKind};
use shapes_renderer::headless::HostBuffer;
use shapes_renderer::{
    FrameOutcome, FrameScheduler, FrameState, GeometryStore, GpuTimeline, HeadlessBackend,
    ObjectConstants, PipelineVariant, RenderItemId, RenderItemRegistry, Viewport,
    compute_pass_constants,
};
use shapes_rhi::RhiError;
use shapes_scene::OrbitCamera;

fn time(frame: u32) -> FrameTime {
    FrameTime {
        total: frame as f32 / 60.0,
        delta: 1.0 / 60.0,
    }
}

fn build(items: usize, depth: usize, backend: HeadlessBackend) -> (FrameScheduler<HeadlessBackend>, Vec<RenderItemId>) {
    let geometry = GeometryStore::build(&ProceduralShapes, &ShapeKind::ALL);
    let mut registry = RenderItemRegistry::new(depth);
    let ids = (0..items)
        .map(|i| {
            let shape = ShapeKind::ALL[i % ShapeKind::COUNT];
            registry.add(&geometry, shape, Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)))
        })
        .collect();
    let scheduler = FrameScheduler::new(backend, geometry, registry, Viewport::new(800, 600))
        .expect("headless scheduler");
    (scheduler, ids)
}

fn object_record(scheduler: &FrameScheduler<HeadlessBackend>, slot: usize, index: usize) -> Mat4 {
    let objects = scheduler.ring().slot(slot).objects();
    let buffer: &HostBuffer = objects.storage();
    buffer.read::<ObjectConstants>(objects.record_offset(index)).world
}

fn run(scheduler: &mut FrameScheduler<HeadlessBackend>, camera: &OrbitCamera, frames: std::ops::Range<u32>) {
    for frame in frames {
        scheduler
            .tick(camera, time(frame), PipelineVariant::Opaque)
            .expect("frame");
    }
}

#[test]
fn test_transform_change_reaches_every_slot() {
    let (mut scheduler, ids) = build(8, 3, HeadlessBackend::new(800, 600).with_latency(2));
    let camera = OrbitCamera::default();
    run(&mut scheduler, &camera, 0..3);
    assert_eq!(scheduler.registry().dirty_count(), 0);

    let moved = Mat4::from_scale(Vec3::splat(2.0));
    scheduler.set_transform(ids[5], moved);
    assert_eq!(scheduler.registry().get(ids[5]).unwrap().staleness(), 3);

    // The ring cursor is back on slot 0, so frames 3..6 use slots 0, 1, 2.
    for (frame, slot) in (3..6).zip(0..3) {
        assert_ne!(object_record(&scheduler, slot, 5), moved);
        run(&mut scheduler, &camera, frame..frame + 1);
        assert_eq!(scheduler.ring().cursor(), slot);
        assert_eq!(object_record(&scheduler, slot, 5), moved);
    }

    assert_eq!(scheduler.registry().get(ids[5]).unwrap().staleness(), 0);
    for slot in 0..3 {
        assert_eq!(
            object_record(&scheduler, slot, 4),
            Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0))
        );
    }
}

#[test]
fn test_at_most_depth_frames_in_flight() {
    let (mut scheduler, _) = build(4, 3, HeadlessBackend::new(800, 600));
    let camera = OrbitCamera::default();
    run(&mut scheduler, &camera, 0..10);

    let backend = scheduler.backend();
    assert_eq!(backend.last_submitted(), 10);
    assert_eq!(backend.max_pending(), 3);
    // Slot reuse starts with frame 4, which waits for frame 1.
    assert_eq!(backend.waits(), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(scheduler.stats().stalls.count, 7);
}

#[test]
fn test_no_stalls_when_gpu_keeps_up() {
    let (mut scheduler, _) = build(4, 3, HeadlessBackend::new(800, 600).with_latency(2));
    let camera = OrbitCamera::default();
    run(&mut scheduler, &camera, 0..12);
    assert!(scheduler.backend().waits().is_empty());
    assert_eq!(scheduler.stats().stalls.count, 0);
}

#[test]
fn test_descriptor_table_for_eighteen_items() {
    let (scheduler, _) = build(18, 3, HeadlessBackend::new(800, 600));
    let layout = scheduler.layout();
    assert_eq!(layout.table_size(), 57);
    assert_eq!(
        (0..3).map(|slot| layout.pass_offset(slot)).collect::<Vec<_>>(),
        vec![54, 55, 56]
    );
    assert_eq!(layout.object_offset(2, 17), 53);

    let backend = scheduler.backend();
    assert_eq!(backend.descriptor_table_size(), 57);
    let pass = backend.descriptor(55).unwrap();
    assert_eq!(pass.address, scheduler.ring().slot(1).pass().base_address());
}

#[test]
fn test_draws_use_current_slot_descriptors() {
    let (mut scheduler, _) = build(18, 3, HeadlessBackend::new(800, 600).with_latency(2));
    let camera = OrbitCamera::default();
    run(&mut scheduler, &camera, 0..3);

    let submission = &scheduler.backend().submissions()[2];
    assert_eq!(submission.slot, 2);
    assert_eq!(
        submission.draw_descriptors(),
        (36..54).collect::<Vec<_>>()
    );
}

#[test]
fn test_camera_is_clamped_in_pass_constants() {
    let (mut scheduler, _) = build(2, 3, HeadlessBackend::new(800, 600));
    let camera = OrbitCamera::new(1.5 * PI, 3.3, 200.0);
    run(&mut scheduler, &camera, 0..1);

    let pass = scheduler.ring().slot(0).pass();
    let written: shapes_renderer::PassConstants = pass.storage().read(pass.record_offset(0));
    assert_eq!(written, compute_pass_constants(&camera, Viewport::new(800, 600), time(0)));
    assert!((written.eye_pos_w.length() - 150.0).abs() < 1e-3);
    let expected_y = 150.0 * (PI - 0.1).cos();
    assert!((written.eye_pos_w.y - expected_y).abs() < 1e-3);
}

#[test]
fn test_outdated_target_skips_frame() {
    let (mut scheduler, _) = build(4, 3, HeadlessBackend::new(800, 600));
    let camera = OrbitCamera::default();
    scheduler.backend_mut().report_outdated(1);

    let outcome = scheduler
        .tick(&camera, time(0), PipelineVariant::Opaque)
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(scheduler.state(), FrameState::Idle);
    assert_eq!(scheduler.ring().slot(0).completion_marker(), 0);
    assert!(scheduler.backend().submissions().is_empty());

    let outcome = scheduler
        .tick(&camera, time(1), PipelineVariant::Opaque)
        .unwrap();
    assert!(matches!(
        outcome,
        FrameOutcome::Submitted {
            slot: 1,
            signal_value: 1,
            ..
        }
    ));

    let stats = scheduler.stats();
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.frames_submitted, 1);
}

#[test]
fn test_device_loss_is_fatal() {
    let (mut scheduler, _) = build(4, 3, HeadlessBackend::new(800, 600));
    let camera = OrbitCamera::default();
    run(&mut scheduler, &camera, 0..2);

    scheduler.backend_mut().lose_device();
    let result = scheduler.tick(&camera, time(2), PipelineVariant::Opaque);
    assert!(matches!(result, Err(RhiError::DeviceLost)));
    assert!(matches!(scheduler.shutdown(), Err(RhiError::DeviceLost)));
}

#[test]
fn test_shutdown_waits_for_last_frame() {
    let (mut scheduler, _) = build(4, 2, HeadlessBackend::new(800, 600));
    let camera = OrbitCamera::default();
    run(&mut scheduler, &camera, 0..5);
    assert!(scheduler.backend().pending() > 0);

    scheduler.shutdown().unwrap();
    assert_eq!(scheduler.backend().completed_value().unwrap(), 5);
    assert_eq!(scheduler.backend().pending(), 0);
    assert_eq!(scheduler.state(), FrameState::Idle);
}
