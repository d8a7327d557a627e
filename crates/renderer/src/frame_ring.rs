//! Rotation of per-frame CPU/GPU state.
//!
//! Each [`FrameSlot`] owns a command scope and two constant pools. The CPU
//! writes into a slot only after the GPU has passed the slot's completion
//! marker, so at most `depth` frames are ever in flight.

use std::time::{Duration, Instant};

use shapes_rhi::RhiResult;
use tracing::{debug, info};

use crate::backend::{GpuTimeline, RenderBackend};
use crate::constant_pool::ConstantBufferPool;
use crate::constants::{ObjectConstants, PassConstants};

/// Time the CPU spent blocked on the GPU in [`FrameRing::acquire_next`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StallStats {
    pub count: u64,
    pub total: Duration,
    pub longest: Duration,
}

impl StallStats {
    fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total += duration;
        self.longest = self.longest.max(duration);
    }

    /// Mean stall duration, zero if there were none.
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total.div_f64(self.count as f64)
        }
    }
}

/// Reusable per-frame state.
pub struct FrameSlot<B: RenderBackend> {
    scope: B::CommandScope,
    objects: ConstantBufferPool<ObjectConstants, B::ConstantBuffer>,
    pass: ConstantBufferPool<PassConstants, B::ConstantBuffer>,
    /// Timeline value whose completion frees this slot; 0 if never submitted.
    completion_marker: u64,
}

impl<B: RenderBackend> FrameSlot<B> {
    fn new(backend: &mut B, index: usize, item_count: usize) -> RhiResult<Self> {
        Ok(Self {
            scope: backend.create_command_scope(index)?,
            objects: ConstantBufferPool::create(backend, item_count)?,
            pass: ConstantBufferPool::create(backend, 1)?,
            completion_marker: 0,
        })
    }

    pub fn scope(&self) -> &B::CommandScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut B::CommandScope {
        &mut self.scope
    }

    pub fn objects(&self) -> &ConstantBufferPool<ObjectConstants, B::ConstantBuffer> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ConstantBufferPool<ObjectConstants, B::ConstantBuffer> {
        &mut self.objects
    }

    pub fn pass(&self) -> &ConstantBufferPool<PassConstants, B::ConstantBuffer> {
        &self.pass
    }

    pub fn pass_mut(&mut self) -> &mut ConstantBufferPool<PassConstants, B::ConstantBuffer> {
        &mut self.pass
    }

    pub fn completion_marker(&self) -> u64 {
        self.completion_marker
    }
}

/// Fixed ring of `depth` frame slots visited in strict round-robin order.
pub struct FrameRing<B: RenderBackend> {
    slots: Vec<FrameSlot<B>>,
    cursor: usize,
    /// Last timeline value handed out.
    timeline: u64,
    stalls: StallStats,
}

impl<B: RenderBackend> FrameRing<B> {
    /// Creates `depth` slots, each with room for `item_count` object records.
    ///
    /// The cursor starts on the last slot so the first acquire lands on
    /// slot 0.
    pub fn new(backend: &mut B, depth: usize, item_count: usize) -> RhiResult<Self> {
        assert!(depth > 0, "ring depth must be at least 1");

        let slots = (0..depth)
            .map(|index| FrameSlot::new(backend, index, item_count))
            .collect::<RhiResult<Vec<_>>>()?;

        info!("Frame ring created: {depth} slots, {item_count} items per slot");

        Ok(Self {
            slots,
            cursor: depth - 1,
            timeline: 0,
            stalls: StallStats::default(),
        })
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Index of the current slot.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> &FrameSlot<B> {
        &self.slots[self.cursor]
    }

    pub fn current_mut(&mut self) -> &mut FrameSlot<B> {
        &mut self.slots[self.cursor]
    }

    pub fn slot(&self, index: usize) -> &FrameSlot<B> {
        &self.slots[index]
    }

    pub fn slots(&self) -> &[FrameSlot<B>] {
        &self.slots
    }

    /// Advances to the next slot, blocking until the GPU has finished the
    /// work last submitted from it. Returns the new cursor.
    ///
    /// This is the only place the CPU waits on the GPU.
    ///
    /// # Errors
    ///
    /// Fails if the timeline cannot be queried or waited on, including
    /// [`RhiError::DeviceLost`](shapes_rhi::RhiError::DeviceLost).
    pub fn acquire_next<T: GpuTimeline + ?Sized>(&mut self, timeline: &T) -> RhiResult<usize> {
        self.cursor = (self.cursor + 1) % self.slots.len();
        let marker = self.slots[self.cursor].completion_marker;

        if marker != 0 {
            let completed = timeline.completed_value()?;
            if marker > completed {
                let start = Instant::now();
                timeline.wait_for_value(marker)?;
                let stalled = start.elapsed();
                self.stalls.record(stalled);
                debug!(
                    "Stalled {:.3} ms on slot {} (marker {marker}, completed {completed})",
                    stalled.as_secs_f64() * 1000.0,
                    self.cursor
                );
            }
        }

        Ok(self.cursor)
    }

    /// Reserves the next timeline value for a submission.
    pub fn next_timeline_value(&mut self) -> u64 {
        self.timeline += 1;
        self.timeline
    }

    /// Records that the current slot's work completes at `value`.
    pub fn stamp_current(&mut self, value: u64) {
        self.slots[self.cursor].completion_marker = value;
    }

    /// Highest completion marker stamped on any slot.
    pub fn last_stamped(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.completion_marker)
            .max()
            .unwrap_or(0)
    }

    /// Number of slots whose work has not reached `completed`.
    pub fn in_flight(&self, completed: u64) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.completion_marker > completed)
            .count()
    }

    /// Blocks until every stamped slot has completed.
    pub fn drain<T: GpuTimeline + ?Sized>(&self, timeline: &T) -> RhiResult<()> {
        let last = self.last_stamped();
        if last != 0 && timeline.completed_value()? < last {
            debug!("Draining frame ring up to {last}");
            timeline.wait_for_value(last)?;
        }
        Ok(())
    }

    pub fn stall_stats(&self) -> StallStats {
        self.stalls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PipelineVariant, RenderBackend};
    use crate::headless::HeadlessBackend;

    /// Acquires, submits and stamps one frame.
    fn run_frame(ring: &mut FrameRing<HeadlessBackend>, backend: &mut HeadlessBackend) -> usize {
        let slot = ring.acquire_next(&*backend).unwrap();
        let value = ring.next_timeline_value();
        let scope = ring.current_mut().scope_mut();
        backend.begin_frame(scope, PipelineVariant::Opaque).unwrap();
        backend.submit(scope, value).unwrap();
        ring.stamp_current(value);
        slot
    }

    #[test]
    fn test_round_robin_from_slot_zero() {
        let mut backend = HeadlessBackend::new(64, 64).with_latency(0);
        let mut ring = FrameRing::new(&mut backend, 3, 4).unwrap();
        assert_eq!(ring.cursor(), 2);

        let slots: Vec<_> = (0..7).map(|_| run_frame(&mut ring, &mut backend)).collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.stall_stats().count, 0);
    }

    #[test]
    fn test_stall_average() {
        assert_eq!(StallStats::default().average(), Duration::ZERO);

        let mut stats = StallStats::default();
        stats.record(Duration::from_millis(500));
        stats.record(Duration::from_millis(1500));
        assert_eq!(stats.average(), Duration::from_secs(1));
        assert_eq!(stats.longest, Duration::from_millis(1500));
    }

    #[test]
    fn test_stall_average_beyond_u32_count() {
        let count = 1u64 << 32;
        let stats = StallStats {
            count,
            total: Duration::from_secs(count),
            longest: Duration::from_secs(1),
        };
        assert_eq!(stats.average(), Duration::from_secs(1));
    }

    #[test]
    fn test_reuse_waits_for_marker() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut ring = FrameRing::new(&mut backend, 2, 1).unwrap();

        run_frame(&mut ring, &mut backend);
        run_frame(&mut ring, &mut backend);
        assert!(backend.waits().is_empty());

        run_frame(&mut ring, &mut backend);
        assert_eq!(backend.waits(), vec![1]);
        assert_eq!(ring.stall_stats().count, 1);
    }

    #[test]
    fn test_no_wait_when_gpu_caught_up() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut ring = FrameRing::new(&mut backend, 2, 1).unwrap();

        run_frame(&mut ring, &mut backend);
        run_frame(&mut ring, &mut backend);
        backend.complete_up_to(1);
        run_frame(&mut ring, &mut backend);

        assert!(backend.waits().is_empty());
    }

    #[test]
    fn test_at_most_depth_in_flight() {
        for depth in 2..=4 {
            let mut backend = HeadlessBackend::new(64, 64);
            let mut ring = FrameRing::new(&mut backend, depth, 1).unwrap();
            for _ in 0..(depth * 5) {
                run_frame(&mut ring, &mut backend);
                let completed = backend.completed_value().unwrap();
                assert!(ring.in_flight(completed) <= depth);
            }
            assert!(backend.max_pending() <= depth as u64);
        }
    }

    #[test]
    fn test_markers_follow_timeline() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut ring = FrameRing::new(&mut backend, 3, 1).unwrap();
        for _ in 0..4 {
            run_frame(&mut ring, &mut backend);
        }
        let markers: Vec<_> = ring.slots().iter().map(FrameSlot::completion_marker).collect();
        assert_eq!(markers, vec![4, 2, 3]);
        assert_eq!(ring.last_stamped(), 4);
    }

    #[test]
    fn test_drain_waits_for_last_value() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut ring = FrameRing::new(&mut backend, 3, 1).unwrap();
        run_frame(&mut ring, &mut backend);
        run_frame(&mut ring, &mut backend);

        ring.drain(&backend).unwrap();
        assert_eq!(backend.waits(), vec![2]);
        assert_eq!(ring.in_flight(backend.completed_value().unwrap()), 0);
    }

    #[test]
    fn test_drain_of_unused_ring_does_not_wait() {
        let mut backend = HeadlessBackend::new(64, 64);
        let ring = FrameRing::new(&mut backend, 3, 1).unwrap();
        ring.drain(&backend).unwrap();
        assert!(backend.waits().is_empty());
    }

    #[test]
    fn test_device_lost_on_acquire() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mut ring = FrameRing::new(&mut backend, 2, 1).unwrap();
        run_frame(&mut ring, &mut backend);
        run_frame(&mut ring, &mut backend);
        backend.lose_device();

        let err = ring.acquire_next(&backend).unwrap_err();
        assert!(err.is_device_lost());
    }

    #[test]
    fn test_slots_own_separate_pools() {
        let mut backend = HeadlessBackend::new(64, 64);
        let ring = FrameRing::new(&mut backend, 3, 5).unwrap();
        let addresses: Vec<_> = ring.slots().iter().map(|s| s.objects().base_address()).collect();
        assert_eq!(ring.slot(1).objects().capacity(), 5);
        assert_eq!(ring.slot(1).pass().capacity(), 1);
        assert_ne!(addresses[0], addresses[1]);
        assert_ne!(addresses[1], addresses[2]);
    }
}
