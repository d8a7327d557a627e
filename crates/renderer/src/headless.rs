//! A simulated GPU for tests and offscreen benchmarking.
//!
//! Constant buffers live in host memory, submissions are kept as command
//! logs, and the timeline only advances when the caller completes work or
//! the engine waits on it.

use std::cell::{Cell, RefCell};

use bytemuck::Pod;
use shapes_rhi::{RhiError, RhiResult};
use tracing::{debug, trace};

use crate::backend::{
    ConstantStorage, DrawArgs, FrameTarget, GpuTimeline, PipelineVariant, PresentStatus,
    RenderBackend,
};
use crate::constant_pool::{MIN_CONSTANT_ALIGNMENT, align_up};
use crate::geometry::GeometryStore;

/// First fake GPU address handed out.
const BASE_ADDRESS: u64 = 0x1_0000;

/// Host memory standing in for a mapped uniform buffer.
#[derive(Clone, Debug)]
pub struct HostBuffer {
    address: u64,
    bytes: Vec<u8>,
}

impl HostBuffer {
    /// Zero-filled buffer of `size` bytes at fake address `address`.
    pub fn new(address: u64, size: u64) -> Self {
        Self {
            address,
            bytes: vec![0; size as usize],
        }
    }

    /// Reads a `T` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the read runs past the end of the buffer.
    pub fn read<T: Pod>(&self, offset: u64) -> T {
        let start = offset as usize;
        let end = start + std::mem::size_of::<T>();
        bytemuck::pod_read_unaligned(&self.bytes[start..end])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ConstantStorage for HostBuffer {
    fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> RhiResult<()> {
        let start = offset as usize;
        let end = start + bytes.len();
        let buffer_len = self.bytes.len();
        let target = self.bytes.get_mut(start..end).ok_or_else(|| {
            RhiError::BufferError(format!(
                "write of {} bytes at offset {offset} exceeds buffer size {}",
                bytes.len(),
                buffer_len
            ))
        })?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    fn gpu_address(&self) -> u64 {
        self.address
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A command recorded into a [`HeadlessScope`].
#[derive(Clone, Debug, PartialEq)]
pub enum HeadlessCommand {
    Begin { pipeline: PipelineVariant },
    BindPass { descriptor: usize },
    BindGeometry,
    Draw { descriptor: usize, args: DrawArgs },
}

/// Per-slot recording state.
#[derive(Debug)]
pub struct HeadlessScope {
    slot: usize,
    commands: Vec<HeadlessCommand>,
}

impl HeadlessScope {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Commands recorded since the last `begin_frame`.
    pub fn commands(&self) -> &[HeadlessCommand] {
        &self.commands
    }
}

/// One submitted frame.
#[derive(Clone, Debug)]
pub struct Submission {
    pub slot: usize,
    pub signal_value: u64,
    pub commands: Vec<HeadlessCommand>,
}

impl Submission {
    /// Descriptor entries of every draw, in order.
    pub fn draw_descriptors(&self) -> Vec<usize> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                HeadlessCommand::Draw { descriptor, .. } => Some(*descriptor),
                _ => None,
            })
            .collect()
    }

    pub fn pipeline(&self) -> Option<PipelineVariant> {
        self.commands.iter().find_map(|command| match command {
            HeadlessCommand::Begin { pipeline } => Some(*pipeline),
            _ => None,
        })
    }
}

/// Where a descriptor table entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorEntry {
    pub address: u64,
    pub offset: u64,
    pub size: u64,
}

/// Simulated device.
///
/// By default submitted work never completes on its own. Tests advance the
/// timeline with [`complete_up_to`](Self::complete_up_to) or let the engine
/// retire work by waiting on it. [`with_latency`](Self::with_latency) makes
/// work complete automatically a fixed number of submissions later.
#[derive(Debug)]
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    alignment: u64,
    latency: Option<u64>,
    next_address: u64,
    completed: Cell<u64>,
    submitted: u64,
    max_pending: u64,
    waits: RefCell<Vec<u64>>,
    device_lost: bool,
    outdated_frames: usize,
    descriptors: Vec<Option<DescriptorEntry>>,
    geometry: Option<(usize, usize)>,
    submissions: Vec<Submission>,
    presents: usize,
    resizes: Vec<(u32, u32)>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            alignment: MIN_CONSTANT_ALIGNMENT,
            latency: None,
            next_address: BASE_ADDRESS,
            completed: Cell::new(0),
            submitted: 0,
            max_pending: 0,
            waits: RefCell::new(Vec::new()),
            device_lost: false,
            outdated_frames: 0,
            descriptors: Vec::new(),
            geometry: None,
            submissions: Vec::new(),
            presents: 0,
            resizes: Vec::new(),
        }
    }

    /// Reports `alignment` as the device's constant offset alignment.
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Completes each submission once `frames` newer ones have been made.
    pub fn with_latency(mut self, frames: u64) -> Self {
        self.latency = Some(frames);
        self
    }

    /// Marks all work up to `value` as finished. Values past the last
    /// submission are clamped.
    pub fn complete_up_to(&self, value: u64) {
        let value = value.min(self.submitted);
        if value > self.completed.get() {
            self.completed.set(value);
        }
    }

    pub fn complete_all(&self) {
        self.completed.set(self.submitted);
    }

    /// Every later device call fails with [`RhiError::DeviceLost`].
    pub fn lose_device(&mut self) {
        debug!("Headless device lost");
        self.device_lost = true;
    }

    /// The next `frames` calls to `begin_frame` report an outdated surface.
    pub fn report_outdated(&mut self, frames: usize) {
        self.outdated_frames = frames;
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// Values the engine blocked on, in order.
    pub fn waits(&self) -> Vec<u64> {
        self.waits.borrow().clone()
    }

    pub fn last_submitted(&self) -> u64 {
        self.submitted
    }

    /// Submissions the simulated GPU has not finished.
    pub fn pending(&self) -> u64 {
        self.submitted - self.completed.get()
    }

    /// Largest number of unfinished submissions ever observed.
    pub fn max_pending(&self) -> u64 {
        self.max_pending
    }

    pub fn descriptor(&self, offset: usize) -> Option<DescriptorEntry> {
        self.descriptors.get(offset).copied().flatten()
    }

    pub fn descriptor_table_size(&self) -> usize {
        self.descriptors.len()
    }

    /// `(vertex count, index count)` of the uploaded geometry.
    pub fn uploaded_geometry(&self) -> Option<(usize, usize)> {
        self.geometry
    }

    pub fn presents(&self) -> usize {
        self.presents
    }

    pub fn resizes(&self) -> &[(u32, u32)] {
        &self.resizes
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn check_device(&self) -> RhiResult<()> {
        if self.device_lost {
            Err(RhiError::DeviceLost)
        } else {
            Ok(())
        }
    }
}

impl GpuTimeline for HeadlessBackend {
    fn completed_value(&self) -> RhiResult<u64> {
        self.check_device()?;
        Ok(self.completed.get())
    }

    fn wait_for_value(&self, value: u64) -> RhiResult<()> {
        self.check_device()?;
        if value > self.submitted {
            return Err(RhiError::Timeline(format!(
                "waiting for {value}, but only {} was ever submitted",
                self.submitted
            )));
        }
        self.waits.borrow_mut().push(value);
        self.complete_up_to(value);
        Ok(())
    }
}

impl RenderBackend for HeadlessBackend {
    type ConstantBuffer = HostBuffer;
    type CommandScope = HeadlessScope;

    fn constant_alignment(&self) -> u64 {
        self.alignment
    }

    fn create_constant_buffer(&mut self, size: u64) -> RhiResult<HostBuffer> {
        self.check_device()?;
        let buffer = HostBuffer::new(self.next_address, size);
        self.next_address += align_up(size.max(1), MIN_CONSTANT_ALIGNMENT);
        trace!("Headless constant buffer: {size} bytes at {:#x}", buffer.address);
        Ok(buffer)
    }

    fn create_command_scope(&mut self, slot: usize) -> RhiResult<HeadlessScope> {
        self.check_device()?;
        Ok(HeadlessScope {
            slot,
            commands: Vec::new(),
        })
    }

    fn upload_geometry(&mut self, geometry: &GeometryStore) -> RhiResult<()> {
        self.check_device()?;
        self.geometry = Some((geometry.vertices().len(), geometry.indices().len()));
        Ok(())
    }

    fn create_descriptor_table(&mut self, size: usize) -> RhiResult<()> {
        self.check_device()?;
        self.descriptors = vec![None; size];
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        offset: usize,
        buffer: &HostBuffer,
        byte_offset: u64,
        byte_size: u64,
    ) -> RhiResult<()> {
        self.check_device()?;
        if byte_offset + byte_size > buffer.size() {
            return Err(RhiError::BufferError(format!(
                "descriptor range {byte_offset}+{byte_size} exceeds buffer size {}",
                buffer.size()
            )));
        }
        let table_size = self.descriptors.len();
        let entry = self
            .descriptors
            .get_mut(offset)
            .unwrap_or_else(|| panic!("descriptor {offset} out of range for table of {table_size}"));
        *entry = Some(DescriptorEntry {
            address: buffer.gpu_address(),
            offset: byte_offset,
            size: byte_size,
        });
        Ok(())
    }

    fn begin_frame(
        &mut self,
        scope: &mut HeadlessScope,
        pipeline: PipelineVariant,
    ) -> RhiResult<FrameTarget> {
        self.check_device()?;
        scope.commands.clear();
        if self.outdated_frames > 0 {
            self.outdated_frames -= 1;
            return Ok(FrameTarget::Outdated);
        }
        scope.commands.push(HeadlessCommand::Begin { pipeline });
        Ok(FrameTarget::Ready)
    }

    fn bind_pass(&mut self, scope: &mut HeadlessScope, descriptor: usize) {
        assert!(
            self.descriptor(descriptor).is_some(),
            "pass descriptor {descriptor} was never written"
        );
        scope.commands.push(HeadlessCommand::BindPass { descriptor });
    }

    fn bind_geometry(&mut self, scope: &mut HeadlessScope) {
        assert!(self.geometry.is_some(), "geometry was never uploaded");
        scope.commands.push(HeadlessCommand::BindGeometry);
    }

    fn draw(&mut self, scope: &mut HeadlessScope, descriptor: usize, args: &DrawArgs) {
        assert!(
            self.descriptor(descriptor).is_some(),
            "object descriptor {descriptor} was never written"
        );
        scope.commands.push(HeadlessCommand::Draw {
            descriptor,
            args: *args,
        });
    }

    fn submit(&mut self, scope: &mut HeadlessScope, signal_value: u64) -> RhiResult<()> {
        self.check_device()?;
        if signal_value <= self.submitted {
            return Err(RhiError::Timeline(format!(
                "signal value {signal_value} does not advance past {}",
                self.submitted
            )));
        }
        self.submitted = signal_value;
        self.submissions.push(Submission {
            slot: scope.slot,
            signal_value,
            commands: std::mem::take(&mut scope.commands),
        });
        if let Some(latency) = self.latency {
            self.complete_up_to(signal_value.saturating_sub(latency));
        }
        self.max_pending = self.max_pending.max(self.pending());
        Ok(())
    }

    fn present(&mut self, _scope: &mut HeadlessScope) -> RhiResult<PresentStatus> {
        self.check_device()?;
        self.presents += 1;
        Ok(PresentStatus::Presented)
    }

    fn resize(&mut self, width: u32, height: u32) -> RhiResult<()> {
        self.check_device()?;
        self.width = width;
        self.height = height;
        self.resizes.push((width, height));
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.check_device()?;
        self.complete_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit_frame(backend: &mut HeadlessBackend, value: u64) {
        let mut scope = backend.create_command_scope(0).unwrap();
        backend
            .begin_frame(&mut scope, PipelineVariant::Opaque)
            .unwrap();
        backend.submit(&mut scope, value).unwrap();
    }

    #[test]
    fn test_host_buffer_write_and_read() {
        let mut buffer = HostBuffer::new(0x40, 16);
        buffer.write_bytes(4, bytemuck::bytes_of(&7u32)).unwrap();
        assert_eq!(buffer.read::<u32>(4), 7);
        assert_eq!(buffer.gpu_address(), 0x40);
    }

    #[test]
    fn test_host_buffer_rejects_overflow() {
        let mut buffer = HostBuffer::new(0, 8);
        let err = buffer.write_bytes(4, &[0; 8]).unwrap_err();
        assert!(matches!(err, RhiError::BufferError(_)));
    }

    #[test]
    fn test_timeline_only_advances_on_request() {
        let mut backend = HeadlessBackend::new(800, 600);
        submit_frame(&mut backend, 1);
        submit_frame(&mut backend, 2);
        assert_eq!(backend.completed_value().unwrap(), 0);
        assert_eq!(backend.pending(), 2);

        backend.complete_up_to(1);
        assert_eq!(backend.completed_value().unwrap(), 1);

        backend.complete_up_to(10);
        assert_eq!(backend.completed_value().unwrap(), 2);
    }

    #[test]
    fn test_wait_retires_work_and_is_recorded() {
        let mut backend = HeadlessBackend::new(800, 600);
        submit_frame(&mut backend, 1);
        submit_frame(&mut backend, 2);
        backend.wait_for_value(1).unwrap();

        assert_eq!(backend.completed_value().unwrap(), 1);
        assert_eq!(backend.waits(), vec![1]);
    }

    #[test]
    fn test_wait_for_unsubmitted_value_fails() {
        let backend = HeadlessBackend::new(800, 600);
        let err = backend.wait_for_value(1).unwrap_err();
        assert!(matches!(err, RhiError::Timeline(_)));
    }

    #[test]
    fn test_signal_values_must_increase() {
        let mut backend = HeadlessBackend::new(800, 600);
        submit_frame(&mut backend, 3);
        let mut scope = backend.create_command_scope(1).unwrap();
        let err = backend.submit(&mut scope, 3).unwrap_err();
        assert!(matches!(err, RhiError::Timeline(_)));
    }

    #[test]
    fn test_latency_completes_older_work() {
        let mut backend = HeadlessBackend::new(800, 600).with_latency(1);
        for value in 1..=4 {
            submit_frame(&mut backend, value);
        }
        assert_eq!(backend.completed_value().unwrap(), 3);
        assert_eq!(backend.max_pending(), 1);
    }

    #[test]
    fn test_lost_device_fails_everything() {
        let mut backend = HeadlessBackend::new(800, 600);
        backend.lose_device();
        assert!(backend.completed_value().unwrap_err().is_device_lost());
        assert!(backend.wait_for_value(0).unwrap_err().is_device_lost());
        assert!(backend.create_constant_buffer(256).unwrap_err().is_device_lost());
    }

    #[test]
    fn test_outdated_frames_are_reported_once_each() {
        let mut backend = HeadlessBackend::new(800, 600);
        backend.report_outdated(1);
        let mut scope = backend.create_command_scope(0).unwrap();
        assert_eq!(
            backend.begin_frame(&mut scope, PipelineVariant::Opaque).unwrap(),
            FrameTarget::Outdated
        );
        assert_eq!(
            backend.begin_frame(&mut scope, PipelineVariant::Wireframe).unwrap(),
            FrameTarget::Ready
        );
        assert_eq!(
            scope.commands(),
            &[HeadlessCommand::Begin {
                pipeline: PipelineVariant::Wireframe
            }]
        );
    }

    #[test]
    fn test_descriptor_entries() {
        let mut backend = HeadlessBackend::new(800, 600);
        let buffer = backend.create_constant_buffer(1024).unwrap();
        backend.create_descriptor_table(4).unwrap();
        backend.write_descriptor(2, &buffer, 512, 64).unwrap();

        assert_eq!(
            backend.descriptor(2),
            Some(DescriptorEntry {
                address: buffer.gpu_address(),
                offset: 512,
                size: 64
            })
        );
        assert_eq!(backend.descriptor(0), None);
    }

    #[test]
    fn test_buffers_get_distinct_addresses() {
        let mut backend = HeadlessBackend::new(800, 600);
        let a = backend.create_constant_buffer(300).unwrap();
        let b = backend.create_constant_buffer(300).unwrap();
        assert!(b.gpu_address() >= a.gpu_address() + 300);
    }
}
