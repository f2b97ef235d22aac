//! The GPU command boundary.
//!
//! The engine stages buffers and then invokes opaque commands; shader text,
//! texture objects and framebuffers live behind [`GpuBackend`].

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use glimmer_core::packing::pack_hit_index;
use glimmer_core::{AttributeLayout, GlimmerResult};

/// Uniforms for one hit-test dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitTestUniforms {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Count touching edges as hits.
    pub inclusive: bool,
    pub candidate_count: usize,
    pub capacity: usize,
}

/// Floats per hit-test candidate: swatch `u`, swatch `v`, index, active flag.
pub const HIT_TEST_INPUT_STRIDE: usize = 4;

/// Synchronous GPU commands consumed by the engine.
pub trait GpuBackend {
    /// Called once with the swatch geometry and the instance UV table.
    fn init(&mut self, _layout: &AttributeLayout, _instance_swatch_uvs: &[f32]) -> GlimmerResult<()> {
        Ok(())
    }

    fn draw(&mut self, instance_count: usize, elapsed_ms: f64) -> GlimmerResult<()>;

    /// Stage swatch UVs (two floats each) of the sprites to rebase.
    fn stage_rebase_inputs(&mut self, swatch_uvs: &[f32]) -> GlimmerResult<()>;

    fn run_rebase(&mut self, count: usize, elapsed_ms: f64) -> GlimmerResult<()>;

    /// Copy the rebase output into the "previous values" texture.
    fn copy_rebase_output_to_previous(&mut self) -> GlimmerResult<()>;

    /// Upload whole rows of the target-values texture.
    fn write_target_rows(&mut self, first_row: usize, row_count: usize, values: &[f32]) -> GlimmerResult<()>;

    fn stage_hit_test_inputs(&mut self, inputs: &[f32]) -> GlimmerResult<()>;

    fn run_hit_test(&mut self, uniforms: &HitTestUniforms) -> GlimmerResult<()>;

    /// Blocking readback of `count` RGBA8 texels.
    fn read_hit_test_output(&mut self, count: usize) -> GlimmerResult<Vec<u8>>;
}

/// Backend that accepts every command and reports no hits.
#[derive(Debug, Default)]
pub struct NullBackend;

impl GpuBackend for NullBackend {
    fn draw(&mut self, _instance_count: usize, _elapsed_ms: f64) -> GlimmerResult<()> {
        Ok(())
    }

    fn stage_rebase_inputs(&mut self, _swatch_uvs: &[f32]) -> GlimmerResult<()> {
        Ok(())
    }

    fn run_rebase(&mut self, _count: usize, _elapsed_ms: f64) -> GlimmerResult<()> {
        Ok(())
    }

    fn copy_rebase_output_to_previous(&mut self) -> GlimmerResult<()> {
        Ok(())
    }

    fn write_target_rows(&mut self, _first_row: usize, _row_count: usize, _values: &[f32]) -> GlimmerResult<()> {
        Ok(())
    }

    fn stage_hit_test_inputs(&mut self, _inputs: &[f32]) -> GlimmerResult<()> {
        Ok(())
    }

    fn run_hit_test(&mut self, _uniforms: &HitTestUniforms) -> GlimmerResult<()> {
        Ok(())
    }

    fn read_hit_test_output(&mut self, count: usize) -> GlimmerResult<Vec<u8>> {
        Ok(vec![0; count * 4])
    }
}

/// A command observed by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GpuCall {
    Init { capacity: usize },
    Draw { instance_count: usize, elapsed_ms: f64 },
    StageRebase { count: usize },
    RunRebase { count: usize, elapsed_ms: f64 },
    CopyRebaseOutput,
    WriteTargetRows { first_row: usize, row_count: usize, values: usize },
    StageHitTest { count: usize },
    RunHitTest(HitTestUniforms),
    ReadHitTest { count: usize },
}

/// Shared view of the calls a [`RecordingBackend`] has seen.
#[derive(Debug, Clone, Default)]
pub struct GpuLog(Rc<RefCell<Vec<GpuCall>>>);

impl GpuLog {
    pub fn calls(&self) -> Vec<GpuCall> {
        self.0.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.0.borrow().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, call: GpuCall) {
        self.0.borrow_mut().push(call);
    }
}

type HitResolver = Box<dyn Fn(&HitTestUniforms, [f32; HIT_TEST_INPUT_STRIDE]) -> bool>;

/// Headless backend that logs every command, for tests and simulation.
///
/// Hit tests are answered by a resolver that sees each staged candidate.
pub struct RecordingBackend {
    log: GpuLog,
    capacity: usize,
    hit_inputs: Vec<f32>,
    hit_output: Vec<u8>,
    resolver: HitResolver,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            log: GpuLog::default(),
            capacity: 0,
            hit_inputs: Vec::new(),
            hit_output: Vec::new(),
            resolver: Box::new(|_, _| false),
        }
    }

    /// Decide hits with `resolver`, called with the uniforms and one candidate's inputs.
    pub fn with_hit_resolver(
        mut self,
        resolver: impl Fn(&HitTestUniforms, [f32; HIT_TEST_INPUT_STRIDE]) -> bool + 'static,
    ) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn log(&self) -> GpuLog {
        self.log.clone()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for RecordingBackend {
    fn init(&mut self, layout: &AttributeLayout, _instance_swatch_uvs: &[f32]) -> GlimmerResult<()> {
        self.capacity = layout.capacity;
        self.log.push(GpuCall::Init {
            capacity: layout.capacity,
        });
        Ok(())
    }

    fn draw(&mut self, instance_count: usize, elapsed_ms: f64) -> GlimmerResult<()> {
        self.log.push(GpuCall::Draw {
            instance_count,
            elapsed_ms,
        });
        Ok(())
    }

    fn stage_rebase_inputs(&mut self, swatch_uvs: &[f32]) -> GlimmerResult<()> {
        self.log.push(GpuCall::StageRebase {
            count: swatch_uvs.len() / 2,
        });
        Ok(())
    }

    fn run_rebase(&mut self, count: usize, elapsed_ms: f64) -> GlimmerResult<()> {
        self.log.push(GpuCall::RunRebase { count, elapsed_ms });
        Ok(())
    }

    fn copy_rebase_output_to_previous(&mut self) -> GlimmerResult<()> {
        self.log.push(GpuCall::CopyRebaseOutput);
        Ok(())
    }

    fn write_target_rows(&mut self, first_row: usize, row_count: usize, values: &[f32]) -> GlimmerResult<()> {
        self.log.push(GpuCall::WriteTargetRows {
            first_row,
            row_count,
            values: values.len(),
        });
        Ok(())
    }

    fn stage_hit_test_inputs(&mut self, inputs: &[f32]) -> GlimmerResult<()> {
        self.hit_inputs = inputs.to_vec();
        self.log.push(GpuCall::StageHitTest {
            count: inputs.len() / HIT_TEST_INPUT_STRIDE,
        });
        Ok(())
    }

    fn run_hit_test(&mut self, uniforms: &HitTestUniforms) -> GlimmerResult<()> {
        self.hit_output.clear();
        for chunk in self.hit_inputs.chunks_exact(HIT_TEST_INPUT_STRIDE) {
            let candidate = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let hit = candidate[3] > 0.0 && (self.resolver)(uniforms, candidate);
            let index = if hit { f64::from(candidate[2]) } else { -1.0 };
            self.hit_output
                .extend_from_slice(&pack_hit_index(index, self.capacity));
        }
        self.log.push(GpuCall::RunHitTest(*uniforms));
        Ok(())
    }

    fn read_hit_test_output(&mut self, count: usize) -> GlimmerResult<Vec<u8>> {
        self.log.push(GpuCall::ReadHitTest { count });
        let mut output = self.hit_output.clone();
        output.resize(count * 4, 0);
        Ok(output)
    }
}
