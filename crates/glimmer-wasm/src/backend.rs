//! GPU commands forwarded to JavaScript functions.
//!
//! The page owns the WebGL context, shaders and textures; this backend only
//! hands it staged buffers.

use glimmer_core::{AttributeLayout, GlimmerError, GlimmerResult};
use glimmer_engine::{GpuBackend, HitTestUniforms};
use js_sys::{Float32Array, Function, Uint8Array, JSON};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

fn gpu_error(command: &str, err: JsValue) -> GlimmerError {
    GlimmerError::gpu(format!("{} command failed: {:?}", command, err))
}

// ─── Backend ────────────────────────────────────────────────────────

pub struct JsGpuBackend {
    /// `draw(instanceCount, elapsedMs)`
    draw: Function,
    /// `rebase(swatchUvs, count, elapsedMs)`, also copying its output into the
    /// previous-values texture.
    rebase: Function,
    /// `syncRows(firstRow, rowCount, values)`
    sync_rows: Function,
    /// `hitTest(inputs, uniforms) -> Uint8Array`
    hit_test: Function,
    rebase_inputs: Vec<f32>,
    hit_inputs: Vec<f32>,
    hit_output: Vec<u8>,
}

impl JsGpuBackend {
    pub fn new(draw: Function, rebase: Function, sync_rows: Function, hit_test: Function) -> Self {
        Self {
            draw,
            rebase,
            sync_rows,
            hit_test,
            rebase_inputs: Vec::new(),
            hit_inputs: Vec::new(),
            hit_output: Vec::new(),
        }
    }
}

impl GpuBackend for JsGpuBackend {
    fn init(&mut self, layout: &AttributeLayout, _instance_swatch_uvs: &[f32]) -> GlimmerResult<()> {
        web_sys::console::log_1(&JsValue::from_str(&format!(
            "glimmer: {} swatches in a {}x{} texture",
            layout.capacity, layout.texture_width, layout.texture_height
        )));
        Ok(())
    }

    fn draw(&mut self, instance_count: usize, elapsed_ms: f64) -> GlimmerResult<()> {
        self.draw
            .call2(
                &JsValue::NULL,
                &JsValue::from(instance_count as u32),
                &JsValue::from(elapsed_ms),
            )
            .map_err(|err| gpu_error("draw", err))?;
        Ok(())
    }

    fn stage_rebase_inputs(&mut self, swatch_uvs: &[f32]) -> GlimmerResult<()> {
        self.rebase_inputs = swatch_uvs.to_vec();
        Ok(())
    }

    fn run_rebase(&mut self, count: usize, elapsed_ms: f64) -> GlimmerResult<()> {
        let uvs = Float32Array::from(self.rebase_inputs.as_slice());
        self.rebase
            .call3(
                &JsValue::NULL,
                &uvs,
                &JsValue::from(count as u32),
                &JsValue::from(elapsed_ms),
            )
            .map_err(|err| gpu_error("rebase", err))?;
        Ok(())
    }

    fn copy_rebase_output_to_previous(&mut self) -> GlimmerResult<()> {
        // Done by the page's rebase function.
        Ok(())
    }

    fn write_target_rows(&mut self, first_row: usize, row_count: usize, values: &[f32]) -> GlimmerResult<()> {
        self.sync_rows
            .call3(
                &JsValue::NULL,
                &JsValue::from(first_row as u32),
                &JsValue::from(row_count as u32),
                &Float32Array::from(values),
            )
            .map_err(|err| gpu_error("syncRows", err))?;
        Ok(())
    }

    fn stage_hit_test_inputs(&mut self, inputs: &[f32]) -> GlimmerResult<()> {
        self.hit_inputs = inputs.to_vec();
        Ok(())
    }

    fn run_hit_test(&mut self, uniforms: &HitTestUniforms) -> GlimmerResult<()> {
        let uniforms = serde_json::to_string(uniforms)?;
        let uniforms = JSON::parse(&uniforms).map_err(|err| gpu_error("hitTest", err))?;
        let output = self
            .hit_test
            .call2(
                &JsValue::NULL,
                &Float32Array::from(self.hit_inputs.as_slice()),
                &uniforms,
            )
            .map_err(|err| gpu_error("hitTest", err))?;
        let output: Uint8Array = output
            .dyn_into()
            .map_err(|err| gpu_error("hitTest", err))?;
        self.hit_output = output.to_vec();
        Ok(())
    }

    fn read_hit_test_output(&mut self, count: usize) -> GlimmerResult<Vec<u8>> {
        Ok(self.hit_output.iter().copied().take(count * 4).collect())
    }
}
