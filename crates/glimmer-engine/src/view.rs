//! Typed access to one sprite's swatch inside the shared target buffer.

use glimmer_core::attributes::check_finite;
use glimmer_core::{Attribute, ColorInput, GlimmerError, GlimmerResult, Vec2Input};

/// Link from a sprite to its swatch, valid while the swatch generation matches.
///
/// Removing a sprite bumps its swatch's generation, so a stale link is caught
/// on the next access instead of silently writing into a reused swatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwatchView {
    pub index: usize,
    pub generation: u32,
}

/// Mutable window onto a single swatch, handed to sprite callbacks.
#[derive(Debug)]
pub struct SpriteView<'a> {
    index: usize,
    values: &'a mut [f32],
}

impl<'a> SpriteView<'a> {
    pub(crate) fn new(index: usize, values: &'a mut [f32]) -> Self {
        Self { index, values }
    }

    /// Swatch index backing this view.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, attribute: Attribute) -> &[f32] {
        let offset = attribute.offset();
        &self.values[offset..offset + attribute.components()]
    }

    /// Write every component of `attribute`. Values must be finite and match
    /// the attribute's component count.
    pub fn set(&mut self, attribute: Attribute, values: &[f32]) -> GlimmerResult<()> {
        if values.len() != attribute.components() {
            return Err(GlimmerError::invalid_argument(format!(
                "{} takes {} components, got {}",
                attribute.name(),
                attribute.components(),
                values.len()
            )));
        }
        check_finite(attribute, values)?;
        let offset = attribute.offset();
        self.values[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn set_scalar(&mut self, attribute: Attribute, value: f32) -> GlimmerResult<()> {
        self.set(attribute, &[value])
    }

    fn set_vec2(&mut self, attribute: Attribute, value: Vec2Input) -> GlimmerResult<()> {
        let values = value.resolve(attribute)?;
        self.set(attribute, &values)
    }

    fn set_color(&mut self, attribute: Attribute, value: ColorInput) -> GlimmerResult<()> {
        let values = value.resolve(attribute)?;
        self.set(attribute, &values)
    }

    /// Transition duration while a callback runs; absolute arrival time after.
    pub fn transition_time_ms(&self) -> f32 {
        self.get(Attribute::TransitionTimeMs)[0]
    }

    pub fn set_transition_time_ms(&mut self, ms: f32) -> GlimmerResult<()> {
        if ms < 0.0 {
            return Err(GlimmerError::invalid_argument(format!(
                "TransitionTimeMs must not be negative, got {}",
                ms
            )));
        }
        self.set_scalar(Attribute::TransitionTimeMs, ms)
    }

    pub fn set_position_world(&mut self, value: impl Into<Vec2Input>) -> GlimmerResult<()> {
        self.set_vec2(Attribute::PositionWorld, value.into())
    }

    pub fn set_size_world(&mut self, value: impl Into<Vec2Input>) -> GlimmerResult<()> {
        self.set_vec2(Attribute::SizeWorld, value.into())
    }

    pub fn set_geometric_zoom(&mut self, value: impl Into<Vec2Input>) -> GlimmerResult<()> {
        self.set_vec2(Attribute::GeometricZoom, value.into())
    }

    pub fn set_position_pixel(&mut self, value: impl Into<Vec2Input>) -> GlimmerResult<()> {
        self.set_vec2(Attribute::PositionPixel, value.into())
    }

    pub fn set_size_pixel(&mut self, value: impl Into<Vec2Input>) -> GlimmerResult<()> {
        self.set_vec2(Attribute::SizePixel, value.into())
    }

    pub fn set_max_size_pixel(&mut self, value: f32) -> GlimmerResult<()> {
        self.set_scalar(Attribute::MaxSizePixel, value)
    }

    pub fn set_min_size_pixel(&mut self, value: f32) -> GlimmerResult<()> {
        self.set_scalar(Attribute::MinSizePixel, value)
    }

    pub fn set_order(&mut self, value: f32) -> GlimmerResult<()> {
        self.set_scalar(Attribute::Order, value)
    }

    pub fn set_shape(&mut self, value: f32) -> GlimmerResult<()> {
        self.set_scalar(Attribute::Shape, value)
    }

    pub fn set_border_radius_pixel(&mut self, value: f32) -> GlimmerResult<()> {
        self.set_scalar(Attribute::BorderRadiusPixel, value)
    }

    pub fn set_border_placement(&mut self, value: f32) -> GlimmerResult<()> {
        self.set_scalar(Attribute::BorderPlacement, value)
    }

    pub fn set_border_color(&mut self, value: impl Into<ColorInput>) -> GlimmerResult<()> {
        self.set_color(Attribute::BorderColor, value.into())
    }

    pub fn set_fill_blend(&mut self, value: f32) -> GlimmerResult<()> {
        self.set_scalar(Attribute::FillBlend, value)
    }

    pub fn set_fill_color(&mut self, value: impl Into<ColorInput>) -> GlimmerResult<()> {
        self.set_color(Attribute::FillColor, value.into())
    }

    /// Texture atlas rectangle as `[u, v, width, height]`.
    pub fn set_fill_texture(&mut self, value: [f32; 4]) -> GlimmerResult<()> {
        self.set(Attribute::FillTexture, &value)
    }

    /// The raw swatch, including trailing padding.
    pub fn values(&self) -> &[f32] {
        self.values
    }

    /// Overwrite the whole swatch from `values`, e.g. after a host edited a copy.
    pub fn copy_from(&mut self, values: &[f32]) -> GlimmerResult<()> {
        if values.len() != self.values.len() {
            return Err(GlimmerError::invalid_argument(format!(
                "swatch holds {} values, got {}",
                self.values.len(),
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GlimmerError::invalid_argument(
                "swatch values must be finite",
            ));
        }
        self.values.copy_from_slice(values);
        Ok(())
    }
}
