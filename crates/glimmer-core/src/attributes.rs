use serde::{Deserialize, Serialize};

use crate::error::{GlimmerError, GlimmerResult};

/// Per-sprite attributes stored in a swatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Absolute arrival time of the current transition, in scene milliseconds.
    TransitionTimeMs,
    PositionWorld,
    SizeWorld,
    GeometricZoom,
    PositionPixel,
    SizePixel,
    MaxSizePixel,
    MinSizePixel,
    Order,
    Shape,
    BorderRadiusPixel,
    BorderPlacement,
    BorderColor,
    FillBlend,
    FillColor,
    FillTexture,
}

impl Attribute {
    pub const ALL: [Attribute; 16] = [
        Attribute::TransitionTimeMs,
        Attribute::PositionWorld,
        Attribute::SizeWorld,
        Attribute::GeometricZoom,
        Attribute::PositionPixel,
        Attribute::SizePixel,
        Attribute::MaxSizePixel,
        Attribute::MinSizePixel,
        Attribute::Order,
        Attribute::Shape,
        Attribute::BorderRadiusPixel,
        Attribute::BorderPlacement,
        Attribute::BorderColor,
        Attribute::FillBlend,
        Attribute::FillColor,
        Attribute::FillTexture,
    ];

    pub fn components(self) -> usize {
        match self {
            Attribute::TransitionTimeMs
            | Attribute::MaxSizePixel
            | Attribute::MinSizePixel
            | Attribute::Order
            | Attribute::Shape
            | Attribute::BorderRadiusPixel
            | Attribute::BorderPlacement
            | Attribute::FillBlend => 1,
            Attribute::PositionWorld
            | Attribute::SizeWorld
            | Attribute::GeometricZoom
            | Attribute::PositionPixel
            | Attribute::SizePixel => 2,
            Attribute::BorderColor | Attribute::FillColor | Attribute::FillTexture => 4,
        }
    }

    /// Offset of this attribute's first component within a swatch.
    pub fn offset(self) -> usize {
        Attribute::ALL
            .iter()
            .take_while(|a| **a != self)
            .map(|a| a.components())
            .sum()
    }

    /// Whether the GPU interpolates this attribute between previous and target.
    pub fn is_interpolable(self) -> bool {
        !matches!(
            self,
            Attribute::TransitionTimeMs | Attribute::Shape | Attribute::FillTexture
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Attribute::TransitionTimeMs => "TransitionTimeMs",
            Attribute::PositionWorld => "PositionWorld",
            Attribute::SizeWorld => "SizeWorld",
            Attribute::GeometricZoom => "GeometricZoom",
            Attribute::PositionPixel => "PositionPixel",
            Attribute::SizePixel => "SizePixel",
            Attribute::MaxSizePixel => "MaxSizePixel",
            Attribute::MinSizePixel => "MinSizePixel",
            Attribute::Order => "Order",
            Attribute::Shape => "Shape",
            Attribute::BorderRadiusPixel => "BorderRadiusPixel",
            Attribute::BorderPlacement => "BorderPlacement",
            Attribute::BorderColor => "BorderColor",
            Attribute::FillBlend => "FillBlend",
            Attribute::FillColor => "FillColor",
            Attribute::FillTexture => "FillTexture",
        }
    }
}

/// Total scalar components across every attribute.
pub fn total_components() -> usize {
    Attribute::ALL.iter().map(|a| a.components()).sum()
}

/// Texture geometry for the swatch buffers.
///
/// Swatches are laid out row-major; a row holds `swatches_per_row` swatches of
/// `texels_per_swatch` RGBA texels, and the texture is exactly that wide, so the
/// CPU buffer for row `r` is one contiguous slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeLayout {
    pub values_per_swatch: usize,
    pub texels_per_swatch: usize,
    pub swatches_per_row: usize,
    pub texture_width: usize,
    pub texture_height: usize,
    /// Number of swatches actually available.
    pub capacity: usize,
}

impl AttributeLayout {
    pub fn new(desired_capacity: usize, max_texture_size: usize) -> GlimmerResult<Self> {
        let texels_per_swatch = total_components().div_ceil(4);
        let values_per_swatch = texels_per_swatch * 4;
        if desired_capacity == 0 {
            return Err(GlimmerError::Config("sprite capacity must be positive".into()));
        }
        if texels_per_swatch > max_texture_size {
            return Err(GlimmerError::Config(format!(
                "a swatch needs {} texels but max texture size is {}",
                texels_per_swatch, max_texture_size
            )));
        }

        let swatches_per_row = (max_texture_size / texels_per_swatch).min(desired_capacity);
        let texture_width = swatches_per_row * texels_per_swatch;
        let texture_height = desired_capacity
            .div_ceil(swatches_per_row)
            .min(max_texture_size);
        let capacity = desired_capacity.min(swatches_per_row * texture_height);

        Ok(Self {
            values_per_swatch,
            texels_per_swatch,
            swatches_per_row,
            texture_width,
            texture_height,
            capacity,
        })
    }

    /// Floats in one texture row.
    pub fn values_per_row(&self) -> usize {
        self.swatches_per_row * self.values_per_swatch
    }

    /// Length of the CPU-side buffer mirroring the target texture.
    pub fn buffer_len(&self) -> usize {
        self.values_per_row() * self.texture_height
    }

    pub fn row_of(&self, index: usize) -> usize {
        index / self.swatches_per_row
    }

    /// Texel coordinates of the first texel of swatch `index`.
    pub fn swatch_uv(&self, index: usize) -> [f32; 2] {
        let column = index % self.swatches_per_row;
        let row = index / self.swatches_per_row;
        [(column * self.texels_per_swatch) as f32, row as f32]
    }

    /// The instance UV table: two floats per swatch, for every swatch.
    pub fn instance_swatch_uvs(&self) -> Vec<f32> {
        let mut uvs = Vec::with_capacity(self.capacity * 2);
        for index in 0..self.capacity {
            uvs.extend_from_slice(&self.swatch_uv(index));
        }
        uvs
    }
}

/// A two-component input: either one value for both components or a pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Vec2Input {
    Uniform(f32),
    Pair(f32, f32),
}

impl Vec2Input {
    pub fn resolve(self, attribute: Attribute) -> GlimmerResult<[f32; 2]> {
        let values = match self {
            Vec2Input::Uniform(v) => [v, v],
            Vec2Input::Pair(x, y) => [x, y],
        };
        check_finite(attribute, &values)?;
        Ok(values)
    }
}

impl From<f32> for Vec2Input {
    fn from(value: f32) -> Self {
        Vec2Input::Uniform(value)
    }
}

impl From<[f32; 2]> for Vec2Input {
    fn from(value: [f32; 2]) -> Self {
        Vec2Input::Pair(value[0], value[1])
    }
}

impl From<(f32, f32)> for Vec2Input {
    fn from(value: (f32, f32)) -> Self {
        Vec2Input::Pair(value.0, value.1)
    }
}

/// A color input in 0-255 channel space; RGB inputs get an opaque alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorInput {
    Rgb(f32, f32, f32),
    Rgba(f32, f32, f32, f32),
}

impl ColorInput {
    pub fn resolve(self, attribute: Attribute) -> GlimmerResult<[f32; 4]> {
        let values = match self {
            ColorInput::Rgb(r, g, b) => [r, g, b, 1.0],
            ColorInput::Rgba(r, g, b, a) => [r, g, b, a],
        };
        check_finite(attribute, &values)?;
        if values[..3].iter().any(|c| !(0.0..=255.0).contains(c)) {
            return Err(GlimmerError::invalid_argument(format!(
                "{} channels must be within 0..=255",
                attribute.name()
            )));
        }
        if !(0.0..=1.0).contains(&values[3]) {
            return Err(GlimmerError::invalid_argument(format!(
                "{} alpha must be within 0..=1",
                attribute.name()
            )));
        }
        Ok(values)
    }
}

impl From<[f32; 3]> for ColorInput {
    fn from(value: [f32; 3]) -> Self {
        ColorInput::Rgb(value[0], value[1], value[2])
    }
}

impl From<[f32; 4]> for ColorInput {
    fn from(value: [f32; 4]) -> Self {
        ColorInput::Rgba(value[0], value[1], value[2], value[3])
    }
}

/// Reject NaN and infinite values for `attribute`.
pub fn check_finite(attribute: Attribute, values: &[f32]) -> GlimmerResult<()> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(GlimmerError::invalid_argument(format!(
            "{} must be finite, got {}",
            attribute.name(),
            bad
        )));
    }
    Ok(())
}
