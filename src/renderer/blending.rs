// renderer/blending.rs
use glam::Vec4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcColor = 2,
    OneMinusSrcColor = 3,
    SrcAlpha = 4,
    OneMinusSrcAlpha = 5,
    DstAlpha = 6,
    OneMinusDstAlpha = 7,
    DstColor = 8,
    OneMinusDstColor = 9,
    SrcAlphaSaturate = 10,
    ConstantColor = 11,
    OneMinusConstantColor = 12,
    ConstantAlpha = 13,
    OneMinusConstantAlpha = 14,
}

const BLEND_FACTORS: [BlendFactor; 15] = [
    BlendFactor::Zero,
    BlendFactor::One,
    BlendFactor::SrcColor,
    BlendFactor::OneMinusSrcColor,
    BlendFactor::SrcAlpha,
    BlendFactor::OneMinusSrcAlpha,
    BlendFactor::DstAlpha,
    BlendFactor::OneMinusDstAlpha,
    BlendFactor::DstColor,
    BlendFactor::OneMinusDstColor,
    BlendFactor::SrcAlphaSaturate,
    BlendFactor::ConstantColor,
    BlendFactor::OneMinusConstantColor,
    BlendFactor::ConstantAlpha,
    BlendFactor::OneMinusConstantAlpha,
];

/// Blend equation. Everything from `Multiply` on is an "advanced" equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
    Multiply = 5,
    Screen = 6,
    Overlay = 7,
    Darken = 8,
    Lighten = 9,
    ColorDodge = 10,
    ColorBurn = 11,
    HardLight = 12,
    SoftLight = 13,
    Difference = 14,
    Exclusion = 15,
    Hue = 16,
    Saturation = 17,
    Color = 18,
    Luminosity = 19,
}

const BLEND_EQUATIONS: [BlendEquation; 20] = [
    BlendEquation::Add,
    BlendEquation::Subtract,
    BlendEquation::ReverseSubtract,
    BlendEquation::Min,
    BlendEquation::Max,
    BlendEquation::Multiply,
    BlendEquation::Screen,
    BlendEquation::Overlay,
    BlendEquation::Darken,
    BlendEquation::Lighten,
    BlendEquation::ColorDodge,
    BlendEquation::ColorBurn,
    BlendEquation::HardLight,
    BlendEquation::SoftLight,
    BlendEquation::Difference,
    BlendEquation::Exclusion,
    BlendEquation::Hue,
    BlendEquation::Saturation,
    BlendEquation::Color,
    BlendEquation::Luminosity,
];

impl BlendEquation {
    pub const fn is_advanced(self) -> bool {
        self as u32 >= BlendEquation::Multiply as u32
    }
}

/// How a renderer decides whether to blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    Off,
    #[default]
    Auto,
    On,
    /// Blend only according to the actor's opacity.
    UseActorOpacity,
}

const FACTOR_BITS: u32 = 4;
const FACTOR_MASK: u32 = (1 << FACTOR_BITS) - 1;
const EQUATION_BITS: u32 = 5;
const EQUATION_MASK: u32 = (1 << EQUATION_BITS) - 1;

const SRC_RGB_SHIFT: u32 = 0;
const DST_RGB_SHIFT: u32 = 4;
const SRC_ALPHA_SHIFT: u32 = 8;
const DST_ALPHA_SHIFT: u32 = 12;
const EQUATION_RGB_SHIFT: u32 = 16;
const EQUATION_ALPHA_SHIFT: u32 = 21;

/// Blend factors and equations packed into a single bitmask, plus an
/// optional constant blend colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendingOptions {
    bitmask: u32,
    blend_color: Option<Vec4>,
}

impl Default for BlendingOptions {
    fn default() -> Self {
        let mut options = Self {
            bitmask: 0,
            blend_color: None,
        };
        options.set_blend_func(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::OneMinusSrcAlpha,
        );
        options.set_blend_equation(BlendEquation::Add, BlendEquation::Add);
        options
    }
}

impl BlendingOptions {
    pub fn from_bitmask(bitmask: u32) -> Self {
        Self {
            bitmask,
            blend_color: None,
        }
    }

    pub fn bitmask(&self) -> u32 {
        self.bitmask
    }

    pub fn set_blend_func(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.set_field(SRC_RGB_SHIFT, FACTOR_MASK, src_rgb as u32);
        self.set_field(DST_RGB_SHIFT, FACTOR_MASK, dst_rgb as u32);
        self.set_field(SRC_ALPHA_SHIFT, FACTOR_MASK, src_alpha as u32);
        self.set_field(DST_ALPHA_SHIFT, FACTOR_MASK, dst_alpha as u32);
    }

    pub fn set_blend_equation(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.set_field(EQUATION_RGB_SHIFT, EQUATION_MASK, rgb as u32);
        self.set_field(EQUATION_ALPHA_SHIFT, EQUATION_MASK, alpha as u32);
    }

    pub fn set_blend_color(&mut self, color: Option<Vec4>) {
        self.blend_color = color;
    }

    pub fn with_blend_color(mut self, color: Vec4) -> Self {
        self.blend_color = Some(color);
        self
    }

    pub fn blend_color(&self) -> Option<Vec4> {
        self.blend_color
    }

    pub fn src_factor_rgb(&self) -> BlendFactor {
        self.factor(SRC_RGB_SHIFT)
    }

    pub fn dst_factor_rgb(&self) -> BlendFactor {
        self.factor(DST_RGB_SHIFT)
    }

    pub fn src_factor_alpha(&self) -> BlendFactor {
        self.factor(SRC_ALPHA_SHIFT)
    }

    pub fn dst_factor_alpha(&self) -> BlendFactor {
        self.factor(DST_ALPHA_SHIFT)
    }

    pub fn equation_rgb(&self) -> BlendEquation {
        self.equation(EQUATION_RGB_SHIFT)
    }

    pub fn equation_alpha(&self) -> BlendEquation {
        self.equation(EQUATION_ALPHA_SHIFT)
    }

    pub fn is_advanced_equation_applied(&self) -> bool {
        self.equation_rgb().is_advanced() || self.equation_alpha().is_advanced()
    }

    fn set_field(&mut self, shift: u32, mask: u32, value: u32) {
        self.bitmask = (self.bitmask & !(mask << shift)) | ((value & mask) << shift);
    }

    fn factor(&self, shift: u32) -> BlendFactor {
        let index = ((self.bitmask >> shift) & FACTOR_MASK) as usize;
        BLEND_FACTORS.get(index).copied().unwrap_or(BlendFactor::Zero)
    }

    fn equation(&self, shift: u32) -> BlendEquation {
        let index = ((self.bitmask >> shift) & EQUATION_MASK) as usize;
        BLEND_EQUATIONS
            .get(index)
            .copied()
            .unwrap_or(BlendEquation::Add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_source_alpha_blending() {
        let options = BlendingOptions::default();
        assert_eq!(options.src_factor_rgb(), BlendFactor::SrcAlpha);
        assert_eq!(options.dst_factor_rgb(), BlendFactor::OneMinusSrcAlpha);
        assert_eq!(options.src_factor_alpha(), BlendFactor::One);
        assert_eq!(options.dst_factor_alpha(), BlendFactor::OneMinusSrcAlpha);
        assert_eq!(options.equation_rgb(), BlendEquation::Add);
        assert!(!options.is_advanced_equation_applied());
    }

    #[test]
    fn fields_do_not_overlap() {
        let mut options = BlendingOptions::from_bitmask(0);
        options.set_blend_func(
            BlendFactor::OneMinusConstantAlpha,
            BlendFactor::Zero,
            BlendFactor::DstColor,
            BlendFactor::ConstantColor,
        );
        options.set_blend_equation(BlendEquation::Luminosity, BlendEquation::Subtract);

        assert_eq!(options.src_factor_rgb(), BlendFactor::OneMinusConstantAlpha);
        assert_eq!(options.dst_factor_rgb(), BlendFactor::Zero);
        assert_eq!(options.src_factor_alpha(), BlendFactor::DstColor);
        assert_eq!(options.dst_factor_alpha(), BlendFactor::ConstantColor);
        assert_eq!(options.equation_rgb(), BlendEquation::Luminosity);
        assert_eq!(options.equation_alpha(), BlendEquation::Subtract);
        assert!(options.is_advanced_equation_applied());
    }

    #[test]
    fn blend_color_does_not_change_bitmask() {
        let plain = BlendingOptions::default();
        let tinted = plain.with_blend_color(Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(plain.bitmask(), tinted.bitmask());
        assert_ne!(plain, tinted);
    }
}
