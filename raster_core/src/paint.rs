//! [`Paint`]: the styling object passed by reference into every draw.
//!
//! Grounded on `tcw3_pal::iface::Canvas`'s scattered stateful setters
//! (`set_fill_rgb`, `set_stroke_rgb`, `set_line_cap`, `set_line_join`,
//! `set_line_width`, `set_line_miter_limit`, `set_line_dash`), generalized
//! from per-canvas mutable state into the plain value type `spec.md` §3
//! calls for.
use crate::color::{BlendMode, PMColor};
use crate::filters::{ColorFilter, ImageFilter, MaskFilter};
use crate::shader::Shader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Fill,
    Stroke,
    FillAndStroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone)]
pub struct Paint {
    pub style: Style,
    pub stroke_width: f32,
    pub stroke_cap: LineCap,
    pub stroke_join: LineJoin,
    pub stroke_miter: f32,
    pub anti_alias: bool,
    pub color: PMColor,
    pub shader: Option<Shader>,
    pub color_filter: Option<ColorFilter>,
    pub mask_filter: Option<MaskFilter>,
    pub image_filter: Option<ImageFilter>,
    pub blend_mode: BlendMode,
    pub alpha: u8,
}

impl Default for Paint {
    fn default() -> Self {
        Paint {
            style: Style::Fill,
            stroke_width: 1.0,
            stroke_cap: LineCap::Butt,
            stroke_join: LineJoin::Miter,
            stroke_miter: 4.0,
            anti_alias: true,
            color: PMColor::new(0, 0, 0, 255),
            shader: None,
            color_filter: None,
            mask_filter: None,
            image_filter: None,
            blend_mode: BlendMode::SrcOver,
            alpha: 255,
        }
    }
}

impl Paint {
    pub fn new() -> Self {
        Self::default()
    }

    /// The effective shader for a draw: the explicit [`Shader`] if set,
    /// otherwise a solid shader built from `color`.
    pub fn effective_shader(&self) -> Shader {
        self.shader.clone().unwrap_or(Shader::Solid(self.color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paint_is_opaque_black_fill() {
        let p = Paint::new();
        assert_eq!(p.style, Style::Fill);
        assert_eq!(p.color, PMColor::new(0, 0, 0, 255));
        assert_eq!(p.alpha, 255);
    }

    #[test]
    fn effective_shader_falls_back_to_solid_color() {
        let mut p = Paint::new();
        p.color = PMColor::new(1, 2, 3, 255);
        match p.effective_shader() {
            Shader::Solid(c) => assert_eq!(c, p.color),
            _ => panic!("expected solid shader"),
        }
    }
}
