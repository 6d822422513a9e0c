//! Brushes/shaders: per-pixel source color for solid, gradient, and image
//! spans, per `spec.md` §4.4.
//!
//! Bilinear-tap integer lerp grounded on
//! `yvt-Stella2/tcw3/pal/src/swrast/binrast.rs`'s `sample_bilinear`/
//! `lerp_color`; the gradient closed forms (linear/radial/sweep/conical)
//! have no teacher counterpart (`tcw3_pal` draws solid/bitmap layers only)
//! and are implemented directly from `spec.md` §4.4's formulas.
use alt_fp::FloatOrd;
use cgmath::{Matrix3, Point2, Transform};

use crate::color::{alpha_mul, alpha_255_to_256, PMColor, TRANSPARENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    Clamp,
    Repeat,
    Mirror,
    Decal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Remap `t` (unbounded) into `[0, 1]` per `tile`, or `None` for `decal`
/// values outside `[0,1]` (meaning "transparent").
fn apply_tile(t: f32, tile: TileMode) -> Option<f32> {
    match tile {
        TileMode::Clamp => Some(t.fmax(0.0).fmin(1.0)),
        TileMode::Repeat => Some(t - t.floor()),
        TileMode::Mirror => {
            let period = t.rem_euclid(2.0);
            Some(if period > 1.0 { 2.0 - period } else { period })
        }
        TileMode::Decal => {
            if (0.0..=1.0).contains(&t) {
                Some(t)
            } else {
                None
            }
        }
    }
}

/// A sorted set of color stops; interpolated by linear search per
/// `spec.md` §4.4's "Gradient color interpolation" note.
#[derive(Debug, Clone)]
pub struct ColorStops {
    /// Strictly increasing positions in `[0,1]`, one per `colors` entry.
    /// When constructed without explicit offsets, uniform spacing is
    /// filled in by [`ColorStops::uniform`].
    pub positions: Vec<f32>,
    pub colors: Vec<PMColor>,
}

impl ColorStops {
    pub fn uniform(colors: Vec<PMColor>) -> Self {
        let n = colors.len().max(1);
        let positions = (0..colors.len()).map(|i| i as f32 / (n - 1).max(1) as f32).collect();
        ColorStops { positions, colors }
    }

    pub fn new(positions: Vec<f32>, colors: Vec<PMColor>) -> Self {
        debug_assert_eq!(positions.len(), colors.len());
        ColorStops { positions, colors }
    }

    /// Interpolate the color at parameter `t` (already tile-remapped into
    /// `[0,1]`). At the boundaries, returns the extremal color.
    pub fn sample(&self, t: f32) -> PMColor {
        if self.colors.is_empty() {
            return TRANSPARENT;
        }
        if self.colors.len() == 1 || t <= self.positions[0] {
            return self.colors[0];
        }
        let last = self.positions.len() - 1;
        if t >= self.positions[last] {
            return self.colors[last];
        }
        for i in 0..last {
            let (p0, p1) = (self.positions[i], self.positions[i + 1]);
            if t >= p0 && t <= p1 {
                let local_t = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
                return lerp_color(self.colors[i], self.colors[i + 1], local_t);
            }
        }
        self.colors[last]
    }
}

/// Integer-lerp two premultiplied colors, `t` in `[0,1]`; the same role
/// `binrast::lerp_color` plays for bilinear image taps.
pub fn lerp_color(a: PMColor, b: PMColor, t: f32) -> PMColor {
    let t = t.fmax(0.0).fmin(1.0);
    let w = (t * 255.0).round() as u32;
    let lerp_ch = |x: u8, y: u8| -> u8 {
        let x = x as u32;
        let y = y as u32;
        ((x * (255 - w) + y * w + 127) / 255) as u8
    };
    PMColor::new(lerp_ch(a.r, b.r), lerp_ch(a.g, b.g), lerp_ch(a.b, b.b), lerp_ch(a.a, b.a))
}

#[derive(Debug, Clone)]
pub struct GradientParams {
    pub stops: ColorStops,
    pub tile: TileMode,
    /// Maps device pixel center to a 1-D parameter `t` (linear/radial) or
    /// to the 2-D space the sweep/conical formulas evaluate in.
    pub points_to_unit: Matrix3<f32>,
}

#[derive(Debug, Clone)]
pub struct ConicalParams {
    pub stops: ColorStops,
    pub tile: TileMode,
    pub points_to_unit: Matrix3<f32>,
    pub r0: f32,
    pub r1: f32,
}

/// A sampleable source image for the image shader.
#[derive(Debug, Clone)]
pub struct ImagePixmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<PMColor>,
}

impl ImagePixmap {
    #[inline]
    fn at(&self, x: i32, y: i32) -> PMColor {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.pixels[(y * self.width + x) as usize]
    }
}

#[derive(Debug, Clone)]
pub struct ImageParams {
    pub image: ImagePixmap,
    pub points_to_unit: Matrix3<f32>,
    pub filter: FilterMode,
    pub tile_x: TileMode,
    pub tile_y: TileMode,
}

#[derive(Debug, Clone)]
pub enum Shader {
    Solid(PMColor),
    Linear(GradientParams),
    Radial(GradientParams),
    Sweep(GradientParams),
    Conical(ConicalParams),
    Image(ImageParams),
}

impl Shader {
    pub fn is_pure_color(&self) -> bool {
        matches!(self, Shader::Solid(_))
    }

    /// Per-pixel premultiplied color at device-space point `p`.
    pub fn eval(&self, p: Point2<f32>) -> PMColor {
        match self {
            Shader::Solid(c) => *c,
            Shader::Linear(g) => {
                let u = g.points_to_unit.transform_point(p);
                match apply_tile(u.x, g.tile) {
                    Some(t) => g.stops.sample(t),
                    None => TRANSPARENT,
                }
            }
            Shader::Radial(g) => {
                let u = g.points_to_unit.transform_point(p);
                let t = (u.x * u.x + u.y * u.y).sqrt();
                match apply_tile(t, g.tile) {
                    Some(t) => g.stops.sample(t),
                    None => TRANSPARENT,
                }
            }
            Shader::Sweep(g) => {
                let u = g.points_to_unit.transform_point(p);
                let t = (-u.y).atan2(-u.x) / (2.0 * std::f32::consts::PI) + 0.5;
                match apply_tile(t, g.tile) {
                    Some(t) => g.stops.sample(t),
                    None => TRANSPARENT,
                }
            }
            Shader::Conical(c) => eval_conical(c, p),
            Shader::Image(img) => eval_image(img, p),
        }
    }
}

/// Two-point conical gradient, per Skia's closed form as restated in
/// `spec.md` §4.4: focal point `f = r0/(r0-r1)`, solve the quadratic for
/// the positive root, return transparent outside the valid domain (the
/// Open Question decision preserved in `DESIGN.md`).
fn eval_conical(c: &ConicalParams, p: Point2<f32>) -> PMColor {
    let pt = c.points_to_unit.transform_point(p);
    let dr = c.r1 - c.r0;
    if dr.abs() < 1e-6 {
        // Degenerate "strip" case: r0 == r1, equivalent to a linear
        // gradient along x with constant radius.
        return match apply_tile(pt.x, c.tile) {
            Some(t) => c.stops.sample(t),
            None => TRANSPARENT,
        };
    }
    let a = pt.x * pt.x + pt.y * pt.y - dr * dr;
    let b = -2.0 * (pt.x * dr + c.r0 * dr);
    let cc = 1.0 - c.r0 * c.r0;
    let t = if a.abs() < 1e-6 {
        if b.abs() < 1e-6 {
            return TRANSPARENT;
        }
        -cc / b
    } else {
        let disc = b * b - 4.0 * a * cc;
        if disc < 0.0 {
            return TRANSPARENT;
        }
        let sq = disc.sqrt();
        let t0 = (-b + sq) / (2.0 * a);
        let t1 = (-b - sq) / (2.0 * a);
        let valid = |t: f32| c.r0 + t * dr >= 0.0;
        match (valid(t0), valid(t1)) {
            (true, true) => t0.fmax(t1),
            (true, false) => t0,
            (false, true) => t1,
            (false, false) => return TRANSPARENT,
        }
    };
    match apply_tile(t, c.tile) {
        Some(t) => c.stops.sample(t),
        None => TRANSPARENT,
    }
}

fn remap_axis(t: f32, tile: TileMode, extent: u32) -> Option<f32> {
    apply_tile(t, tile).map(|t| t * extent as f32)
}

fn eval_image(img: &ImageParams, p: Point2<f32>) -> PMColor {
    let uv = img.points_to_unit.transform_point(p);
    let u = match remap_axis(uv.x, img.tile_x, img.image.width) {
        Some(u) => u,
        None => return TRANSPARENT,
    };
    let v = match remap_axis(uv.y, img.tile_y, img.image.height) {
        Some(v) => v,
        None => return TRANSPARENT,
    };
    match img.filter {
        FilterMode::Nearest => {
            let x = u.floor() as i32;
            let y = v.floor() as i32;
            img.image.at(x, y)
        }
        FilterMode::Linear => sample_bilinear(&img.image, u - 0.5, v - 0.5),
    }
}

/// 4-tap bilinear sample, matching `binrast::sample_bilinear`'s
/// fractional-weight-of-four-neighbors structure.
fn sample_bilinear(img: &ImagePixmap, u: f32, v: f32) -> PMColor {
    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;
    let x0 = x0 as i32;
    let y0 = y0 as i32;

    let c00 = img.at(x0, y0);
    let c10 = img.at(x0 + 1, y0);
    let c01 = img.at(x0, y0 + 1);
    let c11 = img.at(x0 + 1, y0 + 1);

    let top = lerp_color(c00, c10, fx);
    let bottom = lerp_color(c01, c11, fx);
    lerp_color(top, bottom, fy)
}

/// Premultiply an unpremultiplied color, the ingress conversion spec §4.4
/// requires ("If pixmap is unpremul, premultiply after sampling").
pub fn premultiply(unpremul_rgba: [u8; 4]) -> PMColor {
    let [r, g, b, a] = unpremul_rgba;
    let scale = alpha_255_to_256(a);
    let color = PMColor::new(r, g, b, 255);
    let scaled = alpha_mul(color, scale);
    PMColor::new(scaled.r, scaled.g, scaled.b, a)
}

/// Undo [`premultiply`]: the egress conversion needed when a pixmap's
/// storage alpha type is unpremultiplied (`spec.md` §3's `AlphaType`).
pub fn unpremultiply(c: PMColor) -> [u8; 4] {
    if c.a == 0 {
        return [0, 0, 0, 0];
    }
    let unscale = |ch: u8| -> u8 { ((ch as u32 * 255 + c.a as u32 / 2) / c.a as u32).min(255) as u8 };
    [unscale(c.r), unscale(c.g), unscale(c.b), c.a]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::SquareMatrix;

    fn color(r: u8, g: u8, b: u8) -> PMColor {
        PMColor::new(r, g, b, 255)
    }

    #[test]
    fn radial_gradient_scenario_s5() {
        let red = color(255, 0, 0);
        let green = color(0, 255, 0);
        let blue = color(0, 0, 255);
        let stops = ColorStops::new(vec![0.0, 0.5, 1.0], vec![red, green, blue]);
        // map device px (cx+r*t, cy) -> unit circle, centered at (5,5), r=5.
        let to_unit = Matrix3::from_cols(
            cgmath::Vector3::new(1.0 / 5.0, 0.0, 0.0),
            cgmath::Vector3::new(0.0, 1.0 / 5.0, 0.0),
            cgmath::Vector3::new(0.0, 0.0, 1.0),
        ) * Matrix3::from_translation(cgmath::Vector2::new(-5.0, -5.0));
        let g = GradientParams { stops, tile: TileMode::Clamp, points_to_unit: to_unit };
        let shader = Shader::Radial(g);
        assert_eq!(shader.eval(Point2::new(5.0, 5.0)), red);
        let mid = shader.eval(Point2::new(5.0, 2.5));
        assert_eq!(mid, green);
        assert_eq!(shader.eval(Point2::new(5.0, 10.0)), blue);
        assert_eq!(shader.eval(Point2::new(100.0, 100.0)), blue);
    }

    #[test]
    fn tile_decal_outside_unit_is_transparent() {
        assert_eq!(apply_tile(1.5, TileMode::Decal), None);
        assert_eq!(apply_tile(0.5, TileMode::Decal), Some(0.5));
    }

    #[test]
    fn tile_repeat_wraps() {
        let t = apply_tile(1.25, TileMode::Repeat).unwrap();
        assert!((t - 0.25).abs() < 1e-5);
    }

    #[test]
    fn solid_is_pure_color() {
        let s = Shader::Solid(color(1, 2, 3));
        assert!(s.is_pure_color());
        assert_eq!(s.eval(Point2::new(0.0, 0.0)), color(1, 2, 3));
    }

    #[test]
    fn unpremultiply_inverts_premultiply_for_opaque() {
        let c = premultiply([10, 20, 30, 255]);
        assert_eq!(unpremultiply(c), [10, 20, 30, 255]);
    }

    #[test]
    fn unpremultiply_of_transparent_is_zero() {
        assert_eq!(unpremultiply(TRANSPARENT), [0, 0, 0, 0]);
    }

    #[test]
    fn identity_image_sample_nearest() {
        let img = ImagePixmap { width: 2, height: 1, pixels: vec![color(10, 0, 0), color(20, 0, 0)] };
        let params = ImageParams {
            image: img,
            points_to_unit: Matrix3::identity(),
            filter: FilterMode::Nearest,
            tile_x: TileMode::Clamp,
            tile_y: TileMode::Clamp,
        };
        let shader = Shader::Image(params);
        assert_eq!(shader.eval(Point2::new(0.0, 0.0)).r, 10);
    }
}
