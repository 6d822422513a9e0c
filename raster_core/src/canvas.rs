//! [`Canvas`]: the draw-call surface that ties rasterizer, clip model,
//! brushes, blending, and filters together, per `spec.md` §4.2.
//!
//! State-stack/layer-stack shape grounded on
//! `examples/original_source/src/render/sw/sw_canvas.hpp`'s `SWCanvas`
//! (`state_stack_`/`layer_stack_`, `OnSave`/`OnRestore`/`OnSaveLayer`,
//! `PerformClip`, `GenerateLayer`/`OnLayerRestore`); the draw-call surface
//! itself follows `tcw3_pal::iface::Canvas`'s method names
//! (`fill_path`/`stroke_path`/`clip`/`translate`/`scale`/...).
use cgmath::{Matrix3, Point2, Rad, SquareMatrix, Transform, Vector2, Vector3};
use cggeom::prelude::*;
use cggeom::Box2;
use itertools::izip;
use log::trace;

use crate::clip::{Clip, ClipOp};
use crate::color::{alpha_255_to_256, alpha_mul, blend, blend_span, blend_span_solid, PMColor};
use crate::filters::MaskFilter;
use crate::geom::{stroke_to_fill, Path};
use crate::paint::{Paint, Style};
use crate::pixmap::{AlphaType, Bitmap, ColorType, Pixmap};
use crate::raster::rasterize;
use crate::shader::{FilterMode, ImageParams, ImagePixmap, Shader, TileMode};
use crate::span::Span;
use crate::text::{GlyphData, GlyphId, ScalerContextContainer};

type DeviceRect = (i32, i32, i32, i32);

const UNBOUNDED: DeviceRect = (i32::MIN / 2, i32::MIN / 2, i32::MAX / 2, i32::MAX / 2);

#[derive(Clone)]
struct State {
    ctm: Matrix3<f32>,
    clip: Clip,
    /// Conservative device-pixel bound of the current clip, narrowed by
    /// every `Intersect`-op `clip_rect`/`clip_path` call; used only to prune
    /// the rasterizer's scan range per `spec.md` §4.3, never to skip the
    /// per-pixel clip test itself.
    clip_bounds: DeviceRect,
}

impl State {
    fn identity() -> Self {
        State { ctm: Matrix3::identity(), clip: Clip::none(), clip_bounds: UNBOUNDED }
    }
}

struct LayerFrame {
    bitmap: Bitmap,
    parent: Bitmap,
    bounds: DeviceRect,
    paint: Paint,
    /// `states.len()` at the moment this layer was pushed; when a
    /// `restore`/`restoreToCount` drops the stack below this depth, the
    /// layer's matching save point has been undone and it composites back.
    state_depth: usize,
}

/// A software rendering target plus the save/restore, clip, and layer state
/// that every draw call reads, per `spec.md` §4.2.
pub struct Canvas {
    target: Bitmap,
    root: Bitmap,
    width: u32,
    height: u32,
    states: Vec<State>,
    layers: Vec<LayerFrame>,
}

impl Canvas {
    /// Create a canvas over a freshly allocated `width x height` RGBA8
    /// premultiplied bitmap. Returns `None` for zero dimensions, per
    /// `spec.md` §6's "factory returns nothing for malformed input".
    pub fn new(width: u32, height: u32) -> Option<Canvas> {
        let pm = Pixmap::new(width, height, ColorType::Rgba8, AlphaType::Premul)?;
        let bitmap = Bitmap::new(pm);
        Some(Canvas {
            target: bitmap.clone(),
            root: bitmap,
            width,
            height,
            states: vec![State::identity()],
            layers: Vec::new(),
        })
    }

    /// Wrap an existing bitmap as the root target, per `spec.md` §3's
    /// "software canvas directly over an owned or borrowed pixmap".
    pub fn from_bitmap(bitmap: Bitmap) -> Canvas {
        let width = bitmap.width();
        let height = bitmap.height();
        Canvas { target: bitmap.clone(), root: bitmap, width, height, states: vec![State::identity()], layers: Vec::new() }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn root_bitmap(&self) -> Bitmap {
        self.root.clone()
    }

    pub fn matrix(&self) -> Matrix3<f32> {
        self.state().ctm
    }

    fn state(&self) -> &State {
        self.states.last().expect("canvas always has at least one state")
    }

    fn state_mut(&mut self) -> &mut State {
        self.states.last_mut().expect("canvas always has at least one state")
    }

    // --- Transform stack -------------------------------------------------

    pub fn translate(&mut self, v: Vector2<f32>) {
        let ctm = self.state().ctm;
        self.state_mut().ctm = ctm * Matrix3::from_translation(v);
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        let ctm = self.state().ctm;
        self.state_mut().ctm = ctm * Matrix3::from_nonuniform_scale_2d(sx, sy);
    }

    pub fn rotate(&mut self, radians: f32) {
        let ctm = self.state().ctm;
        self.state_mut().ctm = ctm * Matrix3::from_angle(Rad(radians));
    }

    pub fn skew(&mut self, kx: f32, ky: f32) {
        let ctm = self.state().ctm;
        let m = Matrix3::from_cols(Vector3::new(1.0, ky, 0.0), Vector3::new(kx, 1.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        self.state_mut().ctm = ctm * m;
    }

    pub fn concat(&mut self, m: Matrix3<f32>) {
        let ctm = self.state().ctm;
        self.state_mut().ctm = ctm * m;
    }

    pub fn set_matrix(&mut self, m: Matrix3<f32>) {
        self.state_mut().ctm = m;
    }

    // --- Save / restore / layers ------------------------------------------

    pub fn save(&mut self) {
        let s = self.state().clone();
        self.states.push(s);
    }

    pub fn save_count(&self) -> usize {
        self.states.len()
    }

    pub fn restore(&mut self) {
        if self.states.len() <= 1 {
            return;
        }
        self.states.pop();
        trace!("canvas restore -> depth {}", self.states.len());
        self.pop_layers_if_needed();
    }

    pub fn restore_to_count(&mut self, count: usize) {
        let floor = count.max(1);
        while self.states.len() > floor {
            self.states.pop();
        }
        self.pop_layers_if_needed();
    }

    fn pop_layers_if_needed(&mut self) {
        while let Some(top) = self.layers.last() {
            if top.state_depth > self.states.len() {
                let layer = self.layers.pop().expect("checked non-empty above");
                self.composite_layer(layer);
            } else {
                break;
            }
        }
    }

    /// Push a new offscreen layer covering `bounds` (local-space, or the
    /// current clip's device bounds when `None`); drawing is redirected
    /// there until the matching `restore`, when it composites back onto the
    /// previous target through `paint`, per `spec.md` §4.2's `saveLayer`.
    pub fn save_layer(&mut self, bounds: Option<Box2<f32>>, paint: Paint) {
        let device = match bounds {
            Some(b) => {
                let ctm = self.state().ctm;
                let p0 = ctm.transform_point(b.min);
                let p1 = ctm.transform_point(b.max);
                (
                    p0.x.min(p1.x).floor() as i32,
                    p0.y.min(p1.y).floor() as i32,
                    p0.x.max(p1.x).ceil() as i32,
                    p0.y.max(p1.y).ceil() as i32,
                )
            }
            None => self.scan_bounds(),
        };
        let clamp = self.scan_bounds();
        let l = device.0.max(clamp.0);
        let t = device.1.max(clamp.1);
        let r = device.2.min(clamp.2);
        let b = device.3.min(clamp.3);
        let w = (r - l).max(1) as u32;
        let h = (b - t).max(1) as u32;

        self.save();
        let pm = match Pixmap::new(w, h, ColorType::Rgba8, AlphaType::Premul) {
            Some(p) => p,
            None => return,
        };
        let bitmap = Bitmap::new(pm);
        let parent = self.target.clone();
        let offset = Vector2::new(-(l as f32), -(t as f32));
        let ctm = self.state().ctm;
        self.state_mut().ctm = Matrix3::from_translation(offset) * ctm;
        self.state_mut().clip = Clip::none();
        self.state_mut().clip_bounds = UNBOUNDED;
        self.layers.push(LayerFrame { bitmap: bitmap.clone(), parent, bounds: (l, t, r, b), paint, state_depth: self.states.len() });
        self.target = bitmap;
    }

    fn composite_layer(&mut self, layer: LayerFrame) {
        let lw = layer.bitmap.width();
        let lh = layer.bitmap.height();
        let mut pixels: Vec<PMColor> = Vec::with_capacity((lw * lh) as usize);
        for y in 0..lh {
            for x in 0..lw {
                pixels.push(layer.bitmap.get_pixel(x, y));
            }
        }
        if let Some(filter) = &layer.paint.image_filter {
            pixels = filter.apply(&pixels, lw as usize, lh as usize);
        }
        let scale = alpha_255_to_256(layer.paint.alpha);
        let (ox, oy, ..) = layer.bounds;
        for y in 0..lh {
            for x in 0..lw {
                let mut c = pixels[(y * lw + x) as usize];
                if let Some(cf) = &layer.paint.color_filter {
                    c = cf.apply(c);
                }
                if layer.paint.alpha != 255 {
                    c = alpha_mul(c, scale);
                }
                let dx = ox + x as i32;
                let dy = oy + y as i32;
                let clip_cov = self.state().clip.coverage_at(dx, dy);
                if clip_cov == 0 {
                    continue;
                }
                if clip_cov != 255 {
                    c = alpha_mul(c, alpha_255_to_256(clip_cov));
                }
                if dx < 0 || dy < 0 || dx as u32 >= layer.parent.width() || dy as u32 >= layer.parent.height() {
                    continue;
                }
                let dst = layer.parent.get_pixel(dx as u32, dy as u32);
                let out = blend(c, dst, layer.paint.blend_mode);
                layer.parent.set_pixel(dx as u32, dy as u32, out);
            }
        }
        self.target = layer.parent;
    }

    // --- Clipping ----------------------------------------------------------

    pub fn clip_rect(&mut self, rect: Box2<f32>, op: ClipOp) {
        let mut p = Path::new();
        let size = rect.size();
        p.add_rect(rect.min.x, rect.min.y, size.x, size.y);
        self.clip_path(&p, op);
    }

    pub fn clip_path(&mut self, path: &Path, op: ClipOp) {
        let bounds = self.scan_bounds();
        let ctm = self.state().ctm;
        let spans = rasterize(path, &ctm, bounds, true);
        trace!("clip_path op={:?} produced {} spans", op, spans.len());
        self.state_mut().clip.combine(spans, op);

        if matches!(op, ClipOp::Intersect) {
            if let Some((x, y, w, h)) = path.bounds() {
                let p0 = ctm.transform_point(Point2::new(x, y));
                let p1 = ctm.transform_point(Point2::new(x + w, y + h));
                let nl = p0.x.min(p1.x).floor() as i32;
                let nt = p0.y.min(p1.y).floor() as i32;
                let nr = p0.x.max(p1.x).ceil() as i32;
                let nb = p0.y.max(p1.y).ceil() as i32;
                let (cl, ct, cr, cb) = self.state().clip_bounds;
                self.state_mut().clip_bounds = (cl.max(nl), ct.max(nt), cr.min(nr), cb.min(nb));
            }
        }
    }

    fn scan_bounds(&self) -> DeviceRect {
        let (cl, ct, cr, cb) = self.state().clip_bounds;
        let w = self.target.width() as i32;
        let h = self.target.height() as i32;
        (cl.max(0), ct.max(0), cr.min(w), cb.min(h))
    }

    // --- Drawing -------------------------------------------------------

    fn draw_shape(&mut self, path: &Path, paint: &Paint) {
        if paint.image_filter.is_some() {
            self.draw_shape_with_image_filter(path, paint);
            return;
        }
        let bounds = self.scan_bounds();
        let ctm = self.state().ctm;
        let spans = rasterize(path, &ctm, bounds, paint.anti_alias);
        let spans = match &paint.mask_filter {
            Some(mf) => apply_mask_filter(mf, &spans, bounds),
            None => spans,
        };
        let spans = self.state().clip.apply(&spans);
        self.blit_spans(&spans, paint);
    }

    /// Per `spec.md` §4.2's paint effect order ("shader → color filter →
    /// mask filter → image filter → blend"): render the shape into an
    /// intermediate bitmap sized to the CTM-mapped, filter-outset bounds
    /// with `image_filter` disabled, then run the filter chain and
    /// composite the result onto the real target through `paint`'s blend
    /// mode and alpha — the same scheme `save_layer`/`composite_layer` use
    /// for layers, applied here to a single shape draw rather than a whole
    /// save/restore span.
    fn draw_shape_with_image_filter(&mut self, path: &Path, paint: &Paint) {
        let filter = paint.image_filter.as_ref().unwrap();
        let scan = self.scan_bounds();
        let ctm = self.state().ctm;
        let (lx, ly, lw, lh) = match path.bounds() {
            Some(b) => b,
            None => return,
        };
        let p0 = ctm.transform_point(Point2::new(lx, ly));
        let p1 = ctm.transform_point(Point2::new(lx + lw, ly + lh));
        let dl = p0.x.min(p1.x);
        let dt = p0.y.min(p1.y);
        let dr = p0.x.max(p1.x);
        let db = p0.y.max(p1.y);
        let (fx, fy, fw, fh) = filter.compute_fast_bounds((dl, dt, dr - dl, db - dt));
        let x0 = (fx.floor() as i32).max(scan.0);
        let y0 = (fy.floor() as i32).max(scan.1);
        let x1 = ((fx + fw).ceil() as i32).min(scan.2);
        let y1 = ((fy + fh).ceil() as i32).min(scan.3);
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let w = (x1 - x0) as u32;
        let h = (y1 - y0) as u32;
        let pm = match Pixmap::new(w, h, ColorType::Rgba8, AlphaType::Premul) {
            Some(p) => p,
            None => return,
        };
        let offscreen = Bitmap::new(pm);

        let saved_target = std::mem::replace(&mut self.target, offscreen.clone());
        let saved_ctm = self.state().ctm;
        let saved_clip = std::mem::replace(&mut self.state_mut().clip, Clip::none());
        let saved_clip_bounds = std::mem::replace(&mut self.state_mut().clip_bounds, UNBOUNDED);
        self.state_mut().ctm = Matrix3::from_translation(Vector2::new(-(x0 as f32), -(y0 as f32))) * ctm;

        let mut inner_paint = paint.clone();
        inner_paint.image_filter = None;
        inner_paint.blend_mode = crate::color::BlendMode::SrcOver;
        inner_paint.alpha = 255;
        self.draw_shape(path, &inner_paint);

        self.target = saved_target;
        self.state_mut().ctm = saved_ctm;
        self.state_mut().clip = saved_clip;
        self.state_mut().clip_bounds = saved_clip_bounds;

        let mut pixels: Vec<PMColor> = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                pixels.push(offscreen.get_pixel(x, y));
            }
        }
        pixels = filter.apply(&pixels, w as usize, h as usize);
        let scale = alpha_255_to_256(paint.alpha);
        for y in 0..h {
            for x in 0..w {
                let mut c = pixels[(y * w + x) as usize];
                if paint.alpha != 255 {
                    c = alpha_mul(c, scale);
                }
                let dx = x0 + x as i32;
                let dy = y0 + y as i32;
                let clip_cov = self.state().clip.coverage_at(dx, dy);
                if clip_cov == 0 {
                    continue;
                }
                if clip_cov != 255 {
                    c = alpha_mul(c, alpha_255_to_256(clip_cov));
                }
                if dx < 0 || dy < 0 || dx as u32 >= self.target.width() || dy as u32 >= self.target.height() {
                    continue;
                }
                let dst = self.target.get_pixel(dx as u32, dy as u32);
                let out = blend(c, dst, paint.blend_mode);
                self.target.set_pixel(dx as u32, dy as u32, out);
            }
        }
    }

    fn blit_spans(&mut self, spans: &[Span], paint: &Paint) {
        let shader = paint.effective_shader();
        for s in spans {
            let len = s.len.max(0) as usize;
            if len == 0 {
                continue;
            }
            let mut dst: Vec<PMColor> = (0..len).map(|i| self.target.get_pixel((s.x + i as i32) as u32, s.y as u32)).collect();
            if let Shader::Solid(c) = shader {
                let c = match &paint.color_filter {
                    Some(cf) => cf.apply(c),
                    None => c,
                };
                blend_span_solid(c, &mut dst, s.cover, paint.alpha, paint.blend_mode);
            } else {
                let mut src: Vec<PMColor> = (0..len)
                    .map(|i| {
                        let p = Point2::new(s.x as f32 + i as f32 + 0.5, s.y as f32 + 0.5);
                        shader.eval(p)
                    })
                    .collect();
                if let Some(cf) = &paint.color_filter {
                    for c in src.iter_mut() {
                        *c = cf.apply(*c);
                    }
                }
                blend_span(&src, &mut dst, s.cover, paint.alpha, paint.blend_mode);
            }
            for (i, c) in dst.into_iter().enumerate() {
                self.target.set_pixel((s.x + i as i32) as u32, s.y as u32, c);
            }
        }
    }

    pub fn draw_path(&mut self, path: &Path, paint: &Paint) {
        match paint.style {
            Style::Fill => self.draw_shape(path, paint),
            Style::Stroke => {
                let outline = stroke_to_fill(path, paint.stroke_width, paint.stroke_join, paint.stroke_cap);
                self.draw_shape(&outline, paint);
            }
            Style::FillAndStroke => {
                self.draw_shape(path, paint);
                let outline = stroke_to_fill(path, paint.stroke_width, paint.stroke_join, paint.stroke_cap);
                self.draw_shape(&outline, paint);
            }
        }
    }

    pub fn draw_rect(&mut self, rect: Box2<f32>, paint: &Paint) {
        let size = rect.size();
        let mut p = Path::new();
        p.add_rect(rect.min.x, rect.min.y, size.x, size.y);
        self.draw_path(&p, paint);
    }

    pub fn draw_round_rect(&mut self, rect: Box2<f32>, rx: f32, ry: f32, paint: &Paint) {
        let size = rect.size();
        let mut p = Path::new();
        p.add_round_rect(rect.min.x, rect.min.y, size.x, size.y, rx, ry);
        self.draw_path(&p, paint);
    }

    pub fn draw_oval(&mut self, rect: Box2<f32>, paint: &Paint) {
        let size = rect.size();
        let mut p = Path::new();
        p.add_oval(rect.min.x + size.x / 2.0, rect.min.y + size.y / 2.0, size.x / 2.0, size.y / 2.0);
        self.draw_path(&p, paint);
    }

    pub fn draw_circle(&mut self, center: Point2<f32>, radius: f32, paint: &Paint) {
        let mut p = Path::new();
        p.add_circle(center.x, center.y, radius);
        self.draw_path(&p, paint);
    }

    /// Lines always stroke, whatever `paint.style` says: a pure fill of a
    /// zero-area segment would draw nothing, matching Skia's `drawLine`.
    pub fn draw_line(&mut self, p0: Point2<f32>, p1: Point2<f32>, paint: &Paint) {
        let mut p = Path::new();
        p.move_to(p0);
        p.line_to(p1);
        let outline = stroke_to_fill(&p, paint.stroke_width, paint.stroke_join, paint.stroke_cap);
        self.draw_shape(&outline, paint);
    }

    /// Fill the entire current clip region, bypassing the rasterizer with
    /// full-width spans per row, per `spec.md` §4.2's `drawPaint`.
    pub fn draw_paint(&mut self, paint: &Paint) {
        let (l, t, r, b) = self.scan_bounds();
        if r <= l || b <= t {
            return;
        }
        let spans: Vec<Span> = (t..b).map(|y| Span { x: l, y, len: r - l, cover: 255 }).collect();
        let spans = self.state().clip.apply(&spans);
        self.blit_spans(&spans, paint);
    }

    /// Draw `image` at its natural size with `dst`'s top-left corner as
    /// origin, per `spec.md` §4.2's `drawImage`. A no-op for a zero-sized
    /// image, per `spec.md` §7's "Null image to `drawImage` is ignored"
    /// (the empty-image case is the in-core analogue, since this crate
    /// never holds a null `ImagePixmap`).
    pub fn draw_image(&mut self, image: &ImagePixmap, dst: Point2<f32>, filter: FilterMode, paint: &Paint) {
        if image.width == 0 || image.height == 0 {
            return;
        }
        let rect = Box2::new(dst, Point2::new(dst.x + image.width as f32, dst.y + image.height as f32));
        self.draw_image_rect(image, None, rect, filter, paint);
    }

    /// Draw `image`'s `src` sub-rectangle (full image when `None`) stretched
    /// to `dst`, per `spec.md` §4.2's `drawImageRect`.
    pub fn draw_image_rect(&mut self, image: &ImagePixmap, src: Option<Box2<f32>>, dst: Box2<f32>, filter: FilterMode, paint: &Paint) {
        let img_w = (image.width.max(1)) as f32;
        let img_h = (image.height.max(1)) as f32;
        let src = src.unwrap_or_else(|| Box2::new(Point2::new(0.0, 0.0), Point2::new(img_w, img_h)));
        let dst_size = dst.size();
        if dst_size.x.abs() < 1e-6 || dst_size.y.abs() < 1e-6 {
            return;
        }
        let src_size = src.size();
        let scale = Matrix3::from_nonuniform_scale_2d(src_size.x / dst_size.x / img_w, src_size.y / dst_size.y / img_h);
        let to_dst_local = Matrix3::from_translation(Vector2::new(-dst.min.x, -dst.min.y));
        let src_offset = Matrix3::from_translation(Vector2::new(src.min.x / img_w, src.min.y / img_h));
        let local_to_unit = src_offset * scale * to_dst_local;
        let ctm_inv = self.state().ctm.invert().unwrap_or_else(Matrix3::identity);
        let points_to_unit = local_to_unit * ctm_inv;

        let params = ImageParams { image: image.clone(), points_to_unit, filter, tile_x: TileMode::Clamp, tile_y: TileMode::Clamp };
        let mut local_paint = paint.clone();
        local_paint.shader = Some(Shader::Image(params));
        self.draw_rect(dst, &local_paint);
    }

    /// Draw each glyph's outline at `positions[i]` (local space, added to
    /// the current transform), looking geometry up lazily through
    /// `container`, per `spec.md` §4.7's `Path` render mode.
    pub fn draw_glyphs(
        &mut self,
        glyph_ids: &[GlyphId],
        positions_x: &[f32],
        positions_y: &[f32],
        container: &ScalerContextContainer,
        paint: &Paint,
    ) {
        for (id, x, y) in izip!(glyph_ids, positions_x, positions_y) {
            let data = container.glyph(*id, GlyphData::default);
            let path = match &data.path {
                Some(p) => p.clone(),
                None => continue,
            };
            let saved = self.state().ctm;
            self.state_mut().ctm = saved * Matrix3::from_translation(Vector2::new(*x, *y));
            self.draw_shape(&path, paint);
            self.state_mut().ctm = saved;
        }
    }

    /// Draw a pre-shaped run of glyphs (already positioned relative to
    /// `origin`) as a single unit, per `spec.md` §4.2's `drawTextBlob`. Thin
    /// wrapper over [`Canvas::draw_glyphs`]: a `TextBlob` is just a glyph
    /// run with its own local offsets baked in by the external shaper, so
    /// drawing it is positioning each glyph at `origin + blob_offset`.
    pub fn draw_text_blob(&mut self, blob: &crate::text::TextBlob, origin: Point2<f32>, container: &ScalerContextContainer, paint: &Paint) {
        let xs: Vec<f32> = blob.offsets_x.iter().map(|dx| origin.x + dx).collect();
        let ys: Vec<f32> = blob.offsets_y.iter().map(|dy| origin.y + dy).collect();
        self.draw_glyphs(&blob.glyph_ids, &xs, &ys, container, paint);
    }

    pub fn flush(&self) {
        trace!("canvas flush ({}x{})", self.width, self.height);
    }
}

/// Rasterize `spans`' coverage into a dense alpha plane over their bounding
/// box (clamped to `bounds`), run `mf` over it, and re-emit spans covering
/// every pixel of that box — per `spec.md` §4.2's effect order ("shader →
/// color filter → mask filter → image filter → blend") and §4.6's
/// `MaskFilter` styles, which all need the *shape*'s alpha mask, not just
/// the individual spans rasterization already produced.
fn apply_mask_filter(mf: &MaskFilter, spans: &[Span], bounds: DeviceRect) -> Vec<Span> {
    if spans.is_empty() {
        return Vec::new();
    }
    let pad = mf.radius as i32 + 1;
    let (cl, ct, cr, cb) = bounds;
    let mut min_x = i32::MAX;
    let mut max_x = i32::MIN;
    let mut min_y = i32::MAX;
    let mut max_y = i32::MIN;
    for s in spans {
        min_x = min_x.min(s.x);
        max_x = max_x.max(s.end_x());
        min_y = min_y.min(s.y);
        max_y = max_y.max(s.y + 1);
    }
    let x0 = (min_x - pad).max(cl);
    let x1 = (max_x + pad).min(cr);
    let y0 = (min_y - pad).max(ct);
    let y1 = (max_y + pad).min(cb);
    if x1 <= x0 || y1 <= y0 {
        return Vec::new();
    }
    let w = (x1 - x0) as usize;
    let h = (y1 - y0) as usize;
    let mut mask = vec![0u8; w * h];
    for s in spans {
        if s.y < y0 || s.y >= y1 {
            continue;
        }
        let row = (s.y - y0) as usize * w;
        let sx0 = (s.x - x0).max(0);
        let sx1 = (s.end_x() - x0).min(w as i32);
        for x in sx0..sx1 {
            mask[row + x as usize] = s.cover;
        }
    }
    let blurred = mf.apply(&mask, w, h);
    let mut out = Vec::new();
    for y in 0..h {
        let row = &blurred[y * w..(y + 1) * w];
        let mut x = 0usize;
        while x < w {
            if row[x] == 0 {
                x += 1;
                continue;
            }
            let start = x;
            let a = row[x];
            while x < w && row[x] == a {
                x += 1;
            }
            out.push(Span { x: x0 + start as i32, y: y0 + y as i32, len: (x - start) as i32, cover: a });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::BlendMode;

    fn opaque(r: u8, g: u8, b: u8) -> PMColor {
        PMColor::new(r, g, b, 255)
    }

    #[test]
    fn scenario_s1_solid_fill_draw_rect() {
        let mut canvas = Canvas::new(4, 4).unwrap();
        let mut paint = Paint::new();
        paint.color = opaque(10, 20, 30);
        canvas.draw_rect(Box2::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0)), &paint);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(canvas.root_bitmap().get_pixel(x, y), opaque(10, 20, 30));
            }
        }
    }

    #[test]
    fn scenario_s4_clip_intersect_through_canvas() {
        let mut canvas = Canvas::new(4, 4).unwrap();
        canvas.clip_rect(Box2::new(Point2::new(1.0, 1.0), Point2::new(3.0, 3.0)), ClipOp::Intersect);
        let mut paint = Paint::new();
        paint.color = opaque(255, 0, 0);
        canvas.draw_rect(Box2::new(Point2::new(0.0, 0.0), Point2::new(4.0, 4.0)), &paint);
        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let pixel = canvas.root_bitmap().get_pixel(x, y);
                assert_eq!(pixel.a > 0, inside, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn scenario_s6_save_layer_composites_on_restore() {
        let mut canvas = Canvas::new(4, 4).unwrap();
        let mut bg = Paint::new();
        bg.color = opaque(0, 0, 0);
        canvas.draw_paint(&bg);

        let mut layer_paint = Paint::new();
        layer_paint.alpha = 128;
        layer_paint.blend_mode = BlendMode::SrcOver;
        canvas.save_layer(None, layer_paint);
        let mut fg = Paint::new();
        fg.color = opaque(255, 255, 255);
        canvas.draw_paint(&fg);
        canvas.restore();

        let pixel = canvas.root_bitmap().get_pixel(0, 0);
        assert!(pixel.r > 0 && pixel.r < 255, "expected partial blend, got {pixel:?}");
    }

    #[test]
    fn save_layer_restore_is_bounded_by_the_enclosing_clips_exact_shape() {
        // A circle's bounding box covers the whole canvas, but its corners
        // don't: this distinguishes the clip's conservative device bbox
        // (which already bounds `save_layer`'s offscreen rect) from its
        // per-pixel coverage (which `composite_layer` must still honor).
        let mut canvas = Canvas::new(8, 8).unwrap();
        let mut circle = Path::new();
        circle.add_circle(4.0, 4.0, 4.0);
        canvas.clip_path(&circle, ClipOp::Intersect);

        canvas.save_layer(None, Paint::new());
        let mut fg = Paint::new();
        fg.color = opaque(255, 255, 255);
        canvas.draw_paint(&fg);
        canvas.restore();

        assert!(canvas.root_bitmap().get_pixel(4, 4).a > 0, "circle's center should be painted");
        assert_eq!(canvas.root_bitmap().get_pixel(0, 0).a, 0, "corner outside the circle must stay untouched");
    }

    #[test]
    fn save_restore_nesting_balances_state_depth() {
        let mut canvas = Canvas::new(2, 2).unwrap();
        let depth0 = canvas.save_count();
        canvas.save();
        canvas.translate(Vector2::new(1.0, 0.0));
        canvas.save();
        canvas.scale(2.0, 2.0);
        assert_eq!(canvas.save_count(), depth0 + 2);
        canvas.restore_to_count(depth0);
        assert_eq!(canvas.save_count(), depth0);
        assert_eq!(canvas.matrix(), Matrix3::identity());
    }

    #[test]
    fn mask_filter_blur_spreads_coverage_past_the_shape_edge() {
        use crate::filters::{MaskFilter, MaskFilterStyle};
        let mut plain = Canvas::new(12, 12).unwrap();
        let mut sharp_paint = Paint::new();
        sharp_paint.color = opaque(1, 2, 3);
        plain.draw_rect(Box2::new(Point2::new(4.0, 4.0), Point2::new(8.0, 8.0)), &sharp_paint);
        assert_eq!(plain.root_bitmap().get_pixel(3, 5).a, 0);

        let mut blurred = Canvas::new(12, 12).unwrap();
        let mut blur_paint = sharp_paint.clone();
        blur_paint.mask_filter = Some(MaskFilter::make_blur(MaskFilterStyle::Normal, 6));
        blurred.draw_rect(Box2::new(Point2::new(4.0, 4.0), Point2::new(8.0, 8.0)), &blur_paint);
        assert!(blurred.root_bitmap().get_pixel(3, 5).a > 0, "blur should bleed coverage outside the rect");
        assert!(blurred.root_bitmap().get_pixel(6, 6).a > 0, "interior should stay covered");
    }

    #[test]
    fn image_filter_on_a_direct_draw_dilates_past_the_shape_edge() {
        use crate::filters::ImageFilter;
        let mut plain = Canvas::new(12, 12).unwrap();
        let mut sharp_paint = Paint::new();
        sharp_paint.color = opaque(1, 2, 3);
        plain.draw_rect(Box2::new(Point2::new(4.0, 4.0), Point2::new(8.0, 8.0)), &sharp_paint);
        assert_eq!(plain.root_bitmap().get_pixel(3, 5).a, 0);

        let mut dilated = Canvas::new(12, 12).unwrap();
        let mut filtered_paint = sharp_paint.clone();
        filtered_paint.image_filter = Some(ImageFilter::Dilate(2.0, 2.0));
        dilated.draw_rect(Box2::new(Point2::new(4.0, 4.0), Point2::new(8.0, 8.0)), &filtered_paint);
        assert!(dilated.root_bitmap().get_pixel(3, 5).a > 0, "dilate should spread coverage outside the rect");
        assert!(dilated.root_bitmap().get_pixel(6, 6).a > 0, "interior should stay covered");
    }

    #[test]
    fn image_filter_on_a_direct_draw_respects_clip_and_alpha() {
        use crate::filters::ImageFilter;
        let mut canvas = Canvas::new(12, 12).unwrap();
        canvas.clip_rect(Box2::new(Point2::new(0.0, 0.0), Point2::new(6.0, 12.0)), ClipOp::Intersect);
        let mut paint = Paint::new();
        paint.color = opaque(10, 20, 30);
        paint.alpha = 128;
        paint.image_filter = Some(ImageFilter::Dilate(2.0, 2.0));
        canvas.draw_rect(Box2::new(Point2::new(4.0, 4.0), Point2::new(8.0, 8.0)), &paint);
        // Dilation would normally spread coverage to x=9, but the clip at x<6 cuts it off.
        assert_eq!(canvas.root_bitmap().get_pixel(9, 6).a, 0, "clip should still bound the filtered result");
        let inside = canvas.root_bitmap().get_pixel(5, 6);
        assert!(inside.a > 0 && inside.a < 255, "alpha should still attenuate the filtered result, got {inside:?}");
    }

    #[test]
    fn draw_image_places_pixels_at_dst_origin() {
        use crate::shader::{FilterMode, ImagePixmap};
        let mut canvas = Canvas::new(4, 4).unwrap();
        let image = ImagePixmap { width: 2, height: 2, pixels: vec![opaque(9, 9, 9); 4] };
        canvas.draw_image(&image, Point2::new(1.0, 1.0), FilterMode::Nearest, &Paint::new());
        assert_eq!(canvas.root_bitmap().get_pixel(1, 1), opaque(9, 9, 9));
        assert_eq!(canvas.root_bitmap().get_pixel(3, 3).a, 0);
    }

    #[test]
    fn draw_text_blob_offsets_glyphs_from_origin() {
        use crate::text::{GlyphData, ScalerContextDesc, TextBlob, GLYPH_CACHE};
        let container = GLYPH_CACHE
            .lock()
            .unwrap()
            .get_or_insert(ScalerContextDesc::new(1, 12.0, 1.0, 0.0, [1.0, 0.0, 0.0, 1.0], 0.0, crate::paint::LineCap::Butt, crate::paint::LineJoin::Miter, 4.0, false), Default::default);
        let mut glyph_path = Path::new();
        glyph_path.add_rect(0.0, 0.0, 1.0, 1.0);
        container.glyph(7, || GlyphData { path: Some(glyph_path), ..Default::default() });

        let mut canvas = Canvas::new(4, 4).unwrap();
        let blob = TextBlob::new(vec![7], vec![2.0], vec![2.0]);
        let mut paint = Paint::new();
        paint.color = opaque(4, 5, 6);
        canvas.draw_text_blob(&blob, Point2::new(0.0, 0.0), &container, &paint);
        assert_eq!(canvas.root_bitmap().get_pixel(2, 2), opaque(4, 5, 6));
    }

    #[test]
    fn draw_circle_produces_antialiased_edge() {
        let mut canvas = Canvas::new(8, 8).unwrap();
        let mut paint = Paint::new();
        paint.color = opaque(1, 2, 3);
        canvas.draw_circle(Point2::new(4.0, 4.0), 3.5, &paint);
        assert_eq!(canvas.root_bitmap().get_pixel(4, 4), opaque(1, 2, 3));
        let corner = canvas.root_bitmap().get_pixel(0, 0);
        assert_eq!(corner.a, 0);
    }
}
