//! Path representation and the edge records derived from it.
use arrayvec::ArrayVec;
use cgmath::{Matrix3, Point2, Transform, Vector2};

use crate::paint::{LineCap, LineJoin};

/// How overlapping subpaths resolve into a single "inside"/"outside"
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillType {
    Winding,
    EvenOdd,
}

/// One drawing command in a [`Path`]. Coordinates are in the path's own
/// local space; the CTM is applied by the rasterizer, not stored here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verb {
    MoveTo(Point2<f32>),
    LineTo(Point2<f32>),
    QuadTo(Point2<f32>, Point2<f32>),
    CubicTo(Point2<f32>, Point2<f32>, Point2<f32>),
    /// A conic (rational quadratic) segment with weight `w`.
    ConicTo(Point2<f32>, Point2<f32>, f32),
    Close,
}

/// An ordered sequence of subpaths. Immutable once handed to the raster
/// pipeline; callers keep a separate builder if they need to mutate and
/// resubmit.
#[derive(Debug, Clone, Default)]
pub struct Path {
    verbs: Vec<Verb>,
    fill_type: FillType,
}

impl Default for FillType {
    fn default() -> Self {
        FillType::Winding
    }
}

impl Path {
    pub fn new() -> Self {
        Path { verbs: Vec::new(), fill_type: FillType::Winding }
    }

    pub fn fill_type(&self) -> FillType {
        self.fill_type
    }

    pub fn set_fill_type(&mut self, ft: FillType) {
        self.fill_type = ft;
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    pub fn move_to(&mut self, p: Point2<f32>) {
        self.verbs.push(Verb::MoveTo(p));
    }

    pub fn line_to(&mut self, p: Point2<f32>) {
        self.verbs.push(Verb::LineTo(p));
    }

    pub fn quad_to(&mut self, c: Point2<f32>, p: Point2<f32>) {
        self.verbs.push(Verb::QuadTo(c, p));
    }

    pub fn cubic_to(&mut self, c1: Point2<f32>, c2: Point2<f32>, p: Point2<f32>) {
        self.verbs.push(Verb::CubicTo(c1, c2, p));
    }

    pub fn conic_to(&mut self, c: Point2<f32>, p: Point2<f32>, weight: f32) {
        self.verbs.push(Verb::ConicTo(c, p, weight));
    }

    pub fn close(&mut self) {
        self.verbs.push(Verb::Close);
    }

    pub fn add_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(Point2::new(x, y));
        self.line_to(Point2::new(x + w, y));
        self.line_to(Point2::new(x + w, y + h));
        self.line_to(Point2::new(x, y + h));
        self.close();
    }

    pub fn add_oval(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        // Four cubic Bezier quadrants; same magic constant tcw3_pal's
        // `canvas_ellipse`/`canvas_rounded_rect` use for circular arcs.
        const CP: f32 = 0.552_284_8;
        let k = Point2::new;
        self.move_to(k(cx + rx, cy));
        self.cubic_to(
            k(cx + rx, cy + ry * CP),
            k(cx + rx * CP, cy + ry),
            k(cx, cy + ry),
        );
        self.cubic_to(
            k(cx - rx * CP, cy + ry),
            k(cx - rx, cy + ry * CP),
            k(cx - rx, cy),
        );
        self.cubic_to(
            k(cx - rx, cy - ry * CP),
            k(cx - rx * CP, cy - ry),
            k(cx, cy - ry),
        );
        self.cubic_to(
            k(cx + rx * CP, cy - ry),
            k(cx + rx, cy - ry * CP),
            k(cx + rx, cy),
        );
        self.close();
    }

    pub fn add_circle(&mut self, cx: f32, cy: f32, r: f32) {
        self.add_oval(cx, cy, r, r);
    }

    pub fn add_round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rx: f32, ry: f32) {
        const CP: f32 = 0.552_284_8;
        let k = Point2::new;
        self.move_to(k(x + rx, y));
        self.line_to(k(x + w - rx, y));
        self.cubic_to(k(x + w - rx + rx * CP, y), k(x + w, y + ry - ry * CP), k(x + w, y + ry));
        self.line_to(k(x + w, y + h - ry));
        self.cubic_to(
            k(x + w, y + h - ry + ry * CP),
            k(x + w - rx + rx * CP, y + h),
            k(x + w - rx, y + h),
        );
        self.line_to(k(x + rx, y + h));
        self.cubic_to(k(x + rx - rx * CP, y + h), k(x, y + h - ry + ry * CP), k(x, y + h - ry));
        self.line_to(k(x, y + ry));
        self.cubic_to(k(x, y + ry - ry * CP), k(x + rx - rx * CP, y), k(x + rx, y));
        self.close();
    }

    /// Tight (non-CTM-mapped) bounds of all on-curve and control points.
    /// Cheap over-approximation, sufficient for clip-bound intersection
    /// before the expensive per-scanline work begins.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let mut min = Point2::new(f32::INFINITY, f32::INFINITY);
        let mut max = Point2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        let mut any = false;
        let mut visit = |p: Point2<f32>| {
            if p.x.is_finite() && p.y.is_finite() {
                any = true;
                min.x = min.x.min(p.x);
                min.y = min.y.min(p.y);
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
        };
        for v in &self.verbs {
            match *v {
                Verb::MoveTo(p) | Verb::LineTo(p) => visit(p),
                Verb::QuadTo(c, p) => {
                    visit(c);
                    visit(p);
                }
                Verb::CubicTo(c1, c2, p) => {
                    visit(c1);
                    visit(c2);
                    visit(p);
                }
                Verb::ConicTo(c, p, _) => {
                    visit(c);
                    visit(p);
                }
                Verb::Close => {}
            }
        }
        if any {
            Some((min.x, min.y, max.x - min.x, max.y - min.y))
        } else {
            None
        }
    }
}

/// A line segment produced by flattening curves, in device space, ready to
/// become a rasterizer [`Edge`]. Degenerate (NaN/∞-containing or
/// zero-length-in-y) segments are never produced by [`flatten`].
#[derive(Debug, Clone, Copy)]
pub struct FlatSegment {
    pub p0: Point2<f32>,
    pub p1: Point2<f32>,
}

/// Flatten `path` through `ctm` into line segments suitable for edge
/// building. Quadratics and cubics are subdivided to a fixed depth; this is
/// a minimal internal stand-in for the tolerance-driven flattener the
/// engine normally delegates to (path construction and curve flattening are
/// out of this crate's scope — see `SPEC_FULL.md` Non-goals), just enough
/// to keep the rasterizer self-contained for paths built directly through
/// [`Path`]'s own verbs.
pub fn flatten(path: &Path, ctm: &Matrix3<f32>, out: &mut Vec<FlatSegment>) {
    let mut start = Point2::new(0.0, 0.0);
    let mut cur = Point2::new(0.0, 0.0);
    let xform = |p: Point2<f32>| ctm.transform_point(p);

    let mut push_line = |a: Point2<f32>, b: Point2<f32>, out: &mut Vec<FlatSegment>| {
        if a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite() && a.y != b.y {
            out.push(FlatSegment { p0: a, p1: b });
        } else if a.x.is_finite() && b.x.is_finite() && a.y == b.y {
            // horizontal segments contribute zero winding, skipped per spec
        }
    };

    const QUAD_STEPS: usize = 12;
    const CUBIC_STEPS: usize = 16;

    for v in path.verbs() {
        match *v {
            Verb::MoveTo(p) => {
                start = xform(p);
                cur = start;
            }
            Verb::LineTo(p) => {
                let np = xform(p);
                push_line(cur, np, out);
                cur = np;
            }
            Verb::QuadTo(c, p) => {
                let c = xform(c);
                let np = xform(p);
                let mut prev = cur;
                for i in 1..=QUAD_STEPS {
                    let t = i as f32 / QUAD_STEPS as f32;
                    let mt = 1.0 - t;
                    let q = Point2::new(
                        mt * mt * cur.x + 2.0 * mt * t * c.x + t * t * np.x,
                        mt * mt * cur.y + 2.0 * mt * t * c.y + t * t * np.y,
                    );
                    push_line(prev, q, out);
                    prev = q;
                }
                cur = np;
            }
            Verb::CubicTo(c1, c2, p) => {
                let c1 = xform(c1);
                let c2 = xform(c2);
                let np = xform(p);
                let mut prev = cur;
                for i in 1..=CUBIC_STEPS {
                    let t = i as f32 / CUBIC_STEPS as f32;
                    let mt = 1.0 - t;
                    let q = Point2::new(
                        mt * mt * mt * cur.x
                            + 3.0 * mt * mt * t * c1.x
                            + 3.0 * mt * t * t * c2.x
                            + t * t * t * np.x,
                        mt * mt * mt * cur.y
                            + 3.0 * mt * mt * t * c1.y
                            + 3.0 * mt * t * t * c2.y
                            + t * t * t * np.y,
                    );
                    push_line(prev, q, out);
                    prev = q;
                }
                cur = np;
            }
            Verb::ConicTo(c, p, w) => {
                let c = xform(c);
                let np = xform(p);
                let mut prev = cur;
                for i in 1..=QUAD_STEPS {
                    let t = i as f32 / QUAD_STEPS as f32;
                    let mt = 1.0 - t;
                    let denom = mt * mt + 2.0 * mt * t * w + t * t;
                    let q = Point2::new(
                        (mt * mt * cur.x + 2.0 * mt * t * w * c.x + t * t * np.x) / denom,
                        (mt * mt * cur.y + 2.0 * mt * t * w * c.y + t * t * np.y) / denom,
                    );
                    push_line(prev, q, out);
                    prev = q;
                }
                cur = np;
            }
            Verb::Close => {
                push_line(cur, start, out);
                cur = start;
            }
        }
    }
    // Implicitly close the final subpath: a filled path is always treated
    // as if every subpath were closed.
    if cur != start {
        push_line(cur, start, out);
    }
}

/// A rasterization-ready edge: a non-horizontal segment in 16.16
/// fixed-point, plus the slope used to step `x` across scanlines.
///
/// Owned by the raster scratch arena for the duration of one `rasterize`
/// call (see [`crate::raster`]).
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub upper_y: crate::fixed::Fixed,
    pub lower_y: crate::fixed::Fixed,
    pub x: crate::fixed::Fixed,
    pub dx_dy: crate::fixed::Fixed,
    pub winding: i32,
}

/// Build edges from flattened segments. Horizontal segments are dropped
/// (zero contribution); edges are returned sorted by `(upper_y, x)`.
pub fn build_edges(segments: &[FlatSegment]) -> Vec<Edge> {
    use crate::fixed::Fixed;

    let mut edges = Vec::with_capacity(segments.len());
    for seg in segments {
        let (p0, p1, winding) = if seg.p0.y < seg.p1.y {
            (seg.p0, seg.p1, 1)
        } else if seg.p1.y < seg.p0.y {
            (seg.p1, seg.p0, -1)
        } else {
            continue;
        };
        let upper_y = Fixed::from_f32(p0.y);
        let lower_y = Fixed::from_f32(p1.y);
        if upper_y.is_nan() || lower_y.is_nan() {
            continue;
        }
        let dy = p1.y - p0.y;
        if dy == 0.0 {
            continue;
        }
        let dx_dy = Fixed::from_f32((p1.x - p0.x) / dy);
        let x = Fixed::from_f32(p0.x);
        edges.push(Edge { upper_y, lower_y, x, dx_dy, winding });
    }
    edges.sort_by(|a, b| a.upper_y.cmp(&b.upper_y).then(a.x.cmp(&b.x)));
    edges
}

/// Walk `path`'s verbs into flattened subpaths of points (curves subdivided
/// at the same step counts [`flatten`] uses), each tagged with whether it
/// was explicitly closed. Unlike [`flatten`], horizontal segments and
/// implicit closing are both preserved, since a stroke outline needs the
/// path's true open/closed shape rather than a fill-ready edge list.
fn subpaths(path: &Path) -> Vec<(Vec<Point2<f32>>, bool)> {
    const QUAD_STEPS: usize = 12;
    const CUBIC_STEPS: usize = 16;

    let mut out = Vec::new();
    let mut cur_pts: Vec<Point2<f32>> = Vec::new();
    let mut start = Point2::new(0.0, 0.0);
    let mut cur = Point2::new(0.0, 0.0);
    let mut closed = false;

    let flush = |out: &mut Vec<(Vec<Point2<f32>>, bool)>, pts: &mut Vec<Point2<f32>>, closed: bool| {
        if pts.len() >= 2 {
            out.push((std::mem::take(pts), closed));
        } else {
            pts.clear();
        }
    };

    for v in path.verbs() {
        match *v {
            Verb::MoveTo(p) => {
                flush(&mut out, &mut cur_pts, closed);
                start = p;
                cur = p;
                closed = false;
                cur_pts.push(p);
            }
            Verb::LineTo(p) => {
                cur_pts.push(p);
                cur = p;
            }
            Verb::QuadTo(c, p) => {
                for i in 1..=QUAD_STEPS {
                    let t = i as f32 / QUAD_STEPS as f32;
                    let mt = 1.0 - t;
                    cur_pts.push(Point2::new(
                        mt * mt * cur.x + 2.0 * mt * t * c.x + t * t * p.x,
                        mt * mt * cur.y + 2.0 * mt * t * c.y + t * t * p.y,
                    ));
                }
                cur = p;
            }
            Verb::CubicTo(c1, c2, p) => {
                for i in 1..=CUBIC_STEPS {
                    let t = i as f32 / CUBIC_STEPS as f32;
                    let mt = 1.0 - t;
                    cur_pts.push(Point2::new(
                        mt * mt * mt * cur.x + 3.0 * mt * mt * t * c1.x + 3.0 * mt * t * t * c2.x + t * t * t * p.x,
                        mt * mt * mt * cur.y + 3.0 * mt * mt * t * c1.y + 3.0 * mt * t * t * c2.y + t * t * t * p.y,
                    ));
                }
                cur = p;
            }
            Verb::ConicTo(c, p, w) => {
                for i in 1..=QUAD_STEPS {
                    let t = i as f32 / QUAD_STEPS as f32;
                    let mt = 1.0 - t;
                    let denom = mt * mt + 2.0 * mt * t * w + t * t;
                    cur_pts.push(Point2::new(
                        (mt * mt * cur.x + 2.0 * mt * t * w * c.x + t * t * p.x) / denom,
                        (mt * mt * cur.y + 2.0 * mt * t * w * c.y + t * t * p.y) / denom,
                    ));
                }
                cur = p;
            }
            Verb::Close => {
                if cur != start {
                    cur_pts.push(start);
                }
                closed = true;
                flush(&mut out, &mut cur_pts, closed);
                cur = start;
                closed = false;
            }
        }
    }
    flush(&mut out, &mut cur_pts, closed);
    out
}

const ROUND_JOIN_STEPS: usize = 8;

/// Append a fan of triangles approximating a circular arc from `from` to
/// `to` around `center`, radius `r`, as a winding-filled wedge. Bounded to
/// [`ROUND_JOIN_STEPS`] + 1 samples, well under the `ArrayVec` capacity.
fn append_round_wedge(out: &mut Path, center: Point2<f32>, from: Vector2<f32>, to: Vector2<f32>, r: f32) {
    let a0 = from.y.atan2(from.x);
    let mut a1 = to.y.atan2(to.x);
    let mut delta = a1 - a0;
    while delta > std::f32::consts::PI {
        delta -= 2.0 * std::f32::consts::PI;
    }
    while delta < -std::f32::consts::PI {
        delta += 2.0 * std::f32::consts::PI;
    }
    a1 = a0 + delta;

    let mut pts: ArrayVec<Point2<f32>, { ROUND_JOIN_STEPS + 1 }> = ArrayVec::new();
    for i in 0..=ROUND_JOIN_STEPS {
        let t = a0 + (a1 - a0) * (i as f32 / ROUND_JOIN_STEPS as f32);
        pts.push(Point2::new(center.x + r * t.cos(), center.y + r * t.sin()));
    }
    out.move_to(center);
    for p in &pts {
        out.line_to(*p);
    }
    out.close();
}

/// Build a fill-equivalent outline for stroking `path` at `width`, a
/// minimal internal stand-in for the engine's real stroker (path building
/// and curve-to-stroke conversion are out of this crate's scope, see
/// `SPEC_FULL.md` Non-goals): each segment becomes its own offset
/// quadrilateral, joined and capped with circular wedges regardless of the
/// requested [`LineJoin`]/[`LineCap`] (round is an over-approximation of
/// miter/bevel/butt/square, close enough for the coverage this crate needs
/// to produce). Degenerate `width <= 0` yields an empty path.
pub fn stroke_to_fill(path: &Path, width: f32, _join: LineJoin, _cap: LineCap) -> Path {
    let mut out = Path::new();
    out.set_fill_type(FillType::Winding);
    if width <= 0.0 {
        return out;
    }
    let half = width / 2.0;

    for (pts, closed) in subpaths(path) {
        let n = pts.len();
        if n < 2 {
            continue;
        }
        let seg_normal = |i: usize| -> Vector2<f32> {
            let d = pts[(i + 1) % n] - pts[i];
            let len = (d.x * d.x + d.y * d.y).sqrt();
            if len < 1e-6 {
                Vector2::new(0.0, 0.0)
            } else {
                Vector2::new(-d.y / len, d.x / len) * half
            }
        };

        let seg_count = if closed { n } else { n - 1 };
        for i in 0..seg_count {
            let a = pts[i];
            let b = pts[(i + 1) % n];
            let nrm = seg_normal(i);
            if nrm.x == 0.0 && nrm.y == 0.0 {
                continue;
            }
            out.move_to(Point2::new(a.x + nrm.x, a.y + nrm.y));
            out.line_to(Point2::new(b.x + nrm.x, b.y + nrm.y));
            out.line_to(Point2::new(b.x - nrm.x, b.y - nrm.y));
            out.line_to(Point2::new(a.x - nrm.x, a.y - nrm.y));
            out.close();
        }

        let joint_count = if closed { n } else { n.saturating_sub(2) };
        for j in 0..joint_count {
            let vertex = if closed { j } else { j + 1 };
            let prev_seg = if vertex == 0 { seg_count - 1 } else { vertex - 1 };
            let next_seg = vertex % seg_count;
            let n0 = seg_normal(prev_seg);
            let n1 = seg_normal(next_seg);
            if (n0.x == 0.0 && n0.y == 0.0) || (n1.x == 0.0 && n1.y == 0.0) {
                continue;
            }
            append_round_wedge(&mut out, pts[vertex], n0, n1, half);
        }

        if !closed {
            append_round_wedge(&mut out, pts[0], seg_normal(0) * -1.0, seg_normal(0), half);
            let last = n - 2;
            append_round_wedge(&mut out, pts[n - 1], seg_normal(last), seg_normal(last) * -1.0, half);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::SquareMatrix;

    #[test]
    fn rect_has_four_edges() {
        let mut p = Path::new();
        p.add_rect(0.0, 0.0, 4.0, 4.0);
        let mut segs = Vec::new();
        flatten(&p, &Matrix3::identity(), &mut segs);
        let edges = build_edges(&segs);
        // two vertical sides produce edges; horizontal top/bottom are dropped.
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn triangle_edges_sorted_by_upper_y() {
        let mut p = Path::new();
        p.move_to(Point2::new(0.0, 0.0));
        p.line_to(Point2::new(2.0, 0.0));
        p.line_to(Point2::new(0.0, 2.0));
        p.close();
        let mut segs = Vec::new();
        flatten(&p, &Matrix3::identity(), &mut segs);
        let edges = build_edges(&segs);
        for w in edges.windows(2) {
            assert!(w[0].upper_y <= w[1].upper_y);
        }
    }
}
