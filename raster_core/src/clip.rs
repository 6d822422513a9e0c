//! The clip model: per-save-state clip regions represented as span sets.
//!
//! No single teacher file grounds this module (`tcw3_pal`'s backends
//! delegate clipping to the host 2D API), so it follows `spec.md` §4.3's
//! combination-rule table directly, built from this crate's own
//! [`Span`](crate::span::Span) type — the same shape the rasterizer
//! already produces, which is the contract §4.3 requires ("every
//! path/paint draw's rasterizer output is filtered through `performClip`
//! before reaching the brush").
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOp {
    Intersect,
    Difference,
}

/// A clip region: the spans it covers plus how a *new* shape combines with
/// them. An empty `spans` vector with no prior clip means "no clip"
/// (infinite); see [`Clip::none`].
#[derive(Debug, Clone)]
pub struct Clip {
    spans: Vec<Span>,
    op: ClipOp,
    /// `true` until the first `clip_rect`/`clip_path` call; distinguishes
    /// "no clip yet" from "clipped to an empty region".
    unbounded: bool,
}

impl Clip {
    pub fn none() -> Self {
        Clip { spans: Vec::new(), op: ClipOp::Intersect, unbounded: true }
    }

    pub fn is_unbounded(&self) -> bool {
        self.unbounded
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Combine this clip with new `spans`/`op`, per `spec.md` §4.3's
    /// combination rules.
    pub fn combine(&mut self, new_spans: Vec<Span>, new_op: ClipOp) {
        if self.unbounded {
            self.spans = new_spans;
            self.op = new_op;
            self.unbounded = false;
            return;
        }
        let (result, result_op) = match (self.op, new_op) {
            (ClipOp::Intersect, ClipOp::Intersect) => {
                (intersect_spans(&self.spans, &new_spans), ClipOp::Intersect)
            }
            (ClipOp::Difference, ClipOp::Difference) => {
                (merge_spans(&self.spans, &new_spans), ClipOp::Difference)
            }
            (ClipOp::Difference, ClipOp::Intersect) => {
                (subtract_spans(&new_spans, &self.spans), ClipOp::Intersect)
            }
            (ClipOp::Intersect, ClipOp::Difference) => {
                (subtract_spans(&self.spans, &new_spans), ClipOp::Intersect)
            }
        };
        self.spans = result;
        self.op = result_op;
    }

    /// Combined coverage at `(x, y)` for this clip, `255` when unbounded.
    pub fn coverage_at(&self, x: i32, y: i32) -> u8 {
        if self.unbounded {
            return 255;
        }
        for s in &self.spans {
            if s.y == y && x >= s.x && x < s.end_x() {
                return match self.op {
                    ClipOp::Intersect => s.cover,
                    ClipOp::Difference => 255u8.saturating_sub(s.cover),
                };
            }
        }
        match self.op {
            ClipOp::Intersect => 0,
            ClipOp::Difference => 255,
        }
    }

    /// Filter rasterizer output `spans` through this clip, combining
    /// coverage as `min(spanCover, clipCover)` per-pixel and splitting
    /// spans at clip-cover boundaries.
    pub fn apply(&self, spans: &[Span]) -> Vec<Span> {
        if self.unbounded {
            return spans.to_vec();
        }
        let mut out = Vec::with_capacity(spans.len());
        for s in spans {
            let mut x = s.x;
            let end = s.end_x();
            while x < end {
                let clip_cover = self.coverage_at(x, s.y);
                let cover = s.cover.min(clip_cover);
                // Extend the run while the combined cover stays the same.
                let mut run_end = x + 1;
                while run_end < end && self.coverage_at(run_end, s.y).min(s.cover) == cover {
                    run_end += 1;
                }
                if cover > 0 {
                    out.push(Span { x, y: s.y, len: run_end - x, cover });
                }
                x = run_end;
            }
        }
        out
    }
}

/// Pixelwise min of covers restricted to overlapping spans on the same
/// row; per-pixel granularity (simple but correct; callers needing bulk
/// throughput should prefer [`Clip::apply`]'s run-extension instead).
fn intersect_spans(a: &[Span], b: &[Span]) -> Vec<Span> {
    let mut out = Vec::new();
    for sa in a {
        for sb in b {
            if sa.y != sb.y {
                continue;
            }
            let x0 = sa.x.max(sb.x);
            let x1 = sa.end_x().min(sb.end_x());
            if x1 > x0 {
                out.push(Span { x: x0, y: sa.y, len: x1 - x0, cover: sa.cover.min(sb.cover) });
            }
        }
    }
    out.sort_by(|p, q| p.y.cmp(&q.y).then(p.x.cmp(&q.x)));
    out
}

/// Sorted union of two difference-clip span sets; duplicates are kept as
/// separate spans of decreasing cover per `spec.md` §4.3.
fn merge_spans(a: &[Span], b: &[Span]) -> Vec<Span> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out.sort_by(|p, q| p.y.cmp(&q.y).then(p.x.cmp(&q.x)).then(q.cover.cmp(&p.cover)));
    out
}

/// Subtract `subtrahend` (a difference-op span set) from `base`, yielding
/// the pixels of `base` not covered by `subtrahend`.
fn subtract_spans(base: &[Span], subtrahend: &[Span]) -> Vec<Span> {
    let mut out = Vec::new();
    for sb in base {
        let mut segments = vec![(sb.x, sb.end_x(), sb.cover)];
        for sub in subtrahend {
            if sub.y != sb.y {
                continue;
            }
            let mut next_segments = Vec::new();
            for (x0, x1, cover) in segments {
                if sub.end_x() <= x0 || sub.x >= x1 {
                    next_segments.push((x0, x1, cover));
                    continue;
                }
                if sub.x > x0 {
                    next_segments.push((x0, sub.x, cover));
                }
                let overlap_cover = cover.saturating_sub(sub.cover);
                let ov0 = sub.x.max(x0);
                let ov1 = sub.end_x().min(x1);
                if ov1 > ov0 && overlap_cover > 0 {
                    next_segments.push((ov0, ov1, overlap_cover));
                }
                if sub.end_x() < x1 {
                    next_segments.push((sub.end_x(), x1, cover));
                }
            }
            segments = next_segments;
        }
        for (x0, x1, cover) in segments {
            if x1 > x0 && cover > 0 {
                out.push(Span { x: x0, y: sb.y, len: x1 - x0, cover });
            }
        }
    }
    out.sort_by(|p, q| p.y.cmp(&q.y).then(p.x.cmp(&q.x)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_clip_passes_through() {
        let c = Clip::none();
        let spans = vec![Span { x: 0, y: 0, len: 4, cover: 255 }];
        assert_eq!(c.apply(&spans), spans);
    }

    #[test]
    fn intersect_shrinks_to_overlap() {
        let mut c = Clip::none();
        c.combine(vec![Span { x: 1, y: 0, len: 2, cover: 255 }], ClipOp::Intersect);
        let spans = vec![Span { x: 0, y: 0, len: 4, cover: 255 }];
        let out = c.apply(&spans);
        assert_eq!(out, vec![Span { x: 1, y: 0, len: 2, cover: 255 }]);
    }

    #[test]
    fn clip_monotonic_scenario_s4() {
        let mut c = Clip::none();
        c.combine(vec![Span { x: 1, y: 1, len: 2, cover: 255 }, Span { x: 1, y: 2, len: 2, cover: 255 }], ClipOp::Intersect);
        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let cov = c.coverage_at(x, y);
                assert_eq!(cov > 0, inside);
            }
        }
    }

    #[test]
    fn second_intersect_only_shrinks() {
        let mut c = Clip::none();
        c.combine(vec![Span { x: 0, y: 0, len: 4, cover: 255 }], ClipOp::Intersect);
        let before: Vec<_> = (0..4).map(|x| c.coverage_at(x, 0)).collect();
        c.combine(vec![Span { x: 1, y: 0, len: 2, cover: 255 }], ClipOp::Intersect);
        let after: Vec<_> = (0..4).map(|x| c.coverage_at(x, 0)).collect();
        for i in 0..4 {
            assert!(after[i] <= before[i]);
        }
    }
}
