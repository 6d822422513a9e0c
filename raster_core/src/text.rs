//! Text & glyph cache: a process-wide, mutex-guarded LRU keyed on
//! scaler-context parameters, per `spec.md` §4.7.
//!
//! LRU mechanics grounded on `iterpool::IterablePool`'s intrusive
//! "live"-entry list (touch-on-access modeled as deallocate+reallocate,
//! which always reinserts at the pool's current head) cross-checked
//! against `examples/original_source/src/base/lru_cache.hpp`'s
//! `LRUCache<K,V>` (`find` moves the touched entry to the list front,
//! `insert` evicts the list back while over `max_count_`).
use std::collections::HashMap;
use std::sync::Mutex;

use iterpool::{IterablePool, PoolPtr};
use once_cell::sync::Lazy;

use crate::geom::Path;
use crate::paint::{LineCap, LineJoin};

/// Cache key: `(typefaceId, size, scaleX, skewX, 2x2 transform,
/// strokeWidth, cap, join, miter, embolden)`, per `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalerContextDesc {
    pub typeface_id: u64,
    pub size: ordered_float::OrderedF32,
    pub scale_x: ordered_float::OrderedF32,
    pub skew_x: ordered_float::OrderedF32,
    pub transform: [ordered_float::OrderedF32; 4],
    pub stroke_width: ordered_float::OrderedF32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter: ordered_float::OrderedF32,
    pub embolden: bool,
}

/// A minimal total-ordering float wrapper, just enough to let
/// `ScalerContextDesc` derive `Hash`/`Eq` for use as a `HashMap` key. Not
/// exposed outside this module; callers build keys from plain `f32`s via
/// [`ScalerContextDesc::new`].
pub mod ordered_float {
    #[derive(Debug, Clone, Copy)]
    pub struct OrderedF32(pub f32);

    impl PartialEq for OrderedF32 {
        fn eq(&self, other: &Self) -> bool {
            self.0.to_bits() == other.0.to_bits()
        }
    }
    impl Eq for OrderedF32 {}
    impl std::hash::Hash for OrderedF32 {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.0.to_bits().hash(state);
        }
    }
}

impl Eq for ScalerContextDesc {}

impl std::hash::Hash for ScalerContextDesc {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.typeface_id.hash(state);
        self.size.hash(state);
        self.scale_x.hash(state);
        self.skew_x.hash(state);
        for t in &self.transform {
            t.hash(state);
        }
        self.stroke_width.hash(state);
        (self.cap as u8).hash(state);
        (self.join as u8).hash(state);
        self.miter.hash(state);
        self.embolden.hash(state);
    }
}

impl ScalerContextDesc {
    fn f(v: f32) -> ordered_float::OrderedF32 {
        ordered_float::OrderedF32(v)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        typeface_id: u64,
        size: f32,
        scale_x: f32,
        skew_x: f32,
        transform: [f32; 4],
        stroke_width: f32,
        cap: LineCap,
        join: LineJoin,
        miter: f32,
        embolden: bool,
    ) -> Self {
        ScalerContextDesc {
            typeface_id,
            size: Self::f(size),
            scale_x: Self::f(scale_x),
            skew_x: Self::f(skew_x),
            transform: transform.map(Self::f),
            stroke_width: Self::f(stroke_width),
            cap,
            join,
            miter: Self::f(miter),
            embolden,
        }
    }
}

pub type GlyphId = u32;

/// An immutable, pre-shaped run of glyphs with local offsets, the unit
/// `Canvas::draw_text_blob` (per `spec.md` §4.2) dispatches through
/// `Canvas::draw_glyphs`. Building one is the external shaper's job; this
/// crate only carries the already-shaped result.
#[derive(Debug, Clone, Default)]
pub struct TextBlob {
    pub glyph_ids: Vec<GlyphId>,
    pub offsets_x: Vec<f32>,
    pub offsets_y: Vec<f32>,
}

impl TextBlob {
    pub fn new(glyph_ids: Vec<GlyphId>, offsets_x: Vec<f32>, offsets_y: Vec<f32>) -> Self {
        debug_assert_eq!(glyph_ids.len(), offsets_x.len());
        debug_assert_eq!(glyph_ids.len(), offsets_y.len());
        TextBlob { glyph_ids, offsets_x, offsets_y }
    }

    pub fn is_empty(&self) -> bool {
        self.glyph_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FontMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub leading: f32,
}

/// Per-glyph data, lazily filled in as each piece is first requested.
#[derive(Debug, Clone, Default)]
pub struct GlyphData {
    pub advance: Option<f32>,
    pub path: Option<Path>,
    pub bitmap: Option<(Vec<u8>, u32, u32, i32, i32)>,
}

/// Cache value: font metrics plus a lazily-filled glyph map. Guarded by
/// its own mutex so per-glyph work never blocks the process-wide LRU.
pub struct ScalerContextContainer {
    pub metrics: FontMetrics,
    glyphs: Mutex<HashMap<GlyphId, GlyphData>>,
}

impl ScalerContextContainer {
    fn new(metrics: FontMetrics) -> Self {
        ScalerContextContainer { metrics, glyphs: Mutex::new(HashMap::new()) }
    }

    pub fn glyph(&self, id: GlyphId, fill: impl FnOnce() -> GlyphData) -> GlyphData {
        let mut map = self.glyphs.lock().unwrap();
        map.entry(id).or_insert_with(fill).clone()
    }
}

struct Entry {
    key: ScalerContextDesc,
    container: std::sync::Arc<ScalerContextContainer>,
}

/// Process-wide LRU cache of [`ScalerContextContainer`]s, capacity 2048,
/// eviction on access order.
pub struct GlyphCache {
    capacity: usize,
    pool: IterablePool<Entry>,
    index: HashMap<ScalerContextDesc, PoolPtr>,
}

impl GlyphCache {
    pub fn with_capacity(capacity: usize) -> Self {
        GlyphCache { capacity, pool: IterablePool::new(), index: HashMap::new() }
    }

    /// Look up `key`, touching it (moving it to the front of the LRU list)
    /// on hit; on miss, build a fresh container via `build` and insert it,
    /// evicting the least-recently-used entry first if at capacity.
    pub fn get_or_insert(
        &mut self,
        key: ScalerContextDesc,
        build: impl FnOnce() -> FontMetrics,
    ) -> std::sync::Arc<ScalerContextContainer> {
        if let Some(&ptr) = self.index.get(&key) {
            let container = self.pool[ptr].container.clone();
            // Touch: deallocate and reinsert so it becomes
            // `IterablePool`'s most-recently-used entry, the same "move to
            // front" semantics `lru_cache.hpp`'s `find` implements.
            self.pool.deallocate(ptr);
            let new_ptr = self.pool.allocate(Entry { key, container: container.clone() });
            self.index.insert(key, new_ptr);
            return container;
        }

        if self.index.len() >= self.capacity {
            self.evict_oldest();
        }

        let container = std::sync::Arc::new(ScalerContextContainer::new(build()));
        let ptr = self.pool.allocate(Entry { key, container: container.clone() });
        self.index.insert(key, ptr);
        container
    }

    /// Evict the pool's current tail-of-list entry, mirroring
    /// `lru_cache.hpp`'s `remove(cache_list_.back()->key)`.
    fn evict_oldest(&mut self) {
        // `IterablePool::iter` walks from `first_used` forward; since every
        // touch reinserts at the (new) head, the *first* element in
        // iteration order is the most-recently-used one, and the *last* is
        // the least-recently-used one.
        let oldest_key = match self.pool.iter().last() {
            Some(e) => e.key,
            None => return,
        };
        if let Some(ptr) = self.index.remove(&oldest_key) {
            self.pool.deallocate(ptr);
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// The process-wide singleton, protected by one mutex for the whole LRU
/// map; per-glyph work below holds only the container's own mutex, per
/// `spec.md` §5's two-tier locking model.
pub static GLYPH_CACHE: Lazy<Mutex<GlyphCache>> = Lazy::new(|| Mutex::new(GlyphCache::with_capacity(2048)));

/// Thresholds controlling [`choose_text_render_mode`]; pluggable per
/// `spec.md` §9's "dispatcher... is pluggable through two thresholds... and
/// one boolean".
#[derive(Debug, Clone, Copy)]
pub struct TextRenderThresholds {
    pub min_sdf_size: f32,
    pub max_sdf_size: f32,
    pub disallow_sdf: bool,
}

impl Default for TextRenderThresholds {
    fn default() -> Self {
        TextRenderThresholds { min_sdf_size: 24.0, max_sdf_size: 324.0, disallow_sdf: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRenderMode {
    DirectBitmap,
    Sdf,
    Path,
}

/// Choose a rendering mode for one glyph draw, per `spec.md` §4.7.
pub fn choose_text_render_mode(
    size: f32,
    has_color_table: bool,
    thresholds: TextRenderThresholds,
) -> TextRenderMode {
    if has_color_table {
        return TextRenderMode::DirectBitmap;
    }
    if !thresholds.disallow_sdf && size >= thresholds.min_sdf_size && size <= thresholds.max_sdf_size {
        TextRenderMode::Sdf
    } else if size < thresholds.min_sdf_size {
        TextRenderMode::DirectBitmap
    } else {
        TextRenderMode::Path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u64) -> ScalerContextDesc {
        ScalerContextDesc::new(id, 12.0, 1.0, 0.0, [1.0, 0.0, 0.0, 1.0], 0.0, LineCap::Butt, LineJoin::Miter, 4.0, false)
    }

    #[test]
    fn inserts_and_finds() {
        let mut cache = GlyphCache::with_capacity(4);
        let c1 = cache.get_or_insert(key(1), FontMetrics::default);
        let c2 = cache.get_or_insert(key(1), FontMetrics::default);
        assert!(std::sync::Arc::ptr_eq(&c1, &c2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = GlyphCache::with_capacity(2);
        cache.get_or_insert(key(1), FontMetrics::default);
        cache.get_or_insert(key(2), FontMetrics::default);
        // touch key(1) so key(2) becomes the least-recently-used entry.
        cache.get_or_insert(key(1), FontMetrics::default);
        cache.get_or_insert(key(3), FontMetrics::default);
        assert_eq!(cache.len(), 2);
        assert!(!cache.index.contains_key(&key(2)));
        assert!(cache.index.contains_key(&key(1)));
        assert!(cache.index.contains_key(&key(3)));
    }

    #[test]
    fn dispatcher_thresholds() {
        let t = TextRenderThresholds::default();
        assert_eq!(choose_text_render_mode(10.0, false, t), TextRenderMode::DirectBitmap);
        assert_eq!(choose_text_render_mode(48.0, false, t), TextRenderMode::Sdf);
        assert_eq!(choose_text_render_mode(48.0, true, t), TextRenderMode::DirectBitmap);
        let t2 = TextRenderThresholds { disallow_sdf: true, ..t };
        assert_eq!(choose_text_render_mode(48.0, false, t2), TextRenderMode::Path);
    }
}
