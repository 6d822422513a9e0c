//! [`Pixmap`]/[`Bitmap`]: the pixel buffer a [`crate::canvas::Canvas`] reads
//! from and draws into, per `spec.md` §3.
//!
//! Grounded on `tcw3_pal::unix::bitmap::Bitmap`'s `{data, size, stride}`
//! shape, generalized with the color/alpha-type tags and read-only flag
//! `spec.md` §3 calls for — the teacher's own `Bitmap` is always
//! RGBA8/premul and always built once (via `BitmapBuilder`) then frozen,
//! since Cairo's `ImageSurface` owns the pixels during drawing.
use bitflags::bitflags;
use std::cell::RefCell;
use std::rc::Rc;

use crate::color::PMColor;
use crate::shader::{premultiply, unpremultiply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Rgba8,
    Bgra8,
    Rgb565,
    A8,
}

impl ColorType {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Rgba8 | ColorType::Bgra8 => 4,
            ColorType::Rgb565 => 2,
            ColorType::A8 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaType {
    Opaque,
    Premul,
    Unpremul,
}

bitflags! {
    /// Per-[`Bitmap`] option flags. Small boolean-option-set shape, the
    /// same role `bitflags` plays for `tcw3_pal::iface::WndFlags`/
    /// `LayerFlags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BitmapFlags: u8 {
        const READ_ONLY = 1;
    }
}

/// A contiguous pixel buffer with an explicit color/alpha type, per
/// `spec.md` §3. Invariant: `stride >= width * bytes_per_pixel`.
#[derive(Debug)]
pub struct Pixmap {
    data: Box<[u8]>,
    width: u32,
    height: u32,
    stride: usize,
    color_type: ColorType,
    alpha_type: AlphaType,
    /// Invoked on drop when this `Pixmap` wraps an externally-supplied
    /// buffer rather than owning freshly allocated memory (spec.md §3:
    /// "Lifetime owned by the Bitmap or an externally supplied reference
    /// with a release callback").
    release: Option<Box<dyn FnOnce()>>,
}

impl Drop for Pixmap {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Pixmap {
    /// Allocate a zero-filled pixmap. Returns `None` for zero width/height,
    /// mirroring the factory-returns-nothing contract `spec.md` §4.2/§6
    /// describe for `makeSoftwareCanvas`.
    pub fn new(width: u32, height: u32, color_type: ColorType, alpha_type: AlphaType) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let stride = (width as usize).checked_mul(color_type.bytes_per_pixel())?;
        let len = stride.checked_mul(height as usize)?;
        Some(Pixmap {
            data: vec![0u8; len].into_boxed_slice(),
            width,
            height,
            stride,
            color_type,
            alpha_type,
            release: None,
        })
    }

    /// Wrap an externally supplied buffer; `release` runs once, when the
    /// last handle to this pixmap is dropped.
    pub fn from_external(
        data: Box<[u8]>,
        width: u32,
        height: u32,
        stride: usize,
        color_type: ColorType,
        alpha_type: AlphaType,
        release: impl FnOnce() + 'static,
    ) -> Option<Self> {
        if width == 0 || height == 0 || stride < width as usize * color_type.bytes_per_pixel() {
            return None;
        }
        if data.len() < stride * height as usize {
            return None;
        }
        Some(Pixmap {
            data,
            width,
            height,
            stride,
            color_type,
            alpha_type,
            release: Some(Box::new(release)),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    pub fn alpha_type(&self) -> AlphaType {
        self.alpha_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + x as usize * self.color_type.bytes_per_pixel()
    }

    /// Read pixel `(x, y)`, converting to premultiplied color space per
    /// `spec.md` §4.4's ingress contract. Out-of-bounds reads return
    /// transparent rather than panicking, consistent with this crate's
    /// best-effort draw contract (§7).
    pub fn get_pixel(&self, x: u32, y: u32) -> PMColor {
        if x >= self.width || y >= self.height {
            return PMColor::new(0, 0, 0, 0);
        }
        let o = self.offset(x, y);
        match self.color_type {
            ColorType::Rgba8 => self.to_premul([self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]]),
            ColorType::Bgra8 => self.to_premul([self.data[o + 2], self.data[o + 1], self.data[o], self.data[o + 3]]),
            ColorType::A8 => PMColor::new(0, 0, 0, self.data[o]),
            ColorType::Rgb565 => {
                let v = u16::from_le_bytes([self.data[o], self.data[o + 1]]);
                let r = (((v >> 11) & 0x1f) as u32 * 255 / 31) as u8;
                let g = (((v >> 5) & 0x3f) as u32 * 255 / 63) as u8;
                let b = ((v & 0x1f) as u32 * 255 / 31) as u8;
                PMColor::new(r, g, b, 255)
            }
        }
    }

    fn to_premul(&self, rgba: [u8; 4]) -> PMColor {
        match self.alpha_type {
            AlphaType::Opaque => PMColor::new(rgba[0], rgba[1], rgba[2], 255),
            AlphaType::Premul => PMColor::new(rgba[0], rgba[1], rgba[2], rgba[3]),
            AlphaType::Unpremul => premultiply(rgba),
        }
    }

    fn from_premul(&self, c: PMColor) -> [u8; 4] {
        match self.alpha_type {
            AlphaType::Opaque => [c.r, c.g, c.b, 255],
            AlphaType::Premul => [c.r, c.g, c.b, c.a],
            AlphaType::Unpremul => unpremultiply(c),
        }
    }

    /// Write pixel `(x, y)`; a silent no-op out of bounds, per the
    /// malformed-write contract of `spec.md` §7.
    pub fn set_pixel(&mut self, x: u32, y: u32, c: PMColor) {
        if x >= self.width || y >= self.height {
            return;
        }
        let o = self.offset(x, y);
        match self.color_type {
            ColorType::Rgba8 => {
                let [r, g, b, a] = self.from_premul(c);
                self.data[o] = r;
                self.data[o + 1] = g;
                self.data[o + 2] = b;
                self.data[o + 3] = a;
            }
            ColorType::Bgra8 => {
                let [r, g, b, a] = self.from_premul(c);
                self.data[o] = b;
                self.data[o + 1] = g;
                self.data[o + 2] = r;
                self.data[o + 3] = a;
            }
            ColorType::A8 => self.data[o] = c.a,
            ColorType::Rgb565 => {
                let r = (c.r as u16 * 31 / 255) & 0x1f;
                let g = (c.g as u16 * 63 / 255) & 0x3f;
                let b = (c.b as u16 * 31 / 255) & 0x1f;
                let v = (r << 11) | (g << 5) | b;
                let bytes = v.to_le_bytes();
                self.data[o] = bytes[0];
                self.data[o + 1] = bytes[1];
            }
        }
    }
}

/// Shared-ownership wrapper over a [`Pixmap`] plus a read-only flag, per
/// `spec.md` §3. `set_pixel` is a no-op when read-only.
#[derive(Debug, Clone)]
pub struct Bitmap {
    inner: Rc<RefCell<Pixmap>>,
    flags: BitmapFlags,
}

impl Bitmap {
    pub fn new(pixmap: Pixmap) -> Self {
        Bitmap { inner: Rc::new(RefCell::new(pixmap)), flags: BitmapFlags::empty() }
    }

    pub fn read_only(pixmap: Pixmap) -> Self {
        Bitmap { inner: Rc::new(RefCell::new(pixmap)), flags: BitmapFlags::READ_ONLY }
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(BitmapFlags::READ_ONLY)
    }

    pub fn width(&self) -> u32 {
        self.inner.borrow().width()
    }

    pub fn height(&self) -> u32 {
        self.inner.borrow().height()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> PMColor {
        self.inner.borrow().get_pixel(x, y)
    }

    pub fn set_pixel(&self, x: u32, y: u32, c: PMColor) {
        if self.is_read_only() {
            return;
        }
        self.inner.borrow_mut().set_pixel(x, y, c);
    }

    /// A new handle to the same underlying pixels (shared ownership, per
    /// `spec.md` §3), with its own independent read-only flag.
    pub fn share(&self) -> Bitmap {
        Bitmap { inner: Rc::clone(&self.inner), flags: self.flags }
    }

    pub fn to_read_only(&self) -> Bitmap {
        Bitmap { inner: Rc::clone(&self.inner), flags: self.flags | BitmapFlags::READ_ONLY }
    }

    pub fn with_pixmap<R>(&self, f: impl FnOnce(&Pixmap) -> R) -> R {
        f(&self.inner.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_pixmap_is_none() {
        assert!(Pixmap::new(0, 4, ColorType::Rgba8, AlphaType::Premul).is_none());
    }

    #[test]
    fn rgba8_round_trips_a_premul_pixel() {
        let mut pm = Pixmap::new(2, 2, ColorType::Rgba8, AlphaType::Premul).unwrap();
        let c = PMColor::new(10, 20, 30, 128);
        pm.set_pixel(1, 1, c);
        assert_eq!(pm.get_pixel(1, 1), c);
        assert_eq!(pm.get_pixel(0, 0), PMColor::new(0, 0, 0, 0));
    }

    #[test]
    fn opaque_alpha_type_ignores_stored_alpha() {
        let mut pm = Pixmap::new(1, 1, ColorType::Rgba8, AlphaType::Opaque).unwrap();
        pm.set_pixel(0, 0, PMColor::new(1, 2, 3, 40));
        assert_eq!(pm.get_pixel(0, 0), PMColor::new(1, 2, 3, 255));
    }

    #[test]
    fn out_of_bounds_write_is_a_no_op() {
        let mut pm = Pixmap::new(1, 1, ColorType::Rgba8, AlphaType::Premul).unwrap();
        pm.set_pixel(5, 5, PMColor::new(9, 9, 9, 9));
        assert_eq!(pm.get_pixel(0, 0), PMColor::new(0, 0, 0, 0));
    }

    #[test]
    fn read_only_bitmap_drops_writes() {
        let pm = Pixmap::new(1, 1, ColorType::Rgba8, AlphaType::Premul).unwrap();
        let bmp = Bitmap::read_only(pm);
        bmp.set_pixel(0, 0, PMColor::new(1, 2, 3, 255));
        assert_eq!(bmp.get_pixel(0, 0), PMColor::new(0, 0, 0, 0));
    }

    #[test]
    fn shared_handle_sees_writes() {
        let pm = Pixmap::new(1, 1, ColorType::Rgba8, AlphaType::Premul).unwrap();
        let a = Bitmap::new(pm);
        let b = a.share();
        a.set_pixel(0, 0, PMColor::new(9, 9, 9, 255));
        assert_eq!(b.get_pixel(0, 0), PMColor::new(9, 9, 9, 255));
    }

    #[test]
    fn release_callback_runs_once_on_drop() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = Arc::clone(&calls);
        let data = vec![0u8; 16].into_boxed_slice();
        let pm = Pixmap::from_external(data, 2, 2, 8, ColorType::Rgba8, AlphaType::Premul, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        drop(pm);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
