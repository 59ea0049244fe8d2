//! Raw video frame types and YUV420 to RGB conversion
//!
//! Frames arrive from a video source as three borrowed planes (`RawData`).
//! They are validated into a `RawFrame` and converted into an immutable,
//! shareable `DecodedImage`.

pub mod yuv;

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

pub use yuv::{convert, convert_pixel};

/// Identifies one of the three planes of a YUV420 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneKind {
    Y,
    U,
    V,
}

impl fmt::Display for PlaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaneKind::Y => write!(f, "Y"),
            PlaneKind::U => write!(f, "U"),
            PlaneKind::V => write!(f, "V"),
        }
    }
}

/// Reasons a frame handed over by a source cannot be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame has zero size ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("{0} plane is empty")]
    EmptyPlane(PlaneKind),
    #[error("{plane} plane stride {stride} is smaller than its row width {min}")]
    StrideTooSmall {
        plane: PlaneKind,
        stride: usize,
        min: usize,
    },
    #[error("{plane} plane geometry overflows (stride {stride}, {rows} rows)")]
    GeometryOverflow {
        plane: PlaneKind,
        stride: usize,
        rows: usize,
    },
    #[error("{plane} plane holds {len} bytes, {needed} needed")]
    PlaneTooShort {
        plane: PlaneKind,
        len: usize,
        needed: usize,
    },
}

/// A borrowed image plane with its row stride in bytes.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns `len` bytes of the given row.
    ///
    /// Only called on validated planes, where every row is in bounds.
    #[inline]
    pub(crate) fn row(&self, row: usize, len: usize) -> &'a [u8] {
        let start = row * self.stride;
        &self.data[start..start + len]
    }

    fn check(&self, kind: PlaneKind, row_width: usize, rows: usize) -> Result<(), FrameError> {
        if self.data.is_empty() {
            return Err(FrameError::EmptyPlane(kind));
        }
        if self.stride < row_width {
            return Err(FrameError::StrideTooSmall {
                plane: kind,
                stride: self.stride,
                min: row_width,
            });
        }
        let needed = self
            .stride
            .checked_mul(rows - 1)
            .and_then(|offset| offset.checked_add(row_width))
            .ok_or(FrameError::GeometryOverflow {
                plane: kind,
                stride: self.stride,
                rows,
            })?;
        if self.data.len() < needed {
            return Err(FrameError::PlaneTooShort {
                plane: kind,
                len: self.data.len(),
                needed,
            });
        }
        Ok(())
    }
}

/// Unvalidated I420 planes exactly as a source delivers them.
///
/// Only valid for the duration of one delivery callback.
#[derive(Debug, Clone, Copy)]
pub struct RawData<'a> {
    pub y: Plane<'a>,
    pub u: Plane<'a>,
    pub v: Plane<'a>,
    pub width: u32,
    pub height: u32,
}

impl<'a> RawData<'a> {
    /// Splits a tightly packed YUV420p buffer: Y plane, then U, then V, each
    /// without row padding. A short buffer yields short planes, which
    /// `validate` rejects.
    pub fn packed(buf: &'a [u8], width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        let cw = w.div_ceil(2);
        let c_len = cw.saturating_mul(h.div_ceil(2));

        let y_end = w.saturating_mul(h).min(buf.len());
        let u_end = y_end.saturating_add(c_len).min(buf.len());
        let v_end = u_end.saturating_add(c_len).min(buf.len());

        Self {
            y: Plane::new(&buf[..y_end], w),
            u: Plane::new(&buf[y_end..u_end], cw),
            v: Plane::new(&buf[u_end..v_end], cw),
            width,
            height,
        }
    }

    /// Checks the geometry of the planes against the frame size.
    pub fn validate(self) -> Result<RawFrame<'a>, FrameError> {
        RawFrame::new(self.y, self.u, self.v, self.width, self.height)
    }

    /// Total bytes referenced by the three planes.
    pub fn byte_len(&self) -> usize {
        self.y.data.len() + self.u.data.len() + self.v.data.len()
    }
}

/// A validated planar YUV420 frame.
///
/// `width` and `height` describe the luma plane, the chroma planes carry
/// `ceil(width / 2) x ceil(height / 2)` samples.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    y: Plane<'a>,
    u: Plane<'a>,
    v: Plane<'a>,
    width: u32,
    height: u32,
}

impl<'a> RawFrame<'a> {
    pub fn new(
        y: Plane<'a>,
        u: Plane<'a>,
        v: Plane<'a>,
        width: u32,
        height: u32,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimension { width, height });
        }

        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        y.check(PlaneKind::Y, w, h)?;
        u.check(PlaneKind::U, cw, ch)?;
        v.check(PlaneKind::V, cw, ch)?;

        Ok(Self {
            y,
            u,
            v,
            width,
            height,
        })
    }

    /// View over a tightly packed YUV420p buffer, see [`RawData::packed`].
    pub fn packed(buf: &'a [u8], width: u32, height: u32) -> Result<Self, FrameError> {
        RawData::packed(buf, width, height).validate()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn y(&self) -> Plane<'a> {
        self.y
    }

    pub fn u(&self) -> Plane<'a> {
        self.u
    }

    pub fn v(&self) -> Plane<'a> {
        self.v
    }

    pub fn chroma_width(&self) -> usize {
        (self.width as usize).div_ceil(2)
    }
}

/// Converted frame in packed RGBA8, immutable once produced.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl DecodedImage {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wraps an RGBA8 buffer of exactly `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, pixels: impl Into<Bytes>) -> Self {
        let pixels = pixels.into();
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * Self::BYTES_PER_PIXEL
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    /// Cheap reference-counted handle to the pixel buffer.
    pub fn pixels(&self) -> Bytes {
        self.pixels.clone()
    }

    /// RGB value at `(x, y)`, panics when out of bounds.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let offset = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size", &self.pixels.len())
            .finish()
    }
}
