//! Authoring-time geometry: points, display transforms and drag rectangles.

use serde::{Deserialize, Serialize};

/// A point in display or native coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Scale factors from on-screen display coordinates to native pixels.
///
/// `native = display * scale`. Recomputed whenever the displayed raster
/// changes size; authored strokes and rectangles always travel with the
/// transform they were drawn under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayTransform {
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl DisplayTransform {
    /// One display pixel per native pixel.
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
    };

    pub fn new(scale_x: f64, scale_y: f64) -> Self {
        Self { scale_x, scale_y }
    }

    /// Transform for a `native` raster drawn at `display` size.
    ///
    /// Returns `None` if either display dimension is zero.
    pub fn fit(native: (u32, u32), display: (u32, u32)) -> Option<Self> {
        if display.0 == 0 || display.1 == 0 {
            return None;
        }
        Some(Self {
            scale_x: native.0 as f64 / display.0 as f64,
            scale_y: native.1 as f64 / display.1 as f64,
        })
    }

    /// Both factors are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.scale_x.is_finite() && self.scale_y.is_finite() && self.scale_x > 0.0 && self.scale_y > 0.0
    }

    /// Map a display point to native coordinates.
    #[inline]
    pub fn to_native(&self, p: Point) -> Point {
        Point::new(p.x * self.scale_x, p.y * self.scale_y)
    }

    /// Map a native point to display coordinates.
    #[inline]
    pub fn to_display(&self, p: Point) -> Point {
        Point::new(p.x / self.scale_x, p.y / self.scale_y)
    }
}

/// A drag rectangle in display coordinates.
///
/// `width`/`height` may be negative when the pointer moved up or left of
/// the drag origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning a drag origin and the current pointer.
    pub fn from_drag(origin: Point, pointer: Point) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: pointer.x - origin.x,
            height: pointer.y - origin.y,
        }
    }

    /// Equivalent rectangle with non-negative width and height.
    pub fn normalized(&self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when both |width| and |height| reach `min_size`.
    pub fn meets_min_size(&self, min_size: f64) -> bool {
        self.width.abs() >= min_size && self.height.abs() >= min_size
    }

    /// Rectangle in native coordinates under `transform`.
    pub fn to_native(&self, transform: &DisplayTransform) -> Self {
        Self {
            x: self.x * transform.scale_x,
            y: self.y * transform.scale_y,
            width: self.width * transform.scale_x,
            height: self.height * transform.scale_y,
        }
    }
}
