//! Interactive mask authoring bound to a displayed raster.
//!
//! The surface lives in display coordinates. Brush strokes accumulate into
//! a display-resolution coverage buffer; rectangle mode keeps only the
//! latest drag. Committing maps the selection through the surface's
//! [`DisplayTransform`] into a native-resolution [`CommittedMask`].
//!
//! ## Commit rules
//!
//! - Brush: a native pixel is selected when the display pixel under its
//!   center has coverage above the threshold.
//! - Rectangle: the corners are mapped to native coordinates and the
//!   rectangle is filled directly, independent of display resolution.
//! - Empty selections and rectangles under the minimum size are rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::committed::{CommittedMask, KEPT, SELECTED};
use super::geometry::{CropRect, DisplayTransform, Point};
use crate::transform::TransformError;

/// How pointer drags author the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    /// Freehand circular daubs, additive across drags.
    #[default]
    Brush,
    /// A single axis-aligned rectangle; each drag replaces the last.
    Rectangle,
}

/// Tunables for a surface, usually taken from `PipelineConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSettings {
    /// Brush radius in display pixels.
    pub brush_radius: f64,
    /// Minimum rectangle width and height in display pixels.
    pub min_selection_size: f64,
    /// Coverage values above this count as selected.
    pub coverage_threshold: u8,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            brush_radius: 20.0,
            min_selection_size: 10.0,
            coverage_threshold: 8,
        }
    }
}

/// Reasons a selection cannot be committed.
#[derive(Debug, Error, PartialEq)]
pub enum MaskError {
    #[error("Nothing is selected")]
    EmptySelection,

    #[error("Selection {width:.0}x{height:.0} is smaller than the {min:.0}px minimum")]
    SelectionTooSmall { width: f64, height: f64, min: f64 },

    #[error("Display transform ({scale_x}, {scale_y}) is not usable")]
    InvalidTransform { scale_x: f64, scale_y: f64 },

    #[error("Mask is {mask_width}x{mask_height} but the raster is {raster_width}x{raster_height}")]
    DimensionMismatch {
        mask_width: u32,
        mask_height: u32,
        raster_width: u32,
        raster_height: u32,
    },

    #[error(transparent)]
    Allocation(#[from] TransformError),
}

/// Mask authoring state for one displayed raster.
#[derive(Debug, Clone)]
pub struct MaskSurface {
    display_width: u32,
    display_height: u32,
    transform: DisplayTransform,
    settings: SurfaceSettings,
    mode: SelectionMode,
    /// Display-resolution brush coverage, one byte per display pixel.
    coverage: Vec<u8>,
    last_sample: Option<Point>,
    rect_origin: Option<Point>,
    rect: Option<CropRect>,
    has_selection: bool,
}

impl MaskSurface {
    /// Create a surface for a raster displayed at `display_width` x
    /// `display_height` under `transform`.
    pub fn new(
        display_width: u32,
        display_height: u32,
        transform: DisplayTransform,
        settings: SurfaceSettings,
    ) -> Self {
        Self {
            display_width,
            display_height,
            transform,
            settings,
            mode: SelectionMode::default(),
            coverage: vec![0; display_width as usize * display_height as usize],
            last_sample: None,
            rect_origin: None,
            rect: None,
            has_selection: false,
        }
    }

    /// Create a surface for a `native` raster shown at `display` size.
    pub fn fit(native: (u32, u32), display: (u32, u32), settings: SurfaceSettings) -> Option<Self> {
        let transform = DisplayTransform::fit(native, display)?;
        Some(Self::new(display.0, display.1, transform, settings))
    }

    /// Re-bind to a displayed raster of a new size. Clears the selection.
    pub fn rebind(&mut self, display_width: u32, display_height: u32, transform: DisplayTransform) {
        self.display_width = display_width;
        self.display_height = display_height;
        self.transform = transform;
        self.coverage = vec![0; display_width as usize * display_height as usize];
        self.last_sample = None;
        self.rect_origin = None;
        self.rect = None;
        self.has_selection = false;
    }

    /// Re-bind to a new native size at the current scale, e.g. after a crop.
    ///
    /// The display size is derived from the scale and the transform is
    /// recomputed to match it exactly. Returns false (and only clears) when
    /// no usable display size exists.
    pub fn rebind_native(&mut self, native_width: u32, native_height: u32) -> bool {
        if !self.transform.is_valid() || native_width == 0 || native_height == 0 {
            self.clear();
            return false;
        }
        let display_width = (native_width as f64 / self.transform.scale_x).round().max(1.0) as u32;
        let display_height = (native_height as f64 / self.transform.scale_y).round().max(1.0) as u32;
        match DisplayTransform::fit((native_width, native_height), (display_width, display_height)) {
            Some(transform) => {
                self.rebind(display_width, display_height, transform);
                true
            }
            None => {
                self.clear();
                false
            }
        }
    }

    /// Native size the surface maps onto, rounded to whole pixels.
    pub fn native_extent(&self) -> (u32, u32) {
        let w = (self.display_width as f64 * self.transform.scale_x).round();
        let h = (self.display_height as f64 * self.transform.scale_y).round();
        (w.max(0.0) as u32, h.max(0.0) as u32)
    }

    /// True when the display size under the transform lands within one
    /// pixel of `native_width` x `native_height`.
    pub fn fits_native(&self, native_width: u32, native_height: u32) -> bool {
        if !self.transform.is_valid() {
            return false;
        }
        let w = self.display_width as f64 * self.transform.scale_x;
        let h = self.display_height as f64 * self.transform.scale_y;
        (w - native_width as f64).abs() <= 1.0 && (h - native_height as f64).abs() <= 1.0
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Switch authoring mode. A selection made in one mode does not carry
    /// over to the other, so the surface is cleared on change.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        if mode != self.mode {
            self.clear();
            self.mode = mode;
        }
    }

    pub fn transform(&self) -> DisplayTransform {
        self.transform
    }

    pub fn display_dimensions(&self) -> (u32, u32) {
        (self.display_width, self.display_height)
    }

    pub fn settings(&self) -> SurfaceSettings {
        self.settings
    }

    pub fn brush_radius(&self) -> f64 {
        self.settings.brush_radius
    }

    pub fn set_brush_radius(&mut self, radius: f64) {
        if radius.is_finite() {
            self.settings.brush_radius = radius.max(0.5);
        }
    }

    /// True once anything has been authored since the last clear.
    pub fn has_selection(&self) -> bool {
        self.has_selection
    }

    /// The current rectangle, if in rectangle mode and one was drawn.
    pub fn rect(&self) -> Option<CropRect> {
        self.rect
    }

    /// Reset strokes and rectangle.
    pub fn clear(&mut self) {
        self.coverage.iter_mut().for_each(|c| *c = 0);
        self.last_sample = None;
        self.rect_origin = None;
        self.rect = None;
        self.has_selection = false;
    }

    /// Start a drag at `p` (display coordinates).
    pub fn pointer_down(&mut self, p: Point) {
        match self.mode {
            SelectionMode::Brush => {
                self.stamp(p);
                self.last_sample = Some(p).filter(|p| p.x.is_finite() && p.y.is_finite());
            }
            SelectionMode::Rectangle => {
                // A new drag discards the previous rectangle
                self.rect_origin = Some(p);
                self.rect = Some(CropRect::from_drag(p, p));
                self.has_selection = false;
            }
        }
    }

    /// Continue a drag to `p`. Ignored when no drag is active.
    pub fn pointer_move(&mut self, p: Point) {
        match self.mode {
            SelectionMode::Brush => {
                let Some(last) = self.last_sample else {
                    return;
                };
                if !p.x.is_finite() || !p.y.is_finite() {
                    return;
                }
                self.stamp_segment(last, p);
                self.last_sample = Some(p);
            }
            SelectionMode::Rectangle => {
                let Some(origin) = self.rect_origin else {
                    return;
                };
                let rect = CropRect::from_drag(origin, p);
                self.has_selection = rect.width != 0.0 && rect.height != 0.0;
                self.rect = Some(rect);
            }
        }
    }

    /// Finish the active drag.
    pub fn pointer_up(&mut self) {
        self.last_sample = None;
        self.rect_origin = None;
    }

    /// Number of display pixels whose coverage counts as selected.
    pub fn selected_display_pixels(&self) -> u64 {
        let threshold = self.settings.coverage_threshold;
        self.coverage.iter().filter(|&&c| c > threshold).count() as u64
    }

    /// Cheap pre-check used to enable or disable commit triggers.
    pub fn can_commit(&self) -> bool {
        match self.mode {
            SelectionMode::Brush => self.has_selection && self.selected_display_pixels() > 0,
            SelectionMode::Rectangle => self
                .rect
                .map(|r| r.meets_min_size(self.settings.min_selection_size))
                .unwrap_or(false),
        }
    }

    /// Rasterize the selection at native resolution.
    ///
    /// `native_width`/`native_height` must be the dimensions of the raster
    /// the selection was authored against.
    pub fn commit(&self, native_width: u32, native_height: u32) -> Result<CommittedMask, MaskError> {
        if !self.transform.is_valid() {
            return Err(MaskError::InvalidTransform {
                scale_x: self.transform.scale_x,
                scale_y: self.transform.scale_y,
            });
        }

        let mask = match self.mode {
            SelectionMode::Brush => self.rasterize_strokes(native_width, native_height)?,
            SelectionMode::Rectangle => self.rasterize_rect(native_width, native_height)?,
        };

        if mask.selected_count() == 0 {
            return Err(MaskError::EmptySelection);
        }
        Ok(mask)
    }

    /// Commit a rectangle for cropping instead of masking.
    ///
    /// Returns the display-space rectangle after the minimum-size check.
    pub fn commit_rect(&self) -> Result<CropRect, MaskError> {
        let rect = self.rect.ok_or(MaskError::EmptySelection)?;
        self.check_min_size(&rect)?;
        Ok(rect)
    }

    fn check_min_size(&self, rect: &CropRect) -> Result<(), MaskError> {
        let min = self.settings.min_selection_size;
        if !rect.meets_min_size(min) {
            return Err(MaskError::SelectionTooSmall {
                width: rect.width.abs(),
                height: rect.height.abs(),
                min,
            });
        }
        Ok(())
    }

    fn rasterize_strokes(&self, native_width: u32, native_height: u32) -> Result<CommittedMask, MaskError> {
        if !self.has_selection || self.display_width == 0 || self.display_height == 0 {
            return Err(MaskError::EmptySelection);
        }

        let mut data = alloc_mask(native_width, native_height)?;
        let threshold = self.settings.coverage_threshold;
        let max_dx = self.display_width as usize - 1;
        let max_dy = self.display_height as usize - 1;

        // Display column for every native column, computed once
        let columns: Vec<usize> = (0..native_width)
            .map(|nx| {
                let dx = ((nx as f64 + 0.5) / self.transform.scale_x).floor();
                (dx.max(0.0) as usize).min(max_dx)
            })
            .collect();

        for ny in 0..native_height as usize {
            let dy = ((ny as f64 + 0.5) / self.transform.scale_y).floor();
            let dy = (dy.max(0.0) as usize).min(max_dy);
            let coverage_row = &self.coverage[dy * self.display_width as usize..][..self.display_width as usize];
            let mask_row = &mut data[ny * native_width as usize..][..native_width as usize];

            for (value, &dx) in mask_row.iter_mut().zip(&columns) {
                if coverage_row[dx] > threshold {
                    *value = SELECTED;
                }
            }
        }

        Ok(CommittedMask {
            width: native_width,
            height: native_height,
            data,
        })
    }

    fn rasterize_rect(&self, native_width: u32, native_height: u32) -> Result<CommittedMask, MaskError> {
        let rect = self.rect.ok_or(MaskError::EmptySelection)?;
        self.check_min_size(&rect)?;

        let native = rect.normalized().to_native(&self.transform);
        let (max_w, max_h) = (native_width as f64, native_height as f64);
        let left = native.x.round().clamp(0.0, max_w) as usize;
        let top = native.y.round().clamp(0.0, max_h) as usize;
        let right = (native.x + native.width).round().clamp(0.0, max_w) as usize;
        let bottom = (native.y + native.height).round().clamp(0.0, max_h) as usize;

        let mut data = alloc_mask(native_width, native_height)?;
        for y in top..bottom {
            let row = y * native_width as usize;
            data[row + left..row + right].fill(SELECTED);
        }

        Ok(CommittedMask {
            width: native_width,
            height: native_height,
            data,
        })
    }

    /// Stamp circles along a segment so fast drags leave no gaps.
    ///
    /// Only the part of the segment that can touch the surface is stamped.
    fn stamp_segment(&mut self, from: Point, to: Point) {
        if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
            return;
        }
        let reach = self.settings.brush_radius + 1.0;
        let min = Point::new(-reach, -reach);
        let max = Point::new(
            self.display_width as f64 + reach,
            self.display_height as f64 + reach,
        );
        let Some((from, to)) = clip_segment(from, to, min, max) else {
            return;
        };

        let spacing = (self.settings.brush_radius / 2.0).max(0.5);
        let distance = from.distance(to);
        let steps = (distance / spacing).ceil().max(1.0) as usize;
        self.stamp(from);
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            self.stamp(Point::new(
                from.x + (to.x - from.x) * t,
                from.y + (to.y - from.y) * t,
            ));
        }
    }

    /// Add one filled circle to the coverage buffer. Coverage only grows.
    fn stamp(&mut self, center: Point) {
        if !center.x.is_finite() || !center.y.is_finite() {
            return;
        }
        let radius = self.settings.brush_radius;
        let w = self.display_width as i64;
        let h = self.display_height as i64;

        let x0 = ((center.x - radius - 1.0).floor() as i64).max(0);
        let x1 = ((center.x + radius + 1.0).ceil() as i64).min(w);
        let y0 = ((center.y - radius - 1.0).floor() as i64).max(0);
        let y1 = ((center.y + radius + 1.0).ceil() as i64).min(h);

        for y in y0..y1 {
            let py = y as f64 + 0.5;
            for x in x0..x1 {
                let px = x as f64 + 0.5;
                let d = (px - center.x).hypot(py - center.y);
                // One-pixel anti-aliased rim
                let alpha = (radius + 0.5 - d).clamp(0.0, 1.0);
                if alpha <= 0.0 {
                    continue;
                }
                let value = (alpha * 255.0).round() as u8;
                let idx = (y * w + x) as usize;
                if value > self.coverage[idx] {
                    self.coverage[idx] = value;
                }
                self.has_selection = true;
            }
        }
    }
}

/// Liang-Barsky clip of `from -> to` against the box `min..max`.
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;

    for (p, q) in [
        (-dx, from.x - min.x),
        (dx, max.x - from.x),
        (-dy, from.y - min.y),
        (dy, max.y - from.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| Point::new(from.x + dx * t, from.y + dy * t);
    Some((at(t0), at(t1)))
}

fn alloc_mask(width: u32, height: u32) -> Result<Vec<u8>, MaskError> {
    let (w, h) = (width as usize, height as usize);
    let len = w
        .checked_mul(h)
        .ok_or(TransformError::Allocation { width: w, height: h })?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| TransformError::Allocation { width: w, height: h })?;
    data.resize(len, KEPT);
    Ok(data)
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn point_strategy() -> impl Strategy<Value = (f64, f64)> {
        (-10.0f64..110.0, -10.0f64..110.0)
    }

    proptest! {
        /// Property: adding strokes never reduces the committed selection.
        #[test]
        fn prop_selection_is_monotonic(
            strokes in proptest::collection::vec(proptest::collection::vec(point_strategy(), 1..5), 1..8),
            scale in 0.5f64..3.0,
            radius in 1.0f64..15.0,
        ) {
            let mut s = MaskSurface::new(100, 100, DisplayTransform::new(scale, scale), SurfaceSettings::default());
            s.set_brush_radius(radius);
            let native = ((100.0 * scale) as u32, (100.0 * scale) as u32);

            let mut previous = 0u64;
            for stroke in strokes {
                let mut points = stroke.into_iter();
                if let Some((x, y)) = points.next() {
                    s.pointer_down(Point::new(x, y));
                }
                for (x, y) in points {
                    s.pointer_move(Point::new(x, y));
                }
                s.pointer_up();

                let count = s.commit(native.0, native.1).map(|m| m.selected_count()).unwrap_or(0);
                prop_assert!(count >= previous, "selection shrank from {} to {}", previous, count);
                previous = count;
            }
        }

        /// Property: committed masks always have the requested native size.
        #[test]
        fn prop_mask_matches_native_size(
            (nw, nh) in (1u32..300, 1u32..300),
            (x, y) in point_strategy(),
        ) {
            let mut s = MaskSurface::fit((nw, nh), (100, 100), SurfaceSettings::default()).unwrap();
            s.pointer_down(Point::new(x, y));
            if let Ok(mask) = s.commit(nw, nh) {
                prop_assert_eq!(mask.dimensions(), (nw, nh));
                prop_assert_eq!(mask.data.len(), (nw * nh) as usize);
            }
        }

        /// Property: rectangles with a side under the minimum are always rejected.
        #[test]
        fn prop_small_rectangles_rejected(
            (x, y) in point_strategy(),
            w in -9.99f64..9.99,
            h in -200.0f64..200.0,
        ) {
            let mut s = MaskSurface::new(100, 100, DisplayTransform::IDENTITY, SurfaceSettings::default());
            s.set_mode(SelectionMode::Rectangle);
            s.pointer_down(Point::new(x, y));
            s.pointer_move(Point::new(x + w, y + h));
            prop_assert!(s.commit(100, 100).is_err());
        }
    }
}
