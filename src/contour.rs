//! External contours of binary images and the measurements taken on them.

use crate::flood::{self, Connectivity};
use crate::frame::{Mask, Point, Region};
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;

/// Outermost boundary of one connected blob.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalContour {
    pub points: Vec<Point>,
}

/// Polygon moments of a contour (zeroth and first order).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl ExternalContour {
    /// Signed-area moments of the closed polygon through the contour points.
    pub fn moments(&self) -> Moments {
        let n = self.points.len();
        let (mut m00, mut m10, mut m01) = (0.0, 0.0, 0.0);
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            let (x0, y0, x1, y1) = (p.x as f64, p.y as f64, q.x as f64, q.y as f64);
            let cross = x0 * y1 - x1 * y0;
            m00 += cross;
            m10 += (x0 + x1) * cross;
            m01 += (y0 + y1) * cross;
        }
        Moments {
            m00: m00 / 2.0,
            m10: m10 / 6.0,
            m01: m01 / 6.0,
        }
    }

    /// Enclosed polygon area.
    pub fn area(&self) -> f64 {
        self.moments().m00.abs()
    }

    /// Center of mass of the enclosed polygon, truncated to integer pixels.
    ///
    /// Contours that enclose no area (single pixels, one-pixel-wide lines)
    /// fall back to the mean of their points.
    pub fn centroid(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let m = self.moments();
        if m.m00 != 0.0 {
            return Some(Point::new(
                (m.m10 / m.m00) as i32,
                (m.m01 / m.m00) as i32,
            ));
        }
        let n = self.points.len() as i64;
        let sx: i64 = self.points.iter().map(|p| p.x as i64).sum();
        let sy: i64 = self.points.iter().map(|p| p.y as i64).sum();
        Some(Point::new((sx / n) as i32, (sy / n) as i32))
    }

    pub fn bounding_box(&self) -> Region {
        let Some(first) = self.points.first() else {
            return Region::EMPTY;
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &self.points {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Region {
            x: x0.max(0) as u32,
            y: y0.max(0) as u32,
            width: (x1 - x0 + 1) as u32,
            height: (y1 - y0 + 1) as u32,
        }
    }

    /// Rasterize this contour filled (holes included) over a canvas the size
    /// of `binary`, the image the contour was traced on.
    pub fn fill(&self, binary: &Mask) -> Mask {
        let (width, height) = binary.dimensions();
        let Some(start) = self.points.first() else {
            return Mask::empty(width, height);
        };
        if start.x < 0 || start.y < 0 || start.x as u32 >= width || start.y as u32 >= height {
            return Mask::empty(width, height);
        }
        let blob = flood::flood_region(
            binary.as_image(),
            (start.x as u32, start.y as u32),
            Connectivity::Eight,
        );
        let component = GrayImage::from_fn(width, height, |x, y| {
            Luma([if blob[(y * width + x) as usize] { 255 } else { 0 }])
        });
        fill_external(&component)
    }
}

/// Trace the outermost contours of every blob of non-zero pixels.
///
/// Contours nested inside holes of other blobs are not reported.
pub fn external_contours(binary: &GrayImage) -> Vec<ExternalContour> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.parent.is_none())
        .map(|c| ExternalContour {
            points: c.points.iter().map(|p| Point::new(p.x, p.y)).collect(),
        })
        .collect()
}

/// Contour with the largest enclosed area; the first one wins ties.
pub fn largest(contours: &[ExternalContour]) -> Option<&ExternalContour> {
    let mut best: Option<(&ExternalContour, f64)> = None;
    for c in contours {
        let area = c.area();
        match best {
            Some((_, a)) if area <= a => {}
            _ => best = Some((c, area)),
        }
    }
    best.map(|(c, _)| c)
}

/// Fill every external contour of `binary`, ignoring holes.
///
/// Equivalent to drawing all outermost contours filled: a pixel is
/// background only if it is zero and 4-connected to the image border
/// through zero pixels.
pub fn fill_external(binary: &GrayImage) -> Mask {
    let (width, height) = binary.dimensions();
    let outside = flood::outside_background(binary);
    Mask::from_fn(width, height, |x, y| !outside[(y * width + x) as usize])
}

/// A counted object: its outline plus derived measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBlob {
    pub contour: ExternalContour,
    pub area: f64,
    pub centroid: Option<Point>,
    pub bounds: Region,
}

/// Objects in `mask` whose contour area is at least `min_area`, in trace order.
pub fn count_objects(mask: &Mask, min_area: f64) -> Vec<ObjectBlob> {
    external_contours(mask.as_image())
        .into_iter()
        .filter_map(|contour| {
            let area = contour.area();
            if area < min_area {
                return None;
            }
            Some(ObjectBlob {
                centroid: contour.centroid(),
                bounds: contour.bounding_box(),
                area,
                contour,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: u32, x0: u32, y0: u32, side: u32) -> Mask {
        Mask::from_fn(size, size, |x, y| {
            x >= x0 && x < x0 + side && y >= y0 && y < y0 + side
        })
    }

    #[test]
    fn square_centroid_and_area() {
        let mask = square_mask(20, 9, 9, 3);
        let contours = external_contours(mask.as_image());
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].centroid(), Some(Point::new(10, 10)));
        assert!((contours[0].area() - 4.0).abs() < 1e-9);
        assert_eq!(
            contours[0].bounding_box(),
            Region {
                x: 9,
                y: 9,
                width: 3,
                height: 3
            }
        );
    }

    #[test]
    fn single_pixel_contour_uses_point_mean() {
        let mask = square_mask(10, 4, 6, 1);
        let contours = external_contours(mask.as_image());
        assert_eq!(contours[0].centroid(), Some(Point::new(4, 6)));
    }

    #[test]
    fn largest_picks_biggest_blob() {
        let mut mask = square_mask(40, 2, 2, 3);
        mask.union(&square_mask(40, 20, 20, 10)).unwrap();
        let contours = external_contours(mask.as_image());
        assert_eq!(contours.len(), 2);
        let big = largest(&contours).unwrap();
        assert_eq!(big.centroid(), Some(Point::new(24, 24)));
    }

    #[test]
    fn fill_external_closes_holes() {
        let ring = Mask::from_fn(9, 9, |x, y| {
            let inside = (2..=6).contains(&x) && (2..=6).contains(&y);
            let hole = (3..=5).contains(&x) && (3..=5).contains(&y);
            inside && !hole
        });
        let filled = fill_external(ring.as_image());
        assert_eq!(filled.count(), 25);
        assert!(filled.get(4, 4));
        assert!(!filled.get(0, 0));
    }

    #[test]
    fn contour_fill_covers_only_its_blob() {
        let mut mask = square_mask(30, 1, 1, 4);
        mask.union(&square_mask(30, 15, 15, 6)).unwrap();
        let contours = external_contours(mask.as_image());
        let big = largest(&contours).unwrap();
        let filled = big.fill(&mask);
        assert_eq!(filled.count(), 36);
        assert!(!filled.get(2, 2));
    }

    #[test]
    fn count_skips_small_blobs() {
        let mut mask = square_mask(100, 5, 5, 4);
        mask.union(&square_mask(100, 40, 40, 20)).unwrap();
        mask.union(&square_mask(100, 70, 10, 15)).unwrap();
        let objects = count_objects(&mask, 100.0);
        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|o| o.area >= 100.0));
    }
}
