//! Connected-region flood fill over single-channel images.

use image::GrayImage;

/// Pixel neighborhood used when propagating a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i32, i32)] {
        const FOUR: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        const EIGHT: [(i32, i32); 8] = [
            (1, 0),
            (-1, 0),
            (0, 1),
            (0, -1),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Mark every pixel connected to `seed` that has the same value as the seed.
///
/// Returns a row-major membership vector the size of `image`. A seed outside
/// the image yields an all-false result.
pub fn flood_region(image: &GrayImage, seed: (u32, u32), connectivity: Connectivity) -> Vec<bool> {
    let (width, height) = image.dimensions();
    let mut filled = vec![false; (width * height) as usize];
    if seed.0 >= width || seed.1 >= height {
        return filled;
    }
    let target = image.get_pixel(seed.0, seed.1)[0];
    let mut stack = vec![seed];
    filled[(seed.1 * width + seed.0) as usize] = true;

    while let Some((x, y)) = stack.pop() {
        for &(dx, dy) in connectivity.offsets() {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            let idx = (ny * width + nx) as usize;
            if !filled[idx] && image.get_pixel(nx, ny)[0] == target {
                filled[idx] = true;
                stack.push((nx, ny));
            }
        }
    }

    filled
}

/// Mark zero pixels reachable from outside the image through 4-connected
/// zero pixels. Everything not marked lies inside (or on) some external
/// boundary of the non-zero pixels.
pub fn outside_background(image: &GrayImage) -> Vec<bool> {
    let (width, height) = image.dimensions();
    let mut reached = vec![false; (width * height) as usize];
    let mut stack = Vec::new();

    let visit = |x: u32, y: u32, reached: &mut Vec<bool>, stack: &mut Vec<(u32, u32)>| {
        let idx = (y * width + x) as usize;
        if !reached[idx] && image.get_pixel(x, y)[0] == 0 {
            reached[idx] = true;
            stack.push((x, y));
        }
    };

    for x in 0..width {
        visit(x, 0, &mut reached, &mut stack);
        if height > 1 {
            visit(x, height - 1, &mut reached, &mut stack);
        }
    }
    for y in 0..height {
        visit(0, y, &mut reached, &mut stack);
        if width > 1 {
            visit(width - 1, y, &mut reached, &mut stack);
        }
    }

    while let Some((x, y)) = stack.pop() {
        if x > 0 {
            visit(x - 1, y, &mut reached, &mut stack);
        }
        if x + 1 < width {
            visit(x + 1, y, &mut reached, &mut stack);
        }
        if y > 0 {
            visit(x, y - 1, &mut reached, &mut stack);
        }
        if y + 1 < height {
            visit(x, y + 1, &mut reached, &mut stack);
        }
    }

    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn ring() -> GrayImage {
        // 5x5 ring of 255 with a zero center
        GrayImage::from_fn(5, 5, |x, y| {
            let on = (1..=3).contains(&x) && (1..=3).contains(&y) && !(x == 2 && y == 2);
            Luma([if on { 255 } else { 0 }])
        })
    }

    #[test]
    fn flood_stops_at_value_change() {
        let filled = flood_region(&ring(), (0, 0), Connectivity::Four);
        assert_eq!(filled.iter().filter(|&&f| f).count(), 16);
        assert!(!filled[2 * 5 + 2]);
    }

    #[test]
    fn eight_connectivity_crosses_diagonals() {
        let img = GrayImage::from_fn(3, 3, |x, y| Luma([if x == y { 0 } else { 255 }]));
        let four = flood_region(&img, (0, 0), Connectivity::Four);
        let eight = flood_region(&img, (0, 0), Connectivity::Eight);
        assert_eq!(four.iter().filter(|&&f| f).count(), 1);
        assert_eq!(eight.iter().filter(|&&f| f).count(), 3);
    }

    #[test]
    fn seed_outside_image_fills_nothing() {
        let filled = flood_region(&ring(), (9, 9), Connectivity::Four);
        assert!(filled.iter().all(|&f| !f));
    }

    #[test]
    fn enclosed_hole_is_not_outside() {
        let reached = outside_background(&ring());
        assert!(!reached[2 * 5 + 2]);
        assert!(reached[0]);
        assert_eq!(reached.iter().filter(|&&r| r).count(), 16);
    }
}
