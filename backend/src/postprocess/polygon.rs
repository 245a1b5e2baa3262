use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::point::Point;
use shared::Vertex;

use crate::model::{MaskError, MaskGrid};

/// Closed outline in pixel coordinates. Either empty or at least 3 points.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polygon {
    points: Vec<Point<i32>>,
}

impl Polygon {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn area(&self) -> f64 {
        shoelace_area(&self.points)
    }

    /// `(min_x, min_y, max_x, max_y)`, `None` when empty.
    pub fn bounding_box(&self) -> Option<(i32, i32, i32, i32)> {
        let first = self.points.first()?;
        Some(self.points.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        ))
    }

    pub fn to_vertices(&self) -> Vec<Vertex> {
        self.points.iter().map(|p| [p.x, p.y]).collect()
    }
}

// Accumulates in i64; twice the area of a large mask overflows i32.
fn shoelace_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

fn step(from: &Point<i32>, to: &Point<i32>) -> (i32, i32) {
    ((to.x - from.x).signum(), (to.y - from.y).signum())
}

/// Keeps only the points where the boundary changes direction, so straight
/// horizontal, vertical and diagonal runs collapse to their end points.
fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    (0..n)
        .filter(|&i| {
            let prev = &points[(i + n - 1) % n];
            let cur = &points[i];
            let next = &points[(i + 1) % n];
            step(prev, cur) != step(cur, next)
        })
        .map(|i| points[i])
        .collect()
}

/// Converts a detection mask into the outline of its largest external region.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskPolygonExtractor;

impl MaskPolygonExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, mask: &MaskGrid) -> Result<Polygon, MaskError> {
        if mask.height() == 0 || mask.width() == 0 {
            return Ok(Polygon::default());
        }
        // The tracer never starts a border in column 0, so regions touching the
        // mask edge need a background frame around them.
        let binary = mask.to_padded_binary_image(1)?;
        let contours: Vec<Contour<i32>> = find_contours(&binary);

        let (origin_row, origin_col) = mask.origin();
        let too_large = || MaskError::TooLarge {
            height: mask.height(),
            width: mask.width(),
        };
        let dx = i32::try_from(origin_col).map_err(|_| too_large())? - 1;
        let dy = i32::try_from(origin_row).map_err(|_| too_large())? - 1;

        // Contours come back in raster-scan discovery order; the strict
        // comparison keeps the earliest one when areas tie.
        let mut best: Option<Polygon> = None;
        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        {
            let shifted: Vec<Point<i32>> = contour
                .points
                .iter()
                .map(|p| Point::new(p.x + dx, p.y + dy))
                .collect();
            let points = compress_chain(&shifted);
            if points.len() < 3 {
                continue;
            }
            let candidate = Polygon { points };
            match &best {
                Some(current) if current.area() >= candidate.area() => {}
                _ => best = Some(candidate),
            }
        }

        Ok(best.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_mask(height: usize, width: usize, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> MaskGrid {
        MaskGrid::from_fn(height, width, |r, c| {
            if rows.contains(&r) && cols.contains(&c) { 1.0 } else { 0.0 }
        })
    }

    #[test]
    fn empty_mask_gives_empty_polygon() {
        let extractor = MaskPolygonExtractor::new();
        let polygon = extractor.extract(&MaskGrid::zeros(12, 9)).unwrap();
        assert!(polygon.is_empty());
        assert_eq!(polygon.bounding_box(), None);
    }

    #[test]
    fn zero_sized_mask_gives_empty_polygon() {
        let extractor = MaskPolygonExtractor::new();
        assert!(extractor.extract(&MaskGrid::zeros(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn filled_rectangle_compresses_to_corners() {
        let (w, h) = (7, 5);
        let mask = rect_mask(h, w, 0..h, 0..w);
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();

        assert!(polygon.len() >= 4);
        assert_eq!(polygon.bounding_box(), Some((0, 0, w as i32 - 1, h as i32 - 1)));

        let mut corners = polygon.to_vertices();
        corners.sort();
        assert_eq!(corners, vec![[0, 0], [0, 4], [6, 0], [6, 4]]);
        assert_eq!(polygon.area(), 24.0);
    }

    #[test]
    fn probability_values_count_as_foreground() {
        let mask = MaskGrid::from_fn(6, 6, |r, c| {
            if (1..5).contains(&r) && (1..5).contains(&c) { 0.2 } else { 0.0 }
        });
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((1, 1, 4, 4)));
    }

    #[test]
    fn largest_region_wins() {
        let mask = MaskGrid::from_fn(20, 20, |r, c| {
            let small = (1..4).contains(&r) && (1..4).contains(&c);
            let large = (8..18).contains(&r) && (6..16).contains(&c);
            if small || large { 1.0 } else { 0.0 }
        });
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((6, 8, 15, 17)));
    }

    #[test]
    fn equal_areas_keep_first_in_scan_order() {
        let mask = MaskGrid::from_fn(12, 12, |r, c| {
            let lower_left = (7..10).contains(&r) && (1..4).contains(&c);
            let upper_right = (1..4).contains(&r) && (7..10).contains(&c);
            if lower_left || upper_right { 1.0 } else { 0.0 }
        });
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((7, 1, 9, 3)));
    }

    #[test]
    fn holes_do_not_replace_the_outer_boundary() {
        let mask = MaskGrid::from_fn(10, 10, |r, c| {
            let ring = (1..9).contains(&r) && (1..9).contains(&c);
            let hole = (3..7).contains(&r) && (3..7).contains(&c);
            if ring && !hole { 1.0 } else { 0.0 }
        });
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((1, 1, 8, 8)));
        assert_eq!(polygon.len(), 4);
    }

    #[test]
    fn lines_and_single_pixels_are_not_usable() {
        let line = rect_mask(5, 8, 2..3, 1..7);
        assert!(MaskPolygonExtractor::new().extract(&line).unwrap().is_empty());

        let dot = rect_mask(5, 5, 2..3, 2..3);
        assert!(MaskPolygonExtractor::new().extract(&dot).unwrap().is_empty());
    }

    #[test]
    fn full_frame_mask_keeps_its_outline() {
        let mask = MaskGrid::from_fn(5, 7, |_, _| 1.0);
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((0, 0, 6, 4)));
        assert_eq!(polygon.len(), 4);
    }

    #[test]
    fn region_on_the_left_edge_is_found() {
        let mask = rect_mask(8, 8, 2..5, 0..4);
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((0, 2, 3, 4)));
        assert_eq!(polygon.area(), 6.0);
    }

    #[test]
    fn left_edge_region_competes_with_interior_blobs() {
        // Edge region larger than the interior blob.
        let mask = MaskGrid::from_fn(12, 12, |r, c| {
            let edge = (1..9).contains(&r) && (0..5).contains(&c);
            let blob = (2..5).contains(&r) && (8..11).contains(&c);
            if edge || blob { 1.0 } else { 0.0 }
        });
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((0, 1, 4, 8)));

        // Interior blob larger than the edge region.
        let mask = MaskGrid::from_fn(12, 12, |r, c| {
            let edge = (1..3).contains(&r) && (0..2).contains(&c);
            let blob = (4..10).contains(&r) && (4..10).contains(&c);
            if edge || blob { 1.0 } else { 0.0 }
        });
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        assert_eq!(polygon.bounding_box(), Some((4, 4, 9, 9)));
    }

    #[test]
    fn offset_mask_reports_image_coordinates() {
        let mask = MaskGrid::from_fn(3, 4, |_, _| 1.0).with_origin(10, 20);
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        let mut corners = polygon.to_vertices();
        corners.sort();
        assert_eq!(corners, vec![[20, 10], [20, 12], [23, 10], [23, 12]]);
    }

    #[test]
    fn diagonal_edges_collapse() {
        // Right triangle with the hypotenuse running corner to corner.
        let mask = MaskGrid::from_fn(6, 6, |r, c| if c <= r { 1.0 } else { 0.0 });
        let polygon = MaskPolygonExtractor::new().extract(&mask).unwrap();
        let mut corners = polygon.to_vertices();
        corners.sort();
        assert_eq!(corners, vec![[0, 0], [0, 5], [5, 5]]);
    }
}
