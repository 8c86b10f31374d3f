// src/geometry.rs
//
// Planar primitives shared by the tracker, fusion and classifier:
// axis-aligned boxes, points, and simple (possibly concave) polygons.
//
//   - IoU between boxes
//   - Ray-casting containment
//   - Shoelace area
//   - Sutherland-Hodgman clipping of a polygon against a box. The box is
//     convex, so clipping any simple subject polygon against it yields the
//     correct intersection area even when the subject is concave.

use serde::{Deserialize, Serialize};

/// Smallest width used when computing aspect ratios, so a zero-width box
/// produces a large ratio instead of a division by zero.
const MIN_WIDTH: f32 = 1e-6;

// ============================================================================
// POINT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f32; 2]> for Point {
    fn from(p: [f32; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

// ============================================================================
// BOUNDING BOX
// ============================================================================

/// Axis-aligned box in pixel coordinates, serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }

    /// Height over width. Upright people are tall (> 1), seated people
    /// are closer to square.
    pub fn aspect_ratio(&self) -> f32 {
        self.height() / self.width().max(MIN_WIDTH)
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Zero or negative area, or any non-finite coordinate.
    pub fn is_degenerate(&self) -> bool {
        !self.is_finite() || self.area() <= 0.0
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    /// Clamp to `[0, width] x [0, height]`.
    pub fn clamp_to(&self, width: f32, height: f32) -> Self {
        Self::new(
            self.x1.clamp(0.0, width),
            self.y1.clamp(0.0, height),
            self.x2.clamp(0.0, width),
            self.y2.clamp(0.0, height),
        )
    }

    pub fn expand(&self, padding: f32) -> Self {
        Self::new(
            self.x1 - padding,
            self.y1 - padding,
            self.x2 + padding,
            self.y2 + padding,
        )
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        iou(self, other)
    }
}

impl From<[f32; 4]> for BBox {
    fn from(b: [f32; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Intersection over union of two boxes; 0 when they do not overlap.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }
    let inter = (x2 - x1) * (y2 - y1);
    let union = a.area() + b.area() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

// ============================================================================
// POLYGON
// ============================================================================

/// Simple polygon given by its vertices in drawing order (either winding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    pub fn from_coords(coords: &[(f32, f32)]) -> Self {
        Self::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Unsigned shoelace area.
    pub fn area(&self) -> f32 {
        shoelace_area(&self.vertices)
    }

    /// Ray-casting point-in-polygon test. Points exactly on an edge may
    /// land either side.
    pub fn contains(&self, p: &Point) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = self.vertices[i];
            let vj = self.vertices[j];
            if (vi.y > p.y) != (vj.y > p.y)
                && p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Tight axis-aligned bounds; `None` for an empty polygon.
    pub fn bounding_box(&self) -> Option<BBox> {
        let first = self.vertices.first()?;
        let init = BBox::new(first.x, first.y, first.x, first.y);
        Some(self.vertices.iter().fold(init, |b, v| {
            BBox::new(b.x1.min(v.x), b.y1.min(v.y), b.x2.max(v.x), b.y2.max(v.y))
        }))
    }

    /// Area of the part of this polygon that lies inside `rect`.
    pub fn intersection_area(&self, rect: &BBox) -> f32 {
        if self.vertices.len() < 3 || rect.is_degenerate() {
            return 0.0;
        }
        let mut clipped = self.vertices.clone();
        clipped = clip_half_plane(&clipped, |p| p.x >= rect.x1, |s, e| at_x(s, e, rect.x1));
        clipped = clip_half_plane(&clipped, |p| p.x <= rect.x2, |s, e| at_x(s, e, rect.x2));
        clipped = clip_half_plane(&clipped, |p| p.y >= rect.y1, |s, e| at_y(s, e, rect.y1));
        clipped = clip_half_plane(&clipped, |p| p.y <= rect.y2, |s, e| at_y(s, e, rect.y2));
        shoelace_area(&clipped)
    }
}

fn shoelace_area(vertices: &[Point]) -> f32 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0f64;
    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        twice_area += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    (twice_area.abs() * 0.5) as f32
}

/// One Sutherland-Hodgman pass against a single half-plane.
fn clip_half_plane<I, X>(subject: &[Point], inside: I, intersect: X) -> Vec<Point>
where
    I: Fn(&Point) -> bool,
    X: Fn(&Point, &Point) -> Point,
{
    let mut out = Vec::with_capacity(subject.len() + 4);
    let Some(&last) = subject.last() else {
        return out;
    };
    let mut s = last;
    for &e in subject {
        match (inside(&s), inside(&e)) {
            (true, true) => out.push(e),
            (true, false) => out.push(intersect(&s, &e)),
            (false, true) => {
                out.push(intersect(&s, &e));
                out.push(e);
            }
            (false, false) => {}
        }
        s = e;
    }
    out
}

fn at_x(s: &Point, e: &Point, x: f32) -> Point {
    let t = (x - s.x) / (e.x - s.x);
    Point::new(x, s.y + t * (e.y - s.y))
}

fn at_y(s: &Point, e: &Point, y: f32) -> Point {
    let t = (y - s.y) / (e.y - s.y);
    Point::new(s.x + t * (e.x - s.x), y)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f32, y: f32, side: f32) -> Polygon {
        Polygon::from_coords(&[(x, y), (x + side, y), (x + side, y + side), (x, y + side)])
    }

    #[test]
    fn test_iou_overlap() {
        let a = BBox::new(0.0, 0.0, 100.0, 100.0);
        let b = BBox::new(50.0, 50.0, 150.0, 150.0);
        assert!((iou(&a, &b) - 2500.0 / 17500.0).abs() < 1e-4);
    }

    #[test]
    fn test_iou_disjoint_and_touching() {
        let a = BBox::new(0.0, 0.0, 50.0, 50.0);
        assert_eq!(iou(&a, &BBox::new(100.0, 100.0, 200.0, 200.0)), 0.0);
        assert_eq!(iou(&a, &BBox::new(50.0, 0.0, 100.0, 50.0)), 0.0);
    }

    #[test]
    fn test_aspect_ratio_and_degenerate() {
        let b = BBox::new(0.0, 0.0, 50.0, 150.0);
        assert!((b.aspect_ratio() - 3.0).abs() < 1e-6);
        assert!(BBox::new(10.0, 10.0, 10.0, 40.0).is_degenerate());
        assert!(BBox::new(0.0, 0.0, f32::NAN, 10.0).is_degenerate());
        assert!(!b.is_degenerate());
    }

    #[test]
    fn test_polygon_area_either_winding() {
        let cw = Polygon::from_coords(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]);
        assert!((square(0.0, 0.0, 10.0).area() - 100.0).abs() < 1e-4);
        assert!((cw.area() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_contains() {
        let poly = square(0.0, 0.0, 100.0);
        assert!(poly.contains(&Point::new(50.0, 50.0)));
        assert!(!poly.contains(&Point::new(150.0, 50.0)));
        assert!(!Polygon::from_coords(&[(0.0, 0.0), (1.0, 1.0)]).contains(&Point::new(0.5, 0.5)));
    }

    #[test]
    fn test_intersection_area_half_overlap() {
        let zone = square(0.0, 0.0, 100.0);
        let person = BBox::new(50.0, 20.0, 150.0, 120.0);
        // x in [50,100], y in [20,100]
        assert!((zone.intersection_area(&person) - 50.0 * 80.0).abs() < 1e-2);
    }

    #[test]
    fn test_intersection_area_concave_zone() {
        // L-shape: 100x100 square with its top-right 50x50 quadrant removed
        let zone = Polygon::from_coords(&[
            (0.0, 0.0),
            (50.0, 0.0),
            (50.0, 50.0),
            (100.0, 50.0),
            (100.0, 100.0),
            (0.0, 100.0),
        ]);
        assert!((zone.area() - 7500.0).abs() < 1e-2);
        // Box covering the whole top half: only the left 50x50 is inside
        let top = BBox::new(0.0, 0.0, 100.0, 50.0);
        assert!((zone.intersection_area(&top) - 2500.0).abs() < 1e-2);
    }

    #[test]
    fn test_intersection_area_disjoint_and_contained() {
        let zone = square(0.0, 0.0, 100.0);
        assert_eq!(zone.intersection_area(&BBox::new(200.0, 200.0, 300.0, 300.0)), 0.0);
        let inner = BBox::new(10.0, 10.0, 30.0, 40.0);
        assert!((zone.intersection_area(&inner) - inner.area()).abs() < 1e-3);
    }

    #[test]
    fn test_bounding_box() {
        let poly = Polygon::from_coords(&[(10.0, 40.0), (60.0, 5.0), (30.0, 90.0)]);
        assert_eq!(poly.bounding_box(), Some(BBox::new(10.0, 5.0, 60.0, 90.0)));
        assert_eq!(Polygon::new(Vec::new()).bounding_box(), None);
    }

    #[test]
    fn test_bbox_serde_as_array() {
        let b: BBox = serde_json::from_str("[1.0, 2.0, 3.0, 4.0]").unwrap();
        assert_eq!(b, BBox::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1.0,2.0,3.0,4.0]");
    }
}
