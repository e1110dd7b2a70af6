//! Spatial model for container interiors.
//!
//! Pure functions over axis-aligned boxes: containment, overlap, footprint
//! orientations. Every boundary comparison goes through one tolerance so
//! that touching faces never count as overlap.

use serde::{Deserialize, Serialize};

/// Default tolerance for boundary comparisons (container units, usually cm).
pub const EPSILON: f64 = 1e-6;

/// A point in a container's local frame.
///
/// Width runs left to right, depth runs from the opening (0) to the back
/// wall, height runs floor to ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl Coordinates {
    pub const ORIGIN: Coordinates = Coordinates {
        width: 0.0,
        depth: 0.0,
        height: 0.0,
    };

    pub fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }
}

/// Extent of an item or container along the three axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    pub fn volume(&self) -> f64 {
        self.width * self.depth * self.height
    }

    /// True when every extent is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        [self.width, self.depth, self.height]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
    }

    /// All six axis permutations, in a fixed order starting with the
    /// footprint as given.
    pub fn orientations(&self) -> [Dimensions; 6] {
        let (w, d, h) = (self.width, self.depth, self.height);
        [
            Dimensions::new(w, d, h),
            Dimensions::new(w, h, d),
            Dimensions::new(d, w, h),
            Dimensions::new(d, h, w),
            Dimensions::new(h, w, d),
            Dimensions::new(h, d, w),
        ]
    }

    /// Orientations with duplicates removed (a cube has one, a square prism three).
    pub fn distinct_orientations(&self, epsilon: f64) -> Vec<Dimensions> {
        let mut out: Vec<Dimensions> = Vec::with_capacity(6);
        for o in self.orientations() {
            if !out.iter().any(|seen| seen.approx_eq(&o, epsilon)) {
                out.push(o);
            }
        }
        out
    }

    /// True if `other` is a permutation of these extents.
    pub fn is_orientation_of(&self, other: &Dimensions, epsilon: f64) -> bool {
        self.orientations()
            .iter()
            .any(|o| o.approx_eq(other, epsilon))
    }

    fn approx_eq(&self, other: &Dimensions, epsilon: f64) -> bool {
        (self.width - other.width).abs() <= epsilon
            && (self.depth - other.depth).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

/// An axis-aligned box given by its start and end corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "start_coordinates")]
    pub start: Coordinates,
    #[serde(rename = "end_coordinates")]
    pub end: Coordinates,
}

impl BoundingBox {
    pub fn new(start: Coordinates, end: Coordinates) -> Self {
        Self { start, end }
    }

    /// Box with its start corner at `start` and the given extents.
    pub fn at(start: Coordinates, dims: Dimensions) -> Self {
        Self {
            start,
            end: Coordinates::new(
                start.width + dims.width,
                start.depth + dims.depth,
                start.height + dims.height,
            ),
        }
    }

    /// The interior of a container with the given dimensions.
    pub fn interior(dims: Dimensions) -> Self {
        Self::at(Coordinates::ORIGIN, dims)
    }

    pub fn dims(&self) -> Dimensions {
        Dimensions::new(
            self.end.width - self.start.width,
            self.end.depth - self.start.depth,
            self.end.height - self.start.height,
        )
    }

    pub fn volume(&self) -> f64 {
        self.dims().volume()
    }

    /// True when `inner` lies fully inside `self` (boundaries inclusive).
    pub fn contains(&self, inner: &BoundingBox, epsilon: f64) -> bool {
        inner.start.width >= self.start.width - epsilon
            && inner.start.depth >= self.start.depth - epsilon
            && inner.start.height >= self.start.height - epsilon
            && inner.end.width <= self.end.width + epsilon
            && inner.end.depth <= self.end.depth + epsilon
            && inner.end.height <= self.end.height + epsilon
    }

    /// True when the open interiors intersect. Shared faces do not overlap.
    pub fn overlaps(&self, other: &BoundingBox, epsilon: f64) -> bool {
        self.overlaps_face(other, epsilon)
            && spans_overlap(
                self.start.depth,
                self.end.depth,
                other.start.depth,
                other.end.depth,
                epsilon,
            )
    }

    /// Overlap of the width/height projections, ignoring depth.
    ///
    /// This is the cross-section seen when looking into a container through
    /// its opening.
    pub fn overlaps_face(&self, other: &BoundingBox, epsilon: f64) -> bool {
        spans_overlap(
            self.start.width,
            self.end.width,
            other.start.width,
            other.end.width,
            epsilon,
        ) && spans_overlap(
            self.start.height,
            self.end.height,
            other.start.height,
            other.end.height,
            epsilon,
        )
    }
}

fn spans_overlap(a0: f64, a1: f64, b0: f64, b1: f64, epsilon: f64) -> bool {
    a0 < b1 - epsilon && b0 < a1 - epsilon
}

/// First box of the given extents that fits inside `interior` without
/// overlapping any of `occupied`, trying each anchor in order.
pub fn first_fit(
    interior: &BoundingBox,
    occupied: &[BoundingBox],
    anchors: &[Coordinates],
    orientations: &[Dimensions],
    epsilon: f64,
) -> Option<BoundingBox> {
    for anchor in anchors {
        for dims in orientations {
            let candidate = BoundingBox::at(*anchor, *dims);
            if !interior.contains(&candidate, epsilon) {
                continue;
            }
            if occupied.iter().any(|b| b.overlaps(&candidate, epsilon)) {
                continue;
            }
            return Some(candidate);
        }
    }
    None
}

/// Candidate start corners: the origin plus, for every occupied box, the
/// corners adjacent to it along +width, +depth and +height.
///
/// Sorted nearest to the opening first (depth, then height, then width) and
/// deduplicated.
pub fn anchor_points(occupied: &[BoundingBox], epsilon: f64) -> Vec<Coordinates> {
    let mut anchors = Vec::with_capacity(1 + occupied.len() * 3);
    anchors.push(Coordinates::ORIGIN);
    for b in occupied {
        anchors.push(Coordinates::new(b.end.width, b.start.depth, b.start.height));
        anchors.push(Coordinates::new(b.start.width, b.end.depth, b.start.height));
        anchors.push(Coordinates::new(b.start.width, b.start.depth, b.end.height));
    }
    anchors.sort_by(|a, b| {
        a.depth
            .total_cmp(&b.depth)
            .then(a.height.total_cmp(&b.height))
            .then(a.width.total_cmp(&b.width))
    });
    anchors.dedup_by(|a, b| {
        (a.width - b.width).abs() <= epsilon
            && (a.depth - b.depth).abs() <= epsilon
            && (a.height - b.height).abs() <= epsilon
    });
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: f64, y: f64, z: f64, size: f64) -> BoundingBox {
        BoundingBox::at(
            Coordinates::new(x, y, z),
            Dimensions::new(size, size, size),
        )
    }

    #[test]
    fn test_touching_faces_do_not_overlap() {
        let a = cube(0.0, 0.0, 0.0, 10.0);
        let b = cube(10.0, 0.0, 0.0, 10.0);
        assert!(!a.overlaps(&b, EPSILON));
        assert!(!b.overlaps(&a, EPSILON));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = cube(0.0, 0.0, 0.0, 10.0);
        let b = cube(5.0, 5.0, 5.0, 10.0);
        assert!(a.overlaps(&b, EPSILON));
        assert!(b.overlaps(&a, EPSILON));
    }

    #[test]
    fn test_contains_inclusive_boundaries() {
        let outer = BoundingBox::interior(Dimensions::new(100.0, 100.0, 100.0));
        assert!(outer.contains(&cube(0.0, 0.0, 0.0, 100.0), EPSILON));
        assert!(outer.contains(&cube(40.0, 40.0, 40.0, 60.0), EPSILON));
        assert!(!outer.contains(&cube(41.0, 0.0, 0.0, 60.0), EPSILON));
    }

    #[test]
    fn test_six_orientations() {
        let dims = Dimensions::new(1.0, 2.0, 3.0);
        let all = dims.orientations();
        assert_eq!(all.len(), 6);
        for o in &all {
            assert!((o.volume() - 6.0).abs() < 1e-9);
        }
        assert_eq!(dims.distinct_orientations(EPSILON).len(), 6);
    }

    #[test]
    fn test_distinct_orientations_collapse() {
        assert_eq!(
            Dimensions::new(5.0, 5.0, 5.0)
                .distinct_orientations(EPSILON)
                .len(),
            1
        );
        assert_eq!(
            Dimensions::new(5.0, 5.0, 2.0)
                .distinct_orientations(EPSILON)
                .len(),
            3
        );
    }

    #[test]
    fn test_is_orientation_of() {
        let dims = Dimensions::new(10.0, 20.0, 30.0);
        assert!(dims.is_orientation_of(&Dimensions::new(30.0, 10.0, 20.0), EPSILON));
        assert!(!dims.is_orientation_of(&Dimensions::new(30.0, 10.0, 21.0), EPSILON));
    }

    #[test]
    fn test_face_overlap_ignores_depth() {
        let front = cube(0.0, 0.0, 0.0, 10.0);
        let back = cube(5.0, 50.0, 5.0, 10.0);
        assert!(front.overlaps_face(&back, EPSILON));
        assert!(!front.overlaps(&back, EPSILON));
    }

    #[test]
    fn test_anchor_points_sorted_and_deduplicated() {
        let occupied = vec![cube(0.0, 0.0, 0.0, 10.0), cube(10.0, 0.0, 0.0, 10.0)];
        let anchors = anchor_points(&occupied, EPSILON);
        assert_eq!(anchors[0], Coordinates::ORIGIN);
        for pair in anchors.windows(2) {
            assert!(pair[0].depth <= pair[1].depth);
        }
        let at_ten = anchors
            .iter()
            .filter(|a| *a == &Coordinates::new(10.0, 0.0, 0.0))
            .count();
        assert_eq!(at_ten, 1);
    }

    #[test]
    fn test_first_fit_skips_occupied_space() {
        let interior = BoundingBox::interior(Dimensions::new(20.0, 10.0, 10.0));
        let occupied = vec![cube(0.0, 0.0, 0.0, 10.0)];
        let anchors = anchor_points(&occupied, EPSILON);
        let dims = Dimensions::new(10.0, 10.0, 10.0);
        let fit = first_fit(&interior, &occupied, &anchors, &[dims], EPSILON)
            .expect("second slot should be free");
        assert_eq!(fit.start, Coordinates::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_first_fit_uses_rotation() {
        let interior = BoundingBox::interior(Dimensions::new(10.0, 30.0, 10.0));
        let dims = Dimensions::new(30.0, 10.0, 10.0);
        let fit = first_fit(
            &interior,
            &[],
            &[Coordinates::ORIGIN],
            &dims.distinct_orientations(EPSILON),
            EPSILON,
        )
        .expect("rotated item should fit");
        assert!((fit.dims().depth - 30.0).abs() < 1e-9);
    }
}
