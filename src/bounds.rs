use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis aligned bounding box, grown one point at a time.
///
/// A freshly created box is inverted (`mins = +inf`, `maxs = -inf`) so the first added point
/// becomes both corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            mins: Vec3::splat(f32::INFINITY),
            maxs: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// True until at least one point has been added.
    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x || self.mins.y > self.maxs.y || self.mins.z > self.maxs.z
    }

    pub fn add_point(&mut self, point: Vec3) {
        self.mins = self.mins.min(point);
        self.maxs = self.maxs.max(point);
    }

    /// Grows this box by both corners of `other`. Empty boxes are ignored.
    pub fn merge(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.add_point(other.mins);
        self.add_point(other.maxs);
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.mins).all() && point.cmple(self.maxs).all()
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        other.is_empty() || (self.contains_point(other.mins) && self.contains_point(other.maxs))
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.mins.x > other.maxs.x
            || self.maxs.x < other.mins.x
            || self.mins.y > other.maxs.y
            || self.maxs.y < other.mins.y
            || self.mins.z > other.maxs.z
            || self.maxs.z < other.mins.z)
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.mins, self.maxs);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Axis aligned box enclosing this box after transforming it by `matrix`.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let mut out = Aabb::empty();
        if self.is_empty() {
            return out;
        }
        for corner in self.corners() {
            out.add_point(matrix.transform_point3(corner));
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_points() {
        let mut aabb = Aabb::empty();
        assert!(aabb.is_empty());
        aabb.add_point(Vec3::new(1.0, -2.0, 3.0));
        assert_eq!(aabb.mins, aabb.maxs);
        aabb.add_point(Vec3::new(-1.0, 2.0, 0.0));
        assert_eq!(aabb.mins, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.maxs, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.center(), Vec3::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn test_merge_covers_union() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0));
        let mut union = Aabb::empty();
        union.merge(&a);
        union.merge(&b);
        union.merge(&Aabb::empty());
        assert!(union.contains(&a));
        assert!(union.contains(&b));
        assert_eq!(union, Aabb::new(Vec3::ZERO, Vec3::splat(6.0)));
        assert!(!a.overlaps(&b));
        assert!(union.overlaps(&a));
    }

    #[test]
    fn test_transformed() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let moved = aabb.transformed(&Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(moved, Aabb::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 1.0, 1.0)));
    }
}
