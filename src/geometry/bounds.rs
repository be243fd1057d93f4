use cgmath::{Point2, Point3, Vector2, Vector3, InnerSpace};
use crate::{Scalar, Float, Point3f, Vec3f, Ray};
use crate::err_float::gamma;

pub type Bounds2i = Bounds2<i32>;
pub type Bounds2f = Bounds2<Float>;
pub type Bounds3f = Bounds3<Float>;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds2<S: Scalar> {
    pub min: Point2<S>,
    pub max: Point2<S>
}

impl<S: Scalar> Bounds2<S> {

    pub fn empty() -> Self {
        Self {
            min: Point2::new(S::max_value(), S::max_value()),
            max: Point2::new(S::min_value(), S::min_value())
        }
    }

    pub fn with_bounds(min: Point2<S>, max: Point2<S>) -> Self {
        Self { min, max }
    }

    pub fn diagonal(&self) -> Vector2<S> {
        self.max - self.min
    }

    pub fn area(&self) -> S {
        let d = self.diagonal();
        d.x * d.y
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            min: Point2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: Point2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        }
    }

    pub fn join(&self, other: &Self) -> Self {
        Self {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Is `p` inside the bounds, treating the max edges as exclusive.
    pub fn inside_exclusive(&self, p: Point2<S>) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    pub fn contains(&self, other: &Self) -> bool {
        other.min.x >= self.min.x && other.min.y >= self.min.y
            && other.max.x <= self.max.x && other.max.y <= self.max.y
    }
}

impl Bounds2<i32> {
    /// Iterate over every integer point in the bounds, row by row, excluding the max edges.
    pub fn iter_points(self) -> impl Iterator<Item=Point2<i32>> {
        let (x0, x1) = (self.min.x, self.max.x);
        (self.min.y..self.max.y).flat_map(move |y| (x0..x1).map(move |x| Point2::new(x, y)))
    }

    /// Split the bounds into square tiles of side `tile_size`, clipped at the max edges.
    pub fn iter_tiles(self, tile_size: i32) -> impl Iterator<Item=Bounds2<i32>> {
        assert!(tile_size > 0);
        let n_tiles = self.tile_counts(tile_size);
        (0..n_tiles.y).flat_map(move |ty| (0..n_tiles.x).map(move |tx| {
            let x0 = self.min.x + tx * tile_size;
            let y0 = self.min.y + ty * tile_size;
            let x1 = Ord::min(x0 + tile_size, self.max.x);
            let y1 = Ord::min(y0 + tile_size, self.max.y);
            Bounds2::with_bounds(Point2::new(x0, y0), Point2::new(x1, y1))
        }))
    }

    /// Number of tiles along each axis
    pub fn tile_counts(&self, tile_size: i32) -> Vector2<i32> {
        let d = self.diagonal();
        Vector2::new(
            Ord::max((d.x + tile_size - 1) / tile_size, 0),
            Ord::max((d.y + tile_size - 1) / tile_size, 0),
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3<S: Scalar> {
    pub min: Point3<S>,
    pub max: Point3<S>,
}

impl<S: Scalar> Bounds3<S> {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(S::max_value(), S::max_value(), S::max_value()),
            max: Point3::new(S::min_value(), S::min_value(), S::min_value()),
        }
    }

    pub fn with_bounds(p1: Point3<S>, p2: Point3<S>) -> Self {
        Self {
            min: Point3::new(p1.x.min(p2.x), p1.y.min(p2.y), p1.z.min(p2.z)),
            max: Point3::new(p1.x.max(p2.x), p1.y.max(p2.y), p1.z.max(p2.z)),
        }
    }

    pub fn join(&self, other: &Self) -> Self {
        Self {
            min: Point3::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y), self.min.z.min(other.min.z)),
            max: Point3::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y), self.max.z.max(other.max.z)),
        }
    }

    pub fn join_point(&self, p: &Point3<S>) -> Self {
        Self {
            min: Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z)),
            max: Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z)),
        }
    }

    pub fn diagonal(&self) -> Vector3<S> {
        self.max - self.min
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    /// True if the bounds have no extent in any dimension.
    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    /// Index of the axis with the largest extent.
    pub fn maximum_extent(&self) -> usize {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Corner `i` of the box, where bit k of `i` selects max along axis k.
    pub fn corner(&self, i: usize) -> Point3<S> {
        Point3::new(
            if i & 1 == 0 { self.min.x } else { self.max.x },
            if i & 2 == 0 { self.min.y } else { self.max.y },
            if i & 4 == 0 { self.min.z } else { self.max.z },
        )
    }
}

impl Bounds3<Float> {
    pub fn centroid(&self) -> Point3f {
        self.min + self.diagonal() * 0.5
    }

    pub fn surface_area(&self) -> Float {
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// Position of `p` relative to the corners, 0 at min and 1 at max along each axis.
    pub fn offset(&self, p: &Point3f) -> Vec3f {
        let mut o = *p - self.min;
        for i in 0..3 {
            if self.max[i] > self.min[i] {
                o[i] /= self.max[i] - self.min[i];
            }
        }
        o
    }

    pub fn bounding_sphere(&self) -> (Point3f, Float) {
        let center = self.centroid();
        let radius = if self.is_empty() { 0.0 } else { (self.max - center).magnitude() };
        (center, radius)
    }

    /// Slab test against the ray segment `[0, ray.t_max)`, using a precomputed reciprocal
    /// direction and per-axis direction signs.
    pub fn intersect_p(&self, ray: &Ray, inv_dir: &Vec3f, dir_is_neg: [usize; 3]) -> bool {
        let bounds = [self.min, self.max];
        // scale the far hits up to stay conservative in the face of rounding
        let robust = 1.0 + 2.0 * gamma(3);

        let mut t_min = (bounds[dir_is_neg[0]].x - ray.origin.x) * inv_dir.x;
        let mut t_max = (bounds[1 - dir_is_neg[0]].x - ray.origin.x) * inv_dir.x * robust;
        let ty_min = (bounds[dir_is_neg[1]].y - ray.origin.y) * inv_dir.y;
        let ty_max = (bounds[1 - dir_is_neg[1]].y - ray.origin.y) * inv_dir.y * robust;

        if t_min > ty_max || ty_min > t_max { return false; }
        if ty_min > t_min { t_min = ty_min; }
        if ty_max < t_max { t_max = ty_max; }

        let tz_min = (bounds[dir_is_neg[2]].z - ray.origin.z) * inv_dir.z;
        let tz_max = (bounds[1 - dir_is_neg[2]].z - ray.origin.z) * inv_dir.z * robust;

        if t_min > tz_max || tz_min > t_max { return false; }
        if tz_min > t_min { t_min = tz_min; }
        if tz_max < t_max { t_max = tz_max; }

        t_min < ray.t_max && t_max > 0.0
    }

    /// Convenience wrapper around `intersect_p` that computes the reciprocal direction.
    pub fn intersects(&self, ray: &Ray) -> bool {
        let inv_dir = Vec3f::new(1.0 / ray.dir.x, 1.0 / ray.dir.y, 1.0 / ray.dir.z);
        let dir_is_neg = [
            (inv_dir.x < 0.0) as usize,
            (inv_dir.y < 0.0) as usize,
            (inv_dir.z < 0.0) as usize,
        ];
        self.intersect_p(ray, &inv_dir, dir_is_neg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Point2i, Ray};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tiles_cover_bounds() {
        let b = Bounds2i::with_bounds(Point2i::new(0, 0), Point2i::new(37, 20));
        let tiles: Vec<_> = b.iter_tiles(16).collect();
        assert_eq!(tiles.len(), 3 * 2);
        let area: i32 = tiles.iter().map(|t| t.area()).sum();
        assert_eq!(area, b.area());
        assert_eq!(tiles[2], Bounds2i::with_bounds(Point2i::new(32, 0), Point2i::new(37, 16)));
    }

    #[test]
    fn test_iter_points_row_major() {
        let b = Bounds2i::with_bounds(Point2i::new(1, 1), Point2i::new(3, 3));
        let pts: Vec<_> = b.iter_points().map(|p| (p.x, p.y)).collect();
        assert_eq!(pts, vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_bounds3_join_and_extent() {
        let a = bounds3f!((0, 0, 0), (1, 1, 1));
        let b = bounds3f!((2, -1, 0), (3, 0, 0.5));
        let j = a.join(&b);
        assert_eq!(j, bounds3f!((0, -1, 0), (3, 1, 1)));
        assert_eq!(j.maximum_extent(), 0);
        assert_eq!(j.centroid(), point3f!(1.5, 0, 0.5));
    }

    #[test]
    fn test_slab_test() {
        let b = bounds3f!((-1, -1, -1), (1, 1, 1));
        let hit = Ray::new(point3f!(0, 0, -5), vec3f!(0, 0, 1));
        let miss = Ray::new(point3f!(0, 3, -5), vec3f!(0, 0, 1));
        let mut short = hit;
        short.t_max = 2.0;
        assert!(b.intersects(&hit));
        assert!(!b.intersects(&miss));
        assert!(!b.intersects(&short));
    }
}
