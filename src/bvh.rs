use crate::{Bounds3f, Ray, Vec3f, Point3f, Float};
use crate::interaction::SurfaceInteraction;
use partition::partition;
use smallvec::SmallVec;
use std::cmp::Ordering;
use tracing::debug;

/// The set of primitives an accelerator is built over. Primitives are addressed by a dense
/// index in `0..count()`, and the accelerator only ever hands those indices back.
pub trait Primitives: Sync + Send {
    fn count(&self) -> usize;

    /// World space bounds of primitive `idx`
    fn bounds(&self, idx: usize) -> Bounds3f;

    /// Intersect primitive `idx`. On a hit, the interaction's `t` is the hit distance along
    /// `ray` and must lie in `(0, ray.t_max)`.
    fn intersect(&self, idx: usize, ray: &Ray) -> Option<SurfaceInteraction>;

    fn intersect_test(&self, idx: usize, ray: &Ray) -> bool {
        self.intersect(idx, ray).is_some()
    }
}

pub trait Accelerator: Sync + Send {
    fn world_bound(&self) -> Bounds3f;

    /// Closest hit along `ray`. `ray.t_max` is shrunk to the hit distance.
    fn intersect(&self, prims: &dyn Primitives, ray: &mut Ray) -> Option<SurfaceInteraction>;

    /// Does anything intersect `ray` in `(0, ray.t_max)`. Returns at the first hit found.
    fn intersect_test(&self, prims: &dyn Primitives, ray: &Ray) -> bool;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SplitMethod {
    Middle,
    EqualCounts,
    SAH
}

/// Brute force accelerator that tests every primitive.
pub struct LinearAccel {
    bounds: Bounds3f,
}

impl LinearAccel {
    pub fn build(prims: &dyn Primitives) -> Self {
        let bounds = (0..prims.count())
            .fold(Bounds3f::empty(), |b, i| b.join(&prims.bounds(i)));
        Self { bounds }
    }
}

impl Accelerator for LinearAccel {
    fn world_bound(&self) -> Bounds3f {
        self.bounds
    }

    fn intersect(&self, prims: &dyn Primitives, ray: &mut Ray) -> Option<SurfaceInteraction> {
        let mut nearest = None;
        for i in 0..prims.count() {
            if let Some(si) = prims.intersect(i, ray) {
                ray.t_max = si.t;
                nearest = Some(si);
            }
        }
        nearest
    }

    fn intersect_test(&self, prims: &dyn Primitives, ray: &Ray) -> bool {
        (0..prims.count()).any(|i| prims.intersect_test(i, ray))
    }
}

const N_BUCKETS: usize = 12;

/// Bounding volume hierarchy, stored as a flat array of nodes in depth first order. The first
/// child of an interior node immediately follows it, and the node records where the second
/// child is.
pub struct BVH {
    nodes: Vec<LinearBVHNode>,
    /// Primitive indices, reordered so every leaf covers a contiguous range
    prim_indices: Vec<usize>,
    bounds: Bounds3f,
}

#[derive(Copy, Clone, Debug)]
enum LinearBVHNode {
    Leaf {
        bounds: Bounds3f,
        begin: usize,
        end: usize,
    },
    Interior {
        bounds: Bounds3f,
        second_child: usize,
        split_axis: usize,
    }
}

impl LinearBVHNode {
    fn bounds(&self) -> &Bounds3f {
        match self {
            LinearBVHNode::Leaf { bounds, .. } => bounds,
            LinearBVHNode::Interior { bounds, .. } => bounds,
        }
    }
}

#[derive(Copy, Clone)]
struct BVHPrimInfo {
    prim_id: usize,
    bounds: Bounds3f,
    centroid: Point3f,
}

impl BVHPrimInfo {
    fn new(prim_id: usize, bounds: Bounds3f) -> Self {
        Self { prim_id, bounds, centroid: bounds.centroid() }
    }
}

struct BuildState {
    nodes: Vec<LinearBVHNode>,
    prim_indices: Vec<usize>,
    split_method: SplitMethod,
    max_prims_in_node: usize,
}

impl BVH {
    pub fn build(prims: &dyn Primitives, split_method: SplitMethod, max_prims_in_node: usize) -> Self {
        let n_prims = prims.count();
        let _span = tracing::debug_span!("bvh_build", n_prims, ?split_method).entered();

        let mut prim_info: Vec<BVHPrimInfo> = (0..n_prims)
            .map(|i| BVHPrimInfo::new(i, prims.bounds(i)))
            .collect();

        let mut state = BuildState {
            nodes: Vec::with_capacity(2 * n_prims),
            prim_indices: Vec::with_capacity(n_prims),
            split_method,
            max_prims_in_node: max_prims_in_node.clamp(1, 255),
        };

        if !prim_info.is_empty() {
            Self::recursive_build(&mut state, &mut prim_info);
        }

        let bounds = state.nodes.first().map_or_else(Bounds3f::empty, |n| *n.bounds());
        debug!(n_prims, n_nodes = state.nodes.len(), "built BVH");

        Self {
            nodes: state.nodes,
            prim_indices: state.prim_indices,
            bounds,
        }
    }

    /// Build the subtree over `prim_info` and return the index of its root node.
    fn recursive_build(state: &mut BuildState, prim_info: &mut [BVHPrimInfo]) -> usize {
        // Find the union of the bounding boxes of all primitives in this node,
        // and the bounding box of all centroids
        let (node_bounds, centroid_bounds) = prim_info.iter()
            .fold((Bounds3f::empty(), Bounds3f::empty()), |(node_bb, centr_bb), prim| {
                (node_bb.join(&prim.bounds), centr_bb.join_point(&prim.centroid))
            });

        let n_prims = prim_info.len();

        // If there is only one primitive or all the centroids lie on the same point
        // (and therefore can't be partitioned), create a leaf node.
        if n_prims == 1 || centroid_bounds.is_point() {
            return Self::make_leaf(state, prim_info, node_bounds);
        }

        let axis = centroid_bounds.maximum_extent();

        let mid = match state.split_method {
            SplitMethod::Middle => {
                let midpoint = (centroid_bounds.min[axis] + centroid_bounds.max[axis]) / 2.0;
                let (below, _) = partition(prim_info, |prim| prim.centroid[axis] < midpoint);
                let mid = below.len();
                if mid == 0 || mid == n_prims {
                    Self::split_equal_counts(prim_info, axis)
                } else {
                    mid
                }
            },
            SplitMethod::EqualCounts => Self::split_equal_counts(prim_info, axis),
            SplitMethod::SAH => {
                if n_prims <= 2 {
                    Self::split_equal_counts(prim_info, axis)
                } else {
                    match Self::split_sah(prim_info, axis, &node_bounds, &centroid_bounds, state.max_prims_in_node) {
                        Some(mid) => mid,
                        None => return Self::make_leaf(state, prim_info, node_bounds),
                    }
                }
            }
        };

        let node_idx = state.nodes.len();
        // placeholder until the second child's position is known
        state.nodes.push(LinearBVHNode::Leaf { bounds: node_bounds, begin: 0, end: 0 });

        let (left, right) = prim_info.split_at_mut(mid);
        Self::recursive_build(state, left);
        let second_child = Self::recursive_build(state, right);

        state.nodes[node_idx] = LinearBVHNode::Interior {
            bounds: node_bounds,
            second_child,
            split_axis: axis,
        };
        node_idx
    }

    fn make_leaf(state: &mut BuildState, prim_info: &[BVHPrimInfo], bounds: Bounds3f) -> usize {
        let begin = state.prim_indices.len();
        state.prim_indices.extend(prim_info.iter().map(|p| p.prim_id));
        let end = state.prim_indices.len();
        debug_assert!(end > begin, "empty BVH leaf");

        state.nodes.push(LinearBVHNode::Leaf { bounds, begin, end });
        state.nodes.len() - 1
    }

    /// Partition around the median centroid along `axis`.
    fn split_equal_counts(prim_info: &mut [BVHPrimInfo], axis: usize) -> usize {
        let mid = prim_info.len() / 2;
        prim_info.select_nth_unstable_by(mid, |a, b| {
            a.centroid[axis].partial_cmp(&b.centroid[axis]).unwrap_or(Ordering::Equal)
        });
        mid
    }

    /// Bucketed surface area heuristic. Returns `None` when a leaf is cheaper than any split.
    fn split_sah(
        prim_info: &mut [BVHPrimInfo],
        axis: usize,
        node_bounds: &Bounds3f,
        centroid_bounds: &Bounds3f,
        max_prims_in_node: usize,
    ) -> Option<usize> {
        let n_prims = prim_info.len();
        let bucket_of = |p: &BVHPrimInfo| {
            let b = (N_BUCKETS as Float * centroid_bounds.offset(&p.centroid)[axis]) as usize;
            b.min(N_BUCKETS - 1)
        };

        let mut counts = [0usize; N_BUCKETS];
        let mut bucket_bounds = [Bounds3f::empty(); N_BUCKETS];
        for prim in prim_info.iter() {
            let b = bucket_of(prim);
            counts[b] += 1;
            bucket_bounds[b] = bucket_bounds[b].join(&prim.bounds);
        }

        // cost of splitting after each bucket
        let mut costs = [0.0; N_BUCKETS - 1];
        for (i, cost) in costs.iter_mut().enumerate() {
            let (mut b0, mut b1) = (Bounds3f::empty(), Bounds3f::empty());
            let (mut count0, mut count1) = (0, 0);
            for j in 0..=i {
                b0 = b0.join(&bucket_bounds[j]);
                count0 += counts[j];
            }
            for j in (i + 1)..N_BUCKETS {
                b1 = b1.join(&bucket_bounds[j]);
                count1 += counts[j];
            }
            let area = |b: &Bounds3f, n: usize| if n == 0 { 0.0 } else { n as Float * b.surface_area() };
            *cost = 0.125 + (area(&b0, count0) + area(&b1, count1)) / node_bounds.surface_area();
        }

        let (min_bucket, min_cost) = costs.iter()
            .enumerate()
            .fold((0, Float::INFINITY), |(bi, bc), (i, &c)| if c < bc { (i, c) } else { (bi, bc) });

        if n_prims > max_prims_in_node || min_cost < n_prims as Float {
            let (below, _) = partition(prim_info, |p| bucket_of(p) <= min_bucket);
            let mid = below.len();
            if mid == 0 || mid == n_prims {
                Some(Self::split_equal_counts(prim_info, axis))
            } else {
                Some(mid)
            }
        } else {
            None
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[LinearBVHNode], idx: usize) -> usize {
            match nodes[idx] {
                LinearBVHNode::Leaf { .. } => 1,
                LinearBVHNode::Interior { second_child, .. } => {
                    1 + depth_of(nodes, idx + 1).max(depth_of(nodes, second_child))
                }
            }
        }
        if self.nodes.is_empty() { 0 } else { depth_of(&self.nodes, 0) }
    }

    /// Visit nodes front to back along `ray`, calling `visit_leaf` with each leaf range whose
    /// bounds the ray passes through. Stops early if `visit_leaf` returns true. The ray is
    /// re-read after every leaf, so a callback that shrinks `t_max` prunes the remaining nodes.
    fn traverse<F>(&self, ray: &mut Ray, mut visit_leaf: F)
        where F: FnMut(&[usize], &mut Ray) -> bool
    {
        if self.nodes.is_empty() {
            return;
        }

        let inv_dir = Vec3f::new(1.0 / ray.dir.x, 1.0 / ray.dir.y, 1.0 / ray.dir.z);
        let dir_is_neg = [
            (inv_dir.x < 0.0) as usize,
            (inv_dir.y < 0.0) as usize,
            (inv_dir.z < 0.0) as usize,
        ];

        let mut to_visit: SmallVec<[usize; 64]> = SmallVec::new();
        let mut current = 0;
        loop {
            let node = &self.nodes[current];
            if node.bounds().intersect_p(ray, &inv_dir, dir_is_neg) {
                match *node {
                    LinearBVHNode::Leaf { begin, end, .. } => {
                        if visit_leaf(&self.prim_indices[begin..end], ray) {
                            return;
                        }
                        match to_visit.pop() {
                            Some(next) => current = next,
                            None => return,
                        }
                    },
                    LinearBVHNode::Interior { second_child, split_axis, .. } => {
                        // visit the near child first
                        if dir_is_neg[split_axis] == 1 {
                            to_visit.push(current + 1);
                            current = second_child;
                        } else {
                            to_visit.push(second_child);
                            current += 1;
                        }
                    }
                }
            } else {
                match to_visit.pop() {
                    Some(next) => current = next,
                    None => return,
                }
            }
        }
    }
}

impl Accelerator for BVH {
    fn world_bound(&self) -> Bounds3f {
        self.bounds
    }

    fn intersect(&self, prims: &dyn Primitives, ray: &mut Ray) -> Option<SurfaceInteraction> {
        let mut nearest = None;
        self.traverse(ray, |indices, ray| {
            for &i in indices {
                if let Some(si) = prims.intersect(i, ray) {
                    ray.t_max = si.t;
                    nearest = Some(si);
                }
            }
            false
        });
        nearest
    }

    fn intersect_test(&self, prims: &dyn Primitives, ray: &Ray) -> bool {
        let mut ray = *ray;
        let mut hit = false;
        self.traverse(&mut ray, |indices, ray| {
            hit = indices.iter().any(|&i| prims.intersect_test(i, ray));
            hit
        });
        hit
    }
}
