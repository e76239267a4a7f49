//! Delaunay triangulation of probe sites (Bowyer–Watson).
//!
//! Probe grids are small (hundreds to a few thousand sites) and loaded
//! rarely, so the quadratic insertion is acceptable. Sites are shifted to
//! their bounding-box centre before insertion to keep the circumcircle
//! arithmetic well conditioned.
//! Hull triangles lost along with the super-triangle are restored
//! afterwards (see `fill_hull_pockets`).
//!
//! Triangles are stored counter-clockwise. `neighbors[t][k]` is the
//! triangle across the edge opposite vertex `k` of triangle `t`.

use std::collections::{HashMap, HashSet};

/// Relative tolerance of the in-circumcircle test. Co-circular sites (every
/// cell of a regular probe grid) are treated as outside.
const INCIRCLE_EPS: f64 = 1e-12;

/// Triangles with twice-area below this (relative to extent²) are dropped.
const DEGENERATE_EPS: f64 = 1e-12;

/// Super-triangle size relative to the site extent.
const SUPER_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
struct Circle {
    cx: f64,
    cy: f64,
    r2: f64,
}

impl Circle {
    fn through(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Self {
        let d = 2.0 * (a[0] * (b[1] - c[1]) + b[0] * (c[1] - a[1]) + c[0] * (a[1] - b[1]));
        if d == 0.0 {
            return Self {
                cx: 0.0,
                cy: 0.0,
                r2: f64::INFINITY,
            };
        }
        let a2 = a[0] * a[0] + a[1] * a[1];
        let b2 = b[0] * b[0] + b[1] * b[1];
        let c2 = c[0] * c[0] + c[1] * c[1];
        let cx = (a2 * (b[1] - c[1]) + b2 * (c[1] - a[1]) + c2 * (a[1] - b[1])) / d;
        let cy = (a2 * (c[0] - b[0]) + b2 * (a[0] - c[0]) + c2 * (b[0] - a[0])) / d;
        let r2 = (a[0] - cx).powi(2) + (a[1] - cy).powi(2);
        Self { cx, cy, r2 }
    }

    #[inline]
    fn strictly_contains(&self, p: [f64; 2]) -> bool {
        if self.r2.is_infinite() {
            return true;
        }
        let d2 = (p[0] - self.cx).powi(2) + (p[1] - self.cy).powi(2);
        d2 < self.r2 * (1.0 - INCIRCLE_EPS)
    }
}

/// Twice the signed area of (a, b, c); positive when counter-clockwise.
#[inline]
pub(crate) fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
}

/// Delaunay triangulation over a set of distinct sites.
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Site coordinates, in input order.
    pub points: Vec<[f64; 2]>,
    /// Counter-clockwise vertex indices.
    pub triangles: Vec<[usize; 3]>,
    /// Neighbor across the edge opposite each vertex.
    pub neighbors: Vec<[Option<usize>; 3]>,
}

impl Triangulation {
    /// Triangulate `points`. Duplicate sites must be removed by the caller.
    /// Fewer than three sites, or all sites collinear, yield no triangles.
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        let triangles = if points.len() < 3 {
            Vec::new()
        } else {
            bowyer_watson(&points)
        };
        let neighbors = build_neighbors(&triangles);
        Self {
            points,
            triangles,
            neighbors,
        }
    }

    /// Vertex coordinates of triangle `t`.
    #[inline]
    pub fn corners(&self, t: usize) -> [[f64; 2]; 3] {
        let [a, b, c] = self.triangles[t];
        [self.points[a], self.points[b], self.points[c]]
    }

    /// Barycentric coordinates of `p` in triangle `t`.
    #[inline]
    pub fn barycentric(&self, t: usize, p: [f64; 2]) -> [f64; 3] {
        barycentric(self.corners(t), p)
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Barycentric coordinates of `p` with respect to `tri`.
#[inline]
pub(crate) fn barycentric(tri: [[f64; 2]; 3], p: [f64; 2]) -> [f64; 3] {
    let [a, b, c] = tri;
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    let l1 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / det;
    let l2 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / det;
    [l1, l2, 1.0 - l1 - l2]
}

fn bowyer_watson(points: &[[f64; 2]]) -> Vec<[usize; 3]> {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p[0]);
        min_y = min_y.min(p[1]);
        max_x = max_x.max(p[0]);
        max_y = max_y.max(p[1]);
    }
    let mid = [(min_x + max_x) / 2.0, (min_y + max_y) / 2.0];
    let extent = (max_x - min_x).max(max_y - min_y);
    if extent <= 0.0 {
        return Vec::new();
    }

    let n = points.len();
    let mut work: Vec<[f64; 2]> = points.iter().map(|p| [p[0] - mid[0], p[1] - mid[1]]).collect();
    let s = extent * SUPER_SCALE;
    work.push([-s, -s]);
    work.push([s, -s]);
    work.push([0.0, s]);

    let mut tris: Vec<([usize; 3], Circle)> = Vec::with_capacity(2 * n + 1);
    tris.push(([n, n + 1, n + 2], Circle::through(work[n], work[n + 1], work[n + 2])));

    let mut edge_count: HashMap<(usize, usize), u32> = HashMap::new();
    for i in 0..n {
        let p = work[i];

        edge_count.clear();
        let mut bad_edges: Vec<(usize, usize)> = Vec::new();
        tris.retain(|(v, circle)| {
            if circle.strictly_contains(p) {
                for k in 0..3 {
                    let e = (v[k], v[(k + 1) % 3]);
                    *edge_count.entry(undirected(e)).or_insert(0) += 1;
                    bad_edges.push(e);
                }
                false
            } else {
                true
            }
        });

        for (a, b) in bad_edges {
            if edge_count.get(&undirected((a, b))) != Some(&1) {
                continue;
            }
            // Boundary edges keep the CCW orientation of the removed triangle.
            let v = [a, b, i];
            if orient(work[a], work[b], work[i]) <= 0.0 {
                continue;
            }
            tris.push((v, Circle::through(work[a], work[b], work[i])));
        }
    }

    let area_floor = DEGENERATE_EPS * extent * extent;
    let mut tris: Vec<[usize; 3]> = tris
        .into_iter()
        .map(|(v, _)| v)
        .filter(|v| v.iter().all(|&idx| idx < n))
        .filter(|v| orient(work[v[0]], work[v[1]], work[v[2]]) > area_floor)
        .collect();
    fill_hull_pockets(&work[..n], &mut tris, area_floor);
    tris
}

/// Close the gaps between the triangulated region and the convex hull.
///
/// Near-degenerate hull triangles have circumcircles reaching the finite
/// super-triangle, so they are lost with it. Each reflex vertex of the
/// boundary ring is clipped as an ear until the ring is convex. Ears that
/// would cover another site are left alone.
fn fill_hull_pockets(pts: &[[f64; 2]], tris: &mut Vec<[usize; 3]>, area_floor: f64) {
    let Some(mut ring) = boundary_ring(tris) else {
        return;
    };

    let mut clipped = true;
    while clipped && ring.len() > 3 {
        clipped = false;
        let mut k = 0;
        while k < ring.len() && ring.len() > 3 {
            let m = ring.len();
            let (a, b, c) = (ring[(k + m - 1) % m], ring[k], ring[(k + 1) % m]);
            if orient(pts[a], pts[b], pts[c]) < -area_floor && !ear_covers_site(pts, a, c, b) {
                tris.push([a, c, b]);
                ring.remove(k);
                clipped = true;
            } else {
                k += 1;
            }
        }
    }
}

/// Counter-clockwise boundary vertices of the triangle set, or `None` when
/// the boundary is not a single simple loop.
fn boundary_ring(tris: &[[usize; 3]]) -> Option<Vec<usize>> {
    let mut edges = HashSet::with_capacity(tris.len() * 3);
    for v in tris {
        for k in 0..3 {
            edges.insert((v[k], v[(k + 1) % 3]));
        }
    }

    let mut next: HashMap<usize, usize> = HashMap::new();
    for &(a, b) in &edges {
        if !edges.contains(&(b, a)) && next.insert(a, b).is_some() {
            return None;
        }
    }
    let &start = next.keys().min()?;

    let mut ring = Vec::with_capacity(next.len());
    let mut cur = start;
    loop {
        ring.push(cur);
        cur = *next.get(&cur)?;
        if cur == start {
            break;
        }
        if ring.len() > next.len() {
            return None;
        }
    }
    (ring.len() == next.len()).then_some(ring)
}

/// Whether a site other than the corners lies inside the CCW triangle
/// (a, b, c) or on its open edge a-b.
fn ear_covers_site(pts: &[[f64; 2]], a: usize, b: usize, c: usize) -> bool {
    let (pa, pb, pc) = (pts[a], pts[b], pts[c]);
    pts.iter().enumerate().any(|(i, &p)| {
        i != a
            && i != b
            && i != c
            && orient(pa, pb, p) >= 0.0
            && orient(pb, pc, p) > 0.0
            && orient(pc, pa, p) > 0.0
    })
}

#[inline]
fn undirected((a, b): (usize, usize)) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

fn build_neighbors(triangles: &[[usize; 3]]) -> Vec<[Option<usize>; 3]> {
    let mut by_edge: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
    for (t, v) in triangles.iter().enumerate() {
        for k in 0..3 {
            let edge = undirected((v[(k + 1) % 3], v[(k + 2) % 3]));
            by_edge.entry(edge).or_default().push((t, k));
        }
    }

    let mut neighbors = vec![[None; 3]; triangles.len()];
    for owners in by_edge.values() {
        if let [(t0, k0), (t1, k1)] = owners.as_slice() {
            neighbors[*t0][*k0] = Some(*t1);
            neighbors[*t1][*k1] = Some(*t0);
        }
    }
    neighbors
}
