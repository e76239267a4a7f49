//! Scattered-data interpolation onto the dense offset grid.
//!
//! - `Nearest`: closest sample, earliest in file order on ties.
//! - `Linear`: barycentric over the Delaunay triangulation.
//! - `Cubic`: Clough–Tocher C1 split-triangle cubic. Vertex gradients are
//!   the area-weighted mean of the incident triangles' plane gradients,
//!   which reproduces linear data exactly.
//!
//! Triangle methods are evaluated by rasterizing each triangle onto the
//! axis cross-product. Cells no triangle covers (outside the convex hull,
//! or degenerate input) take the nearest sample value; the number of such
//! cells is reported back.

use std::collections::HashMap;
use surfmap_common::method::InterpolationMethod;

use crate::map::ProbeSample;
use crate::map::triangulation::{Triangulation, barycentric};

/// Barycentric slack for cells on triangle edges.
const EDGE_EPS: f64 = 1e-9;

/// Interpolated offsets, x-major (`values[i * y.len() + j]`).
#[derive(Debug, Clone)]
pub struct Interpolated {
    pub values: Vec<f64>,
    /// Cells filled by the nearest-neighbor fallback.
    pub fallback_cells: usize,
}

/// Evaluate `method` over every (x[i], y[j]).
pub fn interpolate(
    samples: &[ProbeSample],
    xs: &[f64],
    ys: &[f64],
    method: InterpolationMethod,
) -> Interpolated {
    let ny = ys.len();
    let mut values = vec![f64::NAN; xs.len() * ny];

    if method != InterpolationMethod::Nearest {
        let (sites, z) = unique_sites(samples);
        let tri = Triangulation::new(sites);
        if !tri.is_empty() {
            let gradients = match method {
                InterpolationMethod::Cubic => Some(estimate_gradients(&tri, &z)),
                _ => None,
            };
            for t in 0..tri.triangles.len() {
                let patch = match &gradients {
                    Some(grad) => Patch::Cubic(CloughTocher::new(&tri, t, &z, grad)),
                    None => Patch::Linear(tri.triangles[t].map(|v| z[v])),
                };
                rasterize(&tri, t, xs, ys, |cell, b| {
                    if values[cell].is_nan() {
                        values[cell] = patch.eval(b);
                    }
                });
            }
        }
    }

    let mut fallback_cells = 0;
    for (i, &x) in xs.iter().enumerate() {
        for (j, &y) in ys.iter().enumerate() {
            let cell = i * ny + j;
            if values[cell].is_finite() {
                continue;
            }
            values[cell] = nearest_value(samples, x, y);
            if method != InterpolationMethod::Nearest {
                fallback_cells += 1;
            }
        }
    }

    Interpolated {
        values,
        fallback_cells,
    }
}

/// Value of the sample closest to (x, y). Ties keep the earliest sample.
pub fn nearest_value(samples: &[ProbeSample], x: f64, y: f64) -> f64 {
    let mut best = f64::INFINITY;
    let mut value = 0.0;
    for s in samples {
        let d2 = (s.x - x).powi(2) + (s.y - y).powi(2);
        if d2 < best {
            best = d2;
            value = s.z;
        }
    }
    value
}

/// Distinct sample sites with their z; the first sample at a site wins.
fn unique_sites(samples: &[ProbeSample]) -> (Vec<[f64; 2]>, Vec<f64>) {
    let mut seen: HashMap<(u64, u64), ()> = HashMap::with_capacity(samples.len());
    let mut sites = Vec::with_capacity(samples.len());
    let mut z = Vec::with_capacity(samples.len());
    for s in samples {
        // +0.0 folds -0.0 so both hash alike.
        let key = ((s.x + 0.0).to_bits(), (s.y + 0.0).to_bits());
        if seen.insert(key, ()).is_none() {
            sites.push([s.x, s.y]);
            z.push(s.z);
        }
    }
    (sites, z)
}

/// Call `f(cell, barycentric)` for every grid cell inside triangle `t`.
fn rasterize(
    tri: &Triangulation,
    t: usize,
    xs: &[f64],
    ys: &[f64],
    mut f: impl FnMut(usize, [f64; 3]),
) {
    let corners = tri.corners(t);
    let (mut lo_x, mut hi_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut lo_y, mut hi_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for c in corners {
        lo_x = lo_x.min(c[0]);
        hi_x = hi_x.max(c[0]);
        lo_y = lo_y.min(c[1]);
        hi_y = hi_y.max(c[1]);
    }
    let slack_x = EDGE_EPS * (hi_x - lo_x).max(1.0);
    let slack_y = EDGE_EPS * (hi_y - lo_y).max(1.0);
    let i0 = xs.partition_point(|&x| x < lo_x - slack_x);
    let i1 = xs.partition_point(|&x| x <= hi_x + slack_x);
    let j0 = ys.partition_point(|&y| y < lo_y - slack_y);
    let j1 = ys.partition_point(|&y| y <= hi_y + slack_y);

    let ny = ys.len();
    for i in i0..i1 {
        for j in j0..j1 {
            let b = barycentric(corners, [xs[i], ys[j]]);
            if b.iter().all(|&w| w >= -EDGE_EPS) {
                f(i * ny + j, b);
            }
        }
    }
}

enum Patch {
    Linear([f64; 3]),
    Cubic(CloughTocher),
}

impl Patch {
    #[inline]
    fn eval(&self, b: [f64; 3]) -> f64 {
        match self {
            Patch::Linear(z) => b[0] * z[0] + b[1] * z[1] + b[2] * z[2],
            Patch::Cubic(ct) => ct.eval(b),
        }
    }
}

/// Area-weighted mean of incident triangle plane gradients per site.
fn estimate_gradients(tri: &Triangulation, z: &[f64]) -> Vec<[f64; 2]> {
    let mut acc = vec![[0.0f64; 2]; tri.points.len()];
    let mut weight = vec![0.0f64; tri.points.len()];

    for v in &tri.triangles {
        let [p0, p1, p2] = v.map(|i| tri.points[i]);
        let (dx1, dy1) = (p1[0] - p0[0], p1[1] - p0[1]);
        let (dx2, dy2) = (p2[0] - p0[0], p2[1] - p0[1]);
        let det = dx1 * dy2 - dx2 * dy1;
        if det == 0.0 {
            continue;
        }
        let (dz1, dz2) = (z[v[1]] - z[v[0]], z[v[2]] - z[v[0]]);
        let gx = (dz1 * dy2 - dz2 * dy1) / det;
        let gy = (dz2 * dx1 - dz1 * dx2) / det;
        let area = det.abs() / 2.0;
        for &i in v {
            acc[i][0] += area * gx;
            acc[i][1] += area * gy;
            weight[i] += area;
        }
    }

    acc.iter()
        .zip(&weight)
        .map(|(g, &w)| if w > 0.0 { [g[0] / w, g[1] / w] } else { [0.0, 0.0] })
        .collect()
}

/// Bézier ordinates of one Clough–Tocher macro-triangle.
///
/// `cIJKL` weights vertex 1, 2, 3 and the centroid (vertex 4).
#[derive(Debug, Clone, Copy)]
struct CloughTocher {
    c3000: f64,
    c0300: f64,
    c0030: f64,
    c0003: f64,
    c2100: f64,
    c2010: f64,
    c2001: f64,
    c0210: f64,
    c0201: f64,
    c0021: f64,
    c1200: f64,
    c1020: f64,
    c1002: f64,
    c0120: f64,
    c0102: f64,
    c0012: f64,
    c1101: f64,
    c1011: f64,
    c0111: f64,
}

impl CloughTocher {
    fn new(tri: &Triangulation, t: usize, z: &[f64], grad: &[[f64; 2]]) -> Self {
        let v = tri.triangles[t];
        let [p1, p2, p3] = tri.corners(t);
        let e12 = [p2[0] - p1[0], p2[1] - p1[1]];
        let e23 = [p3[0] - p2[0], p3[1] - p2[1]];
        let e31 = [p1[0] - p3[0], p1[1] - p3[1]];

        let dot = |g: [f64; 2], e: [f64; 2]| g[0] * e[0] + g[1] * e[1];
        let (f1, f2, f3) = (z[v[0]], z[v[1]], z[v[2]]);
        let (g1, g2, g3) = (grad[v[0]], grad[v[1]], grad[v[2]]);

        let df12 = dot(g1, e12);
        let df21 = -dot(g2, e12);
        let df23 = dot(g2, e23);
        let df32 = -dot(g3, e23);
        let df31 = dot(g3, e31);
        let df13 = -dot(g1, e31);

        let c3000 = f1;
        let c2100 = (df12 + 3.0 * c3000) / 3.0;
        let c2010 = (df13 + 3.0 * c3000) / 3.0;
        let c0300 = f2;
        let c1200 = (df21 + 3.0 * c0300) / 3.0;
        let c0210 = (df23 + 3.0 * c0300) / 3.0;
        let c0030 = f3;
        let c1020 = (df31 + 3.0 * c0030) / 3.0;
        let c0120 = (df32 + 3.0 * c0030) / 3.0;

        let c2001 = (c2100 + c2010 + c3000) / 3.0;
        let c0201 = (c1200 + c0300 + c0210) / 3.0;
        let c0021 = (c1020 + c0120 + c0030) / 3.0;

        // Cross-boundary derivative direction: towards the neighbour's
        // centroid, which keeps the patch C1 and affine invariant.
        let mut g = [-0.5f64; 3];
        for (k, slot) in g.iter_mut().enumerate() {
            let Some(n) = tri.neighbors[t][k] else {
                continue;
            };
            let [q1, q2, q3] = tri.corners(n);
            let centroid = [(q1[0] + q2[0] + q3[0]) / 3.0, (q1[1] + q2[1] + q3[1]) / 3.0];
            let c = barycentric([p1, p2, p3], centroid);
            *slot = match k {
                0 => (2.0 * c[2] + c[1] - 1.0) / (2.0 - 3.0 * c[2] - 3.0 * c[1]),
                1 => (2.0 * c[0] + c[2] - 1.0) / (2.0 - 3.0 * c[0] - 3.0 * c[2]),
                _ => (2.0 * c[1] + c[0] - 1.0) / (2.0 - 3.0 * c[1] - 3.0 * c[0]),
            };
        }

        let c0111 = (g[0] * (-c0300 + 3.0 * c0210 - 3.0 * c0120 + c0030)
            + (-c0300 + 2.0 * c0210 - c0120 + c0021 + c0201))
            / 2.0;
        let c1011 = (g[1] * (-c0030 + 3.0 * c1020 - 3.0 * c2010 + c3000)
            + (-c0030 + 2.0 * c1020 - c2010 + c2001 + c0021))
            / 2.0;
        let c1101 = (g[2] * (-c3000 + 3.0 * c2100 - 3.0 * c1200 + c0300)
            + (-c3000 + 2.0 * c2100 - c1200 + c2001 + c0201))
            / 2.0;

        let c1002 = (c1101 + c1011 + c2001) / 3.0;
        let c0102 = (c1101 + c0111 + c0201) / 3.0;
        let c0012 = (c1011 + c0111 + c0021) / 3.0;
        let c0003 = (c1002 + c0102 + c0012) / 3.0;

        Self {
            c3000,
            c0300,
            c0030,
            c0003,
            c2100,
            c2010,
            c2001,
            c0210,
            c0201,
            c0021,
            c1200,
            c1020,
            c1002,
            c0120,
            c0102,
            c0012,
            c1101,
            c1011,
            c0111,
        }
    }

    /// Evaluate at barycentric `b` of the macro-triangle.
    fn eval(&self, b: [f64; 3]) -> f64 {
        // Extended coordinates of the micro-triangle containing `b`; one of
        // b1..b3 is zero.
        let m = b[0].min(b[1]).min(b[2]);
        let (b1, b2, b3, b4) = (b[0] - m, b[1] - m, b[2] - m, 3.0 * m);

        b1.powi(3) * self.c3000
            + 3.0 * b1 * b1 * b2 * self.c2100
            + 3.0 * b1 * b1 * b3 * self.c2010
            + 3.0 * b1 * b1 * b4 * self.c2001
            + 3.0 * b1 * b2 * b2 * self.c1200
            + 6.0 * b1 * b2 * b4 * self.c1101
            + 3.0 * b1 * b3 * b3 * self.c1020
            + 6.0 * b1 * b3 * b4 * self.c1011
            + 3.0 * b1 * b4 * b4 * self.c1002
            + b2.powi(3) * self.c0300
            + 3.0 * b2 * b2 * b3 * self.c0210
            + 3.0 * b2 * b2 * b4 * self.c0201
            + 3.0 * b2 * b3 * b3 * self.c0120
            + 6.0 * b2 * b3 * b4 * self.c0111
            + 3.0 * b2 * b4 * b4 * self.c0102
            + b3.powi(3) * self.c0030
            + 3.0 * b3 * b3 * b4 * self.c0021
            + 3.0 * b3 * b4 * b4 * self.c0012
            + b4.powi(3) * self.c0003
    }
}
