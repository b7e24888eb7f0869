//! Delaunay triangulation of scattered 2-D points (Bowyer-Watson)

use crate::structs::{GeoError, Result};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Barycentric tolerance when deciding whether a point lies in a triangle
const LOCATE_EPS: f64 = 1e-10;
/// Point sets whose widest triangle has relative area below this are collinear
const COLLINEAR_EPS: f64 = 1e-12;
/// Vertex at infinity; ghost triangles `[a, b, GHOST]` sit outside hull edge `b -> a`
const GHOST: usize = usize::MAX;

/// Delaunay triangulation; triangles are stored counter-clockwise
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<[f64; 2]>,
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    /// Triangulate distinct points
    ///
    /// # Errors
    /// Returns error for fewer than 3 points or when every point is collinear
    pub fn new(points: Vec<[f64; 2]>) -> Result<Self> {
        let n = points.len();
        if n < 3 {
            return Err(GeoError::DegenerateInput(format!(
                "Triangulation needs at least 3 distinct points, got {n}"
            )));
        }

        let (min, max) = bounding_box(&points);
        let extent = (max[0] - min[0]).max(max[1] - min[1]);
        if extent <= 0.0 {
            return Err(GeoError::DegenerateInput("All points coincide".into()));
        }

        let [a, b, c] = seed_triangle(&points, extent)?;
        let mut triangles = vec![[a, b, c], [b, a, GHOST], [c, b, GHOST], [a, c, GHOST]];

        for p in (0..n).filter(|&p| p != a && p != b && p != c) {
            let (bad, good): (Vec<[usize; 3]>, Vec<[usize; 3]>) = triangles
                .into_iter()
                .partition(|&t| in_conflict(&points, t, points[p]));

            // Cavity boundary: edges owned by exactly one conflicting triangle
            let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
            for t in &bad {
                for (u, v) in edges(*t) {
                    *edge_count.entry((u.min(v), u.max(v))).or_insert(0) += 1;
                }
            }

            triangles = good;
            for t in &bad {
                for (u, v) in edges(*t) {
                    if edge_count[&(u.min(v), u.max(v))] == 1 {
                        triangles.push(ghost_last([u, v, p]));
                    }
                }
            }
        }

        triangles.retain(|t| t[2] != GHOST);

        debug!(points = n, triangles = triangles.len(), "triangulated");

        Ok(Self { points, triangles })
    }

    #[must_use]
    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    #[must_use]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Sorted neighbour list for every vertex
    #[must_use]
    pub fn vertex_neighbors(&self) -> Vec<Vec<usize>> {
        let mut neighbors = vec![BTreeSet::new(); self.points.len()];
        for &t in &self.triangles {
            for (a, b) in edges(t) {
                neighbors[a].insert(b);
                neighbors[b].insert(a);
            }
        }
        neighbors.into_iter().map(|set| set.into_iter().collect()).collect()
    }

    /// For every triangle, the triangle across the edge opposite each vertex
    #[must_use]
    pub fn triangle_neighbors(&self) -> Vec<[Option<usize>; 3]> {
        let mut owners: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (idx, &t) in self.triangles.iter().enumerate() {
            for (a, b) in edges(t) {
                owners.entry((a.min(b), a.max(b))).or_default().push(idx);
            }
        }

        self.triangles
            .iter()
            .enumerate()
            .map(|(idx, &t)| {
                [0, 1, 2].map(|i| {
                    let (a, b) = (t[(i + 1) % 3], t[(i + 2) % 3]);
                    owners[&(a.min(b), a.max(b))]
                        .iter()
                        .copied()
                        .find(|&other| other != idx)
                })
            })
            .collect()
    }

    /// Find a triangle containing `p` and its barycentric coordinates there
    #[must_use]
    pub fn locate(&self, p: [f64; 2]) -> Option<(usize, [f64; 3])> {
        self.triangles.iter().enumerate().find_map(|(idx, &t)| {
            let b = barycentric(&self.points, t, p)?;
            b.iter().all(|&w| w >= -LOCATE_EPS).then_some((idx, b))
        })
    }
}

fn bounding_box(points: &[[f64; 2]]) -> ([f64; 2], [f64; 2]) {
    points.iter().fold(
        ([f64::MAX, f64::MAX], [f64::MIN, f64::MIN]),
        |(lo, hi), p| {
            (
                [lo[0].min(p[0]), lo[1].min(p[1])],
                [hi[0].max(p[0]), hi[1].max(p[1])],
            )
        },
    )
}

/// First triangle: point 0, the point farthest from it, and the point farthest
/// off their line, ordered counter-clockwise
fn seed_triangle(points: &[[f64; 2]], extent: f64) -> Result<[usize; 3]> {
    let origin = points[0];
    let dist2 = |i: usize| {
        let d = [points[i][0] - origin[0], points[i][1] - origin[1]];
        d[0] * d[0] + d[1] * d[1]
    };
    let far = (1..points.len())
        .max_by(|&i, &j| dist2(i).total_cmp(&dist2(j)))
        .unwrap_or(1);

    let (apex, area) = (1..points.len())
        .filter(|&i| i != far)
        .map(|i| (i, orient(origin, points[far], points[i])))
        .max_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
        .unwrap_or((0, 0.0));

    if area.abs() <= COLLINEAR_EPS * extent * extent {
        return Err(GeoError::DegenerateInput(
            "Points are collinear; no triangles can be formed".into(),
        ));
    }

    Ok(if area > 0.0 {
        [0, far, apex]
    } else {
        [0, apex, far]
    })
}

/// Rotate a triangle so the vertex at infinity, if any, comes last
const fn ghost_last(t: [usize; 3]) -> [usize; 3] {
    if t[0] == GHOST {
        [t[1], t[2], t[0]]
    } else if t[1] == GHOST {
        [t[2], t[0], t[1]]
    } else {
        t
    }
}

/// Whether inserting `p` destroys triangle `t`. A ghost triangle conflicts
/// when `p` is strictly outside its hull edge or on the open edge itself.
fn in_conflict(points: &[[f64; 2]], t: [usize; 3], p: [f64; 2]) -> bool {
    if t[2] == GHOST {
        let (a, b) = (points[t[0]], points[t[1]]);
        let side = orient(a, b, p);
        let between = (p[0] - a[0]) * (p[0] - b[0]) + (p[1] - a[1]) * (p[1] - b[1]) < 0.0;
        side > 0.0 || (side == 0.0 && between)
    } else {
        in_circumcircle(points, t, p)
    }
}

fn edges(t: [usize; 3]) -> [(usize, usize); 3] {
    [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])]
}

/// Twice the signed area of (a, b, c); positive when counter-clockwise
fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
}

/// Strict in-circle predicate for a counter-clockwise triangle
fn in_circumcircle(points: &[[f64; 2]], t: [usize; 3], d: [f64; 2]) -> bool {
    let [a, b, c] = t.map(|i| points[i]);
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);

    let det = (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
        + (bdx * bdx + bdy * bdy) * (cdx * ady - adx * cdy)
        + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady);
    det > 0.0
}

/// Barycentric coordinates of `p` in triangle `t`, `None` for zero-area triangles
pub fn barycentric(points: &[[f64; 2]], t: [usize; 3], p: [f64; 2]) -> Option<[f64; 3]> {
    let [a, b, c] = t.map(|i| points[i]);
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if det == 0.0 {
        return None;
    }
    let l0 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / det;
    let l1 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / det;
    Some([l0, l1, 1.0 - l0 - l1])
}
