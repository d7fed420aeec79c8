//! Static 2-d tree over (lat, lng) for nearest-neighbor lookup.
//!
//! Backed by kiddo's immutable k-d tree. Identical coordinates are indexed
//! once under their lowest row index, and equidistant candidates are re-ranked
//! so that the lowest index always wins.

use std::collections::HashMap;

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

/// Nearest point found by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the points the tree was built from
    pub index: usize,
    /// Euclidean distance in coordinate space
    pub distance: f64,
}

pub struct KdTree {
    len: usize,
    /// Distinct finite points with the lowest row index they appear at
    unique: Vec<([f64; 2], usize)>,
    tree: Option<ImmutableKdTree<f64, u64, 2, 32>>,
}

impl KdTree {
    pub fn build(points: Vec<[f64; 2]>) -> Self {
        let mut seen: HashMap<[u64; 2], usize> = HashMap::new();
        let mut unique = Vec::new();

        for (index, point) in points.iter().enumerate() {
            if !point[0].is_finite() || !point[1].is_finite() {
                continue;
            }
            let key = [point[0].to_bits(), point[1].to_bits()];
            seen.entry(key).or_insert_with(|| {
                unique.push((*point, index));
                index
            });
        }

        let tree = if unique.is_empty() {
            None
        } else {
            let coords: Vec<[f64; 2]> = unique.iter().map(|(p, _)| *p).collect();
            Some(ImmutableKdTree::new_from_slice(&coords))
        };

        Self {
            len: points.len(),
            unique,
            tree,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exact nearest neighbor; equal distances resolve to the lowest index
    pub fn nearest(&self, query: [f64; 2]) -> Option<Neighbor> {
        let tree = self.tree.as_ref()?;
        if !query[0].is_finite() || !query[1].is_finite() {
            return None;
        }

        let first = tree.nearest_one::<SquaredEuclidean>(&query);

        // Widen the radius a little so candidates at exactly the best
        // distance are returned however the tree compares the boundary.
        let radius = first.distance + first.distance * 1e-9 + f64::MIN_POSITIVE;
        let mut best: Option<(f64, usize)> = None;
        for candidate in tree.within_unsorted::<SquaredEuclidean>(&query, radius) {
            let (point, index) = self.unique[candidate.item as usize];
            let sq = squared_distance(point, query);
            let better = match best {
                None => true,
                Some((best_sq, best_index)) => {
                    sq < best_sq || (sq == best_sq && index < best_index)
                }
            };
            if better {
                best = Some((sq, index));
            }
        }

        best.map(|(sq, index)| Neighbor {
            index,
            distance: sq.sqrt(),
        })
    }
}

fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}
