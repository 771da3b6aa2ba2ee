use crate::error::{RagError, Result};
use ndarray::{Array2, ArrayView1, Axis};

/// A nearest-neighbour match: position of the stored vector and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour index over squared Euclidean distance.
///
/// Row `i` holds the vector built from input `i`; there is no approximation
/// and no incremental insertion.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Array2<f32>,
}

impl VectorIndex {
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let rows = vectors.len();
        let dimension = match vectors.first() {
            Some(first) => first.len(),
            None => {
                return Err(RagError::InvalidConfig(
                    "cannot build an index over zero vectors".into(),
                ))
            }
        };
        if dimension == 0 {
            return Err(RagError::InvalidConfig("vectors must not be empty".into()));
        }
        if let Some((i, bad)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension) {
            return Err(RagError::InvalidConfig(format!(
                "vector {} has dimension {}, expected {}",
                i,
                bad.len(),
                dimension
            )));
        }

        let flat: Vec<f32> = vectors.into_iter().flatten().collect();
        let vectors = Array2::from_shape_vec((rows, dimension), flat)
            .map_err(|e| RagError::InvalidConfig(e.to_string()))?;
        Ok(Self { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    /// Up to `k` stored vectors nearest to `query`, closest first.
    ///
    /// Equal distances are ordered by index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension() {
            return Err(RagError::InvalidConfig(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension()
            )));
        }

        let query = ArrayView1::from(query);
        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(index, row)| {
                let diff = &row - &query;
                Neighbor {
                    index,
                    distance: diff.dot(&diff),
                }
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VectorIndex {
        VectorIndex::build(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 2.0],
            vec![3.0, 3.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_build_rejects_empty_and_ragged() {
        assert!(matches!(VectorIndex::build(vec![]), Err(RagError::InvalidConfig(_))));
        assert!(matches!(
            VectorIndex::build(vec![vec![1.0, 2.0], vec![1.0]]),
            Err(RagError::InvalidConfig(_))
        ));
        assert!(matches!(
            VectorIndex::build(vec![vec![]]),
            Err(RagError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_stored_vector_is_its_own_nearest() {
        let index = sample();
        for (i, v) in [[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [3.0, 3.0]].iter().enumerate() {
            let hits = index.search(v, 1).unwrap();
            assert_eq!(hits[0].index, i);
            assert_eq!(hits[0].distance, 0.0);
        }
    }

    #[test]
    fn test_squared_l2_ordering() {
        let hits = sample().search(&[0.0, 1.0], 4).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        // distances: 1, 2, 1, 13
        assert_eq!(order, vec![0, 2, 1, 3]);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[3].distance, 13.0);
    }

    #[test]
    fn test_k_bounds() {
        let index = sample();
        assert_eq!(index.search(&[0.5, 0.5], 10).unwrap().len(), 4);
        assert_eq!(index.search(&[0.5, 0.5], 2).unwrap().len(), 2);
        assert!(index.search(&[0.5, 0.5], 0).unwrap().is_empty());

        for k in 1..6 {
            let hits = index.search(&[2.0, -1.0], k).unwrap();
            assert!(hits.len() <= k);
            assert!(hits.iter().all(|h| h.index < index.len()));
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn test_query_dimension_mismatch() {
        assert!(matches!(
            sample().search(&[1.0, 2.0, 3.0], 1),
            Err(RagError::InvalidConfig(_))
        ));
    }
}
