use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded sparse random projection (Achlioptas construction: entries are
/// +1/0/-1 with probabilities 1/6, 2/3, 1/6, scaled by sqrt(3/out_dim)).
/// Stands in for the UMAP step of the reference pipeline: cheap, seeded, and
/// the same transform applies to fit documents and later queries.
#[derive(Clone, Debug)]
pub struct RandomProjection {
    rows: Vec<Vec<f32>>,
    in_dim: usize,
    out_dim: usize,
}

impl RandomProjection {
    #[must_use]
    pub fn new(in_dim: usize, out_dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = (3.0f32 / out_dim as f32).sqrt();
        let rows = (0..out_dim)
            .map(|_| {
                (0..in_dim)
                    .map(|_| match rng.gen_range(0..6) {
                        0 => scale,
                        1 => -scale,
                        _ => 0.0,
                    })
                    .collect()
            })
            .collect();
        Self {
            rows,
            in_dim,
            out_dim,
        }
    }

    #[must_use]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    #[must_use]
    pub fn project(&self, v: &[f32]) -> Vec<f32> {
        debug_assert_eq!(v.len(), self.in_dim);
        self.rows
            .iter()
            .map(|row| row.iter().zip(v).map(|(r, x)| r * x).sum())
            .collect()
    }

    pub fn project_all(&self, vs: &[Vec<f32>]) -> Vec<Vec<f32>> {
        vs.iter().map(|v| self.project(v)).collect()
    }
}
