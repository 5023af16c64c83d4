use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Label for points no cluster claims. Kept as the raw integer here; the
/// adapter wraps it into `TopicId`.
pub const OUTLIER_LABEL: i32 = -1;

#[derive(Clone, Copy, Debug)]
pub struct KMeansConfig {
    pub k: usize,
    pub max_iter: usize,
    pub seed: u64,
    /// Points farther than mean + z * stddev from their centroid are
    /// relabeled as outliers, approximating the noise class of the
    /// density-based reference pipeline.
    pub outlier_z: f32,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 8,
            max_iter: 50,
            seed: 42,
            outlier_z: 2.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Clustering {
    pub centroids: Vec<Vec<f32>>,
    /// Per-point labels: centroid index, or `OUTLIER_LABEL`.
    pub labels: Vec<i32>,
    /// Mean within-cluster squared distance over non-outlier points.
    pub mean_sq_dist: f32,
    /// Squared-distance threshold beyond which a point counts as an outlier.
    pub outlier_sq_threshold: f32,
}

pub fn dist_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Lloyd's k-means with k-means++ seeding and a fixed iteration budget. The
/// RNG is seeded so fits are reproducible across runs.
pub fn kmeans(points: &[Vec<f32>], cfg: &KMeansConfig) -> Clustering {
    let n = points.len();
    let k = cfg.k.clamp(1, n.max(1));
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let mut centroids = plus_plus_init(points, k, &mut rng);
    let mut labels = vec![0i32; n];

    for _ in 0..cfg.max_iter {
        let mut moved = false;
        for (i, p) in points.iter().enumerate() {
            let best = nearest(p, &centroids).0 as i32;
            if labels[i] != best {
                labels[i] = best;
                moved = true;
            }
        }
        centroids = recompute_centroids(points, &labels, &centroids);
        if !moved {
            break;
        }
    }

    // Outlier pass: distances to the assigned centroid, threshold at
    // mean + z * stddev.
    let dists: Vec<f32> = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| dist_sq(p, &centroids[l as usize]).sqrt())
        .collect();
    let mean = dists.iter().sum::<f32>() / n.max(1) as f32;
    let var = dists.iter().map(|d| (d - mean) * (d - mean)).sum::<f32>() / n.max(1) as f32;
    let threshold = mean + cfg.outlier_z * var.sqrt();
    for (i, d) in dists.iter().enumerate() {
        if *d > threshold && threshold > 0.0 {
            labels[i] = OUTLIER_LABEL;
        }
    }

    let mut kept = 0usize;
    let mut sq_sum = 0.0f32;
    for (p, &l) in points.iter().zip(&labels) {
        if l != OUTLIER_LABEL {
            sq_sum += dist_sq(p, &centroids[l as usize]);
            kept += 1;
        }
    }
    let mean_sq_dist = if kept > 0 { sq_sum / kept as f32 } else { 1.0 };

    Clustering {
        centroids,
        labels,
        mean_sq_dist,
        outlier_sq_threshold: threshold * threshold,
    }
}

/// Merge the two nearest centroids until at most `target` clusters remain,
/// relabeling points as clusters fuse. Mirrors the topic-count reduction of
/// the reference pipeline (`nr_topics`).
pub fn merge_to(clustering: &mut Clustering, points: &[Vec<f32>], target: usize) {
    while clustering.centroids.len() > target.max(1) {
        let (a, b) = closest_centroid_pair(&clustering.centroids);
        // Weighted merge by member count, then drop centroid b.
        let count = |idx: usize| -> usize {
            clustering
                .labels
                .iter()
                .filter(|&&l| l == idx as i32)
                .count()
        };
        let (ca, cb) = (count(a) as f32, count(b) as f32);
        let total = (ca + cb).max(1.0);
        let merged: Vec<f32> = clustering.centroids[a]
            .iter()
            .zip(&clustering.centroids[b])
            .map(|(x, y)| (x * ca + y * cb) / total)
            .collect();
        clustering.centroids[a] = merged;
        clustering.centroids.remove(b);
        for l in clustering.labels.iter_mut() {
            if *l == b as i32 {
                *l = a as i32;
            } else if *l > b as i32 {
                *l -= 1;
            }
        }
    }
    // Centroid geometry changed; refresh the spread statistic.
    let mut kept = 0usize;
    let mut sq_sum = 0.0f32;
    for (p, &l) in points.iter().zip(&clustering.labels) {
        if l != OUTLIER_LABEL {
            sq_sum += dist_sq(p, &clustering.centroids[l as usize]);
            kept += 1;
        }
    }
    if kept > 0 {
        clustering.mean_sq_dist = sq_sum / kept as f32;
    }
}

fn nearest(p: &[f32], centroids: &[Vec<f32>]) -> (usize, f32) {
    let mut best = (0usize, f32::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(p, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn plus_plus_init(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());
    while centroids.len() < k {
        let weights: Vec<f32> = points
            .iter()
            .map(|p| nearest(p, &centroids).1)
            .collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            // All remaining points coincide with a centroid; duplicates are fine.
            centroids.push(points[rng.gen_range(0..points.len())].clone());
            continue;
        }
        let mut pick = rng.gen_range(0.0..total);
        let mut chosen = points.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            if pick < *w {
                chosen = i;
                break;
            }
            pick -= w;
        }
        centroids.push(points[chosen].clone());
    }
    centroids
}

fn recompute_centroids(
    points: &[Vec<f32>],
    labels: &[i32],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dim = previous.first().map(|c| c.len()).unwrap_or(0);
    let mut sums = vec![vec![0.0f32; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &l) in points.iter().zip(labels) {
        let idx = l as usize;
        counts[idx] += 1;
        for (s, x) in sums[idx].iter_mut().zip(p) {
            *s += x;
        }
    }
    sums.into_iter()
        .enumerate()
        .map(|(i, mut s)| {
            if counts[i] == 0 {
                // Empty cluster keeps its previous centroid.
                previous[i].clone()
            } else {
                for x in s.iter_mut() {
                    *x /= counts[i] as f32;
                }
                s
            }
        })
        .collect()
}

fn closest_centroid_pair(centroids: &[Vec<f32>]) -> (usize, usize) {
    let mut best = (0usize, 1usize, f32::INFINITY);
    for i in 0..centroids.len() {
        for j in (i + 1)..centroids.len() {
            let d = dist_sq(&centroids[i], &centroids[j]);
            if d < best.2 {
                best = (i, j, d);
            }
        }
    }
    (best.0, best.1)
}

#[cfg(test)]
mod tests {
    use super::{kmeans, merge_to, KMeansConfig, OUTLIER_LABEL};

    fn two_blobs() -> Vec<Vec<f32>> {
        let mut pts = Vec::new();
        for i in 0..10 {
            let jitter = i as f32 * 0.01;
            pts.push(vec![0.0 + jitter, 0.0]);
            pts.push(vec![10.0 + jitter, 10.0]);
        }
        pts
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let pts = two_blobs();
        let c = kmeans(
            &pts,
            &KMeansConfig {
                k: 2,
                ..Default::default()
            },
        );
        assert_eq!(c.centroids.len(), 2);
        // Points of the same blob share a label.
        assert_eq!(c.labels[0], c.labels[2]);
        assert_eq!(c.labels[1], c.labels[3]);
        assert_ne!(c.labels[0], c.labels[1]);
    }

    #[test]
    fn merge_reduces_cluster_count() {
        let pts = two_blobs();
        let mut c = kmeans(
            &pts,
            &KMeansConfig {
                k: 4,
                ..Default::default()
            },
        );
        merge_to(&mut c, &pts, 2);
        assert_eq!(c.centroids.len(), 2);
        for l in &c.labels {
            assert!(*l == OUTLIER_LABEL || (*l >= 0 && (*l as usize) < 2));
        }
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let pts = two_blobs();
        let cfg = KMeansConfig {
            k: 2,
            seed: 9,
            ..Default::default()
        };
        let a = kmeans(&pts, &cfg);
        let b = kmeans(&pts, &cfg);
        assert_eq!(a.labels, b.labels);
    }
}
