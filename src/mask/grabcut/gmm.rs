//! Gaussian mixture color model used by the iterative foreground classifier.

pub(super) const COMPONENTS: usize = 5;

const KMEANS_ITERATIONS: usize = 10;
const VARIANCE_FLOOR: f64 = 0.01;
const DET_EPSILON: f64 = f64::EPSILON;

pub(super) type Color = [f64; 3];

#[derive(Debug, Clone, Default)]
struct Component {
    weight: f64,
    mean: Color,
    inverse: [[f64; 3]; 3],
    det: f64,
}

impl Component {
    /// Unnormalized Gaussian density at `color` (the 2π factor is dropped).
    fn density(&self, color: &Color) -> f64 {
        if self.weight <= 0.0 || self.det <= 0.0 {
            return 0.0;
        }
        (-0.5 * self.mahalanobis(color)).exp() / self.det.sqrt()
    }

    fn log_likelihood(&self, color: &Color) -> f64 {
        if self.weight <= 0.0 || self.det <= 0.0 {
            return f64::NEG_INFINITY;
        }
        self.weight.ln() - 0.5 * self.det.ln() - 0.5 * self.mahalanobis(color)
    }

    fn mahalanobis(&self, color: &Color) -> f64 {
        let d = [
            color[0] - self.mean[0],
            color[1] - self.mean[1],
            color[2] - self.mean[2],
        ];
        let mut sum = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                sum += d[i] * self.inverse[i][j] * d[j];
            }
        }
        sum
    }
}

/// Mixture of [`COMPONENTS`] full-covariance Gaussians over RGB.
#[derive(Debug, Clone, Default)]
pub(super) struct Gmm {
    components: [Component; COMPONENTS],
}

impl Gmm {
    /// Weighted density of `color` under the whole mixture.
    pub fn probability(&self, color: &Color) -> f64 {
        self.components
            .iter()
            .map(|c| c.weight * c.density(color))
            .sum()
    }

    /// Index of the component most likely to have produced `color`.
    pub fn most_likely(&self, color: &Color) -> usize {
        let mut best = 0;
        let mut best_ll = f64::NEG_INFINITY;
        for (k, c) in self.components.iter().enumerate() {
            let ll = c.log_likelihood(color);
            if ll > best_ll {
                best_ll = ll;
                best = k;
            }
        }
        best
    }

    /// Fit each component to the samples assigned to it.
    pub fn learn(samples: &[Color], assignment: &[usize]) -> Gmm {
        let mut sums = [[0.0f64; 3]; COMPONENTS];
        let mut prods = [[[0.0f64; 3]; 3]; COMPONENTS];
        let mut counts = [0usize; COMPONENTS];

        for (color, &k) in samples.iter().zip(assignment) {
            counts[k] += 1;
            for i in 0..3 {
                sums[k][i] += color[i];
                for j in 0..3 {
                    prods[k][i][j] += color[i] * color[j];
                }
            }
        }

        let total = samples.len() as f64;
        let mut gmm = Gmm::default();
        for k in 0..COMPONENTS {
            if counts[k] == 0 {
                continue;
            }
            let n = counts[k] as f64;
            let mean = [sums[k][0] / n, sums[k][1] / n, sums[k][2] / n];
            let mut cov = [[0.0f64; 3]; 3];
            for i in 0..3 {
                for j in 0..3 {
                    cov[i][j] = prods[k][i][j] / n - mean[i] * mean[j];
                }
            }
            let mut det = determinant(&cov);
            if det <= DET_EPSILON {
                for (i, row) in cov.iter_mut().enumerate() {
                    row[i] += VARIANCE_FLOOR;
                }
                det = determinant(&cov);
            }
            gmm.components[k] = Component {
                weight: n / total,
                mean,
                inverse: inverse(&cov, det),
                det,
            };
        }
        gmm
    }

    /// Initial fit: cluster the samples with k-means, then learn.
    pub fn fit(samples: &[Color]) -> Gmm {
        let assignment = kmeans(samples, COMPONENTS);
        Gmm::learn(samples, &assignment)
    }
}

fn determinant(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn inverse(m: &[[f64; 3]; 3], det: f64) -> [[f64; 3]; 3] {
    let d = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * d,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * d,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * d,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * d,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * d,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * d,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * d,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * d,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * d,
        ],
    ]
}

fn distance_sq(a: &Color, b: &Color) -> f64 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

/// Deterministic k-means: maximin seeding from the first sample, then
/// Lloyd iterations. Returns a cluster index per sample.
fn kmeans(samples: &[Color], k: usize) -> Vec<usize> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut centers: Vec<Color> = vec![samples[0]];
    let mut nearest: Vec<f64> = samples.iter().map(|s| distance_sq(s, &samples[0])).collect();
    while centers.len() < k {
        let (idx, &far) = nearest
            .iter()
            .enumerate()
            .fold((0, &0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if far <= 0.0 {
            break;
        }
        let center = samples[idx];
        for (n, s) in nearest.iter_mut().zip(samples) {
            *n = n.min(distance_sq(s, &center));
        }
        centers.push(center);
    }

    let mut labels = vec![0usize; samples.len()];
    for _ in 0..KMEANS_ITERATIONS {
        let mut changed = false;
        for (label, s) in labels.iter_mut().zip(samples) {
            let mut best = 0;
            let mut best_d = f64::INFINITY;
            for (c, center) in centers.iter().enumerate() {
                let d = distance_sq(s, center);
                if d < best_d {
                    best_d = d;
                    best = c;
                }
            }
            if *label != best {
                *label = best;
                changed = true;
            }
        }

        let mut sums = vec![[0.0f64; 3]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (&label, s) in labels.iter().zip(samples) {
            counts[label] += 1;
            for i in 0..3 {
                sums[label][i] += s[i];
            }
        }
        for (c, center) in centers.iter_mut().enumerate() {
            if counts[c] > 0 {
                let n = counts[c] as f64;
                *center = [sums[c][0] / n, sums[c][1] / n, sums[c][2] / n];
            }
        }

        if !changed {
            break;
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> Vec<Color> {
        let mut samples = Vec::new();
        for i in 0..50 {
            let jitter = (i % 5) as f64;
            samples.push([200.0 + jitter, 20.0, 20.0]);
            samples.push([20.0, 20.0 + jitter, 200.0]);
        }
        samples
    }

    #[test]
    fn kmeans_separates_distinct_colors() {
        let samples = two_clusters();
        let labels = kmeans(&samples, COMPONENTS);
        let red: Vec<usize> = labels.iter().step_by(2).copied().collect();
        let blue: Vec<usize> = labels.iter().skip(1).step_by(2).copied().collect();
        assert!(red.iter().all(|l| !blue.contains(l)));
    }

    #[test]
    fn fitted_model_prefers_its_own_colors() {
        let red: Vec<Color> = (0..40).map(|i| [200.0 + (i % 3) as f64, 10.0, 10.0]).collect();
        let blue: Vec<Color> = (0..40).map(|i| [10.0, 10.0, 200.0 + (i % 3) as f64]).collect();
        let red_model = Gmm::fit(&red);
        let blue_model = Gmm::fit(&blue);
        let sample = [201.0, 10.0, 10.0];
        assert!(red_model.probability(&sample) > blue_model.probability(&sample));
    }

    #[test]
    fn constant_samples_get_floored_variance() {
        let samples = vec![[5.0, 5.0, 5.0]; 10];
        let gmm = Gmm::fit(&samples);
        assert!(gmm.probability(&[5.0, 5.0, 5.0]).is_finite());
        assert!(gmm.probability(&[5.0, 5.0, 5.0]) > 0.0);
    }

    #[test]
    fn empty_samples_fit_to_nothing() {
        let gmm = Gmm::fit(&[]);
        assert_eq!(gmm.probability(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn determinant_and_inverse_agree() {
        let m = [[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 4.0]];
        let det = determinant(&m);
        assert_eq!(det, 24.0);
        let inv = inverse(&m, det);
        assert!((inv[1][1] - 1.0 / 3.0).abs() < 1e-12);
    }
}
