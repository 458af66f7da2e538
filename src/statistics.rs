//! Class histograms, uncertainty measures and vote moments used to
//! score candidate splits.

/// log2!(x) = log2 x if x != 0 and 0 otherwise
macro_rules! log2 {
     ($x: expr) => {if $x == 0f64 {0f64} else {$x.log2()} }
}

/// rel!(a,b) = a / b where a and b are forced to be a f64
macro_rules! rel {
    ($x: expr, $y: expr) => {($x as f64) / ($y as f64)}
}

/// Counts how often every class in `[0, num_classes)` occurs
/// among the selected examples.
pub fn class_histogram(classes: &[usize], selected: &[usize], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_classes];
    for &i in selected {
        counts[classes[i]] += 1;
    }
    counts
}

/// Shannon entropy (in bits) of the distribution given by `counts`.
/// An empty histogram has no uncertainty.
pub fn entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    -counts.iter()
        .map(|&c| {
            let p = rel!(c, total);
            p * log2!(p)
        })
        .sum::<f64>()
}

/// Returns the index and the number of elements of the most frequent class.
/// Ties resolve to the lowest class index.
pub fn dominant_class(counts: &[usize]) -> (usize, usize) {
    let mut best = (0, 0);
    for (class, &count) in counts.iter().enumerate() {
        if count > best.1 {
            best = (class, count);
        }
    }
    best
}

/// Maps a maximum dominant fraction to the equivalent minimum class uncertainty:
/// the entropy of the distribution that puts `fraction` on one class and
/// spreads the remainder evenly over the other `num_classes - 1` classes.
pub fn dominant_fraction_to_uncertainty(fraction: f64, num_classes: usize) -> f64 {
    if num_classes <= 1 {
        return 0.0;
    }
    let rest = (1.0 - fraction) / ((num_classes - 1) as f64);
    -(fraction * log2!(fraction) + ((num_classes - 1) as f64) * rest * log2!(rest))
}

/// Scatter of a class below this fraction of the squared magnitude of
/// its mean is rounding noise and counts as no scatter at all.
const RELATIVE_SCATTER_EPSILON: f64 = 1e-24;

/// Running first and second moments of the self-votes of a set of examples,
/// kept separately for every object class. Background examples are ignored.
///
/// The moments are taken of the deviations from a per-class shift, so
/// votes far away from the origin do not cancel each other out.
#[derive(Debug, Clone)]
pub struct VoteMoments {
    dims: usize,
    counts: Vec<usize>,
    shift: Vec<f64>,
    sums: Vec<f64>,
    squares: Vec<f64>,
}

impl VoteMoments {
    /// Creates empty moments for `num_classes` classes whose votes
    /// have at most `dims` parameters.
    pub fn new(num_classes: usize, dims: usize) -> VoteMoments {
        VoteMoments {
            dims: dims,
            counts: vec![0; num_classes],
            shift: vec![0.0; num_classes * dims],
            sums: vec![0.0; num_classes * dims],
            squares: vec![0.0; num_classes * dims],
        }
    }

    /// Moments of `votes` (pairs of class and vote), shifted by the class means.
    pub fn centered<'a, I>(num_classes: usize, dims: usize, votes: I) -> VoteMoments
        where I: IntoIterator<Item = (usize, &'a [f64])> + Clone
    {
        let mut means = VoteMoments::new(num_classes, dims);
        for (class, vote) in votes.clone() {
            means.add(class, vote);
        }
        let mut shift = means.sums;
        for (class, &n) in means.counts.iter().enumerate() {
            if n > 0 {
                for s in &mut shift[class * dims..(class + 1) * dims] {
                    *s /= n as f64;
                }
            }
        }

        let mut res = VoteMoments { shift: shift, ..VoteMoments::new(num_classes, dims) };
        for (class, vote) in votes {
            res.add(class, vote);
        }
        res
    }

    /// Empty moments with the same shift as `self`.
    pub fn empty_like(&self) -> VoteMoments {
        let size = self.sums.len();
        VoteMoments {
            dims: self.dims,
            counts: vec![0; self.counts.len()],
            shift: self.shift.clone(),
            sums: vec![0.0; size],
            squares: vec![0.0; size],
        }
    }

    pub fn add(&mut self, class: usize, vote: &[f64]) {
        self.update(class, vote, 1.0);
    }

    pub fn remove(&mut self, class: usize, vote: &[f64]) {
        self.update(class, vote, -1.0);
    }

    fn update(&mut self, class: usize, vote: &[f64], sign: f64) {
        if class == 0 {
            return;
        }
        if sign > 0.0 {
            self.counts[class] += 1;
        } else {
            self.counts[class] -= 1;
        }
        let offset = class * self.dims;
        for (d, &v) in vote.iter().take(self.dims).enumerate() {
            let dev = v - self.shift[offset + d];
            self.sums[offset + d] += sign * dev;
            self.squares[offset + d] += sign * dev * dev;
        }
    }

    /// Within-class sum of squared deviations from the class means,
    /// summed over all object classes and vote parameters.
    pub fn scatter(&self) -> f64 {
        let mut res = 0.0;
        for class in 1..self.counts.len() {
            let n = self.counts[class] as f64;
            if n == 0.0 {
                continue;
            }
            let offset = class * self.dims;
            let mut class_scatter = 0.0;
            let mut magnitude = 0.0;
            for d in 0..self.dims {
                let s = self.sums[offset + d];
                let dev = self.squares[offset + d] - s * s / n;
                // Cancellation may leave tiny negative values
                if dev > 0.0 {
                    class_scatter += dev;
                }
                let mean = self.shift[offset + d] + s / n;
                magnitude += n * mean * mean;
            }
            if class_scatter > RELATIVE_SCATTER_EPSILON * magnitude {
                res += class_scatter;
            }
        }
        res
    }
}
