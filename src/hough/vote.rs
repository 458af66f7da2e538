//! Votes cast by a forest and the callbacks receiving them.

/// One vote cast for the parameters of a point's parent object.
/// It borrows from the forest that cast it and lives only for the
/// duration of the callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote<'a> {
    target_class: usize,
    params: &'a [f64],
    weight: f64,
    index: Option<usize>,
    features: Option<&'a [f64]>,
}

impl<'a> Vote<'a> {
    /// Creates a vote.
    ///
    /// # Arguments
    /// * `target_class` - class for which this vote is cast
    /// * `params` - parameters of the vote (a point of the Hough space of the class)
    /// * `weight` - weight of the vote
    /// * `index` - index of the training example used to compute the vote, if known
    /// * `features` - features of the training example used to compute the vote, if known
    pub fn new(target_class: usize,
               params: &'a [f64],
               weight: f64,
               index: Option<usize>,
               features: Option<&'a [f64]>)
               -> Vote<'a> {
        Vote {
            target_class: target_class,
            params: params,
            weight: weight,
            index: index,
            features: features,
        }
    }

    pub fn target_class(&self) -> usize {
        self.target_class
    }

    /// Number of parameters (dimension of the Hough space).
    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    pub fn parameters(&self) -> &'a [f64] {
        self.params
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Index of the training example used to compute the vote.
    pub fn training_example_index(&self) -> Option<usize> {
        self.index
    }

    /// Features of the training example used to compute the vote.
    pub fn voting_features(&self) -> Option<&'a [f64]> {
        self.features
    }

    /// Copies the vote so it can outlive the callback.
    pub fn to_collected(&self) -> CollectedVote {
        CollectedVote {
            target_class: self.target_class,
            params: self.params.to_vec(),
            weight: self.weight,
            index: self.index,
            features: self.features.map(|f| f.to_vec()),
        }
    }
}

/// Receives every vote cast by a forest.
/// Closures taking a `&Vote` implement this trait.
pub trait VoteCallback {
    fn vote(&mut self, vote: &Vote);
}

impl<F> VoteCallback for F
    where F: FnMut(&Vote)
{
    fn vote(&mut self, vote: &Vote) {
        self(vote)
    }
}

/// An owned copy of a vote.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CollectedVote {
    pub target_class: usize,
    pub params: Vec<f64>,
    pub weight: f64,
    pub index: Option<usize>,
    pub features: Option<Vec<f64>>,
}

/// Callback that keeps a copy of every vote.
#[derive(Debug, Clone, Default)]
pub struct VoteCollector {
    pub votes: Vec<CollectedVote>,
}

impl VoteCollector {
    pub fn new() -> VoteCollector {
        VoteCollector { votes: vec![] }
    }

    /// Sum of the weights of all collected votes.
    pub fn total_weight(&self) -> f64 {
        self.votes.iter().map(|v| v.weight).sum()
    }

    /// Weighted mean of the vote parameters, or `None` without votes.
    pub fn weighted_mean(&self) -> Option<Vec<f64>> {
        let total = self.total_weight();
        if self.votes.is_empty() || total <= 0.0 {
            return None;
        }
        let dims = self.votes.iter().map(|v| v.params.len()).max().unwrap_or(0);
        let mut mean = vec![0f64; dims];
        for v in &self.votes {
            for (m, p) in mean.iter_mut().zip(&v.params) {
                *m += v.weight * p;
            }
        }
        for m in &mut mean {
            *m /= total;
        }
        Some(mean)
    }
}

impl VoteCallback for VoteCollector {
    fn vote(&mut self, vote: &Vote) {
        self.votes.push(vote.to_collected());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cast<C: VoteCallback>(callback: &mut C) {
        let params = [1.0, 2.0];
        let features = [0.5];
        callback.vote(&Vote::new(1, &params, 0.25, Some(3), Some(&features)));
        callback.vote(&Vote::new(1, &[3.0, 6.0], 0.75, None, None));
    }

    #[test]
    fn test_closure_callback() {
        let mut seen = vec![];
        cast(&mut |v: &Vote| seen.push((v.target_class(), v.num_parameters(), v.weight())));
        assert_eq!(seen, vec![(1, 2, 0.25), (1, 2, 0.75)]);
    }

    #[test]
    fn test_collector() {
        let mut collector = VoteCollector::new();
        cast(&mut collector);
        assert_eq!(collector.votes.len(), 2);
        assert_eq!(collector.votes[0].index, Some(3));
        assert_eq!(collector.votes[0].features, Some(vec![0.5]));
        assert_eq!(collector.votes[1].index, None);
        assert_eq!(collector.total_weight(), 1.0);
        assert_eq!(collector.weighted_mean(), Some(vec![2.5, 5.0]));
        assert_eq!(VoteCollector::new().weighted_mean(), None);
    }
}
