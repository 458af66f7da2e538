//! Access to training data.
//!
//! A forest never keeps a reference to the training data: everything it
//! needs is copied into its own cache when training starts.

use errors::*;

/// Trait for reading training examples.
///
/// Examples are addressed by their index in `[0, num_examples())`.
/// Class 0 is the background class; background examples have no self-vote.
pub trait TrainingData {
    /// Returns the number of training examples.
    fn num_examples(&self) -> usize;

    /// Returns the number of possible class labels
    /// (some of which may be absent in the training data).
    fn num_classes(&self) -> usize;

    /// Returns the number of features per example.
    fn num_features(&self) -> usize;

    /// Returns the number of parameters (dimensions) of the Hough space of `class`.
    fn num_vote_parameters(&self, class: usize) -> usize;

    /// Writes the values of feature `feature` of all examples into `values`
    /// (`num_examples()` elements).
    fn features(&self, feature: usize, values: &mut [f64]);

    /// Writes the values of feature `feature` of the `selected` examples into `values`.
    fn features_of(&self, feature: usize, selected: &[usize], values: &mut [f64]) {
        let mut all = vec![0f64; self.num_examples()];
        self.features(feature, &mut all);
        for (v, &i) in values.iter_mut().zip(selected) {
            *v = all[i];
        }
    }

    /// Writes the classes of all examples into `classes`.
    fn classes(&self, classes: &mut [usize]);

    /// Writes the classes of the `selected` examples into `classes`.
    fn classes_of(&self, selected: &[usize], classes: &mut [usize]) {
        let mut all = vec![0usize; self.num_examples()];
        self.classes(&mut all);
        for (c, &i) in classes.iter_mut().zip(selected) {
            *c = all[i];
        }
    }

    /// Writes the parameters of the Hough vote of example `example` for its
    /// parent object into `params` (`num_vote_parameters(class)` elements).
    fn self_vote(&self, example: usize, params: &mut [f64]);
}

/// What a training example shows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Truth {
    Background,
    Object {
        /// Class of the object, at least 1.
        class: usize,
        /// The vote of the example for its parent object,
        /// e.g. the offset to the center of the object.
        vote: Vec<f64>,
    },
}

impl Truth {
    pub fn class(&self) -> usize {
        match *self {
            Truth::Background => 0,
            Truth::Object { class, .. } => class,
        }
    }
}

/// Training examples held in memory.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExampleSet {
    num_classes: usize,
    num_features: usize,
    num_vote_params: Vec<usize>,
    /// row-major [examples x features]
    features: Vec<f64>,
    truths: Vec<Truth>,
}

impl ExampleSet {
    /// Creates an empty set. `num_vote_params[c]` is the dimension of the
    /// Hough space of class `c`; the entry of the background class is ignored.
    pub fn new(num_classes: usize,
               num_features: usize,
               num_vote_params: &[usize])
               -> Result<ExampleSet> {
        if num_classes == 0 {
            bail!(ErrorKind::InvalidTrainingData("at least one class is needed".to_string()));
        }
        if num_vote_params.len() != num_classes {
            bail!(ErrorKind::DimensionMismatch("vote parameter table",
                                               num_classes,
                                               num_vote_params.len()));
        }
        Ok(ExampleSet {
            num_classes: num_classes,
            num_features: num_features,
            num_vote_params: num_vote_params.to_vec(),
            features: vec![],
            truths: vec![],
        })
    }

    /// Adds an example.
    pub fn push(&mut self, features: &[f64], truth: Truth) -> Result<()> {
        if features.len() != self.num_features {
            bail!(ErrorKind::DimensionMismatch("features", self.num_features, features.len()));
        }
        if let Truth::Object { class, ref vote } = truth {
            if class == 0 || class >= self.num_classes {
                bail!(ErrorKind::InvalidTrainingData(format!("invalid object class {}", class)));
            }
            if vote.len() != self.num_vote_params[class] {
                bail!(ErrorKind::DimensionMismatch("self-vote",
                                                   self.num_vote_params[class],
                                                   vote.len()));
            }
        }
        self.features.extend_from_slice(features);
        self.truths.push(truth);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.truths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.truths.is_empty()
    }

    /// Returns the features of example `i`.
    pub fn example_features(&self, i: usize) -> &[f64] {
        &self.features[i * self.num_features..(i + 1) * self.num_features]
    }

    pub fn truth(&self, i: usize) -> &Truth {
        &self.truths[i]
    }
}

impl TrainingData for ExampleSet {
    fn num_examples(&self) -> usize {
        self.truths.len()
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn num_vote_parameters(&self, class: usize) -> usize {
        self.num_vote_params[class]
    }

    fn features(&self, feature: usize, values: &mut [f64]) {
        for (i, v) in values.iter_mut().enumerate().take(self.truths.len()) {
            *v = self.features[i * self.num_features + feature];
        }
    }

    fn features_of(&self, feature: usize, selected: &[usize], values: &mut [f64]) {
        for (v, &i) in values.iter_mut().zip(selected) {
            *v = self.features[i * self.num_features + feature];
        }
    }

    fn classes(&self, classes: &mut [usize]) {
        for (c, t) in classes.iter_mut().zip(self.truths.iter()) {
            *c = t.class();
        }
    }

    fn classes_of(&self, selected: &[usize], classes: &mut [usize]) {
        for (c, &i) in classes.iter_mut().zip(selected) {
            *c = self.truths[i].class();
        }
    }

    fn self_vote(&self, example: usize, params: &mut [f64]) {
        if let Truth::Object { ref vote, .. } = self.truths[example] {
            for (p, v) in params.iter_mut().zip(vote) {
                *p = *v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Only implements the required methods to check the provided subset accessors.
    struct Columns {
        values: Vec<f64>,
        classes: Vec<usize>,
    }

    impl TrainingData for Columns {
        fn num_examples(&self) -> usize {
            self.values.len()
        }
        fn num_classes(&self) -> usize {
            2
        }
        fn num_features(&self) -> usize {
            1
        }
        fn num_vote_parameters(&self, _: usize) -> usize {
            0
        }
        fn features(&self, _: usize, values: &mut [f64]) {
            values.copy_from_slice(&self.values);
        }
        fn classes(&self, classes: &mut [usize]) {
            classes.copy_from_slice(&self.classes);
        }
        fn self_vote(&self, _: usize, _: &mut [f64]) {}
    }

    #[test]
    fn test_default_subset_accessors() {
        let data = Columns {
            values: vec![0.5, 1.5, 2.5, 3.5],
            classes: vec![0, 1, 1, 0],
        };
        let mut values = [0.0; 2];
        data.features_of(0, &[3, 1], &mut values);
        assert_eq!(values, [3.5, 1.5]);
        let mut classes = [9; 3];
        data.classes_of(&[1, 0, 3], &mut classes);
        assert_eq!(classes, [1, 0, 0]);
    }

    #[test]
    fn test_example_set() {
        let mut set = ExampleSet::new(3, 2, &[0, 1, 2]).unwrap();
        set.push(&[0.1, 0.2], Truth::Background).unwrap();
        set.push(&[0.3, 0.4], Truth::Object { class: 1, vote: vec![7.0] }).unwrap();
        set.push(&[0.5, 0.6], Truth::Object { class: 2, vote: vec![8.0, 9.0] }).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.example_features(1), &[0.3, 0.4]);

        let mut column = [0.0; 3];
        set.features(1, &mut column);
        assert_eq!(column, [0.2, 0.4, 0.6]);
        let mut subset = [0.0; 2];
        set.features_of(0, &[2, 0], &mut subset);
        assert_eq!(subset, [0.5, 0.1]);

        let mut classes = [0; 3];
        set.classes(&mut classes);
        assert_eq!(classes, [0, 1, 2]);
        let mut sub_classes = [0; 1];
        set.classes_of(&[2], &mut sub_classes);
        assert_eq!(sub_classes, [2]);

        let mut vote = [0.0; 2];
        set.self_vote(2, &mut vote);
        assert_eq!(vote, [8.0, 9.0]);
    }

    #[test]
    fn test_example_set_rejects_bad_examples() {
        let mut set = ExampleSet::new(2, 1, &[0, 1]).unwrap();
        assert!(set.push(&[0.1, 0.2], Truth::Background).is_err());
        assert!(set.push(&[0.1], Truth::Object { class: 0, vote: vec![] }).is_err());
        assert!(set.push(&[0.1], Truth::Object { class: 2, vote: vec![1.0] }).is_err());
        assert!(set.push(&[0.1], Truth::Object { class: 1, vote: vec![1.0, 2.0] }).is_err());
        assert!(set.is_empty());
        assert!(ExampleSet::new(0, 1, &[]).is_err());
        assert!(ExampleSet::new(2, 1, &[1]).is_err());
    }
}
