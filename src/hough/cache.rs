//! Locally cached copy of the training data. Trees and votes refer to
//! examples only by their index into this cache.

use codec;
use errors::*;
use std::io::{Read, Write};
use training::TrainingData;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TrainingCache {
    num_features: usize,
    max_vote_params: usize,
    classes: Vec<usize>,
    /// row-major [examples x num_features]
    features: Vec<f64>,
    /// row-major [examples x max_vote_params], zero padded
    self_votes: Vec<f64>,
}

impl TrainingCache {
    /// Copies all examples of `data`. `num_vote_params` is the Hough space
    /// dimension per class as known by the forest.
    pub fn from_training_data<T>(data: &T, num_vote_params: &[usize]) -> Result<TrainingCache>
        where T: TrainingData + ?Sized
    {
        let num_examples = data.num_examples();
        let num_features = data.num_features();
        let num_classes = num_vote_params.len();
        let max_vote_params = num_vote_params.iter().skip(1).cloned().max().unwrap_or(0);

        let mut classes = vec![0usize; num_examples];
        data.classes(&mut classes);
        if let Some(&c) = classes.iter().find(|&&c| c >= num_classes) {
            bail!(ErrorKind::InvalidTrainingData(format!("class {} is not below {}", c, num_classes)));
        }

        let mut features = vec![0f64; num_examples * num_features];
        let mut column = vec![0f64; num_examples];
        for f in 0..num_features {
            data.features(f, &mut column);
            for (i, &v) in column.iter().enumerate() {
                features[i * num_features + f] = v;
            }
        }

        let mut self_votes = vec![0f64; num_examples * max_vote_params];
        for (i, &class) in classes.iter().enumerate() {
            if class == 0 {
                continue;
            }
            let offset = i * max_vote_params;
            data.self_vote(i, &mut self_votes[offset..offset + num_vote_params[class]]);
        }

        Ok(TrainingCache {
            num_features: num_features,
            max_vote_params: max_vote_params,
            classes: classes,
            features: features,
            self_votes: self_votes,
        })
    }

    pub fn num_examples(&self) -> usize {
        self.classes.len()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn max_vote_params(&self) -> usize {
        self.max_vote_params
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    #[inline]
    pub fn class(&self, example: usize) -> usize {
        self.classes[example]
    }

    #[inline]
    pub fn feature(&self, example: usize, feature: usize) -> f64 {
        self.features[example * self.num_features + feature]
    }

    /// All features of one example.
    pub fn features(&self, example: usize) -> &[f64] {
        &self.features[example * self.num_features..(example + 1) * self.num_features]
    }

    /// The zero padded self-vote of one example (`max_vote_params()` values).
    #[inline]
    pub fn self_vote(&self, example: usize) -> &[f64] {
        &self.self_votes[example * self.max_vote_params..(example + 1) * self.max_vote_params]
    }

    pub(crate) fn write_binary<W: Write>(&self, writer: &mut W) -> Result<()> {
        codec::write_usize(writer, self.num_features)?;
        codec::write_usize(writer, self.max_vote_params)?;
        codec::write_usizes(writer, &self.classes)?;
        codec::write_f64s(writer, &self.features)?;
        codec::write_f64s(writer, &self.self_votes)
    }

    pub(crate) fn read_binary<R: Read>(reader: &mut R) -> Result<TrainingCache> {
        let cache = TrainingCache {
            num_features: codec::read_usize(reader)?,
            max_vote_params: codec::read_usize(reader)?,
            classes: codec::read_usizes(reader)?,
            features: codec::read_f64s(reader)?,
            self_votes: codec::read_f64s(reader)?,
        };
        cache.validate()?;
        Ok(cache)
    }

    /// Checks that the tables agree with each other.
    pub(crate) fn validate(&self) -> Result<()> {
        let n = self.classes.len();
        if self.features.len() != n * self.num_features ||
           self.self_votes.len() != n * self.max_vote_params {
            bail!(ErrorKind::CorruptStream("cached tables have inconsistent sizes".to_string()));
        }
        Ok(())
    }
}
