//! The Hough forest: an ensemble of randomized trees over a cached copy of
//! the training data, casting votes in class-specific Hough spaces.
//!
//! For literature see
//! * J. Gall and V. Lempitsky, "Class-Specific Hough Forests for Object Detection", CVPR 2009.
//!
//! The background class always has index 0. Background examples take part
//! in classification but never in vote regression and never vote.

use errors::*;
use hough::cache::TrainingCache;
use hough::tree::Tree;
use hough::vote::{Vote, VoteCallback};
use options::{DataShape, Options, ResolvedOptions};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde_json;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use training::TrainingData;

const FOREST_MAGIC: &[u8; 4] = b"HGHF";
const FOREST_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Forest {
    num_classes: usize,
    num_features: usize,
    num_vote_params: Vec<usize>,
    options: Options,
    /// Options used for the current trees, `None` before training
    resolved: Option<ResolvedOptions>,
    trees: Vec<Tree>,
    cache: TrainingCache,
}

impl Forest {
    /// Creates an untrained forest.
    ///
    /// # Arguments
    /// * `num_classes` - number of classes, numbered 0 (background) to `num_classes - 1`
    /// * `num_features` - number of features per example
    /// * `num_vote_params` - dimension of the Hough space of every class
    /// * `options` - options controlling the training
    pub fn new(num_classes: usize,
               num_features: usize,
               num_vote_params: &[usize],
               options: Options)
               -> Result<Forest> {
        if num_classes == 0 {
            bail!(ErrorKind::InvalidTrainingData("a forest needs at least one class".to_string()));
        }
        if num_vote_params.len() != num_classes {
            bail!(ErrorKind::DimensionMismatch("vote parameter table",
                                               num_classes,
                                               num_vote_params.len()));
        }
        Ok(Forest {
            num_classes: num_classes,
            num_features: num_features,
            num_vote_params: num_vote_params.to_vec(),
            options: options,
            resolved: None,
            trees: vec![],
            cache: TrainingCache::default(),
        })
    }

    /// Loads a forest saved with [`Forest::save`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Forest> {
        let file = File::open(path.as_ref())
            .chain_err(|| format!("Cannot open forest file {}", path.as_ref().display()))?;
        Forest::read(&mut BufReader::new(file))
    }

    /// Removes all trees and the cached training data.
    pub fn clear(&mut self) {
        self.trees.clear();
        self.cache = TrainingCache::default();
        self.resolved = None;
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Dimension of the Hough space of `class`.
    pub fn num_vote_parameters(&self, class: usize) -> usize {
        self.num_vote_params[class]
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Number of training examples held in the cache.
    pub fn num_cached_examples(&self) -> usize {
        self.cache.num_examples()
    }

    /// The options as given when the forest was created.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The options the current trees were trained with.
    pub fn resolved_options(&self) -> Option<&ResolvedOptions> {
        self.resolved.as_ref()
    }

    /// Changes how much is logged, overriding the initial options.
    pub fn set_verbose(&mut self, level: u32) {
        self.options.set_verbose(level);
        if let Some(ref mut r) = self.resolved {
            r.verbose = level;
        }
    }

    fn verbose(&self) -> u32 {
        self.options.verbose()
    }

    /// Trains `num_trees` trees on `data`, one after another.
    pub fn train<T>(&mut self, num_trees: usize, data: &T) -> Result<()>
        where T: TrainingData + ?Sized
    {
        let (cache, resolved, seeds) = self.prepare_training(num_trees, data)?;
        let trees = seeds.into_iter()
            .enumerate()
            .map(|(t, seed)| Forest::build_tree(t, &cache, self.num_classes, &resolved, seed))
            .collect();
        self.finish_training(cache, resolved, trees);
        Ok(())
    }

    /// Trains `num_trees` trees on `data` using the rayon thread pool.
    /// Gives the same trees as [`Forest::train`] for the same seed.
    pub fn train_parallel<T>(&mut self, num_trees: usize, data: &T) -> Result<()>
        where T: TrainingData + ?Sized
    {
        let (cache, resolved, seeds) = self.prepare_training(num_trees, data)?;
        let trees = {
            let num_classes = self.num_classes;
            let cache = &cache;
            let resolved = &resolved;
            seeds.into_par_iter()
                .enumerate()
                .map(|(t, seed)| Forest::build_tree(t, cache, num_classes, resolved, seed))
                .collect()
        };
        self.finish_training(cache, resolved, trees);
        Ok(())
    }

    /// Caches the data, resolves the options and derives one seed per tree.
    fn prepare_training<T>(&self,
                           num_trees: usize,
                           data: &T)
                           -> Result<(TrainingCache, ResolvedOptions, Vec<u64>)>
        where T: TrainingData + ?Sized
    {
        let cache = self.cache_training_data(data)?;
        let resolved = self.auto_select_unspecified_options(&cache);
        if resolved.verbose >= 1 {
            info!("Training {} trees on {} examples ({} features, {} classes)",
                  num_trees,
                  cache.num_examples(),
                  self.num_features,
                  self.num_classes);
            debug!("Resolved options: {:?}", resolved);
        }
        let mut master = ChaCha8Rng::seed_from_u64(resolved.seed);
        let seeds = (0..num_trees).map(|_| master.gen()).collect();
        Ok((cache, resolved, seeds))
    }

    fn finish_training(&mut self, cache: TrainingCache, resolved: ResolvedOptions, trees: Vec<Tree>) {
        if resolved.verbose >= 1 {
            info!("Trained {} trees", trees.len());
        }
        self.cache = cache;
        self.resolved = Some(resolved);
        self.trees = trees;
    }

    /// Builds tree number `t`. With probabilistic sampling the tree is
    /// trained on a bootstrap resample of the cache, otherwise on all of it.
    fn build_tree(t: usize,
                  cache: &TrainingCache,
                  num_classes: usize,
                  options: &ResolvedOptions,
                  seed: u64)
                  -> Tree {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = cache.num_examples();
        let examples = if options.probabilistic_sampling && n > 0 {
            (0..n).map(|_| rng.gen_range(0..n)).collect()
        } else {
            (0..n).collect()
        };
        let tree = Tree::build(cache, num_classes, options, examples, &mut rng);
        if options.verbose >= 2 {
            debug!("Tree {}: depth {}, {} nodes, {} leaves",
                   t,
                   tree.depth(),
                   tree.num_nodes(),
                   tree.num_leaves());
        }
        tree
    }

    /// Creates a locally cached copy of the training data, used as lookup table for voting.
    fn cache_training_data<T>(&self, data: &T) -> Result<TrainingCache>
        where T: TrainingData + ?Sized
    {
        if data.num_classes() != self.num_classes {
            bail!(ErrorKind::DimensionMismatch("classes", self.num_classes, data.num_classes()));
        }
        if data.num_features() != self.num_features {
            bail!(ErrorKind::DimensionMismatch("features", self.num_features, data.num_features()));
        }
        for class in 1..self.num_classes {
            if data.num_vote_parameters(class) != self.num_vote_params[class] {
                bail!(ErrorKind::DimensionMismatch("vote parameters",
                                                   self.num_vote_params[class],
                                                   data.num_vote_parameters(class)));
            }
        }
        TrainingCache::from_training_data(data, &self.num_vote_params)
    }

    /// Chooses suitable values for the options left unspecified.
    fn auto_select_unspecified_options(&self, cache: &TrainingCache) -> ResolvedOptions {
        self.options.resolve(DataShape {
            num_examples: cache.num_examples(),
            num_features: self.num_features,
            num_classes: self.num_classes,
        })
    }

    fn check_query(&self, features: &[f64]) -> Result<()> {
        if features.len() != self.num_features {
            bail!(ErrorKind::DimensionMismatch("features", self.num_features, features.len()));
        }
        Ok(())
    }

    /// Samples Hough votes for class `query_class` from a point with the given features.
    ///
    /// The votes are split evenly over the trees; a tree whose leaf holds no
    /// example of `query_class` casts nothing for its share. The leaf
    /// probability of `query_class` does not change a tree's share, so all
    /// `num_votes` are cast whenever every reached leaf holds the class.
    /// Leaves where the class is rare still get a full share of the votes.
    ///
    /// # Arguments
    /// * `query_class` - the class to vote for, must not be the background class 0
    /// * `features` - features of the point (`num_features()` values)
    /// * `num_votes` - number of votes to cast
    /// * `callback` - called once for every vote
    /// * `rng` - source of the random choices of the sampling
    ///
    /// Returns the number of votes actually cast (at most `num_votes`).
    pub fn vote_self<C, R>(&self,
                           query_class: usize,
                           features: &[f64],
                           num_votes: usize,
                           callback: &mut C,
                           rng: &mut R)
                           -> Result<usize>
        where C: VoteCallback + ?Sized,
              R: Rng
    {
        if query_class == 0 || query_class >= self.num_classes {
            bail!(ErrorKind::InvalidQueryClass(query_class, self.num_classes));
        }
        self.check_query(features)?;
        let num_trees = self.trees.len();
        if num_trees == 0 || num_votes == 0 {
            return Ok(0);
        }

        let base_share = num_votes / num_trees;
        let extra = num_votes % num_trees;
        let probabilistic = self.resolved.as_ref().map_or(false, |r| r.probabilistic_sampling);
        let mut cast = 0;
        for (t, tree) in self.trees.iter().enumerate() {
            let share = base_share + if t < extra { 1 } else { 0 };
            if share == 0 {
                continue;
            }
            let candidates = tree.leaf_for(features).examples_of_class(query_class);
            if candidates.is_empty() {
                if self.verbose() >= 2 {
                    trace!("Tree {} has no example of class {} for this query", t, query_class);
                }
                continue;
            }
            let weight = 1.0 / ((num_trees * share) as f64);
            let n = candidates.len();
            if probabilistic {
                for _ in 0..share {
                    let example = candidates[rng.gen_range(0..n)];
                    self.single_self_vote_by_lookup(query_class, example, weight, callback);
                }
            } else {
                // Evenly strided walk over the candidates
                let start = rng.gen_range(0..n);
                for j in 0..share {
                    let example = candidates[(start + j * n / share) % n];
                    self.single_self_vote_by_lookup(query_class, example, weight, callback);
                }
            }
            cast += share;
        }
        Ok(cast)
    }

    /// Casts a single vote for the parent object of a point by looking up
    /// a training example in the cache.
    fn single_self_vote_by_lookup<C>(&self, class: usize, example: usize, weight: f64, callback: &mut C)
        where C: VoteCallback + ?Sized
    {
        let params = &self.cache.self_vote(example)[..self.num_vote_params[class]];
        let vote = Vote::new(class,
                             params,
                             weight,
                             Some(example),
                             Some(self.cache.features(example)));
        callback.vote(&vote);
    }

    /// Probability of every class for a point, averaged over the class
    /// distributions of the leaves it reaches. All zero for an untrained forest.
    pub fn class_probabilities(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.check_query(features)?;
        let mut probs = vec![0f64; self.num_classes];
        if self.trees.is_empty() {
            return Ok(probs);
        }
        for tree in &self.trees {
            let leaf = tree.leaf_for(features);
            for (class, p) in probs.iter_mut().enumerate() {
                *p += leaf.probability(class);
            }
        }
        let num_trees = self.trees.len() as f64;
        for p in &mut probs {
            *p /= num_trees;
        }
        Ok(probs)
    }

    /// Logs a summary of the forest.
    pub fn dump(&self) {
        info!("Hough forest: {} classes, {} features, vote parameters {:?}",
              self.num_classes,
              self.num_features,
              self.num_vote_params);
        info!("{} trees over {} cached examples", self.trees.len(), self.cache.num_examples());
        for (t, tree) in self.trees.iter().enumerate() {
            info!("  tree {}: depth {}, {} nodes, {} leaves",
                  t,
                  tree.depth(),
                  tree.num_nodes(),
                  tree.num_leaves());
        }
    }

    /// Save the forest to a file in the binary format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .chain_err(|| format!("Cannot create forest file {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Replaces this forest by one loaded from a file.
    /// On failure the forest is left unchanged.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        *self = Forest::from_file(path)?;
        Ok(())
    }

    /// Save the forest as JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .chain_err(|| format!("Cannot create forest file {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a forest saved with [`Forest::save_json`].
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Forest> {
        let file = File::open(path.as_ref())
            .chain_err(|| format!("Cannot open forest file {}", path.as_ref().display()))?;
        let forest: Forest = serde_json::from_reader(BufReader::new(file))?;
        forest.validate()?;
        Ok(forest)
    }

    /// Writes the forest to a binary stream.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        use codec::*;
        write_magic(writer, FOREST_MAGIC, FOREST_VERSION)?;
        write_usize(writer, self.num_classes)?;
        write_usize(writer, self.num_features)?;
        write_usizes(writer, &self.num_vote_params)?;
        self.options.write_binary(writer)?;
        write_bool(writer, self.resolved.is_some())?;
        if let Some(ref r) = self.resolved {
            r.write_binary(writer)?;
        }
        self.cache.write_binary(writer)?;
        write_usize(writer, self.trees.len())?;
        for tree in &self.trees {
            tree.write_binary(writer)?;
        }
        Ok(())
    }

    /// Reads a forest from a binary stream.
    pub fn read<R: Read>(reader: &mut R) -> Result<Forest> {
        use codec::*;
        let version = read_magic(reader, FOREST_MAGIC)?;
        if version != FOREST_VERSION {
            bail!(ErrorKind::CorruptStream(format!("unsupported forest version {}", version)));
        }
        let num_classes = read_usize(reader)?;
        let num_features = read_usize(reader)?;
        let num_vote_params = read_usizes(reader)?;
        let options = Options::read_binary(reader)?;
        let resolved = if read_bool(reader)? {
            Some(ResolvedOptions::read_binary(reader)?)
        } else {
            None
        };
        let cache = TrainingCache::read_binary(reader)?;
        let num_trees = read_usize(reader)?;
        let mut trees = vec![];
        for _ in 0..num_trees {
            trees.push(Tree::read_binary(reader)?);
        }
        let forest = Forest {
            num_classes: num_classes,
            num_features: num_features,
            num_vote_params: num_vote_params,
            options: options,
            resolved: resolved,
            trees: trees,
            cache: cache,
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Checks the consistency of a forest that was not built by training.
    fn validate(&self) -> Result<()> {
        if self.num_classes == 0 || self.num_vote_params.len() != self.num_classes {
            bail!(ErrorKind::CorruptStream("invalid class table".to_string()));
        }
        self.options.validate()?;
        self.cache.validate()?;
        let n = self.cache.num_examples();
        if n > 0 {
            if self.cache.num_features() != self.num_features {
                bail!(ErrorKind::CorruptStream("cache has the wrong number of features".to_string()));
            }
            let max_vote_params = self.num_vote_params.iter().skip(1).cloned().max().unwrap_or(0);
            if self.cache.max_vote_params() != max_vote_params ||
               self.cache.classes().iter().any(|&c| c >= self.num_classes) {
                bail!(ErrorKind::CorruptStream("cache does not match the class table".to_string()));
            }
        }
        for tree in &self.trees {
            tree.validate(n, self.num_features, self.num_classes)?;
        }
        Ok(())
    }
}
