//! Options controlling the training of a Hough forest.
//!
//! An `Options` value is frozen: it is produced by an [`OptionsBuilder`]
//! which validates every value when it is set. Options left unset are
//! chosen automatically from the training data by [`Options::resolve`].

use codec;
use errors::*;
use rand::{self, Rng};
use serde_json;
use statistics::dominant_fraction_to_uncertainty;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const OPTIONS_MAGIC: &[u8; 4] = b"HFOP";
const RESOLVED_MAGIC: &[u8; 4] = b"HFRO";
const OPTIONS_VERSION: u32 = 1;

/// Default largest fraction of a node covered by one class
/// under which the node is still split to reduce class uncertainty.
pub const DEFAULT_MAX_DOMINANT_FRACTION: f64 = 0.998;
pub const DEFAULT_NUM_FEATURE_EXPANSIONS: usize = 3;
pub const DEFAULT_MAX_CANDIDATE_THRESHOLDS: usize = 32;
pub const DEFAULT_REGRESSION_STEEPNESS: f64 = 5.0;
const MAX_AUTO_DEPTH: usize = 64;

/// The stopping threshold for class uncertainty. The two parameterizations
/// describe the same threshold; the one set last wins.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum ClassPurity {
    Auto,
    /// Minimum entropy (in bits) of the class distribution of a node
    /// required to split it by class uncertainty.
    MinClassUncertainty(f64),
    /// Maximum fraction of a node covered by its dominant class under which
    /// the node may be split by class uncertainty.
    MaxDominantFraction(f64),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Options {
    max_depth: Option<usize>,
    max_leaf_elements: Option<usize>,
    max_candidate_features: Option<usize>,
    num_feature_expansions: Option<usize>,
    max_candidate_thresholds: Option<usize>,
    class_purity: ClassPurity,
    regression_steepness: Option<f64>,
    probabilistic_sampling: bool,
    seed: Option<u64>,
    verbose: u32,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            max_depth: None,
            max_leaf_elements: None,
            max_candidate_features: None,
            num_feature_expansions: None,
            max_candidate_thresholds: None,
            class_purity: ClassPurity::Auto,
            regression_steepness: None,
            probabilistic_sampling: false,
            seed: None,
            verbose: 1,
        }
    }
}

/// Size and dimensionality of a training set, used to resolve
/// automatic options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataShape {
    pub num_examples: usize,
    pub num_features: usize,
    pub num_classes: usize,
}

/// Options with every automatic value replaced by a concrete one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub max_depth: usize,
    pub max_leaf_elements: usize,
    pub max_candidate_features: usize,
    pub num_feature_expansions: usize,
    pub max_candidate_thresholds: usize,
    /// Entropy (in bits) below which a node counts as class-pure
    pub min_class_uncertainty: f64,
    pub regression_steepness: f64,
    pub probabilistic_sampling: bool,
    pub seed: u64,
    pub verbose: u32,
}

impl Options {
    /// Returns a builder starting from the default options.
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder { options: Options::default() }
    }

    /// Returns a builder starting from these options.
    pub fn to_builder(&self) -> OptionsBuilder {
        OptionsBuilder { options: self.clone() }
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
    pub fn max_leaf_elements(&self) -> Option<usize> {
        self.max_leaf_elements
    }
    pub fn max_candidate_features(&self) -> Option<usize> {
        self.max_candidate_features
    }
    pub fn num_feature_expansions(&self) -> Option<usize> {
        self.num_feature_expansions
    }
    pub fn max_candidate_thresholds(&self) -> Option<usize> {
        self.max_candidate_thresholds
    }
    pub fn class_purity(&self) -> ClassPurity {
        self.class_purity
    }
    pub fn regression_steepness(&self) -> Option<f64> {
        self.regression_steepness
    }
    pub fn probabilistic_sampling(&self) -> bool {
        self.probabilistic_sampling
    }
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
    pub fn verbose(&self) -> u32 {
        self.verbose
    }

    pub(crate) fn set_verbose(&mut self, level: u32) {
        self.verbose = level;
    }

    /// Chooses a value for every option that was not set explicitly.
    /// This is a pure function of the options and the data shape,
    /// except for an unset seed which is drawn from the thread RNG.
    ///
    /// # Defaults (N examples, F features)
    /// * `max_depth` - `2·ceil(log2(N+1))`, at least 1 and at most 64
    /// * `max_leaf_elements` - `ceil(log2(N+1)) - 1`, at least 1
    /// * `max_candidate_features` - F
    /// * `num_feature_expansions` - 3
    /// * `max_candidate_thresholds` - 32
    /// * class purity - a dominant fraction of 0.998
    /// * `regression_steepness` - 5.0
    pub fn resolve(&self, shape: DataShape) -> ResolvedOptions {
        let log_n = ((shape.num_examples + 1) as f64).log2().ceil() as usize;
        let min_class_uncertainty = match self.class_purity {
            ClassPurity::Auto => {
                dominant_fraction_to_uncertainty(DEFAULT_MAX_DOMINANT_FRACTION, shape.num_classes)
            }
            ClassPurity::MinClassUncertainty(u) => u,
            ClassPurity::MaxDominantFraction(f) => {
                dominant_fraction_to_uncertainty(f, shape.num_classes)
            }
        };
        ResolvedOptions {
            max_depth: self.max_depth.unwrap_or_else(|| (2 * log_n).max(1).min(MAX_AUTO_DEPTH)),
            max_leaf_elements: self.max_leaf_elements
                .unwrap_or_else(|| log_n.saturating_sub(1).max(1)),
            max_candidate_features: self.max_candidate_features
                .unwrap_or(shape.num_features)
                .max(1),
            num_feature_expansions: self.num_feature_expansions
                .unwrap_or(DEFAULT_NUM_FEATURE_EXPANSIONS),
            max_candidate_thresholds: self.max_candidate_thresholds
                .unwrap_or(DEFAULT_MAX_CANDIDATE_THRESHOLDS),
            min_class_uncertainty: min_class_uncertainty,
            regression_steepness: self.regression_steepness
                .unwrap_or(DEFAULT_REGRESSION_STEEPNESS),
            probabilistic_sampling: self.probabilistic_sampling,
            seed: self.seed.unwrap_or_else(|| rand::thread_rng().gen()),
            verbose: self.verbose,
        }
    }

    /// Load options from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Options> {
        let file = File::open(path.as_ref())
            .chain_err(|| format!("Cannot open options file {}", path.as_ref().display()))?;
        let options: Options = serde_json::from_reader(BufReader::new(file))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .chain_err(|| format!("Cannot create options file {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Save options to a binary stream.
    pub fn write_binary<W: Write>(&self, writer: &mut W) -> Result<()> {
        codec::write_magic(writer, OPTIONS_MAGIC, OPTIONS_VERSION)?;
        codec::write_opt_usize(writer, self.max_depth)?;
        codec::write_opt_usize(writer, self.max_leaf_elements)?;
        codec::write_opt_usize(writer, self.max_candidate_features)?;
        codec::write_opt_usize(writer, self.num_feature_expansions)?;
        codec::write_opt_usize(writer, self.max_candidate_thresholds)?;
        match self.class_purity {
            ClassPurity::Auto => {
                codec::write_u32(writer, 0)?;
                codec::write_f64(writer, 0.0)?;
            }
            ClassPurity::MinClassUncertainty(u) => {
                codec::write_u32(writer, 1)?;
                codec::write_f64(writer, u)?;
            }
            ClassPurity::MaxDominantFraction(f) => {
                codec::write_u32(writer, 2)?;
                codec::write_f64(writer, f)?;
            }
        }
        codec::write_opt_f64(writer, self.regression_steepness)?;
        codec::write_bool(writer, self.probabilistic_sampling)?;
        codec::write_opt_u64(writer, self.seed)?;
        codec::write_u32(writer, self.verbose)
    }

    /// Load options from a binary stream.
    pub fn read_binary<R: Read>(reader: &mut R) -> Result<Options> {
        let version = codec::read_magic(reader, OPTIONS_MAGIC)?;
        if version != OPTIONS_VERSION {
            bail!(ErrorKind::CorruptStream(format!("unsupported options version {}", version)));
        }
        let max_depth = codec::read_opt_usize(reader)?;
        let max_leaf_elements = codec::read_opt_usize(reader)?;
        let max_candidate_features = codec::read_opt_usize(reader)?;
        let num_feature_expansions = codec::read_opt_usize(reader)?;
        let max_candidate_thresholds = codec::read_opt_usize(reader)?;
        let tag = codec::read_u32(reader)?;
        let value = codec::read_f64(reader)?;
        let class_purity = match tag {
            0 => ClassPurity::Auto,
            1 => ClassPurity::MinClassUncertainty(value),
            2 => ClassPurity::MaxDominantFraction(value),
            x => bail!(ErrorKind::CorruptStream(format!("invalid class purity tag {}", x))),
        };
        let options = Options {
            max_depth: max_depth,
            max_leaf_elements: max_leaf_elements,
            max_candidate_features: max_candidate_features,
            num_feature_expansions: num_feature_expansions,
            max_candidate_thresholds: max_candidate_thresholds,
            class_purity: class_purity,
            regression_steepness: codec::read_opt_f64(reader)?,
            probabilistic_sampling: codec::read_bool(reader)?,
            seed: codec::read_opt_u64(reader)?,
            verbose: codec::read_u32(reader)?,
        };
        options.validate()
            .chain_err(|| ErrorKind::CorruptStream("stored options are invalid".to_string()))?;
        Ok(options)
    }

    /// Checks the invariants the builder enforces. Needed for options
    /// that were not created by a builder (e.g. deserialized ones).
    pub(crate) fn validate(&self) -> Result<()> {
        let mut builder = Options::builder();
        if let Some(x) = self.max_candidate_features {
            builder = builder.max_candidate_features(x)?;
        }
        if let Some(x) = self.max_candidate_thresholds {
            builder = builder.max_candidate_thresholds(x)?;
        }
        if let Some(x) = self.regression_steepness {
            builder = builder.regression_steepness(x)?;
        }
        match self.class_purity {
            ClassPurity::Auto => (),
            ClassPurity::MinClassUncertainty(u) => {
                builder.min_class_uncertainty(u)?;
            }
            ClassPurity::MaxDominantFraction(f) => {
                builder.max_dominant_fraction(f)?;
            }
        }
        Ok(())
    }
}

impl ResolvedOptions {
    pub(crate) fn write_binary<W: Write>(&self, writer: &mut W) -> Result<()> {
        codec::write_magic(writer, RESOLVED_MAGIC, OPTIONS_VERSION)?;
        codec::write_usize(writer, self.max_depth)?;
        codec::write_usize(writer, self.max_leaf_elements)?;
        codec::write_usize(writer, self.max_candidate_features)?;
        codec::write_usize(writer, self.num_feature_expansions)?;
        codec::write_usize(writer, self.max_candidate_thresholds)?;
        codec::write_f64(writer, self.min_class_uncertainty)?;
        codec::write_f64(writer, self.regression_steepness)?;
        codec::write_bool(writer, self.probabilistic_sampling)?;
        codec::write_u64(writer, self.seed)?;
        codec::write_u32(writer, self.verbose)
    }

    pub(crate) fn read_binary<R: Read>(reader: &mut R) -> Result<ResolvedOptions> {
        let version = codec::read_magic(reader, RESOLVED_MAGIC)?;
        if version != OPTIONS_VERSION {
            bail!(ErrorKind::CorruptStream(format!("unsupported options version {}", version)));
        }
        Ok(ResolvedOptions {
            max_depth: codec::read_usize(reader)?,
            max_leaf_elements: codec::read_usize(reader)?,
            max_candidate_features: codec::read_usize(reader)?,
            num_feature_expansions: codec::read_usize(reader)?,
            max_candidate_thresholds: codec::read_usize(reader)?,
            min_class_uncertainty: codec::read_f64(reader)?,
            regression_steepness: codec::read_f64(reader)?,
            probabilistic_sampling: codec::read_bool(reader)?,
            seed: codec::read_u64(reader)?,
            verbose: codec::read_u32(reader)?,
        })
    }
}

/// Builds a frozen [`Options`] value.
/// Setters for values with a restricted range return an error
/// instead of clamping.
///
/// ```
/// use houghvote::Options;
/// let options = Options::builder()
///     .max_depth(12)
///     .max_dominant_fraction(0.95).unwrap()
///     .probabilistic_sampling(true)
///     .build();
/// assert_eq!(options.max_depth(), Some(12));
/// ```
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Maximum depth of a tree.
    pub fn max_depth(mut self, value: usize) -> Self {
        self.options.max_depth = Some(value);
        self
    }

    /// Maximum number of elements in a leaf, unless the maximum depth is reached.
    pub fn max_leaf_elements(mut self, value: usize) -> Self {
        self.options.max_leaf_elements = Some(value);
        self
    }

    /// Maximum number of features considered for splitting per round.
    pub fn max_candidate_features(mut self, value: usize) -> Result<Self> {
        if value == 0 {
            bail!(ErrorKind::InvalidOption("max_candidate_features", value.to_string()));
        }
        self.options.max_candidate_features = Some(value);
        Ok(self)
    }

    /// How many times the candidate feature set may be expanded
    /// when no split improves the node.
    pub fn num_feature_expansions(mut self, value: usize) -> Self {
        self.options.num_feature_expansions = Some(value);
        self
    }

    /// Maximum number of random thresholds tried per candidate feature.
    pub fn max_candidate_thresholds(mut self, value: usize) -> Result<Self> {
        if value == 0 {
            bail!(ErrorKind::InvalidOption("max_candidate_thresholds", value.to_string()));
        }
        self.options.max_candidate_thresholds = Some(value);
        Ok(self)
    }

    /// Minimum class entropy (bits) a node needs to be split by class uncertainty.
    /// Replaces any previously set dominant fraction.
    pub fn min_class_uncertainty(mut self, value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            bail!(ErrorKind::InvalidOption("min_class_uncertainty", value.to_string()));
        }
        self.options.class_purity = ClassPurity::MinClassUncertainty(value);
        Ok(self)
    }

    /// Maximum fraction of a node covered by one class under which the node
    /// is split by class uncertainty. Must be in (0, 1].
    /// Replaces any previously set class uncertainty.
    pub fn max_dominant_fraction(mut self, value: f64) -> Result<Self> {
        if !(value > 0.0 && value <= 1.0) {
            bail!(ErrorKind::InvalidOption("max_dominant_fraction", value.to_string()));
        }
        self.options.class_purity = ClassPurity::MaxDominantFraction(value);
        Ok(self)
    }

    /// Steepness of the depth weighting of the vote regression term
    /// of mixed nodes.
    pub fn regression_steepness(mut self, value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            bail!(ErrorKind::InvalidOption("regression_steepness", value.to_string()));
        }
        self.options.regression_steepness = Some(value);
        Ok(self)
    }

    /// Train every tree on a bootstrap resample and draw votes randomly
    /// with replacement.
    pub fn probabilistic_sampling(mut self, value: bool) -> Self {
        self.options.probabilistic_sampling = value;
        self
    }

    /// Seed for all random decisions made during training.
    pub fn seed(mut self, value: u64) -> Self {
        self.options.seed = Some(value);
        self
    }

    /// How much progress information is logged (0 = none).
    pub fn verbose(mut self, value: u32) -> Self {
        self.options.verbose = value;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Cursor;

    fn shape(n: usize) -> DataShape {
        DataShape {
            num_examples: n,
            num_features: 7,
            num_classes: 3,
        }
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Options::builder().min_class_uncertainty(-0.1).is_err());
        assert!(Options::builder().min_class_uncertainty(::std::f64::NAN).is_err());
        assert!(Options::builder().max_dominant_fraction(0.0).is_err());
        assert!(Options::builder().max_dominant_fraction(1.5).is_err());
        assert!(Options::builder().max_candidate_features(0).is_err());
        assert!(Options::builder().max_candidate_thresholds(0).is_err());
        assert!(Options::builder().regression_steepness(0.0).is_err());
        match *Options::builder().max_dominant_fraction(2.0).unwrap_err().kind() {
            ErrorKind::InvalidOption(name, _) => assert_eq!(name, "max_dominant_fraction"),
            ref x => panic!("Unexpected error {}", x),
        }
    }

    #[test]
    fn test_purity_last_set_wins() {
        let o = Options::builder()
            .min_class_uncertainty(0.3)
            .unwrap()
            .max_dominant_fraction(0.9)
            .unwrap()
            .build();
        assert_eq!(o.class_purity(), ClassPurity::MaxDominantFraction(0.9));
        let o = o.to_builder().min_class_uncertainty(0.25).unwrap().build();
        assert_eq!(o.class_purity(), ClassPurity::MinClassUncertainty(0.25));
        assert_eq!(o.resolve(shape(10)).min_class_uncertainty, 0.25);
    }

    #[test]
    fn test_both_purity_views_agree() {
        let by_fraction = Options::builder().max_dominant_fraction(0.5).unwrap().build();
        let two_classes = DataShape { num_classes: 2, ..shape(10) };
        let resolved = by_fraction.resolve(two_classes);
        assert!((resolved.min_class_uncertainty - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_resolve_defaults() {
        let r = Options::default().resolve(shape(1000));
        // ceil(log2(1001)) = 10
        assert_eq!(r.max_depth, 20);
        assert_eq!(r.max_leaf_elements, 9);
        assert_eq!(r.max_candidate_features, 7);
        assert_eq!(r.num_feature_expansions, DEFAULT_NUM_FEATURE_EXPANSIONS);
        assert_eq!(r.max_candidate_thresholds, DEFAULT_MAX_CANDIDATE_THRESHOLDS);
        assert_eq!(r.regression_steepness, DEFAULT_REGRESSION_STEEPNESS);
        assert!(r.min_class_uncertainty > 0.0 && r.min_class_uncertainty < 0.1);

        let r = Options::default().resolve(shape(0));
        assert_eq!(r.max_depth, 1);
        assert_eq!(r.max_leaf_elements, 1);
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let o = Options::builder()
            .max_depth(3)
            .max_leaf_elements(5)
            .max_candidate_features(2)
            .unwrap()
            .num_feature_expansions(0)
            .seed(99)
            .verbose(0)
            .build();
        let r = o.resolve(shape(1000));
        assert_eq!(r.max_depth, 3);
        assert_eq!(r.max_leaf_elements, 5);
        assert_eq!(r.max_candidate_features, 2);
        assert_eq!(r.num_feature_expansions, 0);
        assert_eq!(r.seed, 99);
        assert_eq!(r.verbose, 0);
        // Resolution is pure for seeded options
        assert_eq!(r, o.resolve(shape(1000)));
    }

    #[test]
    fn test_binary_round_trip() {
        let o = Options::builder()
            .max_depth(9)
            .max_candidate_thresholds(4)
            .unwrap()
            .max_dominant_fraction(0.875)
            .unwrap()
            .regression_steepness(2.5)
            .unwrap()
            .probabilistic_sampling(true)
            .seed(0xdead_beef)
            .build();
        let mut buf = vec![];
        o.write_binary(&mut buf).unwrap();
        let loaded = Options::read_binary(&mut Cursor::new(buf)).unwrap();
        assert_eq!(o, loaded);

        let r = o.resolve(shape(50));
        let mut buf = vec![];
        r.write_binary(&mut buf).unwrap();
        assert_eq!(r, ResolvedOptions::read_binary(&mut Cursor::new(buf)).unwrap());
    }

    #[test]
    fn test_json_file_round_trip() {
        let o = Options::builder()
            .min_class_uncertainty(0.123456789)
            .unwrap()
            .max_leaf_elements(3)
            .seed(7)
            .build();
        let path = env::temp_dir().join(format!("houghvote_options_{}.json", ::std::process::id()));
        o.save(&path).unwrap();
        let loaded = Options::load(&path).unwrap();
        assert_eq!(o, loaded);
        let _ = ::std::fs::remove_file(&path);
    }

    #[test]
    fn test_failed_load_reports_error() {
        let path = env::temp_dir().join("houghvote_options_does_not_exist.json");
        assert!(Options::load(&path).is_err());
        let truncated = vec![b'H', b'F'];
        assert!(Options::read_binary(&mut Cursor::new(truncated)).is_err());
    }
}
