//! Training and querying of multi-class Hough forests.
//!
//! A Hough forest classifies points by their features and lets every point
//! cast weighted votes for the parameters of its parent object
//! (e.g. the center of an object). Class 0 is the background class.

extern crate rand;
extern crate rand_chacha;
#[macro_use]
extern crate serde_derive;
extern crate serde;
extern crate serde_json;
extern crate rayon;
extern crate byteorder;

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;

pub mod errors;
mod codec;
#[macro_use]
pub mod statistics;
pub mod options;
pub mod training;
pub mod hough;

pub use errors::{Error, ErrorKind, Result};
pub use hough::forest::Forest;
pub use hough::vote::{CollectedVote, Vote, VoteCallback, VoteCollector};
pub use options::{ClassPurity, Options, OptionsBuilder, ResolvedOptions};
pub use training::{ExampleSet, TrainingData, Truth};
