/// Train a hough forest on synthetic blobs and let it vote for their centers

extern crate houghvote;
extern crate clap;
#[macro_use]
extern crate log;
extern crate env_logger;
extern crate rand;
extern crate rand_chacha;
#[macro_use]
extern crate error_chain;

use houghvote::{ExampleSet, Forest, Options, Truth, VoteCollector};
use clap::{Arg, App};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::str::FromStr;

error_chain!{
    links {
        Forest(houghvote::Error, houghvote::ErrorKind);
    }
    foreign_links {
        IO(std::io::Error);
        ParseInt(std::num::ParseIntError);
        ParseFloat(std::num::ParseFloatError);
    }
}

pub fn main(){
    use std::process::exit;
    if let Err(e) = main_(){
        eprintln!("Error: {}", e);
        for e in e.iter().skip(1) {
            eprintln!("caused by: {}", e);
        }
        exit(-1);
    }
}

macro_rules! TREE_COUNT_DEFAULT { () => (10usize) }
macro_rules! EXAMPLES_DEFAULT { () => (2000usize) }
macro_rules! VOTES_DEFAULT { () => (100usize) }

/// Centers of the objects of class 1 and 2
const CENTERS: [[f64; 2]; 2] = [[0.25, 0.75], [0.7, 0.3]];

/// Points in the unit square. Points near one of the centers belong to
/// the object there and vote with their offset to the center.
/// The features are the coordinates of the point plus a noise feature.
fn synthetic_examples(count: usize, rng: &mut ChaCha8Rng) -> Result<ExampleSet> {
    let mut set = ExampleSet::new(3, 3, &[0, 2, 2])?;
    for _ in 0..count {
        let (x, y) = (rng.gen::<f64>(), rng.gen::<f64>());
        let noise = rng.gen::<f64>();
        let mut truth = Truth::Background;
        for (c, center) in CENTERS.iter().enumerate() {
            let (dx, dy) = (center[0] - x, center[1] - y);
            if dx * dx + dy * dy < 0.04 {
                truth = Truth::Object {
                    class: c + 1,
                    vote: vec![dx, dy],
                };
            }
        }
        set.push(&[x, y, noise], truth)?;
    }
    Ok(set)
}

pub fn main_() -> Result<()> {
    env_logger::init();
    let args = App::new("Houghforest learner")
        .arg(Arg::with_name("out_filename")
            .short("o")
            .long("out")
            .takes_value(true)
            .required(true)
            .help("Filename for trained forest"))
        .arg(Arg::with_name("examples")
            .short("n")
            .long("examples")
            .takes_value(true)
            .help(concat!("Number of synthetic training examples - Default ", EXAMPLES_DEFAULT!())))
        .arg(Arg::with_name("trees")
            .long("trees")
            .takes_value(true)
            .help(concat!("Number of trees for the forest - Default ", TREE_COUNT_DEFAULT!())))
        .arg(Arg::with_name("maxdepth")
            .long("maxdepth")
            .takes_value(true)
            .help("Max depth a tree may be grown - Default chosen from the data"))
        .arg(Arg::with_name("steepness")
            .long("steepness")
            .takes_value(true)
            .help("Steepness of the weighting function - Default 5.0"))
        .arg(Arg::with_name("votes")
            .long("votes")
            .takes_value(true)
            .help(concat!("Number of votes per query - Default ", VOTES_DEFAULT!())))
        .arg(Arg::with_name("seed")
            .long("seed")
            .takes_value(true)
            .help("Seed of the random generators"))
        .arg(Arg::with_name("parallel")
            .long("parallel")
            .help("Train the trees in parallel"))
        .arg(Arg::with_name("bootstrap")
            .long("bootstrap")
            .help("Train every tree on a bootstrap sample and vote by random sampling"))
        .get_matches();

    let filename = args.value_of("out_filename").ok_or("No valid output filename")?;
    let example_count = match args.value_of("examples") {
        Some(x) => usize::from_str(x)?,
        None => EXAMPLES_DEFAULT!(),
    };
    let tree_count = match args.value_of("trees") {
        Some(x) => usize::from_str(x)?,
        None => TREE_COUNT_DEFAULT!(),
    };
    let vote_count = match args.value_of("votes") {
        Some(x) => usize::from_str(x)?,
        None => VOTES_DEFAULT!(),
    };
    let seed = match args.value_of("seed") {
        Some(x) => u64::from_str(x)?,
        None => rand::thread_rng().gen(),
    };

    let mut builder = Options::builder()
        .seed(seed)
        .probabilistic_sampling(args.is_present("bootstrap"));
    if let Some(x) = args.value_of("maxdepth") {
        builder = builder.max_depth(usize::from_str(x)?);
    }
    if let Some(x) = args.value_of("steepness") {
        builder = builder.regression_steepness(f64::from_str(x)?)?;
    }
    let options = builder.build();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    info!("Generating {} examples", example_count);
    let examples = synthetic_examples(example_count, &mut rng)?;

    info!("Starting Learning");
    let mut forest = Forest::new(3, 3, &[0, 2, 2], options)?;
    if args.is_present("parallel") {
        forest.train_parallel(tree_count, &examples)?;
    } else {
        forest.train(tree_count, &examples)?;
    }
    info!("Learned sucessfull");
    forest.dump();

    let learn_param_filename = format!("{}_param.json", filename);
    forest.options().save(&learn_param_filename)?;
    forest.save(filename)?;

    let forest = Forest::from_file(filename)?;
    for (c, center) in CENTERS.iter().enumerate() {
        let class = c + 1;
        let mut collector = VoteCollector::new();
        // Query points around the center
        for &(dx, dy) in &[(0.05, 0.0), (-0.05, 0.0), (0.0, 0.05), (0.0, -0.05)] {
            let features = [center[0] + dx, center[1] + dy, rng.gen::<f64>()];
            let cast = forest.vote_self(class, &features, vote_count, &mut collector, &mut rng)?;
            debug!("{} of {} votes cast for class {}", cast, vote_count, class);
        }
        match collector.weighted_mean() {
            Some(mean) => {
                info!("Class {}: mean offset {:?} from {} votes (weight {:.3})",
                      class,
                      mean,
                      collector.votes.len(),
                      collector.total_weight())
            }
            None => warn!("Class {}: no votes", class),
        }
    }
    Ok(())
}
