//! Multi-class Hough forests.
//! For literature see
//! * https://pages.iai.uni-bonn.de/gall_juergen/download/jgall_houghforest_cvpr09.pdf

pub mod cache;
pub mod tree;
pub mod vote;
pub mod forest;
