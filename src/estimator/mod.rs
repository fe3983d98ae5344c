pub mod grid;

pub use grid::{HypothesisCell, HypothesisGrid, WeightUpdate};
