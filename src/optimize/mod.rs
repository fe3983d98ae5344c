pub mod dose;

pub use dose::{DoseOptimizer, DoseRange, DoseSearch, InitialDose};
