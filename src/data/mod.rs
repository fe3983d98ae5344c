pub mod error_model;
pub mod patient;
pub mod therapy;

pub use error_model::ErrorModel;
pub use patient::Patient;
pub use therapy::TherapySchedule;
