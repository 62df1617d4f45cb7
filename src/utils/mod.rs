pub mod error;

pub use error::ChartsError;
