mod error;
mod estimator;
pub mod expression;

pub use error::FeeError;
pub use estimator::*;
