pub mod resolver;
#[cfg(feature = "test-utils")]
pub mod test_utils;

use thiserror::Error;

pub use crate::core::QueryExecutor;
pub use resolver::HickoryQueryExecutor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("DNS query failed: {0}")]
    Resolution(String),

    #[error("Invalid query input: {0}")]
    InvalidInput(String),

    #[error("Unsupported query option: {0}")]
    Unsupported(&'static str),
}
