pub mod result;
pub mod status;

pub use result::{Expectation, RunDetails, SpecResult, SuiteResult};
pub use status::SpecStatus;
