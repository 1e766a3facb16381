pub mod advisor;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod signals;

pub mod test_support;

pub use advisor::{Advisor, HttpAdvisor};
pub use error::{AdvisoryError, SignalFetchError};
pub use parser::{extract_json, parse_advice};
pub use prompts::build_prompt;
pub use signals::{HttpSignalFetcher, SignalSource};
