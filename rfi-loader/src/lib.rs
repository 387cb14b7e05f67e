pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod snapshot;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use pipeline::*;
pub use report::*;
pub use snapshot::*;
