pub mod aggregate;
pub mod column;
pub mod error;
pub mod frequency;
pub mod header;
pub mod receiver;
pub mod record;

pub use aggregate::*;
pub use column::*;
pub use error::*;
pub use frequency::*;
pub use header::*;
pub use receiver::*;
pub use record::*;
