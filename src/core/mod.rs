pub mod caster;
pub mod etl;
pub mod flatten;
pub mod format;
pub mod pipeline;
pub mod sanitize;
pub mod transform;

pub use crate::domain::model::{RawTable, Record, Scalar, TypedTable};
pub use crate::domain::ports::{Pipeline, RecordSource, TableSink};
pub use crate::utils::error::Result;
