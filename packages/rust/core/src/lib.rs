//! Cleaning and validation of residential energy certificate data.
//!
//! Each batch flows through the column deriver, the column drop step, the
//! value normalizer and (optionally) the row classifier, and comes out split
//! into kept and excluded records. [`pipeline::clean_file`] drives that over a
//! whole CSV file.

pub mod classify;
pub mod derive;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod summary;
pub mod tables;

pub use classify::{Assessment, Check, ClassifyContext};
pub use pipeline::{
    CleanConfig, CleanResult, ProcessOutput, ProgressReporter, SilentProgress, clean_file,
    process_batch, process_table,
};
pub use record::Batch;
pub use summary::RunSummary;
pub use tables::ReferenceTables;
