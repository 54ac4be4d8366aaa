//! File I/O for certificate datasets.
//!
//! The cleaning core only sees [`Table`](berclean_shared::Table) values; this
//! crate turns CSV files into tables chunk by chunk, writes the kept and
//! excluded partitions back out, and produces the run manifest.

pub mod manifest;
pub mod paths;
pub mod reader;
pub mod writer;

pub use manifest::{hash_file, write_manifest};
pub use paths::{default_output_path, excluded_path_for, sibling_with_suffix, summary_path_for};
pub use reader::ChunkReader;
pub use writer::{SplitCounts, SplitWriter};
