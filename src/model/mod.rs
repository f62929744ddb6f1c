//! Sparse averaged weights and their binary serialization
//!
//! A model blob is laid out as
//!
//! ```text
//! header    "lTRP" size "PRSR" version off_conf off_weights (offset, count) x 9
//! CONF      parser configuration and feature setup as JSON
//! CQDB x 9  one dictionary per vocabulary set, 4-byte aligned
//! WGHT      generation, finalized flag, then (feature, transition, value, total, stamp)
//! ```
//!
//! All integers and floats are little-endian; floats are stored by their bit
//! pattern so reloaded scores are bit-identical.

mod matrix;
mod reader;
mod sparse;
mod writer;

pub use self::matrix::{AveragedMatrix, HistoryValue};
pub use self::reader::{ModelData, ModelReader};
pub use self::sparse::SparseVector;
pub use self::writer::ModelWriter;

const MAGIC: &[u8; 4] = b"lTRP";
const MODEL_TYPE: &[u8; 4] = b"PRSR";
const VERSION: u32 = 1;
const NUM_SETS: usize = 9;
const HEADER_SIZE: usize = 24 + 8 * NUM_SETS;
