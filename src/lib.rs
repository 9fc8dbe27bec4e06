//! Wrapping the CFM-ID `cfm-predict` program: writing its input, running it,
//! parsing its output into [PredictionResult]s, and flattening those into a
//! spreadsheet.

pub mod error;
pub mod export;
pub mod input;
pub mod parse;
pub mod predict;

pub use error::{Error, Result};
pub use export::{export, export_to_buffer};
pub use input::{load_molecules, Molecule};
pub use parse::{parse, parse_str, Fragment, PredictionResult};
pub use predict::Predictor;
