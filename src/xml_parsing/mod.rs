//! Parsing of Petri nets from the PNML interchange format.

pub mod pnml;
pub mod utils;
