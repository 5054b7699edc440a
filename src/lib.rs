//! classpatch
//!
//! Parse, analyze and safely rewrite JVM-style stack-machine bytecode
//! embedded in class containers.
//!
//! ## Architecture
//!
//! The crate is layered leaves-first:
//!
//! - **opcode**: validated instruction catalog underlying everything else
//! - **scanner**: linear instruction walks using catalog widths
//! - **flow**: branch-following path traces with cycle suppression
//! - **switches**: the two multi-way-branch encodings the generic scanner
//!   cannot size
//! - **patch**: in-place offset shifts and the constant-index remap
//!   broadcast
//! - **pool** / **class_nodes**: the shared constant table, typed index
//!   handles, and the structural tree the broadcast traverses

pub mod class_nodes;
pub mod error;
pub mod flow;
pub mod io;
pub mod opcode;
pub mod patch;
pub mod pool;
pub mod scanner;
pub mod switches;

pub use error::{Error, Result};
