/*!
The `file` module implements the NMF binary format: the in-memory data
object, its invariants, and the bit-exact wire codec.
!*/

pub(crate) mod biased;
mod data;

pub use data::{NmfFile, MAX_NOTES, MAX_SECTIONS};

pub(crate) use data::NmfError;
