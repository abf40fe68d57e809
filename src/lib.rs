/*!
Compiler and utilities for the Noir notation language and the Noir Music
File (NMF) format.

The library has two halves. The [`file`] module holds the NMF codec: an
in-memory data object that parses, validates, sorts and serializes the
binary format. The [`noir`] module compiles Noir notation text into that
object through a tokenizer, an entity parser, a stack-based virtual
machine and an event buffer. Around them sit the post-processing cores
used by the command line utilities: [`tempo`] rewrites the timeline of a
file through a piecewise-quadratic tempo map, [`rate`] is the constant
tempo special case, and [`graph`] extracts per-layer dynamics curves.

```no_run
use nmf_file::NmfFile;

let file = NmfFile::load("composition.nmf").unwrap();
for note in file.notes() {
    println!("pitch {} at {}", note.pitch, note.t);
}
```
!*/

#[macro_use]
mod error;

mod byte_iter;
mod scribe;

pub mod core;
pub mod file;
pub mod graph;
pub mod noir;
pub mod rate;
pub mod tempo;

pub use crate::core::{NmfNote, PitchSet, QuantumBasis};
pub use crate::file::NmfFile;
pub use crate::noir::compile;
pub use error::{Error, Result};
