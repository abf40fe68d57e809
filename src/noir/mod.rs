/*!
The `noir` module compiles Noir notation text into an NMF event stream. It
is a pipeline of four stages exchanging control by synchronous calls: the
tokenizer reads and filters bytes, the entity parser groups tokens into
pitch sets, durations and operations, the virtual machine maintains the
composition state, and the event buffer collects the emitted events into an
[`NmfFile`](crate::NmfFile).
!*/

mod entity;
mod event;
mod token;
mod vm;

use crate::noir::token::Tokenizer;
use crate::noir::vm::Vm;
use std::io::{Read, Write};

/// Compile Noir notation text into a serialized NMF file.
///
/// The input is consumed to its end; the output receives the complete NMF
/// byte stream. On failure nothing useful has been written and the error
/// carries the one-based input line it was raised at.
pub fn compile<R: Read, W: Write>(input: R, output: &mut W) -> crate::Result<()> {
    let mut tokenizer = Tokenizer::new(input);
    let mut vm = Vm::new();
    entity::run(&mut tokenizer, &mut vm)?;
    vm.finish(output)
}

/// The closed enumeration of input-driven compilation errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NoirError {
    ReadFailed,
    NulChar,
    BadChar,
    LineOverflow,
    LongToken,
    ParamToken,
    KeyToken,
    RightOrphan,
    TooDeep,
    Unclosed,
    BadPitch,
    PitchRange,
    BadDur,
    GraceInGroup,
    LongDur,
    BadOp,
    NoPitch,
    NoDur,
    BadRepeat,
    Overflow,
    ManySections,
    ManyNotes,
    SectionOrder,
    NoteBeforeSection,
    BadNote,
    LocUnderflow,
    LocOverflow,
    TransUnderflow,
    TransOverflow,
    ArtUnderflow,
    ArtOverflow,
    LayerUnderflow,
    LayerOverflow,
    BadLayer,
    BadCue,
    DanglingImm,
    OpenLocation,
    OpenTrans,
    OpenArt,
    OpenLayer,
    NoNotes,
}

impl NoirError {
    /// The diagnostic message, capitalized, without trailing punctuation.
    pub fn message(&self) -> &'static str {
        match self {
            NoirError::ReadFailed => "I/O error reading input",
            NoirError::NulChar => "Nul character in input",
            NoirError::BadChar => "Invalid character in input",
            NoirError::LineOverflow => "Too many lines in input",
            NoirError::LongToken => "Token is too long",
            NoirError::ParamToken => "Unterminated parametric operation",
            NoirError::KeyToken => "Invalid key operation",
            NoirError::RightOrphan => "Closing bracket at top level",
            NoirError::TooDeep => "Groups nested too deeply",
            NoirError::Unclosed => "Group is not closed properly",
            NoirError::BadPitch => "Invalid pitch token",
            NoirError::PitchRange => "Pitch out of range",
            NoirError::BadDur => "Invalid rhythm token",
            NoirError::GraceInGroup => "Grace note inside rhythm group",
            NoirError::LongDur => "Rhythm group is too long",
            NoirError::BadOp => "Invalid operation token",
            NoirError::NoPitch => "No current pitch",
            NoirError::NoDur => "No current duration",
            NoirError::BadRepeat => "Invalid repeat count",
            NoirError::Overflow => "Integer overflow in computation",
            NoirError::ManySections => "Too many sections",
            NoirError::ManyNotes => "Too many notes",
            NoirError::SectionOrder => "Section offset moves backward",
            NoirError::NoteBeforeSection => "Note occurs before the start of its section",
            NoirError::BadNote => "Invalid note event",
            NoirError::LocUnderflow => "Location stack is empty",
            NoirError::LocOverflow => "Location stack is full",
            NoirError::TransUnderflow => "Transposition stack is empty",
            NoirError::TransOverflow => "Transposition stack is full",
            NoirError::ArtUnderflow => "Articulation stack is empty",
            NoirError::ArtOverflow => "Articulation stack is full",
            NoirError::LayerUnderflow => "Layer stack is empty",
            NoirError::LayerOverflow => "Layer stack is full",
            NoirError::BadLayer => "Layer number out of range",
            NoirError::BadCue => "Cue number out of range",
            NoirError::DanglingImm => "Immediate articulation never used",
            NoirError::OpenLocation => "Location stack not empty",
            NoirError::OpenTrans => "Transposition stack not empty",
            NoirError::OpenArt => "Articulation stack not empty",
            NoirError::OpenLayer => "Layer stack not empty",
            NoirError::NoNotes => "No notes defined",
        }
    }
}

impl std::fmt::Display for NoirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
