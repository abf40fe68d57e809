/*!
The `core` module holds the domain types shared by the NMF codec and the
Noir compiler: the quantum basis, pitches and pitch sets, rhythm durations,
and the note record itself.
!*/

mod basis;
mod duration;
mod note;
mod pitch;

pub use basis::QuantumBasis;
pub use note::{NmfNote, MAX_ART, MAX_CUE, MAX_LAYER};
pub use pitch::{PitchSet, MAX_PITCH, MIN_PITCH};

pub(crate) use duration::{apply_suffix, base_quanta};
