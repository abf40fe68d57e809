use crate::byte_iter::ByteIter;
use crate::core::{NmfNote, QuantumBasis, MAX_ART, MAX_PITCH, MIN_PITCH};
use crate::error::LibResult;
use crate::file::biased::{decode_i16, decode_i32};
use crate::scribe::Scribe;
use log::{debug, trace};
use snafu::{ResultExt, Snafu};
use std::io::{Read, Write};
use std::path::Path;

/// The maximum number of sections in an NMF file, section zero included.
pub const MAX_SECTIONS: usize = 65_535;

/// The maximum number of notes in an NMF file.
pub const MAX_NOTES: usize = 1_048_576;

const SIG_PRIMARY: u32 = 1_928_196_216;
const SIG_SECONDARY: u32 = 1_313_818_926;

/// Unsigned wire integers must also fit the signed 32-bit domain that all
/// time arithmetic is carried out in.
const MAX_UINT32: u32 = 2_147_483_647;

/// A violation of the NMF data invariants, raised while parsing a file or
/// while mutating a data object.
#[derive(Debug, Snafu)]
pub(crate) enum NmfError {
    #[snafu(display("unknown quantum basis"))]
    Basis,

    #[snafu(display("section count out of range"))]
    SectionCount,

    #[snafu(display("note count out of range"))]
    NoteCount,

    #[snafu(display("section offsets out of order"))]
    SectionOrder,

    #[snafu(display("too many sections"))]
    TooManySections,

    #[snafu(display("too many notes"))]
    TooManyNotes,

    #[snafu(display("{} field out of range", field))]
    Field { field: &'static str },

    #[snafu(display("note time precedes the start of its section"))]
    NoteBeforeSection,

    #[snafu(display("note index out of range"))]
    NoteIndex,

    #[snafu(display("no notes defined"))]
    NoNotes,
}

/// An in-memory Noir Music File: a quantum basis, a section table of
/// starting offsets, and a note table.
///
/// Invariants: section zero exists with offset zero; section offsets are
/// non-decreasing; every note's time is at least the offset of its section;
/// all note fields lie in their wire ranges.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NmfFile {
    basis: QuantumBasis,
    sections: Vec<i32>,
    notes: Vec<NmfNote>,
}

impl Default for NmfFile {
    fn default() -> Self {
        Self::new()
    }
}

impl NmfFile {
    /// Create an empty data object: basis Q96, section zero at offset zero,
    /// no notes.
    pub fn new() -> Self {
        Self {
            basis: QuantumBasis::Q96,
            sections: vec![0],
            notes: Vec::new(),
        }
    }

    /// Parse an NMF byte stream.
    pub fn read<R: Read>(r: R) -> crate::Result<Self> {
        let iter = ByteIter::new(r.bytes()).context(io!())?;
        Ok(Self::read_inner(iter)?)
    }

    /// Parse the NMF file at the given path.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Ok(Self::read_inner(
            ByteIter::new_file(path).context(io!())?,
        )?)
    }

    /// Serialize to a byte stream. Fails when no notes are defined.
    pub fn write<W: Write>(&self, w: &mut W) -> crate::Result<()> {
        let mut scribe = Scribe::new(w);
        Ok(self.write_inner(&mut scribe)?)
    }

    /// Serialize to the file at the given path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let mut file = std::fs::File::create(path).context(wr!())?;
        self.write(&mut file)
    }

    pub fn basis(&self) -> QuantumBasis {
        self.basis
    }

    /// Change the quantum basis tag. Time values are not rescaled.
    pub fn rebase(&mut self, basis: QuantumBasis) {
        self.basis = basis;
    }

    /// The number of sections, in [1, 65535].
    pub fn sections_len(&self) -> usize {
        self.sections.len()
    }

    /// The number of notes, in [0, 1048576].
    pub fn notes_len(&self) -> usize {
        self.notes.len()
    }

    /// The starting quanta offset of a section.
    pub fn offset(&self, sect_i: usize) -> Option<i32> {
        self.sections.get(sect_i).copied()
    }

    pub fn note(&self, note_i: usize) -> Option<&NmfNote> {
        self.notes.get(note_i)
    }

    /// Iterator over the notes in table order.
    pub fn notes(&self) -> impl Iterator<Item = &NmfNote> {
        self.notes.iter()
    }

    pub(crate) fn note_mut(&mut self, note_i: usize) -> Option<&mut NmfNote> {
        self.notes.get_mut(note_i)
    }

    /// Append a section with a non-decreasing starting offset.
    pub fn push_section(&mut self, offset: i32) -> crate::Result<()> {
        Ok(self
            .push_section_inner(offset)
            .context(crate::error::NmfSnafu { site: site!() })?)
    }

    pub(crate) fn push_section_inner(&mut self, offset: i32) -> Result<(), NmfError> {
        if offset < 0 {
            return Err(NmfError::Field { field: "offset" });
        }
        let last = *self.sections.last().expect("section zero always exists");
        if offset < last {
            return Err(NmfError::SectionOrder);
        }
        if self.sections.len() >= MAX_SECTIONS {
            return Err(NmfError::TooManySections);
        }
        self.sections.push(offset);
        Ok(())
    }

    /// Append a note after validating its fields against the invariants.
    pub fn push_note(&mut self, note: NmfNote) -> crate::Result<()> {
        Ok(self
            .push_note_inner(note)
            .context(crate::error::NmfSnafu { site: site!() })?)
    }

    pub(crate) fn push_note_inner(&mut self, note: NmfNote) -> Result<(), NmfError> {
        self.validate(&note)?;
        if self.notes.len() >= MAX_NOTES {
            return Err(NmfError::TooManyNotes);
        }
        self.notes.push(note);
        Ok(())
    }

    /// Replace the note at `note_i`, revalidating it.
    pub fn set_note(&mut self, note_i: usize, note: NmfNote) -> crate::Result<()> {
        Ok(self
            .set_note_inner(note_i, note)
            .context(crate::error::NmfSnafu { site: site!() })?)
    }

    pub(crate) fn set_note_inner(&mut self, note_i: usize, note: NmfNote) -> Result<(), NmfError> {
        self.validate(&note)?;
        match self.notes.get_mut(note_i) {
            Some(slot) => {
                *slot = note;
                Ok(())
            }
            None => Err(NmfError::NoteIndex),
        }
    }

    /// Order the notes by ascending time, then ascending duration. Grace
    /// notes thereby precede the beat in offset order, and cues fall
    /// between grace notes and measured notes at the same time.
    pub fn sort(&mut self) {
        self.notes.sort_by_key(NmfNote::sort_key);
    }

    fn validate(&self, note: &NmfNote) -> Result<(), NmfError> {
        if note.t < 0 {
            return Err(NmfError::Field { field: "t" });
        }
        if note.dur == i32::MIN {
            return Err(NmfError::Field { field: "dur" });
        }
        let pitch = note.pitch as i32;
        if !(MIN_PITCH..=MAX_PITCH).contains(&pitch) {
            return Err(NmfError::Field { field: "pitch" });
        }
        if note.art as i32 > MAX_ART {
            return Err(NmfError::Field { field: "art" });
        }
        let offset = match self.sections.get(note.sect as usize) {
            Some(offset) => *offset,
            None => return Err(NmfError::Field { field: "sect" }),
        };
        if note.t < offset {
            return Err(NmfError::NoteBeforeSection);
        }
        Ok(())
    }

    fn read_inner<R: Read>(mut iter: ByteIter<R>) -> LibResult<Self> {
        trace!("parsing nmf signatures");
        let sig = iter.read_u32().context(io!())?;
        if sig != SIG_PRIMARY {
            invalid_file!("bad primary signature {:#010x}", sig);
        }
        let sig = iter.read_u32().context(io!())?;
        if sig != SIG_SECONDARY {
            invalid_file!("bad secondary signature {:#010x}", sig);
        }

        let basis = QuantumBasis::from_u16(iter.read_u16().context(io!())?)
            .context(crate::error::NmfSnafu { site: site!() })?;

        let sect_count = iter.read_u16().context(io!())? as usize;
        if sect_count < 1 {
            return Err(NmfError::SectionCount).context(crate::error::NmfSnafu { site: site!() });
        }
        let note_count = iter.read_u32().context(io!())? as usize;
        if note_count < 1 || note_count > MAX_NOTES {
            return Err(NmfError::NoteCount).context(crate::error::NmfSnafu { site: site!() });
        }
        debug!("nmf header: {:?}, {} sections, {} notes", basis, sect_count, note_count);

        let mut sections = Vec::with_capacity(sect_count);
        for i in 0..sect_count {
            let offset = Self::read_uint32(&mut iter, "offset")?;
            let ok = if i == 0 {
                offset == 0
            } else {
                offset >= sections[i - 1]
            };
            if !ok {
                return Err(NmfError::SectionOrder)
                    .context(crate::error::NmfSnafu { site: site!() });
            }
            sections.push(offset);
        }

        let mut file = Self {
            basis,
            sections,
            notes: Vec::with_capacity(note_count),
        };
        for _ in 0..note_count {
            let note = Self::read_note(&mut iter)?;
            file.push_note_inner(note)
                .context(crate::error::NmfSnafu { site: site!() })?;
        }
        Ok(file)
    }

    fn read_uint32<R: Read>(iter: &mut ByteIter<R>, field: &'static str) -> LibResult<i32> {
        let raw = iter.read_u32().context(io!())?;
        if raw > MAX_UINT32 {
            return Err(NmfError::Field { field }).context(crate::error::NmfSnafu { site: site!() });
        }
        Ok(raw as i32)
    }

    fn read_note<R: Read>(iter: &mut ByteIter<R>) -> LibResult<NmfNote> {
        let t = Self::read_uint32(iter, "t")?;
        let dur = decode_i32(iter.read_u32().context(io!())?)
            .context(crate::error::NmfSnafu { site: site!() })?;
        let pitch = decode_i16(iter.read_u16().context(io!())?)
            .context(crate::error::NmfSnafu { site: site!() })?;
        let art = iter.read_u16().context(io!())?;
        let sect = iter.read_u16().context(io!())?;
        let layer_i = iter.read_u16().context(io!())?;
        let note = NmfNote {
            t,
            dur,
            pitch,
            art,
            sect,
            layer_i,
        };
        trace!("parsed {:?}", note);
        Ok(note)
    }

    fn write_inner<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        if self.notes.is_empty() {
            return Err(NmfError::NoNotes).context(crate::error::NmfSnafu { site: site!() });
        }
        trace!("writing nmf header");
        w.write_u32(SIG_PRIMARY)?;
        w.write_u32(SIG_SECONDARY)?;
        w.write_u16(self.basis.to_u16())?;
        w.write_u16(self.sections.len() as u16)?;
        w.write_u32(self.notes.len() as u32)?;
        for offset in &self.sections {
            w.write_u32(*offset as u32)?;
        }
        for note in &self.notes {
            w.write_u32(note.t as u32)?;
            w.write_bias_i32(note.dur)?;
            w.write_bias_i16(note.pitch)?;
            w.write_u16(note.art)?;
            w.write_u16(note.sect)?;
            w.write_u16(note.layer_i)?;
        }
        debug!(
            "wrote {} sections and {} notes",
            self.sections.len(),
            self.notes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NmfFile {
        let mut file = NmfFile::new();
        file.push_note(NmfNote {
            t: 96,
            dur: 96,
            pitch: 0,
            art: 0,
            sect: 0,
            layer_i: 0,
        })
        .unwrap();
        file.push_note(NmfNote {
            t: 96,
            dur: -1,
            pitch: 4,
            art: 0,
            sect: 0,
            layer_i: 0,
        })
        .unwrap();
        file.push_note(NmfNote {
            t: 0,
            dur: 48,
            pitch: -7,
            art: 3,
            sect: 0,
            layer_i: 1,
        })
        .unwrap();
        file
    }

    #[test]
    fn new_is_empty_with_section_zero() {
        let file = NmfFile::new();
        assert_eq!(1, file.sections_len());
        assert_eq!(Some(0), file.offset(0));
        assert_eq!(0, file.notes_len());
        assert_eq!(QuantumBasis::Q96, file.basis());
    }

    #[test]
    fn sort_orders_by_time_then_duration() {
        let mut file = sample();
        file.sort();
        let durs: Vec<i32> = file.notes().map(|n| n.dur).collect();
        let times: Vec<i32> = file.notes().map(|n| n.t).collect();
        assert_eq!(vec![0, 96, 96], times);
        assert_eq!(vec![48, -1, 96], durs);
        // idempotent
        let before = file.clone();
        file.sort();
        assert_eq!(before, file);
    }

    #[test]
    fn empty_file_does_not_serialize() {
        let file = NmfFile::new();
        let mut sink = Vec::new();
        assert!(file.write(&mut sink).is_err());
    }

    #[test]
    fn section_order_is_enforced() {
        let mut file = NmfFile::new();
        file.push_section(50).unwrap();
        file.push_section(50).unwrap();
        assert!(file.push_section(49).is_err());
        assert_eq!(3, file.sections_len());
    }

    #[test]
    fn note_before_section_is_rejected() {
        let mut file = NmfFile::new();
        file.push_section(100).unwrap();
        let note = NmfNote {
            t: 99,
            dur: 1,
            sect: 1,
            ..NmfNote::default()
        };
        assert!(file.push_note(note).is_err());
    }

    #[test]
    fn bad_fields_are_rejected() {
        let mut file = NmfFile::new();
        let bad_pitch = NmfNote {
            dur: 1,
            pitch: 49,
            ..NmfNote::default()
        };
        assert!(file.push_note(bad_pitch).is_err());
        let bad_art = NmfNote {
            dur: 1,
            art: 62,
            ..NmfNote::default()
        };
        assert!(file.push_note(bad_art).is_err());
        let bad_sect = NmfNote {
            dur: 1,
            sect: 1,
            ..NmfNote::default()
        };
        assert!(file.push_note(bad_sect).is_err());
        assert_eq!(0, file.notes_len());
    }

    #[test]
    fn parse_rejects_bad_signature() {
        let mut bytes = Vec::new();
        sample().write(&mut bytes).unwrap();
        bytes[0] ^= 0xff;
        assert!(NmfFile::read(bytes.as_slice()).is_err());
    }

    #[test]
    fn parse_rejects_truncation() {
        let mut bytes = Vec::new();
        sample().write(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(NmfFile::read(bytes.as_slice()).is_err());
    }

    #[test]
    fn parse_rejects_zero_biased_field() {
        let mut file = sample();
        file.sort();
        let mut bytes = Vec::new();
        file.write(&mut bytes).unwrap();
        // the dur field of the first note starts four bytes into its record
        let note_base = 8 + 2 + 2 + 4 + 4;
        for i in 0..4 {
            bytes[note_base + 4 + i] = 0;
        }
        assert!(NmfFile::read(bytes.as_slice()).is_err());
    }

    #[test]
    fn rebase_changes_tag_only() {
        let mut file = sample();
        file.rebase(QuantumBasis::F48000);
        assert_eq!(QuantumBasis::F48000, file.basis());
        assert_eq!(96, file.note(0).unwrap().t);
    }

    #[test]
    fn set_note_revalidates() {
        let mut file = sample();
        let replacement = NmfNote {
            t: 0,
            dur: 1,
            pitch: 48,
            ..NmfNote::default()
        };
        file.set_note(2, replacement).unwrap();
        assert_eq!(48, file.note(2).unwrap().pitch);
        let bad = NmfNote {
            t: -1,
            ..NmfNote::default()
        };
        assert!(file.set_note(0, bad).is_err());
        assert!(file.set_note(100, replacement).is_err());
    }
}
