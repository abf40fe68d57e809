use crate::core::{NmfNote, MAX_ART, MAX_LAYER, MAX_PITCH, MIN_PITCH};
use crate::file::{NmfError, NmfFile};
use crate::noir::NoirError;
use std::io::Write;

/// The event buffer: a thin collector over an [`NmfFile`] under
/// construction. Creating the buffer is the `open` state; consuming it
/// with [`finish`](Self::finish) is the sole legal terminal operation.
pub(crate) struct EventBuffer {
    data: NmfFile,
}

fn map(e: NmfError) -> NoirError {
    match e {
        NmfError::TooManySections => NoirError::ManySections,
        NmfError::TooManyNotes => NoirError::ManyNotes,
        NmfError::SectionOrder => NoirError::SectionOrder,
        NmfError::NoteBeforeSection => NoirError::NoteBeforeSection,
        _ => NoirError::BadNote,
    }
}

impl EventBuffer {
    pub(crate) fn new() -> Self {
        Self {
            data: NmfFile::new(),
        }
    }

    pub(crate) fn notes_len(&self) -> usize {
        self.data.notes_len()
    }

    /// Register a new section starting at `offset`.
    pub(crate) fn section(&mut self, offset: i32) -> Result<(), NoirError> {
        self.data.push_section_inner(offset).map_err(map)
    }

    /// Append a note event. `layer` is one-based; the stored `layer_i` is
    /// one less.
    pub(crate) fn note(
        &mut self,
        t: i32,
        dur: i32,
        pitch: i32,
        art: i32,
        sect: u16,
        layer: i32,
    ) -> Result<(), NoirError> {
        assert!(t >= 0, "negative event time");
        assert!(dur != 0 && dur != i32::MIN, "bad note duration");
        assert!(
            (MIN_PITCH..=MAX_PITCH).contains(&pitch),
            "pitch out of range"
        );
        assert!((0..=MAX_ART).contains(&art), "articulation out of range");
        assert!((1..=MAX_LAYER).contains(&layer), "layer out of range");
        let note = NmfNote {
            t,
            dur,
            pitch: pitch as i16,
            art: art as u16,
            sect,
            layer_i: (layer - 1) as u16,
        };
        self.data.push_note_inner(note).map_err(map)
    }

    /// Append a cue event carrying the packed 22-bit cue number.
    pub(crate) fn cue(&mut self, t: i32, sect: u16, cue_num: i32) -> Result<(), NoirError> {
        assert!(t >= 0, "negative event time");
        self.data
            .push_note_inner(NmfNote::cue(t, sect, cue_num))
            .map_err(map)
    }

    /// Rewrite the trailing `count` grace notes from insertion order to
    /// musical order: a duration of `-k` becomes `-((max_offs + 1) - k)`.
    ///
    /// The tail must consist of grace notes whose offsets do not exceed
    /// `max_offs`; anything else is a fault.
    pub(crate) fn flip(&mut self, count: i32, max_offs: i32) {
        assert!(count >= 0 && max_offs >= 1, "bad grace flip arguments");
        let len = self.data.notes_len();
        assert!(count as usize <= len, "grace flip count exceeds note count");
        for i in 1..=count as usize {
            let note = self.data.note_mut(len - i).expect("tail index in range");
            assert!(note.dur < 0, "grace flip tail holds a non-grace event");
            let flipped = (max_offs + 1) + note.dur;
            assert!(flipped >= 1, "grace offset exceeds the sequence maximum");
            note.dur = -flipped;
        }
    }

    /// Sort the collected events and serialize them to `output`.
    pub(crate) fn finish<W: Write>(self, output: &mut W) -> crate::Result<()> {
        let mut data = self.data;
        data.sort();
        data.write(output)
    }
}
