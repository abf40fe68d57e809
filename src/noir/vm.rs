use crate::core::{PitchSet, MAX_CUE, MAX_LAYER};
use crate::file::MAX_SECTIONS;
use crate::noir::event::EventBuffer;
use crate::noir::NoirError;
use log::trace;
use std::io::Write;

/// The capacity of each of the four machine stacks.
const MAX_STACK: usize = 1024;

type VmResult = Result<(), NoirError>;

/// The Noir virtual machine.
///
/// The machine keeps a time cursor, the current pitch set and duration, the
/// current section, the grace-note assembly registers, and four bounded
/// stacks: locations, transpositions, layers and articulations. Entities
/// and operations arrive from the entity parser; note and cue events leave
/// through the event buffer.
pub(crate) struct Vm {
    events: EventBuffer,
    /// Time position in quanta.
    cursor: i32,
    pitch: Option<PitchSet>,
    /// `Some(0)` is the grace-note duration.
    dur: Option<i32>,
    section: u16,
    /// Cursor value at the start of the current section.
    base_t: i32,
    /// The `(section, layer_i)` used when the layer stack is empty.
    base_layer: (u16, u16),
    imm_art: Option<i32>,
    /// Grace events emitted since the last flush.
    grace_count: i32,
    /// Grace beats begun since the last flush.
    grace_offset: i32,
    loc_stack: Vec<i32>,
    trans_stack: Vec<i32>,
    layer_stack: Vec<(u16, u16)>,
    art_stack: Vec<i32>,
}

impl Vm {
    pub(crate) fn new() -> Self {
        Self {
            events: EventBuffer::new(),
            cursor: 0,
            pitch: None,
            dur: None,
            section: 0,
            base_t: 0,
            base_layer: (0, 0),
            imm_art: None,
            grace_count: 0,
            grace_offset: 0,
            loc_stack: Vec::new(),
            trans_stack: Vec::new(),
            layer_stack: Vec::new(),
            art_stack: Vec::new(),
        }
    }

    /// A pitch entity: transpose the set by the current transposition and
    /// store it as the current pitch.
    pub(crate) fn pset(&mut self, set: PitchSet) -> VmResult {
        let offset = self.trans_stack.last().copied().unwrap_or(0);
        let mut set = set;
        if !set.transpose(offset) {
            return Err(NoirError::PitchRange);
        }
        self.pitch = Some(set);
        Ok(())
    }

    /// A duration entity. Leaving a grace context flushes the pending
    /// grace notes before the new duration takes effect.
    pub(crate) fn dur(&mut self, quanta: i32) -> VmResult {
        debug_assert!(quanta >= 0, "negative duration from the entity parser");
        if self.dur == Some(0) && quanta != 0 {
            self.flush_grace();
        }
        self.dur = Some(quanta);
        Ok(())
    }

    /// The `/` operation: emit the current pitch set at the cursor with the
    /// current duration, then advance the cursor for measured durations.
    pub(crate) fn repeat(&mut self) -> VmResult {
        let set = self.pitch.ok_or(NoirError::NoPitch)?;
        let dur = self.dur.ok_or(NoirError::NoDur)?;
        let send_dur = if dur == 0 {
            self.grace_offset = self
                .grace_offset
                .checked_add(1)
                .ok_or(NoirError::Overflow)?;
            -self.grace_offset
        } else {
            dur
        };
        let art = match self.imm_art.take() {
            Some(a) => a,
            None => self.art_stack.last().copied().unwrap_or(0),
        };
        let (sect, layer_i) = self.layer_stack.last().copied().unwrap_or(self.base_layer);
        for pitch in set.pitches() {
            self.events
                .note(self.cursor, send_dur, pitch, art, sect, layer_i as i32 + 1)?;
            if dur == 0 {
                self.grace_count = self
                    .grace_count
                    .checked_add(1)
                    .ok_or(NoirError::Overflow)?;
            }
        }
        if dur > 0 {
            self.cursor = self.cursor.checked_add(dur).ok_or(NoirError::Overflow)?;
        }
        Ok(())
    }

    /// The `\n;` operation: repeat `count` times.
    pub(crate) fn multiple(&mut self, count: i32) -> VmResult {
        if count < 1 {
            return Err(NoirError::BadRepeat);
        }
        for _ in 0..count {
            self.repeat()?;
        }
        Ok(())
    }

    /// The `$` operation: begin a new section at the cursor.
    pub(crate) fn section(&mut self) -> VmResult {
        self.check_clean()?;
        self.flush_grace();
        if self.section as usize + 1 >= MAX_SECTIONS {
            return Err(NoirError::ManySections);
        }
        self.section += 1;
        self.events.section(self.cursor)?;
        trace!("section {} at {}", self.section, self.cursor);
        self.reset_current();
        self.base_t = self.cursor;
        self.base_layer = (self.section, 0);
        Ok(())
    }

    /// The `@` operation: return to the start of the current section.
    pub(crate) fn section_return(&mut self) -> VmResult {
        self.check_clean()?;
        self.flush_grace();
        self.reset_current();
        self.cursor = self.base_t;
        self.base_layer.1 = 0;
        Ok(())
    }

    /// The `{` operation: push the cursor onto the location stack.
    pub(crate) fn push_loc(&mut self) -> VmResult {
        if self.loc_stack.len() >= MAX_STACK {
            return Err(NoirError::LocOverflow);
        }
        self.loc_stack.push(self.cursor);
        Ok(())
    }

    /// The `:` operation: jump the cursor to the top of the location stack.
    pub(crate) fn return_loc(&mut self) -> VmResult {
        if self.imm_art.is_some() {
            return Err(NoirError::DanglingImm);
        }
        let target = *self.loc_stack.last().ok_or(NoirError::LocUnderflow)?;
        self.flush_grace();
        self.reset_current();
        self.cursor = target;
        Ok(())
    }

    /// The `}` operation: pop the location stack.
    pub(crate) fn pop_loc(&mut self) -> VmResult {
        self.loc_stack.pop().ok_or(NoirError::LocUnderflow)?;
        Ok(())
    }

    /// The `^n;` operation: push the sum of the current transposition and
    /// the argument. Already emitted pitches are unaffected.
    pub(crate) fn push_trans(&mut self, semitones: i32) -> VmResult {
        if self.trans_stack.len() >= MAX_STACK {
            return Err(NoirError::TransOverflow);
        }
        let current = self.trans_stack.last().copied().unwrap_or(0) as i64;
        let total = current + semitones as i64;
        if total < i32::MIN as i64 || total > i32::MAX as i64 {
            return Err(NoirError::Overflow);
        }
        self.trans_stack.push(total as i32);
        Ok(())
    }

    /// The `=` operation: pop one transposition level.
    pub(crate) fn pop_trans(&mut self) -> VmResult {
        self.trans_stack.pop().ok_or(NoirError::TransUnderflow)?;
        Ok(())
    }

    /// The `*k` operation: articulation for the very next emission only.
    pub(crate) fn imm_art(&mut self, art: i32) -> VmResult {
        debug_assert!((0..=61).contains(&art));
        self.imm_art = Some(art);
        Ok(())
    }

    /// The `!k` operation: push an articulation.
    pub(crate) fn push_art(&mut self, art: i32) -> VmResult {
        debug_assert!((0..=61).contains(&art));
        if self.art_stack.len() >= MAX_STACK {
            return Err(NoirError::ArtOverflow);
        }
        self.art_stack.push(art);
        Ok(())
    }

    /// The `~` operation: pop an articulation.
    pub(crate) fn pop_art(&mut self) -> VmResult {
        self.art_stack.pop().ok_or(NoirError::ArtUnderflow)?;
        Ok(())
    }

    /// The `&n;` operation: rewrite the base layer of the current section.
    pub(crate) fn set_base_layer(&mut self, layer: i32) -> VmResult {
        if !(1..=MAX_LAYER).contains(&layer) {
            return Err(NoirError::BadLayer);
        }
        self.base_layer.1 = (layer - 1) as u16;
        Ok(())
    }

    /// The `+n;` operation: push a layer for the current section.
    pub(crate) fn push_layer(&mut self, layer: i32) -> VmResult {
        if !(1..=MAX_LAYER).contains(&layer) {
            return Err(NoirError::BadLayer);
        }
        if self.layer_stack.len() >= MAX_STACK {
            return Err(NoirError::LayerOverflow);
        }
        self.layer_stack.push((self.section, (layer - 1) as u16));
        Ok(())
    }

    /// The `-` operation: pop a layer.
    pub(crate) fn pop_layer(&mut self) -> VmResult {
        self.layer_stack.pop().ok_or(NoirError::LayerUnderflow)?;
        Ok(())
    }

    /// The `` `n; `` operation: emit a cue event at the cursor. The grace
    /// buffer is flushed first so its tail stays contiguous.
    pub(crate) fn cue(&mut self, cue_num: i32) -> VmResult {
        if !(0..=MAX_CUE).contains(&cue_num) {
            return Err(NoirError::BadCue);
        }
        self.flush_grace();
        self.events.cue(self.cursor, self.section, cue_num)
    }

    /// The end of input: all stacks must be released, and at least one
    /// event must have been emitted.
    pub(crate) fn eof(&mut self) -> VmResult {
        self.check_clean()?;
        self.flush_grace();
        if self.events.notes_len() == 0 {
            return Err(NoirError::NoNotes);
        }
        Ok(())
    }

    /// Sort the collected events and serialize them.
    pub(crate) fn finish<W: Write>(self, output: &mut W) -> crate::Result<()> {
        self.events.finish(output)
    }

    fn reset_current(&mut self) {
        self.pitch = None;
        self.dur = None;
    }

    /// Rewrite the pending grace tail into musical order and clear the
    /// grace registers.
    fn flush_grace(&mut self) {
        if self.grace_count > 0 {
            self.events.flip(self.grace_count, self.grace_offset);
        }
        self.grace_count = 0;
        self.grace_offset = 0;
    }

    fn check_clean(&self) -> VmResult {
        if !self.loc_stack.is_empty() {
            return Err(NoirError::OpenLocation);
        }
        if !self.trans_stack.is_empty() {
            return Err(NoirError::OpenTrans);
        }
        if !self.layer_stack.is_empty() {
            return Err(NoirError::OpenLayer);
        }
        if !self.art_stack.is_empty() {
            return Err(NoirError::OpenArt);
        }
        if self.imm_art.is_some() {
            return Err(NoirError::DanglingImm);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(pitches: &[i32]) -> PitchSet {
        let mut set = PitchSet::new();
        for &p in pitches {
            set.add(p);
        }
        set
    }

    #[test]
    fn repeat_requires_pitch_and_dur() {
        let mut vm = Vm::new();
        assert_eq!(Err(NoirError::NoPitch), vm.repeat());
        vm.pset(chord(&[0])).unwrap();
        assert_eq!(Err(NoirError::NoDur), vm.repeat());
        vm.dur(96).unwrap();
        vm.repeat().unwrap();
        assert_eq!(96, vm.cursor);
    }

    #[test]
    fn empty_pitch_set_advances_without_notes() {
        let mut vm = Vm::new();
        vm.pset(PitchSet::new()).unwrap();
        vm.dur(96).unwrap();
        vm.repeat().unwrap();
        assert_eq!(96, vm.cursor);
        assert_eq!(0, vm.events.notes_len());
    }

    #[test]
    fn transposition_is_cumulative() {
        let mut vm = Vm::new();
        vm.push_trans(12).unwrap();
        vm.push_trans(-5).unwrap();
        vm.pset(chord(&[0])).unwrap();
        assert!(vm.pitch.unwrap().contains(7));
        vm.pop_trans().unwrap();
        vm.pop_trans().unwrap();
        assert_eq!(Err(NoirError::TransUnderflow), vm.pop_trans());
    }

    #[test]
    fn section_requires_clean_state() {
        let mut vm = Vm::new();
        vm.push_loc().unwrap();
        assert_eq!(Err(NoirError::OpenLocation), vm.section());
        vm.pop_loc().unwrap();
        vm.imm_art(3).unwrap();
        assert_eq!(Err(NoirError::DanglingImm), vm.section());
    }

    #[test]
    fn section_return_restores_base() {
        let mut vm = Vm::new();
        vm.pset(chord(&[0])).unwrap();
        vm.dur(96).unwrap();
        vm.repeat().unwrap();
        vm.section().unwrap();
        assert_eq!(1, vm.section);
        assert_eq!(96, vm.base_t);
        vm.pset(chord(&[4])).unwrap();
        vm.dur(48).unwrap();
        vm.repeat().unwrap();
        assert_eq!(144, vm.cursor);
        vm.section_return().unwrap();
        assert_eq!(96, vm.cursor);
        assert!(vm.pitch.is_none());
        assert!(vm.dur.is_none());
    }

    #[test]
    fn eof_without_notes_fails() {
        let mut vm = Vm::new();
        assert_eq!(Err(NoirError::NoNotes), vm.eof());
    }

    #[test]
    fn cue_range_check() {
        let mut vm = Vm::new();
        assert_eq!(Err(NoirError::BadCue), vm.cue(-1));
        assert_eq!(Err(NoirError::BadCue), vm.cue(MAX_CUE + 1));
        vm.cue(MAX_CUE).unwrap();
        vm.eof().unwrap();
    }
}
