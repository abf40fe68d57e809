/// The maximum articulation index.
pub const MAX_ART: i32 = 61;

/// The maximum one-based layer number.
pub const MAX_LAYER: i32 = 65536;

/// The maximum cue number. Cues are 22-bit values packed into the `art`
/// (high six bits) and `layer_i` (low sixteen bits) fields, and the `art`
/// field is bounded by [`MAX_ART`].
pub const MAX_CUE: i32 = (MAX_ART << 16) | 0xffff;

/// One event record of an NMF file.
///
/// A duration greater than zero is a measured count of quanta. A negative
/// duration marks an unmeasured grace note: -1 is the grace immediately
/// before the beat, -2 the one before that, and so on. A duration of zero
/// is reserved for cues and other special events.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct NmfNote {
    /// The time offset of the event in quanta, zero or greater. Never less
    /// than the starting offset of the event's section.
    pub t: i32,

    /// The duration of the event. See the struct documentation for the
    /// three regimes.
    pub dur: i32,

    /// Semitones from middle C, in [-39, 48].
    pub pitch: i16,

    /// The articulation index, in [0, 61].
    pub art: u16,

    /// The section the event belongs to.
    pub sect: u16,

    /// One less than the layer number of the event within its section.
    pub layer_i: u16,
}

impl NmfNote {
    /// Returns `true` for unmeasured grace notes.
    pub fn is_grace(&self) -> bool {
        self.dur < 0
    }

    /// Returns `true` for zero-duration special events.
    pub fn is_cue(&self) -> bool {
        self.dur == 0
    }

    /// The 22-bit cue number packed into this record. Only meaningful when
    /// [`is_cue`](Self::is_cue) is `true`.
    pub fn cue_num(&self) -> i32 {
        ((self.art as i32) << 16) | (self.layer_i as i32)
    }

    /// Build a cue record at time `t` in section `sect`.
    pub fn cue(t: i32, sect: u16, cue_num: i32) -> Self {
        assert!(
            (0..=MAX_CUE).contains(&cue_num),
            "cue number out of range"
        );
        NmfNote {
            t,
            dur: 0,
            pitch: 0,
            art: (cue_num >> 16) as u16,
            sect,
            layer_i: (cue_num & 0xffff) as u16,
        }
    }

    /// The primary sort key: ascending time, then ascending duration, so
    /// grace notes precede the beat in offset order and cues fall between
    /// grace notes and measured notes.
    pub(crate) fn sort_key(&self) -> (i32, i32) {
        (self.t, self.dur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_packing_round_trip() {
        let cue = NmfNote::cue(500, 3, MAX_CUE);
        assert!(cue.is_cue());
        assert_eq!(MAX_CUE, cue.cue_num());
        assert_eq!(61, cue.art);
        assert_eq!(0xffff, cue.layer_i);

        let cue = NmfNote::cue(0, 0, 70000);
        assert_eq!(1, cue.art);
        assert_eq!(70000 - 65536, cue.layer_i as i32);
        assert_eq!(70000, cue.cue_num());
    }

    #[test]
    fn grace_and_cue_predicates() {
        let grace = NmfNote {
            dur: -2,
            ..NmfNote::default()
        };
        assert!(grace.is_grace());
        assert!(!grace.is_cue());
        let measured = NmfNote {
            dur: 96,
            ..NmfNote::default()
        };
        assert!(!measured.is_grace());
        assert!(!measured.is_cue());
    }
}
