/*!
The `graph` module reads an NMF file whose notes encode dynamics curves
rather than music, and turns them into textual layer blocks for the Retro
synthesizer. Each NMF layer becomes one output graph; pitches carry the
dynamic levels and articulations select the record type.
!*/

use crate::core::NmfNote;
use crate::error::LibError;
use log::trace;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::io::Write;

/// Articulation keys of the graph encoding.
const ART_CONSTANT: u16 = 0;
const ART_RAMP: u16 = 1;
const ART_HIGH_MUL: u16 = 10;
const ART_LOW_MUL: u16 = 11;

/// Pitch range of a multiplier half: five bits.
const MUL_MIN: i16 = 0;
const MUL_MAX: i16 = 31;

/// Pitch range of a dynamic level: F below middle C up to g above it.
const DYN_MIN: i16 = -7;
const DYN_MAX: i16 = 7;

/// The maximum number of dynamic records per layer.
const MAX_RECORDS: usize = 65_536;

/// The closed enumeration of graph builder errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GraphError {
    DynRange,
    MulRange,
    GraceDur,
    GraceBeforeConstant,
    MissingZero,
    Simultaneous,
    LayerTooLong,
    GraceBeat,
    MultipleGrace,
    GraceOffset,
    HighMulSet,
    LowMulSet,
    BadArtKey,
    DanglingMul,
    DanglingGrace,
    EmptyLayer,
    DanglingRamp,
}

impl GraphError {
    /// The diagnostic message, capitalized, without trailing punctuation.
    pub fn message(&self) -> &'static str {
        match self {
            GraphError::DynRange => "Invalid dynamic range",
            GraphError::MulRange => "Invalid multiplier range",
            GraphError::GraceDur => "Invalid grace note",
            GraphError::GraceBeforeConstant => "Grace note before constant dynamic",
            GraphError::MissingZero => "Missing t=0 dynamic",
            GraphError::Simultaneous => "Simultaneous dynamics",
            GraphError::LayerTooLong => "Layer is too long",
            GraphError::GraceBeat => "Grace note missing its beat",
            GraphError::MultipleGrace => "Multiple grace notes",
            GraphError::GraceOffset => "Grace offset greater than one",
            GraphError::HighMulSet => "High multiplier already set",
            GraphError::LowMulSet => "Low multiplier already set",
            GraphError::BadArtKey => "Unrecognized articulation key",
            GraphError::DanglingMul => "Multipliers not well defined",
            GraphError::DanglingGrace => "Dangling grace note",
            GraphError::EmptyLayer => "Empty layer",
            GraphError::DanglingRamp => "Ramp at end of layer",
        }
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Clone, Copy, Debug)]
enum DynRec {
    Constant { t: i32, level: i16 },
    /// A ramp holds its starting level; `to` stays empty when the ending
    /// level binds to the next record's start.
    Ramp { t: i32, from: i16, to: Option<i16> },
}

impl DynRec {
    fn t(&self) -> i32 {
        match self {
            DynRec::Constant { t, .. } | DynRec::Ramp { t, .. } => *t,
        }
    }

    fn start_level(&self) -> i16 {
        match self {
            DynRec::Constant { level, .. } => *level,
            DynRec::Ramp { from, .. } => *from,
        }
    }
}

#[derive(Debug, Default)]
struct LayerGraph {
    recs: Vec<DynRec>,
    grace: Option<(i32, i16)>,
    mul_high: Option<i16>,
    mul_low: Option<i16>,
}

impl LayerGraph {
    fn last_time(&self) -> Option<i32> {
        self.recs.last().map(DynRec::t)
    }

    fn check_beat(&self, t: i32) -> Result<(), GraphError> {
        match self.last_time() {
            None if t != 0 => Err(GraphError::MissingZero),
            Some(last) if t <= last => Err(GraphError::Simultaneous),
            _ => Ok(()),
        }
    }

    fn push(&mut self, rec: DynRec) -> Result<(), GraphError> {
        if self.recs.len() >= MAX_RECORDS {
            return Err(GraphError::LayerTooLong);
        }
        self.recs.push(rec);
        Ok(())
    }

    fn multiplier(&self) -> Result<i32, GraphError> {
        match (self.mul_high, self.mul_low) {
            (Some(high), Some(low)) => Ok((((high as i32) << 5) | low as i32) + 1),
            (None, None) => Ok(1024),
            _ => Err(GraphError::DanglingMul),
        }
    }
}

/// Builds per-layer dynamics graphs from the notes of a sorted NMF file
/// and emits them as Retro layer blocks.
///
/// Sections are ignored; layer numbers span the whole file so that graphs
/// may cross section boundaries.
pub struct GraphBuilder {
    gamma: f64,
    layers: BTreeMap<u16, LayerGraph>,
}

impl GraphBuilder {
    /// Create a builder. `gamma` is the exponent of the level curve and
    /// must be a positive finite number.
    pub fn new(gamma: f64) -> Self {
        assert!(gamma.is_finite() && gamma > 0.0, "gamma out of range");
        Self {
            gamma,
            layers: BTreeMap::new(),
        }
    }

    /// Feed one note. Notes must arrive sorted by `(t, dur)`.
    pub fn add(&mut self, note: &NmfNote) -> crate::Result<()> {
        Ok(self.add_inner(note).map_err(|kind| LibError::Graph { kind })?)
    }

    fn add_inner(&mut self, note: &NmfNote) -> Result<(), GraphError> {
        let layer = self.layers.entry(note.layer_i).or_default();
        trace!("graph note {:?}", note);
        match note.art {
            ART_CONSTANT => {
                if !(DYN_MIN..=DYN_MAX).contains(&note.pitch) {
                    return Err(GraphError::DynRange);
                }
                if note.dur < 0 {
                    return Err(GraphError::GraceDur);
                }
                if layer.grace.is_some() {
                    return Err(GraphError::GraceBeforeConstant);
                }
                layer.check_beat(note.t)?;
                layer.push(DynRec::Constant {
                    t: note.t,
                    level: note.pitch,
                })
            }
            ART_RAMP => {
                if !(DYN_MIN..=DYN_MAX).contains(&note.pitch) {
                    return Err(GraphError::DynRange);
                }
                if note.dur >= 0 {
                    // the beat of a ramp; a buffered grace supplies its
                    // starting level
                    layer.check_beat(note.t)?;
                    let rec = match layer.grace.take() {
                        Some((grace_t, from)) => {
                            if grace_t != note.t {
                                return Err(GraphError::GraceBeat);
                            }
                            DynRec::Ramp {
                                t: note.t,
                                from,
                                to: Some(note.pitch),
                            }
                        }
                        None => DynRec::Ramp {
                            t: note.t,
                            from: note.pitch,
                            to: None,
                        },
                    };
                    layer.push(rec)
                } else if note.dur == -1 {
                    if layer.grace.is_some() {
                        return Err(GraphError::MultipleGrace);
                    }
                    layer.check_beat(note.t)?;
                    layer.grace = Some((note.t, note.pitch));
                    Ok(())
                } else {
                    Err(GraphError::GraceOffset)
                }
            }
            ART_HIGH_MUL => {
                if !(MUL_MIN..=MUL_MAX).contains(&note.pitch) {
                    return Err(GraphError::MulRange);
                }
                if layer.mul_high.is_some() {
                    return Err(GraphError::HighMulSet);
                }
                layer.mul_high = Some(note.pitch);
                Ok(())
            }
            ART_LOW_MUL => {
                if !(MUL_MIN..=MUL_MAX).contains(&note.pitch) {
                    return Err(GraphError::MulRange);
                }
                if layer.mul_low.is_some() {
                    return Err(GraphError::LowMulSet);
                }
                layer.mul_low = Some(note.pitch);
                Ok(())
            }
            _ => Err(GraphError::BadArtKey),
        }
    }

    /// A dynamic level: the pitch range maps linearly onto [0, 1], passes
    /// through the gamma curve, and lands on the integer range [0, 1024].
    fn level(&self, pitch: i16) -> i32 {
        let x = (pitch - DYN_MIN) as f64 / (DYN_MAX - DYN_MIN) as f64;
        let y = if (self.gamma - 1.0).abs() < f64::EPSILON {
            x
        } else {
            x.powf(self.gamma)
        };
        ((y * 1024.0).floor() as i32).max(0).min(1024)
    }

    fn check_complete(&self) -> Result<(), GraphError> {
        for layer in self.layers.values() {
            layer.multiplier()?;
            if layer.grace.is_some() {
                return Err(GraphError::DanglingGrace);
            }
            if layer.recs.is_empty() {
                return Err(GraphError::EmptyLayer);
            }
            if let Some(DynRec::Ramp { .. }) = layer.recs.last() {
                return Err(GraphError::DanglingRamp);
            }
        }
        Ok(())
    }

    /// Verify every layer is complete and write the layer blocks.
    ///
    /// Each block is a head line `<layer> <multiplier> <count> lgraph`
    /// followed by `count` records: `<t> <level> c` for a constant and
    /// `<t> <from> <to> r` for a ramp. Layers are emitted in ascending
    /// order and displayed one-based.
    pub fn write<W: Write>(&self, w: &mut W) -> crate::Result<()> {
        self.check_complete()
            .map_err(|kind| crate::error::LibError::Graph { kind })?;
        for (layer_i, layer) in &self.layers {
            let mul = layer.multiplier().expect("checked above");
            writeln!(
                w,
                "{} {} {} lgraph",
                *layer_i as u32 + 1,
                mul,
                layer.recs.len()
            )
            .context(wr!())?;
            for (i, rec) in layer.recs.iter().enumerate() {
                let line = match rec {
                    DynRec::Constant { t, level } => {
                        format!("{} {} c", t, self.level(*level))
                    }
                    DynRec::Ramp { t, from, to } => {
                        let end = match to {
                            Some(level) => *level,
                            // bind to the following record's start
                            None => layer.recs[i + 1].start_level(),
                        };
                        format!("{} {} {} r", t, self.level(*from), self.level(end))
                    }
                };
                writeln!(w, "{}", line).context(wr!())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dyn_note(t: i32, dur: i32, pitch: i16, art: u16, layer_i: u16) -> NmfNote {
        NmfNote {
            t,
            dur,
            pitch,
            art,
            sect: 0,
            layer_i,
        }
    }

    fn emit(builder: &GraphBuilder) -> String {
        let mut out = Vec::new();
        builder.write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn constant_layer() {
        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_CONSTANT, 0)).unwrap();
        builder.add(&dyn_note(48000, 1, 7, ART_CONSTANT, 0)).unwrap();
        let text = emit(&builder);
        assert_eq!("1 1024 2 lgraph\n0 512 c\n48000 1024 c\n", text);
    }

    #[test]
    fn ramp_binds_to_next_start() {
        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, -7, ART_RAMP, 0)).unwrap();
        builder.add(&dyn_note(48000, 1, 7, ART_CONSTANT, 0)).unwrap();
        let text = emit(&builder);
        assert_eq!("1 1024 2 lgraph\n0 0 1024 r\n48000 1024 c\n", text);
    }

    #[test]
    fn grace_supplies_the_ramp_start() {
        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_CONSTANT, 0)).unwrap();
        builder.add(&dyn_note(100, -1, -7, ART_RAMP, 0)).unwrap();
        builder.add(&dyn_note(100, 1, 7, ART_RAMP, 0)).unwrap();
        builder.add(&dyn_note(200, 1, 0, ART_CONSTANT, 0)).unwrap();
        let text = emit(&builder);
        assert_eq!(
            "1 1024 3 lgraph\n0 512 c\n100 0 1024 r\n200 512 c\n",
            text
        );
    }

    #[test]
    fn multiplier_assembly() {
        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_CONSTANT, 2)).unwrap();
        builder.add(&dyn_note(0, 1, 31, ART_HIGH_MUL, 2)).unwrap();
        builder.add(&dyn_note(0, 1, 31, ART_LOW_MUL, 2)).unwrap();
        let text = emit(&builder);
        assert_eq!("3 1024 1 lgraph\n0 512 c\n", text);

        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_CONSTANT, 0)).unwrap();
        builder.add(&dyn_note(0, 1, 1, ART_HIGH_MUL, 0)).unwrap();
        builder.add(&dyn_note(0, 1, 0, ART_LOW_MUL, 0)).unwrap();
        let text = emit(&builder);
        assert_eq!("1 33 1 lgraph\n0 512 c\n", text);
    }

    #[test]
    fn half_set_multiplier_is_rejected() {
        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_CONSTANT, 0)).unwrap();
        builder.add(&dyn_note(0, 1, 1, ART_HIGH_MUL, 0)).unwrap();
        assert!(builder.write(&mut Vec::new()).is_err());
    }

    #[test]
    fn first_dynamic_must_sit_at_zero() {
        let mut builder = GraphBuilder::new(1.0);
        assert!(builder.add(&dyn_note(5, 1, 0, ART_CONSTANT, 0)).is_err());
    }

    #[test]
    fn simultaneous_dynamics_are_rejected() {
        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_CONSTANT, 0)).unwrap();
        assert!(builder.add(&dyn_note(0, 1, 1, ART_CONSTANT, 0)).is_err());
    }

    #[test]
    fn dangling_states_are_rejected() {
        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_RAMP, 0)).unwrap();
        assert!(builder.write(&mut Vec::new()).is_err());

        let mut builder = GraphBuilder::new(1.0);
        builder.add(&dyn_note(0, 1, 0, ART_CONSTANT, 0)).unwrap();
        builder.add(&dyn_note(50, -1, 0, ART_RAMP, 0)).unwrap();
        assert!(builder.write(&mut Vec::new()).is_err());
    }

    #[test]
    fn deep_grace_offset_is_rejected() {
        let mut builder = GraphBuilder::new(1.0);
        assert_eq!(
            Err(GraphError::GraceOffset),
            builder.add_inner(&dyn_note(0, -2, 0, ART_RAMP, 0))
        );
    }

    #[test]
    fn gamma_bends_the_curve() {
        let builder = GraphBuilder::new(2.0);
        assert_eq!(256, builder.level(0));
        assert_eq!(1024, builder.level(7));
        assert_eq!(0, builder.level(-7));
    }
}
