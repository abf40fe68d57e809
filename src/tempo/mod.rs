/*!
The `tempo` module builds and applies tempo maps: monotonic piecewise
quadratic transforms from the 96 quanta per quarter timeline onto a
fixed-rate sample timeline. A map is described by a small stack-based
script (see [`TempoMap::parse`]) and applied to a whole NMF file with
[`TempoMap::apply`].
!*/

mod script;

use crate::core::{apply_suffix, base_quanta, QuantumBasis};
use crate::error::LibError;
use crate::file::NmfFile;
use crate::tempo::script::{MapEntity, MapReader};
use log::{debug, trace};
use std::io::Read;

/// The maximum number of tempo nodes in a map.
pub const MAX_TEMPI: usize = 16_384;

/// The capacity of the interpreter stack.
const MAX_STACK: usize = 32;

/// The closed enumeration of tempo map errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TempoError {
    Basis,
    Transform,
    NoZero,
    Chronology,
    Numeric,
    TooMany,
    Dangling,
    Empty,
    TypeSig,
    BadEntity,
    BadOp,
    StackRemains,
    StackFull,
    StackEmpty,
    DurString,
    NumString,
    Overflow,
    BadSection,
    BadCursor,
    BadRate,
    BadQuanta,
    BadMillis,
    Syntax,
    Trailing,
}

impl TempoError {
    /// The diagnostic message, capitalized, without trailing punctuation.
    pub fn message(&self) -> &'static str {
        match self {
            TempoError::Basis => "Input NMF has wrong quantum basis",
            TempoError::Transform => "Error transforming t",
            TempoError::NoZero => "No tempo at t=0",
            TempoError::Chronology => "Tempi not in chronological order",
            TempoError::Numeric => "Numeric computation error",
            TempoError::TooMany => "Too many tempi",
            TempoError::Dangling => "Ramp tempo at end of map",
            TempoError::Empty => "Empty tempo map",
            TempoError::TypeSig => "Type signature missing",
            TempoError::BadEntity => "Unsupported entity",
            TempoError::BadOp => "Unsupported operation",
            TempoError::StackRemains => "Items remaining on stack",
            TempoError::StackFull => "Interpreter stack filled",
            TempoError::StackEmpty => "Interpreter stack ran empty",
            TempoError::DurString => "Invalid duration string",
            TempoError::NumString => "Invalid numeric literal",
            TempoError::Overflow => "Integer overflow",
            TempoError::BadSection => "Section number not found in input",
            TempoError::BadCursor => "Cursor position out of range",
            TempoError::BadRate => "Invalid rate",
            TempoError::BadQuanta => "Invalid quanta count",
            TempoError::BadMillis => "Invalid millisecond count",
            TempoError::Syntax => "Invalid tempo map syntax",
            TempoError::Trailing => "Content after end of map",
        }
    }
}

impl std::fmt::Display for TempoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

type MapResult<T> = Result<T, TempoError>;

/// One node of a tempo map. A point `t >= offset_input` belonging to this
/// node transforms as `floor(a * x^2 + b * x) + offset_output` with
/// `x = t - offset_input`. Constant tempi have `a == 0`.
#[derive(Clone, Copy, Debug, Default)]
struct TempoNode {
    a: f64,
    b: f64,
    offset_input: i32,
    offset_output: i32,
}

/// A parsed tempo map, ready to transform time offsets.
#[derive(Clone, Debug)]
pub struct TempoMap {
    rate: i32,
    nodes: Vec<TempoNode>,
}

struct MapBuilder {
    rate: i32,
    nodes: Vec<TempoNode>,
    /// A ramp may only be committed once the next node's input offset is
    /// known, so at most one waits here.
    ramp: Option<RampBuf>,
}

#[derive(Clone, Copy)]
struct RampBuf {
    t: i32,
    q1: i32,
    r1: i32,
    q2: i32,
    r2: i32,
}

impl MapBuilder {
    fn new(rate: i32) -> Self {
        assert!(rate == 44100 || rate == 48000, "unsupported sampling rate");
        Self {
            rate,
            nodes: Vec::new(),
            ramp: None,
        }
    }

    /// The first tempo must sit at t=0; afterwards every tempo must be
    /// strictly later than the previous node or the buffered ramp.
    fn check_time(&self, t: i32) -> MapResult<()> {
        assert!(t >= 0);
        if let Some(last) = self.nodes.last() {
            if t <= last.offset_input {
                return Err(TempoError::Chronology);
            }
        }
        if let Some(ramp) = &self.ramp {
            if t <= ramp.t {
                return Err(TempoError::Chronology);
            }
        }
        if self.nodes.is_empty() && self.ramp.is_none() && t != 0 {
            return Err(TempoError::NoZero);
        }
        Ok(())
    }

    fn add_node(&mut self, t: i32, a: f64, b: f64) -> MapResult<()> {
        self.check_time(t)?;
        if !a.is_finite() || !b.is_finite() {
            return Err(TempoError::Numeric);
        }
        if self.nodes.len() >= MAX_TEMPI {
            return Err(TempoError::TooMany);
        }
        let offset_output = match self.nodes.last() {
            None => 0,
            Some(prev) => {
                let x = (t - prev.offset_input) as f64;
                let f = (prev.a * x * x + prev.b * x + prev.offset_output as f64).floor();
                if !f.is_finite() || f < i32::MIN as f64 || f > i32::MAX as f64 {
                    return Err(TempoError::Numeric);
                }
                // output offsets must strictly increase so that orderings
                // survive the transform
                (f as i32).max(prev.offset_output + 1)
            }
        };
        trace!("tempo node at {} -> {} (a={}, b={})", t, offset_output, a, b);
        self.nodes.push(TempoNode {
            a,
            b,
            offset_input: t,
            offset_output,
        });
        Ok(())
    }

    /// Quanta per beat `q` at `r` beats per ten minutes.
    fn add_constant(&mut self, t: i32, q: i32, r: i32) -> MapResult<()> {
        assert!(t >= 0 && q >= 1 && r >= 1);
        self.flush_ramp(t)?;
        self.check_time(t)?;
        let b = (600.0 * self.rate as f64) / (r as f64 * q as f64);
        self.add_node(t, 0.0, b)
    }

    /// A constant rate such that `q` quanta occupy `m` milliseconds.
    fn add_span(&mut self, t: i32, q: i32, m: i32) -> MapResult<()> {
        assert!(t >= 0 && q >= 1 && m >= 1);
        self.flush_ramp(t)?;
        self.check_time(t)?;
        let b = (m as f64 * (self.rate as f64 / 1000.0)) / q as f64;
        self.add_node(t, 0.0, b)
    }

    /// Commit a ramp now that its endpoint is known: the acceleration is
    /// the velocity difference over the span in input quanta.
    fn add_ramp(&mut self, buf: RampBuf, t_next: i32) -> MapResult<()> {
        if t_next <= buf.t {
            return Err(TempoError::Chronology);
        }
        self.check_time(buf.t)?;
        let v_start = (600.0 * self.rate as f64) / (buf.r1 as f64 * buf.q1 as f64);
        let v_end = (600.0 * self.rate as f64) / (buf.r2 as f64 * buf.q2 as f64);
        let accel = (v_end - v_start) / (t_next - buf.t) as f64;
        self.add_node(buf.t, accel / 2.0, v_start)
    }

    fn flush_ramp(&mut self, t_next: i32) -> MapResult<()> {
        if let Some(buf) = self.ramp.take() {
            self.add_ramp(buf, t_next)?;
        }
        Ok(())
    }

    /// Buffer a ramp. Identical endpoint rates degenerate to a constant
    /// tempo with no buffering.
    fn buffer_ramp(&mut self, t: i32, q1: i32, r1: i32, q2: i32, r2: i32) -> MapResult<()> {
        assert!(t >= 0 && q1 >= 1 && r1 >= 1 && q2 >= 1 && r2 >= 1);
        self.check_time(t)?;
        if q1 == q2 && r1 == r2 {
            return self.add_constant(t, q1, r1);
        }
        self.flush_ramp(t)?;
        self.ramp = Some(RampBuf { t, q1, r1, q2, r2 });
        Ok(())
    }

    fn finish(self) -> MapResult<TempoMap> {
        if self.ramp.is_some() {
            return Err(TempoError::Dangling);
        }
        if self.nodes.is_empty() {
            return Err(TempoError::Empty);
        }
        Ok(TempoMap {
            rate: self.rate,
            nodes: self.nodes,
        })
    }
}

struct Interpreter<'a> {
    builder: MapBuilder,
    input: &'a NmfFile,
    stack: Vec<i32>,
    cursor: i32,
}

impl<'a> Interpreter<'a> {
    fn new(rate: i32, input: &'a NmfFile) -> Self {
        Self {
            builder: MapBuilder::new(rate),
            input,
            stack: Vec::new(),
            cursor: 0,
        }
    }

    fn push(&mut self, value: i32) -> MapResult<()> {
        if self.stack.len() >= MAX_STACK {
            return Err(TempoError::StackFull);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> MapResult<i32> {
        self.stack.pop().ok_or(TempoError::StackEmpty)
    }

    /// Push the quanta total of a duration string: rhythm digits `1`-`9`,
    /// each optionally followed by one suffix.
    fn push_dur(&mut self, text: &str) -> MapResult<()> {
        if text.is_empty() {
            return Err(TempoError::DurString);
        }
        let mut total: i32 = 0;
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '0' {
                return Err(TempoError::DurString);
            }
            let mut d = base_quanta(c).ok_or(TempoError::DurString)?;
            if let Some(&suffix) = chars.peek() {
                if suffix == '\'' || suffix == '.' || suffix == ',' {
                    d = apply_suffix(d, suffix).ok_or(TempoError::DurString)?;
                    chars.next();
                }
            }
            total = total.checked_add(d).ok_or(TempoError::DurString)?;
        }
        self.push(total)
    }

    fn push_num(&mut self, text: &str) -> MapResult<()> {
        let value = parse_int(text).ok_or(TempoError::NumString)?;
        self.push(value)
    }

    fn op_mul(&mut self) -> MapResult<()> {
        let b = self.pop()? as i64;
        let a = self.pop()? as i64;
        let r = a * b;
        if r < i32::MIN as i64 || r > i32::MAX as i64 {
            return Err(TempoError::Overflow);
        }
        self.push(r as i32)
    }

    fn op_sect(&mut self) -> MapResult<()> {
        let sect = self.pop()?;
        if sect < 0 || sect as usize >= self.input.sections_len() {
            return Err(TempoError::BadSection);
        }
        self.cursor = self.input.offset(sect as usize).unwrap_or(0);
        Ok(())
    }

    fn op_step(&mut self) -> MapResult<()> {
        let step = self.pop()? as i64;
        let r = self.cursor as i64 + step;
        if r < 0 || r > i32::MAX as i64 {
            return Err(TempoError::BadCursor);
        }
        self.cursor = r as i32;
        Ok(())
    }

    fn op_tempo(&mut self) -> MapResult<()> {
        let r = self.pop()?;
        let q = self.pop()?;
        if r < 1 {
            return Err(TempoError::BadRate);
        }
        if q < 1 {
            return Err(TempoError::BadQuanta);
        }
        self.builder.add_constant(self.cursor, q, r)
    }

    fn op_ramp(&mut self) -> MapResult<()> {
        let r2 = self.pop()?;
        let q2 = self.pop()?;
        let r1 = self.pop()?;
        let q1 = self.pop()?;
        if r1 < 1 || r2 < 1 {
            return Err(TempoError::BadRate);
        }
        if q1 < 1 || q2 < 1 {
            return Err(TempoError::BadQuanta);
        }
        self.builder.buffer_ramp(self.cursor, q1, r1, q2, r2)
    }

    fn op_span(&mut self) -> MapResult<()> {
        let m = self.pop()?;
        let q = self.pop()?;
        if m < 1 {
            return Err(TempoError::BadMillis);
        }
        if q < 1 {
            return Err(TempoError::BadQuanta);
        }
        self.builder.add_span(self.cursor, q, m)
    }

    fn op(&mut self, name: &str) -> MapResult<()> {
        match name {
            "mul" => self.op_mul(),
            "sect" => self.op_sect(),
            "step" => self.op_step(),
            "tempo" => self.op_tempo(),
            "ramp" => self.op_ramp(),
            "span" => self.op_span(),
            _ => Err(TempoError::BadOp),
        }
    }
}

fn parse_int(text: &str) -> Option<i32> {
    let (neg, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() {
        return None;
    }
    let mut result: i32 = 0;
    for c in digits.chars() {
        let d = c.to_digit(10)? as i32;
        result = result.checked_mul(10)?.checked_add(d)?;
    }
    Some(if neg { -result } else { result })
}

impl TempoMap {
    /// Interpret a `%noir-tempo;` script into a tempo map.
    ///
    /// `srate` must be 44100 or 48000 and becomes the map's output basis.
    /// The `sect` operator resolves section numbers against `input`, which
    /// must be the NMF file the map will later be applied to.
    pub fn parse<R: Read>(source: R, srate: i32, input: &NmfFile) -> crate::Result<TempoMap> {
        let mut reader = MapReader::new(source);
        let mut interp = Interpreter::new(srate, input);

        let (line, first) = reader.next_entity()?;
        match first {
            MapEntity::Meta(name) if name == "noir-tempo" => {}
            _ => {
                return Err(LibError::TempoMapAt {
                    line,
                    kind: TempoError::TypeSig,
                }
                .into())
            }
        }

        loop {
            let (line, entity) = reader.next_entity()?;
            let wrap = |kind| LibError::TempoMapAt { line, kind };
            match entity {
                MapEntity::Eof => break,
                MapEntity::Meta(_) => return Err(wrap(TempoError::BadEntity).into()),
                MapEntity::Str { prefix, value } => {
                    let autostep = match prefix.as_str() {
                        "" => false,
                        "t" => true,
                        _ => return Err(wrap(TempoError::BadEntity).into()),
                    };
                    interp.push_dur(&value).map_err(wrap)?;
                    if autostep {
                        interp.op_step().map_err(wrap)?;
                    }
                }
                MapEntity::Number(text) => interp.push_num(&text).map_err(wrap)?,
                MapEntity::Op(name) => interp.op(&name).map_err(wrap)?,
            }
        }
        reader.consume_trailing()?;

        if !interp.stack.is_empty() {
            return Err(LibError::TempoMap {
                kind: TempoError::StackRemains,
            }
            .into());
        }
        let map = interp
            .builder
            .finish()
            .map_err(|kind| LibError::TempoMap { kind })?;
        debug!("tempo map with {} nodes at rate {}", map.nodes.len(), map.rate);
        Ok(map)
    }

    /// The output sampling rate of the map.
    pub fn rate(&self) -> i32 {
        self.rate
    }

    /// Transform an input quantum offset to the output timeline.
    ///
    /// Returns `None` when the computation leaves the 32-bit range. The
    /// result is floored, clamped non-negative, and clamped to strictly
    /// precede the next node's output offset.
    pub fn transform(&self, t: i32) -> Option<i32> {
        assert!(t >= 0, "negative input offset");
        let idx = self.nodes.partition_point(|n| n.offset_input <= t) - 1;
        let node = &self.nodes[idx];
        let next = self.nodes.get(idx + 1);

        let x = (t - node.offset_input) as f64;
        let f = (node.a * x * x + node.b * x).floor();
        if !f.is_finite() || f < i32::MIN as f64 || f > i32::MAX as f64 {
            return None;
        }
        let y = (f as i32).max(0).checked_add(node.offset_output)?;
        Some(match next {
            Some(next) if y >= next.offset_output => next.offset_output - 1,
            _ => y,
        })
    }

    /// Apply the map to a whole NMF file: every section offset and every
    /// measured note interval is transformed; grace offsets and zero
    /// durations pass through untouched.
    pub fn apply(&self, input: &NmfFile) -> crate::Result<NmfFile> {
        if input.basis() != QuantumBasis::Q96 {
            return Err(LibError::TempoMap {
                kind: TempoError::Basis,
            }
            .into());
        }
        let transform_err = || LibError::TempoMap {
            kind: TempoError::Transform,
        };

        let mut output = NmfFile::new();
        let basis = QuantumBasis::for_rate(self.rate).expect("rate checked at construction");
        output.rebase(basis);

        for i in 1..input.sections_len() {
            let offset = input.offset(i).expect("section index in range");
            let mapped = self.transform(offset).ok_or_else(transform_err)?;
            output.push_section(mapped)?;
        }

        for note in input.notes() {
            let mut note = *note;
            let t = if note.t == 0 {
                0
            } else {
                self.transform(note.t).ok_or_else(transform_err)?
            };
            if note.dur > 0 {
                let end = note
                    .t
                    .checked_add(note.dur)
                    .ok_or_else(transform_err)?;
                let mapped_end = self.transform(end).ok_or_else(transform_err)?;
                note.dur = mapped_end - t;
            }
            note.t = t;
            output.push_note(note)?;
        }
        Ok(output)
    }
}
