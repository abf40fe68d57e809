use crate::core::{apply_suffix, base_quanta, PitchSet, MAX_PITCH, MIN_PITCH};
use crate::error::{LibError, LibResult};
use crate::noir::token::{Token, Tokenizer};
use crate::noir::vm::Vm;
use crate::noir::NoirError;
use log::trace;
use std::io::Read;

fn at(line: i32) -> impl FnOnce(NoirError) -> LibError {
    move |kind| LibError::Compile { line, kind }
}

/// Drive the tokenizer to the End Of File, classifying each top-level
/// token and dispatching it to the virtual machine.
pub(crate) fn run<R: Read>(tok: &mut Tokenizer<R>, vm: &mut Vm) -> LibResult<()> {
    loop {
        let token = tok.next_token()?;
        if token.is_eof() {
            vm.eof().map_err(at(token.line))?;
            return Ok(());
        }
        trace!("token '{}' at line {}", token.text, token.line);
        match token.first() {
            ')' | ']' => return Err(at(token.line)(NoirError::RightOrphan)),
            '(' | 'R' | 'r' => pitch_entity(tok, vm, &token)?,
            c if c.is_ascii_alphabetic() && ('a'..='g').contains(&c.to_ascii_lowercase()) => {
                pitch_entity(tok, vm, &token)?
            }
            '[' => dur_entity(tok, vm, &token)?,
            c if c.is_ascii_digit() => dur_entity(tok, vm, &token)?,
            _ => op(vm, &token)?,
        }
    }
}

/// Interpret a pitch entity, reading further tokens in the case of a
/// parenthesized pitch group. Rests report the empty pitch set.
fn pitch_entity<R: Read>(tok: &mut Tokenizer<R>, vm: &mut Vm, first: &Token) -> LibResult<()> {
    let mut pset = PitchSet::new();
    let mut line = first.line;
    match first.first() {
        'R' | 'r' => {}
        '(' => {
            let mut depth: i32 = 1;
            while depth > 0 {
                let token = tok.next_token()?;
                line = token.line;
                match token.first() {
                    '(' => {
                        depth = depth
                            .checked_add(1)
                            .ok_or(NoirError::TooDeep)
                            .map_err(at(line))?;
                    }
                    ')' => {
                        depth -= 1;
                    }
                    'R' | 'r' => {}
                    c if is_pitch_letter(c) => {
                        pset.add(decode_pitch(&token.text).map_err(at(line))?);
                    }
                    _ => return Err(at(line)(NoirError::Unclosed)),
                }
            }
        }
        _ => {
            pset.add(decode_pitch(&first.text).map_err(at(line))?);
        }
    }
    vm.pset(pset).map_err(at(line))
}

/// Interpret a duration entity, reading further tokens in the case of a
/// bracketed rhythm group. A group reports the checked sum of its members;
/// grace notes may not appear inside a group.
fn dur_entity<R: Read>(tok: &mut Tokenizer<R>, vm: &mut Vm, first: &Token) -> LibResult<()> {
    let mut line = first.line;
    let dur;
    if first.first() == '[' {
        let mut total: i32 = 0;
        let mut depth: i32 = 1;
        while depth > 0 {
            let token = tok.next_token()?;
            line = token.line;
            match token.first() {
                '[' => {
                    depth = depth
                        .checked_add(1)
                        .ok_or(NoirError::TooDeep)
                        .map_err(at(line))?;
                }
                ']' => {
                    depth -= 1;
                }
                c if c.is_ascii_digit() => {
                    let d = decode_dur(&token.text).map_err(at(line))?;
                    if d == 0 {
                        return Err(at(line)(NoirError::GraceInGroup));
                    }
                    total = total
                        .checked_add(d)
                        .ok_or(NoirError::LongDur)
                        .map_err(at(line))?;
                }
                _ => return Err(at(line)(NoirError::Unclosed)),
            }
        }
        dur = total;
    } else {
        dur = decode_dur(&first.text).map_err(at(line))?;
    }
    vm.dur(dur).map_err(at(line))
}

fn is_pitch_letter(c: char) -> bool {
    ('a'..='g').contains(&c) || ('A'..='G').contains(&c)
}

/// Decode a single pitch token into semitones from middle C. The first
/// letter selects the base pitch; accidentals and register marks adjust it.
fn decode_pitch(text: &str) -> Result<i32, NoirError> {
    let mut chars = text.chars();
    let mut pitch: i32 = match chars.next() {
        Some('C') => -12,
        Some('D') => -10,
        Some('E') => -8,
        Some('F') => -7,
        Some('G') => -5,
        Some('A') => -3,
        Some('B') => -1,
        Some('c') => 0,
        Some('d') => 2,
        Some('e') => 4,
        Some('f') => 5,
        Some('g') => 7,
        Some('a') => 9,
        Some('b') => 11,
        _ => return Err(NoirError::BadPitch),
    };
    for c in chars {
        let adjust = match c.to_ascii_lowercase() {
            'x' => 2,
            's' => 1,
            'n' => 0,
            'h' => -1,
            't' => -2,
            '\'' => 12,
            ',' => -12,
            _ => return Err(NoirError::BadPitch),
        };
        pitch = pitch.checked_add(adjust).ok_or(NoirError::PitchRange)?;
    }
    if !(MIN_PITCH..=MAX_PITCH).contains(&pitch) {
        return Err(NoirError::PitchRange);
    }
    Ok(pitch)
}

/// Decode a single rhythm token into a quanta count, zero meaning an
/// unmeasured grace note.
fn decode_dur(text: &str) -> Result<i32, NoirError> {
    let mut chars = text.chars();
    let digit = chars.next().ok_or(NoirError::BadDur)?;
    let base = base_quanta(digit).ok_or(NoirError::BadDur)?;
    match chars.next() {
        None => Ok(base),
        Some(_) if base == 0 => Err(NoirError::BadDur),
        Some(suffix) => apply_suffix(base, suffix).ok_or(NoirError::BadDur),
    }
}

/// Dispatch an operation token to the virtual machine.
fn op(vm: &mut Vm, token: &Token) -> LibResult<()> {
    let line = token.line;
    let text = token.text.as_str();
    let result = match token.first() {
        '/' => vm.repeat(),
        '$' => vm.section(),
        '@' => vm.section_return(),
        '{' => vm.push_loc(),
        ':' => vm.return_loc(),
        '}' => vm.pop_loc(),
        '=' => vm.pop_trans(),
        '~' => vm.pop_art(),
        '-' => vm.pop_layer(),
        '\\' => int_param(text).and_then(|v| vm.multiple(v)),
        '^' => int_param(text).and_then(|v| vm.push_trans(v)),
        '&' => int_param(text).and_then(|v| vm.set_base_layer(v)),
        '+' => int_param(text).and_then(|v| vm.push_layer(v)),
        '`' => int_param(text).and_then(|v| vm.cue(v)),
        '*' => key_param(text).and_then(|k| vm.imm_art(k)),
        '!' => key_param(text).and_then(|k| vm.push_art(k)),
        _ => Err(NoirError::BadOp),
    };
    result.map_err(at(line))
}

/// Extract the signed integer from a parametric operation token: the
/// operation character, an optional sign, at least one decimal digit, and
/// the terminating semicolon.
fn int_param(text: &str) -> Result<i32, NoirError> {
    let body = &text[1..];
    let body = body.strip_suffix(';').ok_or(NoirError::BadOp)?;
    let (neg, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body.strip_prefix('+').unwrap_or(body)),
    };
    if digits.is_empty() {
        return Err(NoirError::BadOp);
    }
    let mut result: i32 = 0;
    for c in digits.chars() {
        let d = c.to_digit(10).ok_or(NoirError::BadOp)? as i32;
        result = result
            .checked_mul(10)
            .and_then(|r| r.checked_add(d))
            .ok_or(NoirError::BadOp)?;
    }
    Ok(if neg { -result } else { result })
}

/// Decode the articulation key of a key operation token: `0`-`9` map to
/// 0-9, `A`-`Z` to 10-35, `a`-`z` to 36-61.
fn key_param(text: &str) -> Result<i32, NoirError> {
    let mut chars = text.chars();
    chars.next();
    let key = chars.next().ok_or(NoirError::BadOp)?;
    if chars.next().is_some() {
        return Err(NoirError::BadOp);
    }
    match key {
        '0'..='9' => Ok(key as i32 - '0' as i32),
        'A'..='Z' => Ok(key as i32 - 'A' as i32 + 10),
        'a'..='z' => Ok(key as i32 - 'a' as i32 + 36),
        _ => Err(NoirError::BadOp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_decoding() {
        assert_eq!(0, decode_pitch("c").unwrap());
        assert_eq!(-12, decode_pitch("C").unwrap());
        assert_eq!(1, decode_pitch("cs").unwrap());
        assert_eq!(2, decode_pitch("cx").unwrap());
        assert_eq!(-1, decode_pitch("ch").unwrap());
        assert_eq!(-2, decode_pitch("ct").unwrap());
        assert_eq!(0, decode_pitch("cn").unwrap());
        assert_eq!(12, decode_pitch("c'").unwrap());
        assert_eq!(-24, decode_pitch("C,").unwrap());
        assert_eq!(23, decode_pitch("b'").unwrap());
        // case-insensitive modifiers
        assert_eq!(1, decode_pitch("cS").unwrap());
        assert_eq!(NoirError::PitchRange, decode_pitch("c'''''").unwrap_err());
        assert_eq!(NoirError::PitchRange, decode_pitch("C,,,").unwrap_err());
        assert_eq!(NoirError::BadPitch, decode_pitch("q").unwrap_err());
    }

    #[test]
    fn pitch_range_edges() {
        // the extremes of the 88-key range are reachable
        assert_eq!(-39, decode_pitch("A,,,").unwrap());
        assert_eq!(48, decode_pitch("c''''").unwrap());
        assert_eq!(NoirError::PitchRange, decode_pitch("A,,,h").unwrap_err());
        assert_eq!(NoirError::PitchRange, decode_pitch("c''''s").unwrap_err());
    }

    #[test]
    fn dur_decoding() {
        assert_eq!(0, decode_dur("0").unwrap());
        assert_eq!(96, decode_dur("5").unwrap());
        assert_eq!(192, decode_dur("5'").unwrap());
        assert_eq!(144, decode_dur("5.").unwrap());
        assert_eq!(48, decode_dur("5,").unwrap());
        assert_eq!(32, decode_dur("8").unwrap());
        assert_eq!(NoirError::BadDur, decode_dur("0'").unwrap_err());
    }

    #[test]
    fn int_params() {
        assert_eq!(4, int_param("\\4;").unwrap());
        assert_eq!(-12, int_param("^-12;").unwrap());
        assert_eq!(12, int_param("^+12;").unwrap());
        assert_eq!(NoirError::BadOp, int_param("^;").unwrap_err());
        assert_eq!(NoirError::BadOp, int_param("^+;").unwrap_err());
        assert_eq!(NoirError::BadOp, int_param("^1x2;").unwrap_err());
        assert_eq!(NoirError::BadOp, int_param("^99999999999;").unwrap_err());
    }

    #[test]
    fn key_params() {
        assert_eq!(0, key_param("*0").unwrap());
        assert_eq!(9, key_param("!9").unwrap());
        assert_eq!(10, key_param("*A").unwrap());
        assert_eq!(35, key_param("*Z").unwrap());
        assert_eq!(36, key_param("*a").unwrap());
        assert_eq!(61, key_param("*z").unwrap());
        assert_eq!(NoirError::BadOp, key_param("*%").unwrap_err());
    }
}
