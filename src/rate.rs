/*!
The `rate` module applies a single constant tempo to a 96 quanta per
quarter NMF file, producing a fixed-rate file. It is the one-node special
case of the tempo map.
!*/

use crate::core::QuantumBasis;
use crate::error::{ComputationSnafu, LibResult, WrongBasisSnafu};
use crate::file::NmfFile;
use log::debug;

/// Scale a floating point quanta product into the 32-bit range.
fn scaled(value: f64, floor: i32) -> LibResult<i32> {
    if !value.is_finite() || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return ComputationSnafu { site: site!() }.fail();
    }
    Ok((value as i32).max(floor))
}

/// Convert a Q96 NMF file to a fixed-rate basis at a constant tempo.
///
/// `srate` must be 44100 or 48000. `tempo` is in beats per ten minutes and
/// `qbeat` is the number of quanta in a beat; both must be at least one.
/// Section offsets and note times scale by the quantum duration; measured
/// durations scale with a minimum of one quantum; grace offsets and zero
/// durations pass through unchanged.
pub fn resample(input: &NmfFile, srate: i32, tempo: i32, qbeat: i32) -> crate::Result<NmfFile> {
    assert!(tempo >= 1, "tempo out of range");
    assert!(qbeat >= 1, "qbeat out of range");
    let basis = QuantumBasis::for_rate(srate).expect("unsupported sampling rate");
    if input.basis() != QuantumBasis::Q96 {
        return Err(WrongBasisSnafu { site: site!() }.build().into());
    }

    // seconds per beat times samples per second, split over the beat
    let qdur = (600.0 / tempo as f64) * srate as f64 / qbeat as f64;
    debug!("resampling at {} samples per quantum", qdur);

    let mut output = NmfFile::new();
    output.rebase(basis);

    for i in 1..input.sections_len() {
        let offset = input.offset(i).expect("section index in range");
        let mapped = scaled(qdur * offset as f64, 0)?;
        output.push_section(mapped)?;
    }

    for note in input.notes() {
        let mut note = *note;
        note.t = scaled(qdur * note.t as f64, 0)?;
        if note.dur > 0 {
            note.dur = scaled(qdur * note.dur as f64, 1)?;
        }
        output.push_note(note)?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NmfNote;

    fn q96_input() -> NmfFile {
        let mut input = NmfFile::new();
        input.push_section(96).unwrap();
        input
            .push_note(NmfNote {
                t: 0,
                dur: 96,
                ..Default::default()
            })
            .unwrap();
        input
            .push_note(NmfNote {
                t: 96,
                dur: -2,
                sect: 1,
                ..Default::default()
            })
            .unwrap();
        input
    }

    #[test]
    fn quarter_notes_at_120_bpm() {
        // 120 BPM is 1200 beats per ten minutes; a 96-quantum beat lasts
        // half a second, which is 24000 samples at 48 kHz
        let output = resample(&q96_input(), 48000, 1200, 96).unwrap();
        assert_eq!(QuantumBasis::F48000, output.basis());
        assert_eq!(Some(24000), output.offset(1));
        assert_eq!(24000, output.note(0).unwrap().dur);
        assert_eq!(24000, output.note(1).unwrap().t);
    }

    #[test]
    fn grace_offsets_pass_through() {
        let output = resample(&q96_input(), 44100, 1200, 96).unwrap();
        assert_eq!(QuantumBasis::F44100, output.basis());
        assert_eq!(-2, output.note(1).unwrap().dur);
    }

    #[test]
    fn tiny_measured_durations_round_up_to_one() {
        let mut input = NmfFile::new();
        input
            .push_note(NmfNote {
                t: 0,
                dur: 1,
                ..Default::default()
            })
            .unwrap();
        // an absurdly fast tempo scales one quantum below one sample
        let output = resample(&input, 44100, 2_000_000, 96).unwrap();
        assert_eq!(1, output.note(0).unwrap().dur);
    }

    #[test]
    fn fixed_rate_input_is_rejected() {
        let mut input = q96_input();
        input.rebase(QuantumBasis::F48000);
        assert!(resample(&input, 48000, 1200, 96).is_err());
    }
}
