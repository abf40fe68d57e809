mod utils;

use nmf_file::{NmfFile, NmfNote, QuantumBasis};
use tempfile::TempDir;
use utils::enable_logging;

/// Build the reference file: three sections, one note per layer shape,
/// layers given one-based in the comments.
fn reference_file() -> NmfFile {
    let mut file = NmfFile::new();
    file.rebase(QuantumBasis::F48000);
    file.push_section(24000).unwrap();
    file.push_section(48000).unwrap();
    // (t, dur, pitch, art, sect, layer 1) and friends
    file.push_note(NmfNote {
        t: 0,
        dur: 48,
        pitch: 0,
        art: 0,
        sect: 0,
        layer_i: 0,
    })
    .unwrap();
    file.push_note(NmfNote {
        t: 24000,
        dur: 48,
        pitch: 7,
        art: 0,
        sect: 1,
        layer_i: 0,
    })
    .unwrap();
    file.push_note(NmfNote {
        t: 47999,
        dur: 1,
        pitch: -1,
        art: 0,
        sect: 1,
        layer_i: 1,
    })
    .unwrap();
    file
}

#[test]
fn serialize_parse_serialize_is_byte_identical() {
    enable_logging();
    let file = reference_file();
    let mut first = Vec::new();
    file.write(&mut first).unwrap();

    let reparsed = NmfFile::read(first.as_slice()).unwrap();
    let mut second = Vec::new();
    reparsed.write(&mut second).unwrap();

    assert_eq!(first, second);
    assert_eq!(file, reparsed);
}

#[test]
fn save_load_round_trip() {
    enable_logging();
    let td = TempDir::new().unwrap();
    let path = td.path().join("reference.nmf");
    let file = reference_file();
    file.save(&path).unwrap();
    let loaded = NmfFile::load(&path).unwrap();
    assert_eq!(file, loaded);
}

#[test]
fn wire_layout_is_bit_exact() {
    enable_logging();
    let mut file = NmfFile::new();
    file.push_note(NmfNote {
        t: 0,
        dur: -1,
        pitch: -39,
        art: 61,
        sect: 0,
        layer_i: 65535,
    })
    .unwrap();
    let mut bytes = Vec::new();
    file.write(&mut bytes).unwrap();

    let expected: Vec<u8> = vec![
        0x72, 0xED, 0xF0, 0x78, // primary signature 1928196216
        0x4E, 0x4F, 0x49, 0x2E, // secondary signature "NOI."
        0x00, 0x00, // basis Q96
        0x00, 0x01, // one section
        0x00, 0x00, 0x00, 0x01, // one note
        0x00, 0x00, 0x00, 0x00, // section offset zero
        0x00, 0x00, 0x00, 0x00, // t = 0
        0x7F, 0xFF, 0xFF, 0xFF, // dur = -1 biased
        0x7F, 0xD9, // pitch = -39 biased
        0x00, 0x3D, // art = 61
        0x00, 0x00, // sect = 0
        0xFF, 0xFF, // layer_i = 65535
    ];
    assert_eq!(expected, bytes);
}

#[test]
fn sorted_grace_cue_measured_ordering() {
    enable_logging();
    let mut file = NmfFile::new();
    file.push_note(NmfNote {
        t: 100,
        dur: 96,
        ..Default::default()
    })
    .unwrap();
    file.push_note(NmfNote::cue(100, 0, 7)).unwrap();
    file.push_note(NmfNote {
        t: 100,
        dur: -1,
        ..Default::default()
    })
    .unwrap();
    file.push_note(NmfNote {
        t: 100,
        dur: -2,
        ..Default::default()
    })
    .unwrap();
    file.sort();
    let durs: Vec<i32> = file.notes().map(|n| n.dur).collect();
    assert_eq!(vec![-2, -1, 0, 96], durs);

    // every note sits at or after its section offset
    for n in file.notes() {
        assert!(n.t >= file.offset(n.sect as usize).unwrap());
    }
}

#[test]
fn truncated_and_corrupt_files_fail_to_parse() {
    enable_logging();
    let mut bytes = Vec::new();
    reference_file().write(&mut bytes).unwrap();

    for cut in [0, 4, 9, 15, 21, bytes.len() - 1] {
        let mut t = bytes.clone();
        t.truncate(cut);
        assert!(NmfFile::read(t.as_slice()).is_err(), "cut at {}", cut);
    }

    // basis word out of range
    let mut t = bytes.clone();
    t[9] = 9;
    assert!(NmfFile::read(t.as_slice()).is_err());

    // zero note count
    let mut t = bytes.clone();
    for b in &mut t[12..16] {
        *b = 0;
    }
    assert!(NmfFile::read(t.as_slice()).is_err());
}

#[test]
fn cue_survives_the_wire() {
    enable_logging();
    let mut file = NmfFile::new();
    file.push_note(NmfNote::cue(10, 0, 4_000_000)).unwrap();
    let mut bytes = Vec::new();
    file.write(&mut bytes).unwrap();
    let reparsed = NmfFile::read(bytes.as_slice()).unwrap();
    let cue = reparsed.note(0).unwrap();
    assert!(cue.is_cue());
    assert_eq!(4_000_000, cue.cue_num());
}
