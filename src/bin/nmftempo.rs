//! Convert a 96 quanta per quarter NMF file into a fixed-rate NMF file
//! according to a tempo map.
//!
//! Syntax: `nmftempo map srate` where `map` is the path to a
//! `%noir-tempo;` script and `srate` is 44100 or 48000. If only a single
//! constant tempo is needed, `nmfrate` is the easier method; `nmftempo`
//! allows multiple tempi and gradual tempo changes.

use nmf_file::tempo::TempoMap;
use nmf_file::{NmfFile, QuantumBasis};
use std::io::Write;

fn main() -> ! {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 2 {
        eprintln!("nmftempo: Wrong number of parameters!");
        std::process::exit(1);
    }

    let srate = match args[1].parse::<i32>() {
        Ok(v) if v == 44100 || v == 48000 => v,
        Ok(_) => {
            eprintln!("nmftempo: Invalid sampling rate!");
            std::process::exit(1);
        }
        Err(_) => {
            eprintln!("nmftempo: Can't parse srate parameter!");
            std::process::exit(1);
        }
    };

    let stdin = std::io::stdin();
    let input = match NmfFile::read(stdin.lock()) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("nmftempo: Error parsing input NMF!");
            std::process::exit(1);
        }
    };
    if input.basis() != QuantumBasis::Q96 {
        eprintln!("nmftempo: Input NMF has wrong quantum basis!");
        std::process::exit(1);
    }

    let map_file = match std::fs::File::open(&args[0]) {
        Ok(f) => f,
        Err(_) => {
            eprintln!("nmftempo: Can't open tempo map file!");
            std::process::exit(1);
        }
    };
    let map = match TempoMap::parse(std::io::BufReader::new(map_file), srate, &input) {
        Ok(map) => map,
        Err(e) => {
            eprintln!("nmftempo: {}!", e);
            std::process::exit(1);
        }
    };

    let output = match map.apply(&input) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("nmftempo: {}!", e);
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    if output.write(&mut out).is_err() || out.flush().is_err() {
        eprintln!("nmftempo: I/O error writing output!");
        std::process::exit(1);
    }
    std::process::exit(0)
}
