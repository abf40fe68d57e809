//! Convert a 96 quanta per quarter NMF file to a fixed-rate basis using a
//! single constant tempo.
//!
//! Syntax: `nmfrate srate tempo qbeat` where `srate` is 44100 or 48000,
//! `tempo` is in beats per ten minutes, and `qbeat` is the number of
//! quanta in a beat.

use nmf_file::NmfFile;
use std::io::Write;

fn parse_arg(text: &str) -> Option<i32> {
    text.parse::<i32>().ok()
}

fn main() -> ! {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 3 {
        eprintln!("nmfrate: Wrong number of parameters!");
        std::process::exit(1);
    }

    let srate = match parse_arg(&args[0]) {
        Some(v) => v,
        None => {
            eprintln!("nmfrate: Can't parse srate parameter!");
            std::process::exit(1);
        }
    };
    let tempo = match parse_arg(&args[1]) {
        Some(v) => v,
        None => {
            eprintln!("nmfrate: Can't parse tempo parameter!");
            std::process::exit(1);
        }
    };
    let qbeat = match parse_arg(&args[2]) {
        Some(v) => v,
        None => {
            eprintln!("nmfrate: Can't parse qbeat parameter!");
            std::process::exit(1);
        }
    };

    if srate != 48000 && srate != 44100 {
        eprintln!("nmfrate: Invalid sampling rate!");
        std::process::exit(1);
    }
    if tempo < 1 {
        eprintln!("nmfrate: Invalid tempo!");
        std::process::exit(1);
    }
    if qbeat < 1 {
        eprintln!("nmfrate: Invalid beat!");
        std::process::exit(1);
    }

    let stdin = std::io::stdin();
    let input = match NmfFile::read(stdin.lock()) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("nmfrate: Can't parse input as NMF!");
            std::process::exit(1);
        }
    };

    let output = match nmf_file::rate::resample(&input, srate, tempo, qbeat) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("nmfrate: {}!", e);
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    if output.write(&mut out).is_err() || out.flush().is_err() {
        eprintln!("nmfrate: I/O error writing output!");
        std::process::exit(1);
    }
    std::process::exit(0)
}
