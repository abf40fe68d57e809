//! Open a fixed-rate NMF file, sort its notes, and output a series of
//! Retro synthesizer note events, always using instrument one and layer
//! one. Grace notes and zero-duration events are skipped.

use nmf_file::NmfFile;
use std::io::Write;

fn main() -> ! {
    if std::env::args().count() > 1 {
        eprintln!("nmfsimple: Not expecting arguments!");
        std::process::exit(1);
    }

    let stdin = std::io::stdin();
    let mut file = match NmfFile::read(stdin.lock()) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("nmfsimple: A valid NMF file could not be read!");
            std::process::exit(1);
        }
    };
    if !file.basis().is_fixed_rate() {
        eprintln!("nmfsimple: Input must have fixed-rate basis!");
        std::process::exit(1);
    }
    file.sort();

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    for n in file.notes() {
        if n.dur < 1 {
            continue;
        }
        if writeln!(out, "{} {} {} 1 1 n", n.t, n.dur, n.pitch).is_err() {
            eprintln!("nmfsimple: I/O error writing output!");
            std::process::exit(1);
        }
    }
    if out.flush().is_err() {
        eprintln!("nmfsimple: I/O error writing output!");
        std::process::exit(1);
    }
    std::process::exit(0)
}
