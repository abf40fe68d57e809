//! Walk through an NMF file, verify it, and optionally print a textual
//! description of its data.
//!
//! `nmfwalk` reads an NMF file from standard input and dumps it; with the
//! single argument `-check` it only verifies the file.

use nmf_file::NmfFile;
use std::io::Write;

fn report<W: Write>(file: &NmfFile, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "BASIS   : {}", file.basis())?;
    writeln!(out, "SECTIONS: {}", file.sections_len())?;
    writeln!(out, "NOTES   : {}", file.notes_len())?;
    writeln!(out)?;
    for i in 0..file.sections_len() {
        writeln!(out, "SECTION {} AT {}", i, file.offset(i).unwrap_or(0))?;
    }
    writeln!(out)?;
    for n in file.notes() {
        writeln!(
            out,
            "NOTE T={} DUR={} P={} A={} S={} L={}",
            n.t,
            n.dur,
            n.pitch,
            n.art,
            n.sect,
            n.layer_i as u32 + 1
        )?;
    }
    Ok(())
}

fn main() -> ! {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let silent = match args.as_slice() {
        [] => false,
        [flag] if flag.as_str() == "-check" => true,
        [_] => {
            eprintln!("nmfwalk: Unrecognized argument!");
            std::process::exit(1);
        }
        _ => {
            eprintln!("nmfwalk: Too many arguments!");
            std::process::exit(1);
        }
    };

    let stdin = std::io::stdin();
    let file = match NmfFile::read(stdin.lock()) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("nmfwalk: A valid NMF file could not be read!");
            std::process::exit(1);
        }
    };

    if !silent {
        let stdout = std::io::stdout();
        let mut out = std::io::BufWriter::new(stdout.lock());
        if report(&file, &mut out).and_then(|_| out.flush()).is_err() {
            eprintln!("nmfwalk: I/O error writing output!");
            std::process::exit(1);
        }
    }
    std::process::exit(0)
}
