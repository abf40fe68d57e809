//! Convert a dynamics-encoding NMF file into Retro synthesizer layer
//! graphs.
//!
//! Syntax: `nmfgraph [gamma]` where the optional `gamma` is an integer
//! greater than zero holding the gamma value multiplied by 1000, so 1000
//! means a gamma of 1.0. The fixed-rate NMF file is read from standard
//! input and the layer blocks are written to standard output.

use nmf_file::graph::GraphBuilder;
use nmf_file::NmfFile;
use std::io::Write;

fn main() -> ! {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() > 1 {
        eprintln!("nmfgraph: Wrong number of parameters!");
        std::process::exit(1);
    }

    let mut gamma = 1.0;
    if let Some(arg) = args.first() {
        let g = match arg.parse::<i32>() {
            Ok(g) => g,
            Err(_) => {
                eprintln!("nmfgraph: Can't parse argument as integer!");
                std::process::exit(1);
            }
        };
        if g < 1 {
            eprintln!("nmfgraph: Gamma value out of range!");
            std::process::exit(1);
        }
        if g != 1000 {
            gamma = g as f64 / 1000.0;
        }
    }

    let stdin = std::io::stdin();
    let mut file = match NmfFile::read(stdin.lock()) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("nmfgraph: Can't parse input as NMF!");
            std::process::exit(1);
        }
    };
    if !file.basis().is_fixed_rate() {
        eprintln!("nmfgraph: NMF file has wrong basis!");
        std::process::exit(1);
    }
    file.sort();

    let mut builder = GraphBuilder::new(gamma);
    for note in file.notes() {
        if let Err(e) = builder.add(note) {
            eprintln!("nmfgraph: {}!", e);
            std::process::exit(1);
        }
    }

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    match builder.write(&mut out) {
        Ok(()) => {
            if out.flush().is_err() {
                eprintln!("nmfgraph: I/O error writing output!");
                std::process::exit(1);
            }
            std::process::exit(0)
        }
        Err(e) => {
            eprintln!("nmfgraph: {}!", e);
            std::process::exit(1)
        }
    }
}
