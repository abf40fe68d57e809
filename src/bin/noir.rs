//! The Noir compiler driver: Noir notation text on standard input, a
//! serialized NMF file on standard output.

use std::io::Write;

fn main() -> ! {
    if std::env::args().count() > 1 {
        eprintln!("noir: Not expecting arguments!");
        std::process::exit(1);
    }
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut output = std::io::BufWriter::new(stdout.lock());
    match nmf_file::compile(stdin.lock(), &mut output) {
        Ok(()) => {
            if output.flush().is_err() {
                eprintln!("noir: I/O error writing output!");
                std::process::exit(1);
            }
            std::process::exit(0)
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1)
        }
    }
}
