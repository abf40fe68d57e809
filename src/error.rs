use snafu::Snafu;

/// The public Error type for this library.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

/// The public Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this library.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

/// The internal Error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum LibError {
    #[snafu(display("Error while reading bytes: {}", source))]
    Io {
        site: String,
        source: crate::byte_iter::ByteError,
    },

    #[snafu(display("Error while writing bytes: {}", source))]
    WriteFailed { site: String, source: std::io::Error },

    #[snafu(display("{}: The NMF file is invalid: {}", site, description))]
    InvalidFile { site: String, description: String },

    #[snafu(display("{}: Invalid NMF data: {}", site, source))]
    Nmf {
        site: String,
        source: crate::file::NmfError,
    },

    #[snafu(display("[Line {}] {}", line, kind.message()))]
    Compile {
        line: i32,
        kind: crate::noir::NoirError,
    },

    #[snafu(display("[Tempo map line {}] {}", line, kind.message()))]
    TempoMapAt {
        line: i32,
        kind: crate::tempo::TempoError,
    },

    #[snafu(display("[Tempo map] {}", kind.message()))]
    TempoMap { kind: crate::tempo::TempoError },

    #[snafu(display("{}", kind.message()))]
    Graph { kind: crate::graph::GraphError },

    #[snafu(display("Input NMF has the wrong quantum basis"))]
    WrongBasis { site: String },

    #[snafu(display("Numeric computation error"))]
    Computation { site: String },
}

impl LibError {
    /// The one-based input line an error was raised at, for errors that
    /// carry one.
    pub(crate) fn line(&self) -> Option<i32> {
        match self {
            LibError::Compile { line, .. } | LibError::TempoMapAt { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl Error {
    /// The one-based input line the error was raised at, if the error came
    /// from a line-oriented source file.
    pub fn line(&self) -> Option<i32> {
        self.0.line()
    }
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! io {
    () => {
        crate::error::IoSnafu { site: site!() }
    };
}

macro_rules! wr {
    () => {
        crate::error::WriteFailedSnafu { site: site!() }
    };
}

macro_rules! invalid_file_s {
    () => {
        crate::error::InvalidFileSnafu {
            site: site!(),
            description: "[no description]",
        }
    };
    ($msg:expr) => {
        crate::error::InvalidFileSnafu {
            site: site!(),
            description: $msg,
        }
    };
    ($fmt:expr, $($arg:expr),+) => {
        crate::error::InvalidFileSnafu {
            site: site!(),
            description: format!($fmt, $($arg),+),
        }
    };
}

macro_rules! invalid_file_e {
    () => {
        invalid_file_s!().build()
    };
    ($msg:expr) => {
        invalid_file_s!($msg).build()
    };
    ($fmt:expr, $($arg:expr),+) => {
        invalid_file_s!($fmt, $($arg),+).build()
    };
}

macro_rules! invalid_file_r {
    () => {
        Err(invalid_file_e!())
    };
    ($msg:expr) => {
        Err(invalid_file_e!($msg))
    };
    ($fmt:expr, $($arg:expr),+) => {
        Err(invalid_file_e!($fmt, $($arg),+))
    };
}

macro_rules! invalid_file {
    () => {
        return invalid_file_r!();
    };
    ($msg:expr) => {
        return invalid_file_r!($msg)
    };
    ($fmt:expr, $($arg:expr),+) => {
        return invalid_file_r!($fmt, $($arg),+)
    };
}

#[test]
fn site_test() {
    let line = line!() + 1;
    let site = site!();
    assert!(site.contains("error.rs"));
    assert!(site.contains(format!("{}", line).as_str()));
}

#[test]
fn invalid_file_macros_test_no_message() {
    fn foo() -> LibResult<u64> {
        invalid_file!();
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("The NMF file is invalid"));
}

#[test]
fn invalid_file_macros_test_fmt() {
    fn foo() -> LibResult<u64> {
        invalid_file!("hello {}, {}", "world", String::from("foo"));
    }
    let result = foo();
    assert!(result.is_err());
    let message = format!("{}", result.err().unwrap());
    assert!(message.as_str().contains("hello world, foo"));
}

#[test]
fn compile_error_line_test() {
    let e = Error(LibError::Compile {
        line: 12,
        kind: crate::noir::NoirError::BadPitch,
    });
    assert_eq!(Some(12), e.line());
    let message = format!("{}", e);
    assert!(message.starts_with("[Line 12]"));
}
