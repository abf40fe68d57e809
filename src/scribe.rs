use crate::error::LibResult;
use crate::file::biased::{encode_i16, encode_i32};
use snafu::ResultExt;
use std::io::Write;

/// A wrapper for any `Write` which provides the big-endian primitives of the
/// NMF wire format.
pub(crate) struct Scribe<W: Write> {
    w: W,
}

impl<W: Write> Write for Scribe<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.w.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.w.flush()
    }
}

impl<W: Write> Scribe<W> {
    pub(crate) fn new(w: W) -> Self {
        Self { w }
    }

    pub(crate) fn write_u16(&mut self, value: u16) -> LibResult<()> {
        self.w.write_all(&value.to_be_bytes()).context(wr!())
    }

    pub(crate) fn write_u32(&mut self, value: u32) -> LibResult<()> {
        self.w.write_all(&value.to_be_bytes()).context(wr!())
    }

    /// Write a signed 32-bit value with the +2^31 bias applied.
    pub(crate) fn write_bias_i32(&mut self, value: i32) -> LibResult<()> {
        let raw = encode_i32(value).context(crate::error::NmfSnafu { site: site!() })?;
        self.write_u32(raw)
    }

    /// Write a signed 16-bit value with the +2^15 bias applied.
    pub(crate) fn write_bias_i16(&mut self, value: i16) -> LibResult<()> {
        let raw = encode_i16(value).context(crate::error::NmfSnafu { site: site!() })?;
        self.write_u16(raw)
    }
}

#[test]
fn scribe_test() {
    let mut bytes = Vec::new();
    {
        let mut scribe = Scribe::new(&mut bytes);
        scribe.write_u32(0x01020304).unwrap();
        scribe.write_u16(0x0506).unwrap();
        scribe.write_bias_i32(-1).unwrap();
        scribe.write_bias_i16(0).unwrap();
    }
    assert_eq!(
        bytes,
        vec![1, 2, 3, 4, 5, 6, 0x7f, 0xff, 0xff, 0xff, 0x80, 0x00]
    );
}
