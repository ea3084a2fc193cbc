//! # Streaming Size Counters
//!
//! Each counter drains one reader and reports how many bytes came out of it,
//! either as-is or after a compression transform. Output bytes are counted by
//! [`CountingSink`] and dropped immediately, so memory use stays at the size
//! of the copy buffer plus the encoder's own window no matter how large the
//! input is.
//!
//! Counters never share a reader or an encoder: every metric gets its own pass
//! over its own stream.

use std::io::{self, BufReader, Read, Write};

use brotli::enc::BrotliEncoderParams;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::common::SizeKind;
use crate::workers::CancelFlag;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Brotli quality and window, matching the defaults of Node's zlib.
const BROTLI_QUALITY: i32 = 11;
const BROTLI_LGWIN: i32 = 22;

/// An `io::Write` that discards everything and keeps a running byte total.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingSink {
    bytes: u64,
}

impl CountingSink {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Gzip encoder writing into a [`CountingSink`], level 9 like `gzip-size`.
pub fn gzip_counter() -> GzEncoder<CountingSink> {
    GzEncoder::new(CountingSink::default(), Compression::best())
}

/// Total number of bytes the reader yields.
pub fn count_raw<R: Read>(reader: R) -> io::Result<u64> {
    let mut sink = CountingSink::default();
    io::copy(&mut buffered(reader), &mut sink)?;
    Ok(sink.bytes())
}

/// Length of the gzip stream produced from the reader's bytes.
pub fn count_gzip<R: Read>(reader: R) -> io::Result<u64> {
    let mut encoder = gzip_counter();
    io::copy(&mut buffered(reader), &mut encoder)?;
    Ok(encoder.finish()?.bytes())
}

/// Length of the brotli stream produced from the reader's bytes.
pub fn count_brotli<R: Read>(reader: R) -> io::Result<u64> {
    let mut params = BrotliEncoderParams::default();
    params.quality = BROTLI_QUALITY;
    params.lgwin = BROTLI_LGWIN;

    let mut sink = CountingSink::default();
    brotli::BrotliCompress(&mut buffered(reader), &mut sink, &params)?;
    Ok(sink.bytes())
}

/// Runs the counter that matches `kind`.
pub fn count<R: Read>(kind: SizeKind, reader: R) -> io::Result<u64> {
    match kind {
        SizeKind::Size => count_raw(reader),
        SizeKind::Gzip => count_gzip(reader),
        SizeKind::Brotli => count_brotli(reader),
    }
}

fn buffered<R: Read>(reader: R) -> BufReader<R> {
    BufReader::with_capacity(COPY_BUFFER_SIZE, reader)
}

/// Reader that fails once its [`CancelFlag`] is set, so a counter running on
/// a blocking thread stops at its next read.
pub struct Cancellable<R> {
    inner: R,
    cancel: CancelFlag,
}

impl<R: Read> Cancellable<R> {
    pub fn new(inner: R, cancel: CancelFlag) -> Self {
        Self { inner, cancel }
    }
}

impl<R: Read> Read for Cancellable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cancel.check()?;
        self.inner.read(buf)
    }
}
