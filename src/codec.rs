use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use std::io;

/// Spare capacity reserved in the output buffer before each deflate call.
const OUTPUT_RESERVE: usize = 8 * 1024;

/// Fixed gzip member header: magic, CM=deflate, no flags, no mtime, XFL=0, OS=unknown.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];

/// Supported content codings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Gzip (RFC 1952).
    Gzip,
    /// Deflate in zlib framing (RFC 1950), as HTTP defines it.
    Deflate,
}

impl Codec {
    /// Returns the Content-Encoding header value for this codec.
    pub fn content_encoding(&self) -> &'static str {
        match self {
            Codec::Gzip => "gzip",
            Codec::Deflate => "deflate",
        }
    }

    /// Reports whether an `Accept-Encoding` value admits this codec.
    ///
    /// The header is a comma-separated list with optional quality values
    /// (e.g. `"gzip, deflate;q=0.5"`). An entry with `q=0` refuses the coding.
    pub fn accepted_by(&self, header: &str) -> bool {
        header.split(',').any(|part| {
            let (encoding, quality) = parse_encoding_with_quality(part.trim());
            quality > 0.0 && self.matches(encoding)
        })
    }

    fn matches(&self, encoding: &str) -> bool {
        match self {
            Codec::Gzip => {
                encoding.eq_ignore_ascii_case("gzip") || encoding.eq_ignore_ascii_case("x-gzip")
            }
            Codec::Deflate => encoding.eq_ignore_ascii_case("deflate"),
        }
    }
}

/// Parses an encoding entry like "gzip" or "br;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.splitn(2, ';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .next()
        .and_then(|q| {
            let q = q.trim();
            q.strip_prefix("q=")
                .or_else(|| q.strip_prefix("Q="))
                .and_then(|v| v.trim().parse::<f32>().ok())
        })
        .unwrap_or(1.0);

    (encoding, quality)
}

/// Validates a configured level: `-1` selects the codec default, `0..=9` is explicit.
pub fn compression_level(level: i32) -> crate::Result<Compression> {
    match level {
        -1 => Ok(Compression::default()),
        0..=9 => Ok(Compression::new(level as u32)),
        other => Err(crate::Error::InvalidCompressionLevel(other)),
    }
}

/// A resettable streaming encoder for one [`Codec`].
///
/// Output is appended to a caller-supplied buffer, so the encoder holds no
/// reference to any response between calls. `reset` returns it to a pristine
/// state, ready to start a new stream.
pub struct Encoder {
    codec: Codec,
    compress: Compress,
    crc: Crc,
    started: bool,
}

impl Encoder {
    pub(crate) fn new(codec: Codec, level: Compression) -> Self {
        Self {
            codec,
            compress: Compress::new(level, codec == Codec::Deflate),
            crc: Crc::new(),
            started: false,
        }
    }

    pub(crate) fn codec(&self) -> Codec {
        self.codec
    }

    /// Compresses `input`, appending whatever output is ready to `out`.
    pub(crate) fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        self.start(out);
        if self.codec == Codec::Gzip {
            self.crc.update(input);
        }
        self.run(input, out, FlushCompress::None)
    }

    /// Emits all pending input as complete deflate blocks without ending the stream.
    pub(crate) fn flush(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.start(out);
        self.run(&[], out, FlushCompress::Sync)
    }

    /// Ends the stream, writing the gzip trailer when applicable.
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.start(out);
        self.run(&[], out, FlushCompress::Finish)?;
        if self.codec == Codec::Gzip {
            out.extend_from_slice(&self.crc.sum().to_le_bytes());
            out.extend_from_slice(&self.crc.amount().to_le_bytes());
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.compress.reset();
        self.crc.reset();
        self.started = false;
    }

    fn start(&mut self, out: &mut Vec<u8>) {
        if !self.started {
            if self.codec == Codec::Gzip {
                out.extend_from_slice(&GZIP_HEADER);
            }
            self.started = true;
        }
    }

    fn run(&mut self, mut input: &[u8], out: &mut Vec<u8>, flush: FlushCompress) -> io::Result<()> {
        loop {
            out.reserve(OUTPUT_RESERVE);
            let before = self.compress.total_in();
            let status = self
                .compress
                .compress_vec(input, out, flush)
                .map_err(io::Error::other)?;
            let consumed = (self.compress.total_in() - before) as usize;
            input = &input[consumed..];

            let done = match flush {
                FlushCompress::Finish => status == Status::StreamEnd,
                // Spare capacity left over means deflate had nothing more to emit.
                _ => input.is_empty() && out.len() < out.capacity(),
            };
            if done {
                return Ok(());
            }
        }
    }
}
