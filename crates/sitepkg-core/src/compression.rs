//! Whole-stream compression applied between archiving and sealing.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use flate2::Compression as GzLevel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Supported codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Zstandard, default level.
    Zstd,
    /// Gzip, default level.
    Gzip,
}

impl Compression {
    /// Start compressing into `writer`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the encoder cannot be initialised.
    pub fn encoder<W: Write>(self, writer: W) -> io::Result<Encoder<W>> {
        Ok(match self {
            Self::Zstd => Encoder::Zstd(zstd::stream::write::Encoder::new(writer, 0)?),
            Self::Gzip => Encoder::Gzip(GzEncoder::new(writer, GzLevel::default())),
        })
    }

    /// Wrap `reader` in the matching decoder.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the decoder cannot be initialised.
    pub fn decoder<'a, R: Read + 'a>(self, reader: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
            Self::Gzip => Box::new(GzDecoder::new(reader)),
        })
    }

    /// Compress a whole buffer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the codec.
    pub fn compress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = self.encoder(Vec::new())?;
        encoder.write_all(data)?;
        encoder.finish()
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zstd => "zstd",
            Self::Gzip => "gzip",
        })
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" | "zst" => Ok(Self::Zstd),
            "gzip" | "gz" => Ok(Self::Gzip),
            other => Err(format!("unknown compression: {other} (expected zstd or gzip)")),
        }
    }
}

/// Streaming encoder for any [`Compression`].
pub enum Encoder<W: Write> {
    /// Zstandard stream.
    Zstd(zstd::stream::write::Encoder<'static, W>),
    /// Gzip stream.
    Gzip(GzEncoder<W>),
}

impl<W: Write> fmt::Debug for Encoder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codec = match self {
            Self::Zstd(_) => Compression::Zstd,
            Self::Gzip(_) => Compression::Gzip,
        };
        f.debug_tuple("Encoder").field(&codec).finish()
    }
}

impl<W: Write> Encoder<W> {
    /// Write the codec trailer and return the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the codec or the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Zstd(e) => e.finish(),
            Self::Gzip(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Zstd(e) => e.write(buf),
            Self::Gzip(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Zstd(e) => e.flush(),
            Self::Gzip(e) => e.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decompress(c: Compression, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        c.decoder(data).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_parse() {
        assert_eq!("zstd".parse::<Compression>().unwrap(), Compression::Zstd);
        assert_eq!("ZST".parse::<Compression>().unwrap(), Compression::Zstd);
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("gz".parse::<Compression>().unwrap(), Compression::Gzip);
        assert!("lz4".parse::<Compression>().is_err());
        assert_eq!(Compression::Gzip.to_string(), "gzip");
    }

    #[test]
    fn test_codecs_shrink_and_restore() {
        let data = b"site package ".repeat(1000);
        for c in [Compression::Zstd, Compression::Gzip] {
            let packed = c.compress(&data).unwrap();
            assert!(packed.len() < data.len(), "{c}");
            assert_eq!(decompress(c, &packed), data, "{c}");
        }
    }

    #[test]
    fn test_zstd_magic() {
        let packed = Compression::Zstd.compress(b"x").unwrap();
        assert_eq!(&packed[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
        let packed = Compression::Gzip.compress(b"x").unwrap();
        assert_eq!(&packed[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_garbage_fails() {
        let mut out = Vec::new();
        let res = Compression::Zstd
            .decoder(&b"definitely not zstd"[..])
            .and_then(|mut d| d.read_to_end(&mut out));
        assert!(res.is_err());
    }
}
