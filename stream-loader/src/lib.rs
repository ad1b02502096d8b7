//! Common `EncoderSource` loader.
//!
//! Captures are stored in the `.mvr` format: a `MVR1` magic, followed by width, height and
//! framerate as little endian `u32`s. Then a sequence of records follows, each holding the buffer
//! flags (`u8`), timestamp in microseconds (`u64`), payload length (`u32`) and the payload itself.

use anyhow::{anyhow, Result};
use log::*;
use mvrec::prelude::v1::*;
use std::io::{BufReader, ErrorKind, Read, Write};

const MAGIC: &[u8; 4] = b"MVR1";

/// Create a source depending on the input.
///
/// `tcp://host:port` connects to a remote capture stream, `tcp://@:port` waits for one. Anything
/// else is opened as a file.
pub fn create_source(input: &str) -> Result<Box<dyn EncoderSource>> {
    let reader = mvrec::utils::open_input(input)?;
    let source = MvrFile::new(BufReader::new(reader))?;

    info!(
        "Opened {input}: {:?} at {:?} fps",
        source.dimensions(),
        source.framerate()
    );

    Ok(Box::new(source))
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; std::mem::size_of::<u32>()];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reader of `.mvr` captures.
pub struct MvrFile<T> {
    reader: T,
    width: usize,
    height: usize,
    framerate: u32,
}

impl<T: Read> MvrFile<T> {
    /// Parse the capture header.
    pub fn new(mut reader: T) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        if &magic != MAGIC {
            return Err(anyhow!("Not an mvr capture (magic {magic:02x?})"));
        }

        let width = read_u32(&mut reader)? as usize;
        let height = read_u32(&mut reader)? as usize;
        let framerate = read_u32(&mut reader)?;

        Ok(Self {
            reader,
            width,
            height,
            framerate,
        })
    }

    /// Read the flags byte, distinguishing a clean end of stream.
    fn read_flags(&mut self) -> Result<Option<u8>> {
        let mut flags = [0u8];

        loop {
            match self.reader.read(&mut flags) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(flags[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<T: Read + Send> EncoderSource for MvrFile<T> {
    fn next_buffer(&mut self) -> Result<Option<EncodedBuffer>> {
        let flags = match self.read_flags()? {
            Some(flags) => FrameFlags::from_bits(flags),
            None => return Ok(None),
        };

        let mut timestamp = [0u8; std::mem::size_of::<u64>()];
        self.reader
            .read_exact(&mut timestamp)
            .map_err(|e| anyhow!("Truncated record header: {e}"))?;

        let len = read_u32(&mut self.reader)? as usize;

        let mut data = vec![0; len];
        self.reader
            .read_exact(&mut data)
            .map_err(|e| anyhow!("Truncated {len} byte record: {e}"))?;

        Ok(Some(EncodedBuffer::new(
            data,
            flags,
            u64::from_le_bytes(timestamp),
        )))
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn framerate(&self) -> Option<u32> {
        Some(self.framerate).filter(|&f| f != 0)
    }
}

/// Writer of `.mvr` captures.
pub struct CaptureWriter<W> {
    writer: W,
}

impl<W: Write> CaptureWriter<W> {
    /// Write the capture header.
    ///
    /// # Arguments
    ///
    /// * `writer` - output to write the capture to.
    /// * `dimensions` - frame width and height in pixels.
    /// * `framerate` - nominal framerate, `None` if unknown.
    pub fn new(
        mut writer: W,
        (width, height): (usize, usize),
        framerate: Option<u32>,
    ) -> Result<Self> {
        writer.write_all(MAGIC)?;

        for v in [width as u32, height as u32, framerate.unwrap_or(0)] {
            writer.write_all(&v.to_le_bytes())?;
        }

        Ok(Self { writer })
    }

    pub fn write_buffer(&mut self, buffer: &EncodedBuffer) -> Result<()> {
        self.writer.write_all(&[buffer.flags.bits()])?;
        self.writer.write_all(&buffer.timestamp.to_le_bytes())?;
        self.writer.write_all(&(buffer.data.len() as u32).to_le_bytes())?;
        self.writer.write_all(&buffer.data)?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
