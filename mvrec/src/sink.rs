//! # Output sinks

use crate::error::Result;
use crate::frame::{Frame, ParameterSets};
use chrono::Local;
use log::*;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;

/// Destination for an ordered stream of encoded frames.
pub trait OutputSink: Send {
    /// Identifier of the destination, passed to notification hooks.
    fn destination(&self) -> &str;

    /// Write a single frame.
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and cleanly close the destination.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Opens a new sink whenever a recording segment starts.
pub trait SinkFactory: Send {
    /// Open a sink for a new segment.
    ///
    /// # Arguments
    ///
    /// * `params` - parameter sets to emit before the first frame.
    fn open(&mut self, params: &ParameterSets) -> Result<Box<dyn OutputSink>>;
}

/// Writes frames as a raw Annex-B byte stream.
pub struct RawStreamSink<W> {
    writer: W,
    destination: String,
}

impl<W: Write + Send> RawStreamSink<W> {
    /// Create a new sink and write out the known parameter sets.
    pub fn new(mut writer: W, destination: String, params: &ParameterSets) -> Result<Self> {
        for set in params.iter() {
            writer.write_all(set)?;
        }

        Ok(Self {
            writer,
            destination,
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> OutputSink for RawStreamSink<W> {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_all(&frame.data)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Creates one timestamp-named file per recording segment.
pub struct SegmentFactory {
    directory: PathBuf,
    extension: String,
}

impl SegmentFactory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: "h264".into(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Create a file named after the current local time, never overwriting an older segment.
    fn create_file(&self) -> Result<(File, PathBuf)> {
        std::fs::create_dir_all(&self.directory)?;

        let stem = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();

        for attempt in 0.. {
            let name = match attempt {
                0 => format!("{stem}.{}", self.extension),
                n => format!("{stem}-{n}.{}", self.extension),
            };

            let path = self.directory.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        unreachable!()
    }
}

impl SinkFactory for SegmentFactory {
    fn open(&mut self, params: &ParameterSets) -> Result<Box<dyn OutputSink>> {
        let (file, path) = self.create_file()?;
        let destination = path.display().to_string();

        info!("Opened segment {destination}");

        Ok(Box::new(RawStreamSink::new(
            BufWriter::new(file),
            destination,
            params,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFlags;

    fn params() -> ParameterSets {
        let mut params = ParameterSets::default();
        params.observe(&Frame::new(vec![0, 0, 0, 1, 0x67], FrameFlags::delta(), 0));
        params.observe(&Frame::new(vec![0, 0, 0, 1, 0x68], FrameFlags::delta(), 0));
        params
    }

    #[test]
    fn raw_stream_layout() {
        let mut sink = RawStreamSink::new(vec![], "mem".into(), &params()).unwrap();
        sink.write_frame(&Frame::new(vec![0, 0, 0, 1, 0x65, 1], FrameFlags::keyframe(), 0))
            .unwrap();

        assert_eq!(sink.destination(), "mem");
        assert_eq!(
            sink.into_inner(),
            vec![0, 0, 0, 1, 0x67, 0, 0, 0, 1, 0x68, 0, 0, 0, 1, 0x65, 1]
        );
    }

    #[test]
    fn segments_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = SegmentFactory::new(dir.path().join("nested"));

        let mut destinations = vec![];

        for _ in 0..3 {
            let mut sink = factory.open(&params()).unwrap();
            sink.write_frame(&Frame::new(vec![1, 2, 3], FrameFlags::keyframe(), 0))
                .unwrap();
            destinations.push(sink.destination().to_string());
            sink.finish().unwrap();
        }

        destinations.sort();
        destinations.dedup();
        assert_eq!(destinations.len(), 3);

        for d in destinations {
            assert!(d.ends_with(".h264"));
            assert_eq!(std::fs::read(d).unwrap().len(), 13);
        }
    }
}
