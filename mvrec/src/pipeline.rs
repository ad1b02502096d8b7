//! # Recording pipeline
//!
//! Wires the producer facing side (buffer assembly, pre-roll ring, output sinks) to a dedicated
//! analyser thread through a coalescing [`Mailbox`].

use crate::analyser::MotionAnalyser;
use crate::assembler::{Assembled, FrameAssembler};
use crate::config::RecorderConfig;
use crate::dump::VectorDump;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::heatmap::Heatmap;
use crate::mailbox::Mailbox;
use crate::notify::Notifier;
use crate::recorder::{Recorder, RecordingContext, RecordingState};
use crate::sink::{OutputSink, SinkFactory};
use crate::source::EncodedBuffer;
use crate::vectors::{MacroblockGrid, MotionSample};
use log::*;
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

/// Where recorded frames go.
pub struct Sinks {
    /// Opens one sink per recording segment.
    pub segments: Box<dyn SinkFactory>,
    /// Receives every frame, regardless of recording state.
    pub continuous: Option<Box<dyn OutputSink>>,
}

impl Sinks {
    pub fn new(segments: Box<dyn SinkFactory>) -> Self {
        Self {
            segments,
            continuous: None,
        }
    }
}

/// Analyser thread consuming samples from the mailbox.
struct AnalyserWorker {
    mailbox: Arc<Mailbox<MotionSample>>,
    handle: Option<JoinHandle<()>>,
}

impl AnalyserWorker {
    fn new(
        mut analyser: MotionAnalyser,
        mut dump: Option<VectorDump>,
        context: Arc<RecordingContext>,
    ) -> Result<Self> {
        let mailbox = Arc::new(Mailbox::new());

        let handle = Some({
            let mailbox = mailbox.clone();
            Builder::new()
                .name("mvrec-analyser".into())
                .spawn(move || {
                    while let Some(sample) = mailbox.take_blocking() {
                        if let Some(dump) = dump.as_mut() {
                            if let Err(e) = dump.write(&sample) {
                                warn!("Unable to dump vectors: {e}");
                            }
                        }

                        if let Some(event) = analyser.analyse(&sample) {
                            context.handle_event(event);
                        }
                    }

                    debug!("Analyser finished");
                })?
        });

        Ok(Self { mailbox, handle })
    }

    /// Close the mailbox and wait for the last sample to be analysed.
    fn stop(&mut self) {
        self.mailbox.close();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Analyser thread panicked");
            }
        }
    }
}

impl Drop for AnalyserWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Complete motion triggered recording pipeline.
pub struct Pipeline {
    grid: MacroblockGrid,
    assembler: FrameAssembler,
    recorder: Recorder,
    worker: AnalyserWorker,
}

impl Pipeline {
    /// Validate the configuration and start the analyser thread.
    pub fn new(
        config: &RecorderConfig,
        heatmap: Heatmap,
        sinks: Sinks,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;

        let grid = config.grid();

        if heatmap.grid() != grid {
            return Err(Error::Config(format!(
                "heatmap grid {:?} does not match {}x{} frames",
                heatmap.grid(),
                config.width,
                config.height
            )));
        }

        let context = Arc::new(RecordingContext::new(config.timing()));

        let dump = config
            .vector_debug_pattern
            .as_ref()
            .map(|pattern| VectorDump::new(grid, pattern.as_str()));

        let worker = AnalyserWorker::new(
            MotionAnalyser::new(heatmap, config.threshold),
            dump,
            context.clone(),
        )?;

        let mut recorder = Recorder::new(context, sinks.segments, notifier);

        if let Some(continuous) = sinks.continuous {
            recorder = recorder.with_continuous(continuous);
        }

        info!(
            "Started pipeline for {}x{} macroblocks, threshold {}",
            grid.real_cols(),
            grid.rows(),
            config.threshold
        );

        Ok(Self {
            grid,
            assembler: FrameAssembler::new(),
            recorder,
            worker,
        })
    }

    pub fn context(&self) -> &Arc<RecordingContext> {
        self.recorder.context()
    }

    pub fn state(&self) -> RecordingState {
        self.context().state()
    }

    /// Number of motion samples dropped because the analyser was busy.
    pub fn coalesced(&self) -> u64 {
        self.worker.mailbox.coalesced()
    }

    /// Feed a raw encoder buffer.
    ///
    /// Returns an error if a side info payload does not fit the macroblock grid. The pipeline
    /// stays usable afterwards.
    pub fn push_buffer(&mut self, buffer: EncodedBuffer) -> Result<()> {
        match self.assembler.push(buffer) {
            Some(Assembled::Motion(data)) => {
                self.post_motion(MotionSample::from_bytes(self.grid, &data)?)
            }
            Some(Assembled::Frame(frame)) => self.push_frame(frame),
            None => {}
        }

        Ok(())
    }

    /// Hand a motion sample to the analyser without blocking.
    pub fn post_motion(&self, sample: MotionSample) {
        self.worker.mailbox.post(sample);
    }

    /// Retain and, depending on the state, record an encoded frame.
    pub fn push_frame(&mut self, frame: Frame) {
        self.recorder.push_frame(frame);
    }

    /// Drain the analyser and cleanly close all outputs.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.worker.stop();
        self.recorder.close();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}
