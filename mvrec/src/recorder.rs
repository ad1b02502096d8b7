//! # Recording state machine
//!
//! [`RecordingContext`] holds the shared state and timers. It is driven from two threads: the
//! analyser thread feeds it [`MotionEvent`]s, and the producer thread advances it once per
//! encoded frame through the [`Recorder`], which owns the pre-roll ring and the output sinks.

use crate::analyser::MotionEvent;
use crate::frame::{Frame, ParameterSets};
use crate::notify::Notifier;
use crate::ring::FrameRing;
use crate::sink::{OutputSink, SinkFactory};
use log::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RecordingState {
    /// Nothing is happening, frames are only retained for pre-roll.
    #[default]
    Waiting,
    /// Movement seen, waiting for it to persist past the debounce period.
    Triggered,
    /// Frames are being written out.
    Recording,
    /// Movement ceased, still writing until the outro elapses and a keyframe arrives.
    Stopping,
}

impl RecordingState {
    /// State after a motion event.
    pub fn on_event(self, event: MotionEvent) -> Self {
        use MotionEvent::*;
        use RecordingState::*;

        match (self, event) {
            (Waiting, Movement) => Triggered,
            (Triggered, Quiescent) => Waiting,
            (Recording, Quiescent) => Stopping,
            (Stopping, Movement) => Recording,
            (state, _) => state,
        }
    }

    /// Whether frames are being forwarded to an output.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Recording | Self::Stopping)
    }
}

/// State and frame counters guarded by the [`RecordingContext`] lock.
///
/// `previous_keyframe_frame <= last_keyframe_frame <= frame_number` always holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timeline {
    pub state: RecordingState,
    /// Number the next encoded frame will get.
    pub frame_number: u64,
    pub last_event_frame: u64,
    pub last_keyframe_frame: u64,
    pub previous_keyframe_frame: u64,
}

/// Frame count based delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Frames movement must persist for before recording starts.
    pub debounce_frames: u64,
    /// Frames quiescence must persist for before recording may stop.
    pub outro_frames: u64,
}

/// What the producer has to do with the frame it just submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameAction {
    /// Retain for pre-roll only.
    Buffer,
    /// Open an output and flush pre-roll up to and including this frame.
    Start {
        previous_keyframe: u64,
        last_keyframe: u64,
    },
    /// Write the frame to the open output.
    Forward,
    /// Write the frame, then close the output.
    Stop,
}

/// Shared recording state.
pub struct RecordingContext {
    timing: Timing,
    timeline: Mutex<Timeline>,
}

impl RecordingContext {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            timeline: Default::default(),
        }
    }

    fn lock(&self) -> MutexGuard<Timeline> {
        self.timeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn state(&self) -> RecordingState {
        self.lock().state
    }

    /// Snapshot of the state and counters.
    pub fn timeline(&self) -> Timeline {
        *self.lock()
    }

    /// Apply a motion event, returning the new state.
    pub fn handle_event(&self, event: MotionEvent) -> RecordingState {
        let mut timeline = self.lock();

        let old = timeline.state;
        timeline.last_event_frame = timeline.frame_number;
        timeline.state = old.on_event(event);

        if old != timeline.state {
            info!(
                "{event:?} at frame {}: {old:?} -> {:?}",
                timeline.frame_number, timeline.state
            );
        } else {
            debug!("{event:?} at frame {} while {old:?}", timeline.frame_number);
        }

        timeline.state
    }

    /// Account for a new encoded frame and evaluate the time driven transitions.
    ///
    /// Returns the number assigned to the frame and what to do with it.
    pub fn advance(&self, keyframe: bool) -> (u64, FrameAction) {
        let mut timeline = self.lock();

        let n = timeline.frame_number;
        timeline.frame_number += 1;

        if keyframe {
            timeline.previous_keyframe_frame = timeline.last_keyframe_frame;
            timeline.last_keyframe_frame = n;
        }

        let elapsed = n.saturating_sub(timeline.last_event_frame);

        let action = match timeline.state {
            RecordingState::Waiting => FrameAction::Buffer,
            RecordingState::Triggered if elapsed > self.timing.debounce_frames => {
                info!("Motion persisted for {elapsed} frames, recording from frame {n}");
                timeline.state = RecordingState::Recording;
                FrameAction::Start {
                    previous_keyframe: timeline.previous_keyframe_frame,
                    last_keyframe: timeline.last_keyframe_frame,
                }
            }
            RecordingState::Triggered => FrameAction::Buffer,
            RecordingState::Recording => FrameAction::Forward,
            RecordingState::Stopping if elapsed > self.timing.outro_frames && keyframe => {
                info!("Quiet for {elapsed} frames, stopping at keyframe {n}");
                timeline.state = RecordingState::Waiting;
                FrameAction::Stop
            }
            RecordingState::Stopping => FrameAction::Forward,
        };

        (n, action)
    }

    /// Force the state machine back to waiting after an output failure.
    pub fn abandon(&self) {
        let mut timeline = self.lock();

        if timeline.state != RecordingState::Waiting {
            warn!("Abandoning {:?} at frame {}", timeline.state, timeline.frame_number);
            timeline.state = RecordingState::Waiting;
        }
    }

    /// Return to waiting on shutdown.
    pub fn reset(&self) {
        let mut timeline = self.lock();

        if timeline.state != RecordingState::Waiting {
            info!("Leaving {:?} at frame {} on shutdown", timeline.state, timeline.frame_number);
            timeline.state = RecordingState::Waiting;
        }
    }
}

/// Producer side of the recording pipeline.
///
/// Every encoded frame passes through [`push_frame`](Self::push_frame), gets retained in the ring
/// and, depending on the state, written to the current segment.
pub struct Recorder {
    context: Arc<RecordingContext>,
    ring: FrameRing,
    params: ParameterSets,
    factory: Box<dyn SinkFactory>,
    notifier: Box<dyn Notifier>,
    segment: Option<Box<dyn OutputSink>>,
    continuous: Option<Box<dyn OutputSink>>,
}

impl Recorder {
    pub fn new(
        context: Arc<RecordingContext>,
        factory: Box<dyn SinkFactory>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            context,
            ring: FrameRing::new(),
            params: Default::default(),
            factory,
            notifier,
            segment: None,
            continuous: None,
        }
    }

    /// Also write every frame to `sink`, regardless of recording state.
    pub fn with_continuous(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.continuous = Some(sink);
        self
    }

    pub fn context(&self) -> &Arc<RecordingContext> {
        &self.context
    }

    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    pub fn parameter_sets(&self) -> &ParameterSets {
        &self.params
    }

    /// Destination of the segment currently being written.
    pub fn segment_destination(&self) -> Option<&str> {
        self.segment.as_ref().map(|s| s.destination())
    }

    /// Process one encoded frame.
    pub fn push_frame(&mut self, frame: Frame) {
        self.params.observe(&frame);
        self.write_continuous(&frame);

        let (n, action) = self.context.advance(frame.is_keyframe());
        self.ring.put(n, frame);

        match action {
            FrameAction::Buffer => {}
            FrameAction::Start {
                previous_keyframe,
                last_keyframe,
            } => self.start_segment(n, previous_keyframe, last_keyframe),
            FrameAction::Forward => self.forward(n),
            FrameAction::Stop => {
                self.forward(n);
                self.finish_segment();
            }
        }
    }

    /// Cleanly close any open outputs.
    pub fn close(&mut self) {
        if self.segment.is_some() {
            self.context.reset();
            self.finish_segment();
        }

        if let Some(sink) = self.continuous.take() {
            if let Err(e) = sink.finish() {
                error!("Failed to close continuous stream: {e}");
            }
        }
    }

    fn write_continuous(&mut self, frame: &Frame) {
        let failed = match self.continuous.as_mut().map(|s| s.write_frame(frame)) {
            Some(Err(e)) => {
                error!("Continuous stream failed, dropping it: {e}");
                true
            }
            _ => false,
        };

        if failed {
            self.continuous = None;
        }
    }

    /// Pick the first pre-roll frame, preferring the keyframe before last.
    fn preroll_start(&self, n: u64, previous_keyframe: u64, last_keyframe: u64) -> u64 {
        if self.ring.contains(previous_keyframe) {
            previous_keyframe
        } else if self.ring.contains(last_keyframe) {
            warn!("Keyframe {previous_keyframe} already evicted, pre-roll from {last_keyframe}");
            last_keyframe
        } else {
            let oldest = self.ring.oldest().unwrap_or(n);
            warn!("No keyframe retained, pre-roll from frame {oldest}");
            oldest
        }
    }

    fn start_segment(&mut self, n: u64, previous_keyframe: u64, last_keyframe: u64) {
        let mut sink = match self.factory.open(&self.params) {
            Ok(sink) => sink,
            Err(e) => {
                error!("Unable to open output: {e}");
                self.context.abandon();
                return;
            }
        };

        let start = self.preroll_start(n, previous_keyframe, last_keyframe);

        info!("Writing initial {} frames out", n - start + 1);

        let flushed = self
            .ring
            .range(start, n)
            .try_for_each(|(_, frame)| sink.write_frame(frame));

        if let Err(e) = flushed {
            error!("Failed writing pre-roll to {}: {e}", sink.destination());
            self.context.abandon();
            return;
        }

        self.notify(RecordingState::Recording, sink.destination());
        self.segment = Some(sink);
    }

    fn forward(&mut self, n: u64) {
        let result = match self.segment.as_mut() {
            Some(sink) => sink.write_frame(self.ring.get(n)),
            None => {
                warn!("Frame {n} due for output, but no segment is open");
                self.context.abandon();
                return;
            }
        };

        if let Err(e) = result {
            error!("Failed to write frame {n}: {e}");
            self.abandon_segment();
        }
    }

    /// Drop the segment without a clean close.
    fn abandon_segment(&mut self) {
        self.context.abandon();

        if let Some(sink) = self.segment.take() {
            let destination = sink.destination().to_string();
            drop(sink);
            warn!("Abandoned segment {destination}");
            self.notify(RecordingState::Waiting, &destination);
        }
    }

    fn finish_segment(&mut self) {
        if let Some(sink) = self.segment.take() {
            let destination = sink.destination().to_string();

            match sink.finish() {
                Ok(()) => info!("Finished segment {destination}"),
                Err(e) => error!("Failed to finish segment {destination}: {e}"),
            }

            self.notify(RecordingState::Waiting, &destination);
        }
    }

    fn notify(&mut self, state: RecordingState, destination: &str) {
        if let Err(e) = self.notifier.notify(state, destination) {
            warn!("{e}");
        }
    }
}
