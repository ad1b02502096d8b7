//! # Motion Vector Triggered Recording
//!
//! This library decides, from the motion vectors a video encoder produces as a by-product, when a
//! scene starts and stops moving, and records the encoded stream around those moments. Recording
//! starts retroactively from a keyframe held in a pre-roll ring buffer, and stops only on a
//! keyframe once the scene has been still for long enough.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use mvrec::prelude::v1::*;
//! ```

pub mod analyser;
pub mod assembler;
pub mod config;
pub mod dump;
pub mod error;
pub mod frame;
pub mod heatmap;
pub mod mailbox;
pub mod notify;
pub mod pipeline;
pub mod recorder;
pub mod ring;
pub mod sink;
pub mod source;
pub mod utils;
pub mod vectors;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            analyser::{MotionAnalyser, MotionEvent},
            config::RecorderConfig,
            error::Error as RecorderError,
            frame::{Frame, FrameFlags, ParameterSets},
            heatmap::Heatmap,
            notify::{CommandNotifier, Notifier, NullNotifier},
            pipeline::{Pipeline, Sinks},
            recorder::{RecordingState, Timing},
            sink::{OutputSink, SegmentFactory, SinkFactory},
            source::{EncodedBuffer, EncoderSource},
            vectors::{MacroblockGrid, MotionSample, MotionVector},
        };
        pub use anyhow::{anyhow, Error, Result};
    }
}
