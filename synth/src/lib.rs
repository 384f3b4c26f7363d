//! Speech synthesis for the voice assistant.
//!
//! Two engines are available: the platform synthesizer, which starts fastest,
//! and an on-device neural model with richer voices. The
//! [`SynthesisDispatcher`] serializes speech output, picks an engine per
//! request and feeds every synthesis into the [`PerformanceMonitor`], whose
//! alert level biases later engine choices.
//!
//! [`DurationTargetedSynthesizer`] renders short POI announcements close to a
//! target duration with a bounded number of attempts.
//!
//! # Architecture
//!
//! ```text
//!  speak / enqueue ──► SpeechQueue ──► processing loop ──► select_engine
//!                                           │                  │
//!                         AudioSessionCoordinator        PlatformTts / OnDeviceTts
//!                          (Speaking, Background)              │
//!                                           └──── PerformanceMonitor ◄┘
//! ```

mod dispatcher;
mod engine;
mod error;
mod monitor;
mod podcast;
mod policy;
mod profile;
mod queue;
mod request;
mod script;

pub use dispatcher::*;
pub use engine::*;
pub use error::*;
pub use monitor::*;
pub use podcast::*;
pub use policy::*;
pub use profile::*;
pub use queue::*;
pub use request::*;
pub use script::*;
