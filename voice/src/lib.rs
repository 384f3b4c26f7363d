//! Voice assistant for a road trip navigation app.
//!
//! [`VoiceAssistant`] is the single entry point the app talks to. It owns
//! the audio session coordinator and wires the components around it:
//!
//! ```text
//!  voice button ──► SpeechCaptureController ──► CommandInterpreter ──┐
//!                          │                  └► DestinationModeParser ┤
//!                          ▼                                           ▼
//!  route feed ──► ConnectivityObserver ──► AudioSessionCoordinator   EventBus
//!                                                  ▲
//!  speak() ──► SynthesisDispatcher ────────────────┘
//!                   │
//!                   └──► PerformanceMonitor (alerts bias engine choice)
//! ```
//!
//! The [`sim`] module provides in-memory engines for tests and the command
//! line simulator.

mod assistant;
mod config;
mod error;
pub mod sim;

pub use assistant::*;
pub use config::*;
pub use error::*;

pub use roadtrip_audio as audio;
pub use roadtrip_session as session;
pub use roadtrip_speech as speech;
pub use roadtrip_synth as synth;
