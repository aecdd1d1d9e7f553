//! Morse code audio toolkit
//!
//! Encodes text as an on/off keyed sine carrier, writes it to WAV, and analyses
//! received recordings (envelope plots, pulse zoom, sinusoid fitting, demodulation).

pub mod error;
pub mod morse;
pub mod pulse;
pub mod tone;
pub mod encoder;
pub mod decoder;
pub mod wav;
pub mod window;
pub mod fit;
pub mod plot;
mod font;

pub use encoder::Encoder;
pub use decoder::Decoder;
pub use error::{MorseError, Result};
pub use pulse::PulseTrain;
pub use tone::{ElementKeyer, OnOffDetector, ToneConfig, ToneModulator};
pub use wav::{read_wav, write_wav, WavData};
pub use window::TimeWindow;
pub use fit::{fit_sinusoid, FitOptions, SinusoidFit};
pub use plot::{Figure, LineStyle, Series};

// Synthesis defaults
pub const SAMPLE_RATE: u32 = 44100;
pub const PULSE_DURATION_SECS: f64 = 0.1;
pub const TONE_FREQUENCY: f64 = 1760.0; // Hz
pub const TONE_AMPLITUDE: f64 = 10000.0; // i16 units

// Element keying (dot = 1 unit, dash = 3 units, phase restarts per element)
pub const ELEMENT_FREQUENCY: f64 = 800.0; // Hz
pub const ELEMENT_AMPLITUDE: f64 = 32767.0;

// Pulse train gaps, in slots
pub const INTRA_LETTER_GAP: usize = 1;
pub const INTER_LETTER_GAP: usize = 3;
pub const WORD_GAP: usize = 7;

// On/off detection
pub const DEFAULT_THRESHOLD_RATIO: f32 = 0.5;

// Analysis defaults
pub const FIT_WINDOW_START_SECS: f64 = 0.5;
pub const FIT_WINDOW_END_SECS: f64 = 0.505;
pub const PERIOD_PLOT_SAMPLES: usize = 5;
