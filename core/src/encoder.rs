use crate::error::Result;
use crate::morse::message_to_pulses;
use crate::pulse::PulseTrain;
use crate::tone::{ElementKeyer, ToneConfig, ToneModulator};

/// Text to audio: message -> pulse train -> keyed carrier
pub struct Encoder {
    modulator: ToneModulator,
}

impl Encoder {
    pub fn new(config: ToneConfig) -> Result<Self> {
        Ok(Self {
            modulator: ToneModulator::new(config)?,
        })
    }

    pub fn config(&self) -> &ToneConfig {
        self.modulator.config()
    }

    /// Pulse train the message will be keyed with
    pub fn pulses(&self, message: &str) -> Result<PulseTrain> {
        message_to_pulses(message)
    }

    /// Encode a message into 16-bit samples at the configured sample rate
    pub fn encode(&mut self, message: &str) -> Result<Vec<i16>> {
        let pulses = self.pulses(message)?;
        let samples = self.modulator.modulate(&pulses);
        log::info!(
            "Encoded {:?}: {} slots, {:.2}s of audio",
            message.trim(),
            pulses.len(),
            samples.len() as f64 / self.config().sample_rate as f64
        );
        Ok(samples)
    }

    /// Key a textual Morse string element by element (dot/dash/space units)
    /// using this encoder's sample rate, unit duration, frequency and amplitude
    pub fn encode_elements(&mut self, morse: &str) -> Result<Vec<i16>> {
        let keyer = ElementKeyer::new(*self.config())?;
        Ok(keyer.key(morse))
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            modulator: ToneModulator::default(),
        }
    }
}
