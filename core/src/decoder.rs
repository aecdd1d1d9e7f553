use crate::error::Result;
use crate::pulse::PulseTrain;
use crate::tone::{OnOffDetector, ToneConfig};

/// Audio to text: on/off slot detection followed by run-length Morse decoding
pub struct Decoder {
    config: ToneConfig,
    threshold_ratio: f32,
    align: bool,
}

impl Decoder {
    pub fn new(config: ToneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            threshold_ratio: crate::DEFAULT_THRESHOLD_RATIO,
            align: true,
        })
    }

    pub fn set_threshold_ratio(&mut self, ratio: f32) {
        self.threshold_ratio = ratio;
    }

    /// Slice slots from the first loud sample (default) or from sample 0
    pub fn set_align(&mut self, align: bool) {
        self.align = align;
    }

    /// Pulse train recovered from a recording (silence trimmed on both ends).
    /// The recording's own sample rate is used for slot timing.
    pub fn pulses(&self, samples: &[f32], sample_rate: u32) -> Result<PulseTrain> {
        if sample_rate != self.config.sample_rate {
            log::debug!(
                "Recording is {} Hz, configured for {} Hz; using the recording's rate",
                sample_rate,
                self.config.sample_rate
            );
        }

        let mut detector = OnOffDetector::new(sample_rate, self.config.pulse_duration)?;
        detector.set_threshold_ratio(self.threshold_ratio);
        detector.set_align(self.align);
        log::debug!(
            "Detecting {} s slots (threshold ratio {}, align {})",
            self.config.pulse_duration,
            detector.threshold_ratio(),
            self.align
        );
        Ok(detector.detect(samples).trim_silence())
    }

    pub fn decode(&mut self, samples: &[f32], sample_rate: u32) -> Result<String> {
        let pulses = self.pulses(samples, sample_rate)?;
        let message = pulses.to_message()?;
        log::info!("Decoded {} slots into {:?}", pulses.len(), message);
        Ok(message)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            config: ToneConfig::default(),
            threshold_ratio: crate::DEFAULT_THRESHOLD_RATIO,
            align: true,
        }
    }
}
