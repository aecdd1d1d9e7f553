use crate::error::{MorseError, Result};
use crate::pulse::PulseTrain;
use std::f64::consts::PI;

/// Carrier and timing parameters shared by the modulators and the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneConfig {
    pub sample_rate: u32,
    /// Length of one pulse slot (or dot) in seconds
    pub pulse_duration: f64,
    /// Carrier frequency in Hz
    pub frequency: f64,
    /// Peak amplitude in 16-bit sample units
    pub amplitude: f64,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::SAMPLE_RATE,
            pulse_duration: crate::PULSE_DURATION_SECS,
            frequency: crate::TONE_FREQUENCY,
            amplitude: crate::TONE_AMPLITUDE,
        }
    }
}

impl ToneConfig {
    /// Defaults for [`ElementKeyer`]: full-scale 800 Hz tone
    pub fn element_defaults() -> Self {
        Self {
            frequency: crate::ELEMENT_FREQUENCY,
            amplitude: crate::ELEMENT_AMPLITUDE,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(MorseError::InvalidConfig("sample rate must be positive".into()));
        }
        if !(self.pulse_duration > 0.0) {
            return Err(MorseError::InvalidConfig(format!(
                "pulse duration must be positive, got {}",
                self.pulse_duration
            )));
        }
        if !(self.frequency > 0.0) {
            return Err(MorseError::InvalidConfig(format!(
                "frequency must be positive, got {}",
                self.frequency
            )));
        }
        if !(self.amplitude > 0.0) || self.amplitude > i16::MAX as f64 {
            return Err(MorseError::InvalidConfig(format!(
                "amplitude must be in (0, {}], got {}",
                i16::MAX,
                self.amplitude
            )));
        }
        Ok(())
    }

    /// Number of samples in one pulse slot
    pub fn samples_per_pulse(&self) -> usize {
        self.time_to_sample_index(self.pulse_duration)
    }

    pub fn time_to_sample_index(&self, t: f64) -> usize {
        (t * self.sample_rate as f64).round().max(0.0) as usize
    }

    /// Sample instants `n / fs` for every index from `round(start·fs)` up to `round(end·fs)`
    pub fn sample_times(&self, start: f64, end: f64) -> Vec<f64> {
        let fs = self.sample_rate as f64;
        let first = self.time_to_sample_index(start);
        let last = self.time_to_sample_index(end);
        (first..last).map(|n| n as f64 / fs).collect()
    }
}

/// On/off keyed carrier: one slot of tone per on-pulse, silence per off-pulse
pub struct ToneModulator {
    config: ToneConfig,
}

impl ToneModulator {
    pub fn new(config: ToneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ToneConfig {
        &self.config
    }

    /// Carrier between two absolute times. Phase is referenced to t = 0, so
    /// consecutive on-slots join without a discontinuity.
    pub fn tone(&self, start: f64, end: f64) -> Vec<f64> {
        let w = 2.0 * PI * self.config.frequency;
        self.config
            .sample_times(start, end)
            .into_iter()
            .map(|t| self.config.amplitude * (w * t).sin())
            .collect()
    }

    /// Render a pulse train to 16-bit samples
    pub fn modulate(&self, pulses: &PulseTrain) -> Vec<i16> {
        let d = self.config.pulse_duration;
        let mut samples: Vec<f64> =
            Vec::with_capacity(pulses.len() * self.config.samples_per_pulse());

        for (j, &on) in pulses.slots().iter().enumerate() {
            let start = j as f64 * d;
            let end = start + d;
            if on {
                samples.extend(self.tone(start, end));
            } else {
                let silence = self.config.time_to_sample_index(end - start);
                samples.extend(std::iter::repeat(0.0).take(silence));
            }
        }

        log::debug!(
            "Modulated {} slots ({} on) into {} samples",
            pulses.len(),
            pulses.on_count(),
            samples.len()
        );

        samples.into_iter().map(|s| s as i16).collect()
    }
}

impl Default for ToneModulator {
    fn default() -> Self {
        Self {
            config: ToneConfig::default(),
        }
    }
}

/// Keys a textual Morse string element by element.
///
/// A dot is one unit of tone, a dash three, and every other symbol (letter
/// space, `/`) one unit of silence. One unit of silence follows every symbol.
/// Each tone starts at phase zero.
pub struct ElementKeyer {
    config: ToneConfig,
}

impl ElementKeyer {
    pub fn new(config: ToneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn generate_tone(&self, duration: f64) -> Vec<f64> {
        let count = (self.config.sample_rate as f64 * duration) as usize;
        let w = 2.0 * PI * self.config.frequency;
        (0..count)
            .map(|n| {
                let t = n as f64 * duration / count as f64;
                self.config.amplitude * (w * t).sin()
            })
            .collect()
    }

    pub fn key(&self, morse: &str) -> Vec<i16> {
        let unit = self.config.pulse_duration;
        let dot = self.generate_tone(unit);
        let dash = self.generate_tone(3.0 * unit);
        let space = vec![0.0; (self.config.sample_rate as f64 * unit) as usize];

        let mut signal: Vec<f64> = Vec::new();
        for symbol in morse.chars() {
            match symbol {
                '.' => signal.extend_from_slice(&dot),
                '-' => signal.extend_from_slice(&dash),
                _ => signal.extend_from_slice(&space),
            }
            signal.extend_from_slice(&space);
        }

        signal.into_iter().map(|s| s as i16).collect()
    }
}

/// Slices a recording into pulse-length slots and marks each one on or off
/// by comparing its RMS to a fixed fraction of the loudest slot.
pub struct OnOffDetector {
    sample_rate: u32,
    pulse_duration: f64,
    threshold_ratio: f32,
    align: bool,
}

impl OnOffDetector {
    pub fn new(sample_rate: u32, pulse_duration: f64) -> Result<Self> {
        if sample_rate == 0 || !(pulse_duration > 0.0) {
            return Err(MorseError::InvalidConfig(format!(
                "detector needs positive sample rate and pulse duration, got {} Hz / {} s",
                sample_rate, pulse_duration
            )));
        }
        Ok(Self {
            sample_rate,
            pulse_duration,
            threshold_ratio: crate::DEFAULT_THRESHOLD_RATIO,
            align: true,
        })
    }

    /// Fraction of the loudest slot's RMS a slot needs to count as on
    pub fn set_threshold_ratio(&mut self, ratio: f32) {
        self.threshold_ratio = ratio.clamp(0.01, 1.0);
    }

    pub fn threshold_ratio(&self) -> f32 {
        self.threshold_ratio
    }

    /// Start slicing at the first loud sample instead of sample 0
    pub fn set_align(&mut self, align: bool) {
        self.align = align;
    }

    fn slot_bound(&self, j: usize) -> usize {
        (j as f64 * self.pulse_duration * self.sample_rate as f64).round() as usize
    }

    /// Index of the first sample whose magnitude reaches the threshold
    pub fn onset(&self, samples: &[f32]) -> Option<usize> {
        let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        if peak <= 0.0 {
            return None;
        }
        let level = self.threshold_ratio * peak;
        samples.iter().position(|s| s.abs() >= level)
    }

    pub fn detect(&self, samples: &[f32]) -> PulseTrain {
        let offset = if self.align {
            match self.onset(samples) {
                Some(offset) => offset,
                None => return PulseTrain::new(),
            }
        } else {
            0
        };

        let region = &samples[offset..];
        let mut levels = Vec::new();
        let mut j = 0;
        loop {
            let start = self.slot_bound(j);
            let mut end = self.slot_bound(j + 1);
            if end <= start || start >= region.len() {
                break;
            }
            if end > region.len() {
                // keep a trailing partial slot if at least half of it was recorded
                if region.len() - start < (end - start) / 2 {
                    break;
                }
                end = region.len();
            }
            let slot = &region[start..end];
            let rms = (slot.iter().map(|&s| s * s).sum::<f32>() / slot.len() as f32).sqrt();
            levels.push(rms);
            j += 1;
        }

        let max_rms = levels.iter().cloned().fold(0.0f32, f32::max);
        if max_rms <= 0.0 {
            return PulseTrain::new();
        }

        let level = self.threshold_ratio * max_rms;
        let train = PulseTrain::from_slots(levels.iter().map(|&rms| rms >= level).collect());

        log::debug!(
            "Detected {} slots from offset {} ({} on, threshold {:.3})",
            train.len(),
            offset,
            train.on_count(),
            level
        );

        train
    }
}
