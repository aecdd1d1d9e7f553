//! WAV file reading and writing.

use crate::error::{MorseError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Decoded WAV contents, mixed down to mono
#[derive(Debug, Clone)]
pub struct WavData {
    pub sample_rate: u32,
    /// Channel count of the source file
    pub channels: u16,
    /// Samples in the file's native units: integer formats keep their raw
    /// values (e.g. ±32767 for 16-bit), float formats stay in ±1.0
    pub samples: Vec<f32>,
}

impl WavData {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy scaled so the largest magnitude is 1.0
    pub fn normalized(&self) -> WavData {
        WavData {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: crate::window::normalize(&self.samples),
        }
    }
}

/// Write mono 16-bit PCM samples
pub fn write_wav<P: AsRef<Path>>(path: P, sample_rate: u32, samples: &[i16]) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    log::debug!(
        "Wrote {} samples at {} Hz to {}",
        samples.len(),
        sample_rate,
        path.as_ref().display()
    );
    Ok(())
}

/// Read a WAV file, averaging all channels into one
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<WavData> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8..=32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        (format, bits) => {
            return Err(MorseError::UnsupportedFormat(format!(
                "{:?} with {} bits per sample",
                format, bits
            )))
        }
    };

    let samples = downmix(&interleaved, spec.channels);

    log::debug!(
        "Read {}: {} Hz, {} channel(s), {} bits, {} frames",
        path.as_ref().display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        samples.len()
    );

    Ok(WavData {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

/// Average interleaved frames down to a single channel
fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
