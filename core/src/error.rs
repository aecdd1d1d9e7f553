use thiserror::Error;

#[derive(Debug, Error)]
pub enum MorseError {
    #[error("Character {0:?} has no Morse code")]
    UnknownCharacter(char),

    #[error("Invalid Morse sequence: {0}")]
    InvalidMorse(String),

    #[error("Invalid pulse symbol {0:?} (expected '0' or '1')")]
    InvalidPulseTrain(char),

    #[error("Invalid time window: {start}s..{end}s")]
    InvalidWindow { start: f64, end: f64 },

    #[error("Segment holds too few samples ({0})")]
    EmptySegment(usize),

    #[error("Sinusoid fit did not converge")]
    FitDidNotConverge,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MorseError>;
