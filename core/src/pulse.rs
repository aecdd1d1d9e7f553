use crate::error::{MorseError, Result};
use crate::morse::reverse_lookup;
use crate::WORD_GAP;
use std::fmt;
use std::str::FromStr;

/// Sequence of on/off slots, each lasting one pulse duration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PulseTrain {
    slots: Vec<bool>,
}

impl PulseTrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slots(slots: Vec<bool>) -> Self {
        Self { slots }
    }

    pub fn push_on(&mut self, count: usize) {
        self.slots.extend(std::iter::repeat(true).take(count));
    }

    pub fn push_off(&mut self, count: usize) {
        self.slots.extend(std::iter::repeat(false).take(count));
    }

    pub fn extend(&mut self, other: &PulseTrain) {
        self.slots.extend_from_slice(&other.slots);
    }

    pub fn slots(&self) -> &[bool] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots with the tone on
    pub fn on_count(&self) -> usize {
        self.slots.iter().filter(|&&s| s).count()
    }

    /// Run-length view: (state, slot count) for each maximal run
    pub fn runs(&self) -> Vec<(bool, usize)> {
        let mut runs: Vec<(bool, usize)> = Vec::new();
        for &slot in &self.slots {
            match runs.last_mut() {
                Some((state, count)) if *state == slot => *count += 1,
                _ => runs.push((slot, 1)),
            }
        }
        runs
    }

    /// Copy without leading and trailing off slots
    pub fn trim_silence(&self) -> PulseTrain {
        let first = self.slots.iter().position(|&s| s);
        let last = self.slots.iter().rposition(|&s| s);
        match (first, last) {
            (Some(first), Some(last)) => Self::from_slots(self.slots[first..=last].to_vec()),
            _ => Self::new(),
        }
    }

    /// Recover the text a pulse train encodes.
    ///
    /// Run lengths are classified loosely so that trains recovered from audio
    /// with an occasional slot too many or too few still decode:
    /// on-runs of 1 are dots and longer ones dashes, off-runs of 1 separate
    /// elements, 2..=4 separate letters and 5 or more separate words.
    pub fn to_message(&self) -> Result<String> {
        let mut text = String::new();
        let mut code = String::new();

        for (on, len) in self.trim_silence().runs() {
            if on {
                code.push(if len < 2 { '.' } else { '-' });
                continue;
            }
            if len < 2 {
                continue;
            }

            flush_letter(&mut code, &mut text)?;
            if len >= 5 {
                let words = ((len as f32 / WORD_GAP as f32).round() as usize).max(1);
                text.extend(std::iter::repeat(' ').take(words));
            }
        }
        flush_letter(&mut code, &mut text)?;

        Ok(text)
    }
}

fn flush_letter(code: &mut String, text: &mut String) -> Result<()> {
    if code.is_empty() {
        return Ok(());
    }
    let letter = reverse_lookup(code).ok_or_else(|| MorseError::InvalidMorse(code.clone()))?;
    text.push(letter);
    code.clear();
    Ok(())
}

impl fmt::Display for PulseTrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &slot in &self.slots {
            f.write_str(if slot { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for PulseTrain {
    type Err = MorseError;

    fn from_str(s: &str) -> Result<Self> {
        let slots = s
            .chars()
            .map(|c| match c {
                '1' => Ok(true),
                '0' => Ok(false),
                other => Err(MorseError::InvalidPulseTrain(other)),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { slots })
    }
}
