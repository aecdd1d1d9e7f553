use crate::error::{MorseError, Result};
use crate::pulse::PulseTrain;
use crate::{INTER_LETTER_GAP, INTRA_LETTER_GAP, WORD_GAP};

/// International Morse table (letters, digits and common punctuation)
const MORSE_TABLE: [(char, &str); 43] = [
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('0', "-----"),
    (',', "--..--"),
    ('.', ".-.-.-"),
    ('?', "..--.."),
    ('/', "-..-."),
    ('-', "-....-"),
    ('(', "-.--."),
    (')', "-.--.-"),
];

/// Word separator used in textual Morse
pub const WORD_SEPARATOR: &str = "/";

/// Morse code for a character (case-insensitive)
pub fn lookup(c: char) -> Option<&'static str> {
    let upper = c.to_ascii_uppercase();
    MORSE_TABLE
        .iter()
        .find(|(letter, _)| *letter == upper)
        .map(|(_, code)| *code)
}

/// Character for a Morse code
pub fn reverse_lookup(code: &str) -> Option<char> {
    MORSE_TABLE
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(letter, _)| *letter)
}

/// Encode text as a Morse string: codes separated by spaces, words by " / "
pub fn encode_to_morse(message: &str) -> Result<String> {
    let codes = message
        .chars()
        .map(|c| {
            if c == ' ' {
                Ok(WORD_SEPARATOR)
            } else {
                lookup(c).ok_or(MorseError::UnknownCharacter(c))
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(codes.join(" "))
}

/// Decode a Morse string produced by [`encode_to_morse`]
pub fn decode_from_morse(morse: &str) -> Result<String> {
    morse
        .split_whitespace()
        .map(|code| {
            if code == WORD_SEPARATOR {
                Ok(' ')
            } else {
                reverse_lookup(code).ok_or_else(|| MorseError::InvalidMorse(code.to_string()))
            }
        })
        .collect()
}

/// Convert one letter's dots and dashes into on/off slots.
///
/// Dot is one slot on, dash three, with a single off slot between elements and
/// none after the last one. Characters other than `.` and `-` are skipped.
pub fn morse_to_pulses(code: &str) -> PulseTrain {
    let mut train = PulseTrain::new();
    let elements: Vec<char> = code.chars().filter(|c| *c == '.' || *c == '-').collect();

    for (i, element) in elements.iter().enumerate() {
        match element {
            '.' => train.push_on(1),
            _ => train.push_on(3),
        }
        if i + 1 < elements.len() {
            train.push_off(INTRA_LETTER_GAP);
        }
    }

    train
}

/// Pulse train for a single character
pub fn letter_to_pulses(letter: char) -> Result<PulseTrain> {
    lookup(letter)
        .map(morse_to_pulses)
        .ok_or(MorseError::UnknownCharacter(letter))
}

/// Convert a whole message into a pulse train.
///
/// The message is trimmed and uppercased first. Every space becomes a word gap
/// of seven off slots; adjacent letters are separated by three.
pub fn message_to_pulses(message: &str) -> Result<PulseTrain> {
    let chars: Vec<char> = message.trim().to_uppercase().chars().collect();
    let mut train = PulseTrain::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            train.push_off(WORD_GAP);
            continue;
        }

        train.extend(&letter_to_pulses(c)?);

        if let Some(&next) = chars.get(i + 1) {
            if next != ' ' {
                train.push_off(INTER_LETTER_GAP);
            }
        }
    }

    log::debug!("Message {:?} -> {} pulse slots", message, train.len());
    Ok(train)
}
