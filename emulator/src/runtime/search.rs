//! Word lookup in a paragraph of text.
//!
//! A word is a run of bytes that are neither whitespace nor `.`. Each `.` ends a sentence.
//! Sentences and words within a sentence are numbered from 1.

/// Position of a word in a paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub sentence: u16,
    pub word: u16,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sentence {}, word {}", self.sentence, self.word)
    }
}

/// Splits a paragraph in words, stopping at the first zero byte
#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    text: &'a [u8],
    position: usize,
    sentence: u16,
    word: u16,
}

impl<'a> Segmenter<'a> {
    #[must_use]
    pub fn new(text: &'a [u8]) -> Self {
        let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        Self {
            text: &text[..end],
            position: 0,
            sentence: 1,
            word: 0,
        }
    }
}

const fn is_separator(byte: u8) -> bool {
    byte == b'.' || byte.is_ascii_whitespace()
}

impl<'a> Iterator for Segmenter<'a> {
    type Item = (Location, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let byte = *self.text.get(self.position)?;
            if !is_separator(byte) {
                break;
            }
            if byte == b'.' {
                self.sentence = self.sentence.saturating_add(1);
                self.word = 0;
            }
            self.position += 1;
        }

        let start = self.position;
        let len = self.text[start..]
            .iter()
            .position(|&b| is_separator(b))
            .unwrap_or(self.text.len() - start);
        self.position += len;
        self.word = self.word.saturating_add(1);

        let location = Location {
            sentence: self.sentence,
            word: self.word,
        };
        Some((location, &self.text[start..self.position]))
    }
}

/// Strip ASCII punctuation from both ends of a token
fn trim_punctuation(token: &[u8]) -> &[u8] {
    let Some(start) = token.iter().position(|b| !b.is_ascii_punctuation()) else {
        return &[];
    };
    let end = token
        .iter()
        .rposition(|b| !b.is_ascii_punctuation())
        .map_or(token.len(), |end| end + 1);
    &token[start..end]
}

/// Find the first occurrence of a word. The comparison is case-sensitive and ignores the
/// punctuation surrounding the words.
#[must_use]
pub fn find_word(paragraph: &[u8], target: &[u8]) -> Option<Location> {
    let target = trim_punctuation(target);
    if target.is_empty() {
        return None;
    }

    Segmenter::new(paragraph)
        .find(|(_, token)| trim_punctuation(token) == target)
        .map(|(location, _)| location)
}
