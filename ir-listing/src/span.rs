/// Диапазон токена в символах: `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Zero-based row and column of a character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub row: usize,
    pub column: usize,
}

/// Replays `text` up to `offset` characters and returns where that offset
/// lands. Offsets past the end of the text stop at the last character.
///
/// Only `\n` starts a new row; a `\r` before it counts as a column like any
/// other character, the same way the lexer counts it.
pub fn locate(text: &str, offset: usize) -> Location {
    let mut location = Location::default();

    for ch in text.chars().take(offset) {
        if ch == '\n' {
            location.row += 1;
            location.column = 0;
        } else {
            location.column += 1;
        }
    }

    location
}
