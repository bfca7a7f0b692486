//! Tokenizing a PDF byte buffer (spec §4, raw IR parsing): splits on
//! whitespace/delimiters and skips `%` comments, without yet knowing
//! anything about what a PDF *object* looks like (that's [`super`]).

mod str;
pub use self::str::{HexStringLexer, StringLexer};

use crate::error::{self, Result};
use std::io::SeekFrom;
use std::ops::Range;
use std::str::FromStr;

/// Walks the PDF lexemes of a buffer in either direction.
#[derive(Copy, Clone)]
pub struct Lexer<'a> {
    pos: usize,
    buf: &'a [u8],
}

impl<'a> Lexer<'a> {
    pub fn new(buf: &'a [u8]) -> Lexer<'a> {
        Lexer { pos: 0, buf }
    }

    /// Returns the next lexeme, advancing past it.
    pub fn next(&mut self) -> Result<Substr<'a>> {
        let (lexeme, pos) = self.next_word(true)?;
        self.pos = pos;
        Ok(lexeme)
    }

    /// Returns the previous lexeme, moving to its first byte.
    pub fn back(&mut self) -> Result<Substr<'a>> {
        let (lexeme, pos) = self.next_word(false)?;
        self.pos = pos;
        Ok(lexeme)
    }

    /// Looks at the next lexeme without advancing; an empty substring at
    /// end of input rather than an error.
    pub fn peek(&self) -> Result<Substr<'a>> {
        match self.next_word(true) {
            Ok((substr, _)) => Ok(substr),
            Err(crate::error::PdfError::Eof) => Ok(self.new_substr(self.pos..self.pos)),
            Err(e) => Err(e),
        }
    }

    pub fn next_expect(&mut self, expected: &'static str) -> Result<()> {
        let word = self.next()?;
        if word.equals(expected.as_bytes()) {
            Ok(())
        } else {
            error::UnexpectedLexemeSnafu {
                pos: self.pos,
                lexeme: word.to_string(),
                expected,
            }
            .fail()
        }
    }

    pub fn next_as<T>(&mut self) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.next()?.to::<T>()
    }

    pub fn get_pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn offset_pos(&mut self, offset: usize) -> Substr<'a> {
        let start = self.pos;
        self.pos = (self.pos + offset).min(self.buf.len());
        self.new_substr(start..self.pos)
    }

    pub fn set_pos_from_end(&mut self, from_end: usize) {
        self.pos = self.buf.len().saturating_sub(from_end + 1);
    }

    pub fn get_remaining_slice(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    pub fn read_n(&mut self, n: usize) -> Substr<'a> {
        let start = self.pos;
        self.pos = (self.pos + n).min(self.buf.len());
        self.new_substr(start..self.pos)
    }

    /// Searches backward for `substr`, leaving the position just after it;
    /// used to locate `startxref` from the tail of a file.
    pub fn seek_substr_back(&mut self, substr: &[u8]) -> Result<Substr<'a>> {
        if substr.is_empty() || self.buf.len() < substr.len() {
            return error::ParseSnafu {
                pos: self.pos,
                reason: "substring not found".to_string(),
            }
            .fail();
        }
        let limit = self.pos.min(self.buf.len());
        let found = self.buf[..limit]
            .windows(substr.len())
            .rposition(|w| w == substr);
        match found {
            Some(idx) => {
                let end = idx + substr.len();
                self.pos = end;
                Ok(self.new_substr(idx..end))
            }
            None => error::ParseSnafu {
                pos: self.pos,
                reason: format!("'{}' not found", String::from_utf8_lossy(substr)),
            }
            .fail(),
        }
    }

    fn new_substr(&self, range: Range<usize>) -> Substr<'a> {
        let (start, end) = if range.start <= range.end {
            (range.start, range.end)
        } else {
            (range.end, range.start)
        };
        Substr {
            slice: &self.buf[start..end],
        }
    }

    fn advance_pos(&self, pos: usize, forward: bool) -> Result<usize> {
        if forward {
            if pos < self.buf.len() {
                Ok(pos + 1)
            } else {
                Err(crate::error::PdfError::Eof)
            }
        } else if pos > 0 {
            Ok(pos - 1)
        } else {
            Err(crate::error::PdfError::Eof)
        }
    }

    /// Shared by `next`/`back`/`peek`: skip whitespace and comments, then
    /// consume one lexeme. `<<`/`>>` are each kept as a two-byte lexeme.
    fn next_word(&self, forward: bool) -> Result<(Substr<'a>, usize)> {
        let mut pos = self.pos;

        loop {
            while self.is_whitespace(pos) {
                pos = self.advance_pos(pos, forward)?;
            }
            if self.buf.get(pos) == Some(&b'%') {
                if let Some(off) = self.buf[pos + 1..].iter().position(|&b| b == b'\n') {
                    pos += off + 2;
                } else {
                    pos = self.buf.len();
                }
            } else {
                break;
            }
        }

        if pos >= self.buf.len() {
            return Err(crate::error::PdfError::Eof);
        }

        let start_pos = pos;

        if self.is_delimiter(pos) {
            if (self.buf[pos] == b'<' && self.buf.get(pos + 1) == Some(&b'<'))
                || (self.buf[pos] == b'>' && self.buf.get(pos + 1) == Some(&b'>'))
            {
                pos = self.advance_pos(pos, forward)?;
            }
            pos = self.advance_pos(pos, forward)?;
            return Ok((self.new_substr(start_pos..pos), pos));
        }

        while !self.is_whitespace(pos) && !self.is_delimiter(pos) {
            let new_pos = self.advance_pos(pos, forward)?;
            if new_pos == pos {
                break;
            }
            pos = new_pos;
        }

        let result = self.new_substr(start_pos..pos);

        while self.is_whitespace(pos) {
            match self.advance_pos(pos, forward) {
                Ok(p) => pos = p,
                Err(_) => break,
            }
        }
        Ok((result, pos))
    }

    fn is_whitespace(&self, pos: usize) -> bool {
        matches!(self.buf.get(pos), Some(b' ' | b'\r' | b'\n' | b'\t' | 0))
    }

    fn is_delimiter(&self, pos: usize) -> bool {
        self.buf
            .get(pos)
            .map(|b| b"()<>[]{}/%".contains(b))
            .unwrap_or(false)
    }
}

/// A borrowed lexeme.
#[derive(Clone, Copy)]
pub struct Substr<'a> {
    slice: &'a [u8],
}

impl<'a> Substr<'a> {
    pub fn to_string(&self) -> String {
        self.as_str().to_string()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.slice.to_vec()
    }

    pub fn to<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.as_str()
            .parse::<T>()
            .map_err(|e| crate::error::PdfError::Parse {
                pos: 0,
                reason: e.to_string(),
            })
    }

    pub fn is_integer(&self) -> bool {
        self.to::<i64>().is_ok()
    }

    pub fn is_real_number(&self) -> bool {
        self.to::<f64>().is_ok()
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.slice).unwrap_or("")
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.slice
    }

    pub fn equals(&self, other: &[u8]) -> bool {
        self.slice == other
    }
}

/// Unused by the lexer itself but kept for symmetry with `set_pos_from_end`;
/// spelled out so intent at call sites (`Lexer::new(..).seek(..)`) is
/// obvious without reaching for `std::io::Seek`, which `&[u8]` doesn't
/// implement.
#[allow(dead_code)]
pub(crate) fn seek_from(pos: usize, from: SeekFrom, len: usize) -> usize {
    match from {
        SeekFrom::Start(n) => n as usize,
        SeekFrom::End(n) => (len as i64 + n) as usize,
        SeekFrom::Current(n) => (pos as i64 + n) as usize,
    }
}
