//! Best-effort decoder for PHP `serialize()` output.
//!
//! The vendor stores some record fields (access lists, metadata) as PHP
//! serialized strings. This decoder understands the forms those fields use:
//! `N;`, `b:`, `i:`, `d:`, `s:`, `a:` and `O:` (objects decode to a map of
//! their properties). Strings stay as raw bytes, both as keys and values.
//! Malformed input is an error; there is no recovery.
//!
//! # Design
//! A hand-written recursive descent over the byte slice. `php_serde` was
//! considered, but it deserializes into serde types chosen up front, while
//! these fields are untyped and must land in the crate's own `Value` with
//! byte-string keys intact. A nesting limit bounds recursion on hostile
//! input.

use thiserror::Error;

use crate::value::{Key, Map, Value};

/// Maximum array nesting accepted before giving up.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhpError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("expected {expected} at byte {pos}")]
    Expected { pos: usize, expected: &'static str },

    #[error("invalid number at byte {0}")]
    InvalidNumber(usize),

    #[error("unsupported type tag {tag:?} at byte {pos}")]
    UnsupportedType { pos: usize, tag: char },

    #[error("trailing data at byte {0}")]
    TrailingData(usize),

    #[error("nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Decode a complete serialized value.
pub fn unserialize(input: &[u8]) -> Result<Value, PhpError> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != input.len() {
        return Err(PhpError::TrailingData(parser.pos));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn value(&mut self, depth: usize) -> Result<Value, PhpError> {
        if depth > MAX_DEPTH {
            return Err(PhpError::TooDeep(MAX_DEPTH));
        }
        let start = self.pos;
        match self.next()? {
            b'N' => {
                self.expect(b';', "';'")?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':', "':'")?;
                Ok(Value::Bool(self.integer(b';')? != 0))
            }
            b'i' => {
                self.expect(b':', "':'")?;
                Ok(Value::Int(self.integer(b';')?))
            }
            b'd' => {
                self.expect(b':', "':'")?;
                Ok(Value::Float(self.float(b';')?))
            }
            b's' => {
                self.expect(b':', "':'")?;
                Ok(Value::Bytes(self.string()?.to_vec()))
            }
            b'a' => {
                self.expect(b':', "':'")?;
                let map = self.entries(depth)?;
                Ok(Value::Map(map))
            }
            b'O' => {
                self.expect(b':', "':'")?;
                // class name is dropped; properties are all the vendor needs
                let _class = self.quoted(b':')?;
                let map = self.entries(depth)?;
                Ok(Value::Map(map))
            }
            tag => Err(PhpError::UnsupportedType {
                pos: start,
                tag: tag as char,
            }),
        }
    }

    /// `<count>:{<key><value>...}`
    fn entries(&mut self, depth: usize) -> Result<Map, PhpError> {
        let count = self.length(b':')?;
        self.expect(b'{', "'{'")?;
        let mut map = Map::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.key()?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);
        }
        self.expect(b'}', "'}'")?;
        Ok(map)
    }

    fn key(&mut self) -> Result<Key, PhpError> {
        let pos = self.pos;
        match self.next()? {
            b'i' => {
                self.expect(b':', "':'")?;
                Ok(Key::Int(self.integer(b';')?))
            }
            b's' => {
                self.expect(b':', "':'")?;
                Ok(Key::Bytes(self.string()?.to_vec()))
            }
            _ => Err(PhpError::Expected {
                pos,
                expected: "integer or string key",
            }),
        }
    }

    /// `<len>:"<bytes>";`
    fn string(&mut self) -> Result<&'a [u8], PhpError> {
        let bytes = self.quoted(b';')?;
        Ok(bytes)
    }

    /// `<len>:"<bytes>"` followed by `terminator`.
    fn quoted(&mut self, terminator: u8) -> Result<&'a [u8], PhpError> {
        let len = self.length(b':')?;
        self.expect(b'"', "'\"'")?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or(PhpError::UnexpectedEof(self.input.len()))?;
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        self.expect(b'"', "'\"'")?;
        self.expect(terminator, "terminator")?;
        Ok(bytes)
    }

    fn length(&mut self, terminator: u8) -> Result<usize, PhpError> {
        let pos = self.pos;
        let n = self.integer(terminator)?;
        usize::try_from(n).map_err(|_| PhpError::InvalidNumber(pos))
    }

    fn integer(&mut self, terminator: u8) -> Result<i64, PhpError> {
        let pos = self.pos;
        let raw = self.until(terminator)?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(PhpError::InvalidNumber(pos))
    }

    fn float(&mut self, terminator: u8) -> Result<f64, PhpError> {
        let pos = self.pos;
        let raw = self.until(terminator)?;
        let text = std::str::from_utf8(raw).map_err(|_| PhpError::InvalidNumber(pos))?;
        match text {
            "INF" => Ok(f64::INFINITY),
            "-INF" => Ok(f64::NEG_INFINITY),
            "NAN" => Ok(f64::NAN),
            _ => text.parse::<f64>().map_err(|_| PhpError::InvalidNumber(pos)),
        }
    }

    fn until(&mut self, terminator: u8) -> Result<&'a [u8], PhpError> {
        let rest = &self.input[self.pos..];
        let offset = rest
            .iter()
            .position(|b| *b == terminator)
            .ok_or(PhpError::UnexpectedEof(self.input.len()))?;
        let raw = &rest[..offset];
        self.pos += offset + 1;
        Ok(raw)
    }

    fn next(&mut self) -> Result<u8, PhpError> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(PhpError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), PhpError> {
        let pos = self.pos;
        if self.next()? == byte {
            Ok(())
        } else {
            Err(PhpError::Expected { pos, expected })
        }
    }
}
