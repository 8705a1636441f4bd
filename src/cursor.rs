//! Positional reading of DNS wire data and encoding of outgoing names.
//!
//! [`ByteCursor`] walks a received datagram front to back. Every read is
//! bounds-checked and fails with [`FormatError::OutOfBounds`] instead of
//! panicking, so arbitrary bytes from the network can be fed to it.
//!
//! Domain names are decompressed per RFC 1035 §4.1.4 against the *whole*
//! buffer the cursor was created over, which is why records are never
//! decoded from a private sub-slice.

use crate::error::{FormatError, NameError};

/// Longest label allowed on the wire.
pub const MAX_LABEL_LEN: usize = 63;

/// Longest encoded name, counting length octets and the terminating zero.
pub const MAX_NAME_LEN: usize = 255;

const POINTER_MASK: u8 = 0b1100_0000;

/// A read position over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Starts a cursor at offset 0 of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        ByteCursor { buf, pos: 0 }
    }

    /// Offset of the next read from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor. Positions past the end are allowed; the next read
    /// from there fails.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Bytes left after the current position.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// [`FormatError::OutOfBounds`] at the end of the buffer. A failed read
    /// does not move the cursor; the same holds for the wider reads below.
    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a big-endian `u16`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dns_trace::cursor::ByteCursor;
    ///
    /// let mut cursor = ByteCursor::new(&[0x81, 0x80, 0x00]);
    /// assert_eq!(cursor.read_u16().unwrap(), 0x8180);
    /// assert!(cursor.read_u16().is_err());
    /// assert_eq!(cursor.position(), 2);
    /// ```
    pub fn read_u16(&mut self) -> Result<u16, FormatError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, FormatError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Returns the next `n` bytes verbatim.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        self.take(n)
    }

    /// Decodes a possibly compressed domain name at the current position.
    ///
    /// Labels are joined with `.`; the root name decodes to the empty
    /// string. Label bytes that would not survive that form are escaped the
    /// way zone files write them: `\.` for a dot inside a label, `\\` for
    /// a backslash and `\DDD` (three decimal digits) for anything outside
    /// printable ASCII. [`encode_name`] reverses the escaping, so the wire
    /// bytes of every decoded name survive a re-encode.
    ///
    /// When the name contains compression pointers the cursor ends up right
    /// after the *first* pointer, otherwise right after the terminating zero
    /// octet. Each pointer must target an offset strictly below the pointer
    /// itself and below every target already followed for this name, so
    /// decoding terminates on any input.
    ///
    /// # Errors
    ///
    /// [`FormatError::BadPointer`] for a pointer that breaks that rule,
    /// [`FormatError::ReservedLabel`] for the `01`/`10` label types,
    /// [`FormatError::NameTooLong`] past 255 octets and
    /// [`FormatError::OutOfBounds`] when the name runs off the buffer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dns_trace::cursor::ByteCursor;
    ///
    /// let data = [2, b'c', b's', 3, b'e', b'd', b'u', 0, 0xc0, 0x03];
    /// let mut cursor = ByteCursor::new(&data);
    /// cursor.set_position(8);
    /// assert_eq!(cursor.read_name().unwrap(), "edu");
    /// assert_eq!(cursor.position(), 10);
    ///
    /// let odd = [3, b'a', b'.', 0xff, 0];
    /// assert_eq!(ByteCursor::new(&odd).read_name().unwrap(), "a\\.\\255");
    /// ```
    pub fn read_name(&mut self) -> Result<String, FormatError> {
        let mut pos = self.pos;
        let mut labels: Vec<String> = Vec::new();
        let mut resume: Option<usize> = None;
        let mut lowest_target = usize::MAX;
        let mut wire_len = 1;

        loop {
            let len = self.byte_at(pos)?;
            match len & POINTER_MASK {
                POINTER_MASK => {
                    let low = self.byte_at(pos + 1)?;
                    let target = (usize::from(len & !POINTER_MASK) << 8) | usize::from(low);
                    // Targets strictly decrease, which also bounds the jump count.
                    if target >= pos.min(lowest_target) {
                        return Err(FormatError::BadPointer { at: pos, target });
                    }
                    resume.get_or_insert(pos + 2);
                    lowest_target = target;
                    pos = target;
                }
                0 => {
                    pos += 1;
                    if len == 0 {
                        break;
                    }
                    let len = usize::from(len);
                    let label = self.buf.get(pos..pos + len).ok_or(FormatError::OutOfBounds {
                        position: pos,
                        needed: len,
                        remaining: self.buf.len().saturating_sub(pos),
                    })?;
                    wire_len += len + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(FormatError::NameTooLong);
                    }
                    labels.push(escape_label(label));
                    pos += len;
                }
                _ => return Err(FormatError::ReservedLabel(len)),
            }
        }

        self.pos = resume.unwrap_or(pos);
        Ok(labels.join("."))
    }

    fn byte_at(&self, pos: usize) -> Result<u8, FormatError> {
        self.buf.get(pos).copied().ok_or(FormatError::OutOfBounds {
            position: pos,
            needed: 1,
            remaining: 0,
        })
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(FormatError::OutOfBounds {
                position: self.pos,
                needed: n,
                remaining,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }
}

fn escape_label(label: &[u8]) -> String {
    let mut out = String::with_capacity(label.len());
    for &byte in label {
        match byte {
            b'.' | b'\\' => {
                out.push('\\');
                out.push(char::from(byte));
            }
            0x21..=0x7e => out.push(char::from(byte)),
            _ => out.push_str(&format!("\\{:03}", byte)),
        }
    }
    out
}

/// Splits a presentation-format name into raw labels, undoing the escapes
/// written by [`ByteCursor::read_name`].
fn parse_labels(name: &str) -> Result<Vec<Vec<u8>>, NameError> {
    if name.is_empty() || name == "." {
        return Ok(Vec::new());
    }

    let mut labels = Vec::new();
    let mut label = Vec::new();
    let mut trailing_dot = false;
    let mut bytes = name.bytes();
    while let Some(byte) = bytes.next() {
        trailing_dot = false;
        match byte {
            b'.' => {
                if label.is_empty() {
                    return Err(NameError::EmptyLabel(name.to_string()));
                }
                labels.push(std::mem::take(&mut label));
                trailing_dot = true;
            }
            b'\\' => {
                let unescaped =
                    unescape(&mut bytes).ok_or_else(|| NameError::BadEscape(name.to_string()))?;
                label.push(unescaped);
            }
            _ => label.push(byte),
        }
    }
    if !trailing_dot {
        labels.push(label);
    }
    Ok(labels)
}

/// Reads what follows a backslash: `DDD` or a single literal byte.
fn unescape(bytes: &mut impl Iterator<Item = u8>) -> Option<u8> {
    let first = bytes.next()?;
    if !first.is_ascii_digit() {
        return Some(first);
    }
    let mut value = u32::from(first - b'0');
    for _ in 0..2 {
        let digit = bytes.next().filter(u8::is_ascii_digit)?;
        value = value * 10 + u32::from(digit - b'0');
    }
    u8::try_from(value).ok()
}

/// Appends `name` to `buffer` as uncompressed length-prefixed labels.
///
/// A single trailing dot is accepted, and both `""` and `"."` encode the
/// root as one zero octet. `\.`, `\\` and `\DDD` escapes inside labels are
/// decoded to the bytes they stand for. On error nothing is written.
///
/// # Errors
///
/// Returns a [`NameError`] for an empty interior label, a label over 63
/// octets, an encoded name over 255 octets or a malformed escape.
///
/// # Examples
///
/// ```rust
/// use dns_trace::cursor::encode_name;
///
/// let mut buffer = Vec::new();
/// encode_name(&mut buffer, "cs.berkeley.edu").unwrap();
/// assert_eq!(buffer[0], 2);
/// assert_eq!(buffer.len(), 17);
/// ```
pub fn encode_name(buffer: &mut Vec<u8>, name: &str) -> Result<(), NameError> {
    let labels = parse_labels(name)?;

    let mut length = 1;
    for label in &labels {
        if label.len() > MAX_LABEL_LEN {
            return Err(NameError::LabelTooLong(escape_label(label)));
        }
        length += label.len() + 1;
    }
    if length > MAX_NAME_LEN {
        return Err(NameError::NameTooLong {
            name: name.to_string(),
            length,
        });
    }

    buffer.reserve(length);
    for label in &labels {
        buffer.push(label.len() as u8);
        buffer.extend_from_slice(label);
    }
    buffer.push(0);
    Ok(())
}
