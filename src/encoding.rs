use std::{
    borrow::Cow,
    str::{from_utf8, from_utf8_unchecked},
};

/// Incremental decoder from some character encoding to UTF-8.
///
/// Decoders are streaming: `decode` may be called repeatedly with successive
/// chunks of input, and must leave incomplete trailing sequences unconsumed
/// unless `finish` is set.
pub trait Decoder {
    fn name(&self) -> &'static str;
    /// Determines whether this decoder is the decoder specified by `name`.
    ///
    /// Reference: [Character Sets registered by IANA](https://www.iana.org/assignments/character-sets/character-sets.xhtml)
    fn is_match(&self, name: &str) -> bool;
    /// If no error occurs, return `Ok((read_bytes, write_bytes))`.
    ///
    /// The decoder writes at most `dst.capacity() - dst.len()` bytes and never
    /// reallocates `dst`.
    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input buffer is empty.
    InputIsEmpty,
    /// The length of the output buffer is too short.
    /// If this error is returned, it is guaranteed that the decoder is consuming the input buffer.
    OutputTooShort,
    /// Malformed byte sequence is found.
    ///
    /// The input and output buffer have consumed `read` and `write` bytes respectively.
    /// Malformed sequence occurs `input[read-length-offset..read-offset]`.
    Malformed {
        read: usize,
        write: usize,
        length: usize,
        offset: usize,
    },
    /// Other errors.
    Other { msg: Cow<'static, str> },
}

/// Look up a decoder for an encoding name as written in an XML declaration.
pub fn find_decoder(name: &str) -> Option<Box<dyn Decoder>> {
    let decoders: [Box<dyn Decoder>; 6] = [
        Box::new(UTF8Decoder),
        Box::new(UTF16Decoder::new()),
        Box::new(UTF16BEDecoder),
        Box::new(UTF16LEDecoder),
        Box::new(Latin1Decoder),
        Box::new(ASCIIDecoder),
    ];
    decoders.into_iter().find(|decoder| decoder.is_match(name))
}

const UTF8_NAME: &str = "UTF-8";
fn is_match_with_utf8(name: &str) -> bool {
    name.eq_ignore_ascii_case("UTF-8") || name.eq_ignore_ascii_case("UTF8")
}

pub struct UTF8Decoder;
impl Decoder for UTF8Decoder {
    fn name(&self) -> &'static str {
        UTF8_NAME
    }

    fn is_match(&self, name: &str) -> bool {
        is_match_with_utf8(name)
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        if src.is_empty() {
            return Err(DecodeError::InputIsEmpty);
        }
        let len = dst.capacity() - dst.len();
        if len < 4 {
            return Err(DecodeError::OutputTooShort);
        }

        let len = len.min(src.len());
        match from_utf8(&src[..len]) {
            Ok(s) => {
                dst.push_str(s);
                Ok((len, len))
            }
            Err(err) => {
                let up_to = err.valid_up_to();
                dst.push_str(unsafe {
                    // # Safety
                    // This operation is safe due to the `Utf8Error` constraint.
                    from_utf8_unchecked(&src[..up_to])
                });
                match err.error_len() {
                    Some(len) => Err(DecodeError::Malformed {
                        read: up_to + len,
                        write: up_to,
                        length: len,
                        offset: 0,
                    }),
                    None => {
                        if finish {
                            Err(DecodeError::Malformed {
                                read: len,
                                write: up_to,
                                length: len - up_to,
                                offset: 0,
                            })
                        } else {
                            Ok((up_to, up_to))
                        }
                    }
                }
            }
        }
    }
}

const UTF16_NAME: &str = "UTF-16";
fn is_match_with_utf16(name: &str) -> bool {
    name.eq_ignore_ascii_case("UTF-16") || name.eq_ignore_ascii_case("UTF16")
}

/// Endianness-detecting UTF-16 decoder.
///
/// The first two bytes are examined for a byte-order mark. A BOM is consumed
/// and not emitted; without a BOM the stream is decoded as big-endian, as the
/// RFC 2781 default requires.
pub struct UTF16Decoder {
    read: usize,
    top: [u8; 2],
    be: bool,
}

impl UTF16Decoder {
    pub fn new() -> Self {
        Self {
            read: 0,
            top: [0; 2],
            be: true,
        }
    }
}

impl Default for UTF16Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for UTF16Decoder {
    fn name(&self) -> &'static str {
        UTF16_NAME
    }

    fn is_match(&self, name: &str) -> bool {
        is_match_with_utf16(name)
    }

    fn decode(
        &mut self,
        mut src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        if src.is_empty() {
            return Err(DecodeError::InputIsEmpty);
        }
        if dst.capacity() - dst.len() < 4 {
            return Err(DecodeError::OutputTooShort);
        }

        let mut base = 0;
        if self.read < 2 {
            let orig = src.len();
            while self.read < 2 && !src.is_empty() {
                self.top[self.read] = src[0];
                src = &src[1..];
                self.read += 1;
            }
            base = orig - src.len();
            if self.read < 2 {
                return Ok((base, 0));
            }
            // If the first 2 bytes of the buffer are 0xFF, 0xFE, it is LE;
            // if they are 0xFE, 0xFF, it is BE. Either way the BOM is consumed.
            match self.top {
                [0xFF, 0xFE] => {
                    self.be = false;
                    return Ok((base, 0));
                }
                [0xFE, 0xFF] => {
                    self.be = true;
                    return Ok((base, 0));
                }
                _ => {
                    // No BOM. The two bytes already taken are the first code
                    // unit and must be decoded along with the rest.
                    self.be = true;
                    let (read, write) = self.decode_pending(src, dst, finish)?;
                    return Ok((read - (2 - base), write));
                }
            }
        }

        if self.be {
            UTF16BEDecoder.decode(src, dst, finish)
        } else {
            UTF16LEDecoder.decode(src, dst, finish)
        }
    }
}

impl UTF16Decoder {
    fn decode_pending(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        let mut read = 0;
        let mut write = 0;
        let units = std::iter::once(u16::from_be_bytes(self.top)).chain(
            src.chunks_exact(2)
                .map(|v| u16::from_be_bytes([v[0], v[1]])),
        );
        for c in char::decode_utf16(units) {
            if let Ok(c) = c {
                read += c.len_utf16() * 2;
                write += c.len_utf8();
                dst.push(c);
            } else {
                let rem = src.len() + 2 - read;
                if !finish && rem < 4 {
                    // The pairing code unit may arrive with the next chunk.
                    break;
                }
                return Err(DecodeError::Malformed {
                    read: read + 2,
                    write,
                    length: 2,
                    offset: 0,
                });
            }

            if dst.capacity() - dst.len() < 4 {
                break;
            }
        }
        if read > 0 {
            // The pending code unit has been consumed; mark it as an already
            // seen BOM so later calls take the plain big-endian path.
            self.top = [0xFE, 0xFF];
            Ok((read, write))
        } else {
            Ok((2, 0))
        }
    }
}

const UTF16BE_NAME: &str = "UTF-16BE";
fn is_match_with_utf16be(name: &str) -> bool {
    name.eq_ignore_ascii_case("UTF-16BE") || name.eq_ignore_ascii_case("UTF16BE")
}

pub struct UTF16BEDecoder;
impl Decoder for UTF16BEDecoder {
    fn name(&self) -> &'static str {
        UTF16BE_NAME
    }

    fn is_match(&self, name: &str) -> bool {
        is_match_with_utf16be(name)
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        decode_utf16_units(src, dst, finish, u16::from_be_bytes)
    }
}

const UTF16LE_NAME: &str = "UTF-16LE";
fn is_match_with_utf16le(name: &str) -> bool {
    name.eq_ignore_ascii_case("UTF-16LE") || name.eq_ignore_ascii_case("UTF16LE")
}

pub struct UTF16LEDecoder;
impl Decoder for UTF16LEDecoder {
    fn name(&self) -> &'static str {
        UTF16LE_NAME
    }

    fn is_match(&self, name: &str) -> bool {
        is_match_with_utf16le(name)
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        decode_utf16_units(src, dst, finish, u16::from_le_bytes)
    }
}

fn decode_utf16_units(
    src: &[u8],
    dst: &mut String,
    finish: bool,
    to_unit: fn([u8; 2]) -> u16,
) -> Result<(usize, usize), DecodeError> {
    if src.is_empty() {
        return Err(DecodeError::InputIsEmpty);
    }
    if dst.capacity() - dst.len() < 4 {
        return Err(DecodeError::OutputTooShort);
    }

    let mut read = 0;
    let mut write = 0;
    for c in char::decode_utf16(src.chunks_exact(2).map(|v| to_unit([v[0], v[1]]))) {
        if let Ok(c) = c {
            read += c.len_utf16() * 2;
            write += c.len_utf8();
            dst.push(c);
        } else {
            let rem = src.len() - read;
            if !finish && rem < 4 {
                // An unpaired high surrogate at the end of the chunk may be
                // completed by the next chunk.
                break;
            }
            return Err(DecodeError::Malformed {
                read: read + 2,
                write,
                length: 2,
                offset: 0,
            });
        }

        if dst.capacity() - dst.len() < 4 {
            break;
        }
    }

    Ok((read, write))
}

const LATIN1_NAME: &str = "ISO-8859-1";
fn is_match_with_latin1(name: &str) -> bool {
    name.eq_ignore_ascii_case("ISO-8859-1")
        || name.eq_ignore_ascii_case("ISO8859-1")
        || name.eq_ignore_ascii_case("latin1")
        || name.eq_ignore_ascii_case("ISO_8859-1")
}

pub struct Latin1Decoder;
impl Decoder for Latin1Decoder {
    fn name(&self) -> &'static str {
        LATIN1_NAME
    }

    fn is_match(&self, name: &str) -> bool {
        is_match_with_latin1(name)
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        _finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        if src.is_empty() {
            return Err(DecodeError::InputIsEmpty);
        }
        if dst.capacity() - dst.len() < 4 {
            return Err(DecodeError::OutputTooShort);
        }

        let mut read = 0;
        let mut write = 0;
        for &b in src {
            // Latin-1 maps each byte to the same Unicode codepoint.
            let c = b as char;
            read += 1;
            write += c.len_utf8();
            dst.push(c);
            if dst.capacity() - dst.len() < 4 {
                break;
            }
        }
        Ok((read, write))
    }
}

const ASCII_NAME: &str = "US-ASCII";
fn is_match_with_ascii(name: &str) -> bool {
    name.eq_ignore_ascii_case("US-ASCII")
        || name.eq_ignore_ascii_case("ASCII")
        || name.eq_ignore_ascii_case("ANSI_X3.4-1968")
}

pub struct ASCIIDecoder;
impl Decoder for ASCIIDecoder {
    fn name(&self) -> &'static str {
        ASCII_NAME
    }

    fn is_match(&self, name: &str) -> bool {
        is_match_with_ascii(name)
    }

    fn decode(
        &mut self,
        src: &[u8],
        dst: &mut String,
        _finish: bool,
    ) -> Result<(usize, usize), DecodeError> {
        if src.is_empty() {
            return Err(DecodeError::InputIsEmpty);
        }
        if dst.capacity() - dst.len() < 4 {
            return Err(DecodeError::OutputTooShort);
        }

        let mut read = 0;
        for &b in src {
            if b >= 0x80 {
                return Err(DecodeError::Malformed {
                    read: read + 1,
                    write: read,
                    length: 1,
                    offset: 0,
                });
            }
            dst.push(b as char);
            read += 1;
            if dst.capacity() - dst.len() < 4 {
                break;
            }
        }
        Ok((read, read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut dyn Decoder, mut src: &[u8]) -> Result<String, DecodeError> {
        let mut dst = String::new();
        while !src.is_empty() {
            dst.reserve(64);
            let (read, _) = decoder.decode(src, &mut dst, true)?;
            src = &src[read..];
        }
        Ok(dst)
    }

    #[test]
    fn utf16_with_bom() {
        let text = "<doc>\u{3042}</doc>";
        let mut le = vec![0xFF, 0xFE];
        let mut be = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            le.extend(unit.to_le_bytes());
            be.extend(unit.to_be_bytes());
        }

        assert_eq!(decode_all(&mut UTF16Decoder::new(), &le).unwrap(), text);
        assert_eq!(decode_all(&mut UTF16Decoder::new(), &be).unwrap(), text);
    }

    #[test]
    fn utf16_without_bom_defaults_to_be() {
        let text = "<a/>";
        let mut be = vec![];
        for unit in text.encode_utf16() {
            be.extend(unit.to_be_bytes());
        }
        assert_eq!(decode_all(&mut UTF16Decoder::new(), &be).unwrap(), text);
    }

    #[test]
    fn utf8_malformed_sequence() {
        let mut dst = String::with_capacity(64);
        let err = UTF8Decoder.decode(&[b'a', 0xFF, b'b'], &mut dst, true);
        assert!(matches!(err, Err(DecodeError::Malformed { write: 1, .. })));
        assert_eq!(dst, "a");
    }

    #[test]
    fn latin1_and_ascii() {
        assert_eq!(
            decode_all(&mut Latin1Decoder, &[b'a', 0xE9, b'b']).unwrap(),
            "a\u{e9}b"
        );
        assert!(decode_all(&mut ASCIIDecoder, &[b'a', 0xE9]).is_err());
    }

    #[test]
    fn decoder_lookup_is_case_insensitive() {
        assert_eq!(find_decoder("utf-8").unwrap().name(), "UTF-8");
        assert_eq!(find_decoder("Utf-16le").unwrap().name(), "UTF-16LE");
        assert_eq!(find_decoder("iso-8859-1").unwrap().name(), "ISO-8859-1");
        assert!(find_decoder("EBCDIC").is_none());
    }
}
