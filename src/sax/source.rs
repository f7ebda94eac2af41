use std::{
    io::Read,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    encoding::{DecodeError, Decoder, UTF8Decoder, UTF16BEDecoder, UTF16LEDecoder, find_decoder},
    error::XMLError,
};

const INPUT_CHUNK: usize = 4096;
const GROW_THRESHOLD: usize = 16;

static SOURCE_ID: AtomicUsize = AtomicUsize::new(1);

fn new_source_id() -> usize {
    SOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// One entity frame: an optional underlying byte stream, the raw bytes read
/// from it, a decoder, and the decoded text with a read cursor.
///
/// Sources form a strict stack inside the reader; only the innermost source is
/// read at any time.
pub struct InputSource<'a> {
    source: Box<dyn Read + 'a>,
    /// Bytes read from `source` but not yet decoded: `buffer[buffer_next..]`
    buffer: Vec<u8>,
    decoder: Box<dyn Decoder>,
    /// Decoded text; the unconsumed part is `decoded[decoded_next..]`
    decoded: String,
    buffer_next: usize,
    decoded_next: usize,
    /// Total number of bytes read from `source`
    total_read: usize,
    /// Whether `source` has reached EOF
    eof: bool,
    source_id: usize,
    system_id: Option<Arc<str>>,
    public_id: Option<Arc<str>>,
}

impl<'a> InputSource<'a> {
    /// Wrap a byte stream, sniffing the encoding signature unless `encoding`
    /// names the encoding explicitly.
    pub fn from_reader(reader: impl Read + 'a, encoding: Option<&str>) -> Result<Self, XMLError> {
        let mut ret = Self::default();
        ret.source = Box::new(reader);
        ret.eof = false;

        // Handling strange implementations that write only one byte per read
        let mut chunk = [0u8; INPUT_CHUNK];
        while ret.buffer.len() < INPUT_CHUNK {
            let read = ret.source.read(&mut chunk[..INPUT_CHUNK - ret.buffer.len()])?;
            if read == 0 {
                ret.eof = true;
                break;
            }
            ret.buffer.extend_from_slice(&chunk[..read]);
            ret.total_read += read;
        }

        if let Some(encoding) = encoding {
            let Some(decoder) = find_decoder(encoding) else {
                return Err(XMLError::ParserUnsupportedEncoding);
            };
            // A signature matching the declared encoding is consumed here so
            // it does not surface as document content.
            match (decoder.name(), ret.buffer.as_slice()) {
                ("UTF-8", [0xEF, 0xBB, 0xBF, ..]) => ret.buffer_next = 3,
                ("UTF-16BE", [0xFE, 0xFF, ..]) => ret.buffer_next = 2,
                ("UTF-16LE", [0xFF, 0xFE, ..]) => ret.buffer_next = 2,
                // The endianness-detecting UTF-16 decoder consumes its own BOM.
                _ => {}
            }
            ret.decoder = decoder;
            return Ok(ret);
        }

        if ret.buffer.len() < 4 {
            // The minimum byte count for well-formed XML is 4 bytes
            // (a document containing only an empty tag with a length of 1),
            // so if the number of bytes read is less than 4 bytes,
            // encoding detection is not possible.
            return Ok(ret);
        }

        match ret.buffer[..4] {
            // Cases where BOM was found:
            // UCS-4, big-endian machine (1234 order)
            [0x00, 0x00, 0xFE, 0xFF] => return Err(XMLError::ParserUnsupportedEncoding),
            // UCS-4, little-endian machine (4321 order)
            [0xFF, 0xFE, 0x00, 0x00] => return Err(XMLError::ParserUnsupportedEncoding),
            // UCS-4, unusual octet order (2143)
            [0x00, 0x00, 0xFF, 0xFE] => return Err(XMLError::ParserUnsupportedEncoding),
            // UCS-4, unusual octet order (3412)
            [0xFE, 0xFF, 0x00, 0x00] => return Err(XMLError::ParserUnsupportedEncoding),
            // UTF-16, big-endian
            [0xFE, 0xFF, ..] => {
                ret.buffer_next = 2;
                ret.decoder = Box::new(UTF16BEDecoder);
            }
            // UTF-16, little-endian
            [0xFF, 0xFE, ..] => {
                ret.buffer_next = 2;
                ret.decoder = Box::new(UTF16LEDecoder);
            }
            // UTF-8
            [0xEF, 0xBB, 0xBF, ..] => {
                ret.buffer_next = 3;
                ret.decoder = Box::new(UTF8Decoder);
            }
            // Cases where BOM was not found:
            // UCS-4 or other 32-bit encoding, big-endian machine (1234 order)
            [0x00, 0x00, 0x00, 0x3C] => return Err(XMLError::ParserUnsupportedEncoding),
            // UCS-4 or other 32-bit encoding, little-endian machine (4321 order)
            [0x3C, 0x00, 0x00, 0x00] => return Err(XMLError::ParserUnsupportedEncoding),
            // UCS-4 or other 32-bit encoding, unusual octet order (2143)
            [0x00, 0x00, 0x3C, 0x00] => return Err(XMLError::ParserUnsupportedEncoding),
            // UCS-4 or other 32-bit encoding, unusual octet order (3412)
            [0x00, 0x3C, 0x00, 0x00] => return Err(XMLError::ParserUnsupportedEncoding),
            // UTF-16 without a byte-order mark. The XML recommendation requires
            // UTF-16 text to carry a BOM, so this is rejected rather than
            // guessed at.
            [0x00, 0x3C, 0x00, 0x3F] => return Err(XMLError::ParserUnsupportedEncoding),
            [0x3C, 0x00, 0x3F, 0x00] => return Err(XMLError::ParserUnsupportedEncoding),
            // EBCDIC (in some flavor; the full encoding declaration must be read to tell
            // which code page is in use)
            [0x4C, 0x6F, 0xA7, 0x94] => return Err(XMLError::ParserUnsupportedEncoding),
            // An ASCII-compatible encoding, or no XML declaration at all.
            // Decode optimistically as UTF-8; the encoding declaration, if
            // any, may switch the decoder afterwards.
            _ => {
                ret.decoder = Box::new(UTF8Decoder);
            }
        };
        Ok(ret)
    }

    /// Wrap in-memory replacement text, already decoded.
    pub fn from_content(str: &str) -> Self {
        Self {
            source: Box::new(std::io::empty()),
            buffer: vec![],
            decoder: Box::new(UTF8Decoder),
            decoded: str.to_owned(),
            buffer_next: 0,
            decoded_next: 0,
            total_read: str.len(),
            eof: true,
            source_id: new_source_id(),
            system_id: None,
            public_id: None,
        }
    }

    /// Refill the raw buffer from the underlying stream and decode what is
    /// available.
    ///
    /// If the decoder reports a malformed sequence but still made progress,
    /// the error is deferred until the malformed bytes themselves are reached;
    /// the decoder chosen from the signature may yet be replaced by the
    /// encoding declaration.
    pub fn grow(&mut self) -> Result<(), XMLError> {
        if !self.eof {
            let rem = self.buffer.len() - self.buffer_next;
            if rem < GROW_THRESHOLD {
                self.buffer.drain(..self.buffer_next);
                self.buffer_next = 0;
                let mut chunk = [0u8; INPUT_CHUNK];
                while self.buffer.len() < INPUT_CHUNK {
                    let read = self
                        .source
                        .read(&mut chunk[..INPUT_CHUNK - self.buffer.len()])?;
                    if read == 0 {
                        self.eof = true;
                        break;
                    }
                    self.buffer.extend_from_slice(&chunk[..read]);
                    self.total_read += read;
                }
            }
        }

        let rem = self.buffer.len() - self.buffer_next;
        if rem > 0 {
            if self.decoded.capacity() - self.decoded.len() < GROW_THRESHOLD {
                self.decoded.drain(..self.decoded_next);
                self.decoded_next = 0;
                self.decoded.reserve(INPUT_CHUNK);
            }
            match self.decoder.decode(
                &self.buffer[self.buffer_next..],
                &mut self.decoded,
                self.eof,
            ) {
                Ok((read, _)) => {
                    self.buffer_next += read;
                }
                Err(e) => match e {
                    DecodeError::Malformed {
                        read,
                        write: _,
                        length,
                        offset,
                    } => {
                        let actual_read = read - offset - length;
                        if actual_read > 0 {
                            self.buffer_next += actual_read;
                        } else {
                            return Err(From::from(e));
                        }
                    }
                    _ => return Err(From::from(e)),
                },
            }
        }
        Ok(())
    }

    /// The decoded but unconsumed text as bytes.
    pub fn content_bytes(&self) -> &[u8] {
        &self.decoded.as_bytes()[self.decoded_next..]
    }

    pub fn next_char(&mut self) -> Result<Option<char>, XMLError> {
        Ok(self
            .peek_char()?
            .inspect(|c| self.decoded_next += c.len_utf8()))
    }

    pub fn peek_char(&mut self) -> Result<Option<char>, XMLError> {
        if let Some(c) = self.decoded[self.decoded_next..].chars().next() {
            return Ok(Some(c));
        }
        self.grow()?;
        Ok(self.decoded[self.decoded_next..].chars().next())
    }

    /// Consume and return the next character only if it satisfies `pred`.
    pub fn next_char_if(
        &mut self,
        pred: impl FnOnce(char) -> bool,
    ) -> Result<Option<char>, XMLError> {
        match self.peek_char()? {
            Some(c) if pred(c) => {
                self.decoded_next += c.len_utf8();
                Ok(Some(c))
            }
            _ => Ok(None),
        }
    }

    /// Consume `len` bytes of decoded text. `len` must not split a character.
    pub fn advance(&mut self, mut len: usize) -> Result<(), XMLError> {
        while len > 0 {
            self.grow()?;
            let l = len.min(self.decoded.len() - self.decoded_next);
            assert!(l > 0);
            assert!(self.decoded.is_char_boundary(self.decoded_next + l));
            self.decoded_next += l;
            len -= l;
        }
        Ok(())
    }

    /// Returns `true` if both the decoded but unused string
    /// and the read but undecoded data are 0 bytes.
    ///
    /// # Note
    /// Returning `true` does not mean that EOF has been reached.
    /// If all of the read data has been decoded and you continue to consume the decoded strings
    /// without explicitly calling `grow`, this function may return `true` before reaching EOF.
    pub fn is_empty(&self) -> bool {
        self.decoded.len() - self.decoded_next == 0 && self.buffer.len() - self.buffer_next == 0
    }

    pub fn encoding_name(&self) -> &'static str {
        self.decoder.name()
    }

    /// Unique identity of this source, used for proper-nesting checks across
    /// entity boundaries.
    pub(crate) fn source_id(&self) -> usize {
        self.source_id
    }

    pub fn system_id(&self) -> Option<Arc<str>> {
        self.system_id.clone()
    }

    pub fn public_id(&self) -> Option<Arc<str>> {
        self.public_id.clone()
    }

    pub fn set_system_id(&mut self, system_id: impl Into<Arc<str>>) {
        self.system_id = Some(system_id.into());
    }

    pub fn set_public_id(&mut self, public_id: impl Into<Arc<str>>) {
        self.public_id = Some(public_id.into());
    }

    /// Replace the decoder with the one named in an encoding declaration.
    ///
    /// Text decoded beyond the declaration itself was produced by the
    /// signature-derived decoder. The UTF-8 path is reversible, so that tail
    /// is re-encoded and fed back through the new decoder. Declaring an
    /// incompatible code-unit width is an error; the signature already fixed
    /// it.
    pub(crate) fn switch_encoding(&mut self, to: &str) -> Result<(), XMLError> {
        if self.decoder.is_match(to) {
            return Ok(());
        }

        let utf16 = self.decoder.name().starts_with("UTF-16");
        let Some(decoder) = find_decoder(to) else {
            return Err(XMLError::ParserUnsupportedEncoding);
        };
        if decoder.name().starts_with("UTF-16") != utf16 {
            return Err(XMLError::ParserUnsupportedEncoding);
        }
        if utf16 {
            // The BOM fixed the endianness; any UTF-16 family declaration is
            // consistent with the current decoder.
            return Ok(());
        }

        let tail = self.decoded.split_off(self.decoded_next);
        self.buffer
            .splice(self.buffer_next..self.buffer_next, tail.into_bytes());
        self.decoder = decoder;
        Ok(())
    }
}

impl Default for InputSource<'_> {
    fn default() -> Self {
        Self {
            source: Box::new(std::io::empty()),
            buffer: vec![],
            decoder: Box::new(UTF8Decoder),
            decoded: String::new(),
            buffer_next: 0,
            decoded_next: 0,
            total_read: 0,
            eof: true,
            source_id: new_source_id(),
            system_id: None,
            public_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_signature_is_consumed() {
        let mut source =
            InputSource::from_reader(&[0xEF, 0xBB, 0xBF, b'<', b'a', b'/', b'>'][..], None)
                .unwrap();
        source.grow().unwrap();
        assert_eq!(source.content_bytes(), b"<a/>");
        assert_eq!(source.encoding_name(), "UTF-8");
    }

    #[test]
    fn utf16le_signature_selects_decoder() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend(unit.to_le_bytes());
        }
        let mut source = InputSource::from_reader(&bytes[..], None).unwrap();
        source.grow().unwrap();
        assert_eq!(source.content_bytes(), b"<a/>");
        assert_eq!(source.encoding_name(), "UTF-16LE");
    }

    #[test]
    fn utf16_without_signature_is_rejected() {
        let mut bytes = vec![];
        for unit in "<?xml version=\"1.0\"?><a/>".encode_utf16() {
            bytes.extend(unit.to_le_bytes());
        }
        assert!(matches!(
            InputSource::from_reader(&bytes[..], None),
            Err(XMLError::ParserUnsupportedEncoding)
        ));
    }

    #[test]
    fn switch_encoding_refeeds_decoded_tail() {
        // 0xE9 is valid Latin-1 but malformed UTF-8, so it must survive an
        // optimistic UTF-8 start followed by a switch.
        let bytes = b"abc\xE9def".to_vec();
        let mut source = InputSource::from_reader(&bytes[..], None).unwrap();
        source.grow().ok();
        source.switch_encoding("ISO-8859-1").unwrap();
        let mut out = String::new();
        while let Some(c) = source.next_char().unwrap() {
            out.push(c);
        }
        assert_eq!(out, "abc\u{e9}def");
    }
}
