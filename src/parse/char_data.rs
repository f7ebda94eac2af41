use crate::{
    CHARDATA_CHUNK_LENGTH,
    error::XMLError,
    sax::{error::fatal_error, handler::SAXHandler, parser::XMLReader},
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// Character references are resolved here and folded into the
    /// surrounding data, so a run of text interleaved with references is
    /// still delivered as contiguous `characters` events.
    ///
    /// ```text
    /// [14] CharData ::= [^<&]* - ([^<&]* ']]>' [^<&]*)
    /// ```
    pub(crate) fn parse_char_data(&mut self) -> Result<(), XMLError> {
        self.grow()?;

        let mut buffer = String::new();
        loop {
            // Keep at least 3 bytes buffered so a ']]>' split across refills
            // cannot be missed.
            if self.source.content_bytes().len() < 3 {
                self.grow()?;
            }
            match self.source.content_bytes() {
                [] => break,
                [b'&', b'#', ..] => {
                    let c = self.parse_char_ref()?;
                    buffer.push(c);
                }
                [b'<' | b'&', ..] => break,
                bytes => {
                    if bytes.starts_with(b"]]>") {
                        fatal_error!(
                            self,
                            ParserUnacceptablePatternInCharData,
                            "Character data must not contain the sequence ']]>'."
                        );
                    }
                    self.copy_content_char(&mut buffer)?;
                }
            }

            if buffer.len() >= CHARDATA_CHUNK_LENGTH {
                if !self.fatal_error_occurred {
                    self.handler.characters(&buffer);
                }
                buffer.clear();
            }
        }

        if !buffer.is_empty() && !self.fatal_error_occurred {
            self.handler.characters(&buffer);
        }

        Ok(())
    }
}
