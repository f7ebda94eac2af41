use crate::{
    CHARDATA_CHUNK_LENGTH,
    error::XMLError,
    sax::{error::fatal_error, handler::SAXHandler, parser::XMLReader},
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [15] Comment ::= '<!--' ((Char - '-') | ('-' (Char - '-')))* '-->'
    /// ```
    pub(crate) fn parse_comment(&mut self) -> Result<(), XMLError> {
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"<!--") {
            fatal_error!(
                self,
                ParserInvalidComment,
                "A comment must open with '<!--'."
            );
            return Err(XMLError::ParserInvalidComment);
        }
        // skip '<!--'
        self.consume_markup(4)?;

        self.grow()?;
        let mut text = String::new();
        while !self.source.content_bytes().starts_with(b"-->") {
            if self.source.content_bytes().starts_with(b"--") {
                fatal_error!(
                    self,
                    ParserInvalidComment,
                    "'--' may appear in a comment only as part of the closing delimiter."
                );
            }
            if !self.copy_content_char(&mut text)? {
                return Err(XMLError::ParserUnexpectedEOF);
            }

            // Long comments are delivered in bounded chunks.
            if text.len() >= CHARDATA_CHUNK_LENGTH {
                if !self.fatal_error_occurred {
                    self.handler.comment(&text);
                }
                text.clear();
            }
            // Keep the 3 bytes of lookahead needed for the '-->' check.
            if self.source.content_bytes().len() < 3 {
                self.grow()?;
            }
        }

        if !text.is_empty() && !self.fatal_error_occurred {
            self.handler.comment(&text);
        }
        // skip '-->'
        self.consume_markup(3)?;

        Ok(())
    }
}
