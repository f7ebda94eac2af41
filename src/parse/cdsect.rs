use crate::{
    CHARDATA_CHUNK_LENGTH,
    error::XMLError,
    sax::{error::fatal_error, handler::SAXHandler, parser::XMLReader},
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [18] CDSect  ::= CDStart CData CDEnd
    /// [19] CDStart ::= '<![CDATA['
    /// [20] CData   ::= (Char* - (Char* ']]>' Char*))
    /// [21] CDEnd   ::= ']]>'
    /// ```
    pub(crate) fn parse_cdsect(&mut self) -> Result<(), XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"<![CDATA[") {
            fatal_error!(
                self,
                ParserInvalidCDSect,
                "A CDATA section must open with '<![CDATA['."
            );
            return Err(XMLError::ParserInvalidCDSect);
        }
        // skip '<![CDATA['
        self.consume_markup(9)?;

        if !self.fatal_error_occurred {
            self.handler.start_cdata();
        }

        self.grow()?;
        let mut text = String::new();
        while !self.source.content_bytes().starts_with(b"]]>") {
            if !self.copy_content_char(&mut text)? {
                break;
            }

            // Long sections are delivered in bounded chunks.
            if text.len() >= CHARDATA_CHUNK_LENGTH {
                if !self.fatal_error_occurred {
                    self.handler.characters(&text);
                }
                text.clear();
            }

            // Keep the 3 bytes of lookahead needed for the ']]>' check.
            if self.source.content_bytes().len() < 3 {
                self.grow()?;
            }
        }

        if !text.is_empty() && !self.fatal_error_occurred {
            self.handler.characters(&text);
        }

        if !self.source.content_bytes().starts_with(b"]]>") {
            fatal_error!(
                self,
                ParserInvalidCDSect,
                "A CDATA section must close with ']]>'."
            );
            return Err(XMLError::ParserInvalidCDSect);
        }
        // skip ']]>'
        self.consume_markup(3)?;

        if !self.fatal_error_occurred {
            self.handler.end_cdata();
        }

        Ok(())
    }
}
