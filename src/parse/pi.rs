use crate::{
    error::XMLError,
    sax::{error::fatal_error, handler::SAXHandler, parser::XMLReader},
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [16] PI       ::= '<?' PITarget (S (Char* - (Char* '?>' Char*)))? '?>'
    /// [17] PITarget ::= Name - (('X' | 'x') ('M' | 'm') ('L' | 'l'))
    /// ```
    pub(crate) fn parse_pi(&mut self) -> Result<(), XMLError> {
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"<?") {
            fatal_error!(
                self,
                ParserInvalidProcessingInstruction,
                "A processing instruction must open with '<?'."
            );
            return Err(XMLError::ParserInvalidProcessingInstruction);
        }
        // skip '<?'
        self.consume_markup(2)?;

        let mut target = String::new();
        if self.is_namespace_aware() {
            self.parse_ncname(&mut target)?;
        } else {
            self.parse_name(&mut target)?;
        }

        // Any case variation of "xml" is reserved.
        if target.eq_ignore_ascii_case("xml") {
            fatal_error!(
                self,
                ParserUnacceptablePITarget,
                "'{}' is a reserved processing instruction target.",
                target
            );
        }

        let spaces = self.skip_whitespaces()?;
        self.grow()?;
        if self.source.content_bytes().starts_with(b"?>") {
            // skip '?>'
            self.consume_markup(2)?;

            if !self.fatal_error_occurred {
                self.handler.processing_instruction(&target, None);
            }

            return Ok(());
        }

        if spaces == 0 {
            fatal_error!(
                self,
                ParserInvalidProcessingInstruction,
                "The target and the data of a processing instruction must be separated by whitespace."
            );
        }

        let mut data = String::new();
        self.grow()?;
        while !self.source.content_bytes().starts_with(b"?>") {
            if !self.copy_content_char(&mut data)? {
                return Err(XMLError::ParserUnexpectedEOF);
            }
            // Keep the 2 bytes of lookahead needed for the '?>' check.
            if self.source.content_bytes().len() < 2 {
                self.grow()?;
            }
        }
        // skip '?>'
        self.consume_markup(2)?;

        if !self.fatal_error_occurred {
            self.handler.processing_instruction(&target, Some(&data));
        }

        Ok(())
    }
}
