mod cdsect;
mod char_data;
mod comment;
mod content;
mod dtd;
mod element;
mod literals;
mod pi;
mod tokens;
mod xmldecl;

use crate::{
    error::XMLError,
    sax::{
        error::fatal_error,
        handler::SAXHandler,
        parser::{ParserState, XMLReader},
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [1] document ::= prolog element Misc*
    /// ```
    pub(crate) fn parse_document(&mut self) -> Result<(), XMLError> {
        self.handler.set_document_locator(self.locator.clone());
        self.handler.start_document();

        self.parse_prolog()?;
        self.state = ParserState::InContent;
        self.parse_element()?;

        self.state = ParserState::InEpilog;
        self.parse_misc()?;
        self.grow()?;
        if !self.source.is_empty() {
            fatal_error!(
                self,
                ParserUnexpectedDocumentContent,
                "Only comments, processing instructions and whitespaces are allowed after the document element."
            );
            return Err(XMLError::ParserUnexpectedDocumentContent);
        }

        if !self.fatal_error_occurred {
            self.handler.end_document();
        }
        Ok(())
    }

    /// ```text
    /// [22] prolog ::= XMLDecl? Misc* (doctypedecl Misc*)?
    /// ```
    pub(crate) fn parse_prolog(&mut self) -> Result<(), XMLError> {
        self.grow()?;
        // '<?xml' must be followed by whitespace to be an XML declaration.
        // Otherwise it is an ordinary PI target that merely starts with "xml".
        if self.source.content_bytes().starts_with(b"<?xml")
            && matches!(
                self.source.content_bytes().get(5),
                Some(b'\x20' | b'\t' | b'\r' | b'\n')
            )
        {
            self.parse_xml_decl()?;
        }
        self.state = ParserState::InProlog;
        self.parse_misc()?;

        self.grow()?;
        if self.source.content_bytes().starts_with(b"<!DOCTYPE") {
            self.parse_doctypedecl()?;
            self.state = ParserState::InProlog;
            self.parse_misc()?;
        }
        Ok(())
    }

    /// ```text
    /// [27] Misc ::= Comment | PI | S
    /// ```
    pub(crate) fn parse_misc(&mut self) -> Result<(), XMLError> {
        loop {
            self.grow()?;
            match self.source.content_bytes() {
                [b'<', b'?', ..] => self.parse_pi()?,
                [b'<', b'!', b'-', b'-', ..] => self.parse_comment()?,
                [b'\x20' | b'\t' | b'\r' | b'\n', ..] => {
                    self.skip_whitespaces()?;
                }
                _ => break Ok(()),
            }
        }
    }

    /// Move one character from the source into `buffer`.
    ///
    /// CRLF pairs and bare CRs are folded into a single LF, the locator is
    /// kept current, and characters outside the `Char` production raise a
    /// fatal error. Returns `false` once the source is exhausted.
    pub(crate) fn copy_content_char(&mut self, buffer: &mut String) -> Result<bool, XMLError> {
        match self.source.next_char()? {
            Some('\r') => {
                // A CR followed by LF is folded when the LF is consumed.
                if self.source.peek_char()? != Some('\n') {
                    self.locator.new_line();
                    buffer.push('\n');
                }
            }
            Some('\n') => {
                self.locator.new_line();
                buffer.push('\n');
            }
            Some(c) => {
                self.locator.update_column(|col| col + 1);
                buffer.push(c);
                if !self.is_char(c) {
                    fatal_error!(
                        self,
                        ParserInvalidCharacter,
                        "The character '0x{:X}' may not appear in a document.",
                        c as u32
                    );
                }
            }
            None => return Ok(false),
        }
        Ok(true)
    }
}
