use crate::{
    error::XMLError,
    sax::{
        error::{error, fatal_error},
        handler::SAXHandler,
        parser::{ParserState, XMLReader},
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [30] extSubset ::= TextDecl? extSubsetDecl
    /// ```
    pub(crate) fn parse_ext_subset(&mut self) -> Result<(), XMLError> {
        let old_state = self.state;
        self.state = ParserState::InTextDeclaration;
        self.grow()?;
        if self.source.content_bytes().starts_with(b"<?xml") {
            self.parse_text_decl()?;
        }
        self.state = ParserState::InExternalSubset;
        self.parse_ext_subset_decl()?;

        self.state = old_state;
        Ok(())
    }

    /// ```text
    /// [31] extSubsetDecl ::= ( markupdecl | conditionalSect | DeclSep)*
    /// ```
    fn parse_ext_subset_decl(&mut self) -> Result<(), XMLError> {
        self.grow()?;
        self.skip_whitespaces_with_handle_peref(false)?;

        loop {
            self.grow()?;
            match self.source.content_bytes() {
                [b'%', ..] => {
                    // Exhausted parameter entity sources are popped by the
                    // whitespace handling below.
                    self.parse_pe_reference()?;
                }
                [b'<', b'?', ..] => self.parse_pi()?,
                [b'<', b'!', b'-', b'-', ..] => self.parse_comment()?,
                [b'<', b'!', b'[', ..] => self.parse_conditional_sect()?,
                [b'<', b'!', b'E', b'L', ..] => self.parse_element_decl()?,
                [b'<', b'!', b'E', b'N', ..] => self.parse_entity_decl()?,
                [b'<', b'!', b'A', ..] => self.parse_attlist_decl()?,
                [b'<', b'!', b'N', ..] => self.parse_notation_decl()?,
                _ => break Ok(()),
            }

            self.skip_whitespaces_with_handle_peref(false)?;
        }
    }

    /// Consume the `keyword_len` bytes of a section keyword and the '[' that
    /// opens the section body.
    fn open_conditional_body(
        &mut self,
        keyword_len: usize,
        base_source_id: usize,
    ) -> Result<(), XMLError> {
        self.consume_markup(keyword_len)?;

        self.skip_whitespaces_with_handle_peref(true)?;
        self.grow()?;
        if self.source.source_id() != base_source_id {
            error!(
                self,
                ParserEntityIncorrectNesting,
                "A parameter entity reference and the conditional section around it overlap."
            );
        }

        if !self.source.content_bytes().starts_with(b"[") {
            fatal_error!(
                self,
                ParserInvalidConditionalSect,
                "The section keyword must be followed by '['."
            );
            return Err(XMLError::ParserInvalidConditionalSect);
        }
        // skip '['
        self.consume_markup(1)
    }

    /// ```text
    /// [61] conditionalSect    ::= includeSect | ignoreSect
    /// [62] includeSect        ::= '<![' S? 'INCLUDE' S? '[' extSubsetDecl ']]>'
    /// [63] ignoreSect         ::= '<![' S? 'IGNORE' S? '[' ignoreSectContents* ']]>'
    /// [64] ignoreSectContents ::= Ignore ('<![' ignoreSectContents ']]>' Ignore)*
    /// [65] Ignore             ::= Char* - (Char* ('<![' | ']]>') Char*)
    /// ```
    fn parse_conditional_sect(&mut self) -> Result<(), XMLError> {
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"<![") {
            fatal_error!(
                self,
                ParserInvalidConditionalSect,
                "A conditional section must open with '<!['."
            );
            return Err(XMLError::ParserInvalidConditionalSect);
        }
        // skip '<!['
        self.consume_markup(3)?;

        let base_source_id = self.source.source_id();
        self.skip_whitespaces_with_handle_peref(true)?;
        self.grow()?;

        match self.source.content_bytes() {
            [b'I', b'N', b'C', b'L', b'U', b'D', b'E', ..] => {
                self.open_conditional_body(7, base_source_id)?;

                self.parse_ext_subset_decl()?;

                if !self.source.content_bytes().starts_with(b"]]>") {
                    fatal_error!(
                        self,
                        ParserInvalidConditionalSect,
                        "A conditional section must close with ']]>'."
                    );
                    return Err(XMLError::ParserInvalidConditionalSect);
                }
                // skip ']]>'
                self.consume_markup(3)?;
            }
            [b'I', b'G', b'N', b'O', b'R', b'E', ..] => {
                self.open_conditional_body(6, base_source_id)?;

                // The body is discarded, but nested '<![' ... ']]>' pairs
                // still have to balance.
                let mut depth = 1;
                let mut scratch = String::new();
                while depth > 0 {
                    self.grow()?;
                    if self.source.content_bytes().starts_with(b"<![") {
                        depth += 1;
                        self.consume_markup(3)?;
                    } else if self.source.content_bytes().starts_with(b"]]>") {
                        depth -= 1;
                        self.consume_markup(3)?;
                    } else {
                        scratch.clear();
                        if !self.copy_content_char(&mut scratch)? {
                            return Err(XMLError::ParserUnexpectedEOF);
                        }
                    }
                }
            }
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidConditionalSect,
                    "A conditional section requires an 'INCLUDE' or 'IGNORE' keyword."
                );
                return Err(XMLError::ParserInvalidConditionalSect);
            }
        }
        Ok(())
    }
}
