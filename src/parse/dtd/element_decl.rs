use crate::{
    error::XMLError,
    sax::{
        error::{error, fatal_error},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// The content model is captured as raw text and never interpreted; a
    /// parenthesized group is scanned with a balance counter only.
    ///
    /// ```text
    /// [45] elementdecl ::= '<!ELEMENT' S Name S contentspec S? '>'
    /// [46] contentspec ::= 'EMPTY' | 'ANY' | Mixed | children
    /// ```
    pub(crate) fn parse_element_decl(&mut self) -> Result<(), XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"<!ELEMENT") {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "An element declaration must open with '<!ELEMENT'."
            );
            return Err(XMLError::ParserInvalidElementDecl);
        }
        // skip '<!ELEMENT'
        self.consume_markup(9)?;

        let base_source_id = self.source.source_id();

        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "The element name must be preceded by whitespace."
            );
        }

        let mut name = String::new();
        if self.is_namespace_aware() {
            self.parse_qname(&mut name)?;
        } else {
            self.parse_name(&mut name)?;
        }

        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "The content specification must be preceded by whitespace."
            );
        }

        self.grow()?;
        let mut model = String::new();
        match self.source.content_bytes() {
            [b'E', b'M', b'P', b'T', b'Y', ..] => {
                // skip 'EMPTY'
                self.consume_markup(5)?;
                model.push_str("EMPTY");
            }
            [b'A', b'N', b'Y', ..] => {
                // skip 'ANY'
                self.consume_markup(3)?;
                model.push_str("ANY");
            }
            [b'(', ..] => self.scan_content_model(&mut model)?,
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidElementDecl,
                    "The content specification must be 'EMPTY', 'ANY', or a parenthesized group."
                );
                return Err(XMLError::ParserInvalidElementDecl);
            }
        }

        self.skip_whitespaces_with_handle_peref(true)?;
        if self.source.source_id() != base_source_id {
            error!(
                self,
                ParserEntityIncorrectNesting,
                "A parameter entity reference and the element declaration around it overlap."
            );
        }
        self.grow()?;
        if !self.source.content_bytes().starts_with(b">") {
            fatal_error!(
                self,
                ParserInvalidElementDecl,
                "An element declaration must close with '>'."
            );
            return Err(XMLError::ParserInvalidElementDecl);
        }
        // skip '>'
        self.consume_markup(1)?;

        if !self.fatal_error_occurred {
            self.handler.element_decl(&name, &model);
        }

        Ok(())
    }

    /// Copy a balanced parenthesized group into `model`, including the outer
    /// parentheses and a trailing occurrence indicator if present. Line ends
    /// are normalized to a line feed.
    fn scan_content_model(&mut self, model: &mut String) -> Result<(), XMLError> {
        let mut depth = 0usize;
        loop {
            self.grow()?;
            match self.source.peek_char()? {
                Some(c @ ('(' | ')')) => {
                    self.source.next_char()?;
                    self.locator.update_column(|col| col + 1);
                    model.push(c);
                    if c == '(' {
                        depth += 1;
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                }
                Some(_) => {
                    self.copy_content_char(model)?;
                }
                None => return Err(XMLError::ParserUnexpectedEOF),
            }
        }

        // occurrence indicator for the whole group
        if let Some(c) = self.source.next_char_if(|c| matches!(c, '?' | '*' | '+'))? {
            self.locator.update_column(|c| c + 1);
            model.push(c);
        }

        Ok(())
    }
}
