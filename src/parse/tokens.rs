use crate::{
    error::XMLError,
    sax::{
        error::fatal_error,
        handler::SAXHandler,
        parser::{ParserState, XMLReader},
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    pub(crate) fn skip_whitespaces(&mut self) -> Result<usize, XMLError> {
        let mut skipped = 0;
        while let Some(w) = self.source.peek_char()? {
            if !self.is_whitespace(w) {
                break;
            }
            self.source.next_char()?;

            match w {
                '\x20' | '\t' => self.locator.update_column(|c| c + 1),
                '\n' => {
                    self.locator.new_line();
                }
                '\r' => {
                    if self.source.peek_char()?.is_some_and(|c| c == '\n') {
                        self.source.next_char()?;
                    }
                    self.locator.new_line();
                }
                _ => unreachable!(),
            }
            skipped += 1;
        }

        Ok(skipped)
    }

    /// `skip_whitespaces` for DTD scanning.
    ///
    /// Exhausted parameter entity sources are popped, and if `expand_refs` is
    /// set, parameter entity references found in external markup are expanded
    /// in place. Both transitions count as whitespace because parameter
    /// entity replacement text is padded with spaces when it is recognized
    /// within markup declarations.
    pub(crate) fn skip_whitespaces_with_handle_peref(
        &mut self,
        expand_refs: bool,
    ) -> Result<usize, XMLError> {
        let mut skipped = 0;
        loop {
            skipped += self.skip_whitespaces()?;
            self.grow()?;
            if self.source.is_empty()
                && self
                    .entity_name
                    .as_deref()
                    .is_some_and(|name| name.starts_with('%'))
            {
                self.pop_source()?;
                if !self.fatal_error_occurred {
                    self.handler.end_entity();
                }
                skipped += 1;
                continue;
            }
            if expand_refs
                && self.source.content_bytes().starts_with(b"%")
                && (self.state == ParserState::InExternalSubset || self.is_external_markup())
            {
                self.parse_pe_reference()?;
                skipped += 1;
                continue;
            }
            break Ok(skipped);
        }
    }

    pub(crate) fn parse_nmtoken(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let orig = buffer.len();
        while let Some(c) = self.source.next_char_if(|c| self.version.is_name_char(c))? {
            buffer.push(c);
            self.locator.update_column(|c| c + 1);
        }

        if buffer.len() == orig {
            fatal_error!(
                self,
                ParserEmptyNmtoken,
                "An Nmtoken requires at least one name character."
            );
            return Err(XMLError::ParserEmptyNmtoken);
        }
        Ok(())
    }

    pub(crate) fn parse_name(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let Some(c) = self
            .source
            .next_char_if(|c| self.version.is_name_start_char(c))?
        else {
            fatal_error!(self, ParserEmptyName, "A name requires a valid start character.");
            return Err(XMLError::ParserEmptyName);
        };
        buffer.push(c);
        self.locator.update_column(|c| c + 1);

        while let Some(c) = self.source.next_char_if(|c| self.version.is_name_char(c))? {
            buffer.push(c);
            self.locator.update_column(|c| c + 1);
        }

        Ok(())
    }

    /// Even if NCName is empty, no error will be reported.
    fn parse_ncname_allow_empty(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let Some(c) = self
            .source
            .next_char_if(|c| self.version.is_name_start_char(c) && c != ':')?
        else {
            return Ok(());
        };
        buffer.push(c);
        self.locator.update_column(|c| c + 1);

        while let Some(c) = self
            .source
            .next_char_if(|c| self.version.is_name_char(c) && c != ':')?
        {
            buffer.push(c);
            self.locator.update_column(|c| c + 1);
        }

        Ok(())
    }

    pub(crate) fn parse_ncname(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let orig = buffer.len();
        self.parse_ncname_allow_empty(buffer)?;
        if buffer.len() == orig {
            fatal_error!(
                self,
                ParserEmptyNCName,
                "An NCName requires a valid start character."
            );
            return Err(XMLError::ParserEmptyNCName);
        }
        Ok(())
    }

    /// Return the length of the prefix. `0` means an unprefixed name.
    pub(crate) fn parse_qname(&mut self, buffer: &mut String) -> Result<usize, XMLError> {
        let orig = buffer.len();
        self.parse_ncname_allow_empty(buffer)?;

        if self.source.next_char_if(|c| c == ':')?.is_none() {
            return if buffer.len() == orig {
                fatal_error!(
                    self,
                    ParserEmptyQName,
                    "A qualified name requires a valid start character."
                );
                Err(XMLError::ParserEmptyQName)
            } else {
                Ok(0)
            };
        };
        if buffer.len() == orig {
            fatal_error!(
                self,
                ParserEmptyQNamePrefix,
                "The prefix of a qualified name must not be empty."
            );
        }
        let prefix = buffer.len() - orig;
        buffer.push(':');
        self.locator.update_column(|c| c + 1);
        self.parse_ncname_allow_empty(buffer)?;

        if buffer.len() == orig + prefix + 1 {
            fatal_error!(
                self,
                ParserEmptyQNameLocalPart,
                "The local part of a qualified name must not be empty."
            );
            Err(XMLError::ParserEmptyQNameLocalPart)
        } else if prefix == 0 {
            Err(XMLError::ParserEmptyQNamePrefix)
        } else {
            Ok(prefix)
        }
    }
}
