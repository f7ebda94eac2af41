use crate::{
    error::XMLError,
    sax::{
        EntityDecl,
        error::fatal_error,
        handler::SAXHandler,
        parser::{ParserState, XMLReader},
        source::InputSource,
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [11] SystemLiteral ::= ('"' [^"]* '"') | ("'" [^']* "'")
    /// ```
    pub(crate) fn parse_system_literal(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let quote = match self.source.next_char()? {
            Some(c @ ('"' | '\'')) => c,
            Some(c) => {
                fatal_error!(
                    self,
                    ParserInvalidSystemLiteral,
                    "A character '0x{:X}' is not correct quotation mark for SystemLiteral.",
                    c as u32
                );
                return Err(XMLError::ParserInvalidSystemLiteral);
            }
            None => {
                fatal_error!(self, ParserUnexpectedEOF, "Unexpected EOF.");
                return Err(XMLError::ParserUnexpectedEOF);
            }
        };
        self.locator.update_column(|c| c + 1);

        // The BNF accepts any character except the quotation mark, so no
        // Char check is performed here.
        while let Some(c) = self.source.next_char_if(|c| c != quote)? {
            match c {
                '\r' => {
                    if self.source.peek_char()? != Some('\n') {
                        self.locator.new_line();
                        buffer.push('\n');
                    }
                }
                '\n' => {
                    self.locator.new_line();
                    buffer.push('\n');
                }
                c => {
                    self.locator.update_column(|c| c + 1);
                    buffer.push(c);
                }
            }
        }

        match self.source.next_char()? {
            Some(c) if c == quote => {
                self.locator.update_column(|c| c + 1);
                Ok(())
            }
            Some(_) => {
                self.locator.update_column(|c| c + 1);
                fatal_error!(
                    self,
                    ParserInvalidSystemLiteral,
                    "SystemLiteral does not close with the correct quotation mark."
                );
                Err(XMLError::ParserInvalidSystemLiteral)
            }
            None => {
                fatal_error!(self, ParserUnexpectedEOF, "Unexpected EOF.");
                Err(XMLError::ParserUnexpectedEOF)
            }
        }
    }

    /// ```text
    /// [12] PubidLiteral ::= '"' PubidChar* '"' | "'" (PubidChar - "'")* "'"
    /// ```
    pub(crate) fn parse_pubid_literal(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        let quote = match self.source.next_char()? {
            Some(c @ ('"' | '\'')) => c,
            Some(c) => {
                fatal_error!(
                    self,
                    ParserInvalidPubidLiteral,
                    "A character '0x{:X}' is not correct quotation mark for PubidLiteral.",
                    c as u32
                );
                return Err(XMLError::ParserInvalidPubidLiteral);
            }
            None => {
                fatal_error!(self, ParserUnexpectedEOF, "Unexpected EOF.");
                return Err(XMLError::ParserUnexpectedEOF);
            }
        };
        self.locator.update_column(|c| c + 1);

        while let Some(c) = self
            .source
            .next_char_if(|c| self.version.is_pubid_char(c) && c != quote)?
        {
            match c {
                '\r' | '\n' => {
                    self.locator.new_line();
                }
                _ => {
                    self.locator.update_column(|c| c + 1);
                }
            }
            buffer.push(c);
        }

        match self.source.next_char()? {
            Some(c) if c == quote => {
                self.locator.update_column(|c| c + 1);
                Ok(())
            }
            Some(_) => {
                self.locator.update_column(|c| c + 1);
                fatal_error!(
                    self,
                    ParserInvalidPubidLiteral,
                    "PubidLiteral does not close with the correct quotation mark."
                );
                Err(XMLError::ParserInvalidPubidLiteral)
            }
            None => {
                fatal_error!(self, ParserUnexpectedEOF, "Unexpected EOF.");
                Err(XMLError::ParserUnexpectedEOF)
            }
        }
    }

    /// ```text
    /// [66] CharRef ::= '&#' [0-9]+ ';' | '&#x' [0-9a-fA-F]+ ';'
    ///                                             [WFC: Legal Character]
    /// ```
    pub(crate) fn parse_char_ref(&mut self) -> Result<char, XMLError> {
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"&#") {
            fatal_error!(
                self,
                ParserInvalidCharacterReference,
                "A character reference must start with '&#'."
            );
            return Err(XMLError::ParserInvalidCharacterReference);
        }
        // skip '&#'
        self.consume_markup(2)?;

        let hex = self.source.next_char_if(|c| c == 'x')?.is_some();
        if hex {
            self.locator.update_column(|c| c + 1);
        }
        let radix = if hex { 16 } else { 10 };

        let mut code = 0u32;
        let mut digits = 0usize;
        while let Some(c) = self.source.next_char_if(|c| c.is_digit(radix))? {
            self.locator.update_column(|c| c + 1);
            digits += 1;
            code = code
                .saturating_mul(radix)
                .saturating_add(c.to_digit(radix).unwrap_or(0));
        }

        if digits == 0 {
            fatal_error!(
                self,
                ParserInvalidCharacterReference,
                "A character reference has no digits."
            );
            return Err(XMLError::ParserInvalidCharacterReference);
        }
        if self.source.next_char_if(|c| c == ';')?.is_none() {
            fatal_error!(
                self,
                ParserInvalidCharacterReference,
                "A character reference must end with ';'."
            );
            return Err(XMLError::ParserInvalidCharacterReference);
        }
        self.locator.update_column(|c| c + 1);

        match char::from_u32(code) {
            Some(c) if self.is_char(c) => Ok(c),
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidCharacterReference,
                    "The code point 0x{:X} is not a legal XML character.",
                    code
                );
                Err(XMLError::ParserInvalidCharacterReference)
            }
        }
    }

    /// ```text
    /// [10] AttValue ::= '"' ([^<&"] | Reference)* '"'
    ///                   | "'" ([^<&'] | Reference)* "'"
    /// ```
    ///
    /// Entity references are expanded in place. Whitespace characters read
    /// directly from the literal or from entity replacement text become
    /// spaces; characters produced by character references are kept as is.
    pub(crate) fn parse_att_value(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        self.grow()?;
        let quote = match self.source.next_char()? {
            Some(c @ ('"' | '\'')) => c,
            Some(c) => {
                fatal_error!(
                    self,
                    ParserInvalidAttValue,
                    "A character '0x{:X}' is not correct quotation mark for AttValue.",
                    c as u32
                );
                return Err(XMLError::ParserInvalidAttValue);
            }
            None => {
                fatal_error!(self, ParserUnexpectedEOF, "Unexpected EOF.");
                return Err(XMLError::ParserUnexpectedEOF);
            }
        };
        self.locator.update_column(|c| c + 1);

        let base_depth = self.source_stack.len();
        let base_id = self.source.source_id();
        loop {
            self.grow()?;
            if self.source.content_bytes().is_empty() {
                if self.source_stack.len() > base_depth {
                    // An entity expanded within this value is exhausted.
                    self.pop_source()?;
                    continue;
                }
                fatal_error!(self, ParserUnexpectedEOF, "AttValue is not closed.");
                return Err(XMLError::ParserUnexpectedEOF);
            }

            match self.source.content_bytes() {
                [b'&', b'#', ..] => {
                    // The characters produced here bypass the whitespace
                    // substitution below.
                    let c = self.parse_char_ref()?;
                    buffer.push(c);
                }
                [b'&', ..] => {
                    self.parse_entity_ref_in_att_value()?;
                }
                _ => {
                    let Some(c) = self.source.next_char()? else {
                        continue;
                    };
                    match c {
                        c if c == quote && self.source.source_id() == base_id => {
                            self.locator.update_column(|c| c + 1);
                            break;
                        }
                        '<' => {
                            fatal_error!(
                                self,
                                ParserInvalidAttValue,
                                "'<' is not allowed in attribute values."
                            );
                            return Err(XMLError::ParserInvalidAttValue);
                        }
                        '\t' => {
                            self.locator.update_column(|c| c + 1);
                            buffer.push('\x20');
                        }
                        '\n' => {
                            self.locator.new_line();
                            buffer.push('\x20');
                        }
                        '\r' => {
                            if self.source.peek_char()? == Some('\n') {
                                self.source.next_char()?;
                            }
                            self.locator.new_line();
                            buffer.push('\x20');
                        }
                        c if self.is_char(c) => {
                            self.locator.update_column(|c| c + 1);
                            buffer.push(c);
                        }
                        c => {
                            fatal_error!(
                                self,
                                ParserInvalidCharacter,
                                "The character '0x{:X}' is not allowed in the XML document.",
                                c as u32
                            );
                            return Err(XMLError::ParserInvalidCharacter);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Expand a general entity reference appearing inside an attribute value
    /// by stacking its replacement text as a new source.
    fn parse_entity_ref_in_att_value(&mut self) -> Result<(), XMLError> {
        if !self.source.content_bytes().starts_with(b"&") {
            fatal_error!(
                self,
                ParserInvalidEntityReference,
                "The entity reference does not start with '&'."
            );
            return Err(XMLError::ParserInvalidEntityReference);
        }
        // skip '&'
        self.consume_markup(1)?;

        let mut name = String::new();
        if self.is_namespace_aware() {
            self.parse_ncname(&mut name)?;
        } else {
            self.parse_name(&mut name)?;
        }

        self.grow()?;
        if !self.source.content_bytes().starts_with(b";") {
            fatal_error!(
                self,
                ParserInvalidEntityReference,
                "The entity reference does not end with ';'."
            );
            return Err(XMLError::ParserInvalidEntityReference);
        }
        // skip ';'
        self.consume_markup(1)?;

        if self.entity_recursion_check(&name) {
            // [WFC: No Recursion]
            fatal_error!(
                self,
                ParserEntityRecursion,
                "The entity '{}' appears recursively.",
                name
            );
            return Err(XMLError::ParserEntityRecursion);
        }

        match self.entities.get(&name).cloned() {
            Some(EntityDecl::InternalGeneralEntity {
                replacement_text, ..
            }) => {
                let source = InputSource::from_content(&replacement_text);
                self.push_source(source, Some(name.as_str().into()));
                Ok(())
            }
            Some(
                EntityDecl::ExternalGeneralParsedEntity { .. }
                | EntityDecl::ExternalGeneralUnparsedEntity { .. },
            ) => {
                // [WFC: No External Entity References]
                fatal_error!(
                    self,
                    ParserInvalidEntityReference,
                    "The external entity '{}' cannot be referred in an attribute value.",
                    name
                );
                Err(XMLError::ParserInvalidEntityReference)
            }
            Some(
                EntityDecl::InternalParameterEntity { .. }
                | EntityDecl::ExternalParameterEntity { .. },
            ) => Err(XMLError::InternalError),
            None => {
                fatal_error!(
                    self,
                    ParserEntityNotFound,
                    "The entity '{}' is not declared.",
                    name
                );
                Err(XMLError::ParserEntityNotFound)
            }
        }
    }

    /// ```text
    /// [9] EntityValue ::= '"' ([^%&"] | PEReference | Reference)* '"'
    ///                     | "'" ([^%&'] | PEReference | Reference)* "'"
    /// ```
    ///
    /// Parameter entity references are expanded in place without padding,
    /// character references are resolved, and general entity references are
    /// carried over literally for later expansion.
    pub(crate) fn parse_entity_value(&mut self, buffer: &mut String) -> Result<(), XMLError> {
        self.grow()?;
        let quote = match self.source.next_char()? {
            Some(c @ ('"' | '\'')) => c,
            Some(c) => {
                fatal_error!(
                    self,
                    ParserInvalidEntityValue,
                    "A character '0x{:X}' is not correct quotation mark for EntityValue.",
                    c as u32
                );
                return Err(XMLError::ParserInvalidEntityValue);
            }
            None => {
                fatal_error!(self, ParserUnexpectedEOF, "Unexpected EOF.");
                return Err(XMLError::ParserUnexpectedEOF);
            }
        };
        self.locator.update_column(|c| c + 1);

        let base_depth = self.source_stack.len();
        let base_id = self.source.source_id();
        loop {
            self.grow()?;
            if self.source.content_bytes().is_empty() {
                if self.source_stack.len() > base_depth {
                    self.pop_source()?;
                    if !self.fatal_error_occurred {
                        self.handler.end_entity();
                    }
                    continue;
                }
                fatal_error!(self, ParserUnexpectedEOF, "EntityValue is not closed.");
                return Err(XMLError::ParserUnexpectedEOF);
            }

            match self.source.content_bytes() {
                [b'%', ..] => {
                    if self.state == ParserState::InExternalSubset || self.is_external_markup() {
                        self.parse_pe_reference()?;
                    } else {
                        // [WFC: PEs in Internal Subset]
                        fatal_error!(
                            self,
                            ParserInvalidEntityValue,
                            "Parameter entity references are not allowed within markup declarations in the internal subset."
                        );
                        return Err(XMLError::ParserInvalidEntityValue);
                    }
                }
                [b'&', b'#', ..] => {
                    let c = self.parse_char_ref()?;
                    buffer.push(c);
                }
                [b'&', ..] => {
                    // skip '&'
                    self.consume_markup(1)?;

                    buffer.push('&');
                    if self.is_namespace_aware() {
                        self.parse_ncname(buffer)?;
                    } else {
                        self.parse_name(buffer)?;
                    }
                    self.grow()?;
                    if !self.source.content_bytes().starts_with(b";") {
                        fatal_error!(
                            self,
                            ParserInvalidEntityReference,
                            "The entity reference does not end with ';'."
                        );
                        return Err(XMLError::ParserInvalidEntityReference);
                    }
                    // skip ';'
                    self.consume_markup(1)?;
                    buffer.push(';');
                }
                _ => {
                    let Some(c) = self.source.next_char()? else {
                        continue;
                    };
                    match c {
                        c if c == quote && self.source.source_id() == base_id => {
                            self.locator.update_column(|c| c + 1);
                            break;
                        }
                        '\r' => {
                            if self.source.peek_char()? == Some('\n') {
                                self.source.next_char()?;
                            }
                            self.locator.new_line();
                            buffer.push('\n');
                        }
                        '\n' => {
                            self.locator.new_line();
                            buffer.push('\n');
                        }
                        c if self.is_char(c) => {
                            self.locator.update_column(|c| c + 1);
                            buffer.push(c);
                        }
                        c => {
                            fatal_error!(
                                self,
                                ParserInvalidCharacter,
                                "The character '0x{:X}' is not allowed in the XML document.",
                                c as u32
                            );
                            return Err(XMLError::ParserInvalidCharacter);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply the declaration dependent part of attribute value normalization.
    ///
    /// When `is_cdata` is `None` the attribute list declarations are
    /// consulted; the return value reports whether a declaration was found.
    /// Values of non-CDATA types lose leading and trailing spaces, and inner
    /// space runs are collapsed into single spaces.
    pub(crate) fn normalize_att_value(
        &self,
        elem_name: &str,
        att_name: &str,
        value: &mut String,
        is_cdata: Option<bool>,
    ) -> bool {
        let (declared, cdata) = match is_cdata {
            Some(cdata) => (false, cdata),
            None => match self.attlistdecls.get(elem_name, att_name) {
                Some(decl) => (true, decl.att_type.is_cdata()),
                None => (false, true),
            },
        };

        if !cdata {
            let mut normalized = String::with_capacity(value.len());
            let mut pending_space = false;
            for c in value.chars() {
                if c == '\x20' {
                    pending_space = !normalized.is_empty();
                } else {
                    if pending_space {
                        normalized.push('\x20');
                        pending_space = false;
                    }
                    normalized.push(c);
                }
            }
            *value = normalized;
        }
        declared
    }
}
