use crate::{
    error::XMLError,
    sax::{
        AttributeType, DefaultDecl,
        error::{error, fatal_error, warning},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [52] AttlistDecl ::= '<!ATTLIST' S Name AttDef* S? '>'
    /// ```
    pub(crate) fn parse_attlist_decl(&mut self) -> Result<(), XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"<!ATTLIST") {
            fatal_error!(
                self,
                ParserInvalidAttlistDecl,
                "An attribute-list declaration must open with '<!ATTLIST'."
            );
            return Err(XMLError::ParserInvalidAttlistDecl);
        }
        // skip '<!ATTLIST'
        self.consume_markup(9)?;

        let base_source_id = self.source.source_id();
        let is_external_markup = self.is_external_markup();
        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidAttlistDecl,
                "The element name must be preceded by whitespace."
            );
        }

        let mut name = String::new();
        if self.is_namespace_aware() {
            self.parse_qname(&mut name)?;
        } else {
            self.parse_name(&mut name)?;
        }

        let mut spaces = self.skip_whitespaces_with_handle_peref(true)?;
        self.grow()?;
        let mut att_name = String::new();
        while !self.source.content_bytes().starts_with(b">") {
            if spaces == 0 {
                fatal_error!(
                    self,
                    ParserInvalidAttlistDecl,
                    "Each attribute definition must be preceded by whitespace."
                );
            }
            att_name.clear();
            let (atttype, default_decl) = self.parse_att_def(&mut att_name)?;
            if !self.fatal_error_occurred {
                self.handler
                    .attribute_decl(&name, &att_name, &atttype, &default_decl);
            }
            if !self.attlistdecls.insert(
                name.as_str(),
                att_name.as_str(),
                atttype,
                default_decl,
                is_external_markup,
            ) {
                warning!(
                    self,
                    ParserDuplicateAttlistDecl,
                    "An attribute list declaration for the attribute '{}' of the element '{}' is duplicated.",
                    att_name,
                    name
                );
            }
            spaces = self.skip_whitespaces_with_handle_peref(true)?;
            if self.source.content_bytes().is_empty() {
                self.grow()?;
                if self.source.content_bytes().is_empty() {
                    break;
                }
            }
        }

        if self.source.source_id() != base_source_id {
            error!(
                self,
                ParserEntityIncorrectNesting,
                "A parameter entity reference and the attribute-list declaration around it overlap."
            );
        }

        if !self.source.content_bytes().starts_with(b">") {
            return Err(XMLError::ParserUnexpectedEOF);
        }
        // skip '>'
        self.consume_markup(1)?;

        Ok(())
    }

    /// ```text
    /// [53] AttDef ::= S Name S AttType S DefaultDecl
    /// ```
    fn parse_att_def(
        &mut self,
        att_name: &mut String,
    ) -> Result<(AttributeType, DefaultDecl), XMLError> {
        if self.is_namespace_aware() {
            self.parse_qname(att_name)?;
        } else {
            self.parse_name(att_name)?;
        }

        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidAttlistDecl,
                "The attribute type must be preceded by whitespace."
            );
        }

        self.grow()?;
        let atttype = match self.source.content_bytes() {
            [b'(', ..] => {
                // Enumeration
                // [59] Enumeration ::= '(' S? Nmtoken (S? '|' S? Nmtoken)* S? ')'

                // skip '('
                self.consume_markup(1)?;

                let tokens = self.parse_enumerated_tokens(false)?;
                AttributeType::Enumeration(tokens)
            }
            [b'C', b'D', b'A', b'T', b'A', ..] => {
                // StringType
                // [55] StringType ::= 'CDATA'
                self.consume_markup(5)?;
                AttributeType::CDATA
            }
            [b'N', b'O', b'T', b'A', b'T', b'I', b'O', b'N', ..] => {
                // NotationType
                // [58] NotationType ::= 'NOTATION' S '(' S? Name (S? '|' S? Name)* S? ')'

                // skip 'NOTATION'
                self.consume_markup(8)?;

                if self.skip_whitespaces_with_handle_peref(true)? == 0 {
                    fatal_error!(
                        self,
                        ParserInvalidAttlistDecl,
                        "The notation group must be preceded by whitespace."
                    );
                }

                self.grow()?;
                if !self.source.content_bytes().starts_with(b"(") {
                    fatal_error!(
                        self,
                        ParserInvalidAttlistDecl,
                        "'NOTATION' must be followed by a parenthesized name group."
                    );
                    return Err(XMLError::ParserInvalidAttlistDecl);
                }
                // skip '('
                self.consume_markup(1)?;

                let notations = self.parse_enumerated_tokens(true)?;
                AttributeType::NOTATION(notations)
            }
            // TokenizedType
            [b'I', b'D', b'R', b'E', b'F', b'S', ..] => {
                self.consume_markup(6)?;
                AttributeType::IDREFS
            }
            [b'I', b'D', b'R', b'E', b'F', ..] => {
                self.consume_markup(5)?;
                AttributeType::IDREF
            }
            [b'I', b'D', ..] => {
                self.consume_markup(2)?;
                AttributeType::ID
            }
            [b'E', b'N', b'T', b'I', b'T', b'I', b'E', b'S', ..] => {
                self.consume_markup(8)?;
                AttributeType::ENTITIES
            }
            [b'E', b'N', b'T', b'I', b'T', b'Y', ..] => {
                self.consume_markup(6)?;
                AttributeType::ENTITY
            }
            [b'N', b'M', b'T', b'O', b'K', b'E', b'N', b'S', ..] => {
                self.consume_markup(8)?;
                AttributeType::NMTOKENS
            }
            [b'N', b'M', b'T', b'O', b'K', b'E', b'N', ..] => {
                self.consume_markup(7)?;
                AttributeType::NMTOKEN
            }
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidAttlistDecl,
                    "The attribute type is not one of the declared type keywords."
                );
                return Err(XMLError::ParserInvalidAttlistDecl);
            }
        };

        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidAttlistDecl,
                "The default declaration must be preceded by whitespace."
            );
        }

        self.grow()?;
        let default_decl = match self.source.content_bytes() {
            [b'#', b'R', b'E', b'Q', b'U', b'I', b'R', b'E', b'D', ..] => {
                // skip '#REQUIRED'
                self.consume_markup(9)?;
                DefaultDecl::REQUIRED
            }
            [b'#', b'I', b'M', b'P', b'L', b'I', b'E', b'D', ..] => {
                // skip '#IMPLIED'
                self.consume_markup(8)?;
                DefaultDecl::IMPLIED
            }
            [b'#', b'F', b'I', b'X', b'E', b'D', ..] => {
                // skip '#FIXED'
                self.consume_markup(6)?;

                if self.skip_whitespaces_with_handle_peref(true)? == 0 {
                    fatal_error!(
                        self,
                        ParserInvalidAttlistDecl,
                        "The fixed default value must be preceded by whitespace."
                    );
                }

                let mut buffer = String::new();
                self.parse_att_value(&mut buffer)?;
                self.normalize_att_value("", "", &mut buffer, Some(atttype.is_cdata()));
                DefaultDecl::FIXED(buffer.into_boxed_str())
            }
            _ => {
                let mut buffer = String::new();
                self.parse_att_value(&mut buffer)?;
                self.normalize_att_value("", "", &mut buffer, Some(atttype.is_cdata()));
                DefaultDecl::None(buffer.into_boxed_str())
            }
        };

        Ok((atttype, default_decl))
    }

    /// Parse the parenthesized token list of an enumerated attribute type.
    /// The opening '(' must already be consumed; the closing ')' is consumed
    /// here. Tokens are kept in declaration order.
    fn parse_enumerated_tokens(&mut self, notation: bool) -> Result<Vec<Box<str>>, XMLError> {
        let enum_source_id = self.source.source_id();

        self.skip_whitespaces_with_handle_peref(true)?;
        let mut buffer = String::new();
        let mut tokens: Vec<Box<str>> = vec![];
        loop {
            if notation {
                if self.is_namespace_aware() {
                    self.parse_ncname(&mut buffer)?;
                } else {
                    self.parse_name(&mut buffer)?;
                }
            } else {
                self.parse_nmtoken(&mut buffer)?;
            }
            if !tokens.iter().any(|token| token.as_ref() == buffer) {
                tokens.push(buffer.as_str().into());
            }
            buffer.clear();

            self.skip_whitespaces_with_handle_peref(true)?;
            if self.source.content_bytes().is_empty() {
                self.grow()?;
            }
            if !self.source.content_bytes().starts_with(b"|") {
                break;
            }
            // skip '|'
            self.consume_markup(1)?;
            self.skip_whitespaces_with_handle_peref(true)?;
        }

        if self.source.source_id() != enum_source_id {
            fatal_error!(
                self,
                ParserEntityIncorrectNesting,
                "A parameter entity reference and the enumerated type around it overlap."
            );
            return Err(XMLError::ParserEntityIncorrectNesting);
        }

        if !self.source.content_bytes().starts_with(b")") {
            fatal_error!(
                self,
                ParserInvalidAttlistDecl,
                "An enumerated attribute type must close with ')'."
            );
            return Err(XMLError::ParserInvalidAttlistDecl);
        }
        // skip ')'
        self.consume_markup(1)?;

        Ok(tokens)
    }
}
