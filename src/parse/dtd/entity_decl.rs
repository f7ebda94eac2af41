use crate::{
    error::XMLError,
    sax::{
        EntityDecl,
        error::{error, fatal_error, warning},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// Parameter entities are registered under their `%`-prefixed name, so
    /// they can never collide with general entities.
    ///
    /// ```text
    /// [70] EntityDecl ::= GEDecl | PEDecl
    /// [71] GEDecl     ::= '<!ENTITY' S Name S EntityDef S? '>'
    /// [72] PEDecl     ::= '<!ENTITY' S '%' S Name S PEDef S? '>'
    /// [73] EntityDef  ::= EntityValue | (ExternalID NDataDecl?)
    /// [74] PEDef      ::= EntityValue | ExternalID
    /// ```
    pub(crate) fn parse_entity_decl(&mut self) -> Result<(), XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"<!ENTITY") {
            fatal_error!(
                self,
                ParserInvalidEntityDecl,
                "An entity declaration must open with '<!ENTITY'."
            );
            return Err(XMLError::ParserInvalidEntityDecl);
        }
        // skip '<!ENTITY'
        self.consume_markup(8)?;

        let base_uri = self.base_uri.clone();
        let base_source_id = self.source.source_id();
        let is_external_markup = self.is_external_markup();

        let mut spaces = self.skip_whitespaces_with_handle_peref(true)?;
        self.grow()?;
        let mut pe = false;
        if self.source.content_bytes().starts_with(b"%") {
            if spaces == 0 {
                fatal_error!(
                    self,
                    ParserInvalidEntityDecl,
                    "'%' in a parameter entity declaration must be preceded by whitespace."
                );
            }

            pe = true;
            // skip '%'
            self.consume_markup(1)?;

            spaces = self.skip_whitespaces_with_handle_peref(true)?;
        }

        if spaces == 0 {
            fatal_error!(
                self,
                ParserInvalidEntityDecl,
                "The entity name must be preceded by whitespace."
            );
        }

        let mut name = if pe { "%".to_owned() } else { String::new() };
        if self.is_namespace_aware() {
            self.parse_ncname(&mut name)?;
        } else {
            self.parse_name(&mut name)?;
        }

        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidEntityDecl,
                "The entity name must be followed by whitespace."
            );
        }

        self.grow()?;
        let decl = match self.source.content_bytes() {
            [b'"' | b'\'', ..] => {
                let mut value = String::new();
                self.parse_entity_value(&mut value)?;
                self.skip_whitespaces_with_handle_peref(true)?;
                if !self.fatal_error_occurred {
                    self.handler.internal_entity_decl(&name, &value);
                }
                if pe {
                    EntityDecl::InternalParameterEntity {
                        replacement_text: value.into_boxed_str(),
                    }
                } else {
                    EntityDecl::InternalGeneralEntity {
                        replacement_text: value.into_boxed_str(),
                        in_external_markup: is_external_markup,
                    }
                }
            }
            [b'S', b'Y', b'S', b'T', b'E', b'M', ..] | [b'P', b'U', b'B', b'L', b'I', b'C', ..] => {
                let mut system_id = String::new();
                let mut public_id = None;
                self.parse_external_id(&mut system_id, &mut public_id)?;

                let spaces = self.skip_whitespaces_with_handle_peref(true)?;

                // An NDataDecl may follow a general entity's ExternalID, but
                // never a parameter entity's.
                let mut notation_name = None::<String>;
                if !pe && !self.source.content_bytes().starts_with(b">") {
                    if spaces == 0 {
                        fatal_error!(
                            self,
                            ParserInvalidEntityDecl,
                            "The notation data declaration must be preceded by whitespace."
                        );
                    }

                    if !self.source.content_bytes().starts_with(b"NDATA") {
                        fatal_error!(
                            self,
                            ParserInvalidEntityDecl,
                            "A notation data declaration must open with 'NDATA'."
                        );
                        return Err(XMLError::ParserInvalidEntityDecl);
                    }
                    // skip 'NDATA'
                    self.consume_markup(5)?;

                    if self.skip_whitespaces_with_handle_peref(true)? == 0 {
                        fatal_error!(
                            self,
                            ParserInvalidEntityDecl,
                            "The notation name must be preceded by whitespace."
                        );
                    }

                    let notation = notation_name.get_or_insert_default();
                    if self.is_namespace_aware() {
                        self.parse_ncname(notation)?;
                    } else {
                        self.parse_name(notation)?;
                    }

                    self.skip_whitespaces_with_handle_peref(true)?;
                }

                if !pe && !self.fatal_error_occurred {
                    if let Some(notation) = notation_name.as_deref() {
                        self.handler.unparsed_entity_decl(
                            &name,
                            public_id.as_deref(),
                            &system_id,
                            notation,
                        );
                    } else {
                        self.handler
                            .external_entity_decl(&name, public_id.as_deref(), &system_id);
                    }
                }

                if pe {
                    EntityDecl::ExternalParameterEntity {
                        base_uri,
                        system_id: system_id.into(),
                        public_id: public_id.map(From::from),
                    }
                } else if let Some(notation) = notation_name {
                    EntityDecl::ExternalGeneralUnparsedEntity {
                        base_uri,
                        system_id: system_id.into(),
                        public_id: public_id.map(From::from),
                        notation_name: notation.into(),
                    }
                } else {
                    EntityDecl::ExternalGeneralParsedEntity {
                        base_uri,
                        system_id: system_id.into(),
                        public_id: public_id.map(From::from),
                        in_external_markup: is_external_markup,
                    }
                }
            }
            [_, ..] => {
                fatal_error!(
                    self,
                    ParserInvalidEntityDecl,
                    "The entity definition must be a quoted entity value or an external identifier."
                );
                return Err(XMLError::ParserInvalidEntityDecl);
            }
            [] => return Err(XMLError::ParserUnexpectedEOF),
        };

        if self.source.source_id() != base_source_id {
            error!(
                self,
                ParserEntityIncorrectNesting,
                "A parameter entity reference and the entity declaration around it overlap."
            );
        }
        if !self.source.content_bytes().starts_with(b">") {
            fatal_error!(
                self,
                ParserInvalidEntityDecl,
                "An entity declaration must close with '>'."
            );
            return Err(XMLError::ParserInvalidEntityDecl);
        }
        // skip '>'
        self.consume_markup(1)?;

        // The first declaration of an entity is binding; XML 1.0 makes a
        // warning for later ones optional (section 4.2).
        if self.entities.insert(name.clone(), decl).is_err() {
            warning!(
                self,
                ParserDuplicateEntityDecl,
                "The entity '{}' is declared more than once.",
                name
            );
        }
        self.has_parameter_entity |= pe;

        Ok(())
    }
}
