use crate::{
    error::XMLError,
    sax::{
        Notation,
        error::{error, fatal_error, warning},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [82] NotationDecl ::= '<!NOTATION' S Name S (ExternalID | PublicID) S? '>'
    /// [83] PublicID     ::= 'PUBLIC' S PubidLiteral
    /// ```
    pub(crate) fn parse_notation_decl(&mut self) -> Result<(), XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"<!NOTATION") {
            fatal_error!(
                self,
                ParserInvalidNotationDecl,
                "A notation declaration must open with '<!NOTATION'."
            );
            return Err(XMLError::ParserInvalidNotationDecl);
        }
        // skip '<!NOTATION'
        self.consume_markup(10)?;

        let base_source_id = self.source.source_id();

        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidNotationDecl,
                "The notation name must be preceded by whitespace."
            );
        }

        let mut name = String::new();
        if self.is_namespace_aware() {
            self.parse_ncname(&mut name)?;
        } else {
            self.parse_name(&mut name)?;
        }

        if self.skip_whitespaces_with_handle_peref(true)? == 0 {
            fatal_error!(
                self,
                ParserInvalidNotationDecl,
                "The notation name must be followed by whitespace."
            );
        }

        self.grow()?;
        let mut system_id = None::<String>;
        let mut public_id = None::<String>;
        match self.source.content_bytes() {
            [b'S', b'Y', b'S', b'T', b'E', b'M', ..] => {
                // 'SYSTEM' can only introduce an ExternalID.
                let system_id = system_id.get_or_insert_default();
                self.parse_external_id(system_id, &mut None)?;
                if !self.fatal_error_occurred {
                    self.handler.notation_decl(&name, None, Some(system_id.as_str()));
                }
            }
            [b'P', b'U', b'B', b'L', b'I', b'C', ..] => {
                // 'PUBLIC' is ambiguous between ExternalID and PublicID
                // until the byte after the public identifier is seen, so
                // this cannot go through `parse_external_id`.
                //
                // [75] ExternalID ::= 'SYSTEM' S SystemLiteral
                //                      | 'PUBLIC' S PubidLiteral S SystemLiteral
                // [83] PublicID   ::= 'PUBLIC' S PubidLiteral

                // skip 'PUBLIC'
                self.consume_markup(6)?;

                if self.skip_whitespaces_with_handle_peref(true)? == 0 {
                    fatal_error!(
                        self,
                        ParserInvalidPubidLiteral,
                        "The public identifier must be preceded by whitespace."
                    );
                }
                let public_id = public_id.get_or_insert_default();
                self.parse_pubid_literal(public_id)?;

                let spaces = self.skip_whitespaces_with_handle_peref(true)?;
                self.grow()?;
                // Anything other than '>' here must be the system literal of
                // an ExternalID.
                if !self.source.content_bytes().starts_with(b">") {
                    if spaces == 0 {
                        fatal_error!(
                            self,
                            ParserInvalidPubidLiteral,
                            "The system literal must be preceded by whitespace."
                        );
                    }

                    self.parse_system_literal(system_id.get_or_insert_default())?;
                    self.skip_whitespaces_with_handle_peref(true)?;
                }

                if !self.fatal_error_occurred {
                    self.handler
                        .notation_decl(&name, Some(public_id.as_str()), system_id.as_deref());
                }
            }
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidNotationDecl,
                    "A notation declaration requires an external identifier or a public identifier."
                );
                return Err(XMLError::ParserInvalidNotationDecl);
            }
        }

        self.skip_whitespaces_with_handle_peref(true)?;
        if self.source.source_id() != base_source_id {
            error!(
                self,
                ParserEntityIncorrectNesting,
                "A parameter entity reference and the notation declaration around it overlap."
            );
        }
        if !self.source.content_bytes().starts_with(b">") {
            fatal_error!(
                self,
                ParserInvalidNotationDecl,
                "A notation declaration must close with '>'."
            );
            return Err(XMLError::ParserInvalidNotationDecl);
        }
        // skip '>'
        self.consume_markup(1)?;

        match self.notations.entry(name.as_str().into()) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Notation {
                    name: name.into(),
                    system_id: system_id.map(From::from),
                    public_id: public_id.map(From::from),
                });
            }
            std::collections::hash_map::Entry::Occupied(_) => {
                warning!(
                    self,
                    ParserInvalidNotationDecl,
                    "The notation '{}' is declared more than once.",
                    name
                );
            }
        }

        Ok(())
    }
}
