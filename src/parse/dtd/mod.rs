mod attlist_decl;
mod element_decl;
mod entity_decl;
mod ext_subset;
mod notation_decl;

use std::sync::Arc;

use crate::{
    error::XMLError,
    sax::{
        EntityDecl,
        error::{error, fatal_error},
        handler::SAXHandler,
        parser::{ParserOption, ParserState, XMLReader},
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [28] doctypedecl ::= '<!DOCTYPE' S Name (S ExternalID)? S? ('[' intSubset ']' S?)? '>'
    ///                                                             [WFC: External Subset]
    /// ```
    pub(crate) fn parse_doctypedecl(&mut self) -> Result<(), XMLError> {
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"<!DOCTYPE") {
            fatal_error!(
                self,
                ParserInvalidDoctypeDecl,
                "A document type declaration must open with '<!DOCTYPE'."
            );
            return Err(XMLError::ParserInvalidDoctypeDecl);
        }
        // skip '<!DOCTYPE'
        self.consume_markup(9)?;

        if self.skip_whitespaces()? == 0 {
            fatal_error!(
                self,
                ParserInvalidDoctypeDecl,
                "The document type name must be preceded by whitespace."
            );
        }

        let mut name = String::new();
        if self.is_namespace_aware() {
            self.parse_qname(&mut name)?;
        } else {
            self.parse_name(&mut name)?;
        }

        let spaces = self.skip_whitespaces()?;
        self.grow()?;
        if self.source.is_empty() {
            return Err(XMLError::ParserUnexpectedEOF);
        }

        // Anything other than '[' or '>' here must be an ExternalID.
        let mut system_id = None::<String>;
        let mut public_id = None;
        let mut external_subset = None;
        let fetch_external = self.config.is_enable(ParserOption::ExternalParameterEntities)
            && self.standalone != Some(true);
        if !matches!(self.source.content_bytes()[0], b'[' | b'>') {
            if spaces == 0 {
                fatal_error!(
                    self,
                    ParserInvalidDoctypeDecl,
                    "The external identifier must be preceded by whitespace."
                );
            }
            let mut buf = String::new();
            self.parse_external_id(&mut buf, &mut public_id)?;
            system_id = Some(buf);
            self.skip_whitespaces()?;
            if fetch_external {
                match self.handler.resolve_entity(
                    "[dtd]",
                    public_id.as_deref(),
                    &self.base_uri.clone(),
                    system_id.as_deref().unwrap_or_default(),
                ) {
                    Ok(ext) => external_subset = Some(ext),
                    Err(_) => {
                        error!(
                            self,
                            IONotFoundResource,
                            "No input source is available for the external subset '{}'.",
                            system_id.as_deref().unwrap_or_default()
                        );
                    }
                }
            }
        } else if fetch_external
            && let Ok(ext) = self
                .handler
                .get_external_subset(&name, Some(&self.base_uri.clone()))
        {
            system_id = ext.system_id().as_deref().map(str::to_owned);
            public_id = ext.public_id().as_deref().map(str::to_owned);
            external_subset = Some(ext);
        }
        if !self.fatal_error_occurred {
            self.handler
                .start_dtd(&name, public_id.as_deref(), system_id.as_deref());
        }

        self.grow()?;
        if self.source.content_bytes().starts_with(b"[") {
            // skip '['
            self.consume_markup(1)?;

            self.has_internal_subset = true;
            self.parse_int_subset()?;

            self.grow()?;
            if !self.source.content_bytes().starts_with(b"]") {
                fatal_error!(
                    self,
                    ParserInvalidDoctypeDecl,
                    "The internal subset must close with ']'."
                );
                return Err(XMLError::ParserInvalidDoctypeDecl);
            }
            // skip ']'
            self.consume_markup(1)?;

            self.skip_whitespaces()?;
        }

        self.grow()?;
        if !self.source.content_bytes().starts_with(b">") {
            fatal_error!(
                self,
                ParserInvalidDoctypeDecl,
                "A document type declaration must close with '>'."
            );
            return Err(XMLError::ParserInvalidDoctypeDecl);
        }
        // skip '>'
        self.consume_markup(1)?;

        if let Some(mut external_subset) = external_subset {
            self.has_external_subset = true;
            if external_subset.system_id().is_none()
                && let Some(system_id) = system_id.as_deref()
            {
                external_subset.set_system_id(system_id);
            }
            if external_subset.public_id().is_none()
                && let Some(public_id) = public_id.as_deref()
            {
                external_subset.set_public_id(public_id);
            }
            self.push_source(external_subset, Some("[dtd]".into()));

            if !self.fatal_error_occurred {
                self.handler.start_entity("[dtd]");
            }

            self.parse_ext_subset()?;
            self.grow()?;

            if !self.source.is_empty() {
                fatal_error!(
                    self,
                    ParserEntityIncorrectNesting,
                    "The external subset does not form a complete set of declarations."
                );
            }

            self.pop_source()?;

            if !self.fatal_error_occurred {
                self.handler.end_entity();
            }
        } else if system_id.is_some() && !self.fatal_error_occurred {
            self.handler.skipped_entity("[dtd]");
        }

        if !self.fatal_error_occurred {
            self.handler.end_dtd();
        }

        Ok(())
    }

    /// ```text
    /// [28a] DeclSep    ::= PEReference | S                [WFC: PE Between Declarations]
    /// [28b] intSubset  ::= (markupdecl | DeclSep)*
    /// [29]  markupdecl ::= elementdecl | AttlistDecl | EntityDecl | NotationDecl | PI | Comment
    ///                                                     [WFC: PEs in Internal Subset]
    /// ```
    fn parse_int_subset(&mut self) -> Result<(), XMLError> {
        self.state = ParserState::InInternalSubset;
        self.skip_whitespaces()?;

        let source_id = self.source.source_id();
        loop {
            self.grow()?;
            match self.source.content_bytes() {
                [b'%', ..] => {
                    self.parse_pe_reference()?;
                }
                [b'<', b'?', ..] => self.parse_pi()?,
                [b'<', b'!', b'-', b'-', ..] => self.parse_comment()?,
                [b'<', b'!', b'E', b'L', ..] => self.parse_element_decl()?,
                [b'<', b'!', b'E', b'N', ..] => self.parse_entity_decl()?,
                [b'<', b'!', b'A', ..] => self.parse_attlist_decl()?,
                [b'<', b'!', b'N', ..] => self.parse_notation_decl()?,
                _ => {
                    if self.source.source_id() != source_id {
                        self.pop_source()?;
                        if !self.fatal_error_occurred {
                            self.handler.end_entity();
                        }
                    } else {
                        break Ok(());
                    }
                }
            }

            self.skip_whitespaces()?;
        }
    }

    /// ```text
    /// [75] ExternalID ::= 'SYSTEM' S SystemLiteral
    ///                     | 'PUBLIC' S PubidLiteral S SystemLiteral
    /// ```
    pub(crate) fn parse_external_id(
        &mut self,
        system_id: &mut String,
        public_id: &mut Option<String>,
    ) -> Result<(), XMLError> {
        self.grow()?;
        match self.source.content_bytes() {
            [b'S', b'Y', b'S', b'T', b'E', b'M', ..] => {
                // skip 'SYSTEM'
                self.consume_markup(6)?;
                if self.skip_whitespaces_with_handle_peref(true)? == 0 {
                    fatal_error!(
                        self,
                        ParserInvalidExternalID,
                        "The system literal must be preceded by whitespace."
                    );
                }
                *public_id = None;
                self.parse_system_literal(system_id)?;
            }
            [b'P', b'U', b'B', b'L', b'I', b'C', ..] => {
                // skip 'PUBLIC'
                self.consume_markup(6)?;
                if self.skip_whitespaces_with_handle_peref(true)? == 0 {
                    fatal_error!(
                        self,
                        ParserInvalidExternalID,
                        "The public identifier must be preceded by whitespace."
                    );
                }
                self.parse_pubid_literal(public_id.get_or_insert_default())?;
                if self.skip_whitespaces_with_handle_peref(true)? == 0 {
                    fatal_error!(
                        self,
                        ParserInvalidExternalID,
                        "The system literal of an external identifier must be preceded by whitespace."
                    );
                }
                self.parse_system_literal(system_id)?;
            }
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidExternalID,
                    "An external identifier must open with 'SYSTEM' or 'PUBLIC'."
                );
                return Err(XMLError::ParserInvalidExternalID);
            }
        }

        Ok(())
    }

    /// Expand a parameter entity reference at the cursor.
    ///
    /// Return `true` if a new source was pushed, otherwise `false`.
    ///
    /// ```text
    /// [69] PEReference ::= '%' Name ';'   [WFC: No Recursion]
    ///                                     [WFC: In DTD]
    /// ```
    pub(crate) fn parse_pe_reference(&mut self) -> Result<bool, XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"%") {
            fatal_error!(
                self,
                ParserInvalidEntityReference,
                "A parameter entity reference must open with '%'."
            );
            return Err(XMLError::ParserInvalidEntityReference);
        }
        // skip '%'
        self.consume_markup(1)?;

        // Parameter entity names are registered with a '%' prefix so that
        // they cannot collide with general entity names.
        let mut name = "%".to_owned();
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
                "A parameter entity reference must close with ';'."
            );
            return Err(XMLError::ParserInvalidEntityReference);
        }
        // skip ';'
        self.consume_markup(1)?;

        self.has_parameter_entity = true;

        if self.entity_recursion_check(name.as_str()) {
            // [WFC: No Recursion]
            fatal_error!(
                self,
                ParserEntityRecursion,
                "The parameter entity '{}' appears inside its own replacement text.",
                &name[1..]
            );
            return Err(XMLError::ParserEntityRecursion);
        }

        match self.entities.get(name.as_str()).cloned() {
            Some(EntityDecl::InternalParameterEntity { replacement_text }) => {
                let source = crate::sax::source::InputSource::from_content(&replacement_text);
                let name: Arc<str> = name.into();
                self.push_source(source, Some(name.clone()));
                if !self.fatal_error_occurred {
                    self.handler.start_entity(&name);
                }
                Ok(true)
            }
            Some(EntityDecl::ExternalParameterEntity {
                base_uri,
                system_id,
                public_id,
            }) => {
                if self.config.is_enable(ParserOption::ExternalParameterEntities) {
                    match self.handler.resolve_entity(
                        &name,
                        public_id.as_deref(),
                        base_uri.as_ref(),
                        system_id.as_ref(),
                    ) {
                        Ok(mut source) => {
                            if source.system_id().is_none() {
                                source.set_system_id(system_id.as_ref());
                            }
                            if source.public_id().is_none()
                                && let Some(public_id) = public_id.as_deref()
                            {
                                source.set_public_id(public_id);
                            }
                            let name: Arc<str> = name.into();
                            self.push_source(source, Some(name.clone()));
                            if !self.fatal_error_occurred {
                                self.handler.start_entity(&name);
                            }

                            // An external parameter entity may start with a text declaration.
                            let old_state = self.state;
                            self.state = ParserState::InTextDeclaration;
                            self.grow()?;
                            if self.source.content_bytes().starts_with(b"<?xml") {
                                self.parse_text_decl()?;
                            }
                            self.state = old_state;
                            Ok(true)
                        }
                        Err(_) => {
                            error!(
                                self,
                                IONotFoundResource,
                                "No input source is available for the parameter entity '{}'.",
                                &name[1..]
                            );
                            if !self.fatal_error_occurred {
                                self.handler.skipped_entity(&name);
                            }
                            Ok(false)
                        }
                    }
                } else {
                    if !self.fatal_error_occurred {
                        self.handler.skipped_entity(&name);
                    }
                    Ok(false)
                }
            }
            Some(_) => {
                // General entity names never carry the '%' prefix.
                Err(XMLError::InternalError)
            }
            None => {
                error!(
                    self,
                    ParserEntityNotFound,
                    "The parameter entity '{}' is not declared.",
                    &name[1..]
                );
                if !self.fatal_error_occurred {
                    self.handler.skipped_entity(&name);
                }
                Ok(false)
            }
        }
    }
}
