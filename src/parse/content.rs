use std::sync::Arc;

use crate::{
    error::XMLError,
    sax::{
        EntityDecl,
        error::{error, fatal_error},
        handler::SAXHandler,
        parser::{ParserOption, ParserState, XMLReader},
        source::InputSource,
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [43] content ::= CharData? ((element | Reference | CDSect | PI | Comment) CharData?)*
    /// ```
    pub(crate) fn parse_content(&mut self) -> Result<(), XMLError> {
        loop {
            self.grow()?;
            if self.source.content_bytes().is_empty() {
                break Ok(());
            }

            match self.source.content_bytes() {
                [b'<', b'?', ..] => self.parse_pi()?,
                [b'<', b'!', b'-', b'-', ..] => self.parse_comment()?,
                [b'<', b'!', b'[', b'C', b'D', b'A', b'T', b'A', b'[', ..] => {
                    self.parse_cdsect()?
                }
                [b'<', b'/', ..] => break Ok(()),
                [b'<', ..] => self.parse_element()?,
                [b'&', b'#', ..] => {
                    // Character references are folded into the surrounding
                    // character data.
                    self.parse_char_data()?
                }
                [b'&', ..] => self.parse_entity_ref_in_content()?,
                _ => self.parse_char_data()?,
            }
        }
    }

    /// Push `source`, stream its content, and pop it again, wrapping the
    /// resulting events in a `start_entity`/`end_entity` pair.
    ///
    /// External entities accept a leading text declaration, internal ones do
    /// not.
    fn expand_parsed_entity(
        &mut self,
        name: Arc<str>,
        source: InputSource<'static>,
        external: bool,
    ) -> Result<(), XMLError> {
        self.push_source(source, Some(name.clone()));

        if !self.fatal_error_occurred {
            self.handler.start_entity(&name);
        }

        if external {
            self.parse_ext_parsed_ent()?;
        } else {
            self.parse_content()?;
        }
        self.grow()?;

        if !self.source.is_empty() {
            fatal_error!(
                self,
                ParserEntityIncorrectNesting,
                "The replacement text of '{}' does not form complete content.",
                name
            );
        }

        self.pop_source()?;
        if !self.fatal_error_occurred {
            self.handler.end_entity();
        }
        Ok(())
    }

    /// General entity references in content. References inside attribute
    /// values take a different path through the literal scanner.
    ///
    /// ```text
    /// [68] EntityRef ::= '&' Name ';'     [WFC: Entity Declared]
    ///                                     [WFC: Parsed Entity]
    ///                                     [WFC: No Recursion]
    /// ```
    fn parse_entity_ref_in_content(&mut self) -> Result<(), XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"&") {
            fatal_error!(
                self,
                ParserInvalidEntityReference,
                "An entity reference must open with '&'."
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
                "An entity reference must close with ';'."
            );
            return Err(XMLError::ParserInvalidEntityReference);
        }
        // skip ';'
        self.consume_markup(1)?;

        let Some(decl) = self.entities.get(name.as_str()).cloned() else {
            if self.standalone == Some(true)
                || (!self.has_internal_subset && !self.has_external_subset)
                || (!self.has_external_subset && !self.has_parameter_entity)
            {
                // Every declaration the document could have is known, so the
                // reference violates [WFC: Entity Declared].
                fatal_error!(
                    self,
                    ParserEntityNotFound,
                    "The entity '{}' is not declared.",
                    name
                );
            }

            if !self.fatal_error_occurred {
                self.handler.skipped_entity(&name);
            }
            return Ok(());
        };

        if self.entity_recursion_check(name.as_str()) {
            // [WFC: No Recursion]
            fatal_error!(
                self,
                ParserEntityRecursion,
                "The entity '{}' appears inside its own replacement text.",
                name
            );
            return Err(XMLError::ParserEntityRecursion);
        }
        match decl {
            EntityDecl::InternalGeneralEntity {
                replacement_text,
                in_external_markup,
            } => {
                if in_external_markup && self.standalone == Some(true) {
                    // [WFC: Entity Declared]
                    fatal_error!(
                        self,
                        ParserEntityNotFound,
                        "The entity '{}' is declared in external markup, but the document declares standalone='yes'.",
                        name
                    );
                } else {
                    let source = InputSource::from_content(replacement_text.as_ref());
                    self.expand_parsed_entity(name.into(), source, false)?;
                }
            }
            EntityDecl::ExternalGeneralParsedEntity {
                base_uri,
                system_id,
                public_id,
                in_external_markup,
            } => {
                if in_external_markup && self.standalone == Some(true) {
                    // [WFC: Entity Declared]
                    fatal_error!(
                        self,
                        ParserEntityNotFound,
                        "The entity '{}' is declared in external markup, but the document declares standalone='yes'.",
                        name
                    );
                } else if self.config.is_enable(ParserOption::ExternalGeneralEntities) {
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
                            self.expand_parsed_entity(name.into(), source, true)?;
                        }
                        Err(_) => {
                            error!(
                                self,
                                IONotFoundResource,
                                "No input source is available for the external entity '{}'.",
                                name
                            );
                            if !self.fatal_error_occurred {
                                self.handler.skipped_entity(&name);
                            }
                        }
                    }
                } else if !self.fatal_error_occurred {
                    self.handler.skipped_entity(&name);
                }
            }
            EntityDecl::ExternalGeneralUnparsedEntity { .. } => {
                // [WFC: Parsed Entity]
                fatal_error!(
                    self,
                    ParserInvalidEntityReference,
                    "The unparsed entity '{}' must not be referenced in content.",
                    name
                );
                return Err(XMLError::ParserInvalidEntityReference);
            }
            EntityDecl::InternalParameterEntity { .. }
            | EntityDecl::ExternalParameterEntity { .. } => {
                // General and parameter entity names live in separate maps,
                // so a general reference cannot resolve to these.
                return Err(XMLError::InternalError);
            }
        }
        Ok(())
    }

    /// The caller is expected to have pushed the entity's input source and
    /// to report `start_entity`/`end_entity` itself.
    ///
    /// ```text
    /// [78] extParsedEnt ::= TextDecl? content
    /// ```
    fn parse_ext_parsed_ent(&mut self) -> Result<(), XMLError> {
        self.state = ParserState::InTextDeclaration;
        self.grow()?;
        if self.source.content_bytes().starts_with(b"<?xml") {
            self.parse_text_decl()?;
        }

        self.state = ParserState::InContent;
        self.parse_content()?;
        self.grow()?;
        if !self.source.is_empty() {
            fatal_error!(
                self,
                ParserUnexpectedDocumentContent,
                "The external entity contains content after the document-level content ends."
            );
            return Err(XMLError::ParserUnexpectedDocumentContent);
        }

        Ok(())
    }
}
