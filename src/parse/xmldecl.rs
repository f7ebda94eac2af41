use crate::{
    ENCODING_NAME_LIMIT_LENGTH, XML_VERSION_NUM_LIMIT_LENGTH, XMLVersion,
    error::XMLError,
    sax::{
        error::{fatal_error, warning},
        handler::SAXHandler,
        parser::{ParserState, XMLReader},
    },
};

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [25] Eq ::= S? '=' S?
    /// ```
    ///
    /// Returns `false` when the '=' is missing.
    fn scan_eq(&mut self) -> Result<bool, XMLError> {
        self.skip_whitespaces()?;
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"=") {
            return Ok(false);
        }
        // skip '='
        self.consume_markup(1)?;
        self.skip_whitespaces()?;
        Ok(true)
    }

    /// A single quotation mark delimiting a pseudo-attribute value.
    fn scan_quote(&mut self) -> Result<Option<char>, XMLError> {
        let quote = self.source.next_char_if(|c| matches!(c, '"' | '\''))?;
        if quote.is_some() {
            self.locator.update_column(|c| c + 1);
        }
        Ok(quote)
    }

    /// ```text
    /// [23] XMLDecl ::= '<?xml' VersionInfo EncodingDecl? SDDecl? S? '?>'
    /// ```
    pub(crate) fn parse_xml_decl(&mut self) -> Result<(), XMLError> {
        self.state = ParserState::InXMLDeclaration;
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"<?xml") {
            fatal_error!(
                self,
                ParserInvalidXMLDecl,
                "An XML declaration must open with '<?xml'."
            );
            return Err(XMLError::ParserInvalidXMLDecl);
        }
        // skip '<?xml'
        self.consume_markup(5)?;

        let (version, version_str) = self.parse_version_info(true, false)?;

        let mut spaces = self.skip_whitespaces()?;
        self.grow()?;
        let mut encoding = None;
        if self.source.content_bytes().starts_with(b"encoding") {
            if spaces == 0 {
                fatal_error!(
                    self,
                    ParserInvalidXMLDecl,
                    "The encoding declaration must be preceded by whitespace."
                );
            }
            encoding = Some(self.parse_encoding_decl(false)?);
            spaces = self.skip_whitespaces()?;
            self.grow()?;
        }

        let mut standalone = None;
        if self.source.content_bytes().starts_with(b"standalone") {
            if spaces == 0 {
                fatal_error!(
                    self,
                    ParserInvalidXMLDecl,
                    "The standalone declaration must be preceded by whitespace."
                );
            }
            standalone = Some(self.parse_sddecl(false)?);
            self.skip_whitespaces()?;
            self.grow()?;
        }

        if !self.source.content_bytes().starts_with(b"?>") {
            fatal_error!(
                self,
                ParserInvalidXMLDecl,
                "An XML declaration must close with '?>'."
            );
            return Err(XMLError::ParserInvalidXMLDecl);
        }
        // skip '?>'
        self.consume_markup(2)?;

        // An encoding supplied from outside the document takes priority.
        // Otherwise switch the decoder to the declared encoding.
        if let Some(encoding) = encoding.as_deref()
            && self.encoding.is_none()
            && let Err(err) = self.source.switch_encoding(encoding)
        {
            fatal_error!(
                self,
                ParserUnsupportedEncoding,
                "No decoder is available for the declared encoding '{}'.",
                encoding
            );
            return Err(err);
        }

        if !self.fatal_error_occurred {
            self.handler
                .declaration(&version_str, encoding.as_deref(), standalone);
        }
        self.version = version;
        self.standalone = standalone;
        if self.encoding.is_none() {
            self.encoding = encoding;
        }
        Ok(())
    }

    /// ```text
    /// [24] VersionInfo ::= S 'version' Eq ("'" VersionNum "'" | '"' VersionNum '"')
    /// [26] VersionNum  ::= '1.' [0-9]+
    /// ```
    pub(crate) fn parse_version_info(
        &mut self,
        need_trim_whitespace: bool,
        text_decl: bool,
    ) -> Result<(XMLVersion, String), XMLError> {
        if need_trim_whitespace && self.skip_whitespaces()? == 0 {
            fatal_error!(
                self,
                ParserInvalidXMLVersion,
                "The version information must be preceded by whitespace."
            );
        }

        self.grow()?;
        if !self.source.content_bytes().starts_with(b"version") {
            fatal_error!(
                self,
                ParserInvalidXMLVersion,
                "The version information must open with 'version'."
            );
            return Err(XMLError::ParserInvalidXMLVersion);
        }
        // skip 'version'
        self.consume_markup(7)?;

        if !self.scan_eq()? {
            fatal_error!(
                self,
                ParserInvalidXMLDecl,
                "'version' must be followed by '='."
            );
            return Err(XMLError::ParserInvalidXMLDecl);
        }
        let Some(quote) = self.scan_quote()? else {
            fatal_error!(
                self,
                ParserInvalidXMLDecl,
                "The version number must be quoted."
            );
            return Err(XMLError::ParserInvalidXMLDecl);
        };

        self.grow()?;
        let content = self.source.content_bytes();
        let len = content
            .iter()
            .take(XML_VERSION_NUM_LIMIT_LENGTH.min(content.len()))
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .count();
        if len >= XML_VERSION_NUM_LIMIT_LENGTH {
            fatal_error!(
                self,
                ParserTooLongXMLVersionNumber,
                "The XML version number exceeds the acceptable length."
            );
            return Err(XMLError::ParserTooLongXMLVersionNumber);
        }
        if len == content.len() {
            return Err(XMLError::ParserUnexpectedEOF);
        }
        let version_str = String::from_utf8_lossy(&content[..len]).into_owned();
        let closed = content[len] == quote as u8;

        let version = match version_str.split_once('.') {
            Some(("1", minor))
                if !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()) =>
            {
                if minor == "0" {
                    XMLVersion::XML10
                } else {
                    XMLVersion::Unknown
                }
            }
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidXMLVersion,
                    "'{}' is not an acceptable XML version number.",
                    version_str
                );
                return Err(XMLError::ParserInvalidXMLVersion);
            }
        };
        if text_decl && version != self.version {
            fatal_error!(
                self,
                ParserUnsupportedXMLVersion,
                "An XML {} document must not include an XML {} entity.",
                self.version,
                version
            );
        } else if version == XMLVersion::Unknown {
            warning!(
                self,
                ParserUnsupportedXMLVersion,
                "The XML version number is not supported. The document is processed as XML 1.0."
            );
        }
        if !closed {
            fatal_error!(
                self,
                ParserInvalidXMLDecl,
                "The version number is not closed by a matching quotation mark."
            );
            return Err(XMLError::ParserInvalidXMLDecl);
        }
        self.consume_markup(len + 1)?;

        Ok((version, version_str))
    }

    /// ```text
    /// [80] EncodingDecl ::= S 'encoding' Eq ('"' EncName '"' | "'" EncName "'" )
    /// ```
    pub(crate) fn parse_encoding_decl(
        &mut self,
        need_trim_whitespace: bool,
    ) -> Result<String, XMLError> {
        if need_trim_whitespace && self.skip_whitespaces()? == 0 {
            fatal_error!(
                self,
                ParserInvalidEncodingDecl,
                "The encoding declaration must be preceded by whitespace."
            );
        }

        if !self.source.content_bytes().starts_with(b"encoding") {
            fatal_error!(
                self,
                ParserInvalidEncodingDecl,
                "The encoding declaration must open with 'encoding'."
            );
            return Err(XMLError::ParserInvalidEncodingDecl);
        }
        // skip 'encoding'
        self.consume_markup(8)?;

        if !self.scan_eq()? {
            fatal_error!(
                self,
                ParserInvalidEncodingDecl,
                "'encoding' must be followed by '='."
            );
            return Err(XMLError::ParserInvalidEncodingDecl);
        }
        let Some(quote) = self.scan_quote()? else {
            fatal_error!(
                self,
                ParserInvalidEncodingDecl,
                "The encoding name must be quoted."
            );
            return Err(XMLError::ParserInvalidEncodingDecl);
        };

        let encoding = self.parse_enc_name()?;
        self.grow()?;

        match self.source.next_char()? {
            Some(c) if c == quote => {
                self.locator.update_column(|c| c + 1);
            }
            Some(_) => {
                fatal_error!(
                    self,
                    ParserInvalidEncodingDecl,
                    "The encoding name is not closed by a matching quotation mark."
                );
                return Err(XMLError::ParserInvalidEncodingDecl);
            }
            _ => {
                return Err(XMLError::ParserUnexpectedEOF);
            }
        }

        Ok(encoding)
    }

    /// ```text
    /// [32] SDDecl ::= S 'standalone' Eq (("'" ('yes' | 'no') "'") | ('"' ('yes' | 'no') '"'))
    /// ```
    pub(crate) fn parse_sddecl(&mut self, need_trim_whitespace: bool) -> Result<bool, XMLError> {
        if need_trim_whitespace && self.skip_whitespaces()? == 0 {
            fatal_error!(
                self,
                ParserInvalidSDDecl,
                "The standalone declaration must be preceded by whitespace."
            );
        }

        self.grow()?;
        if !self.source.content_bytes().starts_with(b"standalone") {
            fatal_error!(
                self,
                ParserInvalidSDDecl,
                "The standalone declaration must open with 'standalone'."
            );
            return Err(XMLError::ParserInvalidSDDecl);
        }
        // skip 'standalone'
        self.consume_markup(10)?;

        if !self.scan_eq()? {
            fatal_error!(
                self,
                ParserInvalidSDDecl,
                "'standalone' must be followed by '='."
            );
            return Err(XMLError::ParserInvalidSDDecl);
        }
        let Some(quote) = self.scan_quote()? else {
            fatal_error!(
                self,
                ParserInvalidSDDecl,
                "The standalone value must be quoted."
            );
            return Err(XMLError::ParserInvalidSDDecl);
        };

        self.grow()?;
        let standalone = match self.source.content_bytes() {
            [b'y', b'e', b's', ..] => {
                self.consume_markup(3)?;
                true
            }
            [b'n', b'o', ..] => {
                self.consume_markup(2)?;
                false
            }
            _ => {
                fatal_error!(
                    self,
                    ParserInvalidSDDecl,
                    "The standalone value must be 'yes' or 'no'."
                );
                return Err(XMLError::ParserInvalidSDDecl);
            }
        };

        if self.source.next_char()? != Some(quote) {
            fatal_error!(
                self,
                ParserInvalidSDDecl,
                "The standalone value is not closed by a matching quotation mark."
            );
            return Err(XMLError::ParserInvalidSDDecl);
        }
        self.locator.update_column(|c| c + 1);

        Ok(standalone)
    }

    /// ```text
    /// [81] EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*
    /// ```
    pub(crate) fn parse_enc_name(&mut self) -> Result<String, XMLError> {
        self.grow()?;

        if self.source.content_bytes().is_empty() {
            return Err(XMLError::ParserUnexpectedEOF);
        }

        if !self.source.content_bytes()[0].is_ascii_alphabetic() {
            fatal_error!(
                self,
                ParserInvalidEncodingName,
                "An encoding name must open with an ASCII letter."
            );
        }

        let content = self.source.content_bytes();

        let len = content
            .iter()
            .take(ENCODING_NAME_LIMIT_LENGTH.min(content.len()))
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(**b, b'.' | b'_' | b'-'))
            .count();

        if len == ENCODING_NAME_LIMIT_LENGTH {
            fatal_error!(
                self,
                ParserTooLongEncodingName,
                "The encoding name exceeds the acceptable length."
            );
            return Err(XMLError::ParserTooLongEncodingName);
        } else if len == content.len() {
            return if self.source.is_empty() {
                Err(XMLError::ParserUnexpectedEOF)
            } else {
                fatal_error!(
                    self,
                    ParserInvalidEncodingName,
                    "The encoding name contains a byte that cannot appear in an encoding name."
                );
                Err(XMLError::ParserInvalidEncodingName)
            };
        }

        let name = String::from_utf8_lossy(&content[..len]).into_owned();
        self.consume_markup(len)?;
        Ok(name)
    }

    /// ```text
    /// [77] TextDecl ::= '<?xml' VersionInfo? EncodingDecl S? '?>'
    /// ```
    pub(crate) fn parse_text_decl(&mut self) -> Result<(), XMLError> {
        self.grow()?;
        if !self.source.content_bytes().starts_with(b"<?xml") {
            fatal_error!(
                self,
                ParserInvalidTextDecl,
                "A text declaration must open with '<?xml'."
            );
            return Err(XMLError::ParserInvalidTextDecl);
        }
        // skip '<?xml'
        self.consume_markup(5)?;

        let mut spaces = self.skip_whitespaces()?;
        self.grow()?;
        if self.source.content_bytes().starts_with(b"version") {
            if spaces == 0 {
                fatal_error!(
                    self,
                    ParserInvalidTextDecl,
                    "The version information must be preceded by whitespace."
                );
            }
            let (version, _) = self.parse_version_info(false, true)?;
            self.version = version;
            spaces = self.skip_whitespaces()?;
        }

        // The encoding declaration is mandatory in a text declaration.
        self.grow()?;
        if spaces == 0 {
            fatal_error!(
                self,
                ParserInvalidTextDecl,
                "The encoding declaration must be preceded by whitespace."
            );
        }
        let encoding = self.parse_encoding_decl(false)?;
        if self.source.switch_encoding(&encoding).is_err() {
            fatal_error!(
                self,
                ParserUnsupportedEncoding,
                "No decoder is available for the declared encoding '{}'.",
                encoding
            );
            return Err(XMLError::ParserUnsupportedEncoding);
        }
        self.encoding = Some(encoding);
        self.skip_whitespaces()?;
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"?>") {
            fatal_error!(
                self,
                ParserInvalidTextDecl,
                "A text declaration must close with '?>'."
            );
            return Err(XMLError::ParserInvalidTextDecl);
        }
        // skip '?>'
        self.consume_markup(2)?;

        Ok(())
    }
}
