use std::{
    collections::HashMap,
    io::Read,
    ops::{BitOr, BitOrAssign},
    sync::Arc,
};

use crate::{
    XML_NS_NAMESPACE, XML_XML_NAMESPACE, XMLVersion,
    error::{XMLError, XMLErrorLevel},
    sax::{
        AttlistDeclMap, EntityMap, Locator, Notation,
        error::SAXParseError,
        handler::{DefaultSAXHandler, SAXHandler},
        source::InputSource,
    },
};

/// Feature flags of the reader.
///
/// `Namespaces` and `NamespacePrefixes` select namespace-aware and
/// namespace-unaware mode respectively; exactly one of them must be enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserOption {
    /// Fetch and parse external general entities.
    ExternalGeneralEntities = 0,
    /// Fetch and parse external parameter entities and the external subset.
    ExternalParameterEntities = 1,
    /// Perform namespace processing. Namespace declaration attributes are
    /// diverted to prefix-mapping events.
    Namespaces = 2,
    /// Report raw qualified names only; namespace declarations stay in the
    /// attribute list as ordinary attributes.
    NamespacePrefixes = 3,
}

impl BitOr for ParserOption {
    type Output = ParserConfig;

    fn bitor(self, rhs: Self) -> Self::Output {
        ParserConfig {
            flags: (1 << self as usize) | (1 << rhs as usize),
        }
    }
}

impl BitOr<ParserConfig> for ParserOption {
    type Output = ParserConfig;

    fn bitor(self, rhs: ParserConfig) -> Self::Output {
        ParserConfig {
            flags: rhs.flags | (1 << self as usize),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParserConfig {
    flags: u64,
}

impl ParserConfig {
    pub fn is_enable(&self, option: ParserOption) -> bool {
        self.flags & (1 << option as usize) != 0
    }

    pub fn enable(&mut self, option: ParserOption) {
        self.flags |= 1 << option as usize;
    }

    pub fn disable(&mut self, option: ParserOption) {
        self.flags &= !(1 << option as usize);
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserOption::ExternalGeneralEntities
            | ParserOption::ExternalParameterEntities
            | ParserOption::Namespaces
    }
}

impl BitOr<ParserOption> for ParserConfig {
    type Output = ParserConfig;

    fn bitor(self, rhs: ParserOption) -> Self::Output {
        ParserConfig {
            flags: self.flags | (1 << rhs as usize),
        }
    }
}

impl BitOrAssign<ParserOption> for ParserConfig {
    fn bitor_assign(&mut self, rhs: ParserOption) {
        self.enable(rhs);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ParserState {
    #[default]
    BeforeStart,
    InXMLDeclaration,
    InTextDeclaration,
    InProlog,
    InInternalSubset,
    InExternalSubset,
    InContent,
    InEpilog,
    Finished,
}

/// Saved state of the source that an entity reference interrupted.
pub(crate) struct SourceFrame<'a> {
    pub(crate) source: InputSource<'a>,
    pub(crate) entity_name: Option<Arc<str>>,
    pub(crate) version: XMLVersion,
    pub(crate) encoding: Option<String>,
    line: usize,
    column: usize,
    system_id: Arc<str>,
    public_id: Option<Arc<str>>,
}

/// A streaming, non-validating XML 1.0 + Namespaces parser.
///
/// The reader owns one in-flight parse at a time; every mutable table and
/// buffer is torn down before a parse entry point returns, on success and on
/// error alike, so a reader may be reused for further documents.
pub struct XMLReader<'a, H: SAXHandler = DefaultSAXHandler> {
    pub(crate) source: InputSource<'a>,
    pub(crate) source_stack: Vec<SourceFrame<'a>>,
    /// Name of the entity the current source expands, `%`-prefixed for
    /// parameter entities.
    pub(crate) entity_name: Option<Arc<str>>,
    pub(crate) handler: H,
    pub(crate) locator: Arc<Locator>,
    pub(crate) config: ParserConfig,
    pub(crate) state: ParserState,
    pub(crate) version: XMLVersion,
    pub(crate) encoding: Option<String>,
    pub(crate) standalone: Option<bool>,
    pub(crate) base_uri: Arc<str>,
    pub(crate) fatal_error_occurred: bool,
    /// The code of the first fatal condition that was reported without
    /// unwinding; the parse entry points surface it as their outcome.
    pending_fatal_error: Option<XMLError>,
    pub(crate) has_internal_subset: bool,
    pub(crate) has_external_subset: bool,
    pub(crate) has_parameter_entity: bool,
    pub(crate) entities: EntityMap,
    pub(crate) notations: HashMap<Box<str>, Notation>,
    pub(crate) attlistdecls: AttlistDeclMap,
    /// In-scope namespace bindings `(prefix, namespace name, index of the
    /// shadowed binding or `usize::MAX`)`.
    pub(crate) namespaces: Vec<(Arc<str>, Arc<str>, usize)>,
    /// prefix -> index of its innermost binding in `namespaces`
    pub(crate) prefix_map: HashMap<Arc<str>, usize>,
}

impl<'a, H: SAXHandler> XMLReader<'a, H> {
    fn new(config: ParserConfig, handler: H) -> Self {
        let mut reader = Self {
            source: InputSource::default(),
            source_stack: vec![],
            entity_name: None,
            handler,
            locator: Arc::new(Locator::new("".into(), None, 1, 1)),
            config,
            state: ParserState::default(),
            version: XMLVersion::default(),
            encoding: None,
            standalone: None,
            base_uri: "".into(),
            fatal_error_occurred: false,
            pending_fatal_error: None,
            has_internal_subset: false,
            has_external_subset: false,
            has_parameter_entity: false,
            entities: EntityMap::default(),
            notations: HashMap::new(),
            attlistdecls: AttlistDeclMap::default(),
            namespaces: vec![],
            prefix_map: HashMap::new(),
        };
        reader.seed_namespaces();
        reader
    }

    /// Parse a document held in memory.
    ///
    /// `system_id` becomes the base URI reported through the locator and
    /// passed to the entity resolver.
    pub fn parse_str(&mut self, content: &str, system_id: Option<&str>) -> Result<(), XMLError> {
        self.reset(system_id);
        self.source = InputSource::from_content(content);
        if let Some(system_id) = system_id {
            self.source.set_system_id(system_id);
        }
        let result = self.parse_document();
        let result = self.fatal_outcome(result);
        self.cleanup();
        result
    }

    /// Parse a document read from a byte stream.
    ///
    /// When `encoding` is `None` the encoding is detected from the first
    /// bytes of the stream.
    pub fn parse_reader(
        &mut self,
        reader: impl Read + 'a,
        encoding: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), XMLError> {
        self.reset(system_id);
        // An externally supplied encoding takes precedence over the encoding
        // declaration of the document.
        self.encoding = encoding.map(str::to_owned);
        let result = InputSource::from_reader(reader, encoding).and_then(|source| {
            self.source = source;
            if let Some(system_id) = system_id {
                self.source.set_system_id(system_id);
            }
            self.parse_document()
        });
        let result = self.fatal_outcome(result);
        self.cleanup();
        result
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn locator(&self) -> Arc<Locator> {
        self.locator.clone()
    }

    fn reset(&mut self, system_id: Option<&str>) {
        self.source = InputSource::default();
        self.source_stack.clear();
        self.entity_name = None;
        self.state = ParserState::BeforeStart;
        self.version = XMLVersion::default();
        self.encoding = None;
        self.standalone = None;
        self.base_uri = system_id.unwrap_or("").into();
        self.fatal_error_occurred = false;
        self.pending_fatal_error = None;
        self.has_internal_subset = false;
        self.has_external_subset = false;
        self.has_parameter_entity = false;
        self.entities.clear();
        self.notations.clear();
        self.attlistdecls.clear();
        self.seed_namespaces();
        self.locator = Arc::new(Locator::new(self.base_uri.clone(), None, 1, 1));
    }

    /// The single cleanup point of a parse: every stack, table and owned
    /// source is released here regardless of the outcome.
    fn cleanup(&mut self) {
        self.source = InputSource::default();
        self.source_stack.clear();
        self.entity_name = None;
        self.entities.clear();
        self.notations.clear();
        self.attlistdecls.clear();
        self.seed_namespaces();
        self.state = ParserState::Finished;
    }

    fn seed_namespaces(&mut self) {
        self.namespaces.clear();
        self.prefix_map.clear();
        // Permanent sentinel bindings; element parsing never pops below them.
        let xml: Arc<str> = "xml".into();
        self.namespaces
            .push((xml.clone(), XML_XML_NAMESPACE.into(), usize::MAX));
        self.prefix_map.insert(xml, 0);
        let xmlns: Arc<str> = "xmlns".into();
        self.namespaces
            .push((xmlns.clone(), XML_NS_NAMESPACE.into(), usize::MAX));
        self.prefix_map.insert(xmlns, 1);
    }

    /// Register a fatal condition. Further document events are suppressed,
    /// and the code of the first such condition becomes the parse outcome
    /// even when the raise site recovers instead of unwinding.
    pub(crate) fn record_fatal_error(&mut self, err: XMLError) {
        self.fatal_error_occurred = true;
        self.pending_fatal_error.get_or_insert(err);
    }

    /// Combine the result of the document scan with any recorded fatal
    /// condition into the outcome of the parse.
    fn fatal_outcome(&mut self, result: Result<(), XMLError>) -> Result<(), XMLError> {
        if let Err(err) = &result {
            self.notify_deferred_fatal(err.clone());
        }
        match self.pending_fatal_error.take() {
            Some(err) if result.is_ok() => Err(err),
            _ => result,
        }
    }

    /// Notify the handler of a fatal condition detected outside the reach of
    /// the reporting macros, such as a decode failure surfacing from `grow`.
    /// I/O errors are not well-formedness violations and are not reported
    /// through the handler.
    fn notify_deferred_fatal(&mut self, err: XMLError) {
        if self.fatal_error_occurred || matches!(err, XMLError::IOError(_)) {
            return;
        }
        self.fatal_error_occurred = true;
        self.handler.fatal_error(SAXParseError {
            error: err.clone(),
            level: XMLErrorLevel::FatalError,
            line: self.locator.line(),
            column: self.locator.column(),
            system_id: self.locator.system_id(),
            public_id: self.locator.public_id(),
            message: format!("{err}").into(),
        });
    }

    /// `grow` with decode errors deferred while an XML or text declaration is
    /// being scanned; the declaration may yet switch to the correct decoder.
    pub(crate) fn grow(&mut self) -> Result<(), XMLError> {
        match self.source.grow() {
            Err(XMLError::DecodeError(_))
                if matches!(
                    self.state,
                    ParserState::BeforeStart
                        | ParserState::InXMLDeclaration
                        | ParserState::InTextDeclaration
                ) =>
            {
                Ok(())
            }
            other => other,
        }
    }

    /// Consume `n` bytes of already-matched single-line markup and move the
    /// locator column along with them.
    pub(crate) fn consume_markup(&mut self, n: usize) -> Result<(), XMLError> {
        self.source.advance(n)?;
        self.locator.update_column(|c| c + n);
        Ok(())
    }

    /// Suspend the current source and start reading from `source`.
    ///
    /// `entity_name` identifies the entity being expanded for recursion
    /// checks; `None` for the external subset and attribute-value frames.
    pub(crate) fn push_source(
        &mut self,
        source: InputSource<'static>,
        entity_name: Option<Arc<str>>,
    ) {
        let new_system_id = source.system_id();
        let new_public_id = source.public_id();
        let frame = SourceFrame {
            source: std::mem::replace(&mut self.source, source),
            entity_name: self.entity_name.take(),
            version: self.version,
            encoding: self.encoding.take(),
            line: self.locator.line(),
            column: self.locator.column(),
            system_id: self.locator.system_id(),
            public_id: self.locator.public_id(),
        };
        self.source_stack.push(frame);
        self.entity_name = entity_name;
        self.locator.set_line(1);
        self.locator.set_column(1);
        if let Some(system_id) = new_system_id {
            self.locator.set_system_id(system_id);
        }
        self.locator.set_public_id(new_public_id);
    }

    /// Drop the current source and resume the frame beneath it.
    pub(crate) fn pop_source(&mut self) -> Result<(), XMLError> {
        let Some(frame) = self.source_stack.pop() else {
            return Err(XMLError::InternalError);
        };
        self.source = frame.source;
        self.entity_name = frame.entity_name;
        self.version = frame.version;
        self.encoding = frame.encoding;
        self.locator.set_line(frame.line);
        self.locator.set_column(frame.column);
        self.locator.set_system_id(frame.system_id);
        self.locator.set_public_id(frame.public_id);
        Ok(())
    }

    /// Check if expanding `name` now would expand an entity inside its own
    /// replacement text.
    pub(crate) fn entity_recursion_check(&self, name: &str) -> bool {
        self.entity_name.as_deref() == Some(name)
            || self
                .source_stack
                .iter()
                .any(|frame| frame.entity_name.as_deref() == Some(name))
    }

    /// Check if the parser is currently reading external markup declarations
    /// (the external subset or a parameter entity).
    pub(crate) fn is_external_markup(&self) -> bool {
        self.state == ParserState::InExternalSubset
            || self
                .entity_name
                .as_deref()
                .is_some_and(|name| name.starts_with('%'))
    }

    pub(crate) fn is_namespace_aware(&self) -> bool {
        self.config.is_enable(ParserOption::Namespaces)
    }

    pub(crate) fn is_char(&self, c: char) -> bool {
        self.version.is_char(c)
    }

    pub(crate) fn is_whitespace(&self, c: char) -> bool {
        self.version.is_whitespace(c)
    }

    pub(crate) fn is_name_start_char(&self, c: char) -> bool {
        self.version.is_name_start_char(c)
    }

    pub(crate) fn is_name_char(&self, c: char) -> bool {
        self.version.is_name_char(c)
    }

    pub(crate) fn is_pubid_char(&self, c: char) -> bool {
        self.version.is_pubid_char(c)
    }
}

/// Builder validating the reader configuration before any parsing can start.
pub struct XMLReaderBuilder<H: SAXHandler = DefaultSAXHandler> {
    config: ParserConfig,
    handler: H,
}

impl XMLReaderBuilder {
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
            handler: DefaultSAXHandler,
        }
    }
}

impl Default for XMLReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SAXHandler> XMLReaderBuilder<H> {
    pub fn set_handler<H2: SAXHandler>(self, handler: H2) -> XMLReaderBuilder<H2> {
        XMLReaderBuilder {
            config: self.config,
            handler,
        }
    }

    pub fn set_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn enable(mut self, option: ParserOption) -> Self {
        self.config.enable(option);
        self
    }

    pub fn disable(mut self, option: ParserOption) -> Self {
        self.config.disable(option);
        self
    }

    /// Select namespace-unaware mode (`NamespacePrefixes` on, `Namespaces`
    /// off).
    pub fn namespace_unaware(mut self) -> Self {
        self.config.disable(ParserOption::Namespaces);
        self.config.enable(ParserOption::NamespacePrefixes);
        self
    }

    /// Build the reader.
    ///
    /// `Namespaces` and `NamespacePrefixes` must not be both enabled or both
    /// disabled; any such combination is rejected here, before parsing.
    pub fn build<'a>(self) -> Result<XMLReader<'a, H>, XMLError> {
        if self.config.is_enable(ParserOption::Namespaces)
            == self.config.is_enable(ParserOption::NamespacePrefixes)
        {
            return Err(XMLError::IncompatibleParserOptions);
        }
        Ok(XMLReader::new(self.config, self.handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_namespace_aware() {
        let config = ParserConfig::default();
        assert!(config.is_enable(ParserOption::Namespaces));
        assert!(!config.is_enable(ParserOption::NamespacePrefixes));
        assert!(config.is_enable(ParserOption::ExternalGeneralEntities));
        assert!(config.is_enable(ParserOption::ExternalParameterEntities));
    }

    #[test]
    fn builder_rejects_inconsistent_namespace_options() {
        assert!(matches!(
            XMLReaderBuilder::new()
                .enable(ParserOption::NamespacePrefixes)
                .build(),
            Err(XMLError::IncompatibleParserOptions)
        ));
        assert!(matches!(
            XMLReaderBuilder::new()
                .disable(ParserOption::Namespaces)
                .build(),
            Err(XMLError::IncompatibleParserOptions)
        ));
        assert!(XMLReaderBuilder::new().build().is_ok());
        assert!(XMLReaderBuilder::new().namespace_unaware().build().is_ok());
    }
}
