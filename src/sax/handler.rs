use std::{fmt::Write as _, sync::Arc};

use crate::{
    error::XMLError,
    sax::{
        AttributeType, DefaultDecl, Locator, attributes::Attributes, error::SAXParseError,
        source::InputSource,
    },
};

/// The event-consumer contract of the parser.
///
/// All methods have empty default implementations, so a handler implements
/// only the events it cares about. Callbacks are invoked synchronously from
/// inside the parse call and must not re-enter the parser.
///
/// The method set merges the `ContentHandler`, `DTDHandler`, `DeclHandler`,
/// `LexicalHandler` and `ErrorHandler` interfaces of the
/// [Java SAX API](https://docs.oracle.com/javase/jp/21/docs/api/java.xml/org/xml/sax/package-summary.html)
/// into a single trait.
pub trait SAXHandler: EntityResolver {
    /// Character data. A single text node may be delivered through several
    /// consecutive calls.
    fn characters(&mut self, data: &str) {
        let _ = data;
    }

    /// Report the XML declaration of the document entity.
    fn declaration(&mut self, version: &str, encoding: Option<&str>, standalone: Option<bool>) {
        let _ = (version, encoding, standalone);
    }

    fn ignorable_whitespace(&mut self, data: &str) {
        let _ = data;
    }

    /// `data` is `None` when the instruction consists of a target only.
    fn processing_instruction(&mut self, target: &str, data: Option<&str>) {
        let _ = (target, data);
    }

    /// Receive the locator before any other event of the parse. It stays
    /// valid while the parse is in progress.
    fn set_document_locator(&mut self, locator: Arc<Locator>) {
        let _ = locator;
    }

    /// An entity the parser chose not to (or could not) expand.
    ///
    /// `name` is `%`-prefixed for parameter entities and `[dtd]` for the
    /// external subset.
    fn skipped_entity(&mut self, name: &str) {
        let _ = name;
    }

    fn start_document(&mut self) {}
    fn end_document(&mut self) {}

    /// In namespace-unaware mode `uri` and `local_name` are `None`.
    fn start_element(
        &mut self,
        uri: Option<&str>,
        local_name: Option<&str>,
        qname: &str,
        atts: &Attributes,
    ) {
        let _ = (uri, local_name, qname, atts);
    }
    fn end_element(&mut self, uri: Option<&str>, local_name: Option<&str>, qname: &str) {
        let _ = (uri, local_name, qname);
    }

    /// `prefix` is `None` for a default-namespace declaration.
    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) {
        let _ = (prefix, uri);
    }
    fn end_prefix_mapping(&mut self, prefix: Option<&str>) {
        let _ = prefix;
    }

    /// An attribute definition inside an `<!ATTLIST>` declaration, one call
    /// per defined attribute.
    fn attribute_decl(
        &mut self,
        element_name: &str,
        attribute_name: &str,
        attribute_type: &AttributeType,
        default_decl: &DefaultDecl,
    ) {
        let _ = (element_name, attribute_name, attribute_type, default_decl);
    }

    /// `model` is the declared content model as raw text (`EMPTY`, `ANY`, or
    /// a parenthesized group); it is reported but never interpreted.
    fn element_decl(&mut self, name: &str, model: &str) {
        let _ = (name, model);
    }

    fn external_entity_decl(&mut self, name: &str, public_id: Option<&str>, system_id: &str) {
        let _ = (name, public_id, system_id);
    }

    fn internal_entity_decl(&mut self, name: &str, value: &str) {
        let _ = (name, value);
    }

    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        let _ = (name, public_id, system_id);
    }

    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: &str,
        notation_name: &str,
    ) {
        let _ = (name, public_id, system_id, notation_name);
    }

    /// A recoverable error. Parsing continues after the callback returns.
    fn error(&mut self, error: SAXParseError) {
        let _ = error;
    }

    /// After this callback the parse is unrecoverable; the parser unwinds,
    /// releases its resources and returns the error outcome.
    fn fatal_error(&mut self, error: SAXParseError) {
        let _ = error;
    }

    fn warning(&mut self, error: SAXParseError) {
        let _ = error;
    }

    /// Comment text, excluding the delimiters. Long comments may arrive in
    /// several calls.
    fn comment(&mut self, data: &str) {
        let _ = data;
    }

    /// The content of the section is still delivered through [`characters`],
    /// with no escaping applied.
    ///
    /// [`characters`]: SAXHandler::characters
    fn start_cdata(&mut self) {}
    fn end_cdata(&mut self) {}

    fn start_dtd(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        let _ = (name, public_id, system_id);
    }
    fn end_dtd(&mut self) {}

    /// The events up to the matching [`end_entity`] originate from the
    /// replacement text of `name`.
    ///
    /// [`end_entity`]: SAXHandler::end_entity
    fn start_entity(&mut self, name: &str) {
        let _ = name;
    }
    fn end_entity(&mut self) {}
}

/// Resolution of external entities and the external DTD subset.
///
/// Both methods default to "could not resolve"; the parser maps resolution
/// failure to skipped-entity notifications rather than errors wherever XML 1.0
/// permits it. Opening local resources by system id is deliberately left to
/// user implementations.
///
/// The shape follows the `EntityResolver2` interface of the
/// [Java SAX API](https://docs.oracle.com/javase/jp/21/docs/api/java.xml/org/xml/sax/ext/EntityResolver2.html).
pub trait EntityResolver {
    /// Offer an external subset for a document that does not declare one.
    fn get_external_subset(
        &mut self,
        name: &str,
        base_uri: Option<&str>,
    ) -> Result<InputSource<'static>, XMLError> {
        let _ = (name, base_uri);
        Err(XMLError::IONotFoundResource)
    }

    /// Map an external identifier to an input source.
    fn resolve_entity(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        base_uri: &str,
        system_id: &str,
    ) -> Result<InputSource<'static>, XMLError> {
        let _ = (name, public_id, base_uri, system_id);
        Err(XMLError::IONotFoundResource)
    }
}

/// Handler that reports warnings and errors to stderr and ignores all other
/// events.
pub struct DefaultSAXHandler;

impl SAXHandler for DefaultSAXHandler {
    fn error(&mut self, error: SAXParseError) {
        eprintln!("{error}")
    }

    fn fatal_error(&mut self, error: SAXParseError) {
        eprintln!("{error}")
    }

    fn warning(&mut self, error: SAXParseError) {
        eprintln!("{error}")
    }
}
impl EntityResolver for DefaultSAXHandler {}

/// Handler that records every event as one line in `buffer` and forwards it
/// to `child`.
pub struct DebugHandler<Child: SAXHandler = DefaultSAXHandler> {
    pub buffer: String,
    pub child: Child,
}

impl EntityResolver for DebugHandler {
    fn get_external_subset(
        &mut self,
        name: &str,
        base_uri: Option<&str>,
    ) -> Result<InputSource<'static>, XMLError> {
        writeln!(self.buffer, "getExternalSubset({name}, {base_uri:?})").ok();
        self.child.get_external_subset(name, base_uri)
    }

    fn resolve_entity(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        base_uri: &str,
        system_id: &str,
    ) -> Result<InputSource<'static>, XMLError> {
        writeln!(
            self.buffer,
            "resolveEntity({name}, {public_id:?}, {base_uri}, {system_id})"
        )
        .ok();
        self.child
            .resolve_entity(name, public_id, base_uri, system_id)
    }
}

impl SAXHandler for DebugHandler {
    fn characters(&mut self, data: &str) {
        writeln!(self.buffer, "characters({data})").ok();
        self.child.characters(data);
    }

    fn declaration(&mut self, version: &str, encoding: Option<&str>, standalone: Option<bool>) {
        writeln!(
            self.buffer,
            "declaration({version}, {encoding:?}, {standalone:?})"
        )
        .ok();
        self.child.declaration(version, encoding, standalone);
    }

    fn ignorable_whitespace(&mut self, data: &str) {
        writeln!(self.buffer, "ignorableWhitespace({data})").ok();
        self.child.ignorable_whitespace(data);
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) {
        writeln!(self.buffer, "processingInstruction({target}, {data:?})").ok();
        self.child.processing_instruction(target, data);
    }

    fn set_document_locator(&mut self, locator: Arc<Locator>) {
        writeln!(self.buffer, "setDocumentLocator()").ok();
        self.child.set_document_locator(locator);
    }

    fn skipped_entity(&mut self, name: &str) {
        writeln!(self.buffer, "skippedEntity({name})").ok();
        self.child.skipped_entity(name);
    }

    fn start_document(&mut self) {
        writeln!(self.buffer, "startDocument()").ok();
        self.child.start_document();
    }
    fn end_document(&mut self) {
        writeln!(self.buffer, "endDocument()").ok();
        self.child.end_document();
    }

    fn start_element(
        &mut self,
        uri: Option<&str>,
        local_name: Option<&str>,
        qname: &str,
        atts: &Attributes,
    ) {
        write!(self.buffer, "startElement({uri:?}, {local_name:?}, {qname}").ok();
        for att in atts {
            write!(self.buffer, ", ").ok();
            if let Some(local_name) = att.local_name.as_deref() {
                write!(self.buffer, "{{{:?}}}{local_name}='{}'", att.uri, att.value).ok();
            } else {
                write!(self.buffer, "{}='{}'", att.qname, att.value).ok();
            }
        }
        writeln!(self.buffer, ")").ok();
        self.child.start_element(uri, local_name, qname, atts);
    }
    fn end_element(&mut self, uri: Option<&str>, local_name: Option<&str>, qname: &str) {
        writeln!(self.buffer, "endElement({uri:?}, {local_name:?}, {qname})").ok();
        self.child.end_element(uri, local_name, qname);
    }

    fn start_prefix_mapping(&mut self, prefix: Option<&str>, uri: &str) {
        writeln!(self.buffer, "startPrefixMapping({prefix:?}, {uri})").ok();
        self.child.start_prefix_mapping(prefix, uri);
    }
    fn end_prefix_mapping(&mut self, prefix: Option<&str>) {
        writeln!(self.buffer, "endPrefixMapping({prefix:?})").ok();
        self.child.end_prefix_mapping(prefix);
    }

    fn attribute_decl(
        &mut self,
        element_name: &str,
        attribute_name: &str,
        attribute_type: &AttributeType,
        default_decl: &DefaultDecl,
    ) {
        writeln!(
            self.buffer,
            "attributeDecl({element_name}, {attribute_name}, {attribute_type:?}, {default_decl:?})"
        )
        .ok();
        self.child
            .attribute_decl(element_name, attribute_name, attribute_type, default_decl);
    }

    fn element_decl(&mut self, name: &str, model: &str) {
        writeln!(self.buffer, "elementDecl({name}, {model})").ok();
        self.child.element_decl(name, model);
    }

    fn external_entity_decl(&mut self, name: &str, public_id: Option<&str>, system_id: &str) {
        writeln!(
            self.buffer,
            "externalEntityDecl({name}, {public_id:?}, {system_id})"
        )
        .ok();
        self.child.external_entity_decl(name, public_id, system_id);
    }

    fn internal_entity_decl(&mut self, name: &str, value: &str) {
        writeln!(self.buffer, "internalEntityDecl({name}, {value})").ok();
        self.child.internal_entity_decl(name, value);
    }

    fn notation_decl(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        writeln!(
            self.buffer,
            "notationDecl({name}, {public_id:?}, {system_id:?})"
        )
        .ok();
        self.child.notation_decl(name, public_id, system_id);
    }

    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: &str,
        notation_name: &str,
    ) {
        writeln!(
            self.buffer,
            "unparsedEntityDecl({name}, {public_id:?}, {system_id}, {notation_name})"
        )
        .ok();
        self.child
            .unparsed_entity_decl(name, public_id, system_id, notation_name);
    }

    fn error(&mut self, error: SAXParseError) {
        writeln!(self.buffer, "error({})", error.message).ok();
        self.child.error(error);
    }

    fn fatal_error(&mut self, error: SAXParseError) {
        writeln!(self.buffer, "fatalError({})", error.message).ok();
        self.child.fatal_error(error);
    }

    fn warning(&mut self, error: SAXParseError) {
        writeln!(self.buffer, "warning({})", error.message).ok();
        self.child.warning(error);
    }

    fn comment(&mut self, data: &str) {
        writeln!(self.buffer, "comment({data})").ok();
        self.child.comment(data);
    }

    fn start_cdata(&mut self) {
        writeln!(self.buffer, "startCDATA()").ok();
        self.child.start_cdata();
    }
    fn end_cdata(&mut self) {
        writeln!(self.buffer, "endCDATA()").ok();
        self.child.end_cdata();
    }

    fn start_dtd(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        writeln!(self.buffer, "startDTD({name}, {public_id:?}, {system_id:?})").ok();
        self.child.start_dtd(name, public_id, system_id);
    }
    fn end_dtd(&mut self) {
        writeln!(self.buffer, "endDTD()").ok();
        self.child.end_dtd();
    }

    fn start_entity(&mut self, name: &str) {
        writeln!(self.buffer, "startEntity({name})").ok();
        self.child.start_entity(name);
    }
    fn end_entity(&mut self) {
        writeln!(self.buffer, "endEntity()").ok();
        self.child.end_entity();
    }
}

impl Default for DebugHandler {
    fn default() -> Self {
        Self {
            buffer: String::new(),
            child: DefaultSAXHandler,
        }
    }
}
