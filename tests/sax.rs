//! End-to-end tests driving the reader with `DebugHandler` and comparing
//! the recorded event transcripts.

use saxifrage::{
    error::XMLError,
    sax::{
        handler::{DebugHandler, EntityResolver, SAXHandler},
        parser::XMLReaderBuilder,
        source::InputSource,
    },
};

fn parse(document: &str) -> (Result<(), XMLError>, String) {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::default())
        .build()
        .unwrap();
    let result = reader.parse_str(document, None);
    (result, reader.handler().buffer.clone())
}

fn parse_bytes(document: &[u8], encoding: Option<&str>) -> (Result<(), XMLError>, String) {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::default())
        .build()
        .unwrap();
    let result = reader.parse_reader(document, encoding, None);
    (result, reader.handler().buffer.clone())
}

#[test]
fn empty_element() {
    let (result, buffer) = parse("<a/>");
    assert!(result.is_ok());
    assert_eq!(
        buffer,
        r#"setDocumentLocator()
startDocument()
startElement(None, Some("a"), a)
endElement(None, Some("a"), a)
endDocument()
"#
    );
}

#[test]
fn xml_declaration_is_reported() {
    let (result, buffer) =
        parse("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?><a/>");
    assert!(result.is_ok());
    assert!(buffer.contains("declaration(1.0, Some(\"UTF-8\"), Some(false))"));
}

#[test]
fn character_data_is_split_around_child_elements() {
    let (result, buffer) = parse("<root>A<child/>B</root>");
    assert!(result.is_ok());
    assert_eq!(
        buffer,
        r#"setDocumentLocator()
startDocument()
startElement(None, Some("root"), root)
characters(A)
startElement(None, Some("child"), child)
endElement(None, Some("child"), child)
characters(B)
endElement(None, Some("root"), root)
endDocument()
"#
    );
}

#[test]
fn character_references_expand_in_place() {
    let (result, buffer) = parse("<a>&#65;&#x42;C</a>");
    assert!(result.is_ok());
    assert!(buffer.contains("characters(ABC)"));
}

#[test]
fn predefined_entity_in_content() {
    let (result, buffer) = parse("<a>x&amp;y</a>");
    assert!(result.is_ok());
    assert!(buffer.contains(
        "characters(x)\nstartEntity(amp)\ncharacters(&)\nendEntity()\ncharacters(y)\n"
    ));
}

#[test]
fn predefined_entity_in_attribute_value() {
    let (result, buffer) = parse("<a b=\"&lt;\"/>");
    assert!(result.is_ok());
    assert!(buffer.contains("startElement(None, Some(\"a\"), a, {None}b='<')"));
    assert!(!buffer.contains("fatalError("));
}

#[test]
fn literal_lt_in_attribute_value_is_fatal() {
    let (result, buffer) = parse("<a b=\"<c>\"/>");
    assert_eq!(result, Err(XMLError::ParserInvalidAttValue));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("endDocument()"));
}

#[test]
fn prefixed_elements_resolve_to_namespace_names() {
    let (result, buffer) = parse("<p:a xmlns:p=\"urn:x\"><p:b/></p:a>");
    assert!(result.is_ok());
    assert_eq!(
        buffer,
        r#"setDocumentLocator()
startDocument()
startPrefixMapping(Some("p"), urn:x)
startElement(Some("urn:x"), Some("a"), p:a)
startElement(Some("urn:x"), Some("b"), p:b)
endElement(Some("urn:x"), Some("b"), p:b)
endElement(Some("urn:x"), Some("a"), p:a)
endPrefixMapping(Some("p"))
endDocument()
"#
    );
}

#[test]
fn default_namespace_can_be_unbound() {
    let (result, buffer) = parse("<a xmlns=\"urn:d\"><b xmlns=\"\"/></a>");
    assert!(result.is_ok());
    assert!(buffer.contains("startElement(Some(\"urn:d\"), Some(\"a\"), a)"));
    assert!(buffer.contains("startElement(None, Some(\"b\"), b)"));
}

#[test]
fn namespace_declarations_are_excluded_from_attributes() {
    let (result, buffer) = parse("<a xmlns:p=\"urn:x\" p:b=\"1\" c=\"2\"/>");
    assert!(result.is_ok());
    assert!(buffer.contains(
        "startElement(None, Some(\"a\"), a, {Some(\"urn:x\")}b='1', {None}c='2')"
    ));
    assert!(!buffer.contains("xmlns:p='urn:x'"));
}

#[test]
fn namespace_unaware_mode_reports_qualified_names_only() {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::default())
        .namespace_unaware()
        .build()
        .unwrap();
    let result = reader.parse_str("<p:a xmlns:p=\"urn:x\" p:b=\"1\"/>", None);
    assert!(result.is_ok());
    let buffer = &reader.handler().buffer;
    assert!(buffer.contains("startElement(None, None, p:a, xmlns:p='urn:x', p:b='1')"));
    assert!(buffer.contains("endElement(None, None, p:a)"));
    assert!(!buffer.contains("startPrefixMapping("));
}

#[test]
fn unbound_prefix_is_fatal() {
    let (result, buffer) = parse("<p:a/>");
    assert_eq!(result, Err(XMLError::ParserUndefinedNamespace));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("endDocument()"));
}

#[test]
fn duplicate_attribute_is_fatal() {
    let (result, _) = parse("<a b=\"1\" b=\"2\"/>");
    assert_eq!(result, Err(XMLError::ParserDuplicateAttributes));
}

#[test]
fn duplicate_attribute_by_expanded_name_is_fatal() {
    let (result, _) = parse("<a xmlns:p=\"urn:x\" xmlns:q=\"urn:x\" p:b=\"1\" q:b=\"2\"/>");
    assert_eq!(result, Err(XMLError::ParserDuplicateAttributes));
}

#[test]
fn mismatched_end_tag_is_fatal() {
    let (result, buffer) = parse("<a></b>");
    assert_eq!(result, Err(XMLError::ParserMismatchElementType));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("endDocument()"));
}

#[test]
fn content_after_document_element_is_fatal() {
    let (result, _) = parse("<a/>x");
    assert_eq!(result, Err(XMLError::ParserUnexpectedDocumentContent));
}

#[test]
fn comments_and_pis_are_allowed_in_the_epilog() {
    let (result, buffer) = parse("<a/><?go stop?><!--note-->");
    assert!(result.is_ok());
    assert!(buffer.contains("processingInstruction(go, Some(\"stop\"))"));
    assert!(buffer.contains("comment(note)"));
    assert!(buffer.ends_with("endDocument()\n"));
}

#[test]
fn pi_without_data() {
    let (result, buffer) = parse("<?go?><a/>");
    assert!(result.is_ok());
    assert!(buffer.contains("processingInstruction(go, None)"));
}

#[test]
fn cdata_section_preserves_markup_characters() {
    let (result, buffer) = parse("<a><![CDATA[x]]y]]></a>");
    assert!(result.is_ok());
    assert!(buffer.contains("startCDATA()\ncharacters(x]]y)\nendCDATA()\n"));
}

#[test]
fn cdata_end_pattern_in_character_data_is_fatal() {
    let (result, buffer) = parse("<a>x]]>z</a>");
    assert_eq!(result, Err(XMLError::ParserUnacceptablePatternInCharData));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("endDocument()"));
}

#[test]
fn double_hyphen_in_comment_is_fatal() {
    let (result, buffer) = parse("<a><!-- x -- y --></a>");
    assert_eq!(result, Err(XMLError::ParserInvalidComment));
    assert!(buffer.contains("fatalError("));
}

#[test]
fn missing_whitespace_between_attributes_is_fatal() {
    let (result, buffer) = parse("<a b=\"1\"c=\"2\"/>");
    assert_eq!(result, Err(XMLError::ParserInvalidStartOrEmptyTag));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("endDocument()"));
}

#[test]
fn reserved_pi_target_is_fatal() {
    let (result, buffer) = parse("<?xMl note?><a/>");
    assert_eq!(result, Err(XMLError::ParserUnacceptablePITarget));
    assert!(buffer.contains("fatalError("));
}

#[test]
fn control_character_in_content_is_fatal() {
    let (result, buffer) = parse("<a>\u{c}</a>");
    assert_eq!(result, Err(XMLError::ParserInvalidCharacter));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("endDocument()"));
}

#[test]
fn internal_entity_is_expanded_with_boundary_events() {
    let (result, buffer) = parse("<!DOCTYPE a [<!ENTITY foo \"bar\">]><a>&foo;</a>");
    assert!(result.is_ok());
    assert_eq!(
        buffer,
        r#"setDocumentLocator()
startDocument()
getExternalSubset(a, Some(""))
startDTD(a, None, None)
internalEntityDecl(foo, bar)
endDTD()
startElement(None, Some("a"), a)
startEntity(foo)
characters(bar)
endEntity()
endElement(None, Some("a"), a)
endDocument()
"#
    );
}

#[test]
fn recursive_entities_are_fatal() {
    let (result, _) = parse("<!DOCTYPE a [<!ENTITY e \"&f;\"><!ENTITY f \"&e;\">]><a>&e;</a>");
    assert_eq!(result, Err(XMLError::ParserEntityRecursion));
}

#[test]
fn undeclared_entity_without_any_dtd_is_fatal() {
    let (result, buffer) = parse("<a>&nope;</a>");
    assert_eq!(result, Err(XMLError::ParserEntityNotFound));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("skippedEntity("));
    assert!(!buffer.contains("endDocument()"));
}

#[test]
fn undeclared_entity_may_be_skipped_when_declarations_can_be_missing() {
    // A parameter entity is declared and no external subset was read, so the
    // entity may be declared in markup the processor has not seen.
    let (result, buffer) = parse("<!DOCTYPE a [<!ENTITY % p \"x\">]><a>&nope;</a>");
    assert!(result.is_ok());
    assert!(buffer.contains("internalEntityDecl(%p, x)"));
    assert!(buffer.contains("skippedEntity(nope)"));
    assert!(buffer.contains("endDocument()"));
    assert!(!buffer.contains("fatalError("));
}

#[test]
fn undeclared_entity_in_standalone_document_is_fatal() {
    let (result, buffer) = parse(
        "<?xml version=\"1.0\" standalone=\"yes\"?><!DOCTYPE a [<!ENTITY % p \"x\">]><a>&nope;</a>",
    );
    assert_eq!(result, Err(XMLError::ParserEntityNotFound));
    assert!(buffer.contains("fatalError("));
    assert!(!buffer.contains("skippedEntity("));
    assert!(!buffer.contains("getExternalSubset("));
}

#[test]
fn attribute_defaults_are_injected() {
    let (result, buffer) = parse("<!DOCTYPE a [<!ATTLIST a b CDATA \"x\">]><a/>");
    assert!(result.is_ok());
    assert!(buffer.contains("attributeDecl(a, b, CDATA, None(\"x\"))"));
    assert!(buffer.contains("startElement(None, Some(\"a\"), a, {None}b='x')"));
}

#[test]
fn tokenized_attribute_values_are_collapsed() {
    let (result, buffer) = parse("<!DOCTYPE a [<!ATTLIST a b NMTOKEN #IMPLIED>]><a b=\" x  y \"/>");
    assert!(result.is_ok());
    assert!(buffer.contains("attributeDecl(a, b, NMTOKEN, IMPLIED)"));
    assert!(buffer.contains("startElement(None, Some(\"a\"), a, {None}b='x y')"));
}

#[test]
fn enumerated_attribute_type_keeps_token_order() {
    let (result, buffer) = parse("<!DOCTYPE a [<!ATTLIST a b (x|y) \"x\">]><a/>");
    assert!(result.is_ok());
    assert!(buffer.contains("attributeDecl(a, b, Enumeration([\"x\", \"y\"]), None(\"x\"))"));
}

#[test]
fn element_and_notation_declarations_are_reported() {
    let (result, buffer) = parse(
        "<!DOCTYPE a [\
         <!ELEMENT a (b | c)*>\
         <!NOTATION n SYSTEM \"n.exe\">\
         <!ENTITY u SYSTEM \"u.dat\" NDATA n>\
         ]><a/>",
    );
    assert!(result.is_ok());
    assert!(buffer.contains("elementDecl(a, (b | c)*)"));
    assert!(buffer.contains("notationDecl(n, None, Some(\"n.exe\"))"));
    assert!(buffer.contains("unparsedEntityDecl(u, None, u.dat, n)"));
}

#[test]
fn unparsed_entity_reference_in_content_is_fatal() {
    let (result, _) = parse(
        "<!DOCTYPE a [\
         <!NOTATION n SYSTEM \"n.exe\">\
         <!ENTITY u SYSTEM \"u.dat\" NDATA n>\
         ]><a>&u;</a>",
    );
    assert_eq!(result, Err(XMLError::ParserInvalidEntityReference));
}

#[test]
fn duplicate_entity_declarations_keep_the_first_and_warn() {
    let (result, buffer) = parse("<!DOCTYPE a [<!ENTITY e \"1\"><!ENTITY e \"2\">]><a>&e;</a>");
    assert!(result.is_ok());
    assert!(buffer.contains("warning(The entity 'e' is declared more than once.)"));
    assert!(buffer.contains("characters(1)"));
    assert!(!buffer.contains("characters(2)"));
}

#[test]
fn utf8_byte_order_mark_is_consumed() {
    let (result, buffer) = parse_bytes(b"\xEF\xBB\xBF<a/>", None);
    assert!(result.is_ok());
    assert!(buffer.contains("startElement(None, Some(\"a\"), a)"));
}

#[test]
fn utf16_little_endian_is_detected_from_the_byte_order_mark() {
    let mut document = vec![0xFF, 0xFE];
    for unit in "<a b=\"v\"/>".encode_utf16() {
        document.extend_from_slice(&unit.to_le_bytes());
    }
    let (result, buffer) = parse_bytes(&document, None);
    assert!(result.is_ok());
    assert!(buffer.contains("startElement(None, Some(\"a\"), a, {None}b='v')"));
}

#[test]
fn utf16_big_endian_is_detected_from_the_byte_order_mark() {
    let mut document = vec![0xFE, 0xFF];
    for unit in "<a/>".encode_utf16() {
        document.extend_from_slice(&unit.to_be_bytes());
    }
    let (result, buffer) = parse_bytes(&document, None);
    assert!(result.is_ok());
    assert!(buffer.contains("startElement(None, Some(\"a\"), a)"));
}

#[test]
fn declared_encoding_switches_the_decoder() {
    let mut document = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a b=\"".to_vec();
    document.push(0xE9);
    document.extend_from_slice(b"\"/>");
    let (result, buffer) = parse_bytes(&document, None);
    assert!(result.is_ok());
    assert!(buffer.contains("startElement(None, Some(\"a\"), a, {None}b='\u{E9}')"));
}

#[test]
fn reader_can_be_reused_for_multiple_documents() {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(DebugHandler::default())
        .build()
        .unwrap();
    reader.parse_str("<a/>", None).unwrap();
    let first = reader.handler().buffer.clone();
    reader.handler_mut().buffer.clear();
    reader.parse_str("<a/>", None).unwrap();
    assert_eq!(first, reader.handler().buffer);
}

/// Serves in-memory replacement text for the external resources the test
/// documents refer to and records the entity-related events.
struct RecordingResolver {
    external_subset: &'static str,
    events: Vec<String>,
}

impl Default for RecordingResolver {
    fn default() -> Self {
        Self {
            external_subset: "<!ENTITY ext \"EXT\">",
            events: vec![],
        }
    }
}

impl EntityResolver for RecordingResolver {
    fn get_external_subset(
        &mut self,
        _name: &str,
        _base_uri: Option<&str>,
    ) -> Result<InputSource<'static>, XMLError> {
        Ok(InputSource::from_content(self.external_subset))
    }

    fn resolve_entity(
        &mut self,
        _name: &str,
        _public_id: Option<&str>,
        _base_uri: &str,
        system_id: &str,
    ) -> Result<InputSource<'static>, XMLError> {
        match system_id {
            "ext.ent" => Ok(InputSource::from_content("EXT")),
            "pe.ent" => Ok(InputSource::from_content("<!ATTLIST a b CDATA \"z\">")),
            _ => Err(XMLError::IONotFoundResource),
        }
    }
}

impl SAXHandler for RecordingResolver {
    fn characters(&mut self, data: &str) {
        self.events.push(format!("characters({data})"));
    }

    fn skipped_entity(&mut self, name: &str) {
        self.events.push(format!("skippedEntity({name})"));
    }

    fn start_element(
        &mut self,
        _uri: Option<&str>,
        _local_name: Option<&str>,
        qname: &str,
        atts: &saxifrage::sax::attributes::Attributes,
    ) {
        let mut event = format!("startElement({qname}");
        for att in atts {
            event.push_str(&format!(", {}='{}'", att.qname, att.value));
        }
        event.push(')');
        self.events.push(event);
    }

    fn start_entity(&mut self, name: &str) {
        self.events.push(format!("startEntity({name})"));
    }

    fn end_entity(&mut self) {
        self.events.push("endEntity()".to_owned());
    }
}

fn parse_with_resolver(document: &str) -> (Result<(), XMLError>, Vec<String>) {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(RecordingResolver::default())
        .build()
        .unwrap();
    let result = reader.parse_str(document, None);
    (result, std::mem::take(&mut reader.handler_mut().events))
}

#[test]
fn entities_declared_in_the_external_subset_are_available() {
    let (result, events) = parse_with_resolver("<!DOCTYPE a><a>&ext;</a>");
    assert!(result.is_ok());
    assert_eq!(
        events,
        [
            "startEntity([dtd])",
            "endEntity()",
            "startElement(a)",
            "startEntity(ext)",
            "characters(EXT)",
            "endEntity()",
        ]
    );
}

#[test]
fn external_general_entity_is_fetched_and_expanded() {
    let (result, events) = parse_with_resolver(
        "<!DOCTYPE a [<!ENTITY ext SYSTEM \"ext.ent\">]><a>&ext;</a>",
    );
    assert!(result.is_ok());
    assert_eq!(
        events,
        [
            "startElement(a)",
            "startEntity(ext)",
            "characters(EXT)",
            "endEntity()",
        ]
    );
}

#[test]
fn external_parameter_entity_contributes_declarations() {
    let (result, events) = parse_with_resolver(
        "<!DOCTYPE a [<!ENTITY % pe SYSTEM \"pe.ent\"> %pe;]><a/>",
    );
    assert!(result.is_ok());
    assert_eq!(events, ["startEntity(%pe)", "endEntity()", "startElement(a, b='z')"]);
}

#[test]
fn conditional_sections_in_the_external_subset() {
    let mut reader = XMLReaderBuilder::new()
        .set_handler(RecordingResolver {
            external_subset: "<![INCLUDE[<!ENTITY inc \"IN\">]]><![IGNORE[<!ENTITY ign \"IG\">]]>",
            events: vec![],
        })
        .build()
        .unwrap();
    let result = reader.parse_str("<!DOCTYPE a><a>&inc;</a>", None);
    assert!(result.is_ok());
    let events = &reader.handler().events;
    assert!(events.contains(&"characters(IN)".to_owned()));
    assert!(!events.iter().any(|event| event.contains("IG")));
}

#[test]
fn unresolvable_external_entity_is_skipped_with_an_error() {
    let (result, events) = parse_with_resolver(
        "<!DOCTYPE a [<!ENTITY missing SYSTEM \"missing.ent\">]><a>&missing;</a>",
    );
    assert!(result.is_ok());
    assert_eq!(events, ["startElement(a)", "skippedEntity(missing)"]);
}
