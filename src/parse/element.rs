use std::sync::Arc;

use crate::{
    XML_NS_NAMESPACE, XML_XML_NAMESPACE,
    error::XMLError,
    sax::{
        attributes::{Attribute, Attributes},
        error::{error, fatal_error},
        handler::SAXHandler,
        parser::XMLReader,
    },
};

/// An attribute as written in the tag, before namespace processing.
struct RawAttribute {
    qname: String,
    prefix_length: usize,
    value: String,
    specified: bool,
    declared: bool,
    nsdecl: bool,
}

impl<H: SAXHandler> XMLReader<'_, H> {
    /// ```text
    /// [39] element ::= EmptyElemTag | STag content ETag       [WFC: Element Type Match]
    /// [40] STag ::= '<' Name (S Attribute)* S? '>'            [WFC: Unique Att Spec]
    /// [42] ETag ::= '</' Name S? '>'
    /// [44] EmptyElemTag ::= '<' Name (S Attribute)* S? '/>'   [WFC: Unique Att Spec]
    /// ```
    pub(crate) fn parse_element(&mut self) -> Result<(), XMLError> {
        let old_ns_stack_depth = self.namespaces.len();
        let mut name = String::new();
        let mut prefix_length = 0;
        let empty = self.parse_start_or_empty_tag(&mut name, &mut prefix_length)?;

        if !empty {
            self.parse_content()?;
            self.grow()?;

            // parse end tag

            if !self.source.content_bytes().starts_with(b"</") {
                fatal_error!(
                    self,
                    ParserInvalidEndTag,
                    "'</' is not found at the head of the end tag."
                );
                return Err(XMLError::ParserInvalidEndTag);
            }
            // skip '</'
            self.consume_markup(2)?;

            let mut end_tag_name = String::new();
            if self.is_namespace_aware() {
                self.parse_qname(&mut end_tag_name)?;
            } else {
                self.parse_name(&mut end_tag_name)?;
            }

            if name != end_tag_name {
                let name = truncate_name(name);
                let end_tag_name = truncate_name(end_tag_name);
                fatal_error!(
                    self,
                    ParserMismatchElementType,
                    "The start tag ('{}') and end tag ('{}') names do not match.",
                    name,
                    end_tag_name
                );
                return Err(XMLError::ParserMismatchElementType);
            }

            self.skip_whitespaces()?;
            self.grow()?;

            if !self.source.content_bytes().starts_with(b">") {
                fatal_error!(
                    self,
                    ParserInvalidEndTag,
                    "The end tag does not end with '>'."
                );
                return Err(XMLError::ParserInvalidEndTag);
            }
            // skip '>'
            self.consume_markup(1)?;
        }

        let uri = self.element_namespace_uri(&name, prefix_length)?;
        if !self.fatal_error_occurred {
            if self.is_namespace_aware() {
                let local_name = if prefix_length > 0 {
                    &name[prefix_length + 1..]
                } else {
                    name.as_str()
                };
                self.handler
                    .end_element(uri.as_deref(), Some(local_name), &name);
            } else {
                self.handler.end_element(None, None, &name);
            }
        }

        // resume namespace stack
        while self.namespaces.len() > old_ns_stack_depth {
            let Some((pre, _, old_position)) = self.namespaces.pop() else {
                break;
            };
            if !self.fatal_error_occurred {
                self.handler
                    .end_prefix_mapping((!pre.is_empty()).then_some(pre.as_ref()));
            }

            if old_position < usize::MAX {
                if let Some(position) = self.prefix_map.get_mut(&pre) {
                    *position = old_position;
                }
            } else {
                self.prefix_map.remove(&pre);
            }
        }

        Ok(())
    }

    /// Return `true` if the tag is an empty tag, otherwise `false`.
    fn parse_start_or_empty_tag(
        &mut self,
        name: &mut String,
        prefix_length: &mut usize,
    ) -> Result<bool, XMLError> {
        self.grow()?;

        if !self.source.content_bytes().starts_with(b"<") {
            fatal_error!(
                self,
                ParserInvalidStartOrEmptyTag,
                "StartTag or EmptyTag must start with '<'."
            );
            return Err(XMLError::ParserInvalidStartOrEmptyTag);
        }
        // skip '<'
        self.consume_markup(1)?;

        if self.is_namespace_aware() {
            *prefix_length = self.parse_qname(name)?;
        } else {
            self.parse_name(name)?;
        }

        let mut s = self.skip_whitespaces()?;
        self.grow()?;
        if self.source.content_bytes().is_empty() {
            return Err(XMLError::ParserUnexpectedEOF);
        }

        // Phase 1: collect the attributes as written.
        let mut atts = vec![];
        let mut att_name = String::new();
        let mut att_value = String::new();
        while !matches!(self.source.content_bytes()[0], b'/' | b'>') {
            if s == 0 {
                fatal_error!(
                    self,
                    ParserInvalidStartOrEmptyTag,
                    "Whitespaces are required before attribute names."
                );
            }

            att_name.clear();
            let mut att_prefix_length = 0;
            if self.is_namespace_aware() {
                att_prefix_length = self.parse_qname(&mut att_name)?;
            } else {
                self.parse_name(&mut att_name)?;
            }

            self.skip_whitespaces()?;
            self.grow()?;
            if !self.source.content_bytes().starts_with(b"=") {
                fatal_error!(
                    self,
                    ParserInvalidAttribute,
                    "'=' is not found after an attribute name in start or empty tag."
                );
                return Err(XMLError::ParserInvalidAttribute);
            }
            // skip '='
            self.consume_markup(1)?;

            self.skip_whitespaces()?;

            att_value.clear();
            self.parse_att_value(&mut att_value)?;
            let declared = self.normalize_att_value(name, &att_name, &mut att_value, None);
            atts.push(RawAttribute {
                qname: att_name.clone(),
                prefix_length: att_prefix_length,
                value: att_value.clone(),
                specified: true,
                declared,
                nsdecl: false,
            });

            s = self.skip_whitespaces()?;
            if self.source.content_bytes().is_empty() {
                self.grow()?;
                if self.source.content_bytes().is_empty() {
                    return Err(XMLError::ParserUnexpectedEOF);
                }
            }
        }

        // Phase 2: inject default values for declared but unspecified
        // attributes. Injected namespace declarations take part in the
        // namespace processing below exactly like explicit ones.
        for decl in self.attlistdecls.attlist(name) {
            let Some(default) = decl.default_decl.default_value() else {
                continue;
            };
            if atts
                .iter()
                .any(|att| att.qname.as_str() == decl.attr_name.as_ref())
            {
                continue;
            }
            let qname = decl.attr_name.to_string();
            let prefix_length = qname.find(':').unwrap_or(0);
            atts.push(RawAttribute {
                qname,
                prefix_length,
                value: default.to_owned(),
                specified: false,
                declared: true,
                nsdecl: false,
            });
        }

        // Phase 3: register namespace declarations in document order.
        if self.is_namespace_aware() {
            for i in 0..atts.len() {
                let prefix = if atts[i].qname == "xmlns" {
                    None
                } else if atts[i].prefix_length == 5 && atts[i].qname.starts_with("xmlns:") {
                    Some(atts[i].qname[6..].to_owned())
                } else {
                    continue;
                };
                atts[i].nsdecl = true;
                let value = atts[i].value.clone();
                self.check_namespace_decl(prefix.as_deref(), &value);

                let prefix = prefix.unwrap_or_default();
                let pos = self.namespaces.len();
                if let Some((pre, &old)) = self.prefix_map.get_key_value(prefix.as_str()) {
                    let pre = pre.clone();
                    self.namespaces.push((pre.clone(), value.as_str().into(), old));
                    if let Some(position) = self.prefix_map.get_mut(&pre) {
                        *position = pos;
                    }
                } else {
                    let pre: Arc<str> = prefix.as_str().into();
                    self.namespaces
                        .push((pre.clone(), value.as_str().into(), usize::MAX));
                    self.prefix_map.insert(pre, pos);
                }
            }
        }

        // Phase 4: resolve attribute namespaces and check for duplicates.
        // Namespace declarations are not part of the reported attribute list
        // in namespace-aware mode.
        let mut attributes = Attributes::new();
        for att in &atts {
            if att.nsdecl {
                continue;
            }
            let mut attribute = Attribute::new(att.qname.as_str().into(), att.value.as_str().into());
            if self.is_namespace_aware() {
                let local_name = if att.prefix_length > 0 {
                    &att.qname[att.prefix_length + 1..]
                } else {
                    att.qname.as_str()
                };
                attribute.local_name = Some(local_name.into());
                // Unprefixed attributes do not belong to the default
                // namespace; they belong to no namespace.
                if att.prefix_length > 0 {
                    let prefix = &att.qname[..att.prefix_length];
                    let Some(&pos) = self.prefix_map.get(prefix) else {
                        fatal_error!(
                            self,
                            ParserUndefinedNamespace,
                            "The prefix '{}' is not bound to any namespace.",
                            prefix
                        );
                        return Err(XMLError::ParserUndefinedNamespace);
                    };
                    let uri = self.namespaces[pos].1.clone();
                    if !uri.is_empty() {
                        attribute.uri = Some(uri);
                    }
                }
            }
            if att.qname == "xmlns" || att.qname.starts_with("xmlns:") {
                attribute.set_nsdecl();
            }
            if att.declared {
                attribute.set_declared();
            }
            if att.specified {
                attribute.set_specified();
            }
            if let Err((duplicated, err)) = attributes.push(attribute) {
                // [WFC: Unique Att Spec] / [NSC: Attributes Unique]
                fatal_error!(
                    self,
                    ParserDuplicateAttributes,
                    "The attribute '{}' is duplicated.",
                    duplicated.qname
                );
                return Err(err);
            }
        }

        self.grow()?;
        if !self.source.content_bytes().starts_with(b">")
            && !self.source.content_bytes().starts_with(b"/>")
        {
            fatal_error!(
                self,
                ParserInvalidStartOrEmptyTag,
                "Start or Empty tag does not end with '>' or '/>'."
            );
            return Err(XMLError::ParserInvalidStartOrEmptyTag);
        }

        let uri = self.element_namespace_uri(name, *prefix_length)?;
        if !self.fatal_error_occurred {
            for att in atts.iter().filter(|att| att.nsdecl) {
                if att.qname == "xmlns" {
                    self.handler.start_prefix_mapping(None, &att.value);
                } else {
                    self.handler
                        .start_prefix_mapping(Some(&att.qname[6..]), &att.value);
                }
            }
            if self.is_namespace_aware() {
                let local_name = if *prefix_length > 0 {
                    &name[*prefix_length + 1..]
                } else {
                    name.as_str()
                };
                self.handler
                    .start_element(uri.as_deref(), Some(local_name), name, &attributes);
            } else {
                self.handler.start_element(None, None, name, &attributes);
            }
        }

        self.grow()?;
        if self.source.content_bytes().starts_with(b"/>") {
            // This is an empty tag.

            // skip '/>'
            self.consume_markup(2)?;
            Ok(true)
        } else {
            // This is a start tag.

            // skip '>'
            self.consume_markup(1)?;
            Ok(false)
        }
    }

    /// Resolve the namespace name of an element.
    ///
    /// An unresolvable prefix is fatal. An unprefixed name resolves through
    /// the default namespace; binding the default namespace to the empty
    /// string places unprefixed elements in no namespace.
    fn element_namespace_uri(
        &mut self,
        name: &str,
        prefix_length: usize,
    ) -> Result<Option<Arc<str>>, XMLError> {
        if !self.is_namespace_aware() {
            return Ok(None);
        }
        let prefix = if prefix_length > 0 {
            &name[..prefix_length]
        } else {
            ""
        };
        match self.prefix_map.get(prefix) {
            Some(&pos) => {
                let uri = self.namespaces[pos].1.clone();
                Ok((!uri.is_empty()).then_some(uri))
            }
            None if prefix.is_empty() => Ok(None),
            None => {
                fatal_error!(
                    self,
                    ParserUndefinedNamespace,
                    "The prefix '{}' is not bound to any namespace.",
                    prefix
                );
                Err(XMLError::ParserUndefinedNamespace)
            }
        }
    }

    /// Report violations of the binding rules for the reserved prefixes and
    /// namespace names.
    fn check_namespace_decl(&mut self, prefix: Option<&str>, value: &str) {
        match prefix {
            None => {
                if value == XML_NS_NAMESPACE || value == XML_XML_NAMESPACE {
                    error!(
                        self,
                        ParserUnacceptableNamespaceName,
                        "Namespace '{}' cannot be declared as default namespace.",
                        value
                    );
                }
            }
            Some(prefix) => {
                if value.is_empty() {
                    error!(
                        self,
                        ParserUnacceptableNamespaceName,
                        "Empty namespace name is not allowed in Namespaces in XML 1.0."
                    );
                } else if value == XML_NS_NAMESPACE {
                    error!(
                        self,
                        ParserUnacceptableNamespaceName,
                        "The namespace '{}' cannot be declared explicitly.",
                        XML_NS_NAMESPACE
                    );
                } else if prefix != "xml" && value == XML_XML_NAMESPACE {
                    error!(
                        self,
                        ParserUnacceptableNamespaceName,
                        "The namespace '{}' cannot bind prefixes other than 'xml'.",
                        value
                    );
                } else if prefix == "xml" && value != XML_XML_NAMESPACE {
                    error!(
                        self,
                        ParserUnacceptableNamespaceName,
                        "The prefix 'xml' cannot be bound to the namespace '{}'.",
                        value
                    );
                } else if prefix == "xmlns" {
                    error!(
                        self,
                        ParserUnacceptableNamespaceName,
                        "The prefix 'xmlns' cannot be bound explicitly."
                    );
                }
            }
        }
    }
}

fn truncate_name(name: String) -> String {
    if name.chars().count() > 15 {
        format!("{}...", name.chars().take(12).collect::<String>())
    } else {
        name
    }
}
