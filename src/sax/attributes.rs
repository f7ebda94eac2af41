use std::{collections::HashMap, ops::Index, sync::Arc};

use crate::error::XMLError;

const FLAG_DECLARED: u8 = 1 << 0;
const FLAG_SPECIFIED: u8 = 1 << 1;
const FLAG_NSDECL: u8 = 1 << 2;

/// A single attribute of a start tag, after value normalization and
/// namespace resolution.
///
/// `local_name` and `uri` are `None` in namespace-unaware mode.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub uri: Option<Arc<str>>,
    pub local_name: Option<Arc<str>>,
    pub qname: Arc<str>,
    pub value: Box<str>,
    pub(crate) flag: u8,
}

impl Attribute {
    pub(crate) fn new(qname: Arc<str>, value: Box<str>) -> Self {
        Self {
            uri: None,
            local_name: None,
            qname,
            value,
            flag: 0,
        }
    }

    pub(crate) fn set_declared(&mut self) {
        self.flag |= FLAG_DECLARED;
    }
    pub(crate) fn set_specified(&mut self) {
        self.flag |= FLAG_SPECIFIED;
    }
    pub(crate) fn set_nsdecl(&mut self) {
        self.flag |= FLAG_NSDECL;
    }

    /// Whether an attribute-list declaration exists for this attribute.
    pub fn is_declared(&self) -> bool {
        self.flag & FLAG_DECLARED != 0
    }
    /// Whether the attribute was written in the document, as opposed to
    /// being injected from a declared default value.
    pub fn is_specified(&self) -> bool {
        self.flag & FLAG_SPECIFIED != 0
    }
    /// Whether this is a namespace declaration attribute.
    pub fn is_nsdecl(&self) -> bool {
        self.flag & FLAG_NSDECL != 0
    }
}

/// The list of attributes reported with a start-element event.
///
/// In namespace-aware mode namespace declarations are not part of this list;
/// they are reported through prefix-mapping events instead. Lookup is
/// available positionally, by qualified name, and by expanded name.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    attributes: Vec<Attribute>,
    index_by_qname: HashMap<Arc<str>, usize>,
    // local name -> (namespace name -> index), "" for no namespace
    index_by_expanded_name: HashMap<Arc<str>, HashMap<Arc<str>, usize>>,
}

impl Attributes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The position of the attribute named `qname`, if present.
    pub fn get_index_by_qname(&self, qname: &str) -> Option<usize> {
        self.index_by_qname.get(qname).copied()
    }

    /// The position of the attribute with the given namespace name and
    /// local name, if present.
    pub fn get_index_by_expanded_name(
        &self,
        namespace_name: Option<&str>,
        local_name: &str,
    ) -> Option<usize> {
        self.index_by_expanded_name
            .get(local_name)?
            .get(namespace_name.unwrap_or(""))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_qname(&self, qname: &str) -> bool {
        self.get_index_by_qname(qname).is_some()
    }

    pub fn contains_expanded_name(&self, namespace_name: Option<&str>, local_name: &str) -> bool {
        self.get_index_by_expanded_name(namespace_name, local_name)
            .is_some()
    }

    pub fn get_local_name(&self, index: usize) -> Option<&str> {
        self.attributes.get(index)?.local_name.as_deref()
    }

    pub fn get_qname(&self, index: usize) -> Option<&str> {
        Some(self.attributes.get(index)?.qname.as_ref())
    }

    pub fn get_namespace_uri(&self, index: usize) -> Option<&str> {
        self.attributes.get(index)?.uri.as_deref()
    }

    pub fn get_value(&self, index: usize) -> Option<&str> {
        Some(self.attributes.get(index)?.value.as_ref())
    }

    pub fn get_value_by_qname(&self, qname: &str) -> Option<&str> {
        let index = self.get_index_by_qname(qname)?;
        self.get_value(index)
    }

    pub fn get_value_by_expanded_name(
        &self,
        namespace_name: Option<&str>,
        local_name: &str,
    ) -> Option<&str> {
        let index = self.get_index_by_expanded_name(namespace_name, local_name)?;
        self.get_value(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    /// Append `attribute`, rejecting it when another attribute with the same
    /// qualified name or the same expanded name is already present.
    ///
    /// On rejection the attribute is handed back together with the error so
    /// the caller can still report its name.
    pub(crate) fn push(&mut self, attribute: Attribute) -> Result<usize, (Attribute, XMLError)> {
        use std::collections::hash_map::Entry::*;

        let index = self.attributes.len();
        match self.index_by_qname.entry(attribute.qname.clone()) {
            Vacant(entry) => {
                entry.insert(index);
            }
            Occupied(_) => return Err((attribute, XMLError::ParserDuplicateAttributes)),
        }
        if let Some(local_name) = attribute.local_name.clone() {
            let namespace_name = attribute.uri.clone().unwrap_or_default();
            match self
                .index_by_expanded_name
                .entry(local_name)
                .or_default()
                .entry(namespace_name)
            {
                Vacant(entry) => {
                    entry.insert(index);
                }
                Occupied(_) => {
                    self.index_by_qname.remove(&attribute.qname);
                    return Err((attribute, XMLError::ParserDuplicateAttributes));
                }
            }
        }
        self.attributes.push(attribute);
        Ok(index)
    }
}

impl Index<usize> for Attributes {
    type Output = Attribute;

    fn index(&self, index: usize) -> &Self::Output {
        &self.attributes[index]
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type IntoIter = std::slice::Iter<'a, Attribute>;
    type Item = &'a Attribute;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
