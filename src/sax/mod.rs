pub mod attributes;
pub mod error;
pub mod handler;
pub mod parser;
pub mod source;

use std::{
    collections::HashMap,
    sync::{
        Arc, LazyLock, RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::error::XMLError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AttributeType {
    #[default]
    CDATA,
    ID,
    IDREF,
    IDREFS,
    ENTITY,
    ENTITIES,
    NMTOKEN,
    NMTOKENS,
    NOTATION(Vec<Box<str>>),
    Enumeration(Vec<Box<str>>),
}

impl AttributeType {
    /// Check if attribute values of this type receive only the CDATA
    /// normalization (whitespace substitution without collapsing).
    pub fn is_cdata(&self) -> bool {
        matches!(self, AttributeType::CDATA)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefaultDecl {
    REQUIRED,
    IMPLIED,
    FIXED(Box<str>),
    None(Box<str>),
}

impl DefaultDecl {
    pub fn default_value(&self) -> Option<&str> {
        match self {
            DefaultDecl::FIXED(value) | DefaultDecl::None(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttlistDecl {
    pub attr_name: Box<str>,
    pub att_type: AttributeType,
    pub default_decl: DefaultDecl,
    /// Whether the declaration occurred in the external subset or in a
    /// parameter entity.
    pub in_external_markup: bool,
}

/// Attribute definitions collected from `<!ATTLIST>` declarations, keyed by
/// element name.
///
/// Declarations for one element keep their declaration order so that default
/// attributes are injected deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttlistDeclMap(HashMap<Box<str>, Vec<AttlistDecl>>);

impl AttlistDeclMap {
    /// Returns `true` if newly inserted, and `false` if an attribute with
    /// the same name is already registered for the element.
    pub fn insert(
        &mut self,
        elem_name: &str,
        attr_name: &str,
        att_type: AttributeType,
        default_decl: DefaultDecl,
        in_external_markup: bool,
    ) -> bool {
        let decls = match self.0.get_mut(elem_name) {
            Some(decls) => {
                if decls.iter().any(|decl| decl.attr_name.as_ref() == attr_name) {
                    return false;
                }
                decls
            }
            None => self.0.entry(elem_name.into()).or_default(),
        };
        decls.push(AttlistDecl {
            attr_name: attr_name.into(),
            att_type,
            default_decl,
            in_external_markup,
        });
        true
    }

    pub fn get(&self, elem_name: &str, attr_name: &str) -> Option<&AttlistDecl> {
        self.0
            .get(elem_name)?
            .iter()
            .find(|decl| decl.attr_name.as_ref() == attr_name)
    }

    pub fn contains(&self, elem_name: &str, attr_name: &str) -> bool {
        self.get(elem_name, attr_name).is_some()
    }

    /// All declarations for `elem_name` in declaration order.
    pub fn attlist(&self, elem_name: &str) -> impl Iterator<Item = &AttlistDecl> {
        self.0.get(elem_name).into_iter().flatten()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityDecl {
    InternalGeneralEntity {
        replacement_text: Box<str>,
        in_external_markup: bool,
    },
    InternalParameterEntity {
        replacement_text: Box<str>,
    },
    ExternalGeneralParsedEntity {
        base_uri: Arc<str>,
        system_id: Box<str>,
        public_id: Option<Box<str>>,
        in_external_markup: bool,
    },
    ExternalGeneralUnparsedEntity {
        base_uri: Arc<str>,
        system_id: Box<str>,
        public_id: Option<Box<str>>,
        notation_name: Box<str>,
    },
    ExternalParameterEntity {
        base_uri: Arc<str>,
        system_id: Box<str>,
        public_id: Option<Box<str>>,
    },
}

// The predefined entities hold the double-escaped replacement text required
// by XML 1.0 section 4.6 so that re-expansion yields the literal character.
static PREDEFINED_ENTITIES: LazyLock<HashMap<&'static str, EntityDecl>> = LazyLock::new(|| {
    [
        ("lt", "&#60;"),
        ("gt", "&#62;"),
        ("amp", "&#38;"),
        ("apos", "&#39;"),
        ("quot", "&#34;"),
    ]
    .into_iter()
    .map(|(name, replacement)| {
        (
            name,
            EntityDecl::InternalGeneralEntity {
                replacement_text: replacement.into(),
                in_external_markup: false,
            },
        )
    })
    .collect()
});

/// General and parameter entity declarations.
///
/// Parameter entities are stored under their name prefixed with `%`, which
/// cannot collide with general entity names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityMap(HashMap<Box<str>, EntityDecl>);

impl EntityMap {
    pub fn insert(&mut self, name: impl Into<Box<str>>, decl: EntityDecl) -> Result<(), XMLError> {
        use std::collections::hash_map::Entry::*;
        let name: Box<str> = name.into();
        match self.0.entry(name) {
            Occupied(_) => Err(XMLError::ParserDuplicateEntityDecl),
            Vacant(entry) => {
                entry.insert(decl);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&EntityDecl> {
        self.0
            .get(name)
            .or_else(|| PREDEFINED_ENTITIES.get(name))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Notation {
    pub name: Box<str>,
    pub system_id: Option<Box<str>>,
    pub public_id: Option<Box<str>>,
}

/// Current position of the parser within the document entity or one of its
/// nested entities.
///
/// The locator is shared with the handler through
/// [`set_document_locator`](crate::sax::handler::SAXHandler::set_document_locator)
/// and remains valid while the parse is in progress.
pub struct Locator {
    system_id: RwLock<Arc<str>>,
    public_id: RwLock<Option<Arc<str>>>,
    line: AtomicUsize,
    column: AtomicUsize,
}

impl Locator {
    pub(crate) fn new(
        system_id: Arc<str>,
        public_id: Option<Arc<str>>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            system_id: RwLock::new(system_id),
            public_id: RwLock::new(public_id),
            line: line.into(),
            column: column.into(),
        }
    }

    pub fn system_id(&self) -> Arc<str> {
        self.system_id.read().unwrap().clone()
    }

    pub fn public_id(&self) -> Option<Arc<str>> {
        self.public_id.read().unwrap().clone()
    }

    pub fn line(&self) -> usize {
        self.line.load(Ordering::Acquire)
    }

    pub fn column(&self) -> usize {
        self.column.load(Ordering::Acquire)
    }

    pub(crate) fn set_system_id(&self, system_id: Arc<str>) {
        *self.system_id.write().unwrap() = system_id;
    }

    pub(crate) fn set_public_id(&self, public_id: Option<Arc<str>>) {
        *self.public_id.write().unwrap() = public_id;
    }

    pub(crate) fn set_line(&self, line: usize) {
        self.line.store(line, Ordering::Release);
    }

    pub(crate) fn set_column(&self, column: usize) {
        self.column.store(column, Ordering::Release);
    }

    /// Advance to the start of the next line.
    pub(crate) fn new_line(&self) {
        self.line.fetch_add(1, Ordering::AcqRel);
        self.set_column(1);
    }

    pub(crate) fn update_column(&self, f: impl Fn(usize) -> usize) {
        while self
            .column
            .fetch_update(Ordering::Release, Ordering::Acquire, |column| {
                Some(f(column))
            })
            .is_err()
        {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attlist_first_declaration_wins() {
        let mut map = AttlistDeclMap::default();
        assert!(map.insert(
            "doc",
            "id",
            AttributeType::CDATA,
            DefaultDecl::None("first".into()),
            false,
        ));
        assert!(!map.insert(
            "doc",
            "id",
            AttributeType::NMTOKEN,
            DefaultDecl::None("second".into()),
            false,
        ));

        let decl = map.get("doc", "id").unwrap();
        assert_eq!(decl.att_type, AttributeType::CDATA);
        assert_eq!(decl.default_decl.default_value(), Some("first"));
    }

    #[test]
    fn predefined_entities_are_always_visible() {
        let map = EntityMap::default();
        for (name, text) in [
            ("lt", "&#60;"),
            ("gt", "&#62;"),
            ("amp", "&#38;"),
            ("apos", "&#39;"),
            ("quot", "&#34;"),
        ] {
            let Some(EntityDecl::InternalGeneralEntity {
                replacement_text, ..
            }) = map.get(name)
            else {
                panic!("predefined entity '{name}' not found");
            };
            assert_eq!(replacement_text.as_ref(), text);
        }
        assert!(map.get("unknown").is_none());
    }
}
