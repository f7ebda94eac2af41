use std::{borrow::Cow, sync::Arc};

use crate::error::{XMLError, XMLErrorLevel};

/// An error or warning raised during parsing, delivered to the handler's
/// `warning`/`error`/`fatal_error` callbacks.
#[derive(Debug)]
pub struct SAXParseError {
    /// The error code.
    pub error: XMLError,
    pub level: XMLErrorLevel,
    /// 1-based line at the point of detection.
    pub line: usize,
    /// 1-based column at the point of detection.
    pub column: usize,
    /// System identifier of the entity in which the condition was detected.
    pub system_id: Arc<str>,
    pub public_id: Option<Arc<str>>,
    pub message: Cow<'static, str>,
}

impl std::fmt::Display for SAXParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{}[line:{},column:{}]:{}:{}",
            self.system_id, self.line, self.column, self.level, self.message,
        )
    }
}

impl std::error::Error for SAXParseError {}

// The reporting macros capture the current locator state, so they must be
// invoked before the offending input is consumed. `fatal_error!` also records
// the condition on the reader; subsequent document events are not delivered
// and the first recorded code becomes the result of the parse.
macro_rules! generic_error {
    ($method:ident, $reader:expr, $code:expr, $level:expr, $message:literal, $( $args:expr ),+) => {
        $reader.handler.$method($crate::sax::error::SAXParseError {
            error: $code,
            level: $level,
            line: $reader.locator.line(),
            column: $reader.locator.column(),
            system_id: $reader.locator.system_id(),
            public_id: $reader.locator.public_id(),
            message: ::std::borrow::Cow::Owned(format!($message, $( $args ),+)),
        })
    };
    ($method:ident, $reader:expr, $code:expr, $level:expr, $message:literal) => {
        $reader.handler.$method($crate::sax::error::SAXParseError {
            error: $code,
            level: $level,
            line: $reader.locator.line(),
            column: $reader.locator.column(),
            system_id: $reader.locator.system_id(),
            public_id: $reader.locator.public_id(),
            message: ::std::borrow::Cow::Borrowed($message),
        })
    };
}

macro_rules! fatal_error {
    ($reader:expr, $code:ident, $message:literal, $( $args:expr ),+) => {
        $reader.record_fatal_error($crate::error::XMLError::$code);
        $crate::sax::error::generic_error!(fatal_error, $reader, $crate::error::XMLError::$code, $crate::error::XMLErrorLevel::FatalError, $message, $( $args ),+);
    };
    ($reader:expr, $code:ident, $message:literal) => {
        $reader.record_fatal_error($crate::error::XMLError::$code);
        $crate::sax::error::generic_error!(fatal_error, $reader, $crate::error::XMLError::$code, $crate::error::XMLErrorLevel::FatalError, $message);
    };
}

macro_rules! error {
    ($reader:expr, $code:ident, $message:literal, $( $args:expr ),+) => {
        $crate::sax::error::generic_error!(error, $reader, $crate::error::XMLError::$code, $crate::error::XMLErrorLevel::Error, $message, $( $args ),+);
    };
    ($reader:expr, $code:ident, $message:literal) => {
        $crate::sax::error::generic_error!(error, $reader, $crate::error::XMLError::$code, $crate::error::XMLErrorLevel::Error, $message);
    };
}

macro_rules! warning {
    ($reader:expr, $code:ident, $message:literal, $( $args:expr ),+) => {
        $crate::sax::error::generic_error!(warning, $reader, $crate::error::XMLError::$code, $crate::error::XMLErrorLevel::Warning, $message, $( $args ),+);
    };
    ($reader:expr, $code:ident, $message:literal) => {
        $crate::sax::error::generic_error!(warning, $reader, $crate::error::XMLError::$code, $crate::error::XMLErrorLevel::Warning, $message);
    };
}

pub(crate) use {error, fatal_error, generic_error, warning};
