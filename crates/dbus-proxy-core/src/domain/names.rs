//! Validation of bus names, interface names, member names and object paths.
//!
//! # Why validate names at all? (for beginners)
//!
//! Introspection data comes from a remote peer, so it cannot be trusted to be
//! well formed.  Every name that ends up inside a match rule or a routing key
//! is checked against the bus naming rules first.  A name that fails the check
//! is never exposed on the proxy:
//!
//! ```text
//! com.example.Player      valid interface name
//! 1bad.name               invalid: element starts with a digit
//! Play                    valid member name
//! Play.Now                invalid member name: contains '.'
//! /org/example/Player     valid object path
//! /org//Player            invalid object path: empty element
//! ```

use thiserror::Error;

/// Maximum length in bytes of any bus, interface or member name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Errors returned by the fallible name constructors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("invalid interface name: {0:?}")]
    InvalidInterfaceName(String),

    #[error("invalid member name: {0:?}")]
    InvalidMemberName(String),

    #[error("invalid bus name: {0:?}")]
    InvalidBusName(String),

    #[error("invalid object path: {0:?}")]
    InvalidObjectPath(String),
}

fn is_element_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_element_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Returns `true` if `element` is a non-empty identifier that does not start
/// with a digit.
fn is_identifier(element: &str) -> bool {
    let mut chars = element.chars();
    match chars.next() {
        Some(first) if is_element_start(first) => chars.all(is_element_char),
        _ => false,
    }
}

/// Returns `true` if `name` is a valid interface name.
///
/// Interface names have at least two dot-separated elements, each of which is
/// an identifier (`[A-Za-z_][A-Za-z0-9_]*`), and are at most 255 bytes long.
///
/// # Examples
///
/// ```rust
/// use dbus_proxy_core::domain::names::is_valid_interface_name;
///
/// assert!(is_valid_interface_name("com.Example"));
/// assert!(!is_valid_interface_name("1bad.name"));
/// assert!(!is_valid_interface_name("Example"));
/// ```
pub fn is_valid_interface_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return false;
    }
    let elements: Vec<&str> = name.split('.').collect();
    elements.len() >= 2 && elements.iter().all(|e| is_identifier(e))
}

/// Returns `true` if `name` is a valid method, signal or property name.
///
/// Member names are a single identifier of 1 to 255 bytes.
pub fn is_valid_member_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && is_identifier(name)
}

/// Returns `true` if `name` is a valid unique (`:1.42`) or well-known
/// (`org.example.Service`) bus name.
///
/// Unique-name elements may start with a digit; well-known name elements may
/// not.  Both forms allow `-` inside elements.
pub fn is_valid_bus_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return false;
    }

    let (unique, body) = match name.strip_prefix(':') {
        Some(rest) => (true, rest),
        None => (false, name),
    };

    let elements: Vec<&str> = body.split('.').collect();
    if elements.len() < 2 {
        return false;
    }

    elements.iter().all(|element| {
        let mut chars = element.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        let first_ok = if unique {
            is_element_char(first) || first == '-'
        } else {
            is_element_start(first) || first == '-'
        };
        first_ok && chars.all(|c| is_element_char(c) || c == '-')
    })
}

/// Returns `true` if `path` is a valid object path.
///
/// Object paths start with `/`, consist of `/`-separated elements of
/// `[A-Za-z0-9_]`, contain no empty elements, and only the root path `/` may
/// end with a slash.
pub fn is_valid_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/')
        .all(|element| !element.is_empty() && element.chars().all(is_element_char))
}

/// Checks `name` against the interface-name rules.
///
/// # Errors
///
/// Returns [`NameError::InvalidInterfaceName`] carrying the rejected name.
pub fn validate_interface_name(name: &str) -> Result<(), NameError> {
    if is_valid_interface_name(name) {
        Ok(())
    } else {
        Err(NameError::InvalidInterfaceName(name.to_string()))
    }
}

/// Checks `name` against the member-name rules.
///
/// # Errors
///
/// Returns [`NameError::InvalidMemberName`] carrying the rejected name.
pub fn validate_member_name(name: &str) -> Result<(), NameError> {
    if is_valid_member_name(name) {
        Ok(())
    } else {
        Err(NameError::InvalidMemberName(name.to_string()))
    }
}

// ── Object reference ──────────────────────────────────────────────────────────

/// The remote object an interface belongs to: the bus name of the peer that
/// exports it plus the object path on that peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    bus_name: String,
    path: String,
}

impl ObjectRef {
    /// Creates an object reference after validating both parts.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidBusName`] or [`NameError::InvalidObjectPath`].
    pub fn new(bus_name: impl Into<String>, path: impl Into<String>) -> Result<Self, NameError> {
        let bus_name = bus_name.into();
        let path = path.into();
        if !is_valid_bus_name(&bus_name) {
            return Err(NameError::InvalidBusName(bus_name));
        }
        if !is_valid_object_path(&path) {
            return Err(NameError::InvalidObjectPath(path));
        }
        Ok(Self { bus_name, path })
    }

    /// The bus name the object is reached through.
    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    /// The object path on the remote peer.
    pub fn path(&self) -> &str {
        &self.path
    }
}
