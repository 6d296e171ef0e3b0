//! Type-signature strings.
//!
//! A signature is a compact string that encodes the ordered argument types of
//! a method or signal, one type code per basic type: `s` is a string, `i` a
//! 32-bit integer, `a{sv}` a dictionary of string to variant, and so on.
//!
//! Only the character set is checked here.  Container nesting (balanced
//! `(...)` and `{...}`, dict-entry placement) is not validated; signatures
//! from introspection are accepted as the peer declares them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every character that may appear in a signature.
const TYPE_CODES: &str = "ybnqiuxtdsogvhaem(){}";

/// An accepted signature string.
///
/// # Examples
///
/// ```rust
/// use dbus_proxy_core::domain::signature::Signature;
///
/// let mut sig = Signature::empty();
/// sig.push("s");
/// sig.push("a{sv}");
/// assert_eq!(sig.as_str(), "sa{sv}");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// The empty signature (no arguments).
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Parses `s`, returning `None` if it contains a character that is not a
    /// type code.
    pub fn parse(s: &str) -> Option<Self> {
        if is_acceptable(s) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// Appends the type of one more argument.
    ///
    /// No checking is performed; the builder concatenates whatever the
    /// introspection data declares.
    pub fn push(&mut self, arg_type: &str) {
        self.0.push_str(arg_type);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Signature {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Signature {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Returns `true` if every character of `s` is a known type code.
pub fn is_acceptable(s: &str) -> bool {
    s.chars().all(|c| TYPE_CODES.contains(c))
}
