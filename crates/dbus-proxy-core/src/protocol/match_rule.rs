//! Match rules and signal routing keys.
//!
//! # What is a match rule? (for beginners)
//!
//! The bus daemon does not send a client every signal on the bus.  A client
//! has to ask for them with `AddMatch`, passing a filter expression such as:
//!
//! ```text
//! type='signal',sender=org.example.Service,interface='com.Example',path='/org/example',member='Bar'
//! ```
//!
//! The daemon then forwards every signal matching all listed fields.  The
//! same string must later be passed to `RemoveMatch` to undo it, so the text
//! has to be produced identically every time.  [`MatchRule`] is the only
//! place that formats it.
//!
//! The sender field is written without quotes and the other fields are
//! single-quoted.  That quoting and the field order are kept exactly as the
//! daemon has always received them from this client.
//!
//! # Routing keys
//!
//! Once signals arrive, the connection has to hand each one to the right
//! proxy.  Many proxies share one connection, so handlers are attached under a
//! [`SignalKey`] made of the object path, interface and member.

use std::fmt;

use serde::Serialize;

use crate::domain::descriptor::InterfaceDescriptor;
use crate::protocol::message::SignalMessage;

/// A signal match rule for one (sender, interface, path, member) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchRule {
    pub sender: String,
    pub interface: String,
    pub path: String,
    pub member: String,
}

impl MatchRule {
    /// The rule that selects signal `member` of `descriptor`'s interface on
    /// its object.
    pub fn for_signal(descriptor: &InterfaceDescriptor, member: &str) -> Self {
        Self {
            sender: descriptor.object().bus_name().to_string(),
            interface: descriptor.name().to_string(),
            path: descriptor.object().path().to_string(),
            member: member.to_string(),
        }
    }

    /// The routing key signals selected by this rule arrive under.
    pub fn routing_key(&self) -> SignalKey {
        SignalKey {
            path: self.path.clone(),
            interface: self.interface.clone(),
            member: self.member.clone(),
        }
    }
}

impl fmt::Display for MatchRule {
    /// Formats the canonical rule string sent to `AddMatch` / `RemoveMatch`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dbus_proxy_core::protocol::MatchRule;
    ///
    /// let rule = MatchRule {
    ///     sender: "org.example.Service".into(),
    ///     interface: "com.Example".into(),
    ///     path: "/org/example".into(),
    ///     member: "Bar".into(),
    /// };
    /// assert_eq!(
    ///     rule.to_string(),
    ///     "type='signal',sender=org.example.Service,interface='com.Example',path='/org/example',member='Bar'"
    /// );
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type='signal',sender={},interface='{}',path='{}',member='{}'",
            self.sender, self.interface, self.path, self.member
        )
    }
}

/// The key a forwarding handler is attached under in the connection's signal
/// routing registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SignalKey {
    pub path: String,
    pub interface: String,
    pub member: String,
}

impl SignalKey {
    /// The key an inbound signal message is routed by.
    pub fn of_message(msg: &SignalMessage) -> Self {
        Self {
            path: msg.path.clone(),
            interface: msg.interface.clone(),
            member: msg.member.clone(),
        }
    }
}

impl fmt::Display for SignalKey {
    /// Renders the key as a compact JSON object, e.g.
    /// `{"path":"/a","interface":"com.Example","member":"Bar"}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
