//! Wire-facing types: match rules, routing keys, messages and values.

pub mod match_rule;
pub mod message;
pub mod serial;
pub mod value;

pub use match_rule::{MatchRule, SignalKey};
pub use message::{BusError, MethodCall, SignalMessage};
pub use serial::SerialCounter;
pub use value::Value;
