//! Generated method entry points.
//!
//! Methods are only known at run time, from introspection, so instead of
//! one Rust method per remote method the proxy keeps a table from method name
//! to [`MethodStub`].  Each stub captures the interface name, the method name
//! and both signatures, and forwards calls to the bus unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use dbus_proxy_core::protocol::{BusError, MethodCall, Value};
use dbus_proxy_core::{InterfaceDescriptor, MethodDescriptor};
use thiserror::Error;
use tracing::debug;

use crate::infrastructure::bus::Bus;

/// Failure of a proxied method call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The interface does not declare a method with this name.
    #[error("no method {0:?} on this interface")]
    UnknownMethod(String),

    /// The remote peer replied with an error.
    #[error("remote error {name}: {message}")]
    Remote { name: String, message: String },

    /// The call never got a reply.
    #[error("transport failure: {0}")]
    Transport(BusError),
}

impl From<BusError> for CallError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Remote { name, message } => CallError::Remote { name, message },
            other => CallError::Transport(other),
        }
    }
}

/// A callable bound to one remote method.
pub struct MethodStub {
    bus: Arc<dyn Bus>,
    destination: String,
    path: String,
    interface: String,
    descriptor: MethodDescriptor,
}

impl MethodStub {
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Calls the remote method with `args` and returns its out values.
    ///
    /// # Errors
    ///
    /// [`CallError::Remote`] carries the remote error name and message;
    /// [`CallError::Transport`] anything else the bus reports.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Vec<Value>, CallError> {
        let call = MethodCall {
            destination: self.destination.clone(),
            path: self.path.clone(),
            interface: self.interface.clone(),
            member: self.descriptor.name.clone(),
            in_signature: self.descriptor.in_signature.clone(),
            out_signature: self.descriptor.out_signature.clone(),
            args,
        };
        debug!(interface = %call.interface, member = %call.member, "invoking remote method");
        Ok(self.bus.invoke(call).await?)
    }
}

/// Builds one stub per method of `descriptor`.
pub fn build_method_table(
    bus: &Arc<dyn Bus>,
    descriptor: &InterfaceDescriptor,
) -> HashMap<String, MethodStub> {
    descriptor
        .methods()
        .iter()
        .map(|method| {
            let stub = MethodStub {
                bus: Arc::clone(bus),
                destination: descriptor.object().bus_name().to_string(),
                path: descriptor.object().path().to_string(),
                interface: descriptor.name().to_string(),
                descriptor: method.clone(),
            };
            (method.name.clone(), stub)
        })
        .collect()
}
