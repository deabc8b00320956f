//! Hook system: callbacks, registry, dispatcher, and well-known hook names.

pub mod callback;
pub mod dispatcher;
pub mod names;
pub mod registry;

pub use callback::{Callback, CallbackIdentity, FnHandler, HookHandler, InstanceId};
pub use dispatcher::{DispatchReport, HookDispatcher};
pub use registry::{DEFAULT_PRIORITY, HookRegistry, Registration};
