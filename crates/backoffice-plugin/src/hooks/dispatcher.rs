//! Hook dispatcher: fires actions and applies filters.
//!
//! Actions run every registration for its side effects. Filters thread a
//! value through the registrations, each receiving the previous output.
//! In both forms a registration that errors or panics is logged and
//! skipped; for filters the value it received moves on unchanged.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use backoffice_core::error::AppError;

use super::registry::{HookRegistry, Registration};

/// Counts gathered while firing an action hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Hook that was fired.
    pub hook: String,
    /// Registrations that ran to completion.
    pub invoked: usize,
    /// Registrations whose condition was false.
    pub skipped: usize,
    /// Registrations that returned an error or panicked.
    pub failed: usize,
}

impl DispatchReport {
    fn new(hook: &str) -> Self {
        Self {
            hook: hook.to_string(),
            ..Self::default()
        }
    }
}

/// Why a single registration did not produce a value.
enum Failure {
    Error(AppError),
    Panic(String),
}

/// Fires hooks registered in a [`HookRegistry`].
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher reads from.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Whether anything is registered under `hook`.
    pub async fn has(&self, hook: &str) -> bool {
        self.registry.has(hook).await
    }

    /// Invokes every registration under `hook` with `payload`.
    ///
    /// Return values are discarded. Failures are counted in the report
    /// and never stop later registrations.
    pub async fn dispatch_action(&self, hook: &str, payload: Value) -> DispatchReport {
        let registrations = self.registry.snapshot(hook).await;
        let mut report = DispatchReport::new(hook);

        if registrations.is_empty() {
            return report;
        }

        debug!(hook, handlers = registrations.len(), "Dispatching action");

        for registration in &registrations {
            if !condition_holds(hook, registration) {
                report.skipped += 1;
                continue;
            }

            match invoke(registration, payload.clone()).await {
                Ok(_) => report.invoked += 1,
                Err(failure) => {
                    log_failure(hook, registration, &failure);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Passes `value` through every registration under `hook` in order.
    ///
    /// With no registrations the input comes back unchanged.
    pub async fn dispatch_filter(&self, hook: &str, value: Value) -> Value {
        let registrations = self.registry.snapshot(hook).await;

        if registrations.is_empty() {
            return value;
        }

        debug!(hook, handlers = registrations.len(), "Applying filter");

        let mut current = value;
        for registration in &registrations {
            if !condition_holds(hook, registration) {
                continue;
            }

            match invoke(registration, current.clone()).await {
                Ok(next) => current = next,
                Err(failure) => log_failure(hook, registration, &failure),
            }
        }

        current
    }
}

/// Evaluates the registration's condition. A panicking condition is false.
fn condition_holds(hook: &str, registration: &Registration) -> bool {
    let Some(condition) = &registration.condition else {
        return true;
    };

    match std::panic::catch_unwind(AssertUnwindSafe(|| condition())) {
        Ok(holds) => holds,
        Err(panic) => {
            warn!(
                hook,
                callback = %registration.callback.identity(),
                panic = %panic_message(panic.as_ref()),
                "Hook condition panicked, skipping callback"
            );
            false
        }
    }
}

async fn invoke(registration: &Registration, value: Value) -> Result<Value, Failure> {
    let handler = registration.callback.handler().clone();
    match AssertUnwindSafe(handler.handle(value)).catch_unwind().await {
        Ok(Ok(next)) => Ok(next),
        Ok(Err(e)) => Err(Failure::Error(e)),
        Err(panic) => Err(Failure::Panic(panic_message(panic.as_ref()))),
    }
}

fn log_failure(hook: &str, registration: &Registration, failure: &Failure) {
    let callback = registration.callback.identity();
    match failure {
        Failure::Error(e) => {
            warn!(hook, callback = %callback, error = %e, "Hook callback failed");
        }
        Failure::Panic(message) => {
            error!(hook, callback = %callback, panic = %message, "Hook callback panicked");
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
