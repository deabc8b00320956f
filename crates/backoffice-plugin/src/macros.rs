//! Convenience macros for extension crates.

/// Exports a `create_extension` constructor so the loader can open the
/// crate as a shared library (requires the `dynamic` feature on the host).
///
/// # Example
/// ```rust,ignore
/// declare_extension!(HelloWorldPlugin, HelloWorldPlugin::new);
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($ty:ty, $ctor:path) => {
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn create_extension()
        -> *mut ::std::boxed::Box<dyn $crate::extension::Extension> {
            let instance: $ty = $ctor();
            let boxed: ::std::boxed::Box<dyn $crate::extension::Extension> =
                ::std::boxed::Box::new(instance);
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(boxed))
        }
    };
}

/// Builds a [`Registration`](crate::hooks::Registration) bound to the
/// context's instance from an async closure.
///
/// # Example
/// ```rust,ignore
/// ctx.add(names::ADMIN_MENU, method!(ctx, "admin_menu", |menu| async move {
///     Ok(menu)
/// }).priority(20)).await;
/// ```
#[macro_export]
macro_rules! method {
    ($ctx:expr, $name:expr, $handler:expr) => {
        $ctx.method($name, $crate::hooks::FnHandler::arc($handler))
    };
}
