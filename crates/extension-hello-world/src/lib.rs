//! Hello World extension for Backoffice.
//!
//! Adds a menu entry to the admin navigation and a route to the host's
//! route table. Shipped as an example of every lifecycle capability.

pub mod hooks;
pub mod plugin;

pub use plugin::{HelloWorldPlugin, SLUG, factory};

backoffice_plugin::declare_extension!(HelloWorldPlugin, HelloWorldPlugin::new);
