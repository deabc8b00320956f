//! Names of the hooks fired or consumed by the extension core.
//!
//! Hook names are plain strings so extensions can invent their own; the
//! constants below are the ones the manager and host application agree on.

/// Fired after an extension is installed. Payload: the slug.
pub const EXTENSION_INSTALLED: &str = "extension_installed";

/// Fired after an extension is activated. Payload: the slug.
pub const EXTENSION_ACTIVATED: &str = "extension_activated";

/// Fired after an extension is deactivated. Payload: the slug.
pub const EXTENSION_DEACTIVATED: &str = "extension_deactivated";

/// Fired after an extension is uninstalled. Payload: the slug.
pub const EXTENSION_UNINSTALLED: &str = "extension_uninstalled";

/// Filter applied to the admin navigation before it is rendered.
pub const ADMIN_MENU: &str = "admin_menu";

/// Filter applied to the host's route table at startup.
pub const REGISTER_ROUTES: &str = "register_routes";

/// Lifecycle hooks, in state-machine order.
pub const LIFECYCLE: [&str; 4] = [
    EXTENSION_INSTALLED,
    EXTENSION_ACTIVATED,
    EXTENSION_DEACTIVATED,
    EXTENSION_UNINSTALLED,
];
