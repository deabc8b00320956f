//! Hello World extension instance and its lifecycle capabilities.

use std::sync::Arc;

use tracing::info;

use backoffice_plugin::prelude::*;

use crate::hooks;

/// Slug under which the extension is installed.
pub const SLUG: &str = "hello-world";

/// Priority of the admin menu entry; core entries use the default of 100.
const MENU_PRIORITY: i32 = 50;

/// The Hello World extension.
#[derive(Debug, Default)]
pub struct HelloWorldPlugin;

impl HelloWorldPlugin {
    /// Creates the extension instance.
    pub fn new() -> Self {
        Self
    }
}

/// Factory to register with the loader under [`SLUG`].
pub fn factory() -> ExtensionFactory {
    Arc::new(|| Ok(Arc::new(HelloWorldPlugin::new()) as Arc<dyn Extension>))
}

impl Extension for HelloWorldPlugin {
    fn initializable(&self) -> Option<&dyn Initializable> {
        Some(self)
    }

    fn activatable(&self) -> Option<&dyn Activatable> {
        Some(self)
    }

    fn deactivatable(&self) -> Option<&dyn Deactivatable> {
        Some(self)
    }

    fn installable(&self) -> Option<&dyn Installable> {
        Some(self)
    }

    fn uninstallable(&self) -> Option<&dyn Uninstallable> {
        Some(self)
    }
}

#[async_trait]
impl Initializable for HelloWorldPlugin {
    async fn init(&self, ctx: &ExtensionContext) -> AppResult<()> {
        ctx.add(
            names::ADMIN_MENU,
            ctx.method("admin_menu", FnHandler::arc(hooks::admin_menu))
                .priority(MENU_PRIORITY),
        )
        .await;
        ctx.add(
            names::REGISTER_ROUTES,
            method!(ctx, "register_routes", hooks::register_routes),
        )
        .await;

        info!(slug = ctx.slug(), instance = %ctx.instance(), "Hello World hooks registered");
        Ok(())
    }
}

#[async_trait]
impl Activatable for HelloWorldPlugin {
    async fn activate(&self, ctx: &ExtensionContext) -> AppResult<()> {
        info!(slug = ctx.slug(), "Hello World activated");
        Ok(())
    }
}

#[async_trait]
impl Deactivatable for HelloWorldPlugin {
    async fn deactivate(&self, ctx: &ExtensionContext) -> AppResult<()> {
        info!(slug = ctx.slug(), "Hello World deactivated");
        Ok(())
    }
}

#[async_trait]
impl Installable for HelloWorldPlugin {
    async fn install(&self, ctx: &ExtensionContext) -> AppResult<()> {
        info!(slug = ctx.slug(), "Hello World installed");
        Ok(())
    }
}

#[async_trait]
impl Uninstallable for HelloWorldPlugin {
    async fn uninstall(&self, ctx: &ExtensionContext) -> AppResult<()> {
        info!(slug = ctx.slug(), "Hello World uninstalled");
        Ok(())
    }
}
