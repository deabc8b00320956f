//! Filters registered by the Hello World extension.

use serde_json::{Value, json};

use backoffice_core::result::AppResult;

use crate::plugin::SLUG;

/// Appends the extension's entry to the admin menu.
///
/// The menu is a JSON array; any other value is replaced by a one-item
/// array so the entry is never lost.
pub async fn admin_menu(menu: Value) -> AppResult<Value> {
    let entry = json!({
        "slug": SLUG,
        "title": "Hello World",
        "path": format!("/admin/{SLUG}"),
    });
    Ok(append(menu, entry))
}

/// Appends the extension's page to the route table.
pub async fn register_routes(routes: Value) -> AppResult<Value> {
    let route = json!({
        "method": "GET",
        "path": format!("/{SLUG}"),
        "handler": "hello_world::index",
    });
    Ok(append(routes, route))
}

fn append(list: Value, item: Value) -> Value {
    match list {
        Value::Array(mut items) => {
            items.push(item);
            Value::Array(items)
        }
        _ => Value::Array(vec![item]),
    }
}
