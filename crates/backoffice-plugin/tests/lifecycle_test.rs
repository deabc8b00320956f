//! Integration tests for the extension lifecycle state machine.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use backoffice_core::error::ErrorKind;
use backoffice_plugin::hooks::names;

use helpers::{TestHarness, hello_world_manifest};

#[tokio::test]
async fn test_hello_world_scenario() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());

    let record = h.manager.install("hello-world").await.unwrap();
    assert!(!record.is_active);
    assert_eq!(record.name, "Hello World");
    assert_eq!(record.version, "1.0.0");

    h.manager.activate("hello-world").await.unwrap();
    assert!(h.manager.is_active("hello-world").await.unwrap());
    assert!(
        h.lifecycle()
            .contains(&format!("{}:hello-world", names::EXTENSION_ACTIVATED))
    );

    let err = h.manager.uninstall("hello-world").await.unwrap_err();
    assert!(err.is(ErrorKind::Conflict));
    let still_there = h.manager.record("hello-world").await.unwrap().unwrap();
    assert!(still_there.is_active);

    h.manager.deactivate("hello-world").await.unwrap();
    h.manager.uninstall("hello-world").await.unwrap();

    assert!(h.manager.record("hello-world").await.unwrap().is_none());
    assert_eq!(h.store.record_count(), 0);
    h.manager.discover().await.unwrap();
    let all = h.manager.get_all().await.unwrap();
    assert!(all.iter().all(|d| d.slug != "hello-world"));
    assert!(!h.manager.is_active("hello-world").await.unwrap());

    assert_eq!(
        h.lifecycle(),
        vec![
            format!("{}:hello-world", names::EXTENSION_INSTALLED),
            format!("{}:hello-world", names::EXTENSION_ACTIVATED),
            format!("{}:hello-world", names::EXTENSION_DEACTIVATED),
            format!("{}:hello-world", names::EXTENSION_UNINSTALLED),
        ]
    );
}

#[tokio::test]
async fn test_capabilities_run_in_lifecycle_order() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());

    h.manager.install("hello-world").await.unwrap();
    h.manager.activate("hello-world").await.unwrap();
    h.manager.deactivate("hello-world").await.unwrap();
    h.manager.uninstall("hello-world").await.unwrap();

    assert_eq!(
        h.events(),
        vec![
            "hello-world:install",
            "hello-world:activate",
            "hello-world:init",
            "hello-world:deactivate",
            "hello-world:uninstall",
        ]
    );
}

#[tokio::test]
async fn test_install_twice_is_idempotent() {
    let h = TestHarness::new().await;
    h.add_extension(
        "hello-world",
        json!({
            "slug": "hello-world",
            "name": "Hello World",
            "settings": { "greeting": "hi" }
        }),
    );
    h.add_script("hello-world", "001_schema.sql", "CREATE TABLE greetings ()");

    h.manager.install("hello-world").await.unwrap();
    h.manager
        .set_setting("hello-world", "greeting", &json!("custom"))
        .await
        .unwrap();
    let second = h.manager.install("hello-world").await.unwrap();

    assert!(!second.is_active);
    assert_eq!(h.store.record_count(), 1);
    assert_eq!(h.store.scripts().len(), 1);
    assert_eq!(
        h.manager.setting("hello-world", "greeting").await.unwrap(),
        Some(json!("custom"))
    );
    let installs = h
        .events()
        .iter()
        .filter(|e| e.as_str() == "hello-world:install")
        .count();
    assert_eq!(installs, 1);
}

#[tokio::test]
async fn test_reinstall_refreshes_metadata_and_keeps_activation() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();
    h.manager.activate("hello-world").await.unwrap();

    h.add_extension(
        "hello-world",
        json!({ "slug": "hello-world", "name": "Hello World", "version": "1.1.0" }),
    );
    let record = h.manager.install("hello-world").await.unwrap();

    assert_eq!(record.version, "1.1.0");
    assert!(record.is_active);
}

#[tokio::test]
async fn test_setup_scripts_run_in_name_order() {
    let h = TestHarness::new().await;
    h.add_extension("blog", json!({ "name": "Blog" }));
    h.add_script("blog", "002_seed.sql", "INSERT");
    h.add_script("blog", "001_schema.sql", "CREATE");

    h.manager.install("blog").await.unwrap();

    let sql: Vec<String> = h.store.scripts().into_iter().map(|(_, sql)| sql).collect();
    assert_eq!(sql, vec!["CREATE", "INSERT"]);
}

#[tokio::test]
async fn test_install_without_manifest_fails_cleanly() {
    let h = TestHarness::new().await;

    let err = h.manager.install("ghost").await.unwrap_err();

    assert!(err.is(ErrorKind::NotFound));
    assert_eq!(h.store.record_count(), 0);
    assert!(h.lifecycle().is_empty());
}

#[tokio::test]
async fn test_failed_setup_script_leaves_no_record() {
    let h = TestHarness::new().await;
    h.add_extension("blog", json!({ "name": "Blog" }));
    h.add_script("blog", "001_schema.sql", "CREATE");
    assert!(h.manager.record("blog").await.unwrap().is_none());

    h.store.fail_once("run_setup_script");
    let err = h.manager.install("blog").await.unwrap_err();

    assert!(err.is(ErrorKind::Database));
    assert_eq!(h.store.record_count(), 0);
    assert!(h.lifecycle().is_empty());
    assert!(h.events().is_empty());

    let record = h.manager.install("blog").await.unwrap();
    assert_eq!(record.slug, "blog");
    assert_eq!(h.store.scripts(), vec![("blog".to_string(), "CREATE".to_string())]);
    assert!(h.manager.record("blog").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_seed_rolls_back_first_install() {
    let h = TestHarness::new().await;
    h.add_extension(
        "hello-world",
        json!({ "slug": "hello-world", "settings": { "greeting": "hi" } }),
    );
    h.add_script("hello-world", "001_schema.sql", "CREATE TABLE greetings ()");

    h.store.fail_once("seed_setting");
    let err = h.manager.install("hello-world").await.unwrap_err();

    assert!(err.is(ErrorKind::Database));
    assert_eq!(h.store.record_count(), 0);
    assert!(h.manager.settings("hello-world").await.unwrap().is_empty());
    assert!(h.lifecycle().is_empty());
    assert!(h.events().is_empty());

    h.manager.install("hello-world").await.unwrap();
    assert_eq!(h.store.scripts().len(), 2);
    assert_eq!(
        h.manager.setting("hello-world", "greeting").await.unwrap(),
        Some(json!("hi"))
    );
    assert_eq!(h.events(), vec!["hello-world:install"]);
}

#[tokio::test]
async fn test_failed_reinstall_still_invalidates_record_cache() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();
    let cached = h.manager.record("hello-world").await.unwrap().unwrap();
    assert_eq!(cached.version, "1.0.0");

    h.add_extension(
        "hello-world",
        json!({ "slug": "hello-world", "version": "1.1.0", "settings": { "greeting": "hi" } }),
    );
    h.store.fail_once("seed_setting");
    assert!(h.manager.install("hello-world").await.is_err());

    // A re-install keeps the refreshed record even when seeding fails.
    let record = h.manager.record("hello-world").await.unwrap().unwrap();
    assert_eq!(record.version, "1.1.0");
    assert_eq!(h.store.record_count(), 1);
}

#[tokio::test]
async fn test_activate_requires_install() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());

    let err = h.manager.activate("hello-world").await.unwrap_err();

    assert!(err.is(ErrorKind::NotFound));
    assert!(!h.manager.is_active("hello-world").await.unwrap());
}

#[tokio::test]
async fn test_failed_activation_write_fires_nothing() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();

    h.store.fail_writes(true);
    let err = h.manager.activate("hello-world").await.unwrap_err();
    h.store.fail_writes(false);

    assert!(err.is(ErrorKind::Database));
    assert!(!h.manager.is_active("hello-world").await.unwrap());
    assert!(
        !h.lifecycle()
            .contains(&format!("{}:hello-world", names::EXTENSION_ACTIVATED))
    );
    assert!(h.events().iter().all(|e| e != "hello-world:activate"));
}

#[tokio::test]
async fn test_uninstall_guard_leaves_settings() {
    let h = TestHarness::new().await;
    h.add_extension(
        "hello-world",
        json!({ "slug": "hello-world", "settings": { "greeting": "hi" } }),
    );
    h.manager.install("hello-world").await.unwrap();
    h.manager.activate("hello-world").await.unwrap();

    assert!(h.manager.uninstall("hello-world").await.is_err());

    assert_eq!(h.manager.settings("hello-world").await.unwrap().len(), 1);
    assert!(h.root().join("hello-world").exists());
    assert!(h.manager.get("hello-world").await.is_some());
}

#[tokio::test]
async fn test_uninstall_removes_settings_files_and_instance() {
    let h = TestHarness::new().await;
    h.add_extension(
        "hello-world",
        json!({ "slug": "hello-world", "settings": { "greeting": "hi" } }),
    );
    h.manager.install("hello-world").await.unwrap();

    h.manager.uninstall("hello-world").await.unwrap();

    assert!(h.manager.settings("hello-world").await.unwrap().is_empty());
    assert!(!h.root().join("hello-world").exists());
    assert!(h.manager.get("hello-world").await.is_none());
}

#[tokio::test]
async fn test_failed_delete_keeps_extension_installed() {
    let h = TestHarness::new().await;
    h.add_extension(
        "hello-world",
        json!({ "slug": "hello-world", "settings": { "greeting": "hi" } }),
    );
    h.manager.install("hello-world").await.unwrap();

    h.store.fail_once("delete_inactive");
    let err = h.manager.uninstall("hello-world").await.unwrap_err();

    assert!(err.is(ErrorKind::Database));
    assert_eq!(h.store.record_count(), 1);
    assert_eq!(h.manager.settings("hello-world").await.unwrap().len(), 1);
    assert!(h.root().join("hello-world").exists());
    assert!(
        !h.lifecycle()
            .contains(&format!("{}:hello-world", names::EXTENSION_UNINSTALLED))
    );

    h.manager.uninstall("hello-world").await.unwrap();
    assert!(!h.root().join("hello-world").exists());
}

#[tokio::test]
async fn test_deactivate_removes_every_hook_of_the_instance() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.add_extension("blog", json!({ "name": "Blog" }));
    for slug in ["hello-world", "blog"] {
        h.manager.install(slug).await.unwrap();
        h.manager.activate(slug).await.unwrap();
    }
    assert_eq!(h.admin_menu().await, json!(["hello-world", "blog"]));

    h.manager.deactivate("hello-world").await.unwrap();

    assert_eq!(h.admin_menu().await, json!(["blog"]));
    let routes = h
        .manager
        .dispatcher()
        .dispatch_filter(names::REGISTER_ROUTES, json!([]))
        .await;
    assert_eq!(routes, json!(["blog"]));
}

#[tokio::test]
async fn test_extension_without_code_can_still_be_removed() {
    let h = TestHarness::new().await;
    h.add_manifest("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();
    h.manager.activate("hello-world").await.unwrap();

    h.manager.deactivate("hello-world").await.unwrap();
    assert!(!h.manager.is_active("hello-world").await.unwrap());
    assert!(
        h.lifecycle()
            .contains(&format!("{}:hello-world", names::EXTENSION_DEACTIVATED))
    );

    h.manager.uninstall("hello-world").await.unwrap();
    assert_eq!(h.store.record_count(), 0);
    assert!(!h.root().join("hello-world").exists());
}

#[tokio::test]
async fn test_activation_without_code_stays_active() {
    let h = TestHarness::new().await;
    h.add_manifest("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();

    h.manager.activate("hello-world").await.unwrap();

    assert!(h.manager.is_active("hello-world").await.unwrap());
    assert!(h.manager.get("hello-world").await.is_none());
    assert!(h.manager.get_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_init_runs_once_until_reset() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();
    h.manager.activate("hello-world").await.unwrap();

    assert_eq!(h.manager.boot().await.unwrap(), 1);
    h.manager.boot().await.unwrap();
    assert_eq!(h.admin_menu().await, json!(["hello-world"]));

    h.manager.reset().await;
    assert!(!h.manager.dispatcher().has(names::ADMIN_MENU).await);
    h.manager.boot().await.unwrap();

    let inits = h
        .events()
        .iter()
        .filter(|e| e.as_str() == "hello-world:init")
        .count();
    assert_eq!(inits, 2);
    assert_eq!(h.admin_menu().await, json!(["hello-world"]));
}

#[tokio::test]
async fn test_failed_init_leaves_no_hooks() {
    let h = TestHarness::new().await;
    h.add_extension("broken-init", json!({ "name": "Broken" }));
    h.manager.install("broken-init").await.unwrap();

    h.manager.activate("broken-init").await.unwrap();

    assert!(h.manager.is_active("broken-init").await.unwrap());
    assert!(!h.manager.dispatcher().has(names::ADMIN_MENU).await);
}

#[tokio::test]
async fn test_panicking_capabilities_are_contained() {
    let h = TestHarness::new().await;
    h.add_extension("panicky", json!({ "name": "Panicky" }));
    h.manager.install("panicky").await.unwrap();

    h.manager.activate("panicky").await.unwrap();

    assert!(h.manager.is_active("panicky").await.unwrap());
    assert!(
        h.lifecycle()
            .contains(&format!("{}:panicky", names::EXTENSION_ACTIVATED))
    );
    assert_eq!(
        h.events(),
        vec!["panicky:install", "panicky:activate", "panicky:init"]
    );
    assert!(!h.manager.dispatcher().has(names::ADMIN_MENU).await);

    h.manager.deactivate("panicky").await.unwrap();
    h.manager.uninstall("panicky").await.unwrap();
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn test_get_active_maps_slug_to_instance() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.add_extension("blog", json!({ "name": "Blog" }));
    h.manager.install("hello-world").await.unwrap();
    h.manager.install("blog").await.unwrap();
    h.manager.activate("blog").await.unwrap();

    let active = h.manager.get_active().await.unwrap();

    assert_eq!(active.keys().collect::<Vec<_>>(), vec!["blog"]);
    let loaded = &active["blog"];
    assert_eq!(loaded.slug, "blog");
    assert_eq!(h.manager.get("blog").await.unwrap().id, loaded.id);
}

#[tokio::test]
async fn test_active_slugs_cache_is_invalidated() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();

    assert!(!h.manager.is_active("hello-world").await.unwrap());
    h.manager.activate("hello-world").await.unwrap();
    assert!(h.manager.is_active("hello-world").await.unwrap());
    h.manager.deactivate("hello-world").await.unwrap();
    assert!(!h.manager.is_active("hello-world").await.unwrap());
}

#[tokio::test]
async fn test_derived_values_recomputed_after_mutation() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let build = || {
        let calls = Arc::clone(&calls);
        let manager = &h.manager;
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            manager.active_slugs().await
        }
    };

    let first: Vec<String> = h.manager.remember_derived("menu", build).await.unwrap();
    let cached: Vec<String> = h.manager.remember_derived("menu", build).await.unwrap();
    assert!(first.is_empty());
    assert_eq!(cached, first);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    h.manager.activate("hello-world").await.unwrap();

    let fresh: Vec<String> = h.manager.remember_derived("menu", build).await.unwrap();
    assert_eq!(fresh, vec!["hello-world"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_setting_writes_require_install() {
    let h = TestHarness::new().await;

    let err = h
        .manager
        .set_setting("ghost", "k", &json!(1))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));

    h.add_extension("hello-world", hello_world_manifest());
    h.manager.install("hello-world").await.unwrap();
    h.manager
        .set_setting("hello-world", "k", &json!(1))
        .await
        .unwrap();
    assert!(h.manager.delete_setting("hello-world", "k").await.unwrap());
    assert!(!h.manager.delete_setting("hello-world", "k").await.unwrap());
}

#[tokio::test]
async fn test_discover_lists_manifests_in_directory_order() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    h.add_extension("blog", json!({ "name": "Blog" }));
    std::fs::create_dir_all(h.root().join("broken")).unwrap();
    std::fs::write(h.root().join("broken").join("manifest.json"), "{").unwrap();

    let found = h.manager.discover().await.unwrap();

    let slugs: Vec<&str> = found.iter().map(|d| d.slug.as_str()).collect();
    assert_eq!(slugs, vec!["blog", "hello-world"]);
}

#[tokio::test]
async fn test_rescan_picks_up_new_manifests() {
    let h = TestHarness::new().await;
    h.add_extension("hello-world", hello_world_manifest());
    assert_eq!(h.manager.discover().await.unwrap().len(), 1);

    h.add_extension("blog", json!({ "name": "Blog" }));
    assert_eq!(h.manager.discover().await.unwrap().len(), 1);

    let found = h.manager.rescan().await.unwrap();
    let slugs: Vec<&str> = found.iter().map(|d| d.slug.as_str()).collect();
    assert_eq!(slugs, vec!["blog", "hello-world"]);
}

#[tokio::test]
async fn test_manifest_slug_must_match_its_directory() {
    let h = TestHarness::new().await;
    h.add_extension("blog-copy", json!({ "slug": "blog", "name": "Copy" }));

    let err = h.manager.install("blog").await.unwrap_err();

    assert!(err.is(ErrorKind::NotFound));
    assert!(h.manager.discover().await.unwrap().is_empty());
    assert_eq!(h.store.record_count(), 0);
}
