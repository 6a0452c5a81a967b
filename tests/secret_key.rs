mod common;

use std::sync::Arc;

use securescaffold::app::App;
use securescaffold::app_config::{
    configure_secret_key, configure_secret_key_with, get_config_from_datastore, singleton_with,
    AppConfigRecord, SINGLETON_ID,
};
use securescaffold::config::StoreConfig;
use securescaffold::error::ScaffoldError;
use securescaffold::store::{ConfigStore, MemoryStore, StoreError};

use common::test_settings;

fn new_app() -> App {
    App::with_settings("test", test_settings()).expect("app should build")
}

#[tokio::test]
async fn test_create_app_creates_secret_key() {
    let store = MemoryStore::new();
    let mut app = new_app();

    configure_secret_key_with(&mut app, &store, || "topsecret".to_string())
        .await
        .expect("secret key should be configured");

    let stored = store
        .get_config(SINGLETON_ID)
        .await
        .unwrap()
        .expect("record should exist");
    assert_eq!(Some(stored.secret_key.as_str()), app.config.secret_key.as_deref());
    assert_eq!(app.config.secret_key.as_deref(), Some("topsecret"));
}

#[tokio::test]
async fn test_create_app_uses_existing_secret_key() {
    let store = MemoryStore::new();
    let existing = AppConfigRecord {
        secret_key: "hunter2".to_string(),
    };
    store.put_config(SINGLETON_ID, &existing).await.unwrap();

    let mut app = new_app();
    configure_secret_key_with(&mut app, &store, || "topsecret".to_string())
        .await
        .unwrap();

    assert_eq!(app.config.secret_key.as_deref(), Some("hunter2"));
    assert_eq!(
        store.get_config(SINGLETON_ID).await.unwrap(),
        Some(existing)
    );
}

#[tokio::test]
async fn test_second_call_reads_same_secret() {
    let store = MemoryStore::new();

    let mut first = new_app();
    let record1 = configure_secret_key_with(&mut first, &store, || "first".to_string())
        .await
        .unwrap();

    let mut second = new_app();
    let record2 = configure_secret_key_with(&mut second, &store, || "second".to_string())
        .await
        .unwrap();

    assert_eq!(record1, record2);
    assert_eq!(first.config.secret_key, second.config.secret_key);
    assert_eq!(second.config.secret_key.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_only_one_record_after_many_calls() {
    let store = MemoryStore::new();

    for i in 0..10 {
        let mut app = new_app();
        configure_secret_key_with(&mut app, &store, move || format!("secret-{}", i))
            .await
            .unwrap();
        assert_eq!(app.config.secret_key.as_deref(), Some("secret-0"));
    }

    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_startups_converge() {
    let store = Arc::new(MemoryStore::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                singleton_with(store.as_ref(), move || format!("secret-{}", i))
                    .await
                    .expect("get or insert should succeed")
            })
        })
        .collect();

    let mut secrets = Vec::new();
    for handle in handles {
        secrets.push(handle.await.expect("task should finish").secret_key);
    }

    assert!(secrets.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_configure_with_disabled_store_generates_secret() {
    let mut app = new_app();
    assert!(!app.config.store.enabled);

    let record = configure_secret_key(&mut app).await.unwrap();

    assert_eq!(record.secret_key.len(), 22);
    assert_eq!(app.config.secret_key, Some(record.secret_key));
}

#[tokio::test]
async fn test_configure_fails_without_store_backend() {
    let mut app = new_app();
    app.config.store = StoreConfig {
        enabled: true,
        backend: None,
    };

    let result = configure_secret_key(&mut app).await;

    assert!(matches!(
        result,
        Err(ScaffoldError::Store(StoreError::NotConfigured))
    ));
    assert!(app.config.secret_key.is_none());
}

#[tokio::test]
async fn test_get_config_from_datastore_reports_missing_backend() {
    let config = StoreConfig {
        enabled: true,
        backend: None,
    };

    let result = get_config_from_datastore(&config).await;

    assert!(matches!(
        result,
        Err(ScaffoldError::Store(StoreError::NotConfigured))
    ));
}

#[tokio::test]
async fn test_get_config_from_datastore_with_disabled_store() {
    let record = get_config_from_datastore(&StoreConfig::default())
        .await
        .expect("a disabled store falls back to memory");

    assert_eq!(record.secret_key.len(), 22);
}
