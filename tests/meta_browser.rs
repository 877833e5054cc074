mod common;

use pretty_assertions::assert_eq;

use common::{column, MockTransport};
use dashquery::meta::{find_node, NodeKind};
use dashquery::{DashQueryError, MetaBrowser};

fn transport() -> MockTransport {
    let mut transport = MockTransport::new();
    transport.databases = vec!["power".into(), "log".into()];
    transport
        .tables
        .insert("power".into(), vec!["d1001".into(), "d1002".into()]);
    transport.stables.insert("power".into(), vec!["meters".into()]);
    transport.columns.insert(
        "power.d1001".into(),
        vec![column("ts", "TIMESTAMP"), column("current", "FLOAT")],
    );
    transport
}

#[tokio::test]
async fn test_lazy_expansion() {
    let mut browser = MetaBrowser::new(transport(), 3);
    let roots = browser.load_roots().await.unwrap();
    let keys: Vec<&str> = roots.iter().map(|n| n.key.as_str()).collect();
    assert_eq!(keys, vec!["power", "log"]);
    assert!(roots.iter().all(|n| n.children.is_none()));

    browser.expand("power").await.unwrap();
    let tables = find_node(browser.tree(), "power").unwrap().children.clone().unwrap();
    let keys: Vec<&str> = tables.iter().map(|n| n.key.as_str()).collect();
    assert_eq!(keys, vec!["power.d1001", "power.d1002"]);
    assert_eq!(tables[0].kind, NodeKind::Table { db: "power".into() });

    browser.expand("power.d1001").await.unwrap();
    let columns = find_node(browser.tree(), "power.d1001").unwrap().children.clone().unwrap();
    let titles: Vec<&str> = columns.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["ts (TIMESTAMP)", "current (FLOAT)"]);
    assert_eq!(columns[1].key, "power.d1001.current");
    assert!(columns.iter().all(|c| c.is_leaf));
}

#[tokio::test]
async fn test_request_parameters() {
    let mut browser = MetaBrowser::new(transport(), 3);
    browser.load_roots().await.unwrap();
    browser.expand("power").await.unwrap();
    browser.expand("power.d1001").await.unwrap();

    // Leaves never trigger a fetch.
    browser.expand("power.d1001.ts").await.unwrap();

    let calls = browser_calls(&browser);
    assert_eq!(calls.len(), 3);
    let (kind, params) = &calls[1];
    assert_eq!(kind, "tables");
    assert_eq!(params.cate, "tdengine");
    assert_eq!(params.datasource_id, 3);
    assert_eq!(params.db.as_deref(), Some("power"));
    assert_eq!(params.is_stable, Some(false));
    let (kind, params) = &calls[2];
    assert_eq!(kind, "columns");
    assert_eq!(params.table.as_deref(), Some("d1001"));
}

fn browser_calls(browser: &MetaBrowser<MockTransport>) -> Vec<(String, dashquery::models::MetaParams)> {
    browser.transport().meta_calls.lock().clone()
}

#[tokio::test]
async fn test_loaded_nodes_are_not_refetched_until_collapsed() {
    let mut browser = MetaBrowser::new(transport(), 3);
    browser.load_roots().await.unwrap();
    browser.expand("power").await.unwrap();
    browser.expand("power").await.unwrap();
    assert_eq!(browser.transport().meta_call_count("tables"), 1);

    assert!(browser.collapse("power"));
    assert!(find_node(browser.tree(), "power").unwrap().children.is_none());
    browser.expand("power").await.unwrap();
    assert_eq!(browser.transport().meta_call_count("tables"), 2);

    assert!(!browser.collapse("missing"));
}

#[tokio::test]
async fn test_super_table_toggle_reloads() {
    let mut browser = MetaBrowser::new(transport(), 3);
    browser.load_roots().await.unwrap();
    browser.expand("power").await.unwrap();

    browser.set_stable(true).await.unwrap();
    assert!(browser.is_stable());
    assert!(find_node(browser.tree(), "power").unwrap().children.is_none());
    assert_eq!(browser.transport().meta_call_count("databases"), 2);

    browser.expand("power").await.unwrap();
    let tables = find_node(browser.tree(), "power").unwrap().children.clone().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].key, "power.meters");

    // Same mode again: nothing to reload.
    browser.set_stable(true).await.unwrap();
    assert_eq!(browser.transport().meta_call_count("databases"), 2);
}

#[tokio::test]
async fn test_unknown_key_and_failures() {
    let mut browser = MetaBrowser::new(transport(), 3);
    browser.load_roots().await.unwrap();
    let err = browser.expand("nope").await.unwrap_err();
    assert!(matches!(err, DashQueryError::NotFound(_)));

    let mut failing = MetaBrowser::new(MockTransport::failing("down"), 3);
    assert!(matches!(
        failing.load_roots().await,
        Err(DashQueryError::Transport(_))
    ));
    assert!(failing.tree().is_empty());
}
