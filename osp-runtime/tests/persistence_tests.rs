//! Integration tests for persistence and access control across roots

mod common;

use common::init_tracing;
use osp_runtime::{
    AccessLevel, ArchetypeDef, ArchetypeRegistry, ConnectOptions, EngineConfig, Runtime,
    SpatialPath,
};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn registry() -> ArchetypeRegistry {
    ArchetypeRegistry::new()
        .with(ArchetypeDef::node("City").field("name", json!("")))
        .unwrap()
}

fn file_runtime(path: &Path) -> Runtime {
    let mut config = EngineConfig::default();
    config.store.path = Some(path.to_path_buf());
    Runtime::with_config(config, registry()).unwrap()
}

#[test]
fn test_graph_survives_reopen() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.json");

    let (root, city) = {
        let runtime = file_runtime(&path);
        let root = runtime.create_root().unwrap();
        let ctx = runtime.context(root).unwrap();
        let city = ctx
            .create_node_with("City", &[("name".to_string(), json!("Oslo"))])
            .unwrap();
        ctx.connect(&[root], &[city], &ConnectOptions::new()).unwrap();
        ctx.save(city).unwrap();
        assert!(ctx.commit().unwrap() >= 3);
        (root, city)
    };
    assert!(path.exists());

    let runtime = file_runtime(&path);
    assert!(runtime.roots().unwrap().contains(&root));
    let ctx = runtime.context(root).unwrap();
    assert_eq!(ctx.refs(&SpatialPath::from_node(root).out()).unwrap(), vec![city]);
    assert_eq!(ctx.field(city, "name"), Some(json!("Oslo")));

    let anchor = ctx.get(city).unwrap().unwrap();
    assert!(anchor.persistent);
    assert_eq!(anchor.root, Some(root));
}

#[test]
fn test_ephemeral_anchors_are_not_committed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.json");

    let (root, scratch) = {
        let runtime = file_runtime(&path);
        let root = runtime.create_root().unwrap();
        let ctx = runtime.context(root).unwrap();
        let scratch = ctx.create_node("City").unwrap();
        runtime.commit().unwrap();
        (root, scratch)
    };

    let runtime = file_runtime(&path);
    let ctx = runtime.context(root).unwrap();
    assert!(ctx.get(scratch).unwrap().is_none());
}

#[test]
fn test_destroy_is_visible_after_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("graph.json");

    let (root, city) = {
        let runtime = file_runtime(&path);
        let root = runtime.create_root().unwrap();
        let ctx = runtime.context(root).unwrap();
        let city = ctx.create_node("City").unwrap();
        ctx.connect(&[root], &[city], &ConnectOptions::new()).unwrap();
        ctx.save(city).unwrap();
        ctx.commit().unwrap();
        (root, city)
    };

    {
        let runtime = file_runtime(&path);
        let ctx = runtime.context(root).unwrap();
        ctx.destroy(&[city]).unwrap();
        ctx.commit().unwrap();
    }

    let runtime = file_runtime(&path);
    let ctx = runtime.context(root).unwrap();
    assert!(ctx.get(city).unwrap().is_none());
    assert!(ctx.edges_of(root).unwrap().is_empty());
}

#[test]
fn test_refs_hide_nodes_until_granted() {
    init_tracing();
    let runtime = Runtime::new(registry()).unwrap();
    let alice = runtime.context(runtime.create_root().unwrap()).unwrap();
    let bob = runtime.context(runtime.create_root().unwrap()).unwrap();

    let hub = alice.create_node("City").unwrap();
    let secret = alice.create_node("City").unwrap();
    alice.connect(&[hub], &[secret], &ConnectOptions::new()).unwrap();
    alice.save(hub).unwrap();
    alice.perm_grant(hub, AccessLevel::Read).unwrap();

    let path = SpatialPath::from_node(hub).out();
    assert!(bob.refs(&path).unwrap().is_empty());
    assert_eq!(alice.refs(&path).unwrap(), vec![secret]);

    // Bob may not change permissions on Alice's anchors
    assert!(!bob.perm_grant(secret, AccessLevel::Write).unwrap());

    assert!(alice.perm_grant(secret, "READ").unwrap());
    assert_eq!(bob.refs(&path).unwrap(), vec![secret]);
}

#[test]
fn test_grant_then_revoke() {
    let runtime = Runtime::new(registry()).unwrap();
    let owner = runtime.context(runtime.create_root().unwrap()).unwrap();
    let guest = runtime.context(runtime.create_root().unwrap()).unwrap();

    let city = owner.create_node("City").unwrap();
    owner.save(city).unwrap();
    assert_eq!(guest.check_access_level(city).unwrap(), AccessLevel::NoAccess);

    assert!(owner.perm_grant(city, 1i64).unwrap());
    assert_eq!(guest.check_access_level(city).unwrap(), AccessLevel::Connect);
    assert!(!owner.perm_grant(city, AccessLevel::Connect).unwrap());

    assert!(owner.perm_revoke(city).unwrap());
    assert_eq!(guest.check_access_level(city).unwrap(), AccessLevel::NoAccess);
    assert_eq!(owner.check_access_level(city).unwrap(), AccessLevel::Write);
}

#[test]
fn test_root_override_beats_general_grant() {
    let runtime = Runtime::new(registry()).unwrap();
    let owner = runtime.context(runtime.create_root().unwrap()).unwrap();
    let guest_root = runtime.create_root().unwrap();
    let guest = runtime.context(guest_root).unwrap();

    let city = owner.create_node("City").unwrap();
    owner.save(city).unwrap();
    owner.perm_grant(city, AccessLevel::Write).unwrap();
    assert!(owner.allow_root(city, guest_root, "NO_ACCESS").unwrap());
    assert_eq!(guest.check_access_level(city).unwrap(), AccessLevel::NoAccess);

    // Denied writes leave the anchor untouched
    guest.destroy(&[city]).unwrap();
    assert!(owner.get(city).unwrap().is_some());

    assert!(owner.disallow_root(city, guest_root).unwrap());
    assert_eq!(guest.check_access_level(city).unwrap(), AccessLevel::Write);
    guest.destroy(&[city]).unwrap();
    assert!(owner.get(city).unwrap().is_none());
}

#[test]
fn test_connect_skips_pairs_without_access() {
    let runtime = Runtime::new(registry()).unwrap();
    let owner = runtime.context(runtime.create_root().unwrap()).unwrap();
    let guest = runtime.context(runtime.create_root().unwrap()).unwrap();

    let locked = owner.create_node("City").unwrap();
    let open = owner.create_node("City").unwrap();
    owner.save(locked).unwrap();
    owner.save(open).unwrap();
    owner.perm_grant(open, AccessLevel::Connect).unwrap();

    let mine = guest.create_node("City").unwrap();
    let edges = guest
        .connect(&[mine], &[locked, open], &ConnectOptions::new().edges_only())
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(
        guest.refs(&SpatialPath::from_node(mine).out()).unwrap(),
        vec![open]
    );
}

#[test]
fn test_save_promotes_ephemeral_neighbourhood() {
    let runtime = Runtime::new(registry()).unwrap();
    let root = runtime.create_root().unwrap();
    let ctx = runtime.context(root).unwrap();

    let a = ctx.create_node("City").unwrap();
    let b = ctx.create_node("City").unwrap();
    let edge = ctx
        .connect(&[a], &[b], &ConnectOptions::new().edges_only())
        .unwrap()[0];

    ctx.save(edge).unwrap();
    for id in [a, b, edge] {
        let anchor = ctx.get(id).unwrap().unwrap();
        assert!(anchor.persistent);
        assert_eq!(anchor.root, Some(root));
    }
    assert_eq!(runtime.stats().persistent_anchors, 5);
}
