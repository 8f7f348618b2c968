// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for group path resolution and invalidation.

use keynest::{CacheOptions, CompositeKey, Config, InMemoryStore, Registry, VersionMode};
use keynest_store::Store;
use keynest_store::testing::{MockStore, StoreOp};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn memory_registry() -> Registry<InMemoryStore> {
    Registry::with_config(Config::builder(InMemoryStore::new()).build()).expect("configure failed")
}

fn mock_registry(store: &MockStore) -> Registry<MockStore> {
    Registry::with_config(Config::builder(store.clone()).build()).expect("configure failed")
}

fn id(value: u32) -> CompositeKey {
    CompositeKey::new().with("id", value)
}

#[test]
fn root_group_path_starts_at_version_one() {
    block_on(async {
        let registry = memory_registry();
        let group = registry.register_group("group", "id").expect("register failed");

        assert_eq!(group.path(&id(10)).await.expect("path failed"), "ROOT/group/1/1/10");
    });
}

#[test]
fn invalidation_bumps_the_version_segment() {
    block_on(async {
        let registry = memory_registry();
        let group = registry.register_group("group", "id").expect("register failed");

        let version = group.invalidate_cache_group(None).await.expect("invalidate failed");

        assert_eq!(version, 2);
        assert_eq!(group.path(&id(10)).await.expect("path failed"), "ROOT/group/1/2/10");
    });
}

#[test]
fn child_path_nests_under_parent_path() {
    block_on(async {
        let registry = memory_registry();
        let parent = registry.register_group("parentgroup", "parentid").expect("register failed");
        let child = parent.register_child_group("childgroup", "childid").expect("register failed");

        let key = CompositeKey::from([("parentid", 10), ("childid", 20)]);

        assert_eq!(
            child.path(&key).await.expect("path failed"),
            "ROOT/parentgroup/1/1/10/childgroup/1/1/20"
        );
        assert_eq!(child.parent_path(&key).await.expect("parent path failed"), "ROOT/parentgroup/1/1/10");
        assert_eq!(parent.parent_path(&key).await.expect("parent path failed"), "ROOT");
    });
}

#[test]
fn revision_appears_before_version() {
    block_on(async {
        let registry = memory_registry();
        let group = registry.group("group", "id").revision(5).register().expect("register failed");

        assert_eq!(group.path(&id(1)).await.expect("path failed"), "ROOT/group/5/1/1");
    });
}

#[test]
fn custom_root_token_prefixes_paths() {
    block_on(async {
        let registry =
            Registry::with_config(Config::builder(InMemoryStore::new()).root("tenant").build()).expect("configure failed");
        let group = registry.register_group("group", "id").expect("register failed");

        assert_eq!(group.path(&id(3)).await.expect("path failed"), "tenant/group/1/1/3");
    });
}

#[test]
fn invalidating_a_child_only_moves_that_parent_entity() {
    block_on(async {
        let registry = memory_registry();
        let parent = registry.register_group("parentgroup", "parentid").expect("register failed");
        let child = parent.register_child_group("childgroup", "childid").expect("register failed");

        let k10 = CompositeKey::from([("parentid", 10), ("childid", 20)]);
        let k11 = CompositeKey::from([("parentid", 11), ("childid", 21)]);

        child.invalidate_cache_group(Some(&k10)).await.expect("invalidate failed");

        assert_eq!(
            child.path(&k10).await.expect("path failed"),
            "ROOT/parentgroup/1/1/10/childgroup/1/2/20"
        );
        assert_eq!(
            child.path(&k11).await.expect("path failed"),
            "ROOT/parentgroup/1/1/11/childgroup/1/1/21"
        );
        assert_eq!(parent.path(&k10).await.expect("path failed"), "ROOT/parentgroup/1/1/10");
    });
}

#[test]
fn invalidating_the_parent_moves_the_whole_subtree() {
    block_on(async {
        let registry = memory_registry();
        let parent = registry.register_group("parentgroup", "parentid").expect("register failed");
        let child = parent.register_child_group("childgroup", "childid").expect("register failed");
        let key = CompositeKey::from([("parentid", 10), ("childid", 20)]);

        let before = child.path(&key).await.expect("path failed");
        parent.invalidate_cache_group(None).await.expect("invalidate failed");
        let after = child.path(&key).await.expect("path failed");

        assert_ne!(before, after);
        assert_eq!(after, "ROOT/parentgroup/1/2/10/childgroup/1/1/20");
    });
}

#[test]
fn path_multi_matches_individual_paths() {
    block_on(async {
        let registry = memory_registry();
        let parent = registry.register_group("parentgroup", "parentid").expect("register failed");
        let child = parent.register_child_group("childgroup", "childid").expect("register failed");

        let k10 = CompositeKey::from([("parentid", 10), ("childid", 20)]);
        let k11 = CompositeKey::from([("parentid", 11), ("childid", 21)]);
        child.invalidate_cache_group(Some(&k10)).await.expect("invalidate failed");

        let paths = child.path_multi(&[k10.clone(), k11.clone()]).await.expect("path_multi failed");

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[&k10], "ROOT/parentgroup/1/1/10/childgroup/1/2/20");
        assert_eq!(paths[&k11], "ROOT/parentgroup/1/1/11/childgroup/1/1/21");
        assert_eq!(paths[&k10], child.path(&k10).await.expect("path failed"));
    });
}

#[test]
fn parent_path_multi_of_root_group_is_root_token() {
    block_on(async {
        let registry = memory_registry();
        let group = registry.register_group("group", "id").expect("register failed");

        let paths = group.parent_path_multi(&[id(1), id(2)]).await.expect("parent_path_multi failed");

        assert_eq!(paths[&id(1)], "ROOT");
        assert_eq!(paths[&id(2)], "ROOT");
    });
}

#[test]
fn path_multi_of_no_keys_makes_no_store_calls() {
    block_on(async {
        let store = MockStore::new();
        let registry = mock_registry(&store);
        let parent = registry.register_group("parent", "parentid").expect("register failed");
        let child = parent.register_child_group("child", "childid").expect("register failed");

        assert!(child.path_multi(&[]).await.expect("path_multi failed").is_empty());
        assert!(store.operations().is_empty());
    });
}

#[test]
fn static_groups_never_touch_version_keys() {
    block_on(async {
        let store = MockStore::new();
        let registry = mock_registry(&store);
        let group = registry.group("group", "id").static_version(7).register().expect("register failed");

        assert_eq!(group.version_mode(), VersionMode::Static(7));
        assert_eq!(group.path(&id(1)).await.expect("path failed"), "ROOT/group/1/7/1");
        let paths = group.path_multi(&[id(1), id(2)]).await.expect("path_multi failed");
        assert_eq!(paths[&id(2)], "ROOT/group/1/7/2");

        assert!(store.operations().is_empty());
    });
}

#[test]
fn static_groups_cannot_be_invalidated() {
    block_on(async {
        let store = MockStore::new();
        let registry = mock_registry(&store);
        let group = registry.group("group", "id").static_version(7).register().expect("register failed");

        let err = group.invalidate_cache_group(None).await.unwrap_err();

        assert!(err.is_configuration());
        assert!(store.operations().is_empty());
    });
}

#[test]
fn dynamic_child_of_static_parent_reads_only_its_own_counter() {
    block_on(async {
        let store = MockStore::new();
        let registry = mock_registry(&store);
        let parent = registry.group("parent", "parentid").static_version(3).register().expect("register failed");
        let child = parent.register_child_group("child", "childid").expect("register failed");

        let path = child
            .path(&CompositeKey::from([("parentid", 1), ("childid", 2)]))
            .await
            .expect("path failed");

        assert_eq!(path, "ROOT/parent/1/3/1/child/1/1/2");
        assert_eq!(
            store.operations(),
            vec![StoreOp::FetchOrInsert("ROOT/parent/1/3/1/child/_version".to_string())]
        );
    });
}

#[test]
fn missing_key_names_the_field() {
    block_on(async {
        let registry = memory_registry();
        let parent = registry.register_group("parentgroup", "parentid").expect("register failed");
        let child = parent.register_child_group("childgroup", "childid").expect("register failed");

        let err = child.path(&CompositeKey::new().with("childid", 20)).await.unwrap_err();

        assert!(err.is_missing_key());
        assert!(err.to_string().contains("parentid"));
    });
}

#[test]
fn precomputed_parent_path_skips_ancestor_resolution() {
    block_on(async {
        let store = MockStore::new();
        let registry = mock_registry(&store);
        let parent = registry.register_group("parent", "parentid").expect("register failed");
        let child = parent.register_child_group("child", "childid").expect("register failed");
        let key = CompositeKey::from([("parentid", 1), ("childid", 2)]);

        let parent_path = parent.path(&key).await.expect("path failed");
        store.clear_operations();

        let path = child.path_with_parent(&key, Some(&parent_path)).await.expect("path failed");

        assert_eq!(path, "ROOT/parent/1/1/1/child/1/1/2");
        assert!(
            store
                .operations()
                .iter()
                .all(|op| *op == StoreOp::FetchOrInsert("ROOT/parent/1/1/1/child/_version".to_string()))
        );
    });
}

#[test]
fn evicted_counter_restarts_at_initial_version() {
    block_on(async {
        let store = MockStore::new();
        let registry = mock_registry(&store);
        let group = registry.register_group("group", "id").expect("register failed");
        group.invalidate_cache_group(None).await.expect("invalidate failed");

        store.delete("ROOT/group/_version", &CacheOptions::new()).await.expect("delete failed");

        assert_eq!(group.path(&id(1)).await.expect("path failed"), "ROOT/group/1/1/1");
    });
}

#[test]
fn store_failure_surfaces_as_store_error() {
    block_on(async {
        let store = MockStore::new();
        let registry = mock_registry(&store);
        let group = registry.register_group("group", "id").expect("register failed");
        store.fail_when(StoreOp::touches_version_key);

        let err = group.path(&id(1)).await.unwrap_err();
        assert!(err.is_store());

        let err = group.invalidate_cache_group(None).await.unwrap_err();
        assert!(err.is_store());
    });
}

#[test]
fn key_builds_composite_keys_positionally() {
    let registry = memory_registry();
    let parent = registry.register_group("parent", "parentid").expect("register failed");
    let child = parent.register_child_group("child", "childid").expect("register failed");

    let key = child.key([10, 20]).expect("key failed");
    assert_eq!(key, CompositeKey::from([("parentid", 10), ("childid", 20)]));

    assert!(child.key([10]).unwrap_err().is_missing_key());
    assert!(child.key([1, 2, 3]).unwrap_err().is_configuration());
}

#[test]
fn registration_rules_are_enforced() {
    let registry = memory_registry();
    let parent = registry.register_group("parent", "parentid").expect("register failed");
    parent.register_child_group("child", "childid").expect("register failed");

    assert!(parent.register_child_group("child", "otherid").unwrap_err().is_configuration());
    assert!(parent.register_child_group("other", "parentid").unwrap_err().is_configuration());
    assert!(parent.register_child_group("bad/name", "x").unwrap_err().is_configuration());
    assert!(parent.register_child_group("", "x").unwrap_err().is_configuration());
    assert!(parent.register_child_group("fine", "").unwrap_err().is_configuration());

    assert_eq!(parent.children().len(), 1);
    assert!(parent.child("child").is_some());
}

#[test]
fn group_accessors_reflect_registration() {
    let registry = memory_registry();
    let parent = registry
        .group("parent", "parentid")
        .default_options(CacheOptions::new().unless_exist(true))
        .register()
        .expect("register failed");
    let child = parent
        .child_group("child", "childid")
        .default_options(CacheOptions::new().force(true))
        .revision(3)
        .register()
        .expect("register failed");

    assert_eq!(child.name(), "child");
    assert_eq!(child.key_name(), "childid");
    assert_eq!(child.key_schema().fields(), ["parentid", "childid"]);
    assert_eq!(child.revision(), 3);
    assert!(!child.is_static());
    assert!(child.default_options().is_unless_exist());
    assert!(child.default_options().is_force());
    assert_eq!(child.parent().expect("parent alive").map(|p| p.name().to_owned()).as_deref(), Some("parent"));
    assert!(parent.parent().expect("root has no parent").is_none());
}

#[test]
fn groups_are_thread_safe_handles() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<keynest::Group<InMemoryStore>>();
    assert_send_sync::<keynest::NamedCache<String, InMemoryStore>>();
    assert_send_sync::<Registry<InMemoryStore>>();
}
