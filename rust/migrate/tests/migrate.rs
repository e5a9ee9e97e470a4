use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use discovery_config::Configurable;
use discovery_migrate::{Cursor, Entity, MigrationReport, Migrator};
use discovery_storage::{
    DocumentBackend, DocumentStore, SqlBackend, SqlBackendConfig, StorageBackend,
};
use discovery_types::{Cluster, Instance, SshPublicKey};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;

async fn source() -> SqlBackend {
    SqlBackend::try_from_config(&SqlBackendConfig {
        initialize_schema: true,
        ..Default::default()
    })
    .await
    .expect("in-memory database should open")
}

fn destination() -> (Arc<InMemory>, DocumentStore) {
    let object_store = Arc::new(InMemory::new());
    let store = DocumentStore::new(object_store.clone(), "test").expect("valid base path");
    (object_store, store)
}

/// Create `clusters` clusters with `instances_per_cluster` instances each.
async fn populate(
    source: &SqlBackend,
    clusters: usize,
    instances_per_cluster: usize,
) -> Vec<String> {
    let backend = StorageBackend::Sql(source.clone());
    let mut ids = Vec::new();
    for _ in 0..clusters {
        let mut cluster = Cluster::new("1.1.1.1", "foo/1.0");
        backend.create_cluster(&mut cluster).await.unwrap();
        for i in 0..instances_per_cluster {
            let mut instance = Instance {
                cluster_id: cluster.id.clone(),
                url: format!("http://10.0.0.{i}:1113"),
                name: format!("node{i}"),
                flynn_version: "v20161108.0".to_string(),
                ssh_public_keys: vec![SshPublicKey::new("ssh-rsa", vec![i as u8; 4])],
                creator_ip: "1.1.1.1".to_string(),
                ..Default::default()
            };
            backend.create_instance(&mut instance).await.unwrap();
        }
        ids.push(cluster.id);
    }
    ids
}

/// Every document under the base, decoded.
async fn snapshot(store: &DocumentStore) -> BTreeMap<String, serde_json::Value> {
    let paths = store.list(&Path::from("test")).await.unwrap();
    let docs: Vec<serde_json::Value> = store.get_all(&paths).await.unwrap();
    paths
        .into_iter()
        .map(|path| path.to_string())
        .zip(docs)
        .collect()
}

/// Location and version of every object, to detect rewrites.
async fn versions(object_store: &InMemory) -> Vec<(String, Option<String>)> {
    use futures::TryStreamExt;
    let mut objects: Vec<_> = object_store
        .list(None)
        .map_ok(|meta| (meta.location.to_string(), meta.e_tag))
        .try_collect()
        .await
        .unwrap();
    objects.sort();
    objects
}

fn as_set(instances: Vec<Instance>) -> HashSet<String> {
    instances
        .into_iter()
        .map(|instance| serde_json::to_string(&instance).unwrap())
        .collect()
}

#[tokio::test]
async fn test_migrates_everything() {
    let source = source().await;
    let cluster_ids = populate(&source, 3, 4).await;
    let (_, store) = destination();

    let report = Migrator::new(source.pool().clone(), store.clone(), 5)
        .run()
        .await
        .unwrap();
    assert_eq!(
        report,
        MigrationReport {
            clusters: 3,
            instances: 12
        }
    );

    let sql = StorageBackend::Sql(source);
    let doc = StorageBackend::Document(DocumentBackend::new(store.clone()));
    for cluster_id in &cluster_ids {
        let expected = sql.get_cluster_instances(cluster_id).await.unwrap();
        let migrated = doc.get_cluster_instances(cluster_id).await.unwrap();
        assert_eq!(migrated.len(), 4);
        assert_eq!(as_set(migrated), as_set(expected));

        let cluster: discovery_storage::document::ClusterDocument =
            store.get(&store.cluster_path(cluster_id)).await.unwrap();
        assert_eq!(&cluster.id, cluster_id);
        assert_eq!(cluster.creator_user_agent, "foo/1.0");
    }

    // Instances keep their identity once migrated.
    let mut repeat = Instance {
        cluster_id: cluster_ids[0].clone(),
        url: "http://10.0.0.0:1113".to_string(),
        ..Default::default()
    };
    assert_eq!(
        doc.create_instance(&mut repeat).await.unwrap(),
        discovery_storage::Registration::Existing
    );
    assert_eq!(repeat.name, "node0");
}

#[tokio::test]
async fn test_rows_sharing_a_timestamp_span_pages() {
    let source = source().await;
    for id in ["e", "b", "d", "a", "c"] {
        sqlx::query(
            "INSERT INTO clusters (cluster_id, creator_ip, creator_user_agent, created_at) \
             VALUES ($1, '1.1.1.1', 'foo/1.0', 1000)",
        )
        .bind(id)
        .execute(source.pool())
        .await
        .unwrap();
    }
    let (_, store) = destination();
    let migrator = Migrator::new(source.pool().clone(), store.clone(), 2);

    let first = migrator
        .migrate_page(Entity::Clusters, &Cursor::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.written, 2);
    assert_eq!(first.cursor.id, "b");
    assert_eq!(first.cursor.created_at.timestamp_micros(), 1000);

    assert_eq!(migrator.migrate(Entity::Clusters).await.unwrap(), 3);
    for id in ["a", "b", "c", "d", "e"] {
        let doc: Option<serde_json::Value> =
            store.get_opt(&store.cluster_path(id)).await.unwrap();
        assert!(doc.is_some(), "cluster {id} was not migrated");
    }
    assert_eq!(
        migrator.load_cursor(Entity::Clusters).await.unwrap(),
        Some(Cursor::new(first.cursor.created_at, "e"))
    );
}

#[tokio::test]
async fn test_rerun_without_new_rows_writes_nothing() {
    let source = source().await;
    populate(&source, 2, 3).await;
    let (object_store, store) = destination();
    let migrator = Migrator::new(source.pool().clone(), store.clone(), 100);

    migrator.run().await.unwrap();
    let before = versions(&object_store).await;
    let contents = snapshot(&store).await;

    assert_eq!(migrator.run().await.unwrap(), MigrationReport::default());
    assert_eq!(versions(&object_store).await, before);
    assert_eq!(snapshot(&store).await, contents);

    // New rows are picked up by the next run. Timestamps have millisecond
    // resolution, so step past the last migrated one.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    populate(&source, 1, 1).await;
    assert_eq!(
        migrator.run().await.unwrap(),
        MigrationReport {
            clusters: 1,
            instances: 1
        }
    );
}

#[tokio::test]
async fn test_interrupted_run_resumes_to_the_same_state() {
    let source = source().await;
    populate(&source, 5, 2).await;

    let (_, uninterrupted) = destination();
    Migrator::new(source.pool().clone(), uninterrupted.clone(), 2)
        .run()
        .await
        .unwrap();

    let (_, interrupted) = destination();
    let migrator = Migrator::new(source.pool().clone(), interrupted.clone(), 2);
    let page = migrator
        .migrate_page(Entity::Clusters, &Cursor::default())
        .await
        .unwrap()
        .unwrap();
    // The next page commits but the process dies before saving its cursor.
    migrator
        .copy_page(Entity::Clusters, &page.cursor)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        migrator.load_cursor(Entity::Clusters).await.unwrap(),
        Some(page.cursor)
    );

    let report = Migrator::new(source.pool().clone(), interrupted.clone(), 2)
        .run()
        .await
        .unwrap();
    assert_eq!(
        report,
        MigrationReport {
            clusters: 3,
            instances: 10
        }
    );
    assert_eq!(snapshot(&interrupted).await, snapshot(&uninterrupted).await);
}

#[tokio::test]
async fn test_query_failure_is_fatal() {
    // No schema: the first page query fails.
    let source = SqlBackend::try_from_config(&SqlBackendConfig::default())
        .await
        .unwrap();
    let (_, store) = destination();
    let err = Migrator::new(source.pool().clone(), store.clone(), 100)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        discovery_migrate::MigrateError::Read {
            entity: Entity::Clusters,
            ..
        }
    ));
    let cursor: Option<Cursor> = store
        .get_opt(&store.migration_path("clusters"))
        .await
        .unwrap();
    assert!(cursor.is_none());
}

#[tokio::test]
async fn test_commit_failure_keeps_previous_cursor() {
    let source = source().await;
    populate(&source, 5, 0).await;
    let ordered: Vec<String> =
        sqlx::query_scalar("SELECT cluster_id FROM clusters ORDER BY created_at, cluster_id")
            .fetch_all(source.pool())
            .await
            .unwrap();

    let (_, uninterrupted) = destination();
    let reference = Migrator::new(source.pool().clone(), uninterrupted.clone(), 2);
    let first_page = reference
        .migrate_page(Entity::Clusters, &Cursor::default())
        .await
        .unwrap()
        .unwrap();
    reference.run().await.unwrap();

    // A directory where the third cluster's document belongs fails the
    // second page's commit.
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("test").join("clusters").join(&ordered[2]);
    std::fs::create_dir_all(blocked.join("blocker")).unwrap();
    let object_store =
        Arc::new(object_store::local::LocalFileSystem::new_with_prefix(dir.path()).unwrap());
    let store = DocumentStore::new(object_store, "test").unwrap();
    let migrator = Migrator::new(source.pool().clone(), store.clone(), 2);

    let err = migrator.run().await.unwrap_err();
    assert!(matches!(
        err,
        discovery_migrate::MigrateError::Commit {
            entity: Entity::Clusters,
            ..
        }
    ));
    assert_eq!(
        migrator.load_cursor(Entity::Clusters).await.unwrap(),
        Some(first_page.cursor)
    );
    assert_eq!(migrator.load_cursor(Entity::Instances).await.unwrap(), None);

    std::fs::remove_dir_all(&blocked).unwrap();
    assert_eq!(
        migrator.run().await.unwrap(),
        MigrationReport {
            clusters: 3,
            instances: 0
        }
    );
    assert_eq!(snapshot(&store).await, snapshot(&uninterrupted).await);
}

#[tokio::test]
async fn test_unbounded_page_size_copies_everything_in_one_page() {
    let source = source().await;
    populate(&source, 3, 2).await;
    let (_, store) = destination();
    let migrator = Migrator::new(source.pool().clone(), store.clone(), usize::MAX);

    let page = migrator
        .migrate_page(Entity::Clusters, &Cursor::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.written, 3);
    assert_eq!(
        migrator.run().await.unwrap(),
        MigrationReport {
            clusters: 0,
            instances: 6
        }
    );
}
