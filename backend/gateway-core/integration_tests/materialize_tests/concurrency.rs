use gateway_core::credentials::{ClusterCredential, CredentialBundle};
use gateway_core::materialize::{ConfigMaterializer, Kubeconfig};

use common::RedactedToken;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;

fn bundle(writer: usize, round: usize) -> CredentialBundle {
    (0..5).fold(CredentialBundle::new(), |bundle, i| {
        bundle.with_cluster(
            format!("cluster-{i}"),
            ClusterCredential::new(
                format!("https://cluster-{i}.example.com"),
                RedactedToken::new(format!("token-{writer}-{round}-{i}-{}", "x".repeat(512))),
            ),
        )
    })
}

/// **VALUE**: Verifies readers never see a partial kubeconfig while writers race.
///
/// **WHY THIS MATTERS**: The embedded server re-reads the kubeconfig on its own schedule while
/// refreshes rewrite it; a torn read drops every cluster until the next reload.
///
/// **BUG THIS CATCHES**: Would catch an in-place `write` (truncate then fill) replacing the
/// temp-file-and-rename sequence.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_writers_when_reading_then_documents_always_complete() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let materializer = Arc::new(ConfigMaterializer::new(dir.path().join("kubeconfig.yaml")));
    materializer
        .materialize(&bundle(0, 0))
        .expect("initial write");
    let done = Arc::new(AtomicBool::new(false));

    // WHEN: Four writers and one reader run at once
    let writers: Vec<_> = (1..=4)
        .map(|writer| {
            let materializer = Arc::clone(&materializer);
            tokio::task::spawn_blocking(move || {
                for round in 0..25 {
                    materializer
                        .materialize(&bundle(writer, round))
                        .expect("write");
                }
            })
        })
        .collect();

    let reader = {
        let materializer = Arc::clone(&materializer);
        let done = Arc::clone(&done);
        tokio::task::spawn_blocking(move || {
            let mut reads = 0usize;
            while !done.load(Ordering::SeqCst) {
                let contents =
                    std::fs::read_to_string(materializer.path()).expect("file always exists");
                let doc = Kubeconfig::from_yaml(&contents).expect("document always complete");
                assert_eq!(doc.clusters.len(), 5);
                assert_eq!(doc.users.len(), 5);
                reads += 1;
            }
            reads
        })
    };

    for writer in writers {
        writer.await.expect("writer task");
    }
    done.store(true, Ordering::SeqCst);
    let reads = reader.await.expect("reader task");

    // THEN: Reads happened and no temp files remain
    assert!(reads > 0);
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name != "kubeconfig.yaml")
        .collect();
    assert!(leftovers.is_empty(), "Temp files left behind: {leftovers:?}");
}
