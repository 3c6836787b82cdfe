// Copyright (c) 2026 Anchorstore
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use std::time::Duration;

use anchorstore::core::errors::Error;
use anchorstore::core::types::{Pagination, QuotaLimits, SearchCriteria, Visibility};
use anchorstore::storage::memory::MemoryBackend;
use anchorstore::storage::sled_store::SledBackend;
use anchorstore::storage::{PutOptions, ReserveOptions, StorageBackend};

const OWNER: &str = "anchor_owner_alpha";
const OTHER: &str = "anchor_owner_beta";

fn put_opts(owner: &str) -> PutOptions {
    PutOptions {
        owner: owner.to_string(),
        tags: Vec::new(),
        visibility: Visibility::Private,
    }
}

fn reserve_opts(ttl_ms: u64) -> ReserveOptions {
    ReserveOptions {
        ttl_ms,
        quota_limits: None,
    }
}

#[tokio::test]
async fn reservations_are_additive() {
    let backend = MemoryBackend::default();
    backend
        .reserve_upload(OWNER, "/user/a/p1", 100, reserve_opts(60_000))
        .await
        .expect("reserve p1");
    backend
        .reserve_upload(OWNER, "/user/a/p2", 250, reserve_opts(60_000))
        .await
        .expect("reserve p2");

    let status = backend.quota_status(OWNER).await.expect("quota");
    assert!(status.total_size >= 350);
    assert_eq!(status.object_count, 2);
}

#[tokio::test]
async fn repeat_reservation_adopts_and_widens() {
    let backend = MemoryBackend::default();
    let first = backend
        .reserve_upload(OWNER, "/user/a/p1", 100, reserve_opts(60_000))
        .await
        .expect("reserve");
    let second = backend
        .reserve_upload(OWNER, "/user/a/p1", 300, reserve_opts(60_000))
        .await
        .expect("re-reserve");
    assert_eq!(first.id, second.id);
    assert_eq!(second.size, 300);

    // Narrower repeat keeps the widest size.
    let third = backend
        .reserve_upload(OWNER, "/user/a/p1", 50, reserve_opts(60_000))
        .await
        .expect("re-reserve narrow");
    assert_eq!(third.id, first.id);
    assert_eq!(third.size, 300);

    let status = backend.quota_status(OWNER).await.expect("quota");
    assert_eq!(status.total_size, 300);
    assert_eq!(status.object_count, 1);
}

#[tokio::test]
async fn expired_reservations_stop_counting() {
    let backend = MemoryBackend::default();
    backend
        .reserve_upload(OWNER, "/user/a/p1", 500, reserve_opts(10))
        .await
        .expect("reserve");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = backend.quota_status(OWNER).await.expect("quota");
    assert_eq!(status.total_size, 0);
    assert_eq!(status.object_count, 0);

    // A fresh reservation for the same pair does not collide.
    let fresh = backend
        .reserve_upload(OWNER, "/user/a/p1", 500, reserve_opts(60_000))
        .await
        .expect("fresh reserve");
    assert_eq!(fresh.size, 500);
}

#[tokio::test]
async fn overwrite_reservation_holds_only_the_delta() {
    let backend = MemoryBackend::default();
    backend
        .put("/user/a/p1", &[0u8; 100], put_opts(OWNER))
        .await
        .expect("put");
    let before = backend.quota_status(OWNER).await.expect("quota");

    let reservation = backend
        .reserve_upload(OWNER, "/user/a/p1", 50, reserve_opts(60_000))
        .await
        .expect("reserve");
    assert_eq!(reservation.size, 0);

    let after = backend.quota_status(OWNER).await.expect("quota");
    assert_eq!(before.remaining_size, after.remaining_size);

    // Growing the object holds only the growth.
    let grown = backend
        .reserve_upload(OWNER, "/user/a/p1", 180, reserve_opts(60_000))
        .await
        .expect("reserve growth");
    assert_eq!(grown.size, 80);
}

#[tokio::test]
async fn object_count_limit_is_enforced() {
    let backend = MemoryBackend::new(QuotaLimits {
        max_objects_per_user: 1,
        ..QuotaLimits::default()
    });
    let reservation = backend
        .reserve_upload(OWNER, "/user/a/p1", 1, reserve_opts(60_000))
        .await
        .expect("first reserve");
    backend
        .put("/user/a/p1", &[1u8], put_opts(OWNER))
        .await
        .expect("put");
    backend
        .commit_upload(&reservation.id)
        .await
        .expect("commit");

    let denied = backend
        .reserve_upload(OWNER, "/user/a/p2", 1, reserve_opts(60_000))
        .await;
    assert!(matches!(denied, Err(Error::QuotaExceeded(_))));

    // Another owner is unaffected.
    backend
        .reserve_upload(OTHER, "/user/b/p1", 1, reserve_opts(60_000))
        .await
        .expect("other owner reserve");
}

#[tokio::test]
async fn storage_limit_is_enforced() {
    let backend = MemoryBackend::new(QuotaLimits {
        max_storage_per_user: 100,
        ..QuotaLimits::default()
    });
    backend
        .reserve_upload(OWNER, "/user/a/p1", 80, reserve_opts(60_000))
        .await
        .expect("reserve");
    let denied = backend
        .reserve_upload(OWNER, "/user/a/p2", 40, reserve_opts(60_000))
        .await;
    assert!(matches!(denied, Err(Error::QuotaExceeded(_))));
}

#[tokio::test]
async fn negative_reservation_size_is_rejected() {
    let backend = MemoryBackend::default();
    let denied = backend
        .reserve_upload(OWNER, "/user/a/p1", -1, reserve_opts(60_000))
        .await;
    assert!(matches!(denied, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn commit_and_release_are_idempotent() {
    let backend = MemoryBackend::default();
    let reservation = backend
        .reserve_upload(OWNER, "/user/a/p1", 10, reserve_opts(60_000))
        .await
        .expect("reserve");

    backend.commit_upload(&reservation.id).await.expect("commit");
    backend
        .commit_upload(&reservation.id)
        .await
        .expect("commit again");
    backend
        .release_upload(&reservation.id)
        .await
        .expect("release unknown");
    backend
        .commit_upload("never-existed")
        .await
        .expect("commit unknown");
}

#[tokio::test]
async fn overwrite_preserves_created_at() {
    let backend = MemoryBackend::default();
    let first = backend
        .put("/user/a/p1", b"one", put_opts(OWNER))
        .await
        .expect("put");
    assert!(first.updated_at.is_none());

    let second = backend
        .put("/user/a/p1", b"two bytes", put_opts(OWNER))
        .await
        .expect("overwrite");
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at.is_some());
    assert_eq!(second.size, 9);
}

#[tokio::test]
async fn search_filters_combine_with_and() {
    let backend = MemoryBackend::default();
    let mut tagged = put_opts(OWNER);
    tagged.tags = vec!["report".to_string(), "draft".to_string()];
    backend
        .put("/user/a/docs/report.txt", b"r", tagged)
        .await
        .expect("put");
    backend
        .put("/user/a/docs/nested/deep.txt", b"d", put_opts(OWNER))
        .await
        .expect("put");
    backend
        .put("/user/b/docs/other.txt", b"o", put_opts(OTHER))
        .await
        .expect("put");

    // Non-recursive prefix cuts off nested paths.
    let shallow = backend
        .search(
            &SearchCriteria {
                path_prefix: Some("/user/a/docs/".to_string()),
                ..SearchCriteria::default()
            },
            &Pagination::default(),
        )
        .await
        .expect("search");
    assert_eq!(shallow.results.len(), 1);
    assert_eq!(shallow.results[0].path, "/user/a/docs/report.txt");

    let deep = backend
        .search(
            &SearchCriteria {
                path_prefix: Some("/user/a/docs/".to_string()),
                recursive: true,
                ..SearchCriteria::default()
            },
            &Pagination::default(),
        )
        .await
        .expect("search");
    assert_eq!(deep.results.len(), 2);

    // Tag ANY-match plus owner equality.
    let by_tag = backend
        .search(
            &SearchCriteria {
                tags: Some(vec!["draft".to_string(), "unused".to_string()]),
                owner: Some(OWNER.to_string()),
                ..SearchCriteria::default()
            },
            &Pagination::default(),
        )
        .await
        .expect("search");
    assert_eq!(by_tag.results.len(), 1);

    // Name substring on the final segment.
    let by_name = backend
        .search(
            &SearchCriteria {
                name: Some("other".to_string()),
                ..SearchCriteria::default()
            },
            &Pagination::default(),
        )
        .await
        .expect("search");
    assert_eq!(by_name.results.len(), 1);
    assert_eq!(by_name.results[0].owner, OTHER);
}

#[tokio::test]
async fn search_pagination_is_stable() {
    let backend = MemoryBackend::default();
    for i in 0..5 {
        backend
            .put(&format!("/user/a/docs/f{i}.txt"), b"x", put_opts(OWNER))
            .await
            .expect("put");
    }

    let first_page = backend
        .search(
            &SearchCriteria::default(),
            &Pagination {
                limit: Some(2),
                cursor: None,
            },
        )
        .await
        .expect("search");
    assert_eq!(first_page.results.len(), 2);
    let cursor = first_page.next_cursor.clone().expect("cursor");

    let second_page = backend
        .search(
            &SearchCriteria::default(),
            &Pagination {
                limit: Some(2),
                cursor: Some(cursor),
            },
        )
        .await
        .expect("search");
    assert_eq!(second_page.results.len(), 2);
    assert!(second_page.results[0].path > first_page.results[1].path);
}

#[tokio::test]
async fn sled_backend_matches_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = SledBackend::open(dir.path().to_str().expect("utf8 path"), QuotaLimits::default())
        .expect("open");

    let reservation = backend
        .reserve_upload(OWNER, "/user/a/p1", 4, reserve_opts(60_000))
        .await
        .expect("reserve");
    backend
        .put("/user/a/p1", b"data", put_opts(OWNER))
        .await
        .expect("put");
    backend.commit_upload(&reservation.id).await.expect("commit");

    let entry = backend.get("/user/a/p1").await.expect("get").expect("entry");
    assert_eq!(entry.data, b"data");
    assert_eq!(entry.metadata.size, 4);

    let status = backend.quota_status(OWNER).await.expect("quota");
    assert_eq!(status.object_count, 1);
    assert_eq!(status.total_size, 4);

    assert!(backend.delete("/user/a/p1").await.expect("delete"));
    assert!(!backend.delete("/user/a/p1").await.expect("delete again"));
    assert!(backend.get("/user/a/p1").await.expect("get").is_none());
}
