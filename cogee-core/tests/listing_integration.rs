use cogee_core::contract::{MockStorageCatalog, ObjectEntry};
use cogee_core::listing::{list_buckets, list_prefixes};
use cogee_core::{ApiError, CogeeError};

#[tokio::test]
async fn buckets_are_returned_as_listed() {
    let mut catalog = MockStorageCatalog::new();
    catalog
        .expect_list_buckets()
        .withf(|project: &str| project == "my-project")
        .times(1)
        .returning(|_| Ok(vec!["imagery".into(), "archive".into()]));

    let buckets = list_buckets(&catalog, "my-project").await.expect("listing succeeds");
    assert_eq!(buckets, vec!["imagery", "archive"]);
}

#[tokio::test]
async fn zero_buckets_is_not_an_error() {
    let mut catalog = MockStorageCatalog::new();
    catalog.expect_list_buckets().returning(|_| Ok(vec![]));

    let buckets = list_buckets(&catalog, "empty-project").await.expect("listing succeeds");
    assert!(buckets.is_empty());
}

#[tokio::test]
async fn missing_project_is_a_configuration_error() {
    let mut catalog = MockStorageCatalog::new();
    catalog.expect_list_buckets().never();

    let err = list_buckets(&catalog, "  ").await.expect_err("no project");
    assert!(matches!(err, CogeeError::Configuration(_)));
}

#[tokio::test]
async fn unauthorized_project_surfaces_as_authentication_error() {
    let mut catalog = MockStorageCatalog::new();
    catalog
        .expect_list_buckets()
        .returning(|_| Err(ApiError::Unauthorized("caller lacks storage.buckets.list".into())));

    let err = list_buckets(&catalog, "not-mine").await.expect_err("denied");
    assert!(matches!(err, CogeeError::Authentication(_)));
}

#[tokio::test]
async fn prefixes_are_distinct_first_segments() {
    let mut catalog = MockStorageCatalog::new();
    catalog
        .expect_list_objects()
        .withf(|bucket: &str, prefix: &str| bucket == "imagery" && prefix.is_empty())
        .returning(|_, _| {
            Ok(vec![
                ObjectEntry::new("landsat/2020/a.tif"),
                ObjectEntry::new("landsat/2021/b.tif"),
                ObjectEntry::new("sentinel/c.tif"),
                ObjectEntry::new("index.json"),
            ])
        });

    let prefixes = list_prefixes(&catalog, "imagery", None).await;
    assert_eq!(prefixes, vec!["landsat", "sentinel"]);
}

#[tokio::test]
async fn prefixes_below_a_subfolder() {
    let mut catalog = MockStorageCatalog::new();
    catalog
        .expect_list_objects()
        .withf(|_: &str, prefix: &str| prefix == "landsat/")
        .returning(|_, _| {
            Ok(vec![
                ObjectEntry::new("landsat/2020/a.tif"),
                ObjectEntry::new("landsat/2020/b.tif"),
                ObjectEntry::new("landsat/2021/c.tif"),
            ])
        });

    let prefixes = list_prefixes(&catalog, "imagery", Some("landsat/")).await;
    assert_eq!(prefixes, vec!["2020", "2021"]);
}

#[tokio::test]
async fn prefix_without_trailing_slash_lists_the_same_folder() {
    let mut catalog = MockStorageCatalog::new();
    catalog
        .expect_list_objects()
        .withf(|_: &str, prefix: &str| prefix == "landsat/")
        .returning(|_, _| {
            Ok(vec![
                ObjectEntry::new("landsat/2020/a.tif"),
                ObjectEntry::new("landsat/2021/b.tif"),
            ])
        });

    let prefixes = list_prefixes(&catalog, "imagery", Some("landsat")).await;
    assert_eq!(prefixes, vec!["2020", "2021"]);
}

#[tokio::test]
async fn prefix_listing_soft_fails_to_empty() {
    let mut catalog = MockStorageCatalog::new();
    catalog
        .expect_list_objects()
        .returning(|_, _| Err(ApiError::Rejected { status: 403, body: "forbidden".into() }));

    let prefixes = list_prefixes(&catalog, "locked", None).await;
    assert!(prefixes.is_empty());
}
