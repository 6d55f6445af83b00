//! Service integration tests for immediate mode.
//!
//! Tests verify:
//! - Rendering into storage and the recorded descriptor
//! - Cache hits and idempotence (no second read or write)
//! - Key determinism and sensitivity
//! - Missing and unreadable sources with and without placeholders

use lazythumb::error::{IoError, ThumbnailError};
use lazythumb::io::SourceRef;
use lazythumb::thumbnail::{Options, ThumbnailSettings, ThumbnailStatus};

use super::test_utils::{
    create_test_jpeg, create_test_png, decoded_size, immediate_settings, MockSourceStore,
    TestHarness, STORAGE_URL,
};

fn cat() -> SourceRef {
    SourceRef::key("photos/cat.jpg")
}

fn harness_with_cat(width: u32, height: u32) -> TestHarness {
    let sources = MockSourceStore::new().with_source(cat(), create_test_jpeg(width, height));
    TestHarness::new(sources, immediate_settings())
}

fn crop(value: &str) -> Options {
    let mut options = Options::new();
    options.insert("crop", value);
    options
}

// =============================================================================
// Generation
// =============================================================================

#[tokio::test]
async fn test_center_crop_generates_exact_size() {
    let harness = harness_with_cat(800, 600);

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", crop("center"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thumbnail.status, ThumbnailStatus::Generated);
    assert_eq!(thumbnail.size, Some((200, 200)));
    assert_eq!(thumbnail.geometry, "200x200");

    let name = thumbnail.name.clone().unwrap();
    assert_eq!(thumbnail.url, Some(format!("{}{}", STORAGE_URL, name)));

    let (data, metadata) = harness.storage.get(&name).await.unwrap();
    assert_eq!(decoded_size(&data), (200, 200));
    assert_eq!(metadata.content_type, "image/jpeg");
    assert_eq!((metadata.width, metadata.height), (200, 200));

    assert_eq!(harness.sources.open_count(), 1);
    assert_eq!(harness.storage.write_count(), 1);
    assert_eq!(harness.kv.thumbnail_sets(), 1);
}

#[tokio::test]
async fn test_geometry_variants() {
    let harness = harness_with_cat(800, 600);

    let cases = [
        ("200x200", Options::new(), (200, 150)),
        ("x150", Options::new(), (200, 150)),
        ("400", Options::new(), (400, 300)),
        ("100x100", crop("noop"), (133, 100)),
    ];

    for (geometry, options, expected) in cases {
        let thumbnail = harness
            .service
            .get_thumbnail(Some(&cat()), geometry, options)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(thumbnail.size, Some(expected), "geometry {}", geometry);

        let (data, _) = harness
            .storage
            .get(thumbnail.name.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(decoded_size(&data), expected, "geometry {}", geometry);
    }
}

#[tokio::test]
async fn test_no_upscale_keeps_source_size() {
    let harness = harness_with_cat(150, 100);
    let mut options = crop("center");
    options.insert("upscale", false);

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "300x300", options)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thumbnail.size, Some((150, 100)));
}

#[tokio::test]
async fn test_preserve_format() {
    let source = SourceRef::key("photos/logo.png");
    let sources = MockSourceStore::new().with_source(source.clone(), create_test_png(300, 300));
    let settings = ThumbnailSettings {
        preserve_format: true,
        ..immediate_settings()
    };
    let harness = TestHarness::new(sources, settings);

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&source), "100x100", Options::new())
        .await
        .unwrap()
        .unwrap();

    let name = thumbnail.name.unwrap();
    assert!(name.ends_with(".png"), "{}", name);
    let (data, metadata) = harness.storage.get(&name).await.unwrap();
    assert_eq!(metadata.content_type, "image/png");
    assert_eq!(
        image::guess_format(&data).unwrap(),
        image::ImageFormat::Png
    );
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn test_second_request_hits_cache() {
    let harness = harness_with_cat(800, 600);

    let first = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", crop("center"))
        .await
        .unwrap()
        .unwrap();
    let second = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", crop("center"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(second.status, ThumbnailStatus::Cached);
    assert_eq!(first.key, second.key);
    assert_eq!(first.url, second.url);
    assert_eq!(second.size, Some((200, 200)));

    assert_eq!(harness.sources.open_count(), 1);
    assert_eq!(harness.storage.write_count(), 1);
}

#[tokio::test]
async fn test_object_in_storage_is_not_rendered_again() {
    let harness = harness_with_cat(800, 600);
    let key = harness
        .service
        .cache_key(&cat(), "200x200", Options::new())
        .unwrap();
    harness.storage.preload(&key.name).await;

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", Options::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thumbnail.status, ThumbnailStatus::Existing);
    assert_eq!(thumbnail.key.as_deref(), Some(key.key.as_str()));
    assert_eq!(harness.sources.open_count(), 0);
    assert_eq!(harness.storage.write_count(), 0);

    // Recorded for the next lookup
    let again = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", Options::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.status, ThumbnailStatus::Cached);
}

#[tokio::test]
async fn test_force_overwrite_renders_over_existing_object() {
    let sources = MockSourceStore::new().with_source(cat(), create_test_jpeg(800, 600));
    let settings = ThumbnailSettings {
        force_overwrite: true,
        ..immediate_settings()
    };
    let harness = TestHarness::new(sources, settings);
    let key = harness
        .service
        .cache_key(&cat(), "200x200", Options::new())
        .unwrap();
    harness.storage.preload(&key.name).await;

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", Options::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thumbnail.status, ThumbnailStatus::Generated);
    assert_eq!(harness.storage.write_count(), 1);
}

// =============================================================================
// Keys
// =============================================================================

#[tokio::test]
async fn test_keys_are_deterministic() {
    let harness = harness_with_cat(10, 10);

    let mut a = Options::new();
    a.insert("crop", "center");
    a.insert("quality", 80);
    let mut b = Options::new();
    b.insert("quality", 80);
    b.insert("crop", "center");

    let key_a = harness.service.cache_key(&cat(), "200x200", a).unwrap();
    let key_b = harness.service.cache_key(&cat(), "200x200", b).unwrap();
    assert_eq!(key_a, key_b);

    // Spelling out a default does not change the key
    let mut explicit = Options::new();
    explicit.insert("quality", 95);
    explicit.insert("orientation", true);
    let implicit = harness
        .service
        .cache_key(&cat(), "200x200", Options::new())
        .unwrap();
    let spelled = harness
        .service
        .cache_key(&cat(), "200x200", explicit)
        .unwrap();
    assert_eq!(implicit, spelled);

    let k = &implicit.key;
    assert_eq!(k.len(), 32);
    assert_eq!(
        implicit.name,
        format!("cache/{}/{}/{}.jpg", &k[0..2], &k[2..4], k)
    );
}

#[tokio::test]
async fn test_equivalent_option_spellings_share_key() {
    let harness = harness_with_cat(10, 10);
    let default_key = harness
        .service
        .cache_key(&cat(), "200x200", Options::new())
        .unwrap();

    for spelling in ["jpeg", "jpg", "JPEG"] {
        let mut options = Options::new();
        options.insert("format", spelling);
        let key = harness
            .service
            .cache_key(&cat(), "200x200", options)
            .unwrap();
        assert_eq!(key, default_key, "{}", spelling);
    }

    let mut crop_flag = Options::new();
    crop_flag.insert("crop", true);
    assert_eq!(
        harness
            .service
            .cache_key(&cat(), "200x200", crop_flag)
            .unwrap(),
        harness
            .service
            .cache_key(&cat(), "200x200", crop("center"))
            .unwrap()
    );
}

#[tokio::test]
async fn test_keys_are_sensitive_to_every_input() {
    let harness = harness_with_cat(10, 10);
    let base = harness
        .service
        .cache_key(&cat(), "200x200", Options::new())
        .unwrap();

    let other_geometry = harness
        .service
        .cache_key(&cat(), "200x201", Options::new())
        .unwrap();
    let other_options = harness
        .service
        .cache_key(&cat(), "200x200", crop("center"))
        .unwrap();
    let other_source = harness
        .service
        .cache_key(&SourceRef::key("photos/dog.jpg"), "200x200", Options::new())
        .unwrap();
    let mut png = Options::new();
    png.insert("format", "PNG");
    let other_format = harness
        .service
        .cache_key(&cat(), "200x200", png)
        .unwrap();
    let other_kind = harness
        .service
        .cache_key(&SourceRef::url("photos/cat.jpg"), "200x200", Options::new())
        .unwrap();

    for other in [
        other_geometry,
        other_options,
        other_format,
        other_source,
        other_kind,
    ] {
        assert_ne!(base.key, other.key);
    }
}

// =============================================================================
// Invalid Requests
// =============================================================================

#[tokio::test]
async fn test_invalid_geometry_is_rejected() {
    let harness = harness_with_cat(800, 600);

    for geometry in ["", "abc", "0x0", "x", "10x-5", "12.5x10"] {
        let result = harness
            .service
            .get_thumbnail(Some(&cat()), geometry, Options::new())
            .await;
        assert!(
            matches!(result, Err(ThumbnailError::InvalidGeometry { .. })),
            "geometry {:?}",
            geometry
        );
    }
    assert_eq!(harness.sources.open_count(), 0);
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let harness = harness_with_cat(800, 600);

    let mut quality = Options::new();
    quality.insert("quality", 0);
    let mut format = Options::new();
    format.insert("format", "BMP");
    let mut cropbox = Options::new();
    cropbox.insert("cropbox", "10,10,5,5");

    for options in [quality, format, cropbox, crop("sideways")] {
        let result = harness
            .service
            .get_thumbnail(Some(&cat()), "100x100", options)
            .await;
        assert!(matches!(
            result,
            Err(ThumbnailError::InvalidOptions { .. })
        ));
    }
    assert_eq!(harness.storage.write_count(), 0);
}

// =============================================================================
// Missing Sources
// =============================================================================

#[tokio::test]
async fn test_missing_source_without_dummy() {
    let harness = TestHarness::new(MockSourceStore::new(), immediate_settings());

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", Options::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thumbnail.status, ThumbnailStatus::NotFound);
    assert!(thumbnail.url.is_none());
    assert!(thumbnail.size.is_none());
    assert_eq!(harness.storage.write_count(), 0);
    assert_eq!(harness.kv.total_sets(), 0);

    // Nothing was cached, so the next request reads again
    harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", Options::new())
        .await
        .unwrap();
    assert_eq!(harness.sources.open_count(), 2);
}

#[tokio::test]
async fn test_unreadable_source_without_dummy() {
    for error in [
        IoError::Connection("connection reset".to_string()),
        IoError::Storage("internal error".to_string()),
    ] {
        let sources = MockSourceStore::new().with_failure(cat(), error.clone());
        let harness = TestHarness::new(sources, immediate_settings());

        let thumbnail = harness
            .service
            .get_thumbnail(Some(&cat()), "200x200", Options::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(thumbnail.status, ThumbnailStatus::NotFound, "{}", error);
        assert!(thumbnail.url.is_none());
        assert_eq!(harness.sources.open_count(), 1);
        assert_eq!(harness.storage.write_count(), 0);
        assert_eq!(harness.kv.total_sets(), 0);
    }
}

#[tokio::test]
async fn test_unreadable_source_with_dummy() {
    let sources = MockSourceStore::new()
        .with_failure(cat(), IoError::Connection("timed out".to_string()));
    let settings = ThumbnailSettings {
        dummy: true,
        ..immediate_settings()
    };
    let harness = TestHarness::new(sources, settings);

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "120x80", Options::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thumbnail.status, ThumbnailStatus::Dummy);
    assert_eq!(thumbnail.size, Some((120, 80)));
    assert_eq!(
        thumbnail.url.as_deref(),
        Some("http://dummyimage.com/120x80")
    );
    assert_eq!(harness.storage.write_count(), 0);
    assert_eq!(harness.kv.total_sets(), 0);
}

#[tokio::test]
async fn test_undecodable_source_is_treated_as_missing() {
    let sources = MockSourceStore::new().with_source(cat(), b"not an image".to_vec());
    let harness = TestHarness::new(sources, immediate_settings());

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", Options::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thumbnail.status, ThumbnailStatus::NotFound);
    assert_eq!(harness.kv.total_sets(), 0);
    assert_eq!(harness.storage.write_count(), 0);
}

#[tokio::test]
async fn test_missing_source_with_dummy() {
    let settings = ThumbnailSettings {
        dummy: true,
        ..immediate_settings()
    };
    let harness = TestHarness::new(MockSourceStore::new(), settings);

    let thumbnail = harness
        .service
        .get_thumbnail(Some(&cat()), "200", Options::new())
        .await
        .unwrap()
        .unwrap();

    assert!(thumbnail.is_dummy());
    assert_eq!(thumbnail.geometry, "200");
    assert_eq!(thumbnail.size, Some((200, 133)));
    assert_eq!(
        thumbnail.url.as_deref(),
        Some("http://dummyimage.com/200x133")
    );
    assert!(thumbnail.key.is_none());
    assert_eq!(harness.kv.total_sets(), 0);
}

#[tokio::test]
async fn test_absent_or_unsupported_source() {
    let harness = TestHarness::new(MockSourceStore::new(), immediate_settings());

    let none = harness
        .service
        .get_thumbnail(None, "200x200", Options::new())
        .await
        .unwrap();
    assert!(none.is_none());

    let unsupported = harness
        .service
        .get_thumbnail(
            Some(&SourceRef::path("/tmp/cat.jpg")),
            "200x200",
            Options::new(),
        )
        .await
        .unwrap();
    assert!(unsupported.is_none());
    assert_eq!(harness.sources.open_count(), 0);

    let settings = ThumbnailSettings {
        dummy: true,
        ..immediate_settings()
    };
    let harness = TestHarness::new(MockSourceStore::new(), settings);
    let dummy = harness
        .service
        .get_thumbnail(None, "x90", Options::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dummy.status, ThumbnailStatus::Dummy);
    assert_eq!(dummy.size, Some((135, 90)));
}
