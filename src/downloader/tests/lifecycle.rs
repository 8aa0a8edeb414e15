use super::*;

#[tokio::test]
async fn test_setup_creates_directories() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let mocks = Mocks::default();
    let _downloader = create_test_downloader(config.clone(), &mocks).await;

    assert!(config.download.download_dir.is_dir());
    assert!(config.download.temp_dir.is_dir());
}

#[tokio::test]
async fn test_no_audio_providers_is_a_setup_error() {
    let dir = tempdir().unwrap();
    let mocks = Mocks::default();
    let mut components = mocks.components();
    components.audio.clear();

    let err = Downloader::with_components(test_config(dir.path()), components)
        .await
        .err()
        .unwrap();
    assert!(err.is_setup());
}

#[tokio::test]
async fn test_missing_transcoder_is_a_setup_error() {
    let dir = tempdir().unwrap();
    let mocks = Mocks {
        transcoder: Arc::new(MockTranscoder::new().unavailable()),
        ..Mocks::default()
    };

    let err = Downloader::with_components(test_config(dir.path()), mocks.components())
        .await
        .err()
        .unwrap();
    assert!(err.is_setup());
    assert!(!test_config(dir.path()).download.download_dir.exists());
}

#[tokio::test]
async fn test_scan_for_songs_populates_known_files() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.processing.scan_for_songs = true;
    config.download.overwrite = Overwrite::Skip;

    let existing = config.download.download_dir.join("Some Other Name.mp3");
    write_file(&existing, "previous run");
    let mocks = Mocks::default();
    mocks
        .embedder
        .tag_file(&existing, "https://open.spotify.com/track/1");

    let downloader = create_test_downloader(config, &mocks).await;
    assert_eq!(
        downloader
            .known_files()
            .lookup("https://open.spotify.com/track/1")
            .await,
        vec![existing]
    );

    let outcomes = downloader.download_all(vec![track("1", "Song")]).await.unwrap();
    assert_eq!(outcomes[0].path, None);
    assert_eq!(mocks.audio.fetch_calls(), 0);
}

#[tokio::test]
async fn test_detector_ignored_unless_enabled() {
    let dir = tempdir().unwrap();
    let mocks = Mocks {
        detector: Some(Arc::new(MockSegments::found(Vec::new()))),
        ..Mocks::default()
    };
    let downloader = create_test_downloader(test_config(dir.path()), &mocks).await;

    assert!(!downloader.services.post_processor.is_enabled());
}

#[test]
fn test_unknown_provider_names_are_rejected() {
    let mut config = Config::default();
    config.providers.audio_providers = vec!["napster".into()];

    let err = Components::from_config(&config).err().unwrap();
    assert!(matches!(err, Error::Config { .. }));
}
