use super::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path as url_path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn reads_intervals_from_env_or_default() {
    assert_eq!(read_u64_env("NO_SUCH_ENV_FOR_TEST", 250), 250);
}

#[test]
fn default_debounce_matches_watcher_window() {
    assert_eq!(
        Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        DEFAULT_DEBOUNCE_WINDOW
    );
}

#[test]
fn tracking_path_lives_under_data_dir() {
    let config = DaemonConfig {
        data_dir: PathBuf::from("/var/lib/drivesync"),
        roots: Vec::new(),
        debounce_window: Duration::from_millis(250),
    };
    assert_eq!(
        config.tracking_path(),
        PathBuf::from("/var/lib/drivesync/sync_tracking.json")
    );
}

#[test]
fn missing_roots_file_means_no_folders() {
    let dir = TempDir::new().expect("tempdir");
    let roots = load_roots_file(&dir.path().join("synced_folders.json")).expect("load roots");
    assert!(roots.is_empty());
}

#[test]
fn roots_file_parses_as_json_array_of_paths() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("synced_folders.json");
    std::fs::write(&path, br#"["/home/user/docs", "/srv/shared"]"#).expect("write roots");

    let roots = load_roots_file(&path).expect("parse roots");
    assert_eq!(
        roots,
        vec![PathBuf::from("/home/user/docs"), PathBuf::from("/srv/shared")]
    );
}

#[test]
fn malformed_roots_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("synced_folders.json");
    std::fs::write(&path, b"{oops").expect("write garbage");
    assert!(load_roots_file(&path).is_err());
}

#[tokio::test]
async fn dispatch_routes_changes_and_removals_to_the_engine() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(url_path("/drive/v3/files"))
        .and(query_param(
            "q",
            "name='docs' and trashed=false and mimeType='application/vnd.google-apps.folder'",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{"id": "ROOT1", "name": "docs"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(url_path("/drive/v3/files"))
        .and(query_param(
            "q",
            "name='a.txt' and 'ROOT1' in parents and trashed=false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": []
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(url_path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "F1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(url_path("/upload/drive/v3/files/F1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "F1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(url_path("/drive/v3/files/F1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let state = TempDir::new().expect("state dir");
    let tracking = TrackingStore::open(state.path().join("sync_tracking.json"))
        .await
        .expect("open tracking");
    let client = DriveClient::with_base_url(&server.uri(), "test-token").expect("client");
    let engine = Arc::new(SyncEngine::new(client, tracking));

    let dir = TempDir::new().expect("tempdir");
    let docs = dir.path().join("docs");
    std::fs::create_dir_all(&docs).expect("mkdir docs");
    let file = docs.join("a.txt");
    std::fs::write(&file, b"payload").expect("write file");

    engine
        .register_folder(&docs, None)
        .await
        .expect("register docs");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    events_tx
        .send(ChangeEvent::Changed(file.clone()))
        .expect("send change");
    events_tx
        .send(ChangeEvent::Removed(file.clone()))
        .expect("send removal");
    drop(events_tx);
    dispatch_events(Arc::clone(&engine), events_rx).await;

    assert_eq!(engine.tracking().file_entry(&file).await, None);
}
