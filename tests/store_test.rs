use spotify_auth::{TokenStore, types::TokenRecord};
use tempfile::TempDir;

fn record() -> TokenRecord {
    TokenRecord {
        access_token: "access-value".to_string(),
        refresh_token: "refresh-value".to_string(),
        expires_at: 1_900_000_000_000,
    }
}

#[tokio::test]
async fn test_load_without_file_is_none() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path().join("tokens.json"));

    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path().join("nested/tokens.json"));

    store.save(&record()).await.unwrap();
    assert_eq!(store.load().await.unwrap(), Some(record()));

    // No temp file left next to the record
    assert!(!dir.path().join("nested/tokens.json.tmp").exists());
}

#[tokio::test]
async fn test_file_uses_camel_case_fields() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path().join("tokens.json"));
    store.save(&record()).await.unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["accessToken"], "access-value");
    assert_eq!(json["refreshToken"], "refresh-value");
    assert_eq!(json["expiresAt"], 1_900_000_000_000_i64);
}

#[tokio::test]
async fn test_save_replaces_previous_record() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path().join("tokens.json"));
    store.save(&record()).await.unwrap();

    let newer = TokenRecord {
        access_token: "newer-access".to_string(),
        ..record()
    };
    store.save(&newer).await.unwrap();

    assert_eq!(store.load().await.unwrap(), Some(newer));
}

#[cfg(unix)]
#[tokio::test]
async fn test_permissions_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let token_dir = dir.path().join(".spotify-auth");
    let store = TokenStore::new(token_dir.join("tokens.json"));
    store.save(&record()).await.unwrap();

    let dir_mode = std::fs::metadata(&token_dir).unwrap().permissions().mode();
    let file_mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700);
    assert_eq!(file_mode & 0o777, 0o600);
}

#[cfg(unix)]
#[tokio::test]
async fn test_existing_directory_is_tightened() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let token_dir = dir.path().join("open");
    std::fs::create_dir(&token_dir).unwrap();
    std::fs::set_permissions(&token_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

    let store = TokenStore::new(token_dir.join("tokens.json"));
    store.save(&record()).await.unwrap();

    let dir_mode = std::fs::metadata(&token_dir).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700);
}

#[tokio::test]
async fn test_corrupt_file_is_a_storage_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = TokenStore::new(&path).load().await.unwrap_err();
    assert_eq!(err.kind(), spotify_auth::AuthErrorKind::Storage);
}

#[tokio::test]
async fn test_clear_removes_record() {
    let dir = TempDir::new().unwrap();
    let store = TokenStore::new(dir.path().join("tokens.json"));
    store.save(&record()).await.unwrap();

    store.clear().await.unwrap();
    assert_eq!(store.load().await.unwrap(), None);

    // Clearing twice is fine
    store.clear().await.unwrap();
}
