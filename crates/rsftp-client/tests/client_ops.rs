//! Remote filesystem operations, cache behavior and completion against
//! the in-memory remote session.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rsftp_client::client::Client;
use rsftp_core::{Error, RemoteSession};
use rsftp_test_utils::MockRemoteSession;

async fn client_for(mock: &Arc<MockRemoteSession>, local_cwd: &Path) -> Client {
    let client = Client::new(Arc::clone(mock) as Arc<dyn RemoteSession>).await;
    client
        .local_chdir(&local_cwd.display().to_string())
        .await
        .expect("local chdir");
    client
}

#[tokio::test]
async fn list_hits_the_cache_within_ttl() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_file("/srv/a.txt", b"a");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    let first = client.list("/srv").await.unwrap();
    let second = client.list("/srv").await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(mock.read_dir_calls(), 1, "second list should hit the cache");
}

#[tokio::test(start_paused = true)]
async fn cache_expires_after_ttl() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_file("/srv/a.txt", b"a");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.list("/srv").await.unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    client.list("/srv").await.unwrap();
    assert_eq!(mock.read_dir_calls(), 2);
}

#[tokio::test]
async fn mkdir_invalidates_the_parent_listing() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_dir("/srv");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.list("/srv").await.unwrap();
    client.mkdir("/srv/newdir").await.unwrap();
    let entries = client.list("/srv").await.unwrap();

    assert_eq!(mock.read_dir_calls(), 2, "mkdir must drop the cached parent");
    assert!(entries.iter().any(|e| e.name == "newdir"));
}

#[tokio::test]
async fn upload_invalidates_the_parent_listing() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_dir("/srv");

    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("new.txt"), b"n").unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.list("/srv").await.unwrap();
    client.upload("new.txt", "/srv/new.txt").await.unwrap();
    let entries = client.list("/srv").await.unwrap();

    assert_eq!(mock.read_dir_calls(), 2);
    assert!(entries.iter().any(|e| e.name == "new.txt"));
}

#[tokio::test]
async fn chdir_verifies_and_clears_the_cache() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_dir("/srv/www");
    mock.add_file("/srv/file.txt", b"f");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.list("/srv").await.unwrap();
    client.chdir("/srv/www").await.unwrap();
    assert_eq!(client.getwd(), "/srv/www");

    // The whole cache went with the chdir.
    client.list("/srv").await.unwrap();
    assert_eq!(mock.read_dir_calls(), 2);

    // A file target is rejected and the CWD stays put.
    let err = client.chdir("/srv/file.txt").await.unwrap_err();
    assert!(matches!(err, Error::NotADirectory { .. }));
    assert_eq!(client.getwd(), "/srv/www");

    // Relative chdir resolves against the current directory.
    client.chdir("..").await.unwrap();
    assert_eq!(client.getwd(), "/srv");

    // cd with no argument goes home.
    client.chdir("~").await.unwrap();
    assert_eq!(client.getwd(), "/home/me");
}

#[tokio::test]
async fn completion_lists_prefix_matches_with_dir_suffix() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_dir("/home/me/src");
    mock.add_dir("/home/me/srv");
    mock.add_file("/home/me/readme.txt", b"r");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    let candidates = client.list_completion("sr").await;
    assert_eq!(candidates, vec!["src/", "srv/"]);

    // Case-sensitive: nothing matches an uppercase prefix.
    assert!(client.list_completion("SR").await.is_empty());

    // The user's relative prefix is preserved in the candidates.
    mock.add_file("/home/me/src/main.rs", b"m");
    let candidates = client.list_completion("src/ma").await;
    assert_eq!(candidates, vec!["src/main.rs"]);

    // Files complete without the trailing slash.
    let candidates = client.list_completion("read").await;
    assert_eq!(candidates, vec!["readme.txt"]);
}

#[tokio::test]
async fn remove_file_and_recursive_remove() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_file("/work/keep.txt", b"k");
    mock.add_file("/work/tree/a.txt", b"a");
    mock.add_file("/work/tree/sub/b.txt", b"b");
    mock.add_dir("/work/tree/empty");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.remove("/work/tree").await.unwrap();
    assert!(!mock.exists("/work/tree"));
    assert!(!mock.exists("/work/tree/sub"));
    assert!(!mock.exists("/work/tree/sub/b.txt"));
    assert!(mock.exists("/work/keep.txt"));

    client.remove("/work/keep.txt").await.unwrap();
    assert!(!mock.exists("/work/keep.txt"));

    let err = client.remove("/work/absent").await.unwrap_err();
    assert!(err.to_string().contains("stat remote"));
}

#[tokio::test]
async fn rename_moves_and_invalidates() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_file("/a/old.txt", b"o");
    mock.add_dir("/b");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.list("/a").await.unwrap();
    client.list("/b").await.unwrap();
    client.rename("/a/old.txt", "/b/new.txt").await.unwrap();

    assert!(!mock.exists("/a/old.txt"));
    assert_eq!(mock.file_content("/b/new.txt").unwrap(), b"o");

    // Both parents were invalidated.
    client.list("/a").await.unwrap();
    client.list("/b").await.unwrap();
    assert_eq!(mock.read_dir_calls(), 4);
}

#[tokio::test]
async fn stat_resolves_relative_paths() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_file("/home/me/notes.txt", b"12345");

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    let stat = client.stat("notes.txt").await.unwrap();
    assert!(!stat.is_dir());
    assert_eq!(stat.size, 5);
}

#[tokio::test]
async fn execute_remote_runs_from_the_remote_cwd() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    mock.add_dir("/home/me/proj");
    mock.set_exec_result(b"total 0\n", b"", 0);

    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;
    client.chdir("proj").await.unwrap();

    let mut stdin: &[u8] = b"unused input";
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let status = client
        .execute_remote("ls -la", Some(&mut stdin), &mut stdout, &mut stderr)
        .await
        .unwrap();

    assert_eq!(status, 0);
    assert_eq!(stdout, b"total 0\n");
    assert_eq!(
        mock.exec_log(),
        vec![(
            "cd /home/me/proj && ls -la".to_string(),
            b"unused input".to_vec()
        )]
    );
}

#[tokio::test]
async fn local_operations_mirror_remote_ones() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.local_mkdir("made").await.unwrap();
    assert!(tmp.path().join("made").is_dir());

    fs::write(tmp.path().join("f.txt"), b"f").unwrap();
    let entries = client.local_list("").await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["f.txt", "made"]);

    client.local_chdir("made").await.unwrap();
    assert_eq!(client.get_local_wd(), tmp.path().join("made"));

    let err = client.local_chdir("f.txt").await.unwrap_err();
    assert!(err.to_string().contains("stat local"));
}

#[tokio::test]
async fn session_close_tears_down_the_remote() {
    let mock = Arc::new(MockRemoteSession::new("/home/me"));
    let tmp = tempfile::tempdir().unwrap();
    let client = client_for(&mock, tmp.path()).await;

    client.close().await.unwrap();
    assert!(mock.is_closed());
}
