use ordo_util::fs::{find_ancestor_with, read_text};
use tempfile::TempDir;

#[test]
fn test_find_ancestor_with_direct() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("ordo-index.toml"), "").unwrap();
    let result = find_ancestor_with(tmp.path(), "ordo-index.toml");
    assert_eq!(result, Some(tmp.path().to_path_buf()));
}

#[test]
fn test_find_ancestor_with_nested() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("ordo-index.toml"), "").unwrap();
    let nested = tmp.path().join("a").join("b").join("c");
    std::fs::create_dir_all(&nested).unwrap();
    let result = find_ancestor_with(&nested, "ordo-index.toml");
    assert_eq!(result, Some(tmp.path().to_path_buf()));
}

#[test]
fn test_find_ancestor_with_missing() {
    let tmp = TempDir::new().unwrap();
    let result = find_ancestor_with(tmp.path(), "definitely-not-here-ordo.toml");
    assert!(result.is_none());
}

#[test]
fn test_read_text_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("note.txt");
    std::fs::write(&path, "hello").unwrap();
    assert_eq!(read_text(&path).unwrap(), "hello");
}

#[test]
fn test_read_text_missing_names_path() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("absent.txt");
    let err = read_text(&path).unwrap_err();
    assert!(err.to_string().contains("absent.txt"), "got: {err}");
}
