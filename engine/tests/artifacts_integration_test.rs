//! Integration tests for artifact extraction
//!
//! Every test writes into a fresh temporary output root and checks both what
//! landed in the session directory and what did not land anywhere else.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use reqlab_engine::artifacts::ArtifactExtractor;
use sdk::errors::EngineError;

/// All regular files under `root`, relative to it, sorted
fn files_under(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

#[test]
fn test_traversal_names_are_flattened_into_session() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("generated");
    let extractor = ArtifactExtractor::new(&root);

    let reply = "Files:\n\
                 ```text:../../evil.txt\nowned\n```\n\
                 ```python:..\\..\\win.py\nprint(1)\n```\n\
                 ```/etc/passwd.txt\nroot\n```\n";

    let saved = extractor.extract_and_save(reply, "abc").unwrap();

    assert_eq!(saved.len(), 3);
    assert_eq!(
        files_under(temp.path()),
        vec!["generated/abc/evil.txt", "generated/abc/passwd.txt", "generated/abc/win.py"]
    );
    let session_dir = root.join("abc").canonicalize().unwrap();
    for path in &saved {
        assert!(path.starts_with(&session_dir), "{:?} escaped", path);
    }
    assert_eq!(fs::read_to_string(session_dir.join("evil.txt")).unwrap(), "owned");
}

#[test]
fn test_extraction_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let extractor = ArtifactExtractor::new(temp.path());
    let reply = "```python:main.py\nprint('hi')\n```\n```requirements.txt\nfastapi\n```";

    let first = extractor.extract_and_save(reply, "s1").unwrap();
    let snapshot: Vec<String> = first
        .iter()
        .map(|p| fs::read_to_string(p).unwrap())
        .collect();

    let second = extractor.extract_and_save(reply, "s1").unwrap();

    assert_eq!(first, second);
    assert_eq!(files_under(temp.path()), vec!["s1/main.py", "s1/requirements.txt"]);
    for (path, before) in second.iter().zip(snapshot) {
        assert_eq!(fs::read_to_string(path).unwrap(), before);
    }
}

#[test]
fn test_later_reply_overwrites_same_file() {
    let temp = TempDir::new().unwrap();
    let extractor = ArtifactExtractor::new(temp.path());

    extractor
        .extract_and_save("```python:main.py\nv1\n```", "s1")
        .unwrap();
    let saved = extractor
        .extract_and_save("```python:main.py\nv2\n```", "s1")
        .unwrap();

    assert_eq!(fs::read_to_string(&saved[0]).unwrap(), "v2");
}

#[test]
fn test_sessions_are_isolated() {
    let temp = TempDir::new().unwrap();
    let extractor = ArtifactExtractor::new(temp.path());

    extractor.extract_and_save("```a.txt\none\n```", "s1").unwrap();
    extractor.extract_and_save("```a.txt\ntwo\n```", "s2").unwrap();

    assert_eq!(
        fs::read_to_string(temp.path().join("s1").join("a.txt")).unwrap(),
        "one"
    );
    assert_eq!(
        fs::read_to_string(temp.path().join("s2").join("a.txt")).unwrap(),
        "two"
    );
}

#[test]
fn test_no_blocks_still_creates_nothing_outside() {
    let temp = TempDir::new().unwrap();
    let extractor = ArtifactExtractor::new(temp.path());

    let saved = extractor
        .extract_and_save("Just prose and a ```python\nsnippet\n```", "s1")
        .unwrap();

    assert!(saved.is_empty());
    assert!(files_under(temp.path()).is_empty());
}

#[test]
fn test_escaping_session_ids_rejected() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("out");
    let extractor = ArtifactExtractor::new(&root);

    for id in ["", "..", "../x", "a/b"] {
        assert!(matches!(
            extractor.extract_and_save("```a.txt\nx\n```", id),
            Err(EngineError::InvalidSessionId(_))
        ));
    }
    assert!(!root.exists());
}

#[cfg(unix)]
#[test]
fn test_symlinked_name_is_skipped_not_fatal() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("out");
    let extractor = ArtifactExtractor::new(&root);

    let session = root.join("s1");
    fs::create_dir_all(&session).unwrap();
    let target = temp.path().join("target.txt");
    fs::write(&target, "original").unwrap();
    std::os::unix::fs::symlink(&target, session.join("link.txt")).unwrap();

    let saved = extractor
        .extract_and_save("```link.txt\nhijack\n```\n```ok.txt\nfine\n```", "s1")
        .unwrap();

    assert_eq!(saved.len(), 1);
    assert!(saved[0].ends_with("ok.txt"));
    assert_eq!(fs::read_to_string(&target).unwrap(), "original");
}
