use sdk::errors::EngineError;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// SessionGuard confines generated files to one session directory.
///
/// The session directory is `<output_root>/<session_id>`, created on demand
/// and canonicalized once so later checks compare like with like (e.g.,
/// `/var` vs `/private/var` on macOS).
///
/// # Security Model
///
/// Every file name goes through three gates:
/// 1. Lexical: it must be a single plain path component (no separators,
///    no `.` or `..`)
/// 2. Canonicalization: an existing entry (including a symlink) is resolved
///    to its real location; a dangling symlink is rejected
/// 3. Containment: the resolved path must start with the session directory
#[derive(Debug, Clone)]
pub struct SessionGuard {
    session_dir: PathBuf,
}

impl SessionGuard {
    /// Open (and create if needed) the directory for `session_id` under
    /// `output_root`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidSessionId` if the id is empty or is not a
    /// single plain path component, `EngineError::Io` if the directory cannot
    /// be created, and `EngineError::PathCanonicalization` if it cannot be
    /// resolved afterwards.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use reqlab_engine::fs_guard::SessionGuard;
    ///
    /// let guard = SessionGuard::open(Path::new("/tmp/reqlab"), "demo").unwrap();
    /// assert!(guard.resolve("main.py").is_ok());
    /// assert!(guard.resolve("../main.py").is_err());
    /// ```
    pub fn open(output_root: &Path, session_id: &str) -> Result<Self, EngineError> {
        validate_session_id(session_id)?;

        let dir = output_root.join(session_id);
        fs::create_dir_all(&dir)?;

        let session_dir = dir
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(dir.clone(), e.to_string()))?;

        Ok(Self { session_dir })
    }

    /// Canonical session directory
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Resolve `file_name` to a writable path inside the session directory.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf, EngineError> {
        // Gate 1: a single plain component
        if !is_single_normal_component(file_name) {
            return Err(EngineError::PathOutsideSession(self.session_dir.join(file_name)));
        }
        let candidate = self.session_dir.join(file_name);

        // Gate 2: resolve whatever already sits at that name
        let resolved = match fs::symlink_metadata(&candidate) {
            Ok(_) => candidate
                .canonicalize()
                .map_err(|e| EngineError::PathCanonicalization(candidate.clone(), e.to_string()))?,
            Err(_) => candidate,
        };

        // Gate 3: containment
        if !resolved.starts_with(&self.session_dir) || resolved == self.session_dir {
            return Err(EngineError::PathOutsideSession(resolved));
        }

        Ok(resolved)
    }
}

/// Reject session ids that would escape (or collapse onto) the output root.
pub fn validate_session_id(session_id: &str) -> Result<(), EngineError> {
    if is_single_normal_component(session_id) {
        Ok(())
    } else {
        Err(EngineError::InvalidSessionId(session_id.to_string()))
    }
}

fn is_single_normal_component(name: &str) -> bool {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
