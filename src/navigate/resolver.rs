//! Sandbox path resolution
//!
//! Every user operates inside `<storage_root>/user_<id>`. Incoming relative
//! paths are filtered segment by segment and then verified against the
//! canonical user root, so neither `..` nor a symlink can lead outside it.

use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, StorageError};
use crate::navigate::results::ResolvedDir;
use crate::user::UserId;

/// Directory under the storage root where uploads are written before they
/// are renamed into a user directory. Never a valid `user_<id>` name.
pub const STAGING_DIR: &str = ".staging";

/// Maps user-relative paths onto directories under the storage root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    storage_root: PathBuf,
}

impl PathResolver {
    /// Anchors the resolver at the canonical form of `storage_root`,
    /// creating the directory first if it does not exist.
    pub fn new(storage_root: impl AsRef<Path>) -> Result<Self> {
        let storage_root = storage_root.as_ref();

        if !storage_root.exists() {
            info!("Creating storage root: {}", storage_root.display());
            fs::create_dir_all(storage_root)?;
        }

        let storage_root = storage_root.canonicalize()?;
        if !storage_root.is_dir() {
            return Err(StorageError::InvalidPath(format!(
                "storage root is not a directory: {}",
                storage_root.display()
            )));
        }

        Ok(Self { storage_root })
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Location of a user's directory. Does not touch the filesystem.
    pub fn user_root_path(&self, user: UserId) -> PathBuf {
        self.storage_root.join(user.dir_name())
    }

    /// Returns the user's directory, creating it on first access.
    ///
    /// The directory must be a real directory directly under the storage
    /// root; a symlink in its place is rejected.
    pub fn user_root(&self, user: UserId) -> Result<PathBuf> {
        let user_root = self.user_root_path(user);
        if ensure_real_dir(&user_root)? {
            info!("Created directory for user {}: {}", user, user_root.display());
        }
        Ok(user_root)
    }

    /// Returns the upload staging directory, creating it on first access.
    /// It sits on the same filesystem as every user directory, so a staged
    /// upload can be renamed into place.
    pub fn staging_dir(&self) -> Result<PathBuf> {
        let staging = self.storage_root.join(STAGING_DIR);
        if ensure_real_dir(&staging)? {
            debug!("Created staging directory {}", staging.display());
        }
        Ok(staging)
    }

    /// Resolves `relative_path` inside the user's sandbox, creating every
    /// missing directory along the way. An empty path is the user root.
    pub fn resolve(&self, user: UserId, relative_path: &str) -> Result<ResolvedDir> {
        let user_root = self.user_root(user)?;
        let canonical_root = user_root
            .canonicalize()
            .map_err(|e| StorageError::InvalidPath(format!("{}: {e}", user_root.display())))?;

        let segments = safe_segments(relative_path)?;
        let mut current = canonical_root.clone();

        for segment in &segments {
            let next = current.join(segment);

            match fs::create_dir(&next) {
                Ok(()) => debug!("Created directory {}", next.display()),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(StorageError::Io(e)),
            }

            // Containment is checked after each step so a symlinked segment
            // is caught before anything is created beneath it.
            current = next
                .canonicalize()
                .map_err(|_| StorageError::InvalidPath(relative_path.to_string()))?;

            if !current.starts_with(&canonical_root) {
                warn!(
                    "Path traversal attempt by user {}: {:?} resolved to {}",
                    user,
                    relative_path,
                    current.display()
                );
                return Err(StorageError::InvalidPath(relative_path.to_string()));
            }

            if !current.is_dir() {
                return Err(StorageError::InvalidPath(format!(
                    "{relative_path}: {segment} is not a directory"
                )));
            }
        }

        Ok(ResolvedDir {
            relative_path: segments.join("/"),
            real_path: current,
        })
    }

    /// Direct child of the user root named `name`, used for stored-name
    /// lookups. Anything that is not a plain single name is reported as
    /// missing; no directory beyond the user root is ever consulted.
    pub fn user_entry(&self, user: UserId, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(self.user_root(user)?.join(name))
    }
}

/// Creates `path` if it is missing and checks that it is a directory and
/// not a symlink. Returns whether it was created.
fn ensure_real_dir(path: &Path) -> Result<bool> {
    let created = match fs::create_dir(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => false,
        Err(e) => return Err(StorageError::Io(e)),
    };

    let file_type = fs::symlink_metadata(path)?.file_type();
    if file_type.is_symlink() {
        warn!("Refusing symlinked storage directory {}", path.display());
        return Err(StorageError::InvalidPath(format!(
            "{} is a symlink",
            path.display()
        )));
    }
    if !file_type.is_dir() {
        return Err(StorageError::InvalidPath(format!(
            "{} is not a directory",
            path.display()
        )));
    }

    Ok(created)
}

/// Splits a relative path into the segments that are safe to join onto a
/// user root. `.`, `..`, empty segments and anything that is not a plain
/// name (drive prefixes, root markers) are dropped; control characters are
/// rejected outright.
pub(crate) fn safe_segments(relative_path: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();

    for segment in relative_path.split(['/', '\\']) {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        if segment.chars().any(char::is_control) {
            return Err(StorageError::InvalidPath(relative_path.to_string()));
        }
        if is_plain_name(segment) {
            segments.push(segment.to_string());
        }
    }

    Ok(segments)
}

/// True when `name` is exactly one normal path component.
pub(crate) fn is_plain_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) || name.chars().any(char::is_control) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_resolver() -> (TempDir, PathResolver) {
        let temp_dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp_dir.path().join("storage")).unwrap();
        (temp_dir, resolver)
    }

    #[test]
    fn test_new_creates_storage_root() {
        let (temp_dir, resolver) = setup_resolver();
        assert!(temp_dir.path().join("storage").is_dir());
        assert!(resolver.storage_root().is_absolute());
    }

    #[test]
    fn test_empty_path_is_user_root() {
        let (_temp_dir, resolver) = setup_resolver();
        let user = UserId::new(7);

        let resolved = resolver.resolve(user, "").unwrap();

        assert_eq!(resolved.relative_path, "");
        assert_eq!(resolved.real_path, resolver.storage_root().join("user_7"));
        assert!(resolved.real_path.is_dir());
    }

    #[test]
    fn test_resolve_creates_nested_directories() {
        let (_temp_dir, resolver) = setup_resolver();
        let user = UserId::new(1);

        let resolved = resolver.resolve(user, "docs/2024/taxes").unwrap();

        assert_eq!(resolved.relative_path, "docs/2024/taxes");
        assert!(resolved.real_path.is_dir());
        assert!(resolved.real_path.ends_with("user_1/docs/2024/taxes"));
    }

    #[test]
    fn test_dot_segments_are_dropped() {
        let (_temp_dir, resolver) = setup_resolver();
        let user = UserId::new(1);

        let resolved = resolver.resolve(user, "../../etc/./passwd/..").unwrap();

        assert_eq!(resolved.relative_path, "etc/passwd");
        assert!(resolved.real_path.starts_with(resolver.user_root_path(user)));
    }

    #[test]
    fn test_absolute_and_backslash_segments_stay_inside() {
        let (_temp_dir, resolver) = setup_resolver();
        let user = UserId::new(3);

        let resolved = resolver.resolve(user, "/var/tmp").unwrap();
        assert_eq!(resolved.relative_path, "var/tmp");

        let resolved = resolver.resolve(user, "..\\..\\windows\\system32").unwrap();
        assert_eq!(resolved.relative_path, "windows/system32");
        assert!(resolved.real_path.starts_with(resolver.user_root_path(user)));
    }

    #[test]
    fn test_control_characters_rejected() {
        let (_temp_dir, resolver) = setup_resolver();
        let result = resolver.resolve(UserId::new(1), "bad\0name");
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[test]
    fn test_file_in_the_way_is_invalid() {
        let (_temp_dir, resolver) = setup_resolver();
        let user = UserId::new(1);
        let root = resolver.user_root(user).unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();

        let result = resolver.resolve(user, "notes.txt/sub");

        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected_without_creating_outside() {
        let (temp_dir, resolver) = setup_resolver();
        let user = UserId::new(9);
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let root = resolver.user_root(user).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();

        let result = resolver.resolve(user, "escape/newdir");

        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
        assert!(!outside.join("newdir").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_user_directory_rejected() {
        let (temp_dir, resolver) = setup_resolver();
        let user = UserId::new(4);
        let outside = temp_dir.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, resolver.user_root_path(user)).unwrap();

        assert!(matches!(resolver.user_root(user), Err(StorageError::InvalidPath(_))));
        assert!(matches!(resolver.resolve(user, "docs"), Err(StorageError::InvalidPath(_))));
        assert!(!outside.join("docs").exists());
    }

    #[test]
    fn test_file_in_place_of_user_directory_rejected() {
        let (_temp_dir, resolver) = setup_resolver();
        let user = UserId::new(5);
        fs::write(resolver.user_root_path(user), b"x").unwrap();

        assert!(matches!(resolver.user_root(user), Err(StorageError::InvalidPath(_))));
    }

    #[test]
    fn test_staging_dir_is_outside_user_trees() {
        let (_temp_dir, resolver) = setup_resolver();

        let staging = resolver.staging_dir().unwrap();

        assert!(staging.is_dir());
        assert_eq!(staging.parent().unwrap(), resolver.storage_root());
        assert!(!staging.starts_with(resolver.user_root_path(UserId::new(0))));
    }

    #[test]
    fn test_user_entry_rejects_traversal() {
        let (_temp_dir, resolver) = setup_resolver();
        let user = UserId::new(1);

        assert!(resolver.user_entry(user, "report.pdf").is_ok());
        for name in ["", ".", "..", "../user_2/x", "a/b", "a\\b"] {
            assert!(
                matches!(resolver.user_entry(user, name), Err(StorageError::NotFound(_))),
                "{name:?} should not resolve"
            );
        }
    }

    #[test]
    fn test_is_plain_name() {
        assert!(is_plain_name("20240101_120000_abcdef12_a.txt"));
        assert!(is_plain_name(".hidden"));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("/etc"));
        assert!(!is_plain_name("line\nbreak"));
    }
}
