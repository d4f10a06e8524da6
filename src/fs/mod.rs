// src/fs/mod.rs

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};

pub mod mock;

/// Abstract filesystem interface.
///
/// The services only ever *inspect* the filesystem through this trait
/// (directory checks for the terminal's `cd`, manifest lookup for package
/// installs); tests swap in [`mock::MockFileSystem`].
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Join `target` onto `base` and collapse `.` / `..` components without
/// touching the filesystem.
///
/// - An absolute `target` replaces `base`.
/// - `..` at the root stays at the root (`/..` is `/`).
/// - Symlinks are *not* resolved, so `/tmp/link/..` is `/tmp`.
pub fn resolve_lexically(base: &Path, target: &Path) -> PathBuf {
    let joined = base.join(target);
    let mut out = PathBuf::new();

    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_parent =
                    matches!(out.components().next_back(), Some(Component::ParentDir));
                if last_is_parent || out.as_os_str().is_empty() {
                    out.push("..");
                } else {
                    // `pop` refuses to remove the root, which is what we want.
                    out.pop();
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parent_components_collapse() {
        let resolved = resolve_lexically(Path::new("/tmp/work"), Path::new("../other/./x"));
        assert_eq!(resolved, PathBuf::from("/tmp/other/x"));
    }

    #[test]
    fn parent_of_root_is_root() {
        let resolved = resolve_lexically(Path::new("/"), Path::new("../.."));
        assert_eq!(resolved, PathBuf::from("/"));
    }

    #[test]
    fn absolute_target_replaces_base() {
        let resolved = resolve_lexically(Path::new("/tmp"), Path::new("/var/log"));
        assert_eq!(resolved, PathBuf::from("/var/log"));
    }

    proptest! {
        #[test]
        fn resolved_paths_never_contain_dot_components(
            segments in proptest::collection::vec(
                prop_oneof![Just(".".to_string()), Just("..".to_string()), "[a-z]{1,6}"],
                0..8,
            )
        ) {
            let target: PathBuf = segments.iter().collect();
            let resolved = resolve_lexically(Path::new("/base/dir"), &target);
            prop_assert!(resolved.is_absolute());
            prop_assert!(resolved
                .components()
                .all(|c| !matches!(c, Component::CurDir | Component::ParentDir)));
        }
    }
}
