use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("cannot resolve working directory: {0}")]
    CurrentDir(std::io::Error),
}

/// Canonicalizes a path lexically: made absolute against the working
/// directory, with `.` dropped and `..` folded. Symlinks are left alone so
/// the result is stable whether or not the target currently exists.
pub fn canonical_path(path: &Path) -> Result<PathBuf, PathError> {
    let joined;
    let absolute = if path.is_absolute() {
        path
    } else {
        joined = std::env::current_dir()
            .map_err(PathError::CurrentDir)?
            .join(path);
        joined.as_path()
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Ok(out)
}

/// Picks the most specific registered folder containing `path`: the ancestor
/// with the longest path wins. Containment is per component, so a sibling
/// that merely shares a name prefix does not match.
pub fn find_root_folder<'a>(
    folders: &'a BTreeMap<PathBuf, String>,
    path: &Path,
) -> Option<(&'a Path, &'a str)> {
    folders
        .iter()
        .filter(|(root, _)| path.starts_with(root))
        .max_by_key(|(root, _)| root.as_os_str().len())
        .map(|(root, id)| (root.as_path(), id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_map(entries: &[(&str, &str)]) -> BTreeMap<PathBuf, String> {
        entries
            .iter()
            .map(|(path, id)| (PathBuf::from(path), id.to_string()))
            .collect()
    }

    #[test]
    fn canonical_path_folds_dot_and_parent_segments() {
        assert_eq!(
            canonical_path(Path::new("/a/./b/../c")).unwrap(),
            PathBuf::from("/a/c")
        );
        assert_eq!(canonical_path(Path::new("/..")).unwrap(), PathBuf::from("/"));
    }

    #[test]
    fn canonical_path_absolutizes_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(canonical_path(Path::new("notes.txt")).unwrap(), cwd.join("notes.txt"));
    }

    #[test]
    fn picks_most_specific_ancestor() {
        let folders = folder_map(&[("/a", "F1"), ("/a/b", "F2")]);
        assert_eq!(
            find_root_folder(&folders, Path::new("/a/b/c.txt")),
            Some((Path::new("/a/b"), "F2"))
        );
        assert_eq!(
            find_root_folder(&folders, Path::new("/a/x.txt")),
            Some((Path::new("/a"), "F1"))
        );
    }

    #[test]
    fn name_prefix_is_not_containment() {
        let folders = folder_map(&[("/a/b", "F2")]);
        assert_eq!(find_root_folder(&folders, Path::new("/a/bc")), None);
    }

    #[test]
    fn registered_folder_contains_itself() {
        let folders = folder_map(&[("/a/b", "F2")]);
        assert_eq!(
            find_root_folder(&folders, Path::new("/a/b")),
            Some((Path::new("/a/b"), "F2"))
        );
    }

    #[test]
    fn unrelated_path_has_no_root() {
        let folders = folder_map(&[("/a", "F1")]);
        assert_eq!(find_root_folder(&folders, Path::new("/z/q.txt")), None);
    }
}
