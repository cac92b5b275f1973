//! Path handling for config layers.

use crate::ConfigError;
use directories::UserDirs;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Keys holding filesystem paths, as `(block, key)`.
const PATH_KEYS: &[(&str, &str)] = &[("storage", "path"), ("audit", "path")];

/// Canonical form of the working directory; a missing cwd is kept verbatim.
pub(super) fn canonical_cwd(cwd: &Path) -> Result<PathBuf, ConfigError> {
    match cwd.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(cwd.to_path_buf()),
        Err(err) => Err(ConfigError::read(cwd, err)),
    }
}

/// Nearest ancestor of `cwd` (itself included) holding one of `markers`.
pub(super) fn find_project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

/// Rewrite `storage.path` and `audit.path` to absolute paths.
///
/// `~` expands to the home directory; other relative paths are taken
/// relative to `layer_dir`, the directory of the file that set them.
pub(super) fn resolve_layer_paths(value: &mut Value, layer_dir: Option<&Path>) {
    for (block, key) in PATH_KEYS {
        let Some(slot) = value.get_mut(*block).and_then(|block| block.get_mut(*key)) else {
            continue;
        };
        let Some(raw) = slot.as_str() else {
            continue;
        };
        if let Some(resolved) = resolve_path(raw, layer_dir) {
            *slot = Value::String(resolved.to_string_lossy().into_owned());
        }
    }
}

fn resolve_path(raw: &str, layer_dir: Option<&Path>) -> Option<PathBuf> {
    let home_relative = raw
        .strip_prefix("~/")
        .or_else(|| (raw == "~").then_some(""));
    if let Some(rest) = home_relative {
        return UserDirs::new().map(|dirs| dirs.home_dir().join(rest));
    }
    let path = Path::new(raw);
    if path.is_absolute() {
        return None;
    }
    layer_dir.map(|dir| dir.join(path))
}

#[cfg(test)]
mod tests {
    use super::{find_project_root, resolve_layer_paths};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn relative_paths_follow_their_layer() {
        let mut layer = json!({
            "storage": { "path": "data/store" },
            "audit": { "path": "/var/log/memex/audit.jsonl" },
        });
        resolve_layer_paths(&mut layer, Some(Path::new("/srv/project/.memex")));
        assert_eq!(
            layer,
            json!({
                "storage": { "path": "/srv/project/.memex/data/store" },
                "audit": { "path": "/var/log/memex/audit.jsonl" },
            })
        );

        let mut inline = json!({ "storage": { "path": "store" } });
        resolve_layer_paths(&mut inline, None);
        assert_eq!(inline, json!({ "storage": { "path": "store" } }));
    }

    #[test]
    fn project_root_is_nearest_marked_ancestor() {
        let temp = TempDir::new().expect("tmp");
        let root = temp.path().join("repo");
        let nested = root.join("a").join("b");
        fs::create_dir_all(&nested).expect("dirs");
        fs::create_dir_all(root.join(".git")).expect("git");

        let markers = vec![".git".to_string()];
        assert_eq!(find_project_root(&nested, &markers), Some(root.clone()));
        assert_eq!(find_project_root(&root, &markers), Some(root));
        assert_eq!(
            find_project_root(&nested, &["missing-marker".to_string()]),
            None
        );
    }
}
