use std::path::{Path, PathBuf};

use anyhow::Context;

/// Make a name safe to use as a file or directory component.
pub(crate) fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Write one artifact file, creating the directory as needed.
pub(crate) fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create artifact directory {dir:?}"))?;
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write artifact {path:?}"))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugs_collapse_punctuation_and_whitespace() {
        assert_eq!(slug("Hero renders (desktop)"), "hero-renders-desktop");
        assert_eq!(slug("  spaced   out  "), "spaced-out");
        assert_eq!(slug("mobile-chrome"), "mobile-chrome");
    }

    #[test]
    fn write_artifact_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("run-id/engine");

        let path = write_artifact(&nested, "case-attempt-0.png", b"bytes").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        assert!(path.ends_with("run-id/engine/case-attempt-0.png"));
    }
}
