//! Hashed symlink trees for avatar and WKD file serving.
//!
//! Files live under `<root>/<kind>/<user@domain>`; the serving handlers
//! look them up through `<root>/.links/<hashed name>` symlinks. Avatar
//! kinds link both the md5 and sha256 of the lowercased address; the WKD
//! kind links `keys-<domain>-<zbase32(sha1(local))>`. The farm is rebuilt
//! by walking the kind directories at startup and kept current on this
//! server's own write path (HKP submission).

use keyproofs_core::hash;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Which naming scheme the farm uses for its links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkMode {
    Avatar,
    Wkd,
}

/// A directory of content files plus its `.links` lookup tree.
pub struct LinkFarm {
    root: PathBuf,
    kinds: &'static [&'static str],
    mode: LinkMode,
}

impl LinkFarm {
    /// Farm for `avatar/`, `bg/` and `cover/` trees.
    pub fn avatar(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            kinds: &["avatar", "bg", "cover"],
            mode: LinkMode::Avatar,
        }
    }

    /// Farm for the `keys/` tree.
    pub fn wkd(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            kinds: &["keys"],
            mode: LinkMode::Wkd,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a link by its hashed name.
    pub fn link_path(&self, name: &str) -> PathBuf {
        self.root.join(".links").join(name)
    }

    /// Absolute path of a content file.
    pub fn file_path(&self, kind: &str, name: &str) -> PathBuf {
        self.root.join(kind).join(name)
    }

    /// Create the `.links` and kind directories.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.root.join(".links"))?;
        for kind in self.kinds {
            fs::create_dir_all(self.root.join(kind))?;
        }
        Ok(())
    }

    /// Walk the kind directories and (re)create links for every file whose
    /// name carries an `@`.
    pub fn rebuild(&self) -> io::Result<()> {
        for kind in self.kinds {
            let dir = self.root.join(kind);
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                self.link(kind, name)?;
            }
        }
        Ok(())
    }

    /// Create or refresh the links for one file. Names without an `@` are
    /// skipped.
    pub fn link(&self, kind: &str, name: &str) -> io::Result<()> {
        if !name.contains('@') {
            return Ok(());
        }

        let src = PathBuf::from("..").join(kind).join(name);
        for link_name in self.link_names(kind, name) {
            tracing::debug!(kind, name, link = %link_name, "linking");
            self.replace_link(&src, &self.link_path(&link_name))?;
        }
        Ok(())
    }

    /// Remove the links for one file.
    pub fn unlink(&self, kind: &str, name: &str) -> io::Result<()> {
        if !name.contains('@') {
            return Ok(());
        }
        for link_name in self.link_names(kind, name) {
            fs::remove_file(self.link_path(&link_name))?;
        }
        Ok(())
    }

    fn link_names(&self, kind: &str, name: &str) -> Vec<String> {
        let name = name.to_lowercase();
        match self.mode {
            LinkMode::Avatar => vec![
                format!("{kind}-{}", hash::md5_hex(name.as_bytes())),
                format!("{kind}-{}", hash::sha256_hex(name.as_bytes())),
            ],
            LinkMode::Wkd => {
                let (hashed, domain) = hash::wkd_hash_address(&name);
                vec![format!("{kind}-{domain}-{hashed}")]
            }
        }
    }

    fn replace_link(&self, src: &Path, link: &Path) -> io::Result<()> {
        match fs::read_link(link) {
            Ok(existing) => {
                if existing != src {
                    fs::remove_file(link)?;
                    std::os::unix::fs::symlink(src, link)?;
                }
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                std::os::unix::fs::symlink(src, link)
            }
            Err(err) => Err(err),
        }
    }
}
