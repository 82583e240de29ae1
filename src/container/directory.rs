//! Filesystem directory container.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::stream::{Mode, Stream};

/// A directory tree; members are the regular files below it, named by their
/// `/`-separated path relative to the root.
#[derive(Debug)]
pub struct Directory {
    root: PathBuf,
    name: String,
    mode: Mode,
}

impl Directory {
    /// Open `path` as a directory. Write mode creates it if missing.
    ///
    /// An empty path means the current directory.
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> io::Result<Self> {
        let path = path.as_ref();
        let root = if path.as_os_str().is_empty() { PathBuf::from(".") } else { path.to_owned() };
        match mode {
            Mode::Write => fs::create_dir_all(&root)?,
            Mode::Read if !root.is_dir() => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("`{}` is not a directory", root.display()),
                ));
            }
            Mode::Read => {}
        }
        let name = root.to_string_lossy().into_owned();
        Ok(Self { root, name, mode })
    }

    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> io::Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let rel = if prefix.is_empty() { file_name } else { format!("{prefix}/{file_name}") };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect(&entry.path(), &rel, out)?;
            } else if file_type.is_file() {
                out.push(rel);
            }
        }
        Ok(())
    }
}

impl Container for Directory {
    fn name(&self) -> &str {
        &self.name
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn members(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.collect(&self.root, "", &mut out)?;
        Ok(out)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.root.join(name).is_file())
    }

    fn open_stream(&mut self, name: &str, mode: Mode, overwrite: bool) -> Result<Stream> {
        if mode == Mode::Write && self.mode == Mode::Read {
            return Err(Error::config(format!("`{}` is open for reading only", self.name)));
        }
        let path = self.root.join(name);
        if mode == Mode::Write {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Stream::open(path, mode, overwrite)?)
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
