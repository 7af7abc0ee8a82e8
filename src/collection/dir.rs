// Directory-backed resource collection.
//
// Every regular file below the root is one resource, named by its path
// relative to the root with `/` separators. The tree is scanned once when the
// collection is opened.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use super::{ResourceCollection, closed};

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

/// Resource collection over the files of a directory tree.
#[derive(Debug)]
pub struct DirCollection {
    root: PathBuf,
    names: Vec<String>,
    closed: bool,
}

impl DirCollection {
    /// Scan `root` recursively and open it as a collection.
    ///
    /// Names are listed in sorted order. Symbolic links are not followed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let mut names = Vec::new();
        scan(&root, "", &mut names)?;
        names.sort();
        log::debug!("scanned {} resources under {}", names.len(), root.display());
        Ok(Self {
            root,
            names,
            closed: false,
        })
    }

    /// Root directory of the collection.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> io::Result<PathBuf> {
        if self.closed {
            return Err(closed());
        }
        resource_path(&self.root, name)
    }
}

impl ResourceCollection for DirCollection {
    fn names(&self) -> io::Result<Vec<String>> {
        if self.closed {
            return Err(closed());
        }
        Ok(self.names.clone())
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path_of(name)?)
    }

    fn open_stream(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let file = File::open(self.path_of(name)?)?;
        Ok(Box::new(BufReader::with_capacity(BUF_SIZE, file)))
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Map a resource name onto a path below `root`.
///
/// Rejects names that are empty, absolute, or contain `.`/`..` or empty
/// components, so a name can never address anything outside `root`.
pub fn resource_path(root: &Path, name: &str) -> io::Result<PathBuf> {
    let invalid = || {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid resource name: {name:?}"),
        )
    };
    if name.is_empty() || name.contains('\\') {
        return Err(invalid());
    }
    let mut path = root.to_path_buf();
    for part in name.split('/') {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) => path.push(c),
            _ => return Err(invalid()),
        }
    }
    Ok(path)
}

fn scan(dir: &Path, prefix: &str, names: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("non UTF-8 file name under {}", dir.display()),
            ));
        };
        let name = if prefix.is_empty() {
            file_name.to_owned()
        } else {
            format!("{prefix}/{file_name}")
        };
        if file_type.is_dir() {
            scan(&entry.path(), &name, names)?;
        } else if file_type.is_file() {
            names.push(name);
        } else {
            log::trace!("skipping non-regular entry {}", entry.path().display());
        }
    }
    Ok(())
}
