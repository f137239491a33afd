//! Filesystem collaborator.
//!
//! The store never touches the disk directly; it works with path/contents
//! pairs through a [`FileSystem`] implementation. [`LocalFs`] is backed by
//! `tokio::fs`. With the `test-util` feature, [`MemoryFs`] keeps everything
//! in memory:
//!
//! ```toml
//! [dev-dependencies]
//! trellis = { version = "...", features = ["test-util"] }
//! ```

use async_trait::async_trait;
use std::io;
use std::path::Path;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    /// File or directory name
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// File operations the ticket store relies on.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Reads a whole file as UTF-8.
    async fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Writes a file, replacing any existing contents.
    async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Writes a new file.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] if the path is taken.
    async fn create_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Deletes a file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Moves a file or directory.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] if the destination is taken.
    async fn move_path(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Lists a directory, sorted by name.
    async fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Whether `path` is an existing directory.
    async fn is_dir(&self, path: &Path) -> bool;

    /// Whether anything exists at `path`.
    async fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and any missing parents.
    async fn create_dir(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl FileSystem for LocalFs {
    async fn read_file(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn create_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }

    async fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        if tokio::fs::try_exists(to).await? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        tokio::fs::rename(from, to).await
    }

    async fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::debug!(path = %entry.path().display(), "Skipping non UTF-8 name");
                continue;
            };
            let is_dir = entry.file_type().await?.is_dir();
            entries.push(DirEntry { name, is_dir });
        }
        entries.sort();
        Ok(entries)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .is_ok_and(|metadata| metadata.is_dir())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryFs;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use super::{DirEntry, FileSystem};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Node {
        File(String),
        Dir,
    }

    /// In-memory [`FileSystem`] for tests.
    ///
    /// Paths are used exactly as given; there is no normalization of `..`.
    /// Writes can be made to fail with [`MemoryFs::fail_writes`] or
    /// [`MemoryFs::fail_one_write_after`] to exercise error paths.
    #[derive(Debug)]
    pub struct MemoryFs {
        nodes: Mutex<BTreeMap<PathBuf, Node>>,
        fail_writes: AtomicBool,
        /// Writes to let through before one fails; `usize::MAX` when off
        fail_countdown: AtomicUsize,
    }

    impl Default for MemoryFs {
        fn default() -> Self {
            Self {
                nodes: Mutex::default(),
                fail_writes: AtomicBool::new(false),
                fail_countdown: AtomicUsize::new(usize::MAX),
            }
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
    }

    fn already_exists(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )
    }

    impl MemoryFs {
        /// Creates an empty filesystem.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent write fail (or succeed again).
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
            self.fail_countdown.store(usize::MAX, Ordering::SeqCst);
        }

        /// Lets the next `successes` writes through and fails the one after.
        /// Writes after that succeed again.
        pub fn fail_one_write_after(&self, successes: usize) {
            self.fail_countdown.store(successes, Ordering::SeqCst);
        }

        /// Adds a file, creating its parent directories.
        pub async fn insert(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
            let path = path.as_ref();
            let mut nodes = self.nodes.lock().await;
            for ancestor in path.ancestors().skip(1) {
                if ancestor.as_os_str().is_empty() {
                    continue;
                }
                nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
            }
            nodes.insert(path.to_path_buf(), Node::File(contents.into()));
        }

        /// Paths of all files, sorted.
        pub async fn files(&self) -> Vec<PathBuf> {
            let nodes = self.nodes.lock().await;
            nodes
                .iter()
                .filter(|(_, node)| matches!(node, Node::File(_)))
                .map(|(path, _)| path.clone())
                .collect()
        }

        fn check_writable(&self) -> io::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::other("writes are disabled"));
            }
            let previous = self
                .fail_countdown
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                    usize::MAX => None,
                    0 => Some(usize::MAX),
                    n => Some(n - 1),
                });
            if previous == Ok(0) {
                return Err(io::Error::other("injected write failure"));
            }
            Ok(())
        }

        fn check_parent(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => match nodes.get(parent) {
                    Some(Node::Dir) => Ok(()),
                    _ => Err(not_found(parent)),
                },
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl FileSystem for MemoryFs {
        async fn read_file(&self, path: &Path) -> io::Result<String> {
            let nodes = self.nodes.lock().await;
            match nodes.get(path) {
                Some(Node::File(contents)) => Ok(contents.clone()),
                Some(Node::Dir) => Err(io::Error::other(format!("{} is a directory", path.display()))),
                None => Err(not_found(path)),
            }
        }

        async fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
            self.check_writable()?;
            let mut nodes = self.nodes.lock().await;
            Self::check_parent(&nodes, path)?;
            if matches!(nodes.get(path), Some(Node::Dir)) {
                return Err(io::Error::other(format!("{} is a directory", path.display())));
            }
            nodes.insert(path.to_path_buf(), Node::File(contents.to_string()));
            Ok(())
        }

        async fn create_file(&self, path: &Path, contents: &str) -> io::Result<()> {
            self.check_writable()?;
            let mut nodes = self.nodes.lock().await;
            Self::check_parent(&nodes, path)?;
            if nodes.contains_key(path) {
                return Err(already_exists(path));
            }
            nodes.insert(path.to_path_buf(), Node::File(contents.to_string()));
            Ok(())
        }

        async fn remove_file(&self, path: &Path) -> io::Result<()> {
            self.check_writable()?;
            let mut nodes = self.nodes.lock().await;
            match nodes.get(path) {
                Some(Node::File(_)) => {
                    nodes.remove(path);
                    Ok(())
                }
                Some(Node::Dir) => Err(io::Error::other(format!("{} is a directory", path.display()))),
                None => Err(not_found(path)),
            }
        }

        async fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.check_writable()?;
            let mut nodes = self.nodes.lock().await;
            if !nodes.contains_key(from) {
                return Err(not_found(from));
            }
            if nodes.contains_key(to) {
                return Err(already_exists(to));
            }
            Self::check_parent(&nodes, to)?;

            let moved: Vec<PathBuf> = nodes
                .keys()
                .filter(|path| path.starts_with(from))
                .cloned()
                .collect();
            for old in moved {
                if let Some(node) = nodes.remove(&old) {
                    let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                    let new = if suffix.as_os_str().is_empty() {
                        to.to_path_buf()
                    } else {
                        to.join(suffix)
                    };
                    nodes.insert(new, node);
                }
            }
            Ok(())
        }

        async fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
            let nodes = self.nodes.lock().await;
            if !matches!(nodes.get(path), Some(Node::Dir)) {
                return Err(not_found(path));
            }
            let mut entries: Vec<DirEntry> = nodes
                .iter()
                .filter(|(child, _)| child.parent() == Some(path))
                .filter_map(|(child, node)| {
                    let name = child.file_name()?.to_str()?.to_string();
                    Some(DirEntry {
                        name,
                        is_dir: matches!(node, Node::Dir),
                    })
                })
                .collect();
            entries.sort();
            Ok(entries)
        }

        async fn is_dir(&self, path: &Path) -> bool {
            matches!(self.nodes.lock().await.get(path), Some(Node::Dir))
        }

        async fn exists(&self, path: &Path) -> bool {
            self.nodes.lock().await.contains_key(path)
        }

        async fn create_dir(&self, path: &Path) -> io::Result<()> {
            self.check_writable()?;
            let mut nodes = self.nodes.lock().await;
            for ancestor in path.ancestors() {
                if ancestor.as_os_str().is_empty() {
                    continue;
                }
                match nodes.get(ancestor) {
                    Some(Node::File(_)) => {
                        return Err(already_exists(ancestor));
                    }
                    Some(Node::Dir) => {}
                    None => {
                        nodes.insert(ancestor.to_path_buf(), Node::Dir);
                    }
                }
            }
            Ok(())
        }
    }
}
