use std::path::PathBuf;

/// Role of an opened database within a synchronization topology.
///
/// A master copy is the canonical root: it has nothing to synchronize
/// against and therefore never produces revisions. Briefcases are the
/// working replicas that accumulate changesets for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbRole {
    Master,
    Briefcase,
}

/// Per-connection configuration, passed to [`Repository::open`].
///
/// Replaces the process-wide mutable flags of older designs: two
/// connections in one process can carry different roles and unsafe-access
/// policies without interfering.
///
/// [`Repository::open`]: crate::Repository::open
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub role: DbRole,
    /// Directory that finished revision files are written into. When
    /// `None`, finished revisions are kept in memory only.
    pub revision_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            role: DbRole::Briefcase,
            revision_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn master() -> Self {
        Self {
            role: DbRole::Master,
            revision_dir: None,
        }
    }

    pub fn with_revision_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.revision_dir = Some(dir.into());
        self
    }
}
