mod changeset;
mod manager;

pub use changeset::{
    ChangeOp, ChangeRecord, ChangeSetFile, RevisionId, RowImage, CHANGESET_FORMAT_VERSION,
};
pub use manager::{Revision, RevisionStart};
pub(crate) use manager::RevisionManager;
