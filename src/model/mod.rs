mod commit;
mod projection;
mod upload;

pub use commit::{CommitId, CommitIdError};
pub use projection::{
    CommitRecord, GraphSnapshot, Link, NearestEntry, NearestUpload, Projection, Tip, TipMark,
};
pub use upload::{RepositoryId, Slot, Upload, UploadId, UploadMeta, UploadState};
