use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShedError {
    #[error("hole not found: {0}")]
    HoleNotFound(String),
    #[error("box not found: {hole}/{box_name}")]
    BoxNotFound { hole: String, box_name: String },
    #[error("compiled index not found: {}", .0.display())]
    IndexMissing(PathBuf),
    #[error("compiled index is corrupt: {0}")]
    CorruptIndex(String),
    #[error("invalid annotation patch: {0}")]
    InvalidPatch(String),
    #[error("compiled index is locked by another writer: {}", .0.display())]
    Locked(PathBuf),
}

impl ShedError {
    pub fn code(&self) -> ShedErrorCode {
        match self {
            Self::HoleNotFound(_) | Self::BoxNotFound { .. } => ShedErrorCode::E001NotFound,
            Self::IndexMissing(_) => ShedErrorCode::E002IndexMissing,
            Self::CorruptIndex(_) => ShedErrorCode::E003CorruptIndex,
            Self::InvalidPatch(_) => ShedErrorCode::E004InvalidPatch,
            Self::Locked(_) => ShedErrorCode::E005Locked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShedErrorCode {
    E001NotFound,
    E002IndexMissing,
    E003CorruptIndex,
    E004InvalidPatch,
    E005Locked,
}

impl ShedErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001NotFound => "E001_NOT_FOUND",
            Self::E002IndexMissing => "E002_INDEX_MISSING",
            Self::E003CorruptIndex => "E003_CORRUPT_INDEX",
            Self::E004InvalidPatch => "E004_INVALID_PATCH",
            Self::E005Locked => "E005_LOCKED",
        }
    }
}

/// Find the first domain error in an `anyhow` chain.
pub fn find_shed_error(err: &anyhow::Error) -> Option<&ShedError> {
    err.chain().find_map(|cause| cause.downcast_ref::<ShedError>())
}
