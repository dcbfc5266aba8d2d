//! Errors from the combined import operations.

use thiserror::Error;

/// Errors that can occur while importing from an archive.
#[derive(Debug, Error)]
pub enum Error {
    #[error("archive: {0}")]
    Archive(#[from] shenkit_tac::Error),

    #[error("model: {0}")]
    Model(#[from] shenkit_mt::Error),

    #[error("texture: {0}")]
    Texture(#[from] shenkit_pvr::Error),

    #[error("character scene: {0}")]
    CharacterScene(#[from] shenkit_chrt::Error),

    #[error("{0}")]
    Common(#[from] shenkit_common::Error),
}

/// Result type for import operations.
pub type Result<T> = std::result::Result<T, Error>;
