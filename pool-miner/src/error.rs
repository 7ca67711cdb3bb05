//! Crate-wide error type.

use thiserror::Error;

use crate::block::ReservationError;
use crate::chain::ChainError;
use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::job::JobError;
use crate::protocol::ProtocolError;
use crate::scratchpad::ScratchpadError;
use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Scratchpad(#[from] ScratchpadError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
