use crate::overlay::OverlayId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("Overlay id already registered: {0}")]
    DuplicateId(OverlayId),
}

pub type OverlayResult<T> = Result<T, OverlayError>;
