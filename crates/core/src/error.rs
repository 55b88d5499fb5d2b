use thiserror::Error;

use crate::model::{MaterialError, QuizError, SiteError, UserError};
use crate::playback::PlaybackError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Material(#[from] MaterialError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
