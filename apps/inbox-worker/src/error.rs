pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0}")]
	Message(String),
	/// The webhook event cannot be applied. It is recorded and never retried.
	#[error("{0}")]
	InvalidEvent(String),
	#[error(transparent)]
	Storage(#[from] inbox_storage::Error),
	#[error(transparent)]
	Provider(#[from] inbox_providers::Error),
	#[error(transparent)]
	Transition(#[from] inbox_domain::queue::TransitionError),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage(err.into())
	}
}
