pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider returned HTTP {status}: {body}")]
	Http { status: u16, body: String },
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	/// Rate limits, server errors and transport failures are worth retrying. Everything else will
	/// fail the same way again.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Http { status, .. } => *status == 429 || *status >= 500,
			Self::Reqwest(err) => !(err.is_builder() || err.is_decode()),
			_ => false,
		}
	}
}
