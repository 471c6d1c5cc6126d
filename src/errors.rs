use core::fmt;

/// Errors that can occur during the protocol
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// An incoming request failed structural or curve-validity checks.
    MalformedRequest,
    /// An incoming response failed structural or curve-validity checks.
    MalformedResponse,
    /// A Schnorr proof did not verify.
    ZkpVerification,
    /// The final password check failed, or the peer's key-confirmation tag
    /// did not match.
    Authentication,
    /// No credential record exists for the requested user.
    /// Deployments should mask this as [`Error::Authentication`] after running
    /// the state machine against
    /// [`fake_credentials`](crate::OwlServer::fake_credentials) to equalise
    /// timing.
    UnknownUser,
    /// The password verifier reduced to zero.
    WeakPassword,
    /// The configuration is unusable (empty server identity).
    InvalidConfig,
    /// The arithmetic layer reported an impossible condition.
    Internal,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedRequest => write!(f, "malformed request"),
            Error::MalformedResponse => write!(f, "malformed response"),
            Error::ZkpVerification => write!(f, "zero-knowledge proof verification failed"),
            Error::Authentication => write!(f, "authentication failed"),
            Error::UnknownUser => write!(f, "unknown user"),
            Error::WeakPassword => write!(f, "password verifier reduced to zero"),
            Error::InvalidConfig => write!(f, "server identity must be non-empty"),
            Error::Internal => write!(f, "internal arithmetic error"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type
pub type Result<T> = core::result::Result<T, Error>;
