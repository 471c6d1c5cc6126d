use crate::group::OwlCurve;
use crate::server::UserCredentials;

/// trait for the server to abstract over the storage and retrieval of
/// credential records
///
/// Whether records live in memory, on disk or in a database is the
/// deployment's concern; persistence must preserve all four fields of
/// [`UserCredentials`] byte-identically, and records are read-only during
/// login.
pub trait Database {
    /// The curve the stored credentials are over
    type Curve: OwlCurve;

    /// perform the credential lookup for a login attempt, returning the
    /// stored record if the user is registered
    ///
    /// # Arguments:
    /// `username`: the user to look up the credentials for
    ///
    /// # Return:
    /// the [`UserCredentials`] stored for the given user, if any. Callers
    /// should mask a `None` by running the exchange against
    /// [`fake_credentials`](crate::OwlServer::fake_credentials) before
    /// reporting an authentication failure.
    fn lookup(&self, username: &str) -> Option<UserCredentials<Self::Curve>>;

    /// store a credential record for a username
    ///
    /// Overwriting an existing record is allowed; it is how password changes
    /// are performed and the server will only do so after a fresh
    /// registration for the user.
    ///
    /// # Arguments:
    /// - `username`: the name of the user being stored
    /// - `credentials`: the record produced by
    ///   [`register`](crate::OwlServer::register)
    fn store(&mut self, username: &str, credentials: UserCredentials<Self::Curve>);
}
