#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

//! # Usage
//! Add `owl` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! owl = "0.1"
//! ```
//!
//! Next read documentation for the [`client`](client/index.html) and
//! [`server`](server/index.html) modules.
//!
//! # Protocol description
//! Here we briefly describe the Owl protocol. For additional information
//! refer to the Owl literature[^1]. All arithmetic is done on a prime-order
//! elliptic curve group with generator `G` and order `n`; `H` is a hash of a
//! length-framed tuple, reduced mod `n`.
//!
//! |       Server                         |   Data transfer       |      Client                          |
//! |--------------------------------------|-----------------------|--------------------------------------|
//! |                                      | Registration          |                                      |
//! |                                      |                       | `t = H(U‖w)`, `π = H(t)`, `T = G·t`  |
//! | `x3 = ${1..n}`, `X3 = G·x3`          | <- `U`, `π`, `T`      |                                      |
//! | store `(X3, PI3, π, T)` for `U`      |                       |                                      |
//! |                                      | Login flow 1          |                                      |
//! |                                      |                       | `x1, x2 = ${1..n}`                   |
//! | abort if `X1` or `X2` invalid        | <- `X1, X2, PI1, PI2` | `X1 = G·x1`, `X2 = G·x2`             |
//! |                                      | Login flow 2          |                                      |
//! | `x4 = ${1..n}`, `X4 = G·x4`          |                       |                                      |
//! | `β = (X1+X2+X3)·(x4·π)`              | `X3, X4, β, proofs` ->| abort if `X3`, `X4` or `β` invalid   |
//! |                                      | Login flow 3          |                                      |
//! |                                      |                       | `α = (X1+X3+X4)·(x2·π)`              |
//! |                                      |                       | `K = (β - X4·(x2·π))·x2`             |
//! |                                      |                       | `h = H(transcript)`                  |
//! | verify `PIα`                         | <- `α, PIα, r`        | `r = x1 - t·h`                       |
//! | `K = (α - X2·(x4·π))·x4`             |                       |                                      |
//! | abort if `G·r + T·h ≠ X1`            |                       |                                      |
//! |                                      | Key confirmation      |                                      |
//! | `k = H(K)`, HMAC tags over `K`       | `kc` <-> `kc`         | `k = H(K)`, HMAC tags over `K`       |
//!
//! Variables and notations have the following meaning:
//!
//! - `U` — the client's username
//! - `w` — the client's password
//! - `t`, `π` — the password-derived scalar and verifier
//! - `T` — the password element stored by the server
//! - `${a..b}` — pick a uniformly random number between `a` and `b`
//! - `·` — curve point scalar multiplication
//! - `PIi` — Schnorr proof of knowledge of the discrete log of `Xi`
//! - `K` — the shared secret point, equal on both sides
//! - `k` — the derived 32-byte session key
//! - `kc` — directional key-confirmation tag
//!
//! Every proof is bound to its sender's identity (`U` for the client, the
//! server identity for the server), and the transcript hash `h` binds both
//! identities, every public ephemeral and every proof of the session.
//!
//! # Example
//!
//! ```rust
//! use owl::{verify_key_confirmation, ClientP256, Config, ServerP256};
//! use rand_core::OsRng;
//!
//! let config = Config::new("auth.example.com")?;
//! let mut client = ClientP256::new(config.clone(), OsRng);
//! let mut server = ServerP256::new(config, OsRng);
//!
//! // registration, over a mutually authenticated channel
//! let request = client.register("alice", "hunter2")?;
//! let credentials = server.register(&request)?;
//!
//! // login
//! let (client_state, init) = client.auth_init("alice", "hunter2")?;
//! let (server_state, response) = server.auth_init("alice", &init, &credentials)?;
//! let (finish, client_result) = client.auth_finish(client_state, &response)?;
//! let server_result = server.auth_finish("alice", &finish, server_state)?;
//!
//! assert_eq!(client_result.key, server_result.key);
//! assert!(verify_key_confirmation(&client_result.kc_test, &server_result.kc));
//! assert!(verify_key_confirmation(&server_result.kc_test, &client_result.kc));
//! # Ok::<(), owl::Error>(())
//! ```
//!
//! [^1]: <https://eprint.iacr.org/2023/768>

use core::marker::PhantomData;

use zeroize::{Zeroize, ZeroizeOnDrop};

mod database;
mod errors;
mod group;
mod utils;
mod zkp;

/// Module containing the implementation of the client for the Owl protocol
pub mod client;

/// Module containing the implementation of the server for the Owl protocol
pub mod server;

pub use self::{
    client::{AuthFinishRequest, AuthInitRequest, ClientInitVals, OwlClient, RegistrationRequest},
    database::Database,
    errors::{Error, Result},
    group::{CurveId, OwlCurve},
    server::{AuthInitResponse, AuthInitialValues, OwlServer, UserCredentials},
    utils::verify_key_confirmation,
    zkp::Zkp,
};

pub use p256;
pub use p384;
pub use p521;

/// Default client instantiation over NIST P-256 with `OsRng`
#[cfg(feature = "getrandom")]
pub type ClientP256 = OwlClient<p256::NistP256, rand_core::OsRng>;

/// Default server instantiation over NIST P-256 with `OsRng`
#[cfg(feature = "getrandom")]
pub type ServerP256 = OwlServer<p256::NistP256, rand_core::OsRng>;

/// Default client instantiation over NIST P-384 with `OsRng`
#[cfg(feature = "getrandom")]
pub type ClientP384 = OwlClient<p384::NistP384, rand_core::OsRng>;

/// Default server instantiation over NIST P-384 with `OsRng`
#[cfg(feature = "getrandom")]
pub type ServerP384 = OwlServer<p384::NistP384, rand_core::OsRng>;

/// Default client instantiation over NIST P-521 with `OsRng`
#[cfg(feature = "getrandom")]
pub type ClientP521 = OwlClient<p521::NistP521, rand_core::OsRng>;

/// Default server instantiation over NIST P-521 with `OsRng`
#[cfg(feature = "getrandom")]
pub type ServerP521 = OwlServer<p521::NistP521, rand_core::OsRng>;

/// Immutable protocol configuration shared by a server and its clients.
///
/// Constructed once at process start. The server identity is bound into
/// every server proof and into the transcript hash, so changing it changes
/// every dependent value.
#[derive(Clone, Debug)]
pub struct Config<C: OwlCurve> {
    server_id: String,
    curve: PhantomData<C>,
}

impl<C: OwlCurve> Config<C> {
    /// Create a configuration for the given server identity.
    ///
    /// # Return:
    /// either
    /// - Ok(`config`): a configuration over the curve `C`
    /// - Err([`Error::InvalidConfig`]): the server identity is empty
    pub fn new(server_id: impl Into<String>) -> Result<Self> {
        let server_id = server_id.into();
        if server_id.is_empty() {
            return Err(Error::InvalidConfig);
        }
        Ok(Self {
            server_id,
            curve: PhantomData,
        })
    }

    /// The server identity string.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// The identifier of the curve this configuration runs over.
    pub fn curve(&self) -> CurveId {
        C::ID
    }
}

/// The terminal result of a successful login, on either side.
///
/// The peer's `kc` must be checked against the local `kc_test` with
/// [`verify_key_confirmation`] before the key is used. All three fields are
/// scrubbed on drop; the caller decides how long to retain the key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthFinishResult {
    /// The derived 32-byte session key
    pub key: [u8; 32],
    /// The key-confirmation tag to send to the peer
    pub kc: [u8; 32],
    /// The key-confirmation tag expected from the peer
    pub kc_test: [u8; 32],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_empty_server_id() {
        assert!(matches!(
            Config::<p256::NistP256>::new(""),
            Err(Error::InvalidConfig)
        ));
    }

    #[test]
    fn config_reports_curve_id() {
        let config = Config::<p384::NistP384>::new("srv").unwrap();
        assert_eq!(config.curve(), CurveId::P384);
        assert_eq!(config.server_id(), "srv");
    }
}
