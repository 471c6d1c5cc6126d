//! Implementation of the client side of the Owl protocol.

use elliptic_curve::{
    ff::Field,
    group::Group,
    sec1::{ModulusSize, ToEncodedPoint},
    AffinePoint, FieldBytesSize, ProjectivePoint, Scalar,
};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

#[cfg(feature = "serde")]
use elliptic_curve::sec1::FromEncodedPoint;

use crate::errors::{Error, Result};
use crate::group::{is_valid_point, random_scalar, OwlCurve};
use crate::server::AuthInitResponse;
use crate::utils::{confirmation_tag, session_key, transcript_hash, FramedHasher};
use crate::zkp::Zkp;
use crate::{AuthFinishResult, Config};

/// Client side of the Owl protocol.
///
/// Holds the immutable [`Config`] shared with the server and an owned CSPRNG.
/// Each login attempt produces a [`ClientInitVals`] state object which is
/// consumed exactly once by [`auth_finish`](OwlClient::auth_finish).
pub struct OwlClient<C, CSPRNG>
where
    C: OwlCurve,
    CSPRNG: RngCore + CryptoRng,
{
    config: Config<C>,
    rng: CSPRNG,
}

impl<C, CSPRNG> OwlClient<C, CSPRNG>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
    CSPRNG: RngCore + CryptoRng,
{
    /// Create a new client
    pub fn new(config: Config<C>, rng: CSPRNG) -> Self {
        Self { config, rng }
    }

    /// Create a registration request for a username/password pair.
    ///
    /// The request carries the password verifier `π = H(H(U‖w))` and the
    /// password element `T = G·H(U‖w)`; the password itself never leaves
    /// this function. The registration channel is assumed mutually
    /// authenticated and confidential by the deployment.
    ///
    /// # Return:
    /// either
    /// - Ok(`request`): the message to send to the server
    /// - Err([`Error::WeakPassword`]): the derived verifier reduced to zero
    pub fn register(&self, username: &str, password: &str) -> Result<RegistrationRequest<C>> {
        let (mut t, pi) = derive_password_values::<C>(username, password)?;
        let verifier = ProjectivePoint::<C>::generator() * t;
        t.zeroize();

        Ok(RegistrationRequest { pi, verifier })
    }

    /// Begin a login attempt - flow 1 of the exchange.
    ///
    /// # Arguments:
    /// - `username` - the username to authenticate as
    /// - `password` - the user's password
    ///
    /// # Return:
    /// (`state`, `message`)
    /// - `state`: the values to retain for [`auth_finish`](OwlClient::auth_finish)
    /// - `message`: the message to send to the server
    pub fn auth_init(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(ClientInitVals<C>, AuthInitRequest<C>)> {
        let (mut t, mut pi) = derive_password_values::<C>(username, password)?;

        let mut x1 = random_scalar::<C, _>(&mut self.rng);
        let mut x2 = random_scalar::<C, _>(&mut self.rng);
        let generator = ProjectivePoint::<C>::generator();
        let x1_pub = generator * x1;
        let x2_pub = generator * x2;
        let pi1 = Zkp::prove(&mut self.rng, &x1, &generator, &x1_pub, username);
        let pi2 = Zkp::prove(&mut self.rng, &x2, &generator, &x2_pub, username);

        let state = ClientInitVals {
            username: username.to_owned(),
            t,
            pi,
            x1,
            x2,
            x1_pub,
            x2_pub,
            pi1,
            pi2,
        };
        let message = AuthInitRequest {
            x1_pub,
            x2_pub,
            pi1,
            pi2,
        };

        t.zeroize();
        pi.zeroize();
        x1.zeroize();
        x2.zeroize();

        Ok((state, message))
    }

    /// Complete the login - flow 3 of the exchange.
    ///
    /// Consumes the state from [`auth_init`](OwlClient::auth_init); the state
    /// is scrubbed whether the flow succeeds or aborts.
    ///
    /// # Arguments:
    /// - `state` - the [`ClientInitVals`] retained from flow 1
    /// - `response` - the server's flow-2 message
    ///
    /// # Return:
    /// either
    /// - Ok((`message`, `result`)): the message to send to the server, and
    ///   the derived session key with both key-confirmation tags
    /// - Err([`Error::MalformedResponse`]): a server value failed curve
    ///   validity checks
    /// - Err([`Error::ZkpVerification`]): a server proof did not verify
    pub fn auth_finish(
        &mut self,
        state: ClientInitVals<C>,
        response: &AuthInitResponse<C>,
    ) -> Result<(AuthFinishRequest<C>, AuthFinishResult)> {
        if !is_valid_point::<C>(&response.x3_pub)
            || !is_valid_point::<C>(&response.x4_pub)
            || !is_valid_point::<C>(&response.beta)
        {
            return Err(Error::MalformedResponse);
        }

        let server_id = self.config.server_id();
        let generator = ProjectivePoint::<C>::generator();
        let beta_base = state.x1_pub + state.x2_pub + response.x3_pub;
        if !response.pi3.verify(&generator, &response.x3_pub, server_id)
            || !response.pi4.verify(&generator, &response.x4_pub, server_id)
            || !response.pi_beta.verify(&beta_base, &response.beta, server_id)
        {
            return Err(Error::ZkpVerification);
        }

        let mut s = state.x2 * state.pi;
        let alpha_base = state.x1_pub + response.x3_pub + response.x4_pub;
        let alpha = alpha_base * s;
        let pi_alpha = Zkp::prove(&mut self.rng, &s, &alpha_base, &alpha, &state.username);

        let mut shared = (response.beta - response.x4_pub * s) * state.x2;
        let h = transcript_hash(
            &shared,
            &state.username,
            server_id,
            &state.x1_pub,
            &state.x2_pub,
            &response.x3_pub,
            &response.x4_pub,
            &state.pi1,
            &state.pi2,
            &response.pi3,
            &response.pi4,
            &response.beta,
            &response.pi_beta,
            &alpha,
            &pi_alpha,
        );
        let r = state.x1 - state.t * h;

        let key = session_key::<C>(&shared);
        let kc = confirmation_tag::<C>(
            &shared,
            &state.username,
            server_id,
            &state.x1_pub,
            &state.x2_pub,
            &response.x3_pub,
            &response.x4_pub,
        );
        let kc_test = confirmation_tag::<C>(
            &shared,
            server_id,
            &state.username,
            &response.x3_pub,
            &response.x4_pub,
            &state.x1_pub,
            &state.x2_pub,
        );

        s.zeroize();
        shared.zeroize();
        drop(state);

        Ok((
            AuthFinishRequest { alpha, pi_alpha, r },
            AuthFinishResult { key, kc, kc_test },
        ))
    }
}

/// Derive the password-derived scalars `t = H(U‖w)` and `π = H(t)`.
fn derive_password_values<C>(username: &str, password: &str) -> Result<(Scalar<C>, Scalar<C>)>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    let mut t = FramedHasher::<C>::new()
        .chain_str(username)
        .chain_str(password)
        .finish();
    // t == 0 would make T the identity element
    if bool::from(t.is_zero()) {
        return Err(Error::WeakPassword);
    }
    let pi = FramedHasher::<C>::new().chain_scalar(&t).finish();
    if bool::from(pi.is_zero()) {
        t.zeroize();
        return Err(Error::WeakPassword);
    }
    Ok((t, pi))
}

/// Client-held state between flow 1 and flow 3 of a login attempt.
///
/// Consumed exactly once by [`OwlClient::auth_finish`]; every field is
/// scrubbed on drop, so an abandoned login leaks nothing.
pub struct ClientInitVals<C: OwlCurve> {
    pub(crate) username: String,
    pub(crate) t: Scalar<C>,
    pub(crate) pi: Scalar<C>,
    pub(crate) x1: Scalar<C>,
    pub(crate) x2: Scalar<C>,
    pub(crate) x1_pub: ProjectivePoint<C>,
    pub(crate) x2_pub: ProjectivePoint<C>,
    pub(crate) pi1: Zkp<C>,
    pub(crate) pi2: Zkp<C>,
}

impl<C: OwlCurve> Zeroize for ClientInitVals<C> {
    fn zeroize(&mut self) {
        self.username.zeroize();
        self.t.zeroize();
        self.pi.zeroize();
        self.x1.zeroize();
        self.x2.zeroize();
        self.x1_pub.zeroize();
        self.x2_pub.zeroize();
        self.pi1.zeroize();
        self.pi2.zeroize();
    }
}

impl<C: OwlCurve> Drop for ClientInitVals<C> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Registration message - the password verifier and password element for a
/// new user.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: ToEncodedPoint<C>",
        deserialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: FromEncodedPoint<C>"
    ))
)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRequest<C: OwlCurve> {
    /// The password verifier `π = H(H(U‖w))`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_scalar::serialize::<C, _>", deserialize_with = "crate::utils::serde_scalar::deserialize::<C, _>"))]
    pub pi: Scalar<C>,
    /// The password element `T = G·H(U‖w)`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub verifier: ProjectivePoint<C>,
}

/// Flow-1 message - the client's ephemerals `X1`, `X2` with their proofs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: ToEncodedPoint<C>",
        deserialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: FromEncodedPoint<C>"
    ))
)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AuthInitRequest<C: OwlCurve> {
    /// `X1 = G·x1`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub x1_pub: ProjectivePoint<C>,
    /// `X2 = G·x2`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub x2_pub: ProjectivePoint<C>,
    /// Proof of knowledge of `x1`
    pub pi1: Zkp<C>,
    /// Proof of knowledge of `x2`
    pub pi2: Zkp<C>,
}

/// Flow-3 message - `α` with its proof, and the password-binding response
/// `r = x1 - t·h`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: ToEncodedPoint<C>",
        deserialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: FromEncodedPoint<C>"
    ))
)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AuthFinishRequest<C: OwlCurve> {
    /// `α = (X1+X3+X4)·(x2·π)`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub alpha: ProjectivePoint<C>,
    /// Proof of knowledge of `x2·π` over the base `X1+X3+X4`
    pub pi_alpha: Zkp<C>,
    /// The transcript-bound password response
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_scalar::serialize::<C, _>", deserialize_with = "crate::utils::serde_scalar::deserialize::<C, _>"))]
    pub r: Scalar<C>,
}

#[cfg(all(test, feature = "getrandom"))]
mod tests {
    use super::*;
    use p256::NistP256;
    use rand_core::OsRng;

    fn client() -> OwlClient<NistP256, OsRng> {
        let config = Config::new("srv").unwrap();
        OwlClient::new(config, OsRng)
    }

    #[test]
    fn registration_is_deterministic_per_password() {
        let client = client();
        let a = client.register("alice", "hunter2").unwrap();
        let b = client.register("alice", "hunter2").unwrap();
        assert_eq!(a, b);

        let other = client.register("alice", "hunter3").unwrap();
        assert_ne!(a.pi, other.pi);
        assert_ne!(a.verifier, other.verifier);
    }

    #[test]
    fn auth_init_proofs_verify_against_username() {
        let mut client = client();
        let (_state, request) = client.auth_init("alice", "hunter2").unwrap();
        let generator = ProjectivePoint::<NistP256>::generator();
        assert!(request.pi1.verify(&generator, &request.x1_pub, "alice"));
        assert!(request.pi2.verify(&generator, &request.x2_pub, "alice"));
        assert!(!request.pi1.verify(&generator, &request.x1_pub, "bob"));
    }

    #[test]
    fn init_vals_zeroize_scrubs_secrets() {
        let mut client = client();
        let (mut state, _request) = client.auth_init("alice", "hunter2").unwrap();
        state.zeroize();
        assert!(state.username.is_empty());
        assert_eq!(state.t, Scalar::<NistP256>::ZERO);
        assert_eq!(state.pi, Scalar::<NistP256>::ZERO);
        assert_eq!(state.x1, Scalar::<NistP256>::ZERO);
        assert_eq!(state.x2, Scalar::<NistP256>::ZERO);
        assert_eq!(state.pi1.h, Scalar::<NistP256>::ZERO);
        assert_eq!(state.pi1.r, Scalar::<NistP256>::ZERO);
    }
}
