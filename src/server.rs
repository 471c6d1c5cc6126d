//! Implementation of the server side of the Owl protocol.

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

use crate::client::{AuthFinishRequest, AuthInitRequest, RegistrationRequest};
use crate::errors::{Error, Result};
use crate::group::{is_valid_point, random_scalar, OwlCurve};
use crate::utils::{confirmation_tag, session_key, transcript_hash};
use crate::zkp::Zkp;
use crate::{AuthFinishResult, Config};

/// Server side of the Owl protocol.
///
/// Holds the immutable [`Config`] shared with the clients and an owned
/// CSPRNG. Each login session produces an [`AuthInitialValues`] state object
/// which is consumed exactly once by
/// [`auth_finish`](OwlServer::auth_finish).
pub struct OwlServer<C, CSPRNG>
where
    C: OwlCurve,
    CSPRNG: RngCore + CryptoRng,
{
    config: Config<C>,
    rng: CSPRNG,
}

impl<C, CSPRNG> OwlServer<C, CSPRNG>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
    CSPRNG: RngCore + CryptoRng,
{
    /// Create a new server
    pub fn new(config: Config<C>, rng: CSPRNG) -> Self {
        Self { config, rng }
    }

    /// Process a registration request into the credential record to persist
    /// for the user.
    ///
    /// The server contributes its own long-term ephemeral `x3` here; the
    /// secret scalar is scrubbed before returning and only `X3` with its
    /// proof is retained.
    ///
    /// # Return:
    /// either
    /// - Ok(`credentials`): the record to store for the user
    /// - Err([`Error::MalformedRequest`]): the request failed validity checks
    pub fn register(&mut self, request: &RegistrationRequest<C>) -> Result<UserCredentials<C>> {
        if !is_valid_point::<C>(&request.verifier) || bool::from(request.pi.is_zero()) {
            return Err(Error::MalformedRequest);
        }

        let mut x3 = random_scalar::<C, _>(&mut self.rng);
        let generator = ProjectivePoint::<C>::generator();
        let x3_pub = generator * x3;
        let pi3 = Zkp::prove(
            &mut self.rng,
            &x3,
            &generator,
            &x3_pub,
            self.config.server_id(),
        );
        x3.zeroize();

        Ok(UserCredentials {
            x3_pub,
            pi3,
            pi: request.pi,
            verifier: request.verifier,
        })
    }

    /// Produce a well-formed random credential record.
    ///
    /// The user-enumeration hook: when a lookup fails, run the state machine
    /// against fake credentials and report the inevitable failure as
    /// [`Error::Authentication`], so an attacker cannot distinguish an
    /// unknown user from a wrong password by timing.
    pub fn fake_credentials(&mut self) -> UserCredentials<C> {
        let mut x3 = random_scalar::<C, _>(&mut self.rng);
        let mut fake_t = random_scalar::<C, _>(&mut self.rng);
        let generator = ProjectivePoint::<C>::generator();
        let x3_pub = generator * x3;
        let pi3 = Zkp::prove(
            &mut self.rng,
            &x3,
            &generator,
            &x3_pub,
            self.config.server_id(),
        );
        let credentials = UserCredentials {
            x3_pub,
            pi3,
            pi: random_scalar::<C, _>(&mut self.rng),
            verifier: generator * fake_t,
        };
        x3.zeroize();
        fake_t.zeroize();
        credentials
    }

    /// Answer a flow-1 message - flow 2 of the exchange.
    ///
    /// # Arguments:
    /// - `username` - the user the request claims to be from
    /// - `request` - the client's flow-1 message
    /// - `credentials` - the stored record for that user
    ///
    /// # Return:
    /// (`state`, `message`)
    /// - `state`: the values to retain for [`auth_finish`](OwlServer::auth_finish)
    /// - `message`: the message to send to the client
    pub fn auth_init(
        &mut self,
        username: &str,
        request: &AuthInitRequest<C>,
        credentials: &UserCredentials<C>,
    ) -> Result<(AuthInitialValues<C>, AuthInitResponse<C>)> {
        if !is_valid_point::<C>(&request.x1_pub) || !is_valid_point::<C>(&request.x2_pub) {
            return Err(Error::MalformedRequest);
        }

        let generator = ProjectivePoint::<C>::generator();
        if !request.pi1.verify(&generator, &request.x1_pub, username)
            || !request.pi2.verify(&generator, &request.x2_pub, username)
        {
            return Err(Error::ZkpVerification);
        }

        let mut x4 = random_scalar::<C, _>(&mut self.rng);
        let x4_pub = generator * x4;
        let pi4 = Zkp::prove(
            &mut self.rng,
            &x4,
            &generator,
            &x4_pub,
            self.config.server_id(),
        );

        let mut s = x4 * credentials.pi;
        let beta_base = request.x1_pub + request.x2_pub + credentials.x3_pub;
        let beta = beta_base * s;
        if !is_valid_point::<C>(&beta) {
            s.zeroize();
            x4.zeroize();
            return Err(Error::MalformedRequest);
        }
        let pi_beta = Zkp::prove(&mut self.rng, &s, &beta_base, &beta, self.config.server_id());
        s.zeroize();

        let state = AuthInitialValues {
            verifier: credentials.verifier,
            pi: credentials.pi,
            x4,
            x1_pub: request.x1_pub,
            x2_pub: request.x2_pub,
            x3_pub: credentials.x3_pub,
            x4_pub,
            beta,
            pi1: request.pi1,
            pi2: request.pi2,
            pi3: credentials.pi3,
            pi4,
            pi_beta,
        };
        let message = AuthInitResponse {
            x3_pub: credentials.x3_pub,
            x4_pub,
            pi3: credentials.pi3,
            pi4,
            beta,
            pi_beta,
        };

        x4.zeroize();

        Ok((state, message))
    }

    /// Verify a flow-3 message and derive the session key.
    ///
    /// Consumes the state from [`auth_init`](OwlServer::auth_init); the
    /// state is scrubbed whether the flow succeeds or aborts.
    ///
    /// # Arguments:
    /// - `username` - the user this session belongs to
    /// - `request` - the client's flow-3 message
    /// - `state` - the [`AuthInitialValues`] retained from flow 2
    ///
    /// # Return:
    /// either
    /// - Ok(`result`): the derived session key with both key-confirmation tags
    /// - Err([`Error::ZkpVerification`]): `α` failed validity checks or its
    ///   proof did not verify
    /// - Err([`Error::Authentication`]): the password check failed
    pub fn auth_finish(
        &mut self,
        username: &str,
        request: &AuthFinishRequest<C>,
        state: AuthInitialValues<C>,
    ) -> Result<AuthFinishResult> {
        let alpha_base = state.x1_pub + state.x3_pub + state.x4_pub;
        if !is_valid_point::<C>(&request.alpha)
            || !request.pi_alpha.verify(&alpha_base, &request.alpha, username)
        {
            return Err(Error::ZkpVerification);
        }

        let mut s = state.x4 * state.pi;
        let mut shared = (request.alpha - state.x2_pub * s) * state.x4;
        let h = transcript_hash(
            &shared,
            username,
            self.config.server_id(),
            &state.x1_pub,
            &state.x2_pub,
            &state.x3_pub,
            &state.x4_pub,
            &state.pi1,
            &state.pi2,
            &state.pi3,
            &state.pi4,
            &state.beta,
            &state.pi_beta,
            &request.alpha,
            &request.pi_alpha,
        );

        // the password check: G·r + T·h must reassemble X1
        let generator = ProjectivePoint::<C>::generator();
        if generator * request.r + state.verifier * h != state.x1_pub {
            s.zeroize();
            shared.zeroize();
            return Err(Error::Authentication);
        }

        let key = session_key::<C>(&shared);
        let kc = confirmation_tag::<C>(
            &shared,
            self.config.server_id(),
            username,
            &state.x3_pub,
            &state.x4_pub,
            &state.x1_pub,
            &state.x2_pub,
        );
        let kc_test = confirmation_tag::<C>(
            &shared,
            username,
            self.config.server_id(),
            &state.x1_pub,
            &state.x2_pub,
            &state.x3_pub,
            &state.x4_pub,
        );

        s.zeroize();
        shared.zeroize();
        drop(state);

        Ok(AuthFinishResult { key, kc, kc_test })
    }
}

/// The per-user record the server persists at registration.
///
/// Holds no password material beyond the verifier pair (`π`, `T`); a stolen
/// record only yields an offline dictionary-attack target. Persistence must
/// preserve all four fields byte-identically.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: ToEncodedPoint<C>",
        deserialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: FromEncodedPoint<C>"
    ))
)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UserCredentials<C: OwlCurve> {
    /// `X3 = G·x3`, the server's per-user public value
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub x3_pub: ProjectivePoint<C>,
    /// Proof of knowledge of `x3`, replayed to the client in every login
    pub pi3: Zkp<C>,
    /// The password verifier `π`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_scalar::serialize::<C, _>", deserialize_with = "crate::utils::serde_scalar::deserialize::<C, _>"))]
    pub pi: Scalar<C>,
    /// The password element `T`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub verifier: ProjectivePoint<C>,
}

/// Flow-2 message - the server's values `X3`, `X4`, `β` with their proofs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: ToEncodedPoint<C>",
        deserialize = "FieldBytesSize<C>: ModulusSize, AffinePoint<C>: FromEncodedPoint<C>"
    ))
)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AuthInitResponse<C: OwlCurve> {
    /// `X3 = G·x3`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub x3_pub: ProjectivePoint<C>,
    /// `X4 = G·x4`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub x4_pub: ProjectivePoint<C>,
    /// Proof of knowledge of `x3`
    pub pi3: Zkp<C>,
    /// Proof of knowledge of `x4`
    pub pi4: Zkp<C>,
    /// `β = (X1+X2+X3)·(x4·π)`
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_point::serialize::<C, _>", deserialize_with = "crate::utils::serde_point::deserialize::<C, _>"))]
    pub beta: ProjectivePoint<C>,
    /// Proof of knowledge of `x4·π` over the base `X1+X2+X3`
    pub pi_beta: Zkp<C>,
}

/// Server-held state between flow 2 and the finish of a login session.
///
/// Consumed exactly once by [`OwlServer::auth_finish`]; every field is
/// scrubbed on drop, so an expired or abandoned session leaks nothing.
pub struct AuthInitialValues<C: OwlCurve> {
    pub(crate) verifier: ProjectivePoint<C>,
    pub(crate) pi: Scalar<C>,
    pub(crate) x4: Scalar<C>,
    pub(crate) x1_pub: ProjectivePoint<C>,
    pub(crate) x2_pub: ProjectivePoint<C>,
    pub(crate) x3_pub: ProjectivePoint<C>,
    pub(crate) x4_pub: ProjectivePoint<C>,
    pub(crate) beta: ProjectivePoint<C>,
    pub(crate) pi1: Zkp<C>,
    pub(crate) pi2: Zkp<C>,
    pub(crate) pi3: Zkp<C>,
    pub(crate) pi4: Zkp<C>,
    pub(crate) pi_beta: Zkp<C>,
}

impl<C: OwlCurve> Zeroize for AuthInitialValues<C> {
    fn zeroize(&mut self) {
        self.verifier.zeroize();
        self.pi.zeroize();
        self.x4.zeroize();
        self.x1_pub.zeroize();
        self.x2_pub.zeroize();
        self.x3_pub.zeroize();
        self.x4_pub.zeroize();
        self.beta.zeroize();
        self.pi1.zeroize();
        self.pi2.zeroize();
        self.pi3.zeroize();
        self.pi4.zeroize();
        self.pi_beta.zeroize();
    }
}

impl<C: OwlCurve> Drop for AuthInitialValues<C> {
    fn drop(&mut self) {
        self.zeroize();
    }
}
