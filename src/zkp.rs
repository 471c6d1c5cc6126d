//! Schnorr non-interactive zero-knowledge proofs of knowledge of a discrete
//! logarithm, made non-interactive with Fiat–Shamir.
//!
//! A proof is bound to the base it was produced over and to the prover's
//! identity string. The protocol verifies client proofs against the username
//! and server proofs against the server identity; the proofs for β and α are
//! over the composite bases `X1+X2+X3` and `X1+X3+X4` respectively.

use elliptic_curve::{
    sec1::{ModulusSize, ToEncodedPoint},
    AffinePoint, FieldBytesSize, ProjectivePoint, Scalar,
};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::group::{is_valid_point, random_scalar, OwlCurve};
use crate::utils::FramedHasher;

/// A Schnorr proof of knowledge of `x` such that `X = B·x`.
///
/// Validity is established only by [`Zkp::verify`]; holding a value of this
/// type says nothing about the statement.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(bound(serialize = "", deserialize = "")))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Zkp<C: OwlCurve> {
    /// The Fiat–Shamir challenge.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_scalar::serialize::<C, _>", deserialize_with = "crate::utils::serde_scalar::deserialize::<C, _>"))]
    pub h: Scalar<C>,
    /// The prover's response.
    #[cfg_attr(feature = "serde", serde(serialize_with = "crate::utils::serde_scalar::serialize::<C, _>", deserialize_with = "crate::utils::serde_scalar::deserialize::<C, _>"))]
    pub r: Scalar<C>,
}

impl<C> Zkp<C>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    /// Prove knowledge of `x` such that `public = base·x`, bound to the
    /// given prover identity.
    ///
    /// # Arguments:
    /// - `rng` - CSPRNG used to sample the commitment nonce
    /// - `x` - the witness scalar
    /// - `base` - the base the statement is over (not always the generator)
    /// - `public` - the statement, `base·x`
    /// - `prover_id` - identity string of the prover
    pub(crate) fn prove<CSPRNG>(
        rng: &mut CSPRNG,
        x: &Scalar<C>,
        base: &ProjectivePoint<C>,
        public: &ProjectivePoint<C>,
        prover_id: &str,
    ) -> Self
    where
        CSPRNG: RngCore + CryptoRng,
    {
        let mut v = random_scalar::<C, _>(rng);
        let commitment = *base * v;
        let h = FramedHasher::<C>::new()
            .chain_point(base)
            .chain_point(&commitment)
            .chain_point(public)
            .chain_str(prover_id)
            .finish();
        let r = v - *x * h;
        v.zeroize();
        Self { h, r }
    }

    /// Verify the proof against `(base, public, prover_id)`.
    ///
    /// The base must be the exact point the proof was produced over, and the
    /// prover identity must match the peer that claims the statement.
    #[must_use]
    pub fn verify(
        &self,
        base: &ProjectivePoint<C>,
        public: &ProjectivePoint<C>,
        prover_id: &str,
    ) -> bool {
        if !is_valid_point::<C>(public) {
            return false;
        }
        let commitment = *base * self.r + *public * self.h;
        let expected = FramedHasher::<C>::new()
            .chain_point(base)
            .chain_point(&commitment)
            .chain_point(public)
            .chain_str(prover_id)
            .finish();
        self.h == expected
    }
}

impl<C: OwlCurve> Zeroize for Zkp<C> {
    fn zeroize(&mut self) {
        self.h.zeroize();
        self.r.zeroize();
    }
}

#[cfg(all(test, feature = "getrandom"))]
mod tests {
    use super::*;
    use elliptic_curve::ff::Field;
    use elliptic_curve::group::Group;
    use p256::NistP256;
    use rand_core::OsRng;

    type Point = ProjectivePoint<NistP256>;

    fn statement() -> (Scalar<NistP256>, Point, Point) {
        let x = random_scalar::<NistP256, _>(&mut OsRng);
        let base = Point::generator();
        (x, base, base * x)
    }

    #[test]
    fn round_trip_verifies() {
        let (x, base, public) = statement();
        let proof = Zkp::<NistP256>::prove(&mut OsRng, &x, &base, &public, "alice");
        assert!(proof.verify(&base, &public, "alice"));
    }

    #[test]
    fn wrong_prover_identity_fails() {
        let (x, base, public) = statement();
        let proof = Zkp::<NistP256>::prove(&mut OsRng, &x, &base, &public, "alice");
        assert!(!proof.verify(&base, &public, "mallory"));
    }

    #[test]
    fn wrong_base_fails() {
        let (x, base, public) = statement();
        let proof = Zkp::<NistP256>::prove(&mut OsRng, &x, &base, &public, "alice");
        let other_base = base * random_scalar::<NistP256, _>(&mut OsRng);
        assert!(!proof.verify(&other_base, &public, "alice"));
    }

    #[test]
    fn wrong_statement_fails() {
        let (x, base, public) = statement();
        let proof = Zkp::<NistP256>::prove(&mut OsRng, &x, &base, &public, "alice");
        let other = base * random_scalar::<NistP256, _>(&mut OsRng);
        assert!(!proof.verify(&base, &other, "alice"));
    }

    #[test]
    fn tampered_components_fail() {
        let (x, base, public) = statement();
        let proof = Zkp::<NistP256>::prove(&mut OsRng, &x, &base, &public, "alice");

        let mut bad_h = proof;
        bad_h.h += Scalar::<NistP256>::ONE;
        assert!(!bad_h.verify(&base, &public, "alice"));

        let mut bad_r = proof;
        bad_r.r += Scalar::<NistP256>::ONE;
        assert!(!bad_r.verify(&base, &public, "alice"));
    }

    #[test]
    fn identity_statement_is_rejected() {
        let (x, base, public) = statement();
        let proof = Zkp::<NistP256>::prove(&mut OsRng, &x, &base, &public, "alice");
        assert!(!proof.verify(&base, &Point::identity(), "alice"));
    }

    #[test]
    fn composite_base_round_trip() {
        let (x, base, _) = statement();
        let composite = base * random_scalar::<NistP256, _>(&mut OsRng)
            + base * random_scalar::<NistP256, _>(&mut OsRng);
        let public = composite * x;
        let proof = Zkp::<NistP256>::prove(&mut OsRng, &x, &composite, &public, "srv");
        assert!(proof.verify(&composite, &public, "srv"));
        assert!(!proof.verify(&base, &public, "srv"));
    }
}
