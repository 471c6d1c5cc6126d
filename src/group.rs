//! Group arithmetic over the supported NIST curves.
//!
//! Protocol code is generic over [`OwlCurve`]; the curve crates supply the
//! published parameters (order, base point, field arithmetic) bit-for-bit.
//! All three supported curves are prime-order with cofactor 1, so a point
//! that decodes onto the curve is automatically in the prime-order subgroup.

use core::fmt;

use elliptic_curve::{
    group::{Curve as _, Group},
    ops::Reduce,
    sec1::{EncodedPoint, ModulusSize, ToEncodedPoint},
    AffinePoint, CurveArithmetic, FieldBytes, FieldBytesSize, NonZeroScalar, PrimeCurve,
    ProjectivePoint, Scalar,
};
use rand_core::{CryptoRng, RngCore};

#[cfg(any(test, feature = "serde"))]
use elliptic_curve::{ff::PrimeField, sec1::FromEncodedPoint};

/// Identifier for a supported curve, carried by [`Config`](crate::Config)
/// and bound into serialized credentials by deployments that need it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CurveId {
    /// NIST P-256 (secp256r1)
    P256,
    /// NIST P-384 (secp384r1)
    P384,
    /// NIST P-521 (secp521r1)
    P521,
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveId::P256 => f.write_str("P-256"),
            CurveId::P384 => f.write_str("P-384"),
            CurveId::P521 => f.write_str("P-521"),
        }
    }
}

/// Marker trait for the curves the protocol runs over.
///
/// Implemented for [`p256::NistP256`], [`p384::NistP384`] and
/// [`p521::NistP521`].
pub trait OwlCurve: PrimeCurve + CurveArithmetic {
    /// Identifier tag for this curve.
    const ID: CurveId;
}

impl OwlCurve for p256::NistP256 {
    const ID: CurveId = CurveId::P256;
}

impl OwlCurve for p384::NistP384 {
    const ID: CurveId = CurveId::P384;
}

impl OwlCurve for p521::NistP521 {
    const ID: CurveId = CurveId::P521;
}

/// Sample a uniformly random scalar in `[1, n-1]`.
pub(crate) fn random_scalar<C, CSPRNG>(rng: &mut CSPRNG) -> Scalar<C>
where
    C: OwlCurve,
    CSPRNG: RngCore + CryptoRng,
{
    *NonZeroScalar::<C>::random(rng).as_ref()
}

/// Serialize a point to its canonical uncompressed SEC1 encoding.
///
/// The same bytes feed wire messages, the transcript hash and the
/// key-confirmation MAC key.
pub(crate) fn encode_point<C>(point: &ProjectivePoint<C>) -> EncodedPoint<C>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    point.to_affine().to_encoded_point(false)
}

/// Decode a SEC1 point encoding, rejecting off-curve inputs and the identity.
#[cfg(any(test, feature = "serde"))]
pub(crate) fn decode_point<C>(bytes: &[u8]) -> Option<ProjectivePoint<C>>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: FromEncodedPoint<C>,
{
    let encoded = EncodedPoint::<C>::from_bytes(bytes).ok()?;
    let affine = Option::<AffinePoint<C>>::from(AffinePoint::<C>::from_encoded_point(&encoded))?;
    let point = ProjectivePoint::<C>::from(affine);
    if bool::from(point.is_identity()) {
        None
    } else {
        Some(point)
    }
}

/// Validity check for a point already held in memory.
///
/// Decoded points are on the curve by construction, so the only degenerate
/// value left to reject is the identity element.
pub(crate) fn is_valid_point<C>(point: &ProjectivePoint<C>) -> bool
where
    C: OwlCurve,
{
    !bool::from(point.is_identity())
}

/// Interpret a SHA-256 digest as a big-endian integer and reduce it modulo
/// the group order.
///
/// The digest is left-padded into the curve's field width, so for P-384 and
/// P-521 the reduction is the identity map.
pub(crate) fn scalar_from_digest<C>(digest: &[u8; 32]) -> Scalar<C>
where
    C: OwlCurve,
{
    let mut bytes = FieldBytes::<C>::default();
    let offset = bytes.len() - digest.len();
    bytes[offset..].copy_from_slice(digest);
    <Scalar<C> as Reduce<C::Uint>>::reduce_bytes(&bytes)
}

/// Decode a fixed-width big-endian scalar, rejecting values `>= n`.
#[cfg(any(test, feature = "serde"))]
pub(crate) fn decode_scalar<C>(bytes: &[u8]) -> Option<Scalar<C>>
where
    C: OwlCurve,
{
    if bytes.len() != FieldBytes::<C>::default().len() {
        return None;
    }
    let repr = FieldBytes::<C>::clone_from_slice(bytes);
    Option::from(Scalar::<C>::from_repr(repr))
}

#[cfg(all(test, feature = "getrandom"))]
mod tests {
    use super::*;
    use elliptic_curve::ff::Field;
    use p256::NistP256;
    use rand_core::OsRng;

    #[test]
    fn random_scalars_are_nonzero_and_distinct() {
        let a = random_scalar::<NistP256, _>(&mut OsRng);
        let b = random_scalar::<NistP256, _>(&mut OsRng);
        assert_ne!(a, Scalar::<NistP256>::ZERO);
        assert_ne!(a, b);
    }

    #[test]
    fn point_encoding_round_trips() {
        let x = random_scalar::<NistP256, _>(&mut OsRng);
        let point = ProjectivePoint::<NistP256>::generator() * x;
        let encoded = encode_point::<NistP256>(&point);
        let decoded = decode_point::<NistP256>(encoded.as_bytes()).unwrap();
        assert_eq!(point, decoded);
    }

    #[test]
    fn decoding_rejects_identity_and_garbage() {
        // SEC1 identity encoding is the single byte 0x00
        assert!(decode_point::<NistP256>(&[0x00]).is_none());
        assert!(decode_point::<NistP256>(&[]).is_none());
        assert!(decode_point::<NistP256>(&[0x04; 65]).is_none());
    }

    #[test]
    fn scalar_decoding_rejects_wrong_width() {
        let x = random_scalar::<NistP256, _>(&mut OsRng);
        let repr = x.to_repr();
        assert_eq!(decode_scalar::<NistP256>(repr.as_slice()), Some(x));
        assert!(decode_scalar::<NistP256>(&repr.as_slice()[1..]).is_none());
    }

    #[test]
    fn digest_reduction_is_stable() {
        let digest = [0xabu8; 32];
        assert_eq!(
            scalar_from_digest::<NistP256>(&digest),
            scalar_from_digest::<NistP256>(&digest),
        );
    }
}
