//! Canonical hashing of heterogeneous protocol tuples, plus the HMAC-based
//! key-confirmation tags.
//!
//! Every argument fed to the hash or MAC is framed as a 4-byte big-endian
//! length prefix followed by the argument's canonical octets: uncompressed
//! SEC1 for points, fixed-width big-endian for scalars, UTF-8 for identity
//! strings. The framing is mandatory; without it two different transcripts
//! could hash to the same digest.

use core::marker::PhantomData;

use digest::Digest;
use elliptic_curve::{
    ff::PrimeField,
    sec1::{ModulusSize, ToEncodedPoint},
    AffinePoint, FieldBytesSize, ProjectivePoint, Scalar,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::group::{encode_point, scalar_from_digest, OwlCurve};
use crate::zkp::Zkp;

/// SHA-256 over framed arguments, reduced to a scalar mod n.
pub(crate) struct FramedHasher<C: OwlCurve> {
    sha: Sha256,
    curve: PhantomData<C>,
}

impl<C> FramedHasher<C>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    pub fn new() -> Self {
        Self {
            sha: Sha256::new(),
            curve: PhantomData,
        }
    }

    fn frame(&mut self, octets: &[u8]) {
        self.sha.update((octets.len() as u32).to_be_bytes());
        self.sha.update(octets);
    }

    pub fn chain_point(mut self, point: &ProjectivePoint<C>) -> Self {
        self.frame(encode_point::<C>(point).as_bytes());
        self
    }

    pub fn chain_scalar(mut self, scalar: &Scalar<C>) -> Self {
        self.frame(scalar.to_repr().as_slice());
        self
    }

    pub fn chain_str(mut self, value: &str) -> Self {
        self.frame(value.as_bytes());
        self
    }

    pub fn finish(self) -> Scalar<C> {
        let digest: [u8; 32] = self.sha.finalize().into();
        scalar_from_digest::<C>(&digest)
    }
}

/// HMAC-SHA-256 keyed by `serialize(K)`, over the same framing as
/// [`FramedHasher`].
pub(crate) struct FramedHmac<C: OwlCurve> {
    mac: Hmac<Sha256>,
    curve: PhantomData<C>,
}

impl<C> FramedHmac<C>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    pub fn new(key: &ProjectivePoint<C>) -> Self {
        let mac = Hmac::<Sha256>::new_from_slice(encode_point::<C>(key).as_bytes())
            .expect("HMAC-SHA-256 accepts keys of any length");
        Self {
            mac,
            curve: PhantomData,
        }
    }

    fn frame(&mut self, octets: &[u8]) {
        self.mac.update(&(octets.len() as u32).to_be_bytes());
        self.mac.update(octets);
    }

    pub fn chain_point(mut self, point: &ProjectivePoint<C>) -> Self {
        self.frame(encode_point::<C>(point).as_bytes());
        self
    }

    pub fn chain_str(mut self, value: &str) -> Self {
        self.frame(value.as_bytes());
        self
    }

    pub fn finish(self) -> [u8; 32] {
        self.mac.finalize().into_bytes().into()
    }
}

/// SHA-256 of the canonical encoding of the shared point, used directly as
/// the 32-byte session key.
pub(crate) fn session_key<C>(shared: &ProjectivePoint<C>) -> [u8; 32]
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    Sha256::digest(encode_point::<C>(shared).as_bytes()).into()
}

/// The transcript hash binding both identities, every public ephemeral and
/// every proof of the session.
#[allow(clippy::too_many_arguments)]
pub(crate) fn transcript_hash<C>(
    shared: &ProjectivePoint<C>,
    username: &str,
    server_id: &str,
    x1_pub: &ProjectivePoint<C>,
    x2_pub: &ProjectivePoint<C>,
    x3_pub: &ProjectivePoint<C>,
    x4_pub: &ProjectivePoint<C>,
    pi1: &Zkp<C>,
    pi2: &Zkp<C>,
    pi3: &Zkp<C>,
    pi4: &Zkp<C>,
    beta: &ProjectivePoint<C>,
    pi_beta: &Zkp<C>,
    alpha: &ProjectivePoint<C>,
    pi_alpha: &Zkp<C>,
) -> Scalar<C>
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    FramedHasher::<C>::new()
        .chain_point(shared)
        .chain_str(username)
        .chain_point(x1_pub)
        .chain_point(x2_pub)
        .chain_scalar(&pi1.h)
        .chain_scalar(&pi1.r)
        .chain_scalar(&pi2.h)
        .chain_scalar(&pi2.r)
        .chain_str(server_id)
        .chain_point(x3_pub)
        .chain_point(x4_pub)
        .chain_scalar(&pi3.h)
        .chain_scalar(&pi3.r)
        .chain_scalar(&pi4.h)
        .chain_scalar(&pi4.r)
        .chain_point(beta)
        .chain_scalar(&pi_beta.h)
        .chain_scalar(&pi_beta.r)
        .chain_point(alpha)
        .chain_scalar(&pi_alpha.h)
        .chain_scalar(&pi_alpha.r)
        .finish()
}

/// Directional key-confirmation tag: `HMAC(K, id_a, id_b, P1, P2, P3, P4)`.
///
/// The client emits the tag over `(U, serverId, X1, X2, X3, X4)`; the server
/// emits the tag over `(serverId, U, X3, X4, X1, X2)`. Each side expects the
/// other ordering from its peer.
pub(crate) fn confirmation_tag<C>(
    shared: &ProjectivePoint<C>,
    id_a: &str,
    id_b: &str,
    p1: &ProjectivePoint<C>,
    p2: &ProjectivePoint<C>,
    p3: &ProjectivePoint<C>,
    p4: &ProjectivePoint<C>,
) -> [u8; 32]
where
    C: OwlCurve,
    FieldBytesSize<C>: ModulusSize,
    AffinePoint<C>: ToEncodedPoint<C>,
{
    FramedHmac::<C>::new(shared)
        .chain_str(id_a)
        .chain_str(id_b)
        .chain_point(p1)
        .chain_point(p2)
        .chain_point(p3)
        .chain_point(p4)
        .finish()
}

/// Compare a locally computed key-confirmation tag against the tag received
/// from the peer, in constant time.
#[must_use]
pub fn verify_key_confirmation(expected: &[u8; 32], received: &[u8; 32]) -> bool {
    expected.ct_eq(received).into()
}

#[cfg(feature = "serde")]
pub(crate) mod serde_point {
    use elliptic_curve::{
        sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint},
        AffinePoint, FieldBytesSize, ProjectivePoint,
    };
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use crate::group::{decode_point, encode_point, OwlCurve};

    pub fn serialize<C, S>(point: &ProjectivePoint<C>, serializer: S) -> Result<S::Ok, S::Error>
    where
        C: OwlCurve,
        FieldBytesSize<C>: ModulusSize,
        AffinePoint<C>: ToEncodedPoint<C>,
        S: Serializer,
    {
        serializer.serialize_bytes(encode_point::<C>(point).as_bytes())
    }

    pub fn deserialize<'de, C, D>(deserializer: D) -> Result<ProjectivePoint<C>, D::Error>
    where
        C: OwlCurve,
        FieldBytesSize<C>: ModulusSize,
        AffinePoint<C>: FromEncodedPoint<C>,
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        decode_point::<C>(&bytes).ok_or_else(|| D::Error::custom("invalid curve point encoding"))
    }
}

#[cfg(feature = "serde")]
pub(crate) mod serde_scalar {
    use elliptic_curve::{ff::PrimeField, Scalar};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use crate::group::{decode_scalar, OwlCurve};

    pub fn serialize<C, S>(scalar: &Scalar<C>, serializer: S) -> Result<S::Ok, S::Error>
    where
        C: OwlCurve,
        S: Serializer,
    {
        serializer.serialize_bytes(scalar.to_repr().as_slice())
    }

    pub fn deserialize<'de, C, D>(deserializer: D) -> Result<Scalar<C>, D::Error>
    where
        C: OwlCurve,
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        decode_scalar::<C>(&bytes).ok_or_else(|| D::Error::custom("invalid scalar encoding"))
    }
}
