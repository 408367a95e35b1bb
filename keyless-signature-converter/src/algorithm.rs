// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Hash algorithm registry.

The legacy format identifies hash algorithms three ways: by X.509 OID
inside ASN.1 structures, by a single-byte vendor id inside chain link
encodings, and implicitly by digest length. The supported set is fixed
and every identifier round-trips losslessly through [HashAlgorithm].
*/

use {
    crate::ConvertError,
    bcder::{ConstOid, Oid},
    digest::Digest,
    std::fmt::Display,
};

/// SHA-1 digest algorithm.
///
/// 1.3.14.3.2.26
const OID_SHA1: ConstOid = Oid(&[43, 14, 3, 2, 26]);

/// SHA-256 digest algorithm.
///
/// 2.16.840.1.101.3.4.2.1
const OID_SHA256: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 1]);

/// RIPEMD-160 digest algorithm.
///
/// 1.3.36.3.2.1
const OID_RIPEMD160: ConstOid = Oid(&[43, 36, 3, 2, 1]);

/// SHA-224 digest algorithm.
///
/// 2.16.840.1.101.3.4.2.4
const OID_SHA224: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 4]);

/// SHA-384 digest algorithm.
///
/// 2.16.840.1.101.3.4.2.2
const OID_SHA384: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 2]);

/// SHA-512 digest algorithm.
///
/// 2.16.840.1.101.3.4.2.3
const OID_SHA512: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 3]);

/// A hashing algorithm supported by the legacy chain encodings.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    /// SHA-1. Vendor id 0.
    Sha1,

    /// SHA-256. Vendor id 1.
    Sha256,

    /// RIPEMD-160. Vendor id 2.
    Ripemd160,

    /// SHA-224. Vendor id 3. Only ever seen carrying legacy id imprints.
    Sha224,

    /// SHA-384. Vendor id 4.
    Sha384,

    /// SHA-512. Vendor id 5.
    Sha512,
}

impl HashAlgorithm {
    /// Resolve an algorithm from its X.509 OID.
    pub fn from_oid(oid: &Oid) -> Result<Self, ConvertError> {
        if oid == &OID_SHA1 {
            Ok(Self::Sha1)
        } else if oid == &OID_SHA256 {
            Ok(Self::Sha256)
        } else if oid == &OID_RIPEMD160 {
            Ok(Self::Ripemd160)
        } else if oid == &OID_SHA224 {
            Ok(Self::Sha224)
        } else if oid == &OID_SHA384 {
            Ok(Self::Sha384)
        } else if oid == &OID_SHA512 {
            Ok(Self::Sha512)
        } else {
            Err(ConvertError::argument(format!(
                "unsupported algorithm OID: {}",
                oid
            )))
        }
    }

    /// Resolve an algorithm from its single-byte vendor id.
    pub fn from_gt_id(id: u8) -> Result<Self, ConvertError> {
        match id {
            0 => Ok(Self::Sha1),
            1 => Ok(Self::Sha256),
            2 => Ok(Self::Ripemd160),
            3 => Ok(Self::Sha224),
            4 => Ok(Self::Sha384),
            5 => Ok(Self::Sha512),
            n => Err(ConvertError::argument(format!(
                "unsupported algorithm GTID: {}",
                n
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Ripemd160 => "RIPEMD-160",
            Self::Sha224 => "SHA-224",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    pub fn oid(&self) -> ConstOid {
        match self {
            Self::Sha1 => OID_SHA1,
            Self::Sha256 => OID_SHA256,
            Self::Ripemd160 => OID_RIPEMD160,
            Self::Sha224 => OID_SHA224,
            Self::Sha384 => OID_SHA384,
            Self::Sha512 => OID_SHA512,
        }
    }

    pub fn gt_id(&self) -> u8 {
        match self {
            Self::Sha1 => 0,
            Self::Sha256 => 1,
            Self::Ripemd160 => 2,
            Self::Sha224 => 3,
            Self::Sha384 => 4,
            Self::Sha512 => 5,
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Ripemd160 => 20,
            Self::Sha224 => 28,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Hash `data` and wrap the digest as an [Imprint].
    pub fn digest(&self, data: &[u8]) -> Imprint {
        let digest = match self {
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Ripemd160 => ripemd::Ripemd160::digest(data).to_vec(),
            Self::Sha224 => sha2::Sha224::digest(data).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        };

        Imprint {
            algorithm: *self,
            digest,
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An algorithm-qualified digest.
///
/// The wire form is a single vendor id byte followed by exactly
/// `algorithm.digest_len()` digest bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Imprint {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Imprint {
    pub fn new(algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Self, ConvertError> {
        if digest.len() != algorithm.digest_len() {
            return Err(ConvertError::argument(format!(
                "invalid imprint length: {}",
                digest.len()
            )));
        }

        Ok(Self { algorithm, digest })
    }

    /// Parse the wire form.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConvertError> {
        let (&id, digest) = data
            .split_first()
            .ok_or_else(|| ConvertError::argument("empty hash imprint"))?;

        Self::new(HashAlgorithm::from_gt_id(id)?, digest.to_vec())
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Serialise to the wire form. The returned buffer is an independent copy.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + self.digest.len());
        data.push(self.algorithm.gt_id());
        data.extend_from_slice(&self.digest);

        data
    }
}

impl Display for Imprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{}:{}",
            self.algorithm,
            hex::encode(&self.digest)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Ripemd160,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    #[test]
    fn registry_round_trips() {
        for alg in ALL {
            assert_eq!(HashAlgorithm::from_gt_id(alg.gt_id()).unwrap(), alg);

            let oid = Oid(bytes::Bytes::copy_from_slice(alg.oid().as_ref()));
            assert_eq!(HashAlgorithm::from_oid(&oid).unwrap(), alg);
        }
    }

    #[test]
    fn digest_lengths() {
        for (alg, len) in ALL.iter().zip([20, 32, 20, 28, 48, 64]) {
            assert_eq!(alg.digest_len(), len);
            assert_eq!(alg.digest(b"abc").digest().len(), len);
        }
    }

    #[test]
    fn unknown_gt_id() {
        match HashAlgorithm::from_gt_id(50) {
            Err(ConvertError::Argument(message)) => {
                assert_eq!(message, "unsupported algorithm GTID: 50");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn digests_match_reference_vectors() {
        let vectors = [
            (HashAlgorithm::Sha1, "a9993e364706816aba3e25717850c26c9cd0d89d"),
            (
                HashAlgorithm::Sha256,
                "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            ),
            (
                HashAlgorithm::Ripemd160,
                "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc",
            ),
            (
                HashAlgorithm::Sha224,
                "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7",
            ),
            (
                HashAlgorithm::Sha384,
                "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed8086072ba1e7cc2358baeca134c825a7",
            ),
            (
                HashAlgorithm::Sha512,
                "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f",
            ),
        ];

        for (alg, expected) in vectors {
            assert_eq!(hex::encode(alg.digest(b"abc").digest()), expected);
        }
    }

    #[test]
    fn imprint_wire_form() {
        let imprint = HashAlgorithm::Sha256.digest(b"abc");
        let wire = imprint.to_bytes();
        assert_eq!(wire[0], 1);
        assert_eq!(wire.len(), 33);

        let parsed = Imprint::from_bytes(&wire).unwrap();
        assert_eq!(parsed, imprint);

        assert!(Imprint::from_bytes(&[]).is_err());
        assert!(Imprint::from_bytes(&[1, 0, 0]).is_err());
    }
}
