// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! ASN.1 data structures defined by RFC 5652.

The types defined in this module are intended to be extremely low-level
and only to be used for (de)serialization. See types outside the
`asn1` module tree for higher-level functionality.

Only the subset the legacy token format exercises is modelled. Values
the conversion never interprets — issuer names, certificates, CRLs,
unsigned attributes — are captured as raw encodings and carried
opaquely.
*/

use {
    crate::asn1::{common::take_uint, rfc5280::AlgorithmIdentifier},
    bcder::{
        decode::{Constructed, DecodeError, Source},
        encode,
        encode::{PrimitiveContent, Values},
        Captured, ConstOid, Integer, Mode, OctetString, Oid, Tag,
    },
    std::io::Write,
};

/// The signed-data content type.
///
/// 1.2.840.113549.1.7.2
pub const OID_ID_SIGNED_DATA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 2]);

/// Identifies the content-type attribute.
///
/// 1.2.840.113549.1.9.3
pub const OID_CONTENT_TYPE: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 3]);

/// Identifies the message-digest attribute.
///
/// 1.2.840.113549.1.9.4
pub const OID_MESSAGE_DIGEST: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 4]);

/// Content info.
///
/// ```ASN.1
/// ContentInfo ::= SEQUENCE {
///   contentType ContentType,
///   content [0] EXPLICIT ANY DEFINED BY contentType }
/// ```
#[derive(Clone, Debug)]
pub struct ContentInfo {
    pub content_type: ContentType,
    pub content: Captured,
}

impl PartialEq for ContentInfo {
    fn eq(&self, other: &Self) -> bool {
        self.content_type == other.content_type
            && self.content.as_slice() == other.content.as_slice()
    }
}

impl Eq for ContentInfo {}

impl ContentInfo {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| Self::from_sequence(cons))
    }

    pub fn from_sequence<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        let content_type = Oid::take_from(cons)?;
        let content = cons.take_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;

        Ok(Self {
            content_type,
            content,
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            encode::sequence_as(Tag::CTX_0, &self.content),
        ))
    }
}

impl Values for ContentInfo {
    fn encoded_len(&self, mode: Mode) -> usize {
        self.encode_ref().encoded_len(mode)
    }

    fn write_encoded<W: Write>(&self, mode: Mode, target: &mut W) -> Result<(), std::io::Error> {
        self.encode_ref().write_encoded(mode, target)
    }
}

/// Represents signed data.
///
/// ASN.1 type specification:
///
/// ```ASN.1
/// SignedData ::= SEQUENCE {
///   version CMSVersion,
///   digestAlgorithms DigestAlgorithmIdentifiers,
///   encapContentInfo EncapsulatedContentInfo,
///   certificates [0] IMPLICIT CertificateSet OPTIONAL,
///   crls [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///   signerInfos SignerInfos }
/// ```
#[derive(Clone, Debug)]
pub struct SignedData {
    pub version: CmsVersion,
    pub digest_algorithms: Vec<DigestAlgorithmIdentifier>,
    pub content_info: EncapsulatedContentInfo,
    pub certificates: Option<Captured>,
    pub crls: Option<Captured>,
    pub signer_infos: Vec<SignerInfo>,
}

impl SignedData {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = CmsVersion::take_from(cons)?;
            let digest_algorithms = cons.take_set(|cons| {
                let mut identifiers = Vec::new();

                while let Some(identifier) = AlgorithmIdentifier::take_opt_from(cons)? {
                    identifiers.push(identifier);
                }

                Ok(identifiers)
            })?;
            let content_info = EncapsulatedContentInfo::take_from(cons)?;
            let certificates =
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;
            let crls = cons.take_opt_constructed_if(Tag::CTX_1, |cons| cons.capture_all())?;
            let signer_infos = cons.take_set(|cons| {
                let mut infos = Vec::new();

                while let Some(info) = SignerInfo::take_opt_from(cons)? {
                    infos.push(info);
                }

                Ok(infos)
            })?;

            Ok(Self {
                version,
                digest_algorithms,
                content_info,
                certificates,
                crls,
                signer_infos,
            })
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.version.encode(),
            encode::set(&self.digest_algorithms),
            self.content_info.encode_ref(),
            self.certificates.as_ref().map(|certs| {
                encode::sequence_as(Tag::CTX_0, certs)
            }),
            self.crls
                .as_ref()
                .map(|crls| encode::sequence_as(Tag::CTX_1, crls)),
            encode::set(&self.signer_infos),
        ))
    }
}

pub type DigestAlgorithmIdentifier = AlgorithmIdentifier;

pub type SignatureAlgorithmIdentifier = AlgorithmIdentifier;

pub type ContentType = Oid;

/// Encapsulated content info.
///
/// ```ASN.1
/// EncapsulatedContentInfo ::= SEQUENCE {
///   eContentType ContentType,
///   eContent [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncapsulatedContentInfo {
    pub content_type: ContentType,
    pub content: Option<OctetString>,
}

impl EncapsulatedContentInfo {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content =
                cons.take_opt_constructed_if(Tag::CTX_0, |cons| OctetString::take_from(cons))?;

            Ok(Self {
                content_type,
                content,
            })
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            self.content
                .as_ref()
                .map(|content| encode::sequence_as(Tag::CTX_0, content.encode_ref())),
        ))
    }
}

/// Per-signer information.
///
/// ```ASN.1
/// SignerInfo ::= SEQUENCE {
///   version CMSVersion,
///   sid SignerIdentifier,
///   digestAlgorithm DigestAlgorithmIdentifier,
///   signedAttrs [0] IMPLICIT SignedAttributes OPTIONAL,
///   signatureAlgorithm SignatureAlgorithmIdentifier,
///   signature SignatureValue,
///   unsignedAttrs [1] IMPLICIT UnsignedAttributes OPTIONAL }
/// ```
///
/// The legacy format requires the issuer-and-serial signer identifier
/// form; the issuer name itself is never interpreted and stays a raw
/// encoding. The signed attributes are buffered raw as well: RFC 5652
/// requires them to be DER even inside a BER stream, and the exact bytes
/// feed both the digest-bracket capture and the chain input hash.
#[derive(Clone, Debug)]
pub struct SignerInfo {
    pub version: CmsVersion,
    pub sid: IssuerAndSerialNumber,
    pub digest_algorithm: DigestAlgorithmIdentifier,
    pub signed_attributes: Option<Captured>,
    pub signature_algorithm: SignatureAlgorithmIdentifier,
    pub signature: OctetString,
    pub unsigned_attributes: Option<Captured>,
}

impl SignerInfo {
    pub fn take_opt_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| Self::from_sequence(cons))
    }

    pub fn from_sequence<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        let version = CmsVersion::take_from(cons)?;
        let sid = IssuerAndSerialNumber::take_from(cons)?;
        let digest_algorithm = AlgorithmIdentifier::take_from(cons)?;
        let signed_attributes =
            cons.take_opt_constructed_if(Tag::CTX_0, |cons| cons.capture_all())?;
        let signature_algorithm = AlgorithmIdentifier::take_from(cons)?;
        let signature = OctetString::take_from(cons)?;
        let unsigned_attributes =
            cons.take_opt_constructed_if(Tag::CTX_1, |cons| cons.capture_all())?;

        Ok(Self {
            version,
            sid,
            digest_algorithm,
            signed_attributes,
            signature_algorithm,
            signature,
            unsigned_attributes,
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.version.encode(),
            self.sid.encode_ref(),
            self.digest_algorithm.encode_ref(),
            self.signed_attributes
                .as_ref()
                .map(|attrs| encode::set_as(Tag::CTX_0, attrs)),
            self.signature_algorithm.encode_ref(),
            self.signature.encode_ref(),
            self.unsigned_attributes
                .as_ref()
                .map(|attrs| encode::set_as(Tag::CTX_1, attrs)),
        ))
    }
}

impl Values for SignerInfo {
    fn encoded_len(&self, mode: Mode) -> usize {
        self.encode_ref().encoded_len(mode)
    }

    fn write_encoded<W: Write>(&self, mode: Mode, target: &mut W) -> Result<(), std::io::Error> {
        self.encode_ref().write_encoded(mode, target)
    }
}

/// Issuer and serial number.
///
/// ```ASN.1
/// IssuerAndSerialNumber ::= SEQUENCE {
///   issuer Name,
///   serialNumber CertificateSerialNumber }
/// ```
#[derive(Clone, Debug)]
pub struct IssuerAndSerialNumber {
    pub issuer: Captured,
    pub serial_number: Integer,
}

impl IssuerAndSerialNumber {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let issuer = cons.capture_one()?;
            let serial_number = Integer::take_from(cons)?;

            Ok(Self {
                issuer,
                serial_number,
            })
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((&self.issuer, (&self.serial_number).encode()))
    }
}

/// Version number.
///
/// ```ASN.1
/// CMSVersion ::= INTEGER
///                { v0(0), v1(1), v2(2), v3(3), v4(4), v5(5) }
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CmsVersion {
    V0 = 0,
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
    V5 = 5,
}

impl CmsVersion {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        match take_uint(cons)? {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            4 => Ok(Self::V4),
            5 => Ok(Self::V5),
            _ => Err(cons.content_err("unknown CMSVersion")),
        }
    }

    pub fn encode(self) -> impl Values {
        u8::from(self).encode()
    }
}

impl From<CmsVersion> for u8 {
    fn from(v: CmsVersion) -> u8 {
        match v {
            CmsVersion::V0 => 0,
            CmsVersion::V1 => 1,
            CmsVersion::V2 => 2,
            CmsVersion::V3 => 3,
            CmsVersion::V4 => 4,
            CmsVersion::V5 => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_info_round_trips() {
        let inner = Captured::from_values(Mode::Der, 7u8.encode());
        let info = ContentInfo {
            content_type: Oid(bytes::Bytes::copy_from_slice(OID_ID_SIGNED_DATA.0)),
            content: Captured::from_values(Mode::Der, encode::sequence(&inner)),
        };

        let mut encoded = Vec::new();
        info.write_encoded(Mode::Der, &mut encoded).unwrap();

        let decoded = Constructed::decode(encoded.as_slice(), Mode::Der, |cons| {
            ContentInfo::take_from(cons)
        })
        .unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn cms_version_round_trips() {
        for version in [CmsVersion::V1, CmsVersion::V3] {
            let mut encoded = Vec::new();
            version
                .encode()
                .write_encoded(Mode::Der, &mut encoded)
                .unwrap();

            let decoded = Constructed::decode(encoded.as_slice(), Mode::Der, |cons| {
                CmsVersion::take_from(cons)
            })
            .unwrap();
            assert_eq!(decoded, version);
        }
    }
}
