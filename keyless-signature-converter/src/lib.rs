// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Legacy time-stamp token to keyless signature conversion.

A legacy token is a CMS/RFC 3161 `ContentInfo` whose `SignerInfo`
carries a vendor `TimeSignature` structure in place of an RSA signature.
The `TimeSignature` embeds two compact Merkle chain encodings: the
`location` chain aggregating the signed document up to one calendar
second, and the `history` chain connecting that second to a publication.

This crate converts such a token into the equivalent keyless signature,
an in-memory TLV tree:

* a strict DER reader extracts the legacy structures and captures the
  byte-exact envelopes around the `TSTInfo` hashed message and the
  `message-digest` signed attribute;
* the chain builders re-derive every intermediate hash from the compact
  link encodings and emit structured aggregation and calendar chain
  elements;
* the assembler stitches the chains and an RFC 3161 record into a
  single signature element.

Serialising the tree, verifying the result against a publications file
and talking to an extender service are the host SDK's concern, not this
crate's. The legacy PKI signature is never verified either; its
presence only marks the token as not yet extended.

# Example

```no_run
use keyless_signature_converter::LegacySignature;

let data = std::fs::read("document.gtts").unwrap();
let token = LegacySignature::parse_der(&data).unwrap();
let signature = token.to_signature_element().unwrap();
let wire = signature.encode().unwrap();
```
*/

mod aggregation;
mod algorithm;
pub mod asn1;
mod assemble;
mod calendar;
mod capture;
mod chain;
mod tlv;

pub use {
    algorithm::{HashAlgorithm, Imprint},
    tlv::TlvElement,
};

use {
    crate::asn1::{
        rfc3161::OID_CONTENT_TYPE_TST_INFO, rfc5652::OID_ID_SIGNED_DATA,
        timesignature::OID_TIME_SIGNATURE_ALGORITHM,
    },
    bcder::{decode::Constructed, Mode},
    chrono::TimeZone,
    log::debug,
    std::{convert::TryFrom, fmt::Display, io::Read},
};

#[derive(Debug)]
pub enum ConvertError {
    /// Structural or semantic rejection of the legacy token.
    ///
    /// The message is stable and suitable for matching in tests.
    Format(String),

    /// A read failure on the caller-supplied input.
    Io(std::io::Error),

    /// An invalid caller-supplied argument or identifier.
    Argument(String),
}

impl ConvertError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }
}

impl std::error::Error for ConvertError {}

impl Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(message) => f.write_str(message),
            Self::Io(e) => f.write_fmt(format_args!("I/O error: {}", e)),
            Self::Argument(message) => f.write_str(message),
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// The vendor time-signature, lifted out of the `SignerInfo` signature
/// field.
#[derive(Clone, Debug)]
pub struct TimeSignature {
    pub(crate) location: Vec<u8>,
    pub(crate) history: Vec<u8>,
    pub(crate) publication_id: u64,
    pub(crate) publication_imprint: Imprint,
    pub(crate) extended: bool,
}

impl TimeSignature {
    /// The aggregation chain blob.
    pub fn location(&self) -> &[u8] {
        &self.location
    }

    /// The calendar chain blob.
    pub fn history(&self) -> &[u8] {
        &self.history
    }

    /// Publication time, seconds since the epoch.
    pub fn publication_id(&self) -> u64 {
        self.publication_id
    }

    pub fn publication_imprint(&self) -> &Imprint {
        &self.publication_imprint
    }

    pub fn publication_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        i64::try_from(self.publication_id)
            .ok()
            .and_then(|seconds| chrono::Utc.timestamp_opt(seconds, 0).single())
    }

    /// Whether the token was already extended.
    ///
    /// An unextended token still carries the interim PKI signature; the
    /// extender collaborator replaces it with calendar evidence.
    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

impl TryFrom<&crate::asn1::timesignature::TimeSignature> for TimeSignature {
    type Error = ConvertError;

    fn try_from(raw: &crate::asn1::timesignature::TimeSignature) -> Result<Self, Self::Error> {
        let publication_id = u64::try_from(raw.published_data.publication_identifier)
            .map_err(|_| ConvertError::format("publication identifier does not fit in 64 bits"))?;

        let publication_imprint =
            Imprint::from_bytes(&raw.published_data.publication_imprint.to_bytes())?;

        Ok(Self {
            location: raw.location.to_bytes().to_vec(),
            history: raw.history.to_bytes().to_vec(),
            publication_id,
            publication_imprint,
            extended: raw.pk_signature.is_none(),
        })
    }
}

/// A parsed legacy token.
///
/// Construction performs the full strict read of the RFC 3161/CMS
/// structures, including the two byte-range captures. The token can
/// then be rewritten as a keyless signature element with
/// [LegacySignature::to_signature_element].
#[derive(Clone, Debug)]
pub struct LegacySignature {
    pub(crate) document_imprint: Imprint,
    pub(crate) tst_info_prefix: Vec<u8>,
    pub(crate) tst_info_suffix: Vec<u8>,
    pub(crate) signed_attrs_prefix: Vec<u8>,
    pub(crate) message_digest: Vec<u8>,
    pub(crate) signed_attrs_suffix: Vec<u8>,
    pub(crate) signer_digest_algorithm: HashAlgorithm,
    pub(crate) gen_time: chrono::DateTime<chrono::Utc>,
    pub(crate) has_certificate: bool,
    pub(crate) time_signature: TimeSignature,
}

impl LegacySignature {
    /// Read a DER-encoded token from a stream.
    ///
    /// Read failures surface as [ConvertError::Io]; everything after
    /// the read is a format concern.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, ConvertError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        Self::parse_der(&data)
    }

    /// Parse a DER-encoded token.
    pub fn parse_der(data: &[u8]) -> Result<Self, ConvertError> {
        let content_info = Constructed::decode(data, Mode::Der, |cons| {
            crate::asn1::rfc5652::ContentInfo::take_from(cons)
        })
        .map_err(|_| ConvertError::format("content info has invalid format"))?;

        if content_info.content_type != OID_ID_SIGNED_DATA {
            return Err(ConvertError::format(format!(
                "invalid content type: {}",
                content_info.content_type
            )));
        }

        let signed_data = content_info
            .content
            .decode(|cons| crate::asn1::rfc5652::SignedData::take_from(cons))
            .map_err(|_| ConvertError::format("signed data has invalid format"))?;

        let token = Self::try_from(&signed_data)?;
        debug!(
            "parsed legacy token; publication id {}, extended {}",
            token.time_signature.publication_id, token.time_signature.extended
        );

        Ok(token)
    }

    /// The document hash from the TSTInfo message imprint.
    pub fn document_imprint(&self) -> &Imprint {
        &self.document_imprint
    }

    /// TSTInfo bytes preceding the hashed message value, header of the
    /// hashed message octet string included.
    pub fn tst_info_prefix(&self) -> &[u8] {
        &self.tst_info_prefix
    }

    /// TSTInfo bytes following the hashed message value.
    pub fn tst_info_suffix(&self) -> &[u8] {
        &self.tst_info_suffix
    }

    /// Signed attribute bytes preceding the message-digest value, SET
    /// header and octet string header included.
    pub fn signed_attrs_prefix(&self) -> &[u8] {
        &self.signed_attrs_prefix
    }

    /// The message-digest attribute value.
    pub fn message_digest(&self) -> &[u8] {
        &self.message_digest
    }

    /// Signed attribute bytes following the message-digest attribute.
    pub fn signed_attrs_suffix(&self) -> &[u8] {
        &self.signed_attrs_suffix
    }

    pub fn signer_digest_algorithm(&self) -> HashAlgorithm {
        self.signer_digest_algorithm
    }

    pub fn gen_time(&self) -> chrono::DateTime<chrono::Utc> {
        self.gen_time
    }

    pub fn has_certificate(&self) -> bool {
        self.has_certificate
    }

    pub fn time_signature(&self) -> &TimeSignature {
        &self.time_signature
    }

    /// The DER encoding of the TSTInfo, reassembled from the captured
    /// bracket.
    pub fn tst_info_der(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(
            self.tst_info_prefix.len()
                + self.document_imprint.digest().len()
                + self.tst_info_suffix.len(),
        );
        data.extend_from_slice(&self.tst_info_prefix);
        data.extend_from_slice(self.document_imprint.digest());
        data.extend_from_slice(&self.tst_info_suffix);

        data
    }

    /// The DER encoding of the signed attribute set as digested by
    /// verifiers, reassembled from the captured bracket.
    pub fn signed_attributes_der(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(
            self.signed_attrs_prefix.len()
                + self.message_digest.len()
                + self.signed_attrs_suffix.len(),
        );
        data.extend_from_slice(&self.signed_attrs_prefix);
        data.extend_from_slice(&self.message_digest);
        data.extend_from_slice(&self.signed_attrs_suffix);

        data
    }

    /// Rewrite the token as a keyless signature element.
    ///
    /// The aggregation phase always runs first: its output hash is the
    /// calendar chain input.
    pub fn to_signature_element(&self) -> Result<TlvElement, ConvertError> {
        let chain_input = self
            .signer_digest_algorithm
            .digest(&self.signed_attributes_der());

        debug!("building aggregation hash chains");
        let aggregation = aggregation::build(&self.time_signature.location, &chain_input)?;

        debug!("building calendar hash chain");
        let calendar = calendar::build(
            &self.time_signature.history,
            &aggregation.output_hash,
            self.time_signature.publication_id,
        )?;
        debug!("derived registration time {}", calendar.registration_time);

        Ok(assemble::signature_element(self, aggregation, calendar))
    }
}

impl TryFrom<&crate::asn1::rfc5652::SignedData> for LegacySignature {
    type Error = ConvertError;

    fn try_from(raw: &crate::asn1::rfc5652::SignedData) -> Result<Self, Self::Error> {
        use crate::asn1::rfc5652::CmsVersion;

        if raw.version != CmsVersion::V3 {
            return Err(ConvertError::format(format!(
                "invalid signed data version: {}",
                u8::from(raw.version)
            )));
        }

        for algorithm in &raw.digest_algorithms {
            HashAlgorithm::from_oid(&algorithm.algorithm)?;
        }

        if let Some(certificates) = &raw.certificates {
            if capture::count_elements(certificates.as_slice(), "certificates")? > 1 {
                return Err(ConvertError::format(
                    "more than one certificate in signed data",
                ));
            }
        }

        if raw.signer_infos.len() != 1 {
            return Err(ConvertError::format(
                "signed data must contain exactly one signer info",
            ));
        }
        let signer = &raw.signer_infos[0];

        if signer.version != CmsVersion::V1 {
            return Err(ConvertError::format(format!(
                "invalid signer info version: {}",
                u8::from(signer.version)
            )));
        }

        let signer_digest_algorithm = HashAlgorithm::from_oid(&signer.digest_algorithm.algorithm)?;

        if signer.signature_algorithm.algorithm != OID_TIME_SIGNATURE_ALGORITHM {
            return Err(ConvertError::format(format!(
                "invalid signature algorithm: {}",
                signer.signature_algorithm.algorithm
            )));
        }

        let signed_attributes = signer
            .signed_attributes
            .as_ref()
            .ok_or_else(|| ConvertError::format("signed attributes are missing"))?;
        let attrs_bracket = capture::bracket_signed_attributes(signed_attributes.as_slice())?;

        if raw.content_info.content_type != OID_CONTENT_TYPE_TST_INFO {
            return Err(ConvertError::format(format!(
                "invalid encapsulated content type: {}",
                raw.content_info.content_type
            )));
        }

        let tst_der = raw
            .content_info
            .content
            .as_ref()
            .ok_or_else(|| ConvertError::format("encapsulated TSTInfo content is missing"))?
            .to_bytes();

        let tst_info = Constructed::decode(tst_der.as_ref(), Mode::Der, |cons| {
            crate::asn1::rfc3161::TstInfo::take_from(cons)
        })
        .map_err(|_| ConvertError::format("TSTInfo has invalid format"))?;

        if tst_info.version != 1 {
            return Err(ConvertError::format(format!(
                "invalid TSTInfo version: {}",
                tst_info.version
            )));
        }

        if let Some(extensions) = &tst_info.extensions {
            if extensions.is_empty() {
                return Err(ConvertError::format("empty extensions in TSTInfo"));
            }

            for extension in extensions.iter() {
                if extension.critical == Some(true) {
                    return Err(ConvertError::format(format!(
                        "critical extension in TSTInfo: {}",
                        extension.id
                    )));
                }
            }
        }

        let document_algorithm =
            HashAlgorithm::from_oid(&tst_info.message_imprint.hash_algorithm.algorithm)?;
        let document_digest = tst_info.message_imprint.hashed_message.to_bytes();
        if document_digest.len() != document_algorithm.digest_len() {
            return Err(ConvertError::format(format!(
                "invalid message imprint length: {}",
                document_digest.len()
            )));
        }
        let document_imprint = Imprint::new(document_algorithm, document_digest.to_vec())?;

        let tst_bracket = capture::bracket_tst_info(tst_der.as_ref())?;
        debug_assert_eq!(tst_bracket.digest, document_imprint.digest());

        let signature_der = signer.signature.to_bytes();
        let raw_time_signature = Constructed::decode(signature_der.as_ref(), Mode::Der, |cons| {
            crate::asn1::timesignature::TimeSignature::take_from(cons)
        })
        .map_err(|_| ConvertError::format("time signature has invalid format"))?;

        let time_signature = TimeSignature::try_from(&raw_time_signature)?;

        Ok(Self {
            document_imprint,
            tst_info_prefix: tst_bracket.prefix,
            tst_info_suffix: tst_bracket.suffix,
            signed_attrs_prefix: attrs_bracket.prefix,
            message_digest: attrs_bracket.digest,
            signed_attrs_suffix: attrs_bracket.suffix,
            signer_digest_algorithm,
            gen_time: *tst_info.gen_time,
            has_certificate: raw.certificates.is_some(),
            time_signature,
        })
    }
}

/// Convert a legacy token read from `reader` into the keyless signature
/// element.
pub fn convert<R: Read>(reader: R) -> Result<TlvElement, ConvertError> {
    LegacySignature::from_reader(reader)?.to_signature_element()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::asn1::{
            common::GeneralizedTime,
            rfc3161::{MessageImprint, TstInfo},
            rfc5280::{AlgorithmIdentifier, Extension, Extensions},
            rfc5652::{
                CmsVersion, ContentInfo, EncapsulatedContentInfo, IssuerAndSerialNumber,
                SignedData, SignerInfo, OID_CONTENT_TYPE, OID_MESSAGE_DIGEST,
            },
            timesignature::PublishedData,
        },
        bcder::{
            encode::{self, PrimitiveContent, Values},
            Captured, Integer, OctetString, Oid,
        },
        bytes::Bytes,
    };

    const OID_SHA256: &[u8] = &[96, 134, 72, 1, 101, 3, 4, 2, 1];

    fn oid(content: &[u8]) -> Oid {
        Oid(Bytes::copy_from_slice(content))
    }

    fn octets(content: &[u8]) -> OctetString {
        OctetString::new(Bytes::copy_from_slice(content))
    }

    fn algorithm(content: &[u8]) -> AlgorithmIdentifier {
        AlgorithmIdentifier {
            algorithm: oid(content),
            parameters: None,
        }
    }

    fn push_link(blob: &mut Vec<u8>, direction: u8, sibling: &[u8], level: u8) {
        blob.push(1);
        blob.push(direction);
        blob.extend_from_slice(sibling);
        blob.push(level);
    }

    fn sha256_sibling(last: u8) -> Vec<u8> {
        let mut imprint = vec![1u8];
        imprint.extend_from_slice(&[0u8; 31]);
        imprint.push(last);
        imprint
    }

    /// Levels 1, 2 and 19: the gateway level splits off a second chain.
    fn location_blob() -> Vec<u8> {
        let mut blob = Vec::new();
        push_link(&mut blob, 0, &sha256_sibling(1), 1);
        push_link(&mut blob, 1, &sha256_sibling(0), 2);
        push_link(&mut blob, 0, &sha256_sibling(0), 19);
        blob
    }

    /// Left then right, consistent with publication time 5.
    fn history_blob() -> Vec<u8> {
        let mut blob = Vec::new();
        push_link(&mut blob, 1, &sha256_sibling(2), 0xff);
        push_link(&mut blob, 0, &sha256_sibling(3), 0xff);
        blob
    }

    struct TokenBuilder {
        content_type: Vec<u8>,
        signed_data_version: CmsVersion,
        econtent_type: Vec<u8>,
        signer_digest_algorithm: Vec<u8>,
        signer_version: CmsVersion,
        signature_algorithm: Vec<u8>,
        signer_count: usize,
        certificate_count: usize,
        tst_version: u128,
        imprint_digest: Vec<u8>,
        extensions: Option<Extensions>,
        location: Vec<u8>,
        history: Vec<u8>,
        publication_id: u128,
        include_pk_signature: bool,
    }

    impl Default for TokenBuilder {
        fn default() -> Self {
            Self {
                content_type: OID_ID_SIGNED_DATA.0.to_vec(),
                signed_data_version: CmsVersion::V3,
                econtent_type: OID_CONTENT_TYPE_TST_INFO.0.to_vec(),
                signer_digest_algorithm: OID_SHA256.to_vec(),
                signer_version: CmsVersion::V1,
                signature_algorithm: OID_TIME_SIGNATURE_ALGORITHM.0.to_vec(),
                signer_count: 1,
                certificate_count: 0,
                tst_version: 1,
                imprint_digest: HashAlgorithm::Sha256.digest(&[0u8; 32]).digest().to_vec(),
                extensions: None,
                location: location_blob(),
                history: history_blob(),
                publication_id: 5,
                include_pk_signature: true,
            }
        }
    }

    impl TokenBuilder {
        fn tst_info_der(&self) -> Vec<u8> {
            let tst_info = TstInfo {
                version: self.tst_version,
                policy: oid(&[42, 3, 4]),
                message_imprint: MessageImprint {
                    hash_algorithm: algorithm(OID_SHA256),
                    hashed_message: octets(&self.imprint_digest),
                },
                serial_number: Integer::from(42u8),
                gen_time: GeneralizedTime::from(
                    chrono::Utc.with_ymd_and_hms(2010, 7, 1, 12, 0, 0).unwrap(),
                ),
                accuracy: None,
                ordering: None,
                nonce: None,
                tsa: None,
                extensions: self.extensions.clone(),
            };

            let mut der = Vec::new();
            tst_info
                .encode_ref()
                .write_encoded(Mode::Der, &mut der)
                .unwrap();
            der
        }

        fn build(&self) -> Vec<u8> {
            let tst_der = self.tst_info_der();
            let message_digest = HashAlgorithm::Sha256.digest(&tst_der);

            let signed_attributes = Captured::from_values(
                Mode::Der,
                (
                    encode::sequence((
                        OID_CONTENT_TYPE.encode_ref(),
                        encode::set(OID_CONTENT_TYPE_TST_INFO.encode_ref()),
                    )),
                    encode::sequence((
                        OID_MESSAGE_DIGEST.encode_ref(),
                        encode::set(octets(message_digest.digest()).encode()),
                    )),
                ),
            );

            let time_signature = crate::asn1::timesignature::TimeSignature {
                location: octets(&self.location),
                history: octets(&self.history),
                published_data: PublishedData {
                    publication_identifier: self.publication_id,
                    publication_imprint: octets(
                        &HashAlgorithm::Sha256.digest(b"publication").to_bytes(),
                    ),
                },
                pk_signature: self.include_pk_signature.then(|| {
                    Captured::from_values(Mode::Der, octets(&[0x55; 16]).encode())
                }),
                pub_reference: None,
            };
            let mut signature_der = Vec::new();
            time_signature
                .encode_ref()
                .write_encoded(Mode::Der, &mut signature_der)
                .unwrap();

            let signer = SignerInfo {
                version: self.signer_version,
                sid: IssuerAndSerialNumber {
                    issuer: Captured::from_values(Mode::Der, encode::sequence(0u8.encode())),
                    serial_number: Integer::from(7u8),
                },
                digest_algorithm: algorithm(&self.signer_digest_algorithm),
                signed_attributes: Some(signed_attributes),
                signature_algorithm: algorithm(&self.signature_algorithm),
                signature: octets(&signature_der),
                unsigned_attributes: None,
            };

            let certificates = match self.certificate_count {
                0 => None,
                1 => Some(Captured::from_values(
                    Mode::Der,
                    encode::sequence(0u8.encode()),
                )),
                _ => Some(Captured::from_values(
                    Mode::Der,
                    (
                        encode::sequence(0u8.encode()),
                        encode::sequence(1u8.encode()),
                    ),
                )),
            };

            let signed_data = SignedData {
                version: self.signed_data_version,
                digest_algorithms: vec![algorithm(OID_SHA256)],
                content_info: EncapsulatedContentInfo {
                    content_type: oid(&self.econtent_type),
                    content: Some(octets(&tst_der)),
                },
                certificates,
                crls: None,
                signer_infos: vec![signer; self.signer_count],
            };

            let content_info = ContentInfo {
                content_type: oid(&self.content_type),
                content: Captured::from_values(Mode::Der, signed_data.encode_ref()),
            };

            let mut out = Vec::new();
            content_info.write_encoded(Mode::Der, &mut out).unwrap();
            out
        }
    }

    fn format_error(data: &[u8]) -> String {
        match LegacySignature::parse_der(data) {
            Err(ConvertError::Format(message)) => message,
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn parses_well_formed_token() {
        let builder = TokenBuilder::default();
        let token = LegacySignature::parse_der(&builder.build()).unwrap();

        assert_eq!(token.signer_digest_algorithm(), HashAlgorithm::Sha256);
        assert_eq!(
            token.document_imprint().digest(),
            builder.imprint_digest.as_slice()
        );
        assert_eq!(token.time_signature().publication_id(), 5);
        assert!(!token.time_signature().is_extended());
        assert!(!token.has_certificate());
        assert_eq!(
            token.gen_time(),
            chrono::Utc.with_ymd_and_hms(2010, 7, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn tst_info_bracket_reproduces_original_encoding() {
        let builder = TokenBuilder::default();
        let token = LegacySignature::parse_der(&builder.build()).unwrap();

        assert_eq!(token.tst_info_der(), builder.tst_info_der());
    }

    #[test]
    fn signed_attributes_bracket_reproduces_original_encoding() {
        let builder = TokenBuilder::default();
        let token = LegacySignature::parse_der(&builder.build()).unwrap();

        // The reassembled set must be the EXPLICIT SET OF form over the
        // same attribute bytes the token carried.
        let reassembled = token.signed_attributes_der();
        assert_eq!(reassembled[0], 0x31);
        assert_eq!(
            token.message_digest(),
            HashAlgorithm::Sha256
                .digest(&builder.tst_info_der())
                .digest()
        );

        let parsed_again = LegacySignature::parse_der(&builder.build()).unwrap();
        assert_eq!(parsed_again.signed_attributes_der(), reassembled);
    }

    #[test]
    fn converts_token_to_signature_element() {
        let token = LegacySignature::parse_der(&TokenBuilder::default().build()).unwrap();
        let signature = token.to_signature_element().unwrap();

        assert_eq!(signature.element_type(), 0x800);

        let chains = signature.children_by_type(0x801).collect::<Vec<_>>();
        assert_eq!(chains.len(), 2);

        // The first chain starts from the extra hash over the signed
        // attribute digest imprint.
        let attrs_hash = HashAlgorithm::Sha256.digest(&token.signed_attributes_der());
        let expected_input = HashAlgorithm::Sha256.digest(&attrs_hash.to_bytes());
        assert_eq!(
            chains[0].first_child(0x05).unwrap().content().unwrap(),
            expected_input.to_bytes().as_slice()
        );

        let calendar = signature.first_child(0x802).unwrap();
        assert_eq!(calendar.first_child(0x01).unwrap().as_integer().unwrap(), 5);
        assert_eq!(calendar.first_child(0x02).unwrap().as_integer().unwrap(), 4);

        let record = signature.first_child(0x806).unwrap();
        assert_eq!(record.first_child(0x02).unwrap().as_integer().unwrap(), 4);
        assert_eq!(
            record.first_child(0x05).unwrap().content().unwrap(),
            token.document_imprint().to_bytes().as_slice()
        );
        assert_eq!(
            record.first_child(0x10).unwrap().content().unwrap(),
            token.tst_info_prefix()
        );
        assert_eq!(
            record.first_child(0x11).unwrap().content().unwrap(),
            token.tst_info_suffix()
        );
        assert_eq!(record.first_child(0x12).unwrap().as_integer().unwrap(), 1);
        assert_eq!(
            record.first_child(0x13).unwrap().content().unwrap(),
            token.signed_attrs_prefix()
        );
        assert_eq!(
            record.first_child(0x14).unwrap().content().unwrap(),
            token.signed_attrs_suffix()
        );
        assert_eq!(record.first_child(0x15).unwrap().as_integer().unwrap(), 1);

        // The record repeats the first chain's location indices.
        let record_indices = record
            .children_by_type(0x03)
            .map(|child| child.as_integer().unwrap())
            .collect::<Vec<_>>();
        let chain_indices = chains[0]
            .children_by_type(0x03)
            .map(|child| child.as_integer().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(record_indices, chain_indices);
        assert_eq!(record_indices.len(), 2);
    }

    #[test]
    fn convert_drives_reader_to_signature() {
        let data = TokenBuilder::default().build();
        let signature = convert(std::io::Cursor::new(data)).unwrap();
        assert_eq!(signature.element_type(), 0x800);
    }

    #[test]
    fn rejects_non_der_input() {
        assert_eq!(
            format_error(b"This is not a legacy token."),
            "content info has invalid format"
        );
    }

    #[test]
    fn rejects_unexpected_content_type() {
        let data = TokenBuilder {
            content_type: vec![42, 134, 72, 134, 247, 13, 1, 7, 1],
            ..Default::default()
        }
        .build();

        assert!(format_error(&data).starts_with("invalid content type"));
    }

    #[test]
    fn rejects_bad_signed_data_version() {
        let data = TokenBuilder {
            signed_data_version: CmsVersion::V1,
            ..Default::default()
        }
        .build();

        assert_eq!(format_error(&data), "invalid signed data version: 1");
    }

    #[test]
    fn rejects_multiple_signers() {
        let data = TokenBuilder {
            signer_count: 2,
            ..Default::default()
        }
        .build();

        assert_eq!(
            format_error(&data),
            "signed data must contain exactly one signer info"
        );
    }

    #[test]
    fn rejects_bad_signer_version() {
        let data = TokenBuilder {
            signer_version: CmsVersion::V3,
            ..Default::default()
        }
        .build();

        assert_eq!(format_error(&data), "invalid signer info version: 3");
    }

    #[test]
    fn rejects_unexpected_signature_algorithm() {
        let data = TokenBuilder {
            signature_algorithm: vec![42, 134, 72, 134, 247, 13, 1, 1, 11],
            ..Default::default()
        }
        .build();

        assert!(format_error(&data).starts_with("invalid signature algorithm"));
    }

    #[test]
    fn rejects_unsupported_signer_digest_algorithm() {
        let data = TokenBuilder {
            signer_digest_algorithm: vec![42, 3, 4],
            ..Default::default()
        }
        .build();

        match LegacySignature::parse_der(&data) {
            Err(ConvertError::Argument(message)) => {
                assert!(message.starts_with("unsupported algorithm OID"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_tst_info_version() {
        let data = TokenBuilder {
            tst_version: 2,
            ..Default::default()
        }
        .build();

        assert_eq!(format_error(&data), "invalid TSTInfo version: 2");
    }

    #[test]
    fn rejects_short_message_imprint() {
        let data = TokenBuilder {
            imprint_digest: vec![0x11; 31],
            ..Default::default()
        }
        .build();

        assert_eq!(format_error(&data), "invalid message imprint length: 31");
    }

    #[test]
    fn rejects_oversized_publication_identifier() {
        let data = TokenBuilder {
            publication_id: u64::MAX as u128 + 1,
            ..Default::default()
        }
        .build();

        assert_eq!(
            format_error(&data),
            "publication identifier does not fit in 64 bits"
        );
    }

    #[test]
    fn rejects_empty_extensions() {
        let data = TokenBuilder {
            extensions: Some(Extensions::default()),
            ..Default::default()
        }
        .build();

        assert_eq!(format_error(&data), "empty extensions in TSTInfo");
    }

    #[test]
    fn rejects_critical_extensions() {
        let mut extensions = Extensions::default();
        extensions.push(Extension {
            id: oid(&[85, 29, 14]),
            critical: Some(true),
            value: octets(&[1, 2, 3]),
        });

        let data = TokenBuilder {
            extensions: Some(extensions),
            ..Default::default()
        }
        .build();

        assert!(format_error(&data).starts_with("critical extension in TSTInfo"));
    }

    #[test]
    fn accepts_non_critical_extensions() {
        let mut extensions = Extensions::default();
        extensions.push(Extension {
            id: oid(&[85, 29, 14]),
            critical: None,
            value: octets(&[1, 2, 3]),
        });

        let data = TokenBuilder {
            extensions: Some(extensions),
            ..Default::default()
        }
        .build();

        assert!(LegacySignature::parse_der(&data).is_ok());
    }

    #[test]
    fn rejects_multiple_certificates() {
        let data = TokenBuilder {
            certificate_count: 2,
            ..Default::default()
        }
        .build();

        assert_eq!(format_error(&data), "more than one certificate in signed data");
    }

    #[test]
    fn tracks_certificate_presence() {
        let data = TokenBuilder {
            certificate_count: 1,
            ..Default::default()
        }
        .build();

        assert!(LegacySignature::parse_der(&data).unwrap().has_certificate());
    }

    #[test]
    fn missing_pk_signature_marks_token_extended() {
        let data = TokenBuilder {
            include_pk_signature: false,
            ..Default::default()
        }
        .build();

        let token = LegacySignature::parse_der(&data).unwrap();
        assert!(token.time_signature().is_extended());
    }

    #[test]
    fn read_failures_surface_as_io_errors() {
        struct FailingReader;

        impl Read for FailingReader {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            }
        }

        match LegacySignature::from_reader(FailingReader) {
            Err(ConvertError::Io(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
