// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! ASN.1 types of the vendor time-signature.

The legacy time-stamping service replaced the RSA signature value of
the `SignerInfo` with a DER-encoded `TimeSignature` structure holding
the two Merkle chain blobs and the publication record:

```ASN.1
TimeSignature ::= SEQUENCE {
    location        OCTET STRING,
    history         OCTET STRING,
    publishedData   PublishedData,
    pkSignature     SignatureInfo          OPTIONAL,
    pubReference    SET OF OCTET STRING    OPTIONAL }

PublishedData ::= SEQUENCE {
    publicationIdentifier   INTEGER,
    publicationImprint      OCTET STRING }
```

`pkSignature` and `pubReference` are never interpreted beyond presence
and are captured raw.
*/

use {
    crate::asn1::common::take_uint,
    bcder::{
        decode::{Constructed, DecodeError, Source},
        encode::{self, PrimitiveContent, Values},
        Captured, ConstOid, OctetString, Oid, Tag,
    },
};

/// Signature algorithm identifier of the vendor time-signature.
///
/// 1.3.6.1.4.1.27868.4.1
pub const OID_TIME_SIGNATURE_ALGORITHM: ConstOid = Oid(&[43, 6, 1, 4, 1, 129, 217, 92, 4, 1]);

#[derive(Clone, Debug)]
pub struct TimeSignature {
    pub location: OctetString,
    pub history: OctetString,
    pub published_data: PublishedData,
    pub pk_signature: Option<Captured>,
    pub pub_reference: Option<Captured>,
}

impl TimeSignature {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let location = OctetString::take_from(cons)?;
            let history = OctetString::take_from(cons)?;
            let published_data = PublishedData::take_from(cons)?;
            let pk_signature =
                cons.take_opt_constructed_if(Tag::SEQUENCE, |cons| cons.capture_all())?;
            let pub_reference =
                cons.take_opt_constructed_if(Tag::SET, |cons| cons.capture_all())?;

            Ok(Self {
                location,
                history,
                published_data,
                pk_signature,
                pub_reference,
            })
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.location.encode_ref(),
            self.history.encode_ref(),
            self.published_data.encode_ref(),
            self.pk_signature
                .as_ref()
                .map(|signature| encode::sequence(signature)),
            self.pub_reference
                .as_ref()
                .map(|reference| encode::set(reference)),
        ))
    }
}

#[derive(Clone, Debug)]
pub struct PublishedData {
    pub publication_identifier: u128,
    pub publication_imprint: OctetString,
}

impl PublishedData {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let publication_identifier = take_uint(cons)?;
            let publication_imprint = OctetString::take_from(cons)?;

            Ok(Self {
                publication_identifier,
                publication_imprint,
            })
        })
    }

    pub fn encode_ref(&self) -> impl Values + '_ {
        encode::sequence((
            self.publication_identifier.encode(),
            self.publication_imprint.encode_ref(),
        ))
    }
}
