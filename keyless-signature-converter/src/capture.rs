// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Byte-range capture over encoded DER.

The output record must reproduce two regions of the token byte-exactly:
the TSTInfo encoding bracketing its hashed message, and the signed
attribute set bracketing the message-digest value. A verifier later
splices a recomputed digest between prefix and suffix and re-hashes, so
header bytes have to be carried over verbatim from the original stream,
never re-encoded.

The walker below reads just the DER subset the legacy format uses:
single-byte tags and definite lengths. It never copies anything except
the final bracket slices.
*/

use crate::{
    asn1::{
        rfc3161::OID_CONTENT_TYPE_TST_INFO,
        rfc5652::{OID_CONTENT_TYPE, OID_MESSAGE_DIGEST},
    },
    ConvertError,
};

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;

/// A captured region: everything before the digest value, the digest
/// value itself, and everything after it.
///
/// `prefix ‖ digest ‖ suffix` equals the original encoding of the
/// captured structure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct DigestBracket {
    pub prefix: Vec<u8>,
    pub digest: Vec<u8>,
    pub suffix: Vec<u8>,
}

struct Element {
    tag: u8,
    content_start: usize,
    content_end: usize,
}

struct Walker<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Walker<'a> {
    fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    fn invalid(&self) -> ConvertError {
        ConvertError::format(format!("{} has invalid format", self.context))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn next_byte(&mut self) -> Result<u8, ConvertError> {
        let byte = *self.data.get(self.pos).ok_or_else(|| self.invalid())?;
        self.pos += 1;

        Ok(byte)
    }

    /// Read a header, leaving the position at the start of the content.
    fn read_header(&mut self) -> Result<Element, ConvertError> {
        let tag = self.next_byte()?;

        let first = self.next_byte()?;
        let length = if first < 0x80 {
            first as usize
        } else {
            let count = (first & 0x7f) as usize;
            if count == 0 || count > 4 {
                // indefinite or absurdly wide length
                return Err(self.invalid());
            }

            let mut length = 0usize;
            for _ in 0..count {
                length = (length << 8) | self.next_byte()? as usize;
            }
            length
        };

        let content_start = self.pos;
        let content_end = content_start
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.invalid())?;

        Ok(Element {
            tag,
            content_start,
            content_end,
        })
    }

    /// Read a header and require its tag.
    fn expect(&mut self, tag: u8) -> Result<Element, ConvertError> {
        let element = self.read_header()?;
        if element.tag != tag {
            return Err(self.invalid());
        }

        Ok(element)
    }

    /// Position past the element's content.
    fn skip(&mut self, element: &Element) {
        self.pos = element.content_end;
    }

    fn content(&self, element: &Element) -> &'a [u8] {
        &self.data[element.content_start..element.content_end]
    }
}

/// Bracket the encoded TSTInfo around its `hashedMessage` value.
///
/// `der` must be exactly the DER encoding of the TSTInfo sequence.
pub(crate) fn bracket_tst_info(der: &[u8]) -> Result<DigestBracket, ConvertError> {
    let mut walker = Walker::new(der, "TSTInfo");

    let tst_info = walker.expect(TAG_SEQUENCE)?;
    if tst_info.content_end != der.len() {
        return Err(walker.invalid());
    }

    let version = walker.expect(TAG_INTEGER)?;
    walker.skip(&version);

    let policy = walker.expect(TAG_OID)?;
    walker.skip(&policy);

    let message_imprint = walker.expect(TAG_SEQUENCE)?;

    let algorithm = walker.expect(TAG_SEQUENCE)?;
    walker.skip(&algorithm);

    let hashed_message = walker.expect(TAG_OCTET_STRING)?;
    if hashed_message.content_end != message_imprint.content_end {
        return Err(walker.invalid());
    }

    Ok(DigestBracket {
        prefix: der[..hashed_message.content_start].to_vec(),
        digest: walker.content(&hashed_message).to_vec(),
        suffix: der[hashed_message.content_end..tst_info.content_end].to_vec(),
    })
}

/// Bracket a signed attribute set around its message-digest value.
///
/// `content` is the raw attribute sequence without the enclosing header;
/// the stream carries the IMPLICIT `[0]` tag there, so the SET header of
/// the prefix is the one reconstructed piece: the universal tag plus a
/// minimal definite length, which for valid DER input is byte-identical
/// to the original.
pub(crate) fn bracket_signed_attributes(content: &[u8]) -> Result<DigestBracket, ConvertError> {
    let mut walker = Walker::new(content, "signed attributes");

    // The first attribute must be content-type carrying id-ct-TSTInfo.
    let attribute = walker.expect(TAG_SEQUENCE).map_err(|_| invalid_content_type())?;
    let oid = walker.expect(TAG_OID).map_err(|_| invalid_content_type())?;
    if walker.content(&oid) != OID_CONTENT_TYPE.0 {
        return Err(invalid_content_type());
    }
    walker.skip(&oid);

    let values = walker.expect(TAG_SET).map_err(|_| invalid_content_type())?;
    let value = walker.expect(TAG_OID).map_err(|_| invalid_content_type())?;
    if walker.content(&value) != OID_CONTENT_TYPE_TST_INFO.0
        || value.content_end != values.content_end
        || values.content_end != attribute.content_end
    {
        return Err(invalid_content_type());
    }
    walker.skip(&attribute);

    let mut bracket: Option<(usize, usize, usize)> = None;

    while !walker.at_end() {
        let attribute = walker.expect(TAG_SEQUENCE)?;
        let oid = walker.expect(TAG_OID)?;
        let oid_content = walker.content(&oid);

        if oid_content == OID_CONTENT_TYPE.0 {
            return Err(ConvertError::format(
                "duplicate content-type signed attribute",
            ));
        }

        if oid_content == OID_MESSAGE_DIGEST.0 {
            if bracket.is_some() {
                return Err(ConvertError::format(
                    "duplicate message-digest signed attribute",
                ));
            }

            walker.skip(&oid);
            let values = walker.expect(TAG_SET)?;
            let value = walker.expect(TAG_OCTET_STRING)?;
            if value.content_end != values.content_end
                || values.content_end != attribute.content_end
            {
                return Err(ConvertError::format(
                    "message-digest signed attribute must have exactly one value",
                ));
            }

            bracket = Some((value.content_start, value.content_end, attribute.content_end));
        }

        walker.skip(&attribute);
    }

    let (digest_start, digest_end, suffix_start) = bracket.ok_or_else(|| {
        ConvertError::format("message-digest signed attribute is missing")
    })?;

    let mut prefix = set_header(content.len())?;
    prefix.extend_from_slice(&content[..digest_start]);

    Ok(DigestBracket {
        prefix,
        digest: content[digest_start..digest_end].to_vec(),
        suffix: content[suffix_start..].to_vec(),
    })
}

fn invalid_content_type() -> ConvertError {
    ConvertError::format("invalid content-type signed attribute value")
}

/// Universal SET header with minimal definite length.
fn set_header(length: usize) -> Result<Vec<u8>, ConvertError> {
    let mut header = vec![TAG_SET];

    if length < 0x80 {
        header.push(length as u8);
    } else if length < 0x100 {
        header.extend_from_slice(&[0x81, length as u8]);
    } else if length < 0x10000 {
        header.extend_from_slice(&[0x82, (length >> 8) as u8, length as u8]);
    } else if length < 0x1000000 {
        header.extend_from_slice(&[
            0x83,
            (length >> 16) as u8,
            (length >> 8) as u8,
            length as u8,
        ]);
    } else {
        return Err(ConvertError::format("signed attributes too long"));
    }

    Ok(header)
}

/// Count the top-level elements of an encoded value sequence.
pub(crate) fn count_elements(data: &[u8], context: &'static str) -> Result<usize, ConvertError> {
    let mut walker = Walker::new(data, context);
    let mut count = 0;

    while !walker.at_end() {
        let element = walker.read_header()?;
        walker.skip(&element);
        count += 1;
    }

    Ok(count)
}
