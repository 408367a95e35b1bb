// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Keyless signature assembly.

Stitches the aggregation chains, the calendar chain and the RFC 3161
record into the single signature element handed to the host SDK. The
RFC 3161 record carries everything a verifier needs to rebuild the two
captured DER envelopes and recompute the chain input hash from the
original document hash.
*/

use crate::{
    aggregation::{AggregationChains, TAG_AGGREGATION_TIME, TAG_CHAIN_INDEX, TAG_INPUT_HASH},
    calendar::CalendarChain,
    tlv::TlvElement,
    LegacySignature,
};

/// Keyless signature element type.
pub(crate) const KSI_SIGNATURE: u16 = 0x800;

/// RFC 3161 record element type.
pub(crate) const RFC3161_RECORD: u16 = 0x806;

const TAG_TST_INFO_PREFIX: u16 = 0x10;
const TAG_TST_INFO_SUFFIX: u16 = 0x11;
const TAG_TST_INFO_ALGORITHM: u16 = 0x12;
const TAG_SIGNED_ATTR_PREFIX: u16 = 0x13;
const TAG_SIGNED_ATTR_SUFFIX: u16 = 0x14;
const TAG_SIGNED_ATTR_ALGORITHM: u16 = 0x15;

/// Compose the signature element.
///
/// Every aggregation chain receives the registration time derived from
/// the calendar chain; the RFC 3161 record repeats it together with the
/// first chain's location indices.
pub(crate) fn signature_element(
    token: &LegacySignature,
    mut aggregation: AggregationChains,
    calendar: CalendarChain,
) -> TlvElement {
    let registration_time = calendar.registration_time;

    for chain in &mut aggregation.chains {
        chain.push_child(TlvElement::integer(TAG_AGGREGATION_TIME, registration_time));
    }

    let mut record = vec![TlvElement::integer(TAG_AGGREGATION_TIME, registration_time)];
    record.extend(
        aggregation.chains[0]
            .children_by_type(TAG_CHAIN_INDEX)
            .cloned(),
    );
    record.push(TlvElement::new(
        TAG_INPUT_HASH,
        token.document_imprint.to_bytes(),
    ));
    record.push(TlvElement::new(
        TAG_TST_INFO_PREFIX,
        token.tst_info_prefix.clone(),
    ));
    record.push(TlvElement::new(
        TAG_TST_INFO_SUFFIX,
        token.tst_info_suffix.clone(),
    ));
    record.push(TlvElement::integer(
        TAG_TST_INFO_ALGORITHM,
        token.document_imprint.algorithm().gt_id() as u64,
    ));
    record.push(TlvElement::new(
        TAG_SIGNED_ATTR_PREFIX,
        token.signed_attrs_prefix.clone(),
    ));
    record.push(TlvElement::new(
        TAG_SIGNED_ATTR_SUFFIX,
        token.signed_attrs_suffix.clone(),
    ));
    record.push(TlvElement::integer(
        TAG_SIGNED_ATTR_ALGORITHM,
        token.signer_digest_algorithm.gt_id() as u64,
    ));

    let mut children = aggregation.chains;
    children.push(calendar.element);
    children.push(TlvElement::nested(RFC3161_RECORD, record));

    TlvElement::nested(KSI_SIGNATURE, children)
}
