// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Calendar hash chain construction.

The `history` blob describes the Merkle path from one calendar leaf up
to the publication root. It becomes a single chain TLV element. Unlike
aggregation chains there is no level constraint; instead the link
directions encode the position of the leaf in the calendar tree, which
yields the registration time.
*/

use crate::{
    algorithm::Imprint,
    chain::{self, LinkDirection},
    tlv::TlvElement,
    ConvertError,
};

/// Calendar hash chain element type.
pub(crate) const CALENDAR_HASH_CHAIN: u16 = 0x802;

pub(crate) const TAG_PUBLICATION_TIME: u16 = 0x01;
pub(crate) const TAG_REGISTRATION_TIME: u16 = 0x02;
pub(crate) const TAG_INPUT_HASH: u16 = 0x05;
const TAG_LEFT_LINK: u16 = 0x07;
const TAG_RIGHT_LINK: u16 = 0x08;

/// The built chain element plus the derived registration time.
#[derive(Debug)]
pub(crate) struct CalendarChain {
    pub element: TlvElement,
    pub registration_time: u64,
}

/// Build the calendar chain element from the `history` blob.
///
/// `input` is consumed verbatim as the chain value of the first link;
/// it must be the output hash of the aggregation phase.
pub(crate) fn build(
    history: &[u8],
    input: &Imprint,
    publication_time: u64,
) -> Result<CalendarChain, ConvertError> {
    if history.is_empty() {
        return Err(ConvertError::format("No links found in calendar hash chain."));
    }

    let links = chain::decode_links(history, input.clone())?;
    let registration_time = registration_time(&links, publication_time)?;

    let mut children = vec![
        TlvElement::integer(TAG_PUBLICATION_TIME, publication_time),
        TlvElement::new(TAG_INPUT_HASH, input.to_bytes()),
    ];
    for link in &links {
        let tag = match link.direction {
            LinkDirection::Left => TAG_LEFT_LINK,
            LinkDirection::Right => TAG_RIGHT_LINK,
        };
        children.push(TlvElement::new(tag, link.sibling.to_bytes()));
    }
    children.push(TlvElement::integer(TAG_REGISTRATION_TIME, registration_time));

    Ok(CalendarChain {
        element: TlvElement::nested(CALENDAR_HASH_CHAIN, children),
        registration_time,
    })
}

/// Reconstruct the registration time from the chain shape.
///
/// Walking the links from the root down, the remaining span of the
/// calendar subtree starts at the publication time; a left link descends
/// into the left subtree, a right link accumulates the high bit and
/// descends right. The walk must consume the span exactly.
fn registration_time(
    links: &[chain::ChainLink],
    publication_time: u64,
) -> Result<u64, ConvertError> {
    let mut remaining = publication_time;
    let mut registration = 0u64;

    for link in links.iter().rev() {
        if remaining == 0 {
            return Err(inconsistent_shape());
        }

        let high_bit = 1u64 << (63 - remaining.leading_zeros());
        match link.direction {
            LinkDirection::Left => remaining = high_bit - 1,
            LinkDirection::Right => {
                registration += high_bit;
                remaining -= high_bit;
            }
        }
    }

    if remaining != 0 {
        return Err(inconsistent_shape());
    }

    debug_assert!(registration <= publication_time);

    Ok(registration)
}

fn inconsistent_shape() -> ConvertError {
    ConvertError::format("Calendar hash chain shape is inconsistent with publication time")
}
