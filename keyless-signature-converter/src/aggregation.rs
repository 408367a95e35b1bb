// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Aggregation hash chain construction.

The `location` blob of the legacy token describes the Merkle path from
the signed document up to the calendar. It is rewritten as one or more
aggregation chain TLV elements, split at the well-known gateway levels
of the legacy aggregation network. Link levels must increase strictly
along the blob; a jump of more than one level becomes a level-correction
child on the link.
*/

use crate::{
    algorithm::{HashAlgorithm, Imprint},
    chain::{self, LinkDirection},
    tlv::TlvElement,
    ConvertError,
};

/// Aggregation hash chain element type.
pub(crate) const AGGREGATION_HASH_CHAIN: u16 = 0x801;

/// Levels at which the legacy aggregation network hands over to the next
/// aggregator tier (state, national, top).
const GATEWAY_LEVELS: [u8; 3] = [19, 39, 60];

pub(crate) const TAG_LEVEL_CORRECTION: u16 = 0x01;
pub(crate) const TAG_AGGREGATION_TIME: u16 = 0x02;
pub(crate) const TAG_SIBLING_HASH: u16 = 0x02;
pub(crate) const TAG_LEGACY_ID: u16 = 0x03;
pub(crate) const TAG_CHAIN_INDEX: u16 = 0x03;
pub(crate) const TAG_INPUT_HASH: u16 = 0x05;
pub(crate) const TAG_ALGORITHM: u16 = 0x06;
pub(crate) const TAG_LEFT_LINK: u16 = 0x07;
pub(crate) const TAG_RIGHT_LINK: u16 = 0x08;

/// The built chain elements plus the final chain value, which becomes
/// the calendar chain input.
#[derive(Debug)]
pub(crate) struct AggregationChains {
    pub chains: Vec<TlvElement>,
    pub output_hash: Imprint,
}

/// Build the aggregation chain elements from the `location` blob.
///
/// `input` is the caller's document-derived imprint; the chain value of
/// the first link is one extra hash of its wire form, computed with the
/// first link's algorithm.
pub(crate) fn build(location: &[u8], input: &Imprint) -> Result<AggregationChains, ConvertError> {
    if location.is_empty() {
        return Err(ConvertError::format(
            "No links found in aggregation hash chain.",
        ));
    }

    let first_algorithm = HashAlgorithm::from_gt_id(location[0])?;
    let chain_input = first_algorithm.digest(&input.to_bytes());
    let links = chain::decode_links(location, chain_input)?;
    let last = links.last().ok_or_else(|| {
        ConvertError::format("No links found in aggregation hash chain.")
    })?;

    let mut chains = Vec::new();
    let mut current = vec![
        imprint_element(TAG_INPUT_HASH, &links[0].input_hash),
        TlvElement::integer(TAG_ALGORITHM, links[0].algorithm.gt_id() as u64),
    ];
    let mut links_in_current = 0usize;
    let mut previous_level = 0u8;

    for link in &links {
        if link.level <= previous_level {
            return Err(ConvertError::format(format!(
                "Invalid hash step level: {}",
                link.level
            )));
        }

        if GATEWAY_LEVELS.contains(&link.level) && links_in_current > 0 {
            chains.push(TlvElement::nested(AGGREGATION_HASH_CHAIN, current));
            current = vec![
                imprint_element(TAG_INPUT_HASH, &link.input_hash),
                TlvElement::integer(TAG_ALGORITHM, link.algorithm.gt_id() as u64),
            ];
            links_in_current = 0;
        }

        let mut children = Vec::new();
        let correction = link.level - previous_level - 1;
        if correction > 0 {
            children.push(TlvElement::integer(TAG_LEVEL_CORRECTION, correction as u64));
        }
        children.push(sibling_element(&link.sibling)?);

        let tag = match link.direction {
            LinkDirection::Left => TAG_LEFT_LINK,
            LinkDirection::Right => TAG_RIGHT_LINK,
        };
        current.push(TlvElement::nested(tag, children));

        links_in_current += 1;
        previous_level = link.level;
    }

    chains.push(TlvElement::nested(AGGREGATION_HASH_CHAIN, current));
    attach_chain_indices(&mut chains);

    Ok(AggregationChains {
        chains,
        output_hash: last.result_hash.clone(),
    })
}

fn imprint_element(tag: u16, imprint: &Imprint) -> TlvElement {
    TlvElement::new(tag, imprint.to_bytes())
}

/// Wrap a sibling imprint as a link child.
///
/// SHA-224 imprints are legacy ids: a pseudo-digest carrying an embedded
/// ASCII label instead of hash output. Their structure is validated and
/// they keep a distinct element type.
fn sibling_element(sibling: &Imprint) -> Result<TlvElement, ConvertError> {
    let data = sibling.to_bytes();

    if sibling.algorithm() != HashAlgorithm::Sha224 {
        return Ok(TlvElement::new(TAG_SIBLING_HASH, data));
    }

    if data[1] != 0 {
        return Err(ConvertError::format("Legacy ID second byte must be 0"));
    }

    let label_end = data[2] as usize + 3;
    if label_end > data.len() {
        return Err(ConvertError::format("Legacy ID string is too long."));
    }

    if data[label_end..].iter().any(|&b| b != 0) {
        return Err(ConvertError::format(
            "Bytes after the legacy ID string must be 0",
        ));
    }

    Ok(TlvElement::new(TAG_LEGACY_ID, data))
}

/// Attach location indices to every chain.
///
/// Walking from the last (root-most) chain back to the first, each
/// chain's own index is derived from its link directions and pushed onto
/// an accumulator; the chain then receives the whole accumulator as
/// index children. The root-most index therefore comes first in every
/// chain and each chain's index list is a prefix of the next lower one.
fn attach_chain_indices(chains: &mut [TlvElement]) {
    let mut accumulated: Vec<TlvElement> = Vec::new();

    for element in chains.iter_mut().rev() {
        let mut index = 1u64;
        for child in element.children().iter().rev() {
            match child.element_type() {
                TAG_LEFT_LINK => index = (index << 1) | 1,
                TAG_RIGHT_LINK => index <<= 1,
                _ => {}
            }
        }

        accumulated.push(TlvElement::integer(TAG_CHAIN_INDEX, index));
        for index_element in &accumulated {
            element.push_child(index_element.clone());
        }
    }
}
