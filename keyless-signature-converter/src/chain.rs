// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Compact hash-chain link decoding.

Both Merkle chain blobs of the legacy token use the same per-link wire
layout:

```text
algo id        1 byte  (vendor numeric id of the step hash)
direction      1 byte  (1 = left, 0 = right)
sibling algo   1 byte  (vendor numeric id of the sibling imprint)
sibling digest N bytes (N determined by the sibling algo)
level          1 byte
```

The blob ends when the next read at the algo-id position hits the end of
the data. Decoding also recomputes the hash along the chain: a left link
hashes `input ‖ sibling ‖ level`, a right link `sibling ‖ input ‖ level`,
with both imprints participating in full wire form. The decoded links
form a contiguous vector; each link records the chain value before and
after its step.
*/

use crate::{
    algorithm::{HashAlgorithm, Imprint},
    ConvertError,
};

/// Which side of the concatenation the chain value takes in a link.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LinkDirection {
    Left,
    Right,
}

impl LinkDirection {
    fn from_wire(value: u8) -> Result<Self, ConvertError> {
        match value {
            1 => Ok(Self::Left),
            0 => Ok(Self::Right),
            n => Err(ConvertError::format(format!(
                "Invalid hash step direction: {}",
                n
            ))),
        }
    }
}

/// One decoded chain link.
#[derive(Clone, Debug)]
pub(crate) struct ChainLink {
    pub algorithm: HashAlgorithm,
    pub direction: LinkDirection,
    pub sibling: Imprint,
    pub level: u8,
    pub input_hash: Imprint,
    pub result_hash: Imprint,
}

/// Compute a single chain step.
pub(crate) fn chain_step(
    algorithm: HashAlgorithm,
    direction: LinkDirection,
    input: &Imprint,
    sibling: &Imprint,
    level: u8,
) -> Imprint {
    let input = input.to_bytes();
    let sibling = sibling.to_bytes();

    let mut data = Vec::with_capacity(input.len() + sibling.len() + 1);
    match direction {
        LinkDirection::Left => {
            data.extend_from_slice(&input);
            data.extend_from_slice(&sibling);
        }
        LinkDirection::Right => {
            data.extend_from_slice(&sibling);
            data.extend_from_slice(&input);
        }
    }
    data.push(level);

    algorithm.digest(&data)
}

/// Decode every link in `blob`, threading the chain value from
/// `input_hash` through each recomputed step.
pub(crate) fn decode_links(
    blob: &[u8],
    input_hash: Imprint,
) -> Result<Vec<ChainLink>, ConvertError> {
    let mut links = Vec::new();
    let mut current = input_hash;
    let mut remaining = blob;

    while let Some((&algo_id, rest)) = remaining.split_first() {
        let algorithm = HashAlgorithm::from_gt_id(algo_id)?;

        let (&direction_byte, rest) = rest.split_first().ok_or_else(|| {
            ConvertError::format("Invalid link, end of stream after algorithm byte.")
        })?;
        let direction = LinkDirection::from_wire(direction_byte)?;

        let (&sibling_algo_id, rest) = rest.split_first().ok_or_else(|| {
            ConvertError::format("Invalid link, end of stream after direction byte.")
        })?;
        let sibling_algorithm = HashAlgorithm::from_gt_id(sibling_algo_id)?;

        let digest_len = sibling_algorithm.digest_len();
        if rest.len() < digest_len {
            return Err(ConvertError::format(
                "Invalid link, not enough data for hash imprint.",
            ));
        }
        let (digest, rest) = rest.split_at(digest_len);
        let sibling = Imprint::new(sibling_algorithm, digest.to_vec())?;

        let (&level, rest) = rest.split_first().ok_or_else(|| {
            ConvertError::format("Invalid link, end of stream after hash imprint.")
        })?;

        let result_hash = chain_step(algorithm, direction, &current, &sibling, level);

        links.push(ChainLink {
            algorithm,
            direction,
            sibling,
            level,
            input_hash: current,
            result_hash: result_hash.clone(),
        });
        current = result_hash;
        remaining = rest;
    }

    Ok(links)
}
