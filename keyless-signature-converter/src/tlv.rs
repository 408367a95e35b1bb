// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! In-memory TLV tree.

The conversion output is a nested tag-length-value record. An element
carries a 13-bit type, two header flags and either raw content bytes or
an ordered list of child elements. Serialisation uses the compact 8-bit
header when the type fits in 5 bits and the value in a single length
byte, and the 16-bit header otherwise.
*/

use crate::ConvertError;

/// Largest representable element type (13 bits).
const TYPE_MAX: u16 = 0x1fff;

/// Largest element type encodable with the 8-bit header.
const TYPE8_MAX: u16 = 0x1f;

#[derive(Clone, Debug, Eq, PartialEq)]
enum TlvValue {
    Raw(Vec<u8>),
    Nested(Vec<TlvElement>),
}

/// A single TLV element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TlvElement {
    element_type: u16,
    non_critical: bool,
    forward: bool,
    value: TlvValue,
}

impl TlvElement {
    /// Construct an element with raw content.
    pub fn new(element_type: u16, content: Vec<u8>) -> Self {
        debug_assert!(element_type <= TYPE_MAX);

        Self {
            element_type,
            non_critical: false,
            forward: false,
            value: TlvValue::Raw(content),
        }
    }

    /// Construct an element holding child elements.
    pub fn nested(element_type: u16, children: Vec<TlvElement>) -> Self {
        debug_assert!(element_type <= TYPE_MAX);

        Self {
            element_type,
            non_critical: false,
            forward: false,
            value: TlvValue::Nested(children),
        }
    }

    /// Construct an element holding a non-negative integer.
    ///
    /// The content is the minimal big-endian representation; zero encodes
    /// as empty content.
    pub fn integer(element_type: u16, value: u64) -> Self {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();

        Self::new(element_type, bytes[skip..].to_vec())
    }

    pub fn element_type(&self) -> u16 {
        self.element_type
    }

    pub fn is_non_critical(&self) -> bool {
        self.non_critical
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn set_non_critical(&mut self, value: bool) {
        self.non_critical = value;
    }

    pub fn set_forward(&mut self, value: bool) {
        self.forward = value;
    }

    /// Raw content bytes, or `None` for a nested element.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.value {
            TlvValue::Raw(content) => Some(content),
            TlvValue::Nested(_) => None,
        }
    }

    /// Child elements. Empty for a raw element.
    pub fn children(&self) -> &[TlvElement] {
        match &self.value {
            TlvValue::Raw(_) => &[],
            TlvValue::Nested(children) => children,
        }
    }

    /// Append a child.
    ///
    /// Panics when called on an element constructed with raw content.
    pub fn push_child(&mut self, child: TlvElement) {
        match &mut self.value {
            TlvValue::Nested(children) => children.push(child),
            TlvValue::Raw(_) => panic!("cannot append a child to a raw TLV element"),
        }
    }

    /// Iterate children of a given type, in order.
    pub fn children_by_type(&self, element_type: u16) -> impl Iterator<Item = &TlvElement> {
        self.children()
            .iter()
            .filter(move |child| child.element_type == element_type)
    }

    /// The first child of a given type, if any.
    pub fn first_child(&self, element_type: u16) -> Option<&TlvElement> {
        self.children_by_type(element_type).next()
    }

    /// Interpret raw content as a big-endian unsigned integer.
    pub fn as_integer(&self) -> Result<u64, ConvertError> {
        let content = self
            .content()
            .ok_or_else(|| ConvertError::format("TLV element does not hold integer content"))?;

        if content.len() > 8 {
            return Err(ConvertError::format("TLV integer content too long"));
        }

        Ok(content.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    fn encoded_value(&self) -> Result<Vec<u8>, ConvertError> {
        match &self.value {
            TlvValue::Raw(content) => Ok(content.clone()),
            TlvValue::Nested(children) => {
                let mut out = Vec::new();
                for child in children {
                    child.write_encoded(&mut out)?;
                }

                Ok(out)
            }
        }
    }

    fn write_encoded(&self, out: &mut Vec<u8>) -> Result<(), ConvertError> {
        let value = self.encoded_value()?;

        if self.element_type > TYPE8_MAX || value.len() > 0xff {
            if value.len() > 0xffff {
                return Err(ConvertError::format("TLV value too long"));
            }

            let mut first = 0x80 | ((self.element_type >> 8) as u8 & 0x1f);
            if self.non_critical {
                first |= 0x40;
            }
            if self.forward {
                first |= 0x20;
            }

            out.push(first);
            out.push(self.element_type as u8);
            out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        } else {
            let mut first = self.element_type as u8;
            if self.non_critical {
                first |= 0x40;
            }
            if self.forward {
                first |= 0x20;
            }

            out.push(first);
            out.push(value.len() as u8);
        }

        out.extend_from_slice(&value);

        Ok(())
    }

    /// Serialise the element, header included.
    pub fn encode(&self) -> Result<Vec<u8>, ConvertError> {
        let mut out = Vec::new();
        self.write_encoded(&mut out)?;

        Ok(out)
    }
}
