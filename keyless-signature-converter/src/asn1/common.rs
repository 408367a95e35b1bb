// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    bcder::{
        decode::{Constructed, DecodeError, Primitive, Source},
        encode::PrimitiveContent,
        Mode, Tag,
    },
    chrono::{Datelike, TimeZone, Timelike},
    std::{io::Write, ops::Deref, str::FromStr},
};

/// Decode a non-negative INTEGER into a native value.
///
/// The legacy format only ever carries unsigned integers here; anything
/// with the sign bit set is rejected.
pub(crate) fn take_uint<S: Source>(
    cons: &mut Constructed<S>,
) -> Result<u128, DecodeError<S::Error>> {
    cons.take_primitive_if(Tag::INTEGER, |prim| {
        let data = prim.take_all()?;

        if data.is_empty() {
            return Err(prim.content_err("invalid INTEGER encoding"));
        }

        if data[0] & 0x80 != 0 {
            return Err(prim.content_err("unexpected negative INTEGER"));
        }

        let skip = data.iter().take_while(|&&b| b == 0).count();
        let unpadded = &data[skip..];
        if unpadded.len() > 16 {
            return Err(prim.content_err("INTEGER value too large"));
        }

        Ok(unpadded.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
    })
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneralizedTime(chrono::DateTime<chrono::Utc>);

impl Deref for GeneralizedTime {
    type Target = chrono::DateTime<chrono::Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<chrono::DateTime<chrono::Utc>> for GeneralizedTime {
    fn from(t: chrono::DateTime<chrono::Utc>) -> Self {
        Self(t)
    }
}

impl GeneralizedTime {
    pub fn take_from<S: Source>(
        cons: &mut Constructed<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_primitive_if(Tag::GENERALIZED_TIME, |prim| Self::from_primitive(prim))
    }

    pub fn from_primitive<S: Source>(
        prim: &mut Primitive<S>,
    ) -> Result<Self, DecodeError<S::Error>> {
        let data = prim.take_all()?;

        if data.len() != "YYYYMMDDHHMMSSZ".len() {
            return Err(prim.content_err("unexpected GeneralizedTime length"));
        }

        if data[14] != b'Z' {
            return Err(prim.content_err("GeneralizedTime must be Zulu"));
        }

        let mut fields = [0u32; 6];
        for (i, field) in fields.iter_mut().enumerate() {
            let start = if i == 0 { 0 } else { 2 + i * 2 };
            let end = if i == 0 { 4 } else { start + 2 };
            *field = std::str::from_utf8(&data[start..end])
                .ok()
                .and_then(|s| u32::from_str(s).ok())
                .ok_or_else(|| prim.content_err("malformed GeneralizedTime"))?;
        }

        chrono::Utc
            .with_ymd_and_hms(
                fields[0] as i32,
                fields[1],
                fields[2],
                fields[3],
                fields[4],
                fields[5],
            )
            .single()
            .map(Self)
            .ok_or_else(|| prim.content_err("malformed GeneralizedTime"))
    }
}

impl ToString for GeneralizedTime {
    fn to_string(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            self.0.year(),
            self.0.month(),
            self.0.day(),
            self.0.hour(),
            self.0.minute(),
            self.0.second()
        )
    }
}

impl PrimitiveContent for GeneralizedTime {
    const TAG: Tag = Tag::GENERALIZED_TIME;

    fn encoded_len(&self, _: Mode) -> usize {
        self.to_string().len()
    }

    fn write_encoded<W: Write>(&self, _: Mode, target: &mut W) -> Result<(), std::io::Error> {
        target.write_all(self.to_string().as_bytes())
    }
}
