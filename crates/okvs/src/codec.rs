// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Little-endian binary layout of an encoded table.
//!
//! ```text
//! N | M | W | B | R | len(P)      six i32 words
//! P[0] .. P[len)                  ring-sized entries
//! ```
//!
//! The keying and, for `Z_q`, the modulus are not stored; the reader supplies them.

use crate::errors::{OkvsError, OkvsResult};
use crate::params::{Keying, Params};
use crate::ring::Ring;
use crate::table::Okvs;
use std::io::{Read, Write};

const HEADER_FIELDS: usize = 6;

/// Upper bound on entries reserved up front; the header alone is not trusted.
const PREALLOCATED_ENTRIES: usize = 1 << 16;

fn to_i32(name: &str, value: usize) -> OkvsResult<i32> {
    i32::try_from(value)
        .map_err(|_| OkvsError::codec(format!("{name} = {value} does not fit in int32")))
}

fn to_usize(name: &str, value: i32) -> OkvsResult<usize> {
    usize::try_from(value)
        .map_err(|_| OkvsError::codec(format!("{name} = {value} is negative")))
}

impl<R: Ring> Okvs<R> {
    /// Write the header and table.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> OkvsResult<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> OkvsResult<Vec<u8>> {
        let params = self.params();
        let header = [
            ("N", params.n),
            ("M", params.m),
            ("W", params.w),
            ("B", params.band_bytes()),
            ("R", params.r()),
            ("len", self.entries().len()),
        ];

        let ring = self.ring();
        let mut out =
            Vec::with_capacity(HEADER_FIELDS * 4 + self.entries().len() * ring.value_width());
        for (name, value) in header {
            out.extend_from_slice(&to_i32(name, value)?.to_le_bytes());
        }
        for entry in self.entries() {
            ring.write_value(entry, &mut out);
        }
        Ok(out)
    }

    /// Read a table written by [`Okvs::write_to`].
    ///
    /// # Errors
    ///
    /// - `Io` if the stream ends early
    /// - `Codec` if the header is negative or inconsistent, or an entry is not a
    ///   canonical element of `ring`
    pub fn read_from<Rd: Read>(reader: &mut Rd, ring: R, keying: Keying) -> OkvsResult<Self> {
        let mut header = [0u8; HEADER_FIELDS * 4];
        reader.read_exact(&mut header)?;
        let mut fields = [0usize; HEADER_FIELDS];
        for (i, (field, name)) in fields
            .iter_mut()
            .zip(["N", "M", "W", "B", "R", "len"])
            .enumerate()
        {
            let mut word = [0u8; 4];
            word.copy_from_slice(&header[i * 4..i * 4 + 4]);
            *field = to_usize(name, i32::from_le_bytes(word))?;
        }
        let [n, m, w, band_bytes, range, len] = fields;

        let params = Params::new(n, m, w).map_err(|e| OkvsError::codec(e.to_string()))?;
        if band_bytes != params.band_bytes() {
            return Err(OkvsError::codec(format!(
                "band bytes {band_bytes} inconsistent with W = {w}"
            )));
        }
        if range != params.r() {
            return Err(OkvsError::codec(format!(
                "hash range {range} inconsistent with M = {m}, W = {w}"
            )));
        }
        if len != m {
            return Err(OkvsError::codec(format!(
                "table length {len} differs from M = {m}"
            )));
        }

        let width = ring.value_width();
        if len.checked_mul(width).is_none() {
            return Err(OkvsError::codec(format!(
                "{len} entries of {width} bytes overflow the address space"
            )));
        }

        // the header length bounds the loop, never an allocation
        let mut chunk = vec![0u8; width];
        let mut table = Vec::with_capacity(len.min(PREALLOCATED_ENTRIES));
        for index in 0..len {
            reader.read_exact(&mut chunk)?;
            let value = ring.read_value(&chunk);
            if !ring.contains(&value) {
                return Err(OkvsError::codec(format!("entry {index} is out of range")));
            }
            table.push(value);
        }

        Okvs::from_parts(params, keying, ring, table)
    }

    pub fn from_bytes(bytes: &[u8], ring: R, keying: Keying) -> OkvsResult<Self> {
        let mut reader = bytes;
        Self::read_from(&mut reader, ring, keying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{Gf2, PrimeField};
    use num_bigint::BigUint;

    const MERSENNE_61: u64 = 2305843009213693951;

    fn header(fields: [i32; 6]) -> Vec<u8> {
        fields.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    #[test]
    fn test_layout() {
        let params = Params::new(3, 12, 8).unwrap();
        let table: Vec<u32> = (0..12).collect();
        let okvs = Okvs::from_parts(params, Keying::default(), Gf2::new(), table).unwrap();
        let bytes = okvs.to_bytes().unwrap();

        assert_eq!(bytes.len(), 24 + 12 * 4);
        assert_eq!(&bytes[..24], &header([3, 12, 8, 1, 4, 12])[..]);
        assert_eq!(&bytes[24..28], &[0, 0, 0, 0]);
        assert_eq!(&bytes[28..32], &[1, 0, 0, 0]);

        let back = Okvs::from_bytes(&bytes, Gf2::new(), Keying::default()).unwrap();
        assert_eq!(back.entries(), okvs.entries());
        assert_eq!(back.params(), okvs.params());
    }

    #[test]
    fn test_field_entry_width() {
        let field = PrimeField::new(BigUint::from(65537u32)).unwrap();
        let params = Params::new(1, 5, 4).unwrap();
        let table = vec![BigUint::from(65536u32); 5];
        let okvs = Okvs::from_parts(params, Keying::default(), field.clone(), table).unwrap();
        let bytes = okvs.to_bytes().unwrap();
        assert_eq!(bytes.len(), 24 + 5 * 3);

        let back = Okvs::from_bytes(&bytes, field, Keying::default()).unwrap();
        assert_eq!(back.entries(), okvs.entries());
    }

    #[test]
    fn test_rejects_inconsistent_header() {
        for fields in [
            [3, 12, 8, 2, 4, 12],
            [3, 12, 8, 1, 5, 12],
            [3, 12, 8, 1, 4, 11],
            [-1, 12, 8, 1, 4, 12],
            [3, 12, 0, 0, 12, 12],
        ] {
            let mut bytes = header(fields);
            bytes.extend(std::iter::repeat(0).take(12 * 4));
            let err = Okvs::from_bytes(&bytes, Gf2::new(), Keying::default()).unwrap_err();
            assert!(matches!(err, OkvsError::Codec { .. }), "{fields:?}: {err}");
        }
    }

    #[test]
    fn test_short_read_is_io() {
        let mut bytes = header([3, 12, 8, 1, 4, 12]);
        bytes.extend(std::iter::repeat(0).take(11 * 4));
        let err = Okvs::from_bytes(&bytes, Gf2::new(), Keying::default()).unwrap_err();
        assert!(matches!(err, OkvsError::Io(_)));

        let err = Okvs::from_bytes(&bytes[..10], Gf2::new(), Keying::default()).unwrap_err();
        assert!(matches!(err, OkvsError::Io(_)));
    }

    #[test]
    fn test_huge_header_without_body_is_io() {
        let max = i32::MAX;
        let bytes = header([0, max, 8, 1, max - 8, max]);
        let err = Okvs::from_bytes(&bytes, Gf2::new(), Keying::default()).unwrap_err();
        assert!(matches!(err, OkvsError::Io(_)), "{err}");

        let field = PrimeField::new(BigUint::from(MERSENNE_61)).unwrap();
        let mut bytes = header([0, max, 8, 1, max - 8, max]);
        bytes.extend([0u8; 8 * 3]);
        let err = Okvs::from_bytes(&bytes, field, Keying::default()).unwrap_err();
        assert!(matches!(err, OkvsError::Io(_)), "{err}");
    }

    #[test]
    fn test_wide_gf2_round_trip() {
        let ring = Gf2::<u128>::default();
        let params = Params::new(2, 6, 4).unwrap();
        let table: Vec<u128> = (0..6u128).map(|i| (i << 100) | i).collect();
        let okvs = Okvs::from_parts(params, Keying::default(), ring, table).unwrap();
        let bytes = okvs.to_bytes().unwrap();
        assert_eq!(bytes.len(), 24 + 6 * 16);

        let back = Okvs::from_bytes(&bytes, ring, Keying::default()).unwrap();
        assert_eq!(back.entries(), okvs.entries());
    }

    #[test]
    fn test_rejects_unreduced_field_entry() {
        let field = PrimeField::new(BigUint::from(251u32)).unwrap();
        let mut bytes = header([1, 5, 4, 1, 1, 5]);
        bytes.extend([0, 0, 0, 255, 0]);
        let err = Okvs::from_bytes(&bytes, field, Keying::default()).unwrap_err();
        assert!(err.to_string().contains("entry 3"));
    }
}
