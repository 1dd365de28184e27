/*!
The [`SpanId`] type.

A span id is 16 opaque bytes. The all-zero value means "no span" and is
never produced by [`SpanId::random`]. Ids mint their entropy from the
[`crate::rng::Rng`] collaborator: the drawn 63-bit value lands in the
leading eight bytes, so the default 16-column textual form shows exactly
the significant digits; the trailing bytes stay zero unless the producer
fills them through [`SpanId::from_bytes`].
*/

use core::fmt;

use crate::rng::Rng;

/**
A 16-byte span identifier.
*/
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpanId([u8; 16]);

const HEX_ENCODE_TABLE: [u8; 16] = [
    b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'a', b'b', b'c', b'd', b'e', b'f',
];

impl SpanId {
    /**
    The absent span id.
    */
    pub const ZERO: SpanId = SpanId([0; 16]);

    /**
    Mint a fresh non-zero id from `rng`.
    */
    pub fn random<R: Rng + ?Sized>(rng: &R) -> SpanId {
        loop {
            let v = rng.next_i63();
            if v != 0 {
                return SpanId::from_u64(v as u64);
            }
        }
    }

    /**
    An id carrying `v` in its leading eight bytes.
    */
    pub fn from_u64(v: u64) -> SpanId {
        let mut id = [0; 16];
        id[..8].copy_from_slice(&v.to_be_bytes());
        SpanId(id)
    }

    /**
    An id from all 16 raw bytes.
    */
    pub const fn from_bytes(bytes: [u8; 16]) -> SpanId {
        SpanId(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 16]
    }

    /**
    Render the id into `dst`, filling every byte.

    Leading bytes are written as lowercase hex with leading zeros
    preserved; the zero id fills `dst` with underscores. Sixteen columns
    show the significant half of a randomly minted id, thirty-two show
    the whole thing.
    */
    pub fn format_to(&self, dst: &mut [u8]) {
        if self.is_zero() {
            for b in dst.iter_mut() {
                *b = b'_';
            }
            return;
        }

        for (j, b) in dst.iter_mut().enumerate() {
            let byte = self.0[(j / 2) % 16];
            let nibble = if j % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            *b = HEX_ENCODE_TABLE[nibble as usize];
        }
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = [0; 16];
        self.format_to(&mut buf);
        f.write_str(core::str::from_utf8(&buf).unwrap())
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeqRng;

    #[test]
    fn zero_renders_as_underscores() {
        assert_eq!(SpanId::ZERO.to_string(), "________________");
    }

    #[test]
    fn nonzero_preserves_leading_zeros() {
        assert_eq!(SpanId::from_u64(1).to_string(), "0000000000000001");
        assert_eq!(
            SpanId::from_u64(0x0102030405060708).to_string(),
            "0102030405060708"
        );
    }

    #[test]
    fn full_width_shows_all_bytes() {
        let id = SpanId::from_bytes([
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
            0x0f, 0x10,
        ]);

        let mut buf = [0; 32];
        id.format_to(&mut buf);

        assert_eq!(
            core::str::from_utf8(&buf).unwrap(),
            "0102030405060708090a0b0c0d0e0f10"
        );
    }

    #[test]
    fn random_is_never_zero() {
        // The sequence starts at zero; the first draw must be skipped.
        let rng = SeqRng::new(0);

        let id = SpanId::random(&rng);

        assert!(!id.is_zero());
        assert_eq!(id, SpanId::from_u64(1));
    }
}
