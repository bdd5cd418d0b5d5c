use std::fmt::{Display, Formatter};
use std::ops::Deref;

/// Number of frequency bands a spectrogram must have to be fingerprinted.
pub const NUM_BANDS: usize = 33;

/// Width of a single [SubFingerprint], one bit per pair of adjacent bands.
pub const SUB_FINGERPRINT_BITS: usize = NUM_BANDS - 1;

/// Number of consecutive sub-fingerprints forming a [FingerprintBlock].
pub const BLOCK_LEN: usize = 256;

const _: () = assert!(SUB_FINGERPRINT_BITS == u32::BITS as usize);

/// 32-bit summary of one frame. Bit `i` belongs to bands `i` and `i + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SubFingerprint(u32);

impl SubFingerprint {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Value of the bit derived from bands `index` and `index + 1`.
    pub fn bit(self, index: usize) -> bool {
        assert!(index < SUB_FINGERPRINT_BITS, "bit {index} out of range");
        (self.0 >> index) & 1 == 1
    }

    /// Bits in band order.
    pub fn iter(self) -> impl Iterator<Item = bool> {
        (0..SUB_FINGERPRINT_BITS).map(move |i| self.bit(i))
    }
}

impl FromIterator<bool> for SubFingerprint {
    /// Packs bits in band order; more than [SUB_FINGERPRINT_BITS] items is a bug.
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bits = 0u32;
        for (i, bit) in iter.into_iter().enumerate() {
            assert!(i < SUB_FINGERPRINT_BITS, "too many bits for a sub-fingerprint");
            bits |= u32::from(bit) << i;
        }
        Self(bits)
    }
}

impl Display for SubFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Sub-fingerprints of every frame of a spectrogram, in frame order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintSequence(Vec<SubFingerprint>);

impl FingerprintSequence {
    pub fn as_slice(&self) -> &[SubFingerprint] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<SubFingerprint> {
        self.0
    }
}

impl Deref for FingerprintSequence {
    type Target = [SubFingerprint];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[SubFingerprint]> for FingerprintSequence {
    fn as_ref(&self) -> &[SubFingerprint] {
        &self.0
    }
}

impl From<Vec<SubFingerprint>> for FingerprintSequence {
    fn from(items: Vec<SubFingerprint>) -> Self {
        Self(items)
    }
}

impl FromIterator<SubFingerprint> for FingerprintSequence {
    fn from_iter<I: IntoIterator<Item = SubFingerprint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Window of exactly [BLOCK_LEN] consecutive sub-fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintBlock<'a> {
    start: usize,
    items: &'a [SubFingerprint],
}

impl<'a> FingerprintBlock<'a> {
    pub(crate) fn new(start: usize, items: &'a [SubFingerprint]) -> Self {
        debug_assert_eq!(items.len(), BLOCK_LEN);
        Self { start, items }
    }

    /// Index of the first sub-fingerprint within the source sequence.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn as_slice(&self) -> &'a [SubFingerprint] {
        self.items
    }
}

impl AsRef<[SubFingerprint]> for FingerprintBlock<'_> {
    fn as_ref(&self) -> &[SubFingerprint] {
        self.items
    }
}
