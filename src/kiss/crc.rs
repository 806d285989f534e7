//! # CRC32 (IEEE 802.3) Implementation
//!
//! Byte-reflected CRC-32 used to protect KISS frames.
//!
//! **Polynomial**: 0xEDB88320 (reflected 0x04C11DB7)
//! **Initial Value**: 0xFFFFFFFF
//! **Final XOR**: 0xFFFFFFFF

/// Reflected CRC-32 polynomial
const CRC32_POLY: u32 = 0xEDB8_8320;

/// Seed for a fresh computation
const CRC32_INIT: u32 = 0xFFFF_FFFF;

/// Precomputed CRC32 lookup table
const CRC32_TABLE: [u32; 256] = generate_crc32_table();

/// Generate CRC32 lookup table at compile time
const fn generate_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC32_POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

#[inline]
fn update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

/// Calculate the CRC32 of `data` in one shot
///
/// # Examples
///
/// ```
/// use kiss_link::kiss::crc::crc32;
///
/// assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8]) -> u32 {
    !update(CRC32_INIT, data)
}

/// Continue a running CRC32 computation
///
/// Pass `0` as `prev` on the first call and the returned (uncomplemented) value on
/// every following call. The caller applies the final complement (`!crc`).
///
/// A legitimately computed intermediate value of `0` is indistinguishable from a
/// fresh start here; [`Crc32`] keeps an explicit state and has no such case.
pub fn crc32_push(prev: u32, data: &[u8]) -> u32 {
    let seed = if prev == 0 { CRC32_INIT } else { prev };
    update(seed, data)
}

/// Incremental CRC32 accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub const fn new() -> Self {
        Self { state: CRC32_INIT }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state = update(self.state, data);
    }

    pub fn update_byte(&mut self, byte: u8) {
        self.state = CRC32_TABLE[((self.state ^ byte as u32) & 0xFF) as usize] ^ (self.state >> 8);
    }

    /// Final checksum; the accumulator stays usable for further updates
    pub fn finalize(&self) -> u32 {
        !self.state
    }
}

/// Bitwise CRC32 (slow, for verifying the table)
#[allow(dead_code)]
fn crc32_slow(data: &[u8]) -> u32 {
    let mut crc = CRC32_INIT;

    for &byte in data {
        crc ^= byte as u32;

        for _ in 0..8 {
            if (crc & 1) != 0 {
                crc = (crc >> 1) ^ CRC32_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    !crc
}
