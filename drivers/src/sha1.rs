/*++

Licensed under the Apache-2.0 license.

File Name:

    sha1.rs

Abstract:

    File contains the streaming software SHA-1 engine.

--*/

use vboot_error::{VbootError, VbootResult};
use zeroize::Zeroize;

pub const SHA1_DIGEST_BYTE_SIZE: usize = 20;
const SHA1_BLOCK_BYTE_SIZE: usize = 64;
const SHA1_BLOCK_LEN_OFFSET: usize = 56;

/// Streaming SHA-1 digest operation
///
/// Data is staged into a block buffer and compressed one block at a time, so
/// any number of `update` calls of any size may precede `finalize`.
#[derive(Clone, Zeroize)]
pub struct Sha1 {
    /// Compressor
    compressor: Sha1Compressor,

    /// Staging buffer
    buf: [u8; SHA1_BLOCK_BYTE_SIZE],

    /// Current staging buffer index
    buf_idx: usize,

    /// Total bytes hashed
    data_size: u64,
}

impl Default for Sha1 {
    fn default() -> Self {
        Self {
            compressor: Sha1Compressor::default(),
            buf: [0u8; SHA1_BLOCK_BYTE_SIZE],
            buf_idx: 0,
            data_size: 0,
        }
    }
}

impl Sha1 {
    /// Update the digest with data
    ///
    /// # Arguments
    ///
    /// * `data` - Data to used to update the digest
    pub fn update(&mut self, data: &[u8]) -> VbootResult<()> {
        self.data_size = self
            .data_size
            .checked_add(data.len() as u64)
            .ok_or(VbootError::SHA_MAX_DATA)?;

        let mut data = data;
        while !data.is_empty() {
            let take = core::cmp::min(SHA1_BLOCK_BYTE_SIZE - self.buf_idx, data.len());
            let (head, rest) = data.split_at(take);
            self.buf[self.buf_idx..self.buf_idx + take].copy_from_slice(head);
            self.buf_idx += take;
            data = rest;

            // If the buffer is full calculate the digest of accumulated data
            if self.buf_idx == SHA1_BLOCK_BYTE_SIZE {
                self.compressor.compress(&self.buf);
                self.buf_idx = 0;
            }
        }

        Ok(())
    }

    /// Finalize the digest operation
    ///
    /// Consumes the operation; the staging buffer is wiped on return.
    pub fn finalize(mut self) -> [u8; SHA1_DIGEST_BYTE_SIZE] {
        let bit_len = self.data_size << 3;
        let mut block = [0u8; SHA1_BLOCK_BYTE_SIZE];
        block[..self.buf_idx].copy_from_slice(&self.buf[..self.buf_idx]);
        block[self.buf_idx] = 0b1000_0000;

        // Add a padding block if the length does not fit
        if self.buf_idx >= SHA1_BLOCK_LEN_OFFSET {
            self.compressor.compress(&block);
            block.fill(0);
        }
        block[SHA1_BLOCK_LEN_OFFSET..].copy_from_slice(&bit_len.to_be_bytes());
        self.compressor.compress(&block);
        block.zeroize();

        let mut digest = [0u8; SHA1_DIGEST_BYTE_SIZE];
        for (chunk, word) in digest.chunks_exact_mut(4).zip(self.compressor.hash.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        self.zeroize();
        digest
    }

    /// Calculate the digest of the buffer
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to calculate the digest over
    pub fn digest(buf: &[u8]) -> VbootResult<[u8; SHA1_DIGEST_BYTE_SIZE]> {
        let mut op = Self::default();
        op.update(buf)?;
        Ok(op.finalize())
    }
}

/// SHA1 Compressor
///
/// Implementation based on reference code in https://www.rfc-editor.org/rfc/rfc3174
#[derive(Clone, Zeroize)]
struct Sha1Compressor {
    /// Hash
    hash: [u32; 5],
}

impl Default for Sha1Compressor {
    fn default() -> Self {
        Self {
            hash: [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0],
        }
    }
}

impl Sha1Compressor {
    /// Compress the block
    ///
    /// # Arguments
    ///
    /// * `block` - Block to compress
    fn compress(&mut self, block: &[u8; SHA1_BLOCK_BYTE_SIZE]) {
        const K: [u32; 4] = [0x5A827999, 0x6ED9EBA1, 0x8F1BBCDC, 0xCA62C1D6];
        let mut w = [0u32; 80];

        for (word, bytes) in w.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        for idx in 16..80 {
            w[idx] = (w[idx - 3] ^ w[idx - 8] ^ w[idx - 14] ^ w[idx - 16]).rotate_left(1);
        }

        let [mut a, mut b, mut c, mut d, mut e] = self.hash;

        for (idx, word) in w.iter().enumerate() {
            let (f, k) = match idx / 20 {
                0 => ((b & c) | ((!b) & d), K[0]),
                1 => (b ^ c ^ d, K[1]),
                2 => ((b & c) | (b & d) | (c & d), K[2]),
                _ => (b ^ c ^ d, K[3]),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(*word)
                .wrapping_add(k);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        for (h, v) in self.hash.iter_mut().zip([a, b, c, d, e]) {
            *h = h.wrapping_add(v);
        }
        w.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_DIGEST: [u8; SHA1_DIGEST_BYTE_SIZE] = [
        0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50, 0xc2,
        0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
    ];

    #[test]
    fn test_digest_abc() {
        assert_eq!(Sha1::digest(b"abc").unwrap(), ABC_DIGEST);
    }

    #[test]
    fn test_digest_empty() {
        let expected = [
            0xda, 0x39, 0xa3, 0xee, 0x5e, 0x6b, 0x4b, 0x0d, 0x32, 0x55, 0xbf, 0xef, 0x95, 0x60,
            0x18, 0x90, 0xaf, 0xd8, 0x07, 0x09,
        ];
        assert_eq!(Sha1::digest(&[]).unwrap(), expected);
    }

    #[test]
    fn test_digest_two_blocks() {
        // 56 bytes forces the length into a second padding block
        let data = b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq";
        let expected = [
            0x84, 0x98, 0x3e, 0x44, 0x1c, 0x3b, 0xd2, 0x6e, 0xba, 0xae, 0x4a, 0xa1, 0xf9, 0x51,
            0x29, 0xe5, 0xe5, 0x46, 0x70, 0xf1,
        ];
        assert_eq!(Sha1::digest(data).unwrap(), expected);
    }

    #[test]
    fn test_split_updates_match_one_shot() {
        let data: Vec<u8> = (0..300u32).map(|i| (i * 7) as u8).collect();
        let one_shot = Sha1::digest(&data).unwrap();

        let mut op = Sha1::default();
        for chunk in data.chunks(13) {
            op.update(chunk).unwrap();
        }
        assert_eq!(op.finalize(), one_shot);
    }
}
