/*++

Licensed under the Apache-2.0 license.

File Name:

    key.rs

Abstract:

    File contains packed public key unpacking.

--*/

use crate::verifier::verify_member_inside;
use vboot_drivers::{cprintln, HashAlgorithm};
use vboot_error::{VbootError, VbootResult};
use vboot_image_types::{PackedKey, CRYPTO_ALGORITHM_COUNT, PACKED_KEY_SIZE};
use zerocopy::FromBytes;

/// Signature algorithm of a public key
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SigAlgorithm {
    Rsa1024,
    Rsa2048,
    Rsa4096,
    Rsa8192,
    Rsa2048Exp3,
    Rsa3072Exp3,
}

impl SigAlgorithm {
    /// Signature (and modulus) size in bytes
    pub const fn sig_size(&self) -> usize {
        match self {
            Self::Rsa1024 => 128,
            Self::Rsa2048 | Self::Rsa2048Exp3 => 256,
            Self::Rsa3072Exp3 => 384,
            Self::Rsa4096 => 512,
            Self::Rsa8192 => 1024,
        }
    }

    /// Size of the packed key data: array size, n0inv, modulus, R^2
    pub const fn packed_key_size(&self) -> usize {
        2 * self.sig_size() + 2 * core::mem::size_of::<u32>()
    }
}

/// Split a packed key algorithm identifier into signature and hash algorithm
pub fn crypto_algorithm(algorithm: u32) -> Option<(SigAlgorithm, HashAlgorithm)> {
    if algorithm >= CRYPTO_ALGORITHM_COUNT {
        return None;
    }

    let sig = match algorithm {
        0..=2 => SigAlgorithm::Rsa1024,
        3..=5 => SigAlgorithm::Rsa2048,
        6..=8 => SigAlgorithm::Rsa4096,
        9..=11 => SigAlgorithm::Rsa8192,
        12..=14 => SigAlgorithm::Rsa2048Exp3,
        _ => SigAlgorithm::Rsa3072Exp3,
    };
    let hash = match algorithm % 3 {
        0 => HashAlgorithm::Sha1,
        1 => HashAlgorithm::Sha256,
        _ => HashAlgorithm::Sha512,
    };
    Some((sig, hash))
}

/// Unpacked RSA public key
///
/// The modulus and R^2 arrays are little-endian words borrowed from the
/// buffer the key was unpacked from.
#[derive(Debug, Copy, Clone)]
pub struct PublicKey<'a> {
    pub sig_alg: SigAlgorithm,
    pub hash_alg: HashAlgorithm,
    pub arrsize: u32,
    pub n0inv: u32,
    pub n: &'a [u8],
    pub rr: &'a [u8],
    pub key_version: u32,
}

/// Unpack a packed key
///
/// # Arguments
///
/// * `buf` - Packed key header followed by its key data
pub fn unpack_key(buf: &[u8]) -> VbootResult<PublicKey<'_>> {
    let (packed, _) = PackedKey::read_from_prefix(buf).map_err(|_| VbootError::INSIDE_DATA_OUTSIDE)?;
    verify_member_inside(
        buf.len(),
        0,
        PACKED_KEY_SIZE,
        packed.key_offset(),
        packed.key_size(),
    )?;

    let (sig_alg, hash_alg) = crypto_algorithm(packed.algorithm()).ok_or_else(|| {
        cprintln!("[key] Unknown algorithm {}", packed.algorithm());
        VbootError::UNPACK_KEY_ALGORITHM
    })?;

    if packed.key_size() as usize != sig_alg.packed_key_size() {
        cprintln!("[key] Key size {}", packed.key_size());
        return Err(VbootError::UNPACK_KEY_SIZE);
    }

    let start = packed.key_offset() as usize;
    let data = buf
        .get(start..start + packed.key_size() as usize)
        .ok_or(VbootError::INSIDE_DATA_OUTSIDE)?;
    let (header, arrays) = data.split_at(8);
    let arrsize = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let n0inv = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if arrsize as usize * core::mem::size_of::<u32>() != sig_alg.sig_size() {
        return Err(VbootError::UNPACK_KEY_ARRAY_SIZE);
    }
    let (n, rr) = arrays.split_at(sig_alg.sig_size());

    Ok(PublicKey {
        sig_alg,
        hash_alg,
        arrsize,
        n0inv,
        n,
        rr,
        key_version: packed.key_version(),
    })
}
