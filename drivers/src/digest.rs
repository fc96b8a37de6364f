/*++

Licensed under the Apache-2.0 license.

File Name:

    digest.rs

Abstract:

    File contains the incremental digest engine with an optional hardware
    back end.

--*/

use crate::sha1::{Sha1, SHA1_DIGEST_BYTE_SIZE};
use crate::cprintln;
use sha2::Digest;
use zeroize::Zeroize;
use vboot_error::{VbootError, VbootResult};

/// Largest digest produced by any supported algorithm
pub const MAX_DIGEST_SIZE: usize = 64;

/// Hash algorithm identifiers as stored in embedded hashes
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    Sha1 = 1,
    Sha256 = 2,
    Sha512 = 3,
    Sha224 = 4,
    Sha384 = 5,
}

impl HashAlgorithm {
    /// Size in bytes of the digest produced by the algorithm, zero for `None`
    pub const fn digest_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Sha1 => SHA1_DIGEST_BYTE_SIZE,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

impl TryFrom<u8> for HashAlgorithm {
    type Error = VbootError;

    fn try_from(val: u8) -> VbootResult<Self> {
        match val {
            0 => Ok(Self::None),
            1 => Ok(Self::Sha1),
            2 => Ok(Self::Sha256),
            3 => Ok(Self::Sha512),
            4 => Ok(Self::Sha224),
            5 => Ok(Self::Sha384),
            _ => Err(VbootError::SHA_INIT_ALGORITHM),
        }
    }
}

/// Hardware digest back end supplied by the platform
///
/// Every method defaults to `EX_HWCRYPTO_UNSUPPORTED`, which makes the
/// engine fall back to software. Any other error is fatal for the digest.
pub trait HwCrypto {
    /// Start a hardware digest of `data_size` bytes
    fn hwcrypto_digest_init(&mut self, _alg: HashAlgorithm, _data_size: u32) -> VbootResult<()> {
        Err(VbootError::EX_HWCRYPTO_UNSUPPORTED)
    }

    /// Feed data to the hardware digest
    fn hwcrypto_digest_extend(&mut self, _buf: &[u8]) -> VbootResult<()> {
        Err(VbootError::EX_HWCRYPTO_UNSUPPORTED)
    }

    /// Write the hardware digest result into `digest`
    fn hwcrypto_digest_finalize(&mut self, _digest: &mut [u8]) -> VbootResult<()> {
        Err(VbootError::EX_HWCRYPTO_UNSUPPORTED)
    }
}

/// Platform without digest hardware
#[derive(Default)]
pub struct NoHwCrypto;

impl HwCrypto for NoHwCrypto {}

enum DigestEngine {
    Sha1(Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Hardware,
}

/// Streaming digest tagged with its algorithm
///
/// Created by `init`, extended any number of times and consumed by
/// `finalize`, so a finished digest cannot be extended again. Software
/// state is wiped when the context is dropped.
pub struct DigestContext {
    alg: HashAlgorithm,
    engine: DigestEngine,
}

impl DigestContext {
    /// Start a digest
    ///
    /// # Arguments
    ///
    /// * `alg` - Hash algorithm
    /// * `data_size` - Number of bytes that will be hashed
    /// * `hw` - Hardware back end to try first, `None` for software only
    pub fn init(
        alg: HashAlgorithm,
        data_size: u32,
        hw: Option<&mut dyn HwCrypto>,
    ) -> VbootResult<Self> {
        if let Some(hw) = hw {
            match hw.hwcrypto_digest_init(alg, data_size) {
                Ok(()) => {
                    return Ok(Self {
                        alg,
                        engine: DigestEngine::Hardware,
                    })
                }
                Err(VbootError::EX_HWCRYPTO_UNSUPPORTED) => {
                    cprintln!("[digest] hwcrypto unsupported, using software");
                }
                Err(e) => return Err(e),
            }
        }

        let engine = match alg {
            HashAlgorithm::Sha1 => DigestEngine::Sha1(Sha1::default()),
            HashAlgorithm::Sha224 => DigestEngine::Sha224(sha2::Sha224::new()),
            HashAlgorithm::Sha256 => DigestEngine::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha384 => DigestEngine::Sha384(sha2::Sha384::new()),
            HashAlgorithm::Sha512 => DigestEngine::Sha512(sha2::Sha512::new()),
            HashAlgorithm::None => return Err(VbootError::SHA_INIT_ALGORITHM),
        };
        Ok(Self { alg, engine })
    }

    /// Algorithm of the digest in progress
    pub fn algorithm(&self) -> HashAlgorithm {
        self.alg
    }

    /// Extend the digest with data
    ///
    /// # Arguments
    ///
    /// * `buf` - Data to hash
    /// * `hw` - Hardware back end; only used if `init` selected it
    pub fn extend(&mut self, buf: &[u8], hw: &mut dyn HwCrypto) -> VbootResult<()> {
        match &mut self.engine {
            DigestEngine::Sha1(op) => op.update(buf)?,
            DigestEngine::Sha224(op) => op.update(buf),
            DigestEngine::Sha256(op) => op.update(buf),
            DigestEngine::Sha384(op) => op.update(buf),
            DigestEngine::Sha512(op) => op.update(buf),
            DigestEngine::Hardware => hw.hwcrypto_digest_extend(buf)?,
        }
        Ok(())
    }

    /// Finalize the digest
    ///
    /// Returns the digest size. `digest` must be at least that large.
    pub fn finalize(mut self, digest: &mut [u8], hw: &mut dyn HwCrypto) -> VbootResult<usize> {
        let size = self.alg.digest_size();
        let out = digest
            .get_mut(..size)
            .ok_or(VbootError::SHA_FINALIZE_DIGEST_SIZE)?;

        match core::mem::replace(&mut self.engine, DigestEngine::Hardware) {
            DigestEngine::Sha1(op) => out.copy_from_slice(&op.finalize()),
            DigestEngine::Sha224(op) => out.copy_from_slice(&op.finalize()),
            DigestEngine::Sha256(op) => out.copy_from_slice(&op.finalize()),
            DigestEngine::Sha384(op) => out.copy_from_slice(&op.finalize()),
            DigestEngine::Sha512(op) => out.copy_from_slice(&op.finalize()),
            DigestEngine::Hardware => hw.hwcrypto_digest_finalize(out)?,
        }
        Ok(size)
    }

    // sha2 engines only support a reset; the partial block bytes survive it.
    fn wipe(&mut self) {
        match &mut self.engine {
            DigestEngine::Sha1(op) => op.zeroize(),
            DigestEngine::Sha224(op) => Digest::reset(op),
            DigestEngine::Sha256(op) => Digest::reset(op),
            DigestEngine::Sha384(op) => Digest::reset(op),
            DigestEngine::Sha512(op) => Digest::reset(op),
            DigestEngine::Hardware => {}
        }
    }
}

impl Drop for DigestContext {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// Hash a buffer in one shot in software
///
/// # Arguments
///
/// * `buf` - Data to hash
/// * `alg` - Hash algorithm
/// * `digest` - Output, at least `alg.digest_size()` bytes
pub fn digest_buffer(buf: &[u8], alg: HashAlgorithm, digest: &mut [u8]) -> VbootResult<usize> {
    let mut ctx = DigestContext::init(alg, buf.len() as u32, None)?;
    let mut hw = NoHwCrypto;
    ctx.extend(buf, &mut hw)?;
    ctx.finalize(digest, &mut hw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA256_ABC: [u8; 32] = [
        0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22,
        0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00,
        0x15, 0xad,
    ];

    #[derive(Default)]
    struct CountingHw {
        supported: bool,
        extended: usize,
    }

    impl HwCrypto for CountingHw {
        fn hwcrypto_digest_init(&mut self, _alg: HashAlgorithm, _size: u32) -> VbootResult<()> {
            if self.supported {
                Ok(())
            } else {
                Err(VbootError::EX_HWCRYPTO_UNSUPPORTED)
            }
        }

        fn hwcrypto_digest_extend(&mut self, buf: &[u8]) -> VbootResult<()> {
            self.extended += buf.len();
            Ok(())
        }

        fn hwcrypto_digest_finalize(&mut self, digest: &mut [u8]) -> VbootResult<()> {
            digest.fill(0x5a);
            Ok(())
        }
    }

    #[test]
    fn test_sha256_incremental() {
        let mut hw = NoHwCrypto;
        let mut ctx = DigestContext::init(HashAlgorithm::Sha256, 3, None).unwrap();
        ctx.extend(b"a", &mut hw).unwrap();
        ctx.extend(b"bc", &mut hw).unwrap();
        let mut digest = [0u8; MAX_DIGEST_SIZE];
        assert_eq!(ctx.finalize(&mut digest, &mut hw).unwrap(), 32);
        assert_eq!(digest[..32], SHA256_ABC);
    }

    #[test]
    fn test_wipe_discards_hashed_data() {
        const SHA256_EMPTY: [u8; 32] = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        let mut hw = NoHwCrypto;
        let mut ctx = DigestContext::init(HashAlgorithm::Sha256, 3, None).unwrap();
        ctx.extend(b"abc", &mut hw).unwrap();
        ctx.wipe();
        let mut digest = [0u8; 32];
        ctx.finalize(&mut digest, &mut hw).unwrap();
        assert_eq!(digest, SHA256_EMPTY);

        let mut ctx = DigestContext::init(HashAlgorithm::Sha1, 3, None).unwrap();
        ctx.extend(b"abc", &mut hw).unwrap();
        ctx.wipe();
        let mut digest = [0u8; 20];
        ctx.finalize(&mut digest, &mut hw).unwrap();
        assert_ne!(digest, Sha1::digest(b"abc").unwrap());
    }

    #[test]
    fn test_digest_sizes() {
        for (alg, size) in [
            (HashAlgorithm::Sha1, 20),
            (HashAlgorithm::Sha224, 28),
            (HashAlgorithm::Sha256, 32),
            (HashAlgorithm::Sha384, 48),
            (HashAlgorithm::Sha512, 64),
        ] {
            let mut digest = [0u8; MAX_DIGEST_SIZE];
            assert_eq!(digest_buffer(b"abc", alg, &mut digest).unwrap(), size);
        }
    }

    #[test]
    fn test_none_algorithm_rejected() {
        assert_eq!(
            DigestContext::init(HashAlgorithm::None, 0, None).err(),
            Some(VbootError::SHA_INIT_ALGORITHM)
        );
        assert_eq!(
            HashAlgorithm::try_from(9u8),
            Err(VbootError::SHA_INIT_ALGORITHM)
        );
    }

    #[test]
    fn test_small_output_rejected() {
        let mut digest = [0u8; 16];
        assert_eq!(
            digest_buffer(b"abc", HashAlgorithm::Sha256, &mut digest),
            Err(VbootError::SHA_FINALIZE_DIGEST_SIZE)
        );
    }

    #[test]
    fn test_hwcrypto_unsupported_falls_back() {
        let mut hw = CountingHw::default();
        let mut ctx = DigestContext::init(HashAlgorithm::Sha256, 3, Some(&mut hw)).unwrap();
        ctx.extend(b"abc", &mut hw).unwrap();
        let mut digest = [0u8; 32];
        ctx.finalize(&mut digest, &mut hw).unwrap();
        assert_eq!(hw.extended, 0);
        assert_eq!(digest, SHA256_ABC);
    }

    #[test]
    fn test_hwcrypto_used_when_supported() {
        let mut hw = CountingHw {
            supported: true,
            ..Default::default()
        };
        let mut ctx = DigestContext::init(HashAlgorithm::Sha256, 3, Some(&mut hw)).unwrap();
        ctx.extend(b"abc", &mut hw).unwrap();
        let mut digest = [0u8; 32];
        ctx.finalize(&mut digest, &mut hw).unwrap();
        assert_eq!(hw.extended, 3);
        assert_eq!(digest, [0x5a; 32]);
    }
}
