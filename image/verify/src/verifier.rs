/*++

Licensed under the Apache-2.0 license.

File Name:

    verifier.rs

Abstract:

    This file is the main implementation of the keyblock and firmware
    preamble verifier.

--*/

use crate::*;
use vboot_drivers::{cprintln, digest_buffer, MAX_DIGEST_SIZE};
use vboot_image_types::*;
use zerocopy::FromBytes;

/// Check that a member's trailing data lies inside its parent
///
/// # Arguments
///
/// * `parent_size` - Size of the parent buffer
/// * `member_offset` - Offset of the member header in the parent
/// * `member_size` - Size of the member header
/// * `data_offset` - Offset of the member data, relative to the member
/// * `data_size` - Size of the member data
pub fn verify_member_inside(
    parent_size: usize,
    member_offset: usize,
    member_size: usize,
    data_offset: u32,
    data_size: u32,
) -> VbootResult<()> {
    let member_end = member_offset
        .checked_add(member_size)
        .ok_or(VbootError::INSIDE_DATA_OUTSIDE)?;
    if member_end > parent_size {
        return Err(VbootError::INSIDE_DATA_OUTSIDE);
    }

    let data_end = member_offset
        .checked_add(data_offset as usize)
        .and_then(|start| start.checked_add(data_size as usize))
        .ok_or(VbootError::INSIDE_DATA_OUTSIDE)?;
    if data_end > parent_size {
        return Err(VbootError::INSIDE_DATA_OUTSIDE);
    }
    Ok(())
}

/// Trailing data of a signature whose header sits at `sig_hdr_offset`
///
/// # Arguments
///
/// * `parent` - Buffer holding the signature header and its data
/// * `sig_hdr_offset` - Offset of the signature header in `parent`
/// * `sig` - Signature header
pub fn signature_data<'a>(
    parent: &'a [u8],
    sig_hdr_offset: usize,
    sig: &Signature,
) -> VbootResult<&'a [u8]> {
    verify_member_inside(
        parent.len(),
        sig_hdr_offset,
        SIGNATURE_SIZE,
        sig.sig_offset(),
        sig.sig_size(),
    )?;
    let start = sig_hdr_offset + sig.sig_offset() as usize;
    Ok(&parent[start..start + sig.sig_size() as usize])
}

/// Image Verifier
pub struct ImageVerifier<Env: ImageVerificationEnv> {
    /// Verification Environment
    env: Env,
}

impl<Env: ImageVerificationEnv> ImageVerifier<Env> {
    /// Create a new instance `ImageVerifier`
    ///
    /// # Arguments
    ///
    /// * `env` - Environment
    pub fn new(env: Env) -> Self {
        Self { env }
    }

    /// Verify a signature over a precomputed digest
    ///
    /// # Arguments
    ///
    /// * `key` - Public key
    /// * `sig` - Signature header
    /// * `sig_data` - Signature bytes
    /// * `digest` - Digest of the signed data
    pub fn verify_digest(
        &mut self,
        key: &PublicKey,
        sig: &Signature,
        sig_data: &[u8],
        digest: &[u8],
    ) -> VbootResult<()> {
        if sig.sig_size() as usize != key.sig_alg.sig_size() || sig_data.len() != sig.sig_size() as usize {
            cprintln!("[verify] Wrong signature size {}", sig.sig_size());
            return Err(VbootError::VERIFY_DIGEST_SIG_SIZE);
        }

        match self.env.rsa_verify_digest(key, sig_data, digest) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VbootError::VERIFY_DIGEST_MISMATCH),
            Err(e) => {
                cprintln!("[verify] RSA primitive failed 0x{:x}", u32::from(e));
                Err(VbootError::VERIFY_DIGEST_FAILURE)
            }
        }
    }

    /// Hash the signed prefix of `parent` and verify it
    ///
    /// # Arguments
    ///
    /// * `parent` - Signed data, which also holds the signature
    /// * `sig_hdr_offset` - Offset of the signature header in `parent`
    /// * `key` - Public key
    pub fn verify_data(
        &mut self,
        parent: &[u8],
        sig_hdr_offset: usize,
        key: &PublicKey,
    ) -> VbootResult<()> {
        let (sig, _) = parent
            .get(sig_hdr_offset..)
            .and_then(|rest| Signature::read_from_prefix(rest).ok())
            .ok_or(VbootError::INSIDE_DATA_OUTSIDE)?;

        let signed = parent
            .get(..sig.data_size() as usize)
            .ok_or(VbootError::VERIFY_DATA_SIZE)?;

        let mut digest = [0u8; MAX_DIGEST_SIZE];
        let size = digest_buffer(signed, key.hash_alg, &mut digest)?;
        let sig_data = signature_data(parent, sig_hdr_offset, &sig)?;
        self.verify_digest(key, &sig, sig_data, &digest[..size])
    }

    /// Verify a keyblock against the key that signed it
    ///
    /// Returns a copy of the keyblock header on success.
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer starting with the keyblock
    /// * `key` - Signing key
    pub fn verify_keyblock(&mut self, buf: &[u8], key: &PublicKey) -> VbootResult<Keyblock> {
        let (kb, _) =
            Keyblock::read_from_prefix(buf).map_err(|_| VbootError::KEYBLOCK_TOO_SMALL_FOR_HEADER)?;

        if kb.magic() != &KEYBLOCK_MAGIC {
            return Err(VbootError::KEYBLOCK_MAGIC);
        }
        if kb.header_version_major() != KEYBLOCK_VERSION_MAJOR {
            return Err(VbootError::KEYBLOCK_HEADER_VERSION);
        }

        let block = buf
            .get(..kb.keyblock_size() as usize)
            .ok_or(VbootError::KEYBLOCK_SIZE)?;

        let sig = kb.keyblock_signature();
        verify_member_inside(
            block.len(),
            Keyblock::signature_offset(),
            SIGNATURE_SIZE,
            sig.sig_offset(),
            sig.sig_size(),
        )
        .map_err(|_| VbootError::KEYBLOCK_SIG_OUTSIDE)?;

        if (sig.data_size() as usize) < KEYBLOCK_SIZE {
            return Err(VbootError::KEYBLOCK_SIGNED_TOO_LITTLE);
        }
        if sig.data_size() as usize > block.len() {
            return Err(VbootError::KEYBLOCK_SIGNED_TOO_MUCH);
        }

        let data_key = kb.data_key();
        verify_member_inside(
            sig.data_size() as usize,
            Keyblock::data_key_range().start,
            PACKED_KEY_SIZE,
            data_key.key_offset(),
            data_key.key_size(),
        )
        .map_err(|_| VbootError::KEYBLOCK_DATA_KEY_OUTSIDE)?;

        self.verify_data(block, Keyblock::signature_offset(), key)
            .map_err(|e| {
                cprintln!("[verify] Keyblock signature 0x{:x}", u32::from(e));
                VbootError::KEYBLOCK_SIG_INVALID
            })?;

        Ok(kb)
    }

    /// Verify a firmware preamble against the data key
    ///
    /// Returns a copy of the preamble header on success.
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer starting with the preamble
    /// * `key` - Data key from the keyblock
    pub fn verify_fw_preamble(&mut self, buf: &[u8], key: &PublicKey) -> VbootResult<FwPreamble> {
        let (pre, _) =
            FwPreamble::read_from_prefix(buf).map_err(|_| VbootError::PREAMBLE_TOO_SMALL_FOR_HEADER)?;

        if pre.header_version_major() != FIRMWARE_PREAMBLE_VERSION_MAJOR
            || pre.header_version_minor() < 1
        {
            return Err(VbootError::PREAMBLE_HEADER_VERSION);
        }

        let preamble = buf
            .get(..pre.preamble_size() as usize)
            .ok_or(VbootError::PREAMBLE_SIZE)?;

        let sig = pre.preamble_signature();
        verify_member_inside(
            preamble.len(),
            FwPreamble::signature_offset(),
            SIGNATURE_SIZE,
            sig.sig_offset(),
            sig.sig_size(),
        )
        .map_err(|_| VbootError::PREAMBLE_SIG_OUTSIDE)?;

        if (sig.data_size() as usize) < FW_PREAMBLE_SIZE {
            return Err(VbootError::PREAMBLE_SIGNED_TOO_LITTLE);
        }
        if sig.data_size() as usize > preamble.len() {
            return Err(VbootError::PREAMBLE_SIGNED_TOO_MUCH);
        }

        self.verify_data(preamble, FwPreamble::signature_offset(), key)
            .map_err(|e| {
                cprintln!("[verify] Preamble signature 0x{:x}", u32::from(e));
                VbootError::PREAMBLE_SIG_INVALID
            })?;

        let signed_size = sig.data_size() as usize;
        let subkey = pre.kernel_subkey();
        verify_member_inside(
            signed_size,
            FwPreamble::kernel_subkey_offset(),
            PACKED_KEY_SIZE,
            subkey.key_offset(),
            subkey.key_size(),
        )
        .map_err(|_| VbootError::PREAMBLE_KERNEL_SUBKEY_OUTSIDE)?;

        let body_sig = pre.body_signature();
        verify_member_inside(
            signed_size,
            FwPreamble::body_signature_offset(),
            SIGNATURE_SIZE,
            body_sig.sig_offset(),
            body_sig.sig_size(),
        )
        .map_err(|_| VbootError::PREAMBLE_BODY_SIG_OUTSIDE)?;

        Ok(pre)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::unpack_key;
    use vboot_drivers::HashAlgorithm;
    use zerocopy::IntoBytes;

    const ALGORITHM: u32 = 4;
    const SIG_SIZE: usize = 256;
    const KEY_DATA_SIZE: usize = 8 + 2 * SIG_SIZE;

    /// Accepts a signature that starts with the digest
    #[derive(Default)]
    struct TestEnv {
        calls: usize,
    }

    impl ImageVerificationEnv for TestEnv {
        fn rsa_verify_digest(
            &mut self,
            _key: &PublicKey,
            sig: &[u8],
            digest: &[u8],
        ) -> VbootResult<bool> {
            self.calls += 1;
            Ok(&sig[..digest.len()] == digest)
        }
    }

    fn key_data() -> Vec<u8> {
        let mut data = ((SIG_SIZE / 4) as u32).to_le_bytes().to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.resize(KEY_DATA_SIZE, 0x11);
        data
    }

    fn packed_key(version: u32) -> Vec<u8> {
        let mut pk = PackedKey::default();
        pk.set_key_offset(PACKED_KEY_SIZE as u32);
        pk.set_key_size(KEY_DATA_SIZE as u32);
        pk.set_algorithm(ALGORITHM);
        pk.set_key_version(version);
        let mut buf = pk.as_bytes().to_vec();
        buf.extend_from_slice(&key_data());
        buf
    }

    fn sign(data: &[u8]) -> Vec<u8> {
        let mut digest = [0u8; 32];
        digest_buffer(data, HashAlgorithm::Sha256, &mut digest).unwrap();
        let mut sig = digest.to_vec();
        sig.resize(SIG_SIZE, 0);
        sig
    }

    fn keyblock() -> Vec<u8> {
        let key_start = KEYBLOCK_SIZE;
        let sig_start = key_start + KEY_DATA_SIZE;
        let mut kb = Keyblock::default();
        kb.set_magic(KEYBLOCK_MAGIC);
        kb.set_header_version_major(KEYBLOCK_VERSION_MAJOR);
        kb.set_header_version_minor(KEYBLOCK_VERSION_MINOR);
        kb.set_keyblock_size((sig_start + SIG_SIZE) as u32);
        kb.keyblock_signature_mut()
            .set_sig_offset((sig_start - Keyblock::signature_offset()) as u32)
            .set_sig_size(SIG_SIZE as u32)
            .set_data_size(sig_start as u32);
        kb.data_key_mut()
            .set_key_offset((key_start - Keyblock::data_key_range().start) as u32)
            .set_key_size(KEY_DATA_SIZE as u32)
            .set_algorithm(ALGORITHM)
            .set_key_version(2);

        let mut buf = kb.as_bytes().to_vec();
        buf.extend_from_slice(&key_data());
        let sig = sign(&buf);
        buf.extend_from_slice(&sig);
        buf
    }

    fn preamble(firmware_version: u32) -> Vec<u8> {
        let subkey_start = FW_PREAMBLE_SIZE;
        let body_sig_start = subkey_start + KEY_DATA_SIZE;
        let sig_start = body_sig_start + SIG_SIZE;
        let mut pre = FwPreamble::default();
        pre.set_preamble_size((sig_start + SIG_SIZE) as u32);
        pre.set_header_version_major(FIRMWARE_PREAMBLE_VERSION_MAJOR);
        pre.set_header_version_minor(FIRMWARE_PREAMBLE_VERSION_MINOR);
        pre.set_firmware_version(firmware_version);
        pre.preamble_signature_mut()
            .set_sig_offset((sig_start - FwPreamble::signature_offset()) as u32)
            .set_sig_size(SIG_SIZE as u32)
            .set_data_size(sig_start as u32);
        pre.kernel_subkey_mut()
            .set_key_offset((subkey_start - FwPreamble::kernel_subkey_offset()) as u32)
            .set_key_size(KEY_DATA_SIZE as u32)
            .set_algorithm(ALGORITHM);
        pre.body_signature_mut()
            .set_sig_offset((body_sig_start - FwPreamble::body_signature_offset()) as u32)
            .set_sig_size(SIG_SIZE as u32)
            .set_data_size(64);

        let mut buf = pre.as_bytes().to_vec();
        buf.extend_from_slice(&key_data());
        buf.extend_from_slice(&sign(&[0xaa; 64]));
        let sig = sign(&buf);
        buf.extend_from_slice(&sig);
        buf
    }

    #[test]
    fn test_verify_keyblock() {
        let root = packed_key(1);
        let root_key = unpack_key(&root).unwrap();
        let kb = keyblock();
        let mut verifier = ImageVerifier::new(TestEnv::default());
        let header = verifier.verify_keyblock(&kb, &root_key).unwrap();
        assert_eq!(header.data_key().key_version(), 2);
        assert_eq!(verifier.env.calls, 1);

        let key_start =
            Keyblock::data_key_range().start + header.data_key().key_offset() as usize;
        let key_end = key_start + header.data_key().key_size() as usize;
        assert_eq!(&kb[key_start..key_end], key_data().as_slice());
    }

    #[test]
    fn test_keyblock_magic() {
        let root = packed_key(1);
        let root_key = unpack_key(&root).unwrap();
        let mut kb = keyblock();
        kb[0] = b'X';
        let mut verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_keyblock(&kb, &root_key).err(),
            Some(VbootError::KEYBLOCK_MAGIC)
        );
    }

    #[test]
    fn test_keyblock_tampered() {
        let root = packed_key(1);
        let root_key = unpack_key(&root).unwrap();
        let mut kb = keyblock();
        kb[KEYBLOCK_SIZE + 20] ^= 1;
        let mut verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_keyblock(&kb, &root_key).err(),
            Some(VbootError::KEYBLOCK_SIG_INVALID)
        );
    }

    #[test]
    fn test_keyblock_truncated() {
        let root = packed_key(1);
        let root_key = unpack_key(&root).unwrap();
        let kb = keyblock();
        let mut verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_keyblock(&kb[..40], &root_key).err(),
            Some(VbootError::KEYBLOCK_TOO_SMALL_FOR_HEADER)
        );
        assert_eq!(
            verifier.verify_keyblock(&kb[..kb.len() - 1], &root_key).err(),
            Some(VbootError::KEYBLOCK_SIZE)
        );
    }

    #[test]
    fn test_verify_preamble() {
        let data = packed_key(2);
        let data_key = unpack_key(&data).unwrap();
        let pre = preamble(0x3);
        let mut verifier = ImageVerifier::new(TestEnv::default());
        let header = verifier.verify_fw_preamble(&pre, &data_key).unwrap();
        assert_eq!(header.firmware_version(), 3);
        assert_eq!(header.body_signature().data_size(), 64);

        let body_sig = signature_data(
            &pre,
            FwPreamble::body_signature_offset(),
            &header.body_signature(),
        )
        .unwrap();
        assert_eq!(body_sig, sign(&[0xaa; 64]).as_slice());
    }

    #[test]
    fn test_preamble_tampered() {
        let data = packed_key(2);
        let data_key = unpack_key(&data).unwrap();
        let mut pre = preamble(0x3);
        pre[FW_PREAMBLE_SIZE + 1] ^= 0x80;
        let mut verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_fw_preamble(&pre, &data_key).err(),
            Some(VbootError::PREAMBLE_SIG_INVALID)
        );
    }

    #[test]
    fn test_preamble_header_version() {
        let data = packed_key(2);
        let data_key = unpack_key(&data).unwrap();
        let mut pre = preamble(0x3);
        pre[FwPreamble::signature_offset() + SIGNATURE_SIZE] = 3;
        let mut verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_fw_preamble(&pre, &data_key).err(),
            Some(VbootError::PREAMBLE_HEADER_VERSION)
        );
    }

    #[test]
    fn test_signature_size_mismatch() {
        let data = packed_key(2);
        let data_key = unpack_key(&data).unwrap();
        let mut sig = Signature::default();
        sig.set_sig_size(128);
        let mut verifier = ImageVerifier::new(TestEnv::default());
        assert_eq!(
            verifier.verify_digest(&data_key, &sig, &[0u8; 128], &[0u8; 32]),
            Err(VbootError::VERIFY_DIGEST_SIG_SIZE)
        );
        assert_eq!(verifier.env.calls, 0);
    }

    #[test]
    fn test_member_inside() {
        assert!(verify_member_inside(100, 10, 20, 20, 70).is_ok());
        assert_eq!(
            verify_member_inside(100, 10, 20, 20, 71),
            Err(VbootError::INSIDE_DATA_OUTSIDE)
        );
        assert_eq!(
            verify_member_inside(100, 90, 20, 0, 0),
            Err(VbootError::INSIDE_DATA_OUTSIDE)
        );
        assert_eq!(
            verify_member_inside(100, 0, 20, u32::MAX, u32::MAX),
            Err(VbootError::INSIDE_DATA_OUTSIDE)
        );
    }
}
