/*++

Licensed under the Apache-2.0 license.

File Name:

    pcr.rs

Abstract:

    File contains the digests the host extends into TPM PCRs.

Note:

    BootMode   - SHA-1 of [developer, recovery, keyblock mode]
    HwidDigest - hardware id digest from the GBB header

--*/

use crate::context::{ContextFlags, VbootContext};
use vboot_drivers::{Sha1, VbootError, VbootResult};

/// Selector for `get_pcr_digest`
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PcrDigest {
    BootMode = 0,
    HwidDigest = 1,
}

impl TryFrom<u32> for PcrDigest {
    type Error = VbootError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(Self::BootMode),
            1 => Ok(Self::HwidDigest),
            _ => Err(VbootError::API_PCR_DIGEST),
        }
    }
}

fn boot_mode_digest(ctx: &VbootContext) -> VbootResult<[u8; 20]> {
    let developer = ctx.flags.contains(ContextFlags::DEVELOPER_MODE) as u8;
    let recovery = ctx.flags.contains(ContextFlags::RECOVERY_MODE) as u8;
    // Keyblock mode: recovery boots are verified by the recovery key.
    let keyblock_mode = (recovery == 0) as u8;
    Sha1::digest(&[developer, recovery, keyblock_mode])
}

/// Copy a PCR digest into `dest`
///
/// Bytes of `dest` past the digest are zeroed. Returns the digest size.
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `which` - Digest to copy
/// * `dest` - Destination, at least as large as the digest
pub fn get_pcr_digest(ctx: &VbootContext, which: PcrDigest, dest: &mut [u8]) -> VbootResult<usize> {
    let boot_mode;
    let digest: &[u8] = match which {
        PcrDigest::BootMode => {
            boot_mode = boot_mode_digest(ctx)?;
            &boot_mode
        }
        PcrDigest::HwidDigest => ctx
            .gbb
            .as_ref()
            .map(|gbb| &gbb.hwid_digest()[..])
            .ok_or(VbootError::API_PCR_DIGEST_BUF)?,
    };

    if dest.len() < digest.len() {
        return Err(VbootError::API_PCR_DIGEST_BUF);
    }

    let (head, tail) = dest.split_at_mut(digest.len());
    head.copy_from_slice(digest);
    tail.fill(0);
    Ok(digest.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vboot_drivers::{NV_DATA_SIZE, WORKBUF_MIN_SIZE};
    use vboot_image_types::GbbHeader;

    #[test]
    fn test_selector() {
        assert_eq!(PcrDigest::try_from(0u32), Ok(PcrDigest::BootMode));
        assert_eq!(PcrDigest::try_from(1u32), Ok(PcrDigest::HwidDigest));
        assert_eq!(
            PcrDigest::try_from(2u32),
            Err(VbootError::API_PCR_DIGEST)
        );
    }

    #[test]
    fn test_boot_mode_digest_zero_pads() {
        let mut buf = [0u8; WORKBUF_MIN_SIZE];
        let ctx = VbootContext::new(
            &mut buf,
            &[0u8; NV_DATA_SIZE],
            ContextFlags::DEVELOPER_MODE,
        )
        .unwrap();

        let mut dest = [0xffu8; 32];
        assert_eq!(get_pcr_digest(&ctx, PcrDigest::BootMode, &mut dest), Ok(20));
        assert_eq!(dest[..20], Sha1::digest(&[1, 0, 1]).unwrap());
        assert_eq!(dest[20..], [0u8; 12]);

        let mut small = [0u8; 19];
        assert_eq!(
            get_pcr_digest(&ctx, PcrDigest::BootMode, &mut small),
            Err(VbootError::API_PCR_DIGEST_BUF)
        );
    }

    #[test]
    fn test_recovery_boot_mode_digest() {
        let mut buf = [0u8; WORKBUF_MIN_SIZE];
        let ctx = VbootContext::new(
            &mut buf,
            &[0u8; NV_DATA_SIZE],
            ContextFlags::RECOVERY_MODE,
        )
        .unwrap();

        let mut dest = [0u8; 20];
        get_pcr_digest(&ctx, PcrDigest::BootMode, &mut dest).unwrap();
        assert_eq!(dest, Sha1::digest(&[0, 1, 0]).unwrap());
    }

    #[test]
    fn test_hwid_digest() {
        let mut buf = [0u8; WORKBUF_MIN_SIZE];
        let mut ctx =
            VbootContext::new(&mut buf, &[0u8; NV_DATA_SIZE], ContextFlags::empty()).unwrap();

        let mut dest = [0u8; 64];
        assert_eq!(
            get_pcr_digest(&ctx, PcrDigest::HwidDigest, &mut dest),
            Err(VbootError::API_PCR_DIGEST_BUF)
        );

        let mut gbb = GbbHeader::default();
        gbb.set_hwid_digest([0x5a; 32]);
        ctx.gbb = Some(gbb);
        assert_eq!(get_pcr_digest(&ctx, PcrDigest::HwidDigest, &mut dest), Ok(32));
        assert_eq!(dest[..32], [0x5a; 32]);
        assert_eq!(dest[32..], [0u8; 32]);
    }
}
