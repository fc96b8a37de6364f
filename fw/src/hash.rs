/*++

Licensed under the Apache-2.0 license.

File Name:

    hash.rs

Abstract:

    File contains the firmware body hashing API. The host streams the body
    of the selected slot through the digest and the result is checked
    against the body signature of the verified preamble.

--*/

use crate::api::hwcrypto_allowed;
use crate::context::{BootState, VbootContext};
use crate::fw_env::{FwEnv, FwHost};
use crate::misc::fail;
use crate::shared_data::HashTag;
use vboot_drivers::printer::HexBytes;
use vboot_drivers::{
    cprintln, DigestContext, HashAlgorithm, HwCrypto, RecoveryReason, Tlcl, VbootError,
    VbootResult, MAX_DIGEST_SIZE,
};
use vboot_image_types::{EmbeddedHash, FwPreamble, EMBEDDED_HASH_DIGEST_OFFSET};
use vboot_image_verify::{signature_data, unpack_key, ImageVerifier};
use zerocopy::FromBytes;
use zeroize::Zeroize;

/// Hash embedded in the preamble in place of a body signature
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MetadataHash<'a> {
    pub algorithm: HashAlgorithm,
    pub digest: &'a [u8],
}

fn check_not_terminal(ctx: &VbootContext) -> VbootResult<()> {
    if ctx.state.is_terminal() {
        return Err(VbootError::API_PHASE_ORDER);
    }
    Ok(())
}

fn preamble_bytes<'b>(ctx: &'b VbootContext) -> Option<&'b [u8]> {
    ctx.sd.preamble.and_then(|region| ctx.workbuf.get(region).ok())
}

fn preamble_header(bytes: &[u8]) -> Option<FwPreamble> {
    FwPreamble::read_from_prefix(bytes).ok().map(|(pre, _)| pre)
}

/// Start hashing the firmware body
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
/// * `tag` - What is being hashed; only `HashTag::FwBody` is supported
pub fn init_hash<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
    tag: HashTag,
) -> VbootResult<()> {
    check_not_terminal(ctx)?;
    if tag != HashTag::FwBody {
        return Err(VbootError::API_INIT_HASH_TAG);
    }

    let pre = preamble_bytes(ctx)
        .and_then(preamble_header)
        .ok_or(VbootError::API_INIT_HASH_PREAMBLE)?;

    let data_key = ctx.sd.data_key.ok_or(VbootError::API_INIT_HASH_DATA_KEY)?;
    let data_size = pre.body_signature().data_size();
    if data_size == 0 {
        cprintln!("[hash] Preamble carries a metadata hash");
        return Err(VbootError::API_INIT_HASH_DATA_KEY);
    }
    let hash_alg = unpack_key(ctx.workbuf.get(data_key)?)?.hash_alg;

    let hw: Option<&mut dyn HwCrypto> = if hwcrypto_allowed(ctx) {
        Some(&mut env.host as &mut dyn HwCrypto)
    } else {
        None
    };
    let digest = DigestContext::init(hash_alg, data_size, hw)?;

    ctx.sd.hash = Some(digest);
    ctx.sd.hash_tag = tag;
    ctx.sd.hash_remaining_size = data_size;
    cprintln!("[hash] Expecting {} bytes", data_size);
    Ok(())
}

/// Extend the body digest
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
/// * `buf` - Next chunk of the body
pub fn extend_hash<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
    buf: &[u8],
) -> VbootResult<()> {
    check_not_terminal(ctx)?;
    let remaining = ctx.sd.hash_remaining_size;
    let digest = ctx
        .sd
        .hash
        .as_mut()
        .ok_or(VbootError::API_EXTEND_HASH_WORKBUF)?;

    if buf.is_empty() || buf.len() as u64 > remaining as u64 {
        return Err(VbootError::API_EXTEND_HASH_SIZE);
    }

    digest.extend(buf, &mut env.host)?;
    ctx.sd.hash_remaining_size = remaining - buf.len() as u32;
    Ok(())
}

fn verify_body<H: FwHost, T: Tlcl>(
    ctx: &VbootContext,
    env: &mut FwEnv<H, T>,
    digest: &[u8],
) -> VbootResult<()> {
    let data_key = ctx.sd.data_key.ok_or(VbootError::API_CHECK_HASH_DATA_KEY)?;
    let key = unpack_key(ctx.workbuf.get(data_key)?)?;

    let bytes = preamble_bytes(ctx).ok_or(VbootError::API_CHECK_HASH_PREAMBLE)?;
    let pre = preamble_header(bytes).ok_or(VbootError::API_CHECK_HASH_PREAMBLE)?;
    let sig = pre.body_signature();
    let sig_data = signature_data(bytes, FwPreamble::body_signature_offset(), &sig)?;

    ImageVerifier::new(&mut env.host).verify_digest(&key, &sig, sig_data, digest)
}

/// Finish the body digest and verify it against the body signature
///
/// Returns the digest size. A digest that does not verify sends the boot
/// to recovery.
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
/// * `digest_out` - Optional destination for the digest
pub fn check_hash_get_digest<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
    digest_out: Option<&mut [u8]>,
) -> VbootResult<usize> {
    check_not_terminal(ctx)?;
    if ctx.sd.preamble.is_none() {
        return Err(VbootError::API_CHECK_HASH_PREAMBLE);
    }
    let algorithm = ctx
        .sd
        .hash
        .as_ref()
        .map(|digest| digest.algorithm())
        .ok_or(VbootError::API_CHECK_HASH_WORKBUF)?;
    if ctx.sd.hash_remaining_size != 0 {
        cprintln!("[hash] {} bytes not hashed", ctx.sd.hash_remaining_size);
        return Err(VbootError::API_CHECK_HASH_SIZE);
    }
    if ctx.sd.hash_tag != HashTag::FwBody {
        return Err(VbootError::API_CHECK_HASH_TAG);
    }
    if let Some(out) = digest_out.as_ref() {
        if out.len() < algorithm.digest_size() {
            return Err(VbootError::API_CHECK_DIGEST_SIZE);
        }
    }

    let mut digest = [0u8; MAX_DIGEST_SIZE];
    let result = ctx
        .sd
        .hash
        .take()
        .ok_or(VbootError::API_CHECK_HASH_WORKBUF)
        .and_then(|dc| dc.finalize(&mut digest, &mut env.host))
        .and_then(|size| verify_body(ctx, env, &digest[..size]).map(|()| size));

    let size = match result {
        Ok(size) => size,
        Err(e) => {
            digest.zeroize();
            cprintln!("[hash] Body verification failed 0x{:x}", u32::from(e));
            fail(ctx, RecoveryReason::FW_BODY, e.subcode());
            ctx.state = BootState::Recovery(RecoveryReason::FW_BODY);
            return Err(e);
        }
    };

    cprintln!("[hash] Body verified, digest {}", HexBytes(&digest[..size]));
    if let Some(out) = digest_out {
        out[..size].copy_from_slice(&digest[..size]);
    }
    digest.zeroize();
    ctx.state = BootState::Success;
    Ok(size)
}

/// Verify the body digest without returning it
pub fn check_hash<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    check_hash_get_digest(ctx, env, None).map(|_| ())
}

/// Hash embedded in the preamble of a slot whose body is not signed
pub fn get_metadata_hash<'b>(ctx: &'b VbootContext) -> VbootResult<MetadataHash<'b>> {
    let bytes = preamble_bytes(ctx).ok_or(VbootError::API_CHECK_HASH_PREAMBLE)?;
    let pre = preamble_header(bytes).ok_or(VbootError::API_CHECK_HASH_PREAMBLE)?;
    let sig = pre.body_signature();
    if sig.data_size() != 0 {
        return Err(VbootError::API_INIT_HASH_DATA_KEY);
    }

    let data = signature_data(bytes, FwPreamble::body_signature_offset(), &sig)?;
    let algorithm = EmbeddedHash::read_from_prefix(data)
        .ok()
        .and_then(|(header, _)| HashAlgorithm::try_from(header.algo).ok())
        .ok_or(VbootError::API_CHECK_HASH_SIG_SIZE)?;

    let size = algorithm.digest_size();
    let digest = data
        .get(EMBEDDED_HASH_DIGEST_OFFSET..EMBEDDED_HASH_DIGEST_OFFSET + size)
        .filter(|_| size != 0)
        .ok_or(VbootError::API_CHECK_HASH_SIG_SIZE)?;

    Ok(MetadataHash { algorithm, digest })
}
