/*++

Licensed under the Apache-2.0 license.

File Name:

    phase3.rs

Abstract:

    File contains the implementation of firmware phase 3: loading and
    verifying the keyblock and firmware preamble of the selected slot,
    including the anti-rollback checks.

--*/

use crate::context::{ContextFlags, VbootContext};
use crate::fw_env::{FwEnv, FwHost, Resource};
use crate::misc::{fail, gbb_flags};
use crate::secdata;
use vboot_drivers::{cprintln, FwResult, RecoveryReason, Tlcl, VbootError, VbootResult};
use vboot_image_types::{
    FwPreamble, GbbFlags, Keyblock, PackedKey, KEYBLOCK_SIZE, PACKED_KEY_SIZE,
};
use vboot_image_verify::{unpack_key, ImageVerifier};
use zerocopy::{FromZeros, IntoBytes};

/// Largest key or firmware version; each is half of the composite version
const MAX_VERSION: u32 = 0xffff;

/// Phase 3 Flow
pub struct Phase3Flow {}

impl Phase3Flow {
    /// Execute phase 3
    ///
    /// # Arguments
    ///
    /// * `ctx` - Boot context
    /// * `env` - Firmware Environment
    #[inline(never)]
    pub fn run<H: FwHost, T: Tlcl>(
        ctx: &mut VbootContext,
        env: &mut FwEnv<H, T>,
    ) -> VbootResult<()> {
        cprintln!("[phase3] ++");

        if let Err(e) = Self::load_keyblock(ctx, env) {
            cprintln!("[phase3] Keyblock failed 0x{:x}", u32::from(e));
            fail(ctx, RecoveryReason::RO_INVALID_RW, e.subcode());
            return Err(e);
        }

        if let Err(e) = Self::load_preamble(ctx, env) {
            cprintln!("[phase3] Preamble failed 0x{:x}", u32::from(e));
            fail(ctx, RecoveryReason::RO_INVALID_RW, e.subcode());
            return Err(e);
        }

        cprintln!("[phase3] --");
        Ok(())
    }

    fn rollback_check_disabled(ctx: &VbootContext) -> bool {
        ctx.flags.contains(ContextFlags::DEVELOPER_MODE)
            && gbb_flags(ctx).contains(GbbFlags::DISABLE_FW_ROLLBACK_CHECK)
    }

    /// Verify the keyblock with the GBB root key and keep its data key
    fn load_keyblock<H: FwHost, T: Tlcl>(
        ctx: &mut VbootContext,
        env: &mut FwEnv<H, T>,
    ) -> VbootResult<()> {
        let gbb = ctx.gbb.ok_or(VbootError::GBB_ROOT_KEY_OUTSIDE)?;
        if (gbb.rootkey_size() as usize) < PACKED_KEY_SIZE {
            return Err(VbootError::GBB_ROOT_KEY_OUTSIDE);
        }

        let root_key = ctx.workbuf.alloc(gbb.rootkey_size() as usize)?;
        env.host.read_resource(
            Resource::Gbb,
            gbb.rootkey_offset(),
            ctx.workbuf.get_mut(root_key)?,
        )?;

        let resource = Resource::FwVblock(ctx.sd.fw_slot);
        let mut header = Keyblock::new_zeroed();
        env.host.read_resource(resource, 0, header.as_mut_bytes())?;
        let block_size = (header.keyblock_size() as usize).max(KEYBLOCK_SIZE);

        // Re-read the header with the rest of the block.
        let block = ctx.workbuf.alloc(block_size)?;
        env.host.read_resource(resource, 0, ctx.workbuf.get_mut(block)?)?;

        let kb = {
            let key = unpack_key(ctx.workbuf.get(root_key)?)?;
            ImageVerifier::new(&mut env.host).verify_keyblock(ctx.workbuf.get(block)?, &key)?
        };

        let data_key = kb.data_key();
        let key_version = data_key.key_version();
        if key_version > MAX_VERSION {
            return Err(VbootError::FW_KEYBLOCK_VERSION_RANGE);
        }
        if key_version < ctx.sd.fw_version_secdata >> 16 {
            if Self::rollback_check_disabled(ctx) {
                cprintln!("[phase3] Ignoring key rollback");
            } else {
                cprintln!("[phase3] Key version {} rolled back", key_version);
                return Err(VbootError::FW_KEYBLOCK_VERSION_ROLLBACK);
            }
        }
        ctx.sd.fw_version = key_version << 16;

        // Keep the data key as a packed key with its data right behind the
        // header.
        let key_start = Keyblock::data_key_range().start;
        let stored = ctx
            .workbuf
            .alloc(PACKED_KEY_SIZE + data_key.key_size() as usize)?;
        ctx.workbuf.copy(
            block,
            key_start + data_key.key_offset() as usize,
            stored,
            PACKED_KEY_SIZE,
            data_key.key_size() as usize,
        )?;
        let mut packed: PackedKey = data_key;
        packed.set_key_offset(PACKED_KEY_SIZE as u32);
        ctx.workbuf.get_mut(stored)?[..PACKED_KEY_SIZE].copy_from_slice(packed.as_bytes());

        ctx.sd.data_key = Some(stored);
        ctx.sd.vblock_preamble_offset = kb.keyblock_size();
        Ok(())
    }

    /// Verify the firmware preamble with the data key
    fn load_preamble<H: FwHost, T: Tlcl>(
        ctx: &mut VbootContext,
        env: &mut FwEnv<H, T>,
    ) -> VbootResult<()> {
        let data_key = ctx.sd.data_key.ok_or(VbootError::FW_PREAMBLE_DATA_KEY)?;
        let resource = Resource::FwVblock(ctx.sd.fw_slot);
        let offset = ctx.sd.vblock_preamble_offset;

        let mut header = FwPreamble::new_zeroed();
        env.host.read_resource(resource, offset, header.as_mut_bytes())?;

        let region = ctx.workbuf.alloc(header.preamble_size() as usize)?;
        env.host.read_resource(resource, offset, ctx.workbuf.get_mut(region)?)?;

        let pre = {
            let key = unpack_key(ctx.workbuf.get(data_key)?)?;
            ImageVerifier::new(&mut env.host).verify_fw_preamble(ctx.workbuf.get(region)?, &key)?
        };

        let firmware_version = pre.firmware_version();
        if firmware_version > MAX_VERSION {
            return Err(VbootError::FW_PREAMBLE_VERSION_RANGE);
        }
        ctx.sd.fw_version |= firmware_version;

        if ctx.sd.fw_version < ctx.sd.fw_version_secdata {
            if Self::rollback_check_disabled(ctx) {
                cprintln!("[phase3] Ignoring firmware rollback");
            } else {
                cprintln!("[phase3] Version 0x{:x} rolled back", ctx.sd.fw_version);
                return Err(VbootError::FW_PREAMBLE_VERSION_ROLLBACK);
            }
        }

        // Roll forward only on the word of a successful boot of this slot.
        if ctx.sd.fw_version > ctx.sd.fw_version_secdata
            && ctx.sd.last_fw_slot == ctx.sd.fw_slot
            && ctx.sd.last_fw_result == FwResult::Success
        {
            cprintln!("[phase3] Rolling forward to 0x{:x}", ctx.sd.fw_version);
            let version = ctx.sd.fw_version;
            secdata::set_fw_versions(ctx, version)?;
            ctx.sd.fw_version_secdata = version;
        }

        ctx.sd.preamble = Some(region);
        Ok(())
    }
}
