/*++

Licensed under the Apache-2.0 license.

File Name:

    phase2.rs

Abstract:

    File contains the implementation of firmware phase 2: resume handling,
    TPM owner clear requests and firmware slot selection.

--*/

use crate::context::{ContextFlags, VbootContext};
use crate::fw_env::{FwEnv, FwHost};
use crate::misc::{check_tpm_clear, fail, select_fw_slot};
use vboot_drivers::{cprintln, FwSlot, NvField, RecoveryReason, Tlcl, VbootResult};

/// Phase 2 Flow
pub struct Phase2Flow {}

impl Phase2Flow {
    /// Execute phase 2
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
        cprintln!("[phase2] ++");

        // A resume keeps the slot of the interrupted boot. The slot is not
        // marked chosen, so a failure does not consume a try.
        if ctx.flags.contains(ContextFlags::S3_RESUME) {
            ctx.sd.fw_slot = FwSlot::from(ctx.nv_get(NvField::FwTried));
            ctx.flags
                .set(ContextFlags::FW_SLOT_B, ctx.sd.fw_slot == FwSlot::B);
            cprintln!("[phase2] -- resume slot {}", u32::from(ctx.sd.fw_slot));
            return Ok(());
        }

        if ctx.flags.contains(ContextFlags::DEVELOPER_MODE) {
            ctx.flags |= ContextFlags::CLEAR_RAM;
        }

        check_tpm_clear(ctx, env)?;

        if let Err(e) = select_fw_slot(ctx) {
            cprintln!("[phase2] Slot selection failed 0x{:x}", u32::from(e));
            fail(ctx, RecoveryReason::FW_SLOT, e.subcode());
            return Err(e);
        }

        cprintln!("[phase2] --");
        Ok(())
    }
}
