/*++

Licensed under the Apache-2.0 license.

File Name:

    phase1.rs

Abstract:

    File contains the implementation of firmware phase 1: secure data and
    GBB initialization, developer switch and recovery decisions.

--*/

use crate::api::commit_data;
use crate::context::{ContextFlags, VbootContext};
use crate::fw_env::{FwEnv, FwHost};
use crate::misc::{check_dev_switch, check_recovery, fail, init_gbb, set_boot_mode};
use crate::secdata;
use crate::shared_data::SdFlags;
use vboot_drivers::{cprintln, NvField, RecoveryReason, Tlcl, VbootError, VbootResult};

/// Phase 1 Flow
pub struct Phase1Flow {}

impl Phase1Flow {
    /// Execute phase 1
    ///
    /// Returns `API_PHASE1_SECDATA_REBOOT` when the host must reboot and
    /// `API_PHASE1_RECOVERY` when the boot must continue in recovery mode.
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
        cprintln!("[phase1] ++");

        if ctx.flags.contains(ContextFlags::SECDATA_WANTS_REBOOT) {
            if ctx.nv_get(NvField::TpmRequestedReboot) != 0 {
                cprintln!("[phase1] Secure data asked for a reboot twice");
                fail(ctx, RecoveryReason::RO_TPM_REBOOT, 0);
            } else {
                ctx.nv_set(NvField::TpmRequestedReboot, 1);
                if let Err(e) = commit_data(ctx, env) {
                    cprintln!("[phase1] Commit failed 0x{:x}", u32::from(e));
                }
                cprintln!("[phase1] -- reboot");
                return Err(VbootError::API_PHASE1_SECDATA_REBOOT);
            }
        } else {
            ctx.nv_set(NvField::TpmRequestedReboot, 0);
        }

        if let Err(e) = secdata::firmware_init(ctx, env) {
            cprintln!("[phase1] Firmware secdata init failed 0x{:x}", u32::from(e));
            fail(ctx, RecoveryReason::SECDATA_FIRMWARE_INIT, e.subcode());
        }

        if let Err(e) = secdata::kernel_init(ctx, env) {
            cprintln!("[phase1] Kernel secdata init failed 0x{:x}", u32::from(e));
            fail(ctx, RecoveryReason::SECDATA_KERNEL_INIT, e.subcode());
        }

        if let Err(e) = init_gbb(ctx, env) {
            cprintln!("[phase1] GBB init failed 0x{:x}", u32::from(e));
            fail(ctx, RecoveryReason::GBB_HEADER, e.subcode());
        }

        check_recovery(ctx);

        if let Err(e) = check_dev_switch(ctx, env) {
            if !ctx.flags.contains(ContextFlags::RECOVERY_MODE) {
                cprintln!("[phase1] Dev switch failed 0x{:x}", u32::from(e));
                fail(ctx, RecoveryReason::DEV_SWITCH, e.subcode());
                check_recovery(ctx);
            }
        }

        set_boot_mode(ctx);

        if ctx.nv_get(NvField::DisplayRequest) != 0
            || ctx.nv_get(NvField::DiagRequest) != 0
            || ctx.sd.flags.contains(SdFlags::DEV_MODE_ENABLED)
            || ctx.flags.contains(ContextFlags::RECOVERY_MODE)
        {
            ctx.flags |= ContextFlags::DISPLAY_INIT;
        }
        if ctx.flags.contains(ContextFlags::DISPLAY_INIT) {
            ctx.sd.flags |= SdFlags::DISPLAY_AVAILABLE;
        }

        if ctx.flags.contains(ContextFlags::RECOVERY_MODE) {
            ctx.flags |= ContextFlags::CLEAR_RAM;
            if let Err(e) = commit_data(ctx, env) {
                cprintln!("[phase1] Commit failed 0x{:x}", u32::from(e));
            }
            cprintln!("[phase1] -- recovery");
            return Err(VbootError::API_PHASE1_RECOVERY);
        }

        cprintln!("[phase1] --");
        Ok(())
    }
}
