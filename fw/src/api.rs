/*++

Licensed under the Apache-2.0 license.

File Name:

    api.rs

Abstract:

    File contains the entry points the host calls to drive a firmware boot.

--*/

use crate::context::{BootMode, BootState, ContextFlags, VbootContext};
use crate::flow::run_phase;
use crate::fw_env::{FwEnv, FwHost};
use crate::misc;
use crate::secdata;
use vboot_drivers::{
    cprintln, FwResult, FwSlot, NvField, RecoveryReason, Tlcl, VbootResult,
};

/// Summary of the boot decisions for the host's logs
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FwBootInfo {
    pub tries: u32,
    pub slot: FwSlot,
    pub prev_slot: FwSlot,
    pub prev_result: FwResult,
    pub boot_mode: BootMode,
    pub recovery_reason: RecoveryReason,
    pub recovery_subcode: u8,
}

/// Firmware phase 1
///
/// Initializes secure data and the GBB, evaluates the developer switch and
/// decides whether this is a recovery boot.
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
pub fn fw_phase1<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    ctx.expect_state(BootState::Phase1)?;
    run_phase(ctx, env)
}

/// Firmware phase 2: select the slot to boot
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
pub fn fw_phase2<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    ctx.expect_state(BootState::Phase2)?;
    run_phase(ctx, env)
}

/// Firmware phase 3: verify the keyblock and preamble of the selected slot
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
pub fn fw_phase3<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    ctx.expect_state(BootState::Phase3)?;
    run_phase(ctx, env)
}

/// Report a boot failure detected by the host
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `reason` - Recovery reason
/// * `subcode` - Recovery subcode
pub fn fail(ctx: &mut VbootContext, reason: RecoveryReason, subcode: u8) {
    misc::fail(ctx, reason, subcode);
    ctx.state = BootState::Recovery(reason);
}

/// Persist dirty firmware secure data and NV data
///
/// The NV data is handed to the host even if the secure data write fails,
/// so the recovery request recorded for that failure survives the reboot.
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
pub fn commit_data<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    let secdata_result = secdata::firmware_commit(ctx, env);
    if let Err(e) = secdata_result {
        cprintln!("[commit] Secure data write failed 0x{:x}", u32::from(e));
        if !ctx.flags.contains(ContextFlags::RECOVERY_MODE) {
            misc::fail(ctx, RecoveryReason::SECDATA_WRITE, e.subcode());
        }
    }

    if ctx.nv.is_changed() {
        env.host.commit_nvdata(ctx.nv.raw())?;
        ctx.nv.clear_changed();
        ctx.sync_nv_flag();
    }

    secdata_result
}

/// Boot decisions made so far
pub fn get_fw_boot_info(ctx: &VbootContext) -> FwBootInfo {
    let recovery = ctx.flags.contains(ContextFlags::RECOVERY_MODE);
    FwBootInfo {
        tries: ctx.nv_get(NvField::TryCount),
        slot: FwSlot::from(ctx.nv_get(NvField::FwTried)),
        prev_slot: FwSlot::from(ctx.nv_get(NvField::FwPrevTried)),
        prev_result: FwResult::from(ctx.nv_get(NvField::FwPrevResult)),
        boot_mode: ctx.boot_mode,
        recovery_reason: if recovery {
            ctx.sd.recovery_reason
        } else {
            RecoveryReason::NOT_REQUESTED
        },
        recovery_subcode: if recovery {
            ctx.nv_get(NvField::RecoverySubcode) as u8
        } else {
            0
        },
    }
}

/// Returns true if the hash engine may be used this boot
pub fn hwcrypto_allowed(ctx: &VbootContext) -> bool {
    !ctx.flags.contains(ContextFlags::RECOVERY_MODE)
        && ctx.flags.contains(ContextFlags::HWCRYPTO_ALLOWED)
}

/// Drop the persisted recovery request once recovery has been entered
pub fn clear_recovery(ctx: &mut VbootContext) {
    ctx.nv_set(NvField::RecoveryRequest, RecoveryReason::NOT_REQUESTED.into());
    ctx.nv_set(NvField::RecoverySubcode, 0);
}

/// Lock kernel secure data for the rest of this boot
///
/// Recovery boots leave it writable.
pub fn lock_kernel_secdata<H: FwHost, T: Tlcl>(
    ctx: &VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    env.rollback
        .kernel_lock(ctx.flags.contains(ContextFlags::RECOVERY_MODE))
}
