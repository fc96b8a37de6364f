/*++

Licensed under the Apache-2.0 license.

File Name:

    misc.rs

Abstract:

    File contains the boot decisions shared by the firmware phases: failure
    bookkeeping, recovery and developer mode evaluation, TPM owner clear
    requests and firmware slot selection.

--*/

use crate::context::{BootMode, ContextFlags, VbootContext};
use crate::fw_env::{FwEnv, FwHost, Resource};
use crate::secdata;
use crate::shared_data::{SdFlags, SdStatus};
use vboot_drivers::{
    cprintln, FirmwareFlags, FwResult, FwSlot, NvField, RecoveryReason, Tlcl, VbootError,
    VbootResult,
};
use vboot_image_types::{GbbFlags, GbbHeader, GBB_HEADER_SIZE, GBB_MAJOR_VER, GBB_SIGNATURE};
use zerocopy::IntoBytes;

/// Record a boot failure
///
/// With a slot chosen the failure is charged to that slot and the next boot
/// tries the other one; recovery is only requested when the other slot
/// failed on the previous boot too. Without a slot, recovery is requested
/// unless a request is already pending.
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `reason` - Recovery reason
/// * `subcode` - Recovery subcode, usually the low byte of the error
pub(crate) fn fail(ctx: &mut VbootContext, reason: RecoveryReason, subcode: u8) {
    cprintln!(
        "[fail] Reason 0x{:x} subcode 0x{:x}",
        u32::from(reason),
        subcode as u32
    );
    ctx.sd.fail_reason = reason;

    if ctx.sd.status.contains(SdStatus::CHOSE_SLOT) {
        let slot = ctx.sd.fw_slot;
        ctx.nv_set(NvField::FwResult, FwResult::Failure.into());
        ctx.nv_set(NvField::TryCount, 0);

        if !ctx.flags.contains(ContextFlags::SLOT_A_ONLY) {
            ctx.nv_set(NvField::TryNext, slot.other().into());

            if ctx.sd.last_fw_slot != slot.other() || ctx.sd.last_fw_result != FwResult::Failure
            {
                return;
            }
        }
    }

    if ctx.nv_get(NvField::RecoveryRequest) == 0 {
        cprintln!("[fail] Requesting recovery");
        ctx.nv_set(NvField::RecoveryRequest, reason.into());
        ctx.nv_set(NvField::RecoverySubcode, subcode as u32);
    }
}

/// Decide whether this boot is a recovery boot
pub(crate) fn check_recovery(ctx: &mut VbootContext) {
    let request = RecoveryReason(ctx.nv_get(NvField::RecoveryRequest) as u8);

    if !ctx.sd.recovery_reason.is_requested() {
        ctx.sd.recovery_reason = request;
    }

    if ctx.flags.contains(ContextFlags::FORCE_RECOVERY_MODE) {
        cprintln!("[recovery] Requested manually");
        ctx.sd.recovery_reason = RecoveryReason::RO_MANUAL;
    }

    if ctx.sd.recovery_reason.is_requested() {
        ctx.flags |= ContextFlags::RECOVERY_MODE;
        cprintln!(
            "[recovery] Reason 0x{:x} subcode 0x{:x}",
            u32::from(ctx.sd.recovery_reason),
            ctx.nv_get(NvField::RecoverySubcode)
        );
    }
    ctx.sd.status |= SdStatus::RECOVERY_DECIDED;
}

/// Load and validate the GBB header
pub(crate) fn init_gbb<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    let mut gbb = GbbHeader::default();
    env.host.read_resource(Resource::Gbb, 0, gbb.as_mut_bytes())?;

    if gbb.signature() != &GBB_SIGNATURE {
        return Err(VbootError::GBB_MAGIC);
    }
    if gbb.major_version() != GBB_MAJOR_VER {
        return Err(VbootError::GBB_VERSION);
    }
    if gbb.minor_version() < 1 {
        return Err(VbootError::GBB_TOO_OLD);
    }
    if (gbb.header_size() as usize) < GBB_HEADER_SIZE {
        return Err(VbootError::GBB_HEADER_SIZE);
    }

    if gbb.gbb_flags().contains(GbbFlags::FORCE_MANUAL_RECOVERY) {
        ctx.flags |= ContextFlags::FORCE_RECOVERY_MODE;
    }
    ctx.gbb = Some(gbb);
    ctx.sd.status |= SdStatus::GBB_INIT;
    Ok(())
}

/// GBB flags; empty if the header was not loaded
pub(crate) fn gbb_flags(ctx: &VbootContext) -> GbbFlags {
    ctx.gbb
        .as_ref()
        .map(|gbb| gbb.gbb_flags())
        .unwrap_or_else(GbbFlags::empty)
}

/// Evaluate the developer switch
///
/// A change of developer state clears the TPM owner before the new state is
/// recorded in secure data.
pub(crate) fn check_dev_switch<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    let valid_secdata = ctx.sd.status.contains(SdStatus::SECDATA_FIRMWARE_INIT);
    if !valid_secdata && !ctx.flags.contains(ContextFlags::RECOVERY_MODE) {
        return Err(VbootError::SECDATA_FIRMWARE_UNINITIALIZED);
    }

    let old_flags = secdata::firmware_flags(ctx);
    let mut flags = old_flags;

    if valid_secdata && ctx.nv_get(NvField::DisableDevRequest) != 0 {
        flags.remove(FirmwareFlags::VIRTUAL_DEV_MODE_ON);
        ctx.nv_set(NvField::DisableDevRequest, 0);
    }

    let is_dev = flags.contains(FirmwareFlags::VIRTUAL_DEV_MODE_ON)
        || gbb_flags(ctx).contains(GbbFlags::FORCE_DEV_SWITCH_ON);

    if is_dev {
        ctx.sd.flags |= SdFlags::DEV_MODE_ENABLED;
        ctx.flags |= ContextFlags::DEVELOPER_MODE;
        flags.insert(FirmwareFlags::LAST_BOOT_DEVELOPER);
    } else {
        flags.remove(FirmwareFlags::LAST_BOOT_DEVELOPER);
    }

    if flags != old_flags {
        cprintln!("[dev] Developer state changed, clearing TPM owner");
        if let Err(e) = env.rollback.clear_and_reenable() {
            if valid_secdata {
                fail(ctx, RecoveryReason::TPM_CLEAR_OWNER, e.subcode());
                return Err(e);
            }
        }
        if valid_secdata {
            secdata::set_firmware_flags(ctx, flags)?;
        }
    }
    Ok(())
}

/// Honour a pending TPM owner clear request
pub(crate) fn check_tpm_clear<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    if ctx.nv_get(NvField::ClearTpmOwnerRequest) == 0 {
        return Ok(());
    }

    // One shot, even if the clear fails.
    ctx.nv_set(NvField::ClearTpmOwnerRequest, 0);

    if let Err(e) = env.rollback.clear_and_reenable() {
        cprintln!("[tpm] Owner clear failed 0x{:x}", u32::from(e));
        fail(ctx, RecoveryReason::TPM_CLEAR_OWNER, e.subcode());
        return Err(e);
    }

    ctx.nv_set(NvField::ClearTpmOwnerDone, 1);
    Ok(())
}

/// Pick the firmware slot to boot
pub(crate) fn select_fw_slot(ctx: &mut VbootContext) -> VbootResult<()> {
    ctx.sd.last_fw_slot = FwSlot::from(ctx.nv_get(NvField::FwTried));
    ctx.sd.last_fw_result = FwResult::from(ctx.nv_get(NvField::FwResult));

    ctx.nv_set(NvField::FwPrevTried, ctx.sd.last_fw_slot.into());
    ctx.nv_set(NvField::FwPrevResult, ctx.sd.last_fw_result.into());
    ctx.nv_set(NvField::FwResult, FwResult::Unknown.into());

    ctx.sd.fw_slot = FwSlot::from(ctx.nv_get(NvField::TryNext));

    if ctx.sd.last_fw_result == FwResult::Trying
        && ctx.sd.last_fw_slot == ctx.sd.fw_slot
        && ctx.nv_get(NvField::TryCount) == 0
    {
        // Tries ran out on the previous boot without a verdict.
        if ctx.flags.contains(ContextFlags::SLOT_A_ONLY) {
            cprintln!("[slot] Previous boot failed, no other slot");
            return Err(VbootError::API_NEXT_SLOT_UNAVAILABLE);
        }
        cprintln!("[slot] Previous boot failed, trying other slot");
        ctx.sd.fw_slot = ctx.sd.fw_slot.other();
        ctx.nv_set(NvField::TryNext, ctx.sd.fw_slot.into());
    }

    ctx.flags
        .set(ContextFlags::FW_SLOT_B, ctx.sd.fw_slot == FwSlot::B);
    ctx.sd.status |= SdStatus::CHOSE_SLOT;

    let tries = ctx.nv_get(NvField::TryCount);
    if tries > 0 {
        ctx.nv_set(NvField::FwResult, FwResult::Trying.into());
        if !ctx.flags.contains(ContextFlags::NOFAIL_BOOT) {
            ctx.nv_set(NvField::TryCount, tries - 1);
        }
    }

    ctx.nv_set(NvField::FwTried, ctx.sd.fw_slot.into());
    cprintln!(
        "[slot] Booting slot {} (tries left {})",
        u32::from(ctx.sd.fw_slot),
        ctx.nv_get(NvField::TryCount)
    );
    Ok(())
}

/// Classify the boot once recovery and developer mode are known
pub(crate) fn set_boot_mode(ctx: &mut VbootContext) {
    ctx.boot_mode = if ctx.flags.contains(ContextFlags::RECOVERY_MODE) {
        if ctx.flags.contains(ContextFlags::FORCE_RECOVERY_MODE) {
            ctx.sd.flags |= SdFlags::MANUAL_RECOVERY_ALLOWED;
            BootMode::ManualRecovery
        } else {
            BootMode::BrokenScreen
        }
    } else if ctx.nv_get(NvField::DiagRequest) != 0 {
        BootMode::Diagnostics
    } else if ctx.flags.contains(ContextFlags::DEVELOPER_MODE) {
        BootMode::Developer
    } else {
        BootMode::Normal
    };
}
