/*++

Licensed under the Apache-2.0 license.

File Name:

    secdata.rs

Abstract:

    File contains the cached view of firmware and kernel secure data.
    Reads happen once in phase 1; updates are held in the context and
    written back by commit.

--*/

use crate::context::{ContextFlags, VbootContext};
use crate::fw_env::{FwEnv, FwHost};
use crate::shared_data::SdStatus;
use vboot_drivers::{cprintln, FirmwareFlags, Tlcl, VbootError, VbootResult};

/// Read firmware secure data into the context
pub(crate) fn firmware_init<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    let rsf = env.rollback.firmware_read()?;
    ctx.sd.fw_version_secdata = rsf.fw_versions();
    ctx.secdata_firmware = Some(rsf);
    ctx.sd.status |= SdStatus::SECDATA_FIRMWARE_INIT;
    cprintln!("[secdata] Firmware versions 0x{:x}", ctx.sd.fw_version_secdata);
    Ok(())
}

/// Read kernel secure data into the context
pub(crate) fn kernel_init<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    ctx.sd.kernel_version_secdata = env.rollback.kernel_version_read()?;
    ctx.sd.status |= SdStatus::SECDATA_KERNEL_INIT;
    Ok(())
}

/// Firmware secure data flags; empty when secure data is unavailable
pub(crate) fn firmware_flags(ctx: &VbootContext) -> FirmwareFlags {
    ctx.secdata_firmware
        .as_ref()
        .map(|rsf| rsf.firmware_flags())
        .unwrap_or_else(FirmwareFlags::empty)
}

pub(crate) fn set_firmware_flags(ctx: &mut VbootContext, flags: FirmwareFlags) -> VbootResult<()> {
    let rsf = ctx
        .secdata_firmware
        .as_mut()
        .ok_or(VbootError::SECDATA_FIRMWARE_UNINITIALIZED)?;
    if rsf.firmware_flags() != flags {
        rsf.set_firmware_flags(flags);
        ctx.flags |= ContextFlags::SECDATA_FIRMWARE_CHANGED;
    }
    Ok(())
}

pub(crate) fn set_fw_versions(ctx: &mut VbootContext, version: u32) -> VbootResult<()> {
    let rsf = ctx
        .secdata_firmware
        .as_mut()
        .ok_or(VbootError::SECDATA_FIRMWARE_UNINITIALIZED)?;
    if rsf.fw_versions() != version {
        rsf.set_fw_versions(version);
        ctx.flags |= ContextFlags::SECDATA_FIRMWARE_CHANGED;
    }
    Ok(())
}

/// Write back dirty firmware secure data
pub(crate) fn firmware_commit<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    if !ctx.flags.contains(ContextFlags::SECDATA_FIRMWARE_CHANGED) {
        return Ok(());
    }
    let rsf = ctx
        .secdata_firmware
        .as_mut()
        .ok_or(VbootError::SECDATA_FIRMWARE_UNINITIALIZED)?;
    env.rollback.write_space_firmware(rsf)?;
    ctx.flags.remove(ContextFlags::SECDATA_FIRMWARE_CHANGED);
    Ok(())
}
