/*++

Licensed under the Apache-2.0 license.

File Name:

    context.rs

Abstract:

    File contains the boot context handed to every firmware entry point:
    caller visible flags, the boot mode, the NV register set, the work
    buffer and the shared data that carries state between phases.

--*/

use crate::shared_data::{SdStatus, SharedData};
use bitflags::bitflags;
use vboot_drivers::{
    NvField, NvStorage, RecoveryReason, RollbackSpaceFirmware, VbootError, VbootResult, WorkBuf,
    NV_DATA_SIZE,
};
use vboot_image_types::GbbHeader;

bitflags! {
    /// Flags shared between the boot core and its caller
    ///
    /// The caller sets the input flags before phase 1; the boot core reports
    /// its decisions through the remaining ones.
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ContextFlags : u32 {
        /// Boot is in recovery mode
        const RECOVERY_MODE = 0x0000_0001;
        /// NV register set must be persisted
        const NVDATA_CHANGED = 0x0000_0002;
        /// Firmware secure data must be written back
        const SECDATA_FIRMWARE_CHANGED = 0x0000_0004;
        /// Caller input: recovery button held
        const FORCE_RECOVERY_MODE = 0x0000_0008;
        /// Boot is in developer mode
        const DEVELOPER_MODE = 0x0000_0010;
        /// Slot B was selected
        const FW_SLOT_B = 0x0000_0020;
        /// Caller input: resuming from S3
        const S3_RESUME = 0x0000_0040;
        /// Caller input: do not consume a try this boot
        const NOFAIL_BOOT = 0x0000_0080;
        /// Caller input: secure data asked for a reboot
        const SECDATA_WANTS_REBOOT = 0x0000_0100;
        /// Memory must be cleared before leaving firmware
        const CLEAR_RAM = 0x0000_0200;
        /// Display must be initialized
        const DISPLAY_INIT = 0x0000_0400;
        /// Caller input: only slot A exists
        const SLOT_A_ONLY = 0x0000_0800;
        /// Caller input: the hash engine may be used
        const HWCRYPTO_ALLOWED = 0x0000_1000;
    }
}

/// Boot mode decided by phase 1
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum BootMode {
    #[default]
    Undefined,
    ManualRecovery,
    BrokenScreen,
    Diagnostics,
    Developer,
    Normal,
}

/// Position of the context in the firmware flow
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum BootState {
    #[default]
    Phase1,
    Phase2,
    Phase3,
    /// Preamble loaded; firmware body may be hashed
    HashCheck,
    /// Firmware body verified
    Success,
    /// Host must reboot before continuing
    Reboot,
    /// Boot attempt failed with the given reason
    Recovery(RecoveryReason),
}

impl BootState {
    /// Returns true once no further phase may run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reboot | Self::Recovery(_))
    }
}

/// Verified boot context
pub struct VbootContext<'a> {
    pub(crate) flags: ContextFlags,
    pub(crate) boot_mode: BootMode,
    pub(crate) state: BootState,
    pub(crate) nv: NvStorage,
    pub(crate) workbuf: WorkBuf<'a>,
    pub(crate) sd: SharedData,
    pub(crate) secdata_firmware: Option<RollbackSpaceFirmware>,
    pub(crate) gbb: Option<GbbHeader>,
}

impl<'a> VbootContext<'a> {
    /// Create a context for one boot
    ///
    /// # Arguments
    ///
    /// * `workbuf` - Memory for the work buffer
    /// * `nvdata` - NV register set as persisted by the host
    /// * `flags` - Caller input flags
    pub fn new(
        workbuf: &'a mut [u8],
        nvdata: &[u8; NV_DATA_SIZE],
        flags: ContextFlags,
    ) -> VbootResult<Self> {
        let mut ctx = Self {
            flags,
            boot_mode: BootMode::Undefined,
            state: BootState::Phase1,
            nv: NvStorage::new(nvdata),
            workbuf: WorkBuf::new(workbuf)?,
            sd: SharedData::default(),
            secdata_firmware: None,
            gbb: None,
        };
        ctx.sd.status |= SdStatus::NV_INIT;
        ctx.sync_nv_flag();
        Ok(ctx)
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    pub fn boot_mode(&self) -> BootMode {
        self.boot_mode
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    /// NV register set; persist `nv().raw()` when `NVDATA_CHANGED` is set
    pub fn nv(&self) -> &NvStorage {
        &self.nv
    }

    pub fn shared_data(&self) -> &SharedData {
        &self.sd
    }

    pub fn gbb(&self) -> Option<&GbbHeader> {
        self.gbb.as_ref()
    }

    pub fn workbuf(&self) -> &WorkBuf<'a> {
        &self.workbuf
    }

    /// Kernel version floor read in phase 1
    pub fn kernel_version_secdata(&self) -> VbootResult<u32> {
        if !self.sd.status.contains(SdStatus::SECDATA_KERNEL_INIT) {
            return Err(VbootError::SECDATA_KERNEL_UNINITIALIZED);
        }
        Ok(self.sd.kernel_version_secdata)
    }

    pub(crate) fn nv_get(&self, field: NvField) -> u32 {
        self.nv.get(field)
    }

    pub(crate) fn nv_set(&mut self, field: NvField, val: u32) {
        self.nv.set(field, val);
        self.sync_nv_flag();
    }

    pub(crate) fn sync_nv_flag(&mut self) {
        self.flags.set(ContextFlags::NVDATA_CHANGED, self.nv.is_changed());
    }

    pub(crate) fn expect_state(&self, state: BootState) -> VbootResult<()> {
        if self.state != state {
            return Err(VbootError::API_PHASE_ORDER);
        }
        Ok(())
    }
}
