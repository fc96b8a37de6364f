/*++

Licensed under the Apache-2.0 license.

File Name:

    rollback_index.rs

Abstract:

    File contains the anti-rollback store: checksum protected version and
    policy records kept in TPM NV spaces.

--*/

use crate::crc8::crc8;
use crate::cprintln;
use crate::tlcl::{Tlcl, FIRMWARE_NV_INDEX, FWMP_NV_INDEX, KERNEL_NV_INDEX, TPM_NV_PER_PPWRITE};
use bitflags::bitflags;
use memoffset::offset_of;
use vboot_error::{VbootError, VbootResult};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

/// First struct version of the firmware and kernel spaces protected by a CRC
pub const ROLLBACK_SPACE_CRC_VERSION: u8 = 2;

/// Current firmware space struct version
pub const ROLLBACK_SPACE_FIRMWARE_VERSION: u8 = 2;

/// Current kernel space struct version
pub const ROLLBACK_SPACE_KERNEL_VERSION: u8 = 2;

/// Kernel space UID ("GRWL")
pub const ROLLBACK_SPACE_KERNEL_UID: u32 = 0x4752_574C;

/// Current FWMP struct version (major 1, minor 0)
pub const FWMP_VERSION: u8 = 0x10;

/// Largest FWMP space the store will read
pub const FWMP_NV_MAX_SIZE: usize = 128;

/// Size of the developer key hash held in the FWMP
pub const FWMP_HASH_SIZE: usize = 32;

bitflags! {
    /// Firmware space flags
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct FirmwareFlags : u8 {
        /// Last boot was in developer mode
        const LAST_BOOT_DEVELOPER = 0x01;
        /// Virtual developer switch is on
        const VIRTUAL_DEV_MODE_ON = 0x02;
    }
}

bitflags! {
    /// Firmware management parameter flags
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct FwmpFlags : u32 {
        const DEV_DISABLE_BOOT = 0x01;
        const DEV_DISABLE_RECOVERY = 0x02;
        const DEV_ENABLE_EXTERNAL = 0x04;
        const DEV_ENABLE_LEGACY = 0x08;
        const DEV_ENABLE_OFFICIAL_ONLY = 0x10;
        const DEV_USE_KEY_HASH = 0x20;
    }
}

/// Firmware rollback space
#[repr(C)]
#[derive(
    FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Copy, Clone, Debug, Default, Eq, PartialEq,
)]
pub struct RollbackSpaceFirmware {
    pub struct_version: u8,
    pub flags: u8,
    fw_versions: [u8; 4],
    reserved: [u8; 3],
    pub crc8: u8,
}

impl RollbackSpaceFirmware {
    /// Combined key and firmware version (key version in the high half)
    pub fn fw_versions(&self) -> u32 {
        u32::from_le_bytes(self.fw_versions)
    }

    pub fn set_fw_versions(&mut self, val: u32) {
        self.fw_versions = val.to_le_bytes();
    }

    pub fn firmware_flags(&self) -> FirmwareFlags {
        FirmwareFlags::from_bits_retain(self.flags)
    }

    pub fn set_firmware_flags(&mut self, flags: FirmwareFlags) {
        self.flags = flags.bits();
    }

    fn crc_offset() -> usize {
        offset_of!(RollbackSpaceFirmware, crc8)
    }
}

/// Kernel rollback space
#[repr(C)]
#[derive(
    FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Copy, Clone, Debug, Default, Eq, PartialEq,
)]
pub struct RollbackSpaceKernel {
    pub struct_version: u8,
    uid: [u8; 4],
    kernel_versions: [u8; 4],
    reserved: [u8; 3],
    pub crc8: u8,
}

impl RollbackSpaceKernel {
    pub fn uid(&self) -> u32 {
        u32::from_le_bytes(self.uid)
    }

    pub fn set_uid(&mut self, val: u32) {
        self.uid = val.to_le_bytes();
    }

    pub fn kernel_versions(&self) -> u32 {
        u32::from_le_bytes(self.kernel_versions)
    }

    pub fn set_kernel_versions(&mut self, val: u32) {
        self.kernel_versions = val.to_le_bytes();
    }

    fn crc_offset() -> usize {
        offset_of!(RollbackSpaceKernel, crc8)
    }
}

/// Known head of the firmware management parameters space
///
/// Later minor versions may append fields; those are covered by the CRC but
/// not copied out.
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Copy, Clone, Debug, Eq, PartialEq)]
pub struct RollbackSpaceFwmp {
    pub crc: u8,
    pub struct_size: u8,
    pub struct_version: u8,
    reserved0: u8,
    flags: [u8; 4],
    pub dev_key_hash: [u8; FWMP_HASH_SIZE],
}

/// Size of the known FWMP head, also the minimum valid struct size
pub const FWMP_HEAD_SIZE: usize = core::mem::size_of::<RollbackSpaceFwmp>();

impl Default for RollbackSpaceFwmp {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl RollbackSpaceFwmp {
    pub fn flags(&self) -> FwmpFlags {
        FwmpFlags::from_bits_retain(u32::from_le_bytes(self.flags))
    }

    pub fn set_flags(&mut self, flags: FwmpFlags) {
        self.flags = flags.bits().to_le_bytes();
    }

    /// Checksum over everything after the checksum and size bytes
    pub fn calc_crc(space: &[u8]) -> u8 {
        crc8(space.get(2..).unwrap_or_default())
    }
}

/// Anti-rollback store
///
/// Wraps the TPM command interface; the kernel lock state lives here, so a
/// boot that creates one store locks at most once.
pub struct RollbackStore<T: Tlcl> {
    tpm: T,
    kernel_locked: bool,
}

impl<T: Tlcl> RollbackStore<T> {
    pub fn new(tpm: T) -> Self {
        Self {
            tpm,
            kernel_locked: false,
        }
    }

    /// Underlying TPM interface
    pub fn tpm(&mut self) -> &mut T {
        &mut self.tpm
    }

    /// Release the TPM interface
    pub fn into_inner(self) -> T {
        self.tpm
    }

    /// Clear the TPM owner, then enable and activate the TPM
    pub fn clear_and_reenable(&mut self) -> VbootResult<()> {
        cprintln!("[tpm] Clear and re-enable");
        self.tpm.force_clear()?;
        self.tpm.set_enable()?;
        self.tpm.set_deactivated(false)?;
        Ok(())
    }

    /// Write an NV space, recovering once from NV write exhaustion
    ///
    /// The TPM limits writes while unowned; clearing it resets the counter.
    pub fn safe_write(&mut self, index: u32, data: &[u8]) -> VbootResult<()> {
        match self.tpm.write(index, data) {
            Err(VbootError::TPM_E_MAXNVWRITES) => {
                cprintln!("[tpm] NV write limit reached for 0x{:x}, clearing", index);
                self.clear_and_reenable()?;
                self.tpm.write(index, data)
            }
            result => result,
        }
    }

    /// Read the firmware space
    ///
    /// Legacy spaces are returned with the struct version upgraded and are
    /// not checksum verified; the CRC is added by the next write.
    pub fn read_space_firmware(&mut self) -> VbootResult<RollbackSpaceFirmware> {
        let mut rsf = RollbackSpaceFirmware::new_zeroed();
        self.tpm.read(FIRMWARE_NV_INDEX, rsf.as_mut_bytes())?;

        if rsf.struct_version < ROLLBACK_SPACE_CRC_VERSION {
            cprintln!("[tpm] Legacy firmware space v{}", rsf.struct_version);
            rsf.struct_version = ROLLBACK_SPACE_FIRMWARE_VERSION;
            return Ok(rsf);
        }

        if crc8(&rsf.as_bytes()[..RollbackSpaceFirmware::crc_offset()]) != rsf.crc8 {
            cprintln!("[tpm] Firmware space CRC mismatch");
            return Err(VbootError::TPM_E_CORRUPTED_STATE);
        }

        Ok(rsf)
    }

    /// Write the firmware space, stamping the CRC
    ///
    /// Versions older than the CRC version are raised to it; newer ones are
    /// kept. The written record is read back and compared.
    pub fn write_space_firmware(&mut self, rsf: &mut RollbackSpaceFirmware) -> VbootResult<()> {
        if rsf.struct_version < ROLLBACK_SPACE_CRC_VERSION {
            rsf.struct_version = ROLLBACK_SPACE_CRC_VERSION;
        }
        rsf.crc8 = crc8(&rsf.as_bytes()[..RollbackSpaceFirmware::crc_offset()]);
        self.safe_write(FIRMWARE_NV_INDEX, rsf.as_bytes())?;

        let readback = self.read_space_firmware()?;
        if readback != *rsf {
            cprintln!("[tpm] Firmware space readback mismatch");
            return Err(VbootError::TPM_E_CORRUPTED_STATE);
        }
        Ok(())
    }

    /// Read the kernel space
    ///
    /// The space must only be writable with physical presence and carry the
    /// expected UID; anything else is treated as corrupt.
    pub fn read_space_kernel(&mut self) -> VbootResult<RollbackSpaceKernel> {
        if let Some(perms) = self.tpm.get_permissions(KERNEL_NV_INDEX)? {
            if perms != TPM_NV_PER_PPWRITE {
                cprintln!("[tpm] Kernel space permissions 0x{:x}", perms);
                return Err(VbootError::TPM_E_CORRUPTED_STATE);
            }
        }

        let mut rsk = RollbackSpaceKernel::new_zeroed();
        self.tpm.read(KERNEL_NV_INDEX, rsk.as_mut_bytes())?;

        if rsk.uid() != ROLLBACK_SPACE_KERNEL_UID {
            cprintln!("[tpm] Kernel space UID 0x{:x}", rsk.uid());
            return Err(VbootError::TPM_E_CORRUPTED_STATE);
        }

        if rsk.struct_version < ROLLBACK_SPACE_CRC_VERSION {
            cprintln!("[tpm] Legacy kernel space v{}", rsk.struct_version);
            rsk.struct_version = ROLLBACK_SPACE_KERNEL_VERSION;
            return Ok(rsk);
        }

        if crc8(&rsk.as_bytes()[..RollbackSpaceKernel::crc_offset()]) != rsk.crc8 {
            cprintln!("[tpm] Kernel space CRC mismatch");
            return Err(VbootError::TPM_E_CORRUPTED_STATE);
        }

        Ok(rsk)
    }

    /// Write the kernel space, stamping the CRC
    ///
    /// Like the firmware space, the version is only ever raised.
    pub fn write_space_kernel(&mut self, rsk: &mut RollbackSpaceKernel) -> VbootResult<()> {
        if rsk.struct_version < ROLLBACK_SPACE_CRC_VERSION {
            rsk.struct_version = ROLLBACK_SPACE_CRC_VERSION;
        }
        rsk.crc8 = crc8(&rsk.as_bytes()[..RollbackSpaceKernel::crc_offset()]);
        self.tpm.assert_physical_presence()?;
        self.safe_write(KERNEL_NV_INDEX, rsk.as_bytes())?;

        let readback = self.read_space_kernel()?;
        if readback != *rsk {
            cprintln!("[tpm] Kernel space readback mismatch");
            return Err(VbootError::TPM_E_CORRUPTED_STATE);
        }
        Ok(())
    }

    /// Read the firmware space for secure data initialization
    pub fn firmware_read(&mut self) -> VbootResult<RollbackSpaceFirmware> {
        self.read_space_firmware().map_err(|e| {
            cprintln!("[tpm] Firmware space read failed: 0x{:x}", u32::from(e));
            e
        })
    }

    /// Persist a new combined firmware version
    pub fn firmware_version_write(&mut self, version: u32) -> VbootResult<()> {
        let mut rsf = self.read_space_firmware()?;
        if rsf.fw_versions() == version {
            return Ok(());
        }
        cprintln!("[tpm] Firmware version 0x{:x}", version);
        rsf.set_fw_versions(version);
        self.write_space_firmware(&mut rsf)
    }

    /// Set or clear the virtual developer switch
    pub fn set_virtual_dev_mode(&mut self, val: bool) -> VbootResult<()> {
        let mut rsf = self.read_space_firmware()?;
        let mut flags = rsf.firmware_flags();
        flags.set(FirmwareFlags::VIRTUAL_DEV_MODE_ON, val);
        rsf.set_firmware_flags(flags);
        self.write_space_firmware(&mut rsf)
    }

    /// Read the stored kernel version
    pub fn kernel_version_read(&mut self) -> VbootResult<u32> {
        Ok(self.read_space_kernel()?.kernel_versions())
    }

    /// Write the stored kernel version, skipping unchanged values
    pub fn kernel_version_write(&mut self, version: u32) -> VbootResult<()> {
        let mut rsk = self.read_space_kernel()?;
        if rsk.kernel_versions() == version {
            return Ok(());
        }
        cprintln!("[tpm] Kernel version 0x{:x}", version);
        rsk.set_kernel_versions(version);
        self.write_space_kernel(&mut rsk)
    }

    /// Lock the kernel space until the next reboot
    ///
    /// Recovery mode leaves the space unlocked. Repeated calls after a
    /// successful lock do nothing.
    pub fn kernel_lock(&mut self, recovery_mode: bool) -> VbootResult<()> {
        if recovery_mode || self.kernel_locked {
            return Ok(());
        }

        self.tpm.lock_physical_presence()?;
        self.kernel_locked = true;
        cprintln!("[tpm] Kernel space locked");
        Ok(())
    }

    /// Read the firmware management parameters
    ///
    /// A space that was never defined yields zeroed defaults. Newer minor
    /// versions are accepted; a different major version is rejected.
    pub fn fwmp_read(&mut self) -> VbootResult<RollbackSpaceFwmp> {
        let mut buf = [0u8; FWMP_NV_MAX_SIZE];

        match self.tpm.read(FWMP_NV_INDEX, &mut buf[..FWMP_HEAD_SIZE]) {
            Err(VbootError::TPM_E_BADINDEX) => {
                cprintln!("[tpm] No FWMP space, using defaults");
                return Ok(RollbackSpaceFwmp::default());
            }
            result => result?,
        }

        let struct_size = buf[offset_of!(RollbackSpaceFwmp, struct_size)] as usize;
        if !(FWMP_HEAD_SIZE..=FWMP_NV_MAX_SIZE).contains(&struct_size) {
            cprintln!("[tpm] FWMP struct size {}", struct_size);
            return Err(VbootError::TPM_E_STRUCT_SIZE);
        }

        if struct_size > FWMP_HEAD_SIZE {
            self.tpm.read(FWMP_NV_INDEX, &mut buf[..struct_size])?;
        }

        let space = &buf[..struct_size];
        if RollbackSpaceFwmp::calc_crc(space) != buf[offset_of!(RollbackSpaceFwmp, crc)] {
            cprintln!("[tpm] FWMP CRC mismatch");
            return Err(VbootError::TPM_E_CORRUPTED_STATE);
        }

        let version = buf[offset_of!(RollbackSpaceFwmp, struct_version)];
        if version >> 4 != FWMP_VERSION >> 4 {
            cprintln!("[tpm] FWMP version 0x{:x}", version as u32);
            return Err(VbootError::TPM_E_STRUCT_VERSION);
        }

        RollbackSpaceFwmp::read_from_bytes(&buf[..FWMP_HEAD_SIZE])
            .map_err(|_| VbootError::TPM_E_STRUCT_SIZE)
    }
}
