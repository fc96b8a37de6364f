/*++

Licensed under the Apache-2.0 license.

File Name:

    tlcl.rs

Abstract:

    File contains the TPM command interface used by the anti-rollback store.

--*/

use vboot_error::VbootResult;

/// NV index of the firmware rollback space
pub const FIRMWARE_NV_INDEX: u32 = 0x1007;

/// NV index of the kernel rollback space
pub const KERNEL_NV_INDEX: u32 = 0x1008;

/// NV index of the firmware management parameters space
pub const FWMP_NV_INDEX: u32 = 0x100a;

/// Space may only be written with physical presence asserted
pub const TPM_NV_PER_PPWRITE: u32 = 0x0000_0001;

/// TPM command interface
///
/// Every command returns the TPM status as an error, so callers can match on
/// codes such as `TPM_E_MAXNVWRITES` or `TPM_E_BADINDEX`.
pub trait Tlcl {
    /// Read `data.len()` bytes from an NV space
    fn read(&mut self, index: u32, data: &mut [u8]) -> VbootResult<()>;

    /// Write an NV space
    fn write(&mut self, index: u32, data: &[u8]) -> VbootResult<()>;

    /// Clear the TPM owner
    fn force_clear(&mut self) -> VbootResult<()>;

    /// Enable the TPM
    fn set_enable(&mut self) -> VbootResult<()>;

    /// Set or clear the deactivated flag
    fn set_deactivated(&mut self, flag: bool) -> VbootResult<()>;

    /// Lock physical presence until the next reboot
    fn lock_physical_presence(&mut self) -> VbootResult<()>;

    /// Assert physical presence
    fn assert_physical_presence(&mut self) -> VbootResult<()>;

    /// Permission bits of an NV space
    ///
    /// `None` when the TPM family cannot report them; the caller then skips
    /// the permission check.
    fn get_permissions(&mut self, _index: u32) -> VbootResult<Option<u32>> {
        Ok(None)
    }
}

impl<T: Tlcl + ?Sized> Tlcl for &mut T {
    fn read(&mut self, index: u32, data: &mut [u8]) -> VbootResult<()> {
        (**self).read(index, data)
    }

    fn write(&mut self, index: u32, data: &[u8]) -> VbootResult<()> {
        (**self).write(index, data)
    }

    fn force_clear(&mut self) -> VbootResult<()> {
        (**self).force_clear()
    }

    fn set_enable(&mut self) -> VbootResult<()> {
        (**self).set_enable()
    }

    fn set_deactivated(&mut self, flag: bool) -> VbootResult<()> {
        (**self).set_deactivated(flag)
    }

    fn lock_physical_presence(&mut self) -> VbootResult<()> {
        (**self).lock_physical_presence()
    }

    fn assert_physical_presence(&mut self) -> VbootResult<()> {
        (**self).assert_physical_presence()
    }

    fn get_permissions(&mut self, index: u32) -> VbootResult<Option<u32>> {
        (**self).get_permissions(index)
    }
}
