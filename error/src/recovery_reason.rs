/*++

Licensed under the Apache-2.0 license.

File Name:

    recovery_reason.rs

Abstract:

    File contains the recovery reason codes recorded in NV storage.

--*/

/// Recovery reason
///
/// Persisted in the NV register set as a single byte, so the value space is
/// limited to `u8`. Zero means recovery was not requested.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RecoveryReason(pub u8);

impl RecoveryReason {
    /// Recovery not requested
    pub const NOT_REQUESTED: Self = Self(0x00);

    /// User manually requested recovery via the recovery switch
    pub const RO_MANUAL: Self = Self(0x02);

    /// Read-write firmware keyblock or preamble failed verification
    pub const RO_INVALID_RW: Self = Self(0x03);

    /// Shared data could not be set up in the work buffer
    pub const RO_SHARED_DATA: Self = Self(0x06);

    /// Secure data requested a reboot twice in a row
    pub const RO_TPM_REBOOT: Self = Self(0x14);

    /// Firmware secure data could not be initialized
    pub const SECDATA_FIRMWARE_INIT: Self = Self(0x17);

    /// GBB header is missing or invalid
    pub const GBB_HEADER: Self = Self(0x18);

    /// TPM owner clear request failed
    pub const TPM_CLEAR_OWNER: Self = Self(0x19);

    /// Developer switch evaluation failed
    pub const DEV_SWITCH: Self = Self(0x1a);

    /// Firmware slot could not be selected
    pub const FW_SLOT: Self = Self(0x1b);

    /// Firmware body failed verification
    pub const FW_BODY: Self = Self(0x1c);

    /// Kernel secure data could not be initialized
    pub const SECDATA_KERNEL_INIT: Self = Self(0x1d);

    /// Firmware secure data could not be written back
    pub const SECDATA_WRITE: Self = Self(0x1e);

    /// Unspecified read-only firmware failure
    pub const RO_UNSPECIFIED: Self = Self(0x3f);

    /// Returns true if a recovery reason has been set
    pub const fn is_requested(&self) -> bool {
        self.0 != Self::NOT_REQUESTED.0
    }
}

impl From<u8> for RecoveryReason {
    fn from(val: u8) -> Self {
        Self(val)
    }
}

impl From<RecoveryReason> for u8 {
    fn from(val: RecoveryReason) -> Self {
        val.0
    }
}

impl From<RecoveryReason> for u32 {
    fn from(val: RecoveryReason) -> Self {
        val.0 as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_requested() {
        assert!(!RecoveryReason::default().is_requested());
        assert!(RecoveryReason::FW_BODY.is_requested());
        assert_eq!(u8::from(RecoveryReason::from(0x14)), 0x14);
    }
}
