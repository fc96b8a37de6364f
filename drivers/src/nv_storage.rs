/*++

Licensed under the Apache-2.0 license.

File Name:

    nv_storage.rs

Abstract:

    File contains the non-volatile register set persisted by the host
    between boots.

--*/

use crate::{cprintln, crc8::crc8};

/// Size of the persisted NV blob in bytes
pub const NV_DATA_SIZE: usize = 16;

const OFFS_HEADER: usize = 0;
const OFFS_BOOT: usize = 1;
const OFFS_RECOVERY: usize = 2;
const OFFS_MISC: usize = 3;
const OFFS_TPM: usize = 5;
const OFFS_RECOVERY_SUBCODE: usize = 6;
const OFFS_BOOT2: usize = 7;
const OFFS_CRC: usize = 15;

const HEADER_SIGNATURE: u8 = 0x40;
const HEADER_SIGNATURE_MASK: u8 = 0xc0;
const HEADER_FW_SETTINGS_RESET: u8 = 0x20;
const HEADER_KERNEL_SETTINGS_RESET: u8 = 0x10;

const BOOT_TRY_COUNT_MASK: u8 = 0x0f;
const BOOT_DISPLAY_REQUEST: u8 = 0x20;
const BOOT_DISABLE_DEV_REQUEST: u8 = 0x40;

const MISC_DIAG_REQUEST: u8 = 0x01;

const TPM_CLEAR_OWNER_REQUEST: u8 = 0x01;
const TPM_CLEAR_OWNER_DONE: u8 = 0x02;
const TPM_REQUESTED_REBOOT: u8 = 0x04;

const BOOT2_RESULT_MASK: u8 = 0x03;
const BOOT2_TRIED: u8 = 0x04;
const BOOT2_TRY_NEXT: u8 = 0x08;
const BOOT2_PREV_RESULT_MASK: u8 = 0x30;
const BOOT2_PREV_RESULT_SHIFT: u8 = 4;
const BOOT2_PREV_TRIED: u8 = 0x40;

/// Largest try count the register can hold
pub const MAX_TRY_COUNT: u32 = BOOT_TRY_COUNT_MASK as u32;

/// Named fields of the NV register set
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NvField {
    /// Firmware settings were reset to defaults this boot
    FirmwareSettingsReset,
    /// Kernel settings were reset to defaults this boot
    KernelSettingsReset,
    /// Remaining tries for the slot in `TryNext`
    TryCount,
    /// Slot to try on the next boot
    TryNext,
    /// Slot tried this boot
    FwTried,
    /// Result of the slot tried this boot
    FwResult,
    /// Slot tried on the previous boot
    FwPrevTried,
    /// Result of the slot tried on the previous boot
    FwPrevResult,
    /// Pending recovery request
    RecoveryRequest,
    /// Subcode of the pending recovery request
    RecoverySubcode,
    /// Display should be initialized on the next boot
    DisplayRequest,
    /// Diagnostics were requested
    DiagRequest,
    /// Leave developer mode on the next boot
    DisableDevRequest,
    /// Clear the TPM owner on the next boot
    ClearTpmOwnerRequest,
    /// TPM owner was cleared on request
    ClearTpmOwnerDone,
    /// Secure data already requested a reboot
    TpmRequestedReboot,
}

/// Firmware slot
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FwSlot {
    A = 0,
    B = 1,
}

impl FwSlot {
    /// The other slot
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl From<u32> for FwSlot {
    fn from(val: u32) -> Self {
        if val == 0 {
            Self::A
        } else {
            Self::B
        }
    }
}

impl From<FwSlot> for u32 {
    fn from(val: FwSlot) -> Self {
        val as u32
    }
}

/// Outcome of booting a firmware slot
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum FwResult {
    #[default]
    Unknown = 0,
    Trying = 1,
    Success = 2,
    Failure = 3,
}

impl From<u32> for FwResult {
    fn from(val: u32) -> Self {
        match val & BOOT2_RESULT_MASK as u32 {
            1 => Self::Trying,
            2 => Self::Success,
            3 => Self::Failure,
            _ => Self::Unknown,
        }
    }
}

impl From<FwResult> for u32 {
    fn from(val: FwResult) -> Self {
        val as u32
    }
}

/// Cached NV register set
///
/// Reads and writes go to the in-memory copy. The host is handed the blob
/// again only when `is_changed()` reports a modification.
#[derive(Debug, Clone)]
pub struct NvStorage {
    data: [u8; NV_DATA_SIZE],
    changed: bool,
}

impl NvStorage {
    /// Load the register set supplied by the host
    ///
    /// A blob with a bad signature or CRC is replaced by defaults with both
    /// settings-reset bits set, and marked changed.
    pub fn new(raw: &[u8; NV_DATA_SIZE]) -> Self {
        let mut nv = Self {
            data: *raw,
            changed: false,
        };

        if nv.data[OFFS_HEADER] & HEADER_SIGNATURE_MASK != HEADER_SIGNATURE
            || crc8(&nv.data[..OFFS_CRC]) != nv.data[OFFS_CRC]
        {
            cprintln!("[nv] Invalid NV data, resetting to defaults");
            nv.data = [0u8; NV_DATA_SIZE];
            nv.data[OFFS_HEADER] =
                HEADER_SIGNATURE | HEADER_FW_SETTINGS_RESET | HEADER_KERNEL_SETTINGS_RESET;
            nv.regen_crc();
        }

        nv
    }

    /// Raw blob for persisting
    pub fn raw(&self) -> &[u8; NV_DATA_SIZE] {
        &self.data
    }

    /// Returns true if the blob differs from what the host supplied
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Mark the blob as persisted
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    fn regen_crc(&mut self) {
        self.data[OFFS_CRC] = crc8(&self.data[..OFFS_CRC]);
        self.changed = true;
    }

    fn bit(&self, offset: usize, mask: u8) -> u32 {
        (self.data[offset] & mask != 0) as u32
    }

    fn set_bit(&mut self, offset: usize, mask: u8, val: u32) {
        if val != 0 {
            self.data[offset] |= mask;
        } else {
            self.data[offset] &= !mask;
        }
    }

    /// Read a field
    pub fn get(&self, field: NvField) -> u32 {
        match field {
            NvField::FirmwareSettingsReset => self.bit(OFFS_HEADER, HEADER_FW_SETTINGS_RESET),
            NvField::KernelSettingsReset => self.bit(OFFS_HEADER, HEADER_KERNEL_SETTINGS_RESET),
            NvField::TryCount => (self.data[OFFS_BOOT] & BOOT_TRY_COUNT_MASK) as u32,
            NvField::TryNext => self.bit(OFFS_BOOT2, BOOT2_TRY_NEXT),
            NvField::FwTried => self.bit(OFFS_BOOT2, BOOT2_TRIED),
            NvField::FwResult => (self.data[OFFS_BOOT2] & BOOT2_RESULT_MASK) as u32,
            NvField::FwPrevTried => self.bit(OFFS_BOOT2, BOOT2_PREV_TRIED),
            NvField::FwPrevResult => {
                ((self.data[OFFS_BOOT2] & BOOT2_PREV_RESULT_MASK) >> BOOT2_PREV_RESULT_SHIFT) as u32
            }
            NvField::RecoveryRequest => self.data[OFFS_RECOVERY] as u32,
            NvField::RecoverySubcode => self.data[OFFS_RECOVERY_SUBCODE] as u32,
            NvField::DisplayRequest => self.bit(OFFS_BOOT, BOOT_DISPLAY_REQUEST),
            NvField::DiagRequest => self.bit(OFFS_MISC, MISC_DIAG_REQUEST),
            NvField::DisableDevRequest => self.bit(OFFS_BOOT, BOOT_DISABLE_DEV_REQUEST),
            NvField::ClearTpmOwnerRequest => self.bit(OFFS_TPM, TPM_CLEAR_OWNER_REQUEST),
            NvField::ClearTpmOwnerDone => self.bit(OFFS_TPM, TPM_CLEAR_OWNER_DONE),
            NvField::TpmRequestedReboot => self.bit(OFFS_TPM, TPM_REQUESTED_REBOOT),
        }
    }

    /// Write a field
    ///
    /// Values wider than the field are clamped (try count) or truncated.
    /// Writing the current value leaves the blob unchanged.
    pub fn set(&mut self, field: NvField, val: u32) {
        if self.get(field) == val {
            return;
        }

        match field {
            NvField::FirmwareSettingsReset => {
                self.set_bit(OFFS_HEADER, HEADER_FW_SETTINGS_RESET, val)
            }
            NvField::KernelSettingsReset => {
                self.set_bit(OFFS_HEADER, HEADER_KERNEL_SETTINGS_RESET, val)
            }
            NvField::TryCount => {
                let count = core::cmp::min(val, MAX_TRY_COUNT) as u8;
                self.data[OFFS_BOOT] = (self.data[OFFS_BOOT] & !BOOT_TRY_COUNT_MASK) | count;
            }
            NvField::TryNext => self.set_bit(OFFS_BOOT2, BOOT2_TRY_NEXT, val),
            NvField::FwTried => self.set_bit(OFFS_BOOT2, BOOT2_TRIED, val),
            NvField::FwResult => {
                let result = (val as u8) & BOOT2_RESULT_MASK;
                self.data[OFFS_BOOT2] = (self.data[OFFS_BOOT2] & !BOOT2_RESULT_MASK) | result;
            }
            NvField::FwPrevTried => self.set_bit(OFFS_BOOT2, BOOT2_PREV_TRIED, val),
            NvField::FwPrevResult => {
                let result = ((val as u8) << BOOT2_PREV_RESULT_SHIFT) & BOOT2_PREV_RESULT_MASK;
                self.data[OFFS_BOOT2] = (self.data[OFFS_BOOT2] & !BOOT2_PREV_RESULT_MASK) | result;
            }
            NvField::RecoveryRequest => self.data[OFFS_RECOVERY] = val as u8,
            NvField::RecoverySubcode => self.data[OFFS_RECOVERY_SUBCODE] = val as u8,
            NvField::DisplayRequest => self.set_bit(OFFS_BOOT, BOOT_DISPLAY_REQUEST, val),
            NvField::DiagRequest => self.set_bit(OFFS_MISC, MISC_DIAG_REQUEST, val),
            NvField::DisableDevRequest => self.set_bit(OFFS_BOOT, BOOT_DISABLE_DEV_REQUEST, val),
            NvField::ClearTpmOwnerRequest => self.set_bit(OFFS_TPM, TPM_CLEAR_OWNER_REQUEST, val),
            NvField::ClearTpmOwnerDone => self.set_bit(OFFS_TPM, TPM_CLEAR_OWNER_DONE, val),
            NvField::TpmRequestedReboot => self.set_bit(OFFS_TPM, TPM_REQUESTED_REBOOT, val),
        }

        self.regen_crc();
    }
}
