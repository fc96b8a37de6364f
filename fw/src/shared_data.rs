/*++

Licensed under the Apache-2.0 license.

File Name:

    shared_data.rs

Abstract:

    File contains the state carried between firmware phases.

--*/

use bitflags::bitflags;
use vboot_drivers::{DigestContext, FwResult, FwSlot, RecoveryReason, WorkBufRegion};

bitflags! {
    /// Decisions made by the boot core
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct SdFlags : u32 {
        const DEV_MODE_ENABLED = 0x0000_0001;
        const DISPLAY_AVAILABLE = 0x0000_0002;
        const MANUAL_RECOVERY_ALLOWED = 0x0000_0004;
    }
}

bitflags! {
    /// Initialization steps completed this boot
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct SdStatus : u32 {
        const NV_INIT = 0x0000_0001;
        const SECDATA_FIRMWARE_INIT = 0x0000_0002;
        const SECDATA_KERNEL_INIT = 0x0000_0004;
        const GBB_INIT = 0x0000_0008;
        const CHOSE_SLOT = 0x0000_0010;
        const RECOVERY_DECIDED = 0x0000_0020;
    }
}

/// What a running digest is being computed for
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum HashTag {
    #[default]
    Invalid = 0,
    FwBody = 1,
}

/// Shared data
pub struct SharedData {
    pub flags: SdFlags,
    pub status: SdStatus,

    /// Recovery reason for this boot
    pub recovery_reason: RecoveryReason,

    pub fw_slot: FwSlot,
    pub last_fw_slot: FwSlot,
    pub last_fw_result: FwResult,

    /// Composite version of the loaded firmware: key version << 16 | firmware version
    pub fw_version: u32,

    /// Composite version floor from firmware secure data
    pub fw_version_secdata: u32,

    pub kernel_version_secdata: u32,

    /// Reason passed to the most recent failure this boot
    pub(crate) fail_reason: RecoveryReason,

    /// Packed data key, header and key data
    pub(crate) data_key: Option<WorkBufRegion>,

    /// Verified firmware preamble
    pub(crate) preamble: Option<WorkBufRegion>,

    /// Offset of the preamble in the vblock, just past the keyblock
    pub(crate) vblock_preamble_offset: u32,

    /// Body digest in progress
    pub(crate) hash: Option<DigestContext>,
    pub(crate) hash_tag: HashTag,
    pub(crate) hash_remaining_size: u32,
}

impl Default for SharedData {
    fn default() -> Self {
        Self {
            flags: SdFlags::empty(),
            status: SdStatus::empty(),
            recovery_reason: RecoveryReason::NOT_REQUESTED,
            fw_slot: FwSlot::A,
            last_fw_slot: FwSlot::A,
            last_fw_result: FwResult::Unknown,
            fw_version: 0,
            fw_version_secdata: 0,
            kernel_version_secdata: 0,
            fail_reason: RecoveryReason::NOT_REQUESTED,
            data_key: None,
            preamble: None,
            vblock_preamble_offset: 0,
            hash: None,
            hash_tag: HashTag::Invalid,
            hash_remaining_size: 0,
        }
    }
}

impl SharedData {
    /// Bytes of firmware body still expected by the running digest
    pub fn hash_remaining_size(&self) -> u32 {
        self.hash_remaining_size
    }

    /// Returns true once a data key has been stored
    pub fn has_data_key(&self) -> bool {
        self.data_key.is_some()
    }

    /// Returns true once a verified preamble has been stored
    pub fn has_preamble(&self) -> bool {
        self.preamble.is_some()
    }
}
