/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the verified boot driver library.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod crc8;
mod digest;
mod nv_storage;
pub mod printer;
mod rollback_index;
mod sha1;
mod tlcl;
mod work_buf;

pub use crc8::crc8;
pub use digest::{digest_buffer, DigestContext, HashAlgorithm, HwCrypto, NoHwCrypto, MAX_DIGEST_SIZE};
pub use nv_storage::{FwResult, FwSlot, NvField, NvStorage, MAX_TRY_COUNT, NV_DATA_SIZE};
pub use rollback_index::{
    FirmwareFlags, FwmpFlags, RollbackSpaceFirmware, RollbackSpaceFwmp, RollbackSpaceKernel,
    RollbackStore, FWMP_HASH_SIZE, FWMP_HEAD_SIZE, FWMP_NV_MAX_SIZE, FWMP_VERSION,
    ROLLBACK_SPACE_CRC_VERSION, ROLLBACK_SPACE_FIRMWARE_VERSION, ROLLBACK_SPACE_KERNEL_UID,
    ROLLBACK_SPACE_KERNEL_VERSION,
};
pub use sha1::{Sha1, SHA1_DIGEST_BYTE_SIZE};
pub use tlcl::{Tlcl, FIRMWARE_NV_INDEX, FWMP_NV_INDEX, KERNEL_NV_INDEX, TPM_NV_PER_PPWRITE};
pub use vboot_error::{RecoveryReason, VbootError, VbootResult};
pub use work_buf::{
    WorkBuf, WorkBufRegion, WORKBUF_ALIGN, WORKBUF_MIN_SIZE, WORKBUF_RECOMMENDED_SIZE,
};
