/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Verified boot firmware library: the phase flows that pick and verify
    a read-write firmware slot.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

mod api;
mod context;
mod flow;
mod fw_env;
mod hash;
mod misc;
mod pcr;
mod secdata;
mod shared_data;

pub use api::{
    clear_recovery, commit_data, fail, fw_phase1, fw_phase2, fw_phase3, get_fw_boot_info,
    hwcrypto_allowed, lock_kernel_secdata, FwBootInfo,
};
pub use context::{BootMode, BootState, ContextFlags, VbootContext};
pub use fw_env::{FwEnv, FwHost, Resource};
pub use hash::{check_hash, check_hash_get_digest, extend_hash, get_metadata_hash, init_hash, MetadataHash};
pub use pcr::{get_pcr_digest, PcrDigest};
pub use shared_data::{HashTag, SdFlags, SdStatus, SharedData};
