/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error codes shared by the verified boot crates.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

mod recovery_reason;

pub use recovery_reason::RecoveryReason;

/// Verified boot error type
///
/// TPM transport status codes share this code space and keep the values the
/// TPM reports (all below `0x1000_0000`). Codes raised by the boot core
/// itself start at `0x1000_0000` and are grouped by component.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VbootError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: VbootError = VbootError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl VbootError {
    /// Create a vboot error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get a VbootError from a u32 is to
    /// use `VbootError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("VbootError cannot be 0"),
        }
    }

    /// Returns true if the code was reported by the TPM rather than raised by
    /// the boot core.
    pub const fn is_tpm_status(&self) -> bool {
        self.0.get() < 0x1000_0000
    }

    /// Low byte of the code, recorded as the recovery subcode.
    pub const fn subcode(&self) -> u8 {
        (self.0.get() & 0xff) as u8
    }

    define_error_constants![
        // TPM transport status codes
        (TPM_E_BADINDEX, 0x0000_0002, "TPM Error: NV index is not defined"),
        (TPM_E_IOERROR, 0x0000_001f, "TPM Error: I/O error"),
        (
            TPM_E_MAXNVWRITES,
            0x0000_0048,
            "TPM Error: maximum number of NV writes exceeded"
        ),
        (
            TPM_E_CORRUPTED_STATE,
            0x0000_5003,
            "TPM Error: space contents are corrupted"
        ),
        (
            TPM_E_STRUCT_SIZE,
            0x0000_500b,
            "TPM Error: space struct size is out of bounds"
        ),
        (
            TPM_E_STRUCT_VERSION,
            0x0000_500c,
            "TPM Error: space struct major version is incompatible"
        ),
        // Digest engine
        (
            SHA_INIT_ALGORITHM,
            0x1003_0001,
            "Digest Error: unsupported hash algorithm at init"
        ),
        (
            SHA_FINALIZE_DIGEST_SIZE,
            0x1003_0004,
            "Digest Error: digest buffer too small"
        ),
        (
            SHA_MAX_DATA,
            0x1003_0006,
            "Digest Error: maximum data size exceeded"
        ),
        // Key unpacking and signature verification
        (
            UNPACK_KEY_SIZE,
            0x1004_0001,
            "Key Error: key size does not match algorithm"
        ),
        (
            UNPACK_KEY_ALGORITHM,
            0x1004_0002,
            "Key Error: unknown key algorithm"
        ),
        (
            UNPACK_KEY_ARRAY_SIZE,
            0x1004_0003,
            "Key Error: key array size does not match algorithm"
        ),
        (
            INSIDE_DATA_OUTSIDE,
            0x1004_0005,
            "Key Error: member data extends outside its parent"
        ),
        (
            VERIFY_DIGEST_SIG_SIZE,
            0x1004_0006,
            "Signature Error: signature size does not match key"
        ),
        (
            VERIFY_DIGEST_FAILURE,
            0x1004_0007,
            "Signature Error: verification primitive failed"
        ),
        (
            VERIFY_DIGEST_MISMATCH,
            0x1004_0008,
            "Signature Error: signature does not match digest"
        ),
        (
            VERIFY_DATA_SIZE,
            0x1004_0009,
            "Signature Error: signed data size mismatch"
        ),
        // Keyblock
        (
            KEYBLOCK_TOO_SMALL_FOR_HEADER,
            0x1005_0001,
            "Keyblock Error: buffer smaller than header"
        ),
        (KEYBLOCK_MAGIC, 0x1005_0002, "Keyblock Error: bad magic"),
        (
            KEYBLOCK_HEADER_VERSION,
            0x1005_0003,
            "Keyblock Error: unsupported header version"
        ),
        (
            KEYBLOCK_SIZE,
            0x1005_0004,
            "Keyblock Error: declared size larger than buffer"
        ),
        (
            KEYBLOCK_SIG_OUTSIDE,
            0x1005_0005,
            "Keyblock Error: signature outside keyblock"
        ),
        (
            KEYBLOCK_SIGNED_TOO_LITTLE,
            0x1005_0006,
            "Keyblock Error: signature does not cover the header"
        ),
        (
            KEYBLOCK_SIG_INVALID,
            0x1005_0007,
            "Keyblock Error: signature invalid"
        ),
        (
            KEYBLOCK_DATA_KEY_OUTSIDE,
            0x1005_0008,
            "Keyblock Error: data key outside signed data"
        ),
        (
            KEYBLOCK_SIGNED_TOO_MUCH,
            0x1005_0009,
            "Keyblock Error: signature covers more than the keyblock"
        ),
        // Firmware preamble
        (
            PREAMBLE_TOO_SMALL_FOR_HEADER,
            0x1006_0001,
            "Preamble Error: buffer smaller than header"
        ),
        (
            PREAMBLE_HEADER_VERSION,
            0x1006_0002,
            "Preamble Error: unsupported header version"
        ),
        (
            PREAMBLE_SIZE,
            0x1006_0003,
            "Preamble Error: declared size larger than buffer"
        ),
        (
            PREAMBLE_SIG_OUTSIDE,
            0x1006_0004,
            "Preamble Error: signature outside preamble"
        ),
        (
            PREAMBLE_SIGNED_TOO_LITTLE,
            0x1006_0005,
            "Preamble Error: signature does not cover the header"
        ),
        (
            PREAMBLE_SIG_INVALID,
            0x1006_0006,
            "Preamble Error: signature invalid"
        ),
        (
            PREAMBLE_KERNEL_SUBKEY_OUTSIDE,
            0x1006_0007,
            "Preamble Error: kernel subkey outside signed data"
        ),
        (
            PREAMBLE_BODY_SIG_OUTSIDE,
            0x1006_0008,
            "Preamble Error: body signature outside signed data"
        ),
        (
            PREAMBLE_SIGNED_TOO_MUCH,
            0x1006_0009,
            "Preamble Error: signature covers more than the preamble"
        ),
        // Work buffer
        (
            WORKBUF_ALLOC_SIZE,
            0x1007_0001,
            "Work Buffer Error: not enough space for allocation"
        ),
        (
            WORKBUF_INVALID_REGION,
            0x1007_0002,
            "Work Buffer Error: region outside used area"
        ),
        (
            WORKBUF_TOO_SMALL,
            0x1007_0003,
            "Work Buffer Error: buffer smaller than minimum size"
        ),
        // GBB
        (GBB_MAGIC, 0x1008_0001, "GBB Error: bad signature"),
        (GBB_VERSION, 0x1008_0002, "GBB Error: unsupported major version"),
        (GBB_TOO_OLD, 0x1008_0003, "GBB Error: minor version too old"),
        (GBB_HEADER_SIZE, 0x1008_0004, "GBB Error: header size too small"),
        (
            GBB_ROOT_KEY_OUTSIDE,
            0x1008_0005,
            "GBB Error: root key region is empty"
        ),
        // Firmware verification
        (
            FW_KEYBLOCK_VERSION_RANGE,
            0x1009_0001,
            "Firmware Error: keyblock data key version out of range"
        ),
        (
            FW_KEYBLOCK_VERSION_ROLLBACK,
            0x1009_0002,
            "Firmware Error: keyblock data key version rolled back"
        ),
        (
            FW_PREAMBLE_VERSION_RANGE,
            0x1009_0003,
            "Firmware Error: preamble firmware version out of range"
        ),
        (
            FW_PREAMBLE_VERSION_ROLLBACK,
            0x1009_0004,
            "Firmware Error: preamble firmware version rolled back"
        ),
        (
            FW_PREAMBLE_DATA_KEY,
            0x1009_0005,
            "Firmware Error: no data key loaded"
        ),
        // Secure data
        (
            SECDATA_FIRMWARE_UNINITIALIZED,
            0x100b_0001,
            "Secdata Error: firmware secdata used before init"
        ),
        (
            SECDATA_KERNEL_UNINITIALIZED,
            0x100b_0002,
            "Secdata Error: kernel secdata used before init"
        ),
        // Firmware API
        (
            API_PHASE1_SECDATA_REBOOT,
            0x100c_0001,
            "API: secure data requested a reboot"
        ),
        (API_PHASE1_RECOVERY, 0x100c_0002, "API: recovery mode required"),
        (
            API_PHASE_ORDER,
            0x100c_0003,
            "API: phase called out of order"
        ),
        (API_INIT_HASH_TAG, 0x100c_0004, "API: unsupported hash tag"),
        (API_INIT_HASH_PREAMBLE, 0x100c_0005, "API: no preamble loaded"),
        (
            API_INIT_HASH_DATA_KEY,
            0x100c_0007,
            "API: no data key or body signature holds a metadata hash"
        ),
        (
            API_EXTEND_HASH_WORKBUF,
            0x100c_0008,
            "API: digest not initialized"
        ),
        (
            API_EXTEND_HASH_SIZE,
            0x100c_0009,
            "API: extend size is zero or exceeds remaining data"
        ),
        (API_CHECK_HASH_PREAMBLE, 0x100c_000a, "API: no preamble loaded"),
        (
            API_CHECK_HASH_WORKBUF,
            0x100c_000b,
            "API: digest not initialized"
        ),
        (
            API_CHECK_HASH_SIZE,
            0x100c_000c,
            "API: wrong amount of data hashed"
        ),
        (API_CHECK_HASH_TAG, 0x100c_000e, "API: unsupported hash tag"),
        (API_CHECK_HASH_DATA_KEY, 0x100c_000f, "API: no data key loaded"),
        (
            API_CHECK_DIGEST_SIZE,
            0x100c_0010,
            "API: digest output buffer too small"
        ),
        (
            API_CHECK_HASH_SIG_SIZE,
            0x100c_0011,
            "API: embedded hash does not fit in signature"
        ),
        (API_PCR_DIGEST, 0x100c_0012, "API: unknown PCR digest"),
        (
            API_PCR_DIGEST_BUF,
            0x100c_0013,
            "API: PCR digest buffer too small"
        ),
        (
            API_NEXT_SLOT_UNAVAILABLE,
            0x100c_0014,
            "API: no other firmware slot to try"
        ),
        // Host callbacks
        (
            EX_HWCRYPTO_UNSUPPORTED,
            0x100d_0001,
            "Host: hardware crypto not supported for this operation"
        ),
        (
            EX_READ_RESOURCE_SIZE,
            0x100d_0003,
            "Host: read outside resource"
        ),
    ];
}

impl From<core::num::NonZeroU32> for crate::VbootError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::VbootError(val)
    }
}

impl From<VbootError> for core::num::NonZeroU32 {
    fn from(val: VbootError) -> Self {
        val.0
    }
}

impl From<VbootError> for u32 {
    fn from(val: VbootError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for VbootError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(VbootError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type VbootResult<T> = Result<T, VbootError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_try_from() {
        assert!(VbootError::try_from(0).is_err());
        assert_eq!(
            Ok(VbootError::TPM_E_MAXNVWRITES),
            VbootError::try_from(0x48)
        );
        assert_eq!(
            Ok(VbootError::API_CHECK_HASH_SIZE),
            VbootError::try_from(0x100c_000c)
        );
    }

    #[test]
    fn test_tpm_status_classification() {
        assert!(VbootError::TPM_E_CORRUPTED_STATE.is_tpm_status());
        assert!(!VbootError::SHA_INIT_ALGORITHM.is_tpm_status());
        assert_eq!(VbootError::TPM_E_MAXNVWRITES.subcode(), 0x48);
    }

    #[test]
    fn test_error_constants_uniqueness() {
        let constants = VbootError::all_constants();
        let mut error_values = HashSet::new();
        let mut duplicates = Vec::new();

        for (name, value) in constants {
            if !error_values.insert(value) {
                duplicates.push((name, value));
            }
        }

        assert!(
            duplicates.is_empty(),
            "Found duplicate error codes: {:?}",
            duplicates
        );
    }
}
