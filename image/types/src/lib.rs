/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the on-media data structures of the verified boot block:
    packed keys, signatures, keyblocks, firmware preambles and the GBB header.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

use core::ops::Range;

use bitflags::bitflags;
use getset::{CopyGetters, Getters, MutGetters, Setters};
use memoffset::{offset_of, span_of};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const KEYBLOCK_MAGIC: [u8; 8] = *b"CHROMEOS";
pub const KEYBLOCK_VERSION_MAJOR: u32 = 2;
pub const KEYBLOCK_VERSION_MINOR: u32 = 1;

pub const FIRMWARE_PREAMBLE_VERSION_MAJOR: u32 = 2;
pub const FIRMWARE_PREAMBLE_VERSION_MINOR: u32 = 1;

pub const GBB_SIGNATURE: [u8; 4] = *b"$GBB";
pub const GBB_MAJOR_VER: u16 = 1;
pub const GBB_MINOR_VER: u16 = 2;
pub const GBB_HWID_DIGEST_SIZE: usize = 32;

/// Number of packed key algorithm identifiers
pub const CRYPTO_ALGORITHM_COUNT: u32 = 18;

pub const PACKED_KEY_SIZE: usize = core::mem::size_of::<PackedKey>();
pub const SIGNATURE_SIZE: usize = core::mem::size_of::<Signature>();
pub const KEYBLOCK_SIZE: usize = core::mem::size_of::<Keyblock>();
pub const FW_PREAMBLE_SIZE: usize = core::mem::size_of::<FwPreamble>();
pub const GBB_HEADER_SIZE: usize = core::mem::size_of::<GbbHeader>();

/// Offset of the raw digest inside an embedded hash
pub const EMBEDDED_HASH_DIGEST_OFFSET: usize = core::mem::size_of::<EmbeddedHash>();

bitflags! {
    /// Boot modes a keyblock may be used in
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct KeyblockFlags : u32 {
        const DEVELOPER_0 = 0x01;
        const DEVELOPER_1 = 0x02;
        const RECOVERY_0 = 0x04;
        const RECOVERY_1 = 0x08;
        const MINIOS_0 = 0x10;
        const MINIOS_1 = 0x20;
    }
}

bitflags! {
    /// Board flags from the GBB header
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct GbbFlags : u32 {
        const DEV_SCREEN_SHORT_DELAY = 0x0000_0001;
        const LOAD_OPTION_ROMS = 0x0000_0002;
        const ENABLE_ALTERNATE_OS = 0x0000_0004;
        const FORCE_DEV_SWITCH_ON = 0x0000_0008;
        const FORCE_DEV_BOOT_USB = 0x0000_0010;
        const DISABLE_FW_ROLLBACK_CHECK = 0x0000_0020;
        const ENTER_TRIGGERS_TONORM = 0x0000_0040;
        const FORCE_DEV_BOOT_LEGACY = 0x0000_0080;
        const DISABLE_EC_SOFTWARE_SYNC = 0x0000_0200;
        const DISABLE_LID_SHUTDOWN = 0x0000_1000;
        const FORCE_MANUAL_RECOVERY = 0x0000_4000;
        const DISABLE_FWMP = 0x0000_8000;
    }
}

/// Public key header followed (at `key_offset`) by the key data
#[repr(C)]
#[derive(
    IntoBytes,
    FromBytes,
    Immutable,
    KnownLayout,
    Default,
    Debug,
    CopyGetters,
    Setters,
    Copy,
    Clone,
    Eq,
    PartialEq,
)]
pub struct PackedKey {
    /// Offset of key data from the start of this struct
    #[getset(get_copy = "pub", set = "pub")]
    key_offset: u32,

    reserved0: u32,

    /// Size of key data in bytes
    #[getset(get_copy = "pub", set = "pub")]
    key_size: u32,

    reserved1: u32,

    /// Signature and hash algorithm identifier
    #[getset(get_copy = "pub", set = "pub")]
    algorithm: u32,

    reserved2: u32,

    /// Key version
    #[getset(get_copy = "pub", set = "pub")]
    key_version: u32,

    reserved3: u32,
}

/// Signature header followed (at `sig_offset`) by the signature data
#[repr(C)]
#[derive(
    IntoBytes,
    FromBytes,
    Immutable,
    KnownLayout,
    Default,
    Debug,
    CopyGetters,
    Setters,
    Copy,
    Clone,
    Eq,
    PartialEq,
)]
pub struct Signature {
    /// Offset of signature data from the start of this struct
    #[getset(get_copy = "pub", set = "pub")]
    sig_offset: u32,

    reserved0: u32,

    /// Size of signature data in bytes
    #[getset(get_copy = "pub", set = "pub")]
    sig_size: u32,

    reserved1: u32,

    /// Number of bytes of data covered by the signature
    #[getset(get_copy = "pub", set = "pub")]
    data_size: u32,

    reserved2: u32,
}

/// Keyblock header
///
/// Signed by the root key and carries the data key that signs the preamble.
#[repr(C)]
#[derive(
    IntoBytes,
    FromBytes,
    Immutable,
    KnownLayout,
    Default,
    Debug,
    Getters,
    CopyGetters,
    MutGetters,
    Setters,
    Copy,
    Clone,
)]
pub struct Keyblock {
    #[getset(get = "pub", set = "pub")]
    magic: [u8; 8],

    #[getset(get_copy = "pub", set = "pub")]
    header_version_major: u32,

    #[getset(get_copy = "pub", set = "pub")]
    header_version_minor: u32,

    /// Size of the keyblock including all trailing data
    #[getset(get_copy = "pub", set = "pub")]
    keyblock_size: u32,

    reserved0: u32,

    #[getset(get_copy = "pub", get_mut = "pub", set = "pub")]
    keyblock_signature: Signature,

    /// Unused checksum over the keyblock, kept for layout
    #[getset(get_copy = "pub", get_mut = "pub", set = "pub")]
    keyblock_hash: Signature,

    #[getset(get_copy = "pub", set = "pub")]
    keyblock_flags: u32,

    reserved1: u32,

    #[getset(get_copy = "pub", get_mut = "pub", set = "pub")]
    data_key: PackedKey,
}

impl Keyblock {
    /// Offset of the keyblock signature header
    pub fn signature_offset() -> usize {
        offset_of!(Keyblock, keyblock_signature)
    }

    /// Byte range of the data key header
    pub fn data_key_range() -> Range<usize> {
        span_of!(Keyblock, data_key)
    }

    pub fn flags(&self) -> KeyblockFlags {
        KeyblockFlags::from_bits_retain(self.keyblock_flags)
    }
}

/// Firmware preamble header
///
/// Signed by the data key; carries the firmware version, the kernel subkey
/// and the body signature.
#[repr(C)]
#[derive(
    IntoBytes,
    FromBytes,
    Immutable,
    KnownLayout,
    Default,
    Debug,
    CopyGetters,
    MutGetters,
    Setters,
    Copy,
    Clone,
)]
pub struct FwPreamble {
    /// Size of the preamble including all trailing data
    #[getset(get_copy = "pub", set = "pub")]
    preamble_size: u32,

    reserved0: u32,

    #[getset(get_copy = "pub", get_mut = "pub", set = "pub")]
    preamble_signature: Signature,

    #[getset(get_copy = "pub", set = "pub")]
    header_version_major: u32,

    #[getset(get_copy = "pub", set = "pub")]
    header_version_minor: u32,

    #[getset(get_copy = "pub", set = "pub")]
    firmware_version: u32,

    reserved1: u32,

    #[getset(get_copy = "pub", get_mut = "pub", set = "pub")]
    kernel_subkey: PackedKey,

    #[getset(get_copy = "pub", get_mut = "pub", set = "pub")]
    body_signature: Signature,

    #[getset(get_copy = "pub", set = "pub")]
    flags: u32,
}

impl FwPreamble {
    /// Offset of the preamble signature header
    pub fn signature_offset() -> usize {
        offset_of!(FwPreamble, preamble_signature)
    }

    /// Offset of the kernel subkey header
    pub fn kernel_subkey_offset() -> usize {
        offset_of!(FwPreamble, kernel_subkey)
    }

    /// Offset of the body signature header
    pub fn body_signature_offset() -> usize {
        offset_of!(FwPreamble, body_signature)
    }
}

/// Header of a hash embedded in place of a body signature
///
/// The raw digest follows the header; its size is given by `algo`.
#[repr(C)]
#[derive(IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned, Debug, Copy, Clone)]
pub struct EmbeddedHash {
    reserved: [u8; 3],

    /// Hash algorithm identifier
    pub algo: u8,
}

/// Google binary block header
#[repr(C)]
#[derive(
    IntoBytes,
    FromBytes,
    Immutable,
    KnownLayout,
    Debug,
    Getters,
    CopyGetters,
    Setters,
    Copy,
    Clone,
)]
pub struct GbbHeader {
    #[getset(get = "pub", set = "pub")]
    signature: [u8; 4],

    #[getset(get_copy = "pub", set = "pub")]
    major_version: u16,

    #[getset(get_copy = "pub", set = "pub")]
    minor_version: u16,

    #[getset(get_copy = "pub", set = "pub")]
    header_size: u32,

    #[getset(get_copy = "pub", set = "pub")]
    flags: u32,

    #[getset(get_copy = "pub", set = "pub")]
    hwid_offset: u32,

    #[getset(get_copy = "pub", set = "pub")]
    hwid_size: u32,

    #[getset(get_copy = "pub", set = "pub")]
    rootkey_offset: u32,

    #[getset(get_copy = "pub", set = "pub")]
    rootkey_size: u32,

    #[getset(get_copy = "pub", set = "pub")]
    bmpfv_offset: u32,

    #[getset(get_copy = "pub", set = "pub")]
    bmpfv_size: u32,

    #[getset(get_copy = "pub", set = "pub")]
    recovery_key_offset: u32,

    #[getset(get_copy = "pub", set = "pub")]
    recovery_key_size: u32,

    /// SHA-256 of the HWID string
    #[getset(get = "pub", set = "pub")]
    hwid_digest: [u8; GBB_HWID_DIGEST_SIZE],

    pad: [u8; 48],
}

impl Default for GbbHeader {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl GbbHeader {
    pub fn gbb_flags(&self) -> GbbFlags {
        GbbFlags::from_bits_retain(self.flags)
    }
}
