/*++

Licensed under the Apache-2.0 license.

File Name:

    fw_env.rs

Abstract:

    File implements a context holding all the services utilized by the
    firmware verification flows. The primary need for this abstraction is
    to keep platform access out of the flows. The natural side benefit is
    that it makes authoring mocks and unit tests easy.

--*/

use vboot_drivers::{FwSlot, HwCrypto, RollbackStore, Tlcl, VbootResult, NV_DATA_SIZE};
use vboot_image_verify::ImageVerificationEnv;

/// Firmware image resource readable through the host
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Resource {
    /// Google binary block
    Gbb,

    /// Verification block (keyblock + preamble) of a slot
    FwVblock(FwSlot),
}

/// Platform services required by the firmware flows
pub trait FwHost: ImageVerificationEnv + HwCrypto {
    /// Read `buf.len()` bytes of a resource starting at `offset`
    ///
    /// # Arguments
    ///
    /// * `resource` - Resource to read
    /// * `offset` - Offset inside the resource
    /// * `buf` - Destination
    fn read_resource(&mut self, resource: Resource, offset: u32, buf: &mut [u8])
        -> VbootResult<()>;

    /// Persist the NV register set
    fn commit_nvdata(&mut self, nvdata: &[u8; NV_DATA_SIZE]) -> VbootResult<()>;
}

/// Firmware Environment
pub struct FwEnv<H: FwHost, T: Tlcl> {
    /// Platform services
    pub host: H,

    /// Anti-rollback store
    pub rollback: RollbackStore<T>,
}

impl<H: FwHost, T: Tlcl> FwEnv<H, T> {
    pub fn new(host: H, tpm: T) -> Self {
        Self {
            host,
            rollback: RollbackStore::new(tpm),
        }
    }
}
