/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Verified boot image verification library.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

mod key;
mod verifier;

use vboot_error::{VbootError, VbootResult};

pub use key::{crypto_algorithm, unpack_key, PublicKey, SigAlgorithm};
pub use verifier::{signature_data, verify_member_inside, ImageVerifier};

/// Image Verification Environment
pub trait ImageVerificationEnv {
    /// Verify an RSA signature over a digest
    ///
    /// Returns `Ok(false)` when the signature does not match. The padding
    /// and digest-info encoding follow `key.hash_alg`.
    fn rsa_verify_digest(&mut self, key: &PublicKey, sig: &[u8], digest: &[u8])
        -> VbootResult<bool>;
}

impl<T: ImageVerificationEnv + ?Sized> ImageVerificationEnv for &mut T {
    fn rsa_verify_digest(
        &mut self,
        key: &PublicKey,
        sig: &[u8],
        digest: &[u8],
    ) -> VbootResult<bool> {
        (**self).rsa_verify_digest(key, sig, digest)
    }
}
