// Licensed under the Apache-2.0 license
#![allow(dead_code)]

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use vboot_drivers::{
    FirmwareFlags, FwSlot, HashAlgorithm, HwCrypto, NvField, NvStorage, RollbackSpaceFirmware,
    RollbackSpaceKernel, RollbackStore, Tlcl, VbootError, VbootResult, NV_DATA_SIZE,
    ROLLBACK_SPACE_KERNEL_UID, WORKBUF_RECOMMENDED_SIZE,
};
use vboot_fw::{
    check_hash, commit_data, extend_hash, fw_phase1, fw_phase2, fw_phase3, get_fw_boot_info,
    init_hash, BootState, ContextFlags, FwBootInfo, FwEnv, FwHost, HashTag, Resource,
    VbootContext,
};
use vboot_image_types::*;
use vboot_image_verify::{ImageVerificationEnv, PublicKey};
use zerocopy::{FromZeros, IntoBytes};

/// RSA-2048 with SHA-256
pub const ALGORITHM: u32 = 4;
pub const SIG_SIZE: usize = 256;
pub const KEY_DATA_SIZE: usize = 8 + 2 * SIG_SIZE;

pub const ROOT_KEY_ID: u8 = 0x11;
pub const DATA_KEY_ID: u8 = 0x22;
pub const SUBKEY_ID: u8 = 0x33;

pub const HWID_DIGEST: [u8; GBB_HWID_DIGEST_SIZE] = [0x48; GBB_HWID_DIGEST_SIZE];

/// Key data whose modulus is filled with `id`
pub fn key_data(id: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(KEY_DATA_SIZE);
    buf.extend_from_slice(&((SIG_SIZE / 4) as u32).to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.resize(KEY_DATA_SIZE, id);
    buf
}

fn fill_packed_key(pk: &mut PackedKey, key_offset: usize, version: u32) {
    pk.set_key_offset(key_offset as u32);
    pk.set_key_size(KEY_DATA_SIZE as u32);
    pk.set_algorithm(ALGORITHM);
    pk.set_key_version(version);
}

pub fn packed_key(id: u8, version: u32) -> Vec<u8> {
    let mut pk = PackedKey::default();
    fill_packed_key(&mut pk, PACKED_KEY_SIZE, version);
    let mut buf = pk.as_bytes().to_vec();
    buf.extend_from_slice(&key_data(id));
    buf
}

/// Mock signature: SHA-256 digest of `data`, then the signer id
pub fn sign(id: u8, data: &[u8]) -> Vec<u8> {
    let mut sig = Sha256::digest(data).to_vec();
    sig.push(id);
    sig.resize(SIG_SIZE, 0);
    sig
}

pub fn build_keyblock(signer: u8, data_key: u8, key_version: u32) -> Vec<u8> {
    let signed_size = KEYBLOCK_SIZE + KEY_DATA_SIZE;

    let mut kb = Keyblock::default();
    kb.set_magic(KEYBLOCK_MAGIC);
    kb.set_header_version_major(KEYBLOCK_VERSION_MAJOR);
    kb.set_header_version_minor(KEYBLOCK_VERSION_MINOR);
    kb.set_keyblock_size((signed_size + SIG_SIZE) as u32);
    kb.set_keyblock_flags((KeyblockFlags::DEVELOPER_0 | KeyblockFlags::DEVELOPER_1).bits());

    let sig = kb.keyblock_signature_mut();
    sig.set_sig_offset((signed_size - Keyblock::signature_offset()) as u32);
    sig.set_sig_size(SIG_SIZE as u32);
    sig.set_data_size(signed_size as u32);

    fill_packed_key(
        kb.data_key_mut(),
        KEYBLOCK_SIZE - Keyblock::data_key_range().start,
        key_version,
    );

    let mut buf = kb.as_bytes().to_vec();
    buf.extend_from_slice(&key_data(data_key));
    let sig = sign(signer, &buf);
    buf.extend_from_slice(&sig);
    buf
}

/// How the firmware body is authenticated by the preamble
pub enum BodyAuth<'a> {
    /// Body signature by the data key
    Signed(&'a [u8]),
    /// Embedded SHA-256 of the body
    Metadata(&'a [u8]),
}

pub fn build_preamble(signer: u8, firmware_version: u32, body: BodyAuth) -> Vec<u8> {
    let (body_sig, body_size) = match body {
        BodyAuth::Signed(body) => (sign(signer, body), body.len() as u32),
        BodyAuth::Metadata(body) => {
            let mut hash = vec![0u8, 0, 0, HashAlgorithm::Sha256 as u8];
            hash.extend_from_slice(&Sha256::digest(body));
            (hash, 0)
        }
    };

    let subkey_offset = FW_PREAMBLE_SIZE;
    let body_sig_offset = subkey_offset + KEY_DATA_SIZE;
    let signed_size = body_sig_offset + body_sig.len();

    let mut pre = FwPreamble::default();
    pre.set_preamble_size((signed_size + SIG_SIZE) as u32);
    pre.set_header_version_major(FIRMWARE_PREAMBLE_VERSION_MAJOR);
    pre.set_header_version_minor(FIRMWARE_PREAMBLE_VERSION_MINOR);
    pre.set_firmware_version(firmware_version);

    let sig = pre.preamble_signature_mut();
    sig.set_sig_offset((signed_size - FwPreamble::signature_offset()) as u32);
    sig.set_sig_size(SIG_SIZE as u32);
    sig.set_data_size(signed_size as u32);

    fill_packed_key(
        pre.kernel_subkey_mut(),
        subkey_offset - FwPreamble::kernel_subkey_offset(),
        1,
    );

    let sig = pre.body_signature_mut();
    sig.set_sig_offset((body_sig_offset - FwPreamble::body_signature_offset()) as u32);
    sig.set_sig_size(body_sig.len() as u32);
    sig.set_data_size(body_size);

    let mut buf = pre.as_bytes().to_vec();
    buf.extend_from_slice(&key_data(SUBKEY_ID));
    buf.extend_from_slice(&body_sig);
    let sig = sign(signer, &buf);
    buf.extend_from_slice(&sig);
    buf
}

/// Firmware slot contents
#[derive(Clone)]
pub struct SlotImage {
    pub vblock: Vec<u8>,
    pub body: Vec<u8>,
}

impl SlotImage {
    pub fn signed(key_version: u32, firmware_version: u32, body: &[u8]) -> Self {
        let mut vblock = build_keyblock(ROOT_KEY_ID, DATA_KEY_ID, key_version);
        vblock.extend(build_preamble(
            DATA_KEY_ID,
            firmware_version,
            BodyAuth::Signed(body),
        ));
        Self {
            vblock,
            body: body.to_vec(),
        }
    }

    pub fn metadata(key_version: u32, firmware_version: u32, body: &[u8]) -> Self {
        let mut vblock = build_keyblock(ROOT_KEY_ID, DATA_KEY_ID, key_version);
        vblock.extend(build_preamble(
            DATA_KEY_ID,
            firmware_version,
            BodyAuth::Metadata(body),
        ));
        Self {
            vblock,
            body: body.to_vec(),
        }
    }

    /// Keyblock signed by a key the GBB does not hold
    pub fn foreign(body: &[u8]) -> Self {
        let mut vblock = build_keyblock(0x77, DATA_KEY_ID, 1);
        vblock.extend(build_preamble(DATA_KEY_ID, 1, BodyAuth::Signed(body)));
        Self {
            vblock,
            body: body.to_vec(),
        }
    }
}

pub fn build_gbb(flags: GbbFlags) -> Vec<u8> {
    let root = packed_key(ROOT_KEY_ID, 1);
    let mut gbb = GbbHeader::default();
    gbb.set_signature(GBB_SIGNATURE);
    gbb.set_major_version(GBB_MAJOR_VER);
    gbb.set_minor_version(GBB_MINOR_VER);
    gbb.set_header_size(GBB_HEADER_SIZE as u32);
    gbb.set_flags(flags.bits());
    gbb.set_rootkey_offset(GBB_HEADER_SIZE as u32);
    gbb.set_rootkey_size(root.len() as u32);
    gbb.set_hwid_digest(HWID_DIGEST);

    let mut buf = gbb.as_bytes().to_vec();
    buf.extend_from_slice(&root);
    buf
}

/// NV data as a clean boot would find it
pub fn clean_nvdata(setup: impl FnOnce(&mut NvStorage)) -> [u8; NV_DATA_SIZE] {
    let mut nv = NvStorage::new(&[0u8; NV_DATA_SIZE]);
    nv.set(NvField::FirmwareSettingsReset, 0);
    nv.set(NvField::KernelSettingsReset, 0);
    setup(&mut nv);
    *nv.raw()
}

/// Simulated platform
pub struct MockHost {
    pub gbb: Vec<u8>,
    pub slots: [SlotImage; 2],
    pub nvdata: [u8; NV_DATA_SIZE],
    pub nv_commits: usize,
    pub rsa_calls: usize,
    pub hw_supported: bool,
    pub hw_inits: usize,
    pub hw_bytes: usize,
    hw_state: Option<Sha256>,
}

impl MockHost {
    pub fn new(gbb_flags: GbbFlags, slot_a: SlotImage, slot_b: SlotImage) -> Self {
        Self {
            gbb: build_gbb(gbb_flags),
            slots: [slot_a, slot_b],
            nvdata: clean_nvdata(|_| {}),
            nv_commits: 0,
            rsa_calls: 0,
            hw_supported: false,
            hw_inits: 0,
            hw_bytes: 0,
            hw_state: None,
        }
    }

    pub fn nv(&self) -> NvStorage {
        NvStorage::new(&self.nvdata)
    }

    pub fn update_nv(&mut self, f: impl FnOnce(&mut NvStorage)) {
        let mut nv = NvStorage::new(&self.nvdata);
        f(&mut nv);
        self.nvdata = *nv.raw();
    }

    pub fn body(&self, slot: FwSlot) -> &[u8] {
        &self.slots[slot as usize].body
    }
}

impl ImageVerificationEnv for MockHost {
    fn rsa_verify_digest(
        &mut self,
        key: &PublicKey,
        sig: &[u8],
        digest: &[u8],
    ) -> VbootResult<bool> {
        self.rsa_calls += 1;
        Ok(sig.len() > digest.len()
            && sig[..digest.len()] == *digest
            && Some(&sig[digest.len()]) == key.n.first())
    }
}

impl HwCrypto for MockHost {
    fn hwcrypto_digest_init(&mut self, alg: HashAlgorithm, _data_size: u32) -> VbootResult<()> {
        if !self.hw_supported || alg != HashAlgorithm::Sha256 {
            return Err(VbootError::EX_HWCRYPTO_UNSUPPORTED);
        }
        self.hw_inits += 1;
        self.hw_state = Some(Sha256::new());
        Ok(())
    }

    fn hwcrypto_digest_extend(&mut self, buf: &[u8]) -> VbootResult<()> {
        let state = self
            .hw_state
            .as_mut()
            .ok_or(VbootError::EX_HWCRYPTO_UNSUPPORTED)?;
        state.update(buf);
        self.hw_bytes += buf.len();
        Ok(())
    }

    fn hwcrypto_digest_finalize(&mut self, digest: &mut [u8]) -> VbootResult<()> {
        let state = self
            .hw_state
            .take()
            .ok_or(VbootError::EX_HWCRYPTO_UNSUPPORTED)?;
        digest[..32].copy_from_slice(&state.finalize());
        Ok(())
    }
}

impl FwHost for MockHost {
    fn read_resource(
        &mut self,
        resource: Resource,
        offset: u32,
        buf: &mut [u8],
    ) -> VbootResult<()> {
        let data = match resource {
            Resource::Gbb => &self.gbb,
            Resource::FwVblock(slot) => &self.slots[slot as usize].vblock,
        };
        let start = offset as usize;
        let src = data
            .get(start..start + buf.len())
            .ok_or(VbootError::EX_READ_RESOURCE_SIZE)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn commit_nvdata(&mut self, nvdata: &[u8; NV_DATA_SIZE]) -> VbootResult<()> {
        self.nvdata = *nvdata;
        self.nv_commits += 1;
        Ok(())
    }
}

/// Simulated TPM with NV spaces and fault injection
#[derive(Default)]
pub struct MockTpm {
    pub spaces: HashMap<u32, Vec<u8>>,
    pub write_limit_hits: u32,
    pub fail_clear: bool,
    pub writes: u32,
    pub clears: u32,
    pub pp_locks: u32,
}

impl MockTpm {
    /// TPM holding firmware and kernel spaces
    pub fn provisioned(fw_versions: u32, flags: FirmwareFlags) -> Self {
        let mut tpm = Self::default();
        {
            let mut store = RollbackStore::new(&mut tpm);

            let mut rsf = RollbackSpaceFirmware::new_zeroed();
            rsf.set_fw_versions(fw_versions);
            rsf.set_firmware_flags(flags);
            store.write_space_firmware(&mut rsf).unwrap();

            let mut rsk = RollbackSpaceKernel::new_zeroed();
            rsk.set_uid(ROLLBACK_SPACE_KERNEL_UID);
            rsk.set_kernel_versions(0x10001);
            store.write_space_kernel(&mut rsk).unwrap();
        }
        tpm.writes = 0;
        tpm
    }

    /// Decoded firmware space
    pub fn firmware_space(&mut self) -> RollbackSpaceFirmware {
        RollbackStore::new(self).read_space_firmware().unwrap()
    }
}

impl Tlcl for MockTpm {
    fn read(&mut self, index: u32, data: &mut [u8]) -> VbootResult<()> {
        let space = self.spaces.get(&index).ok_or(VbootError::TPM_E_BADINDEX)?;
        if space.len() < data.len() {
            return Err(VbootError::TPM_E_IOERROR);
        }
        data.copy_from_slice(&space[..data.len()]);
        Ok(())
    }

    fn write(&mut self, index: u32, data: &[u8]) -> VbootResult<()> {
        self.writes += 1;
        if self.write_limit_hits > 0 {
            self.write_limit_hits -= 1;
            return Err(VbootError::TPM_E_MAXNVWRITES);
        }
        self.spaces.insert(index, data.to_vec());
        Ok(())
    }

    fn force_clear(&mut self) -> VbootResult<()> {
        if self.fail_clear {
            return Err(VbootError::TPM_E_IOERROR);
        }
        self.clears += 1;
        Ok(())
    }

    fn set_enable(&mut self) -> VbootResult<()> {
        Ok(())
    }

    fn set_deactivated(&mut self, _flag: bool) -> VbootResult<()> {
        Ok(())
    }

    fn lock_physical_presence(&mut self) -> VbootResult<()> {
        self.pp_locks += 1;
        Ok(())
    }

    fn assert_physical_presence(&mut self) -> VbootResult<()> {
        Ok(())
    }
}

pub type TestEnv = FwEnv<MockHost, MockTpm>;

/// Standard board: both slots signed with version 1.1
pub fn default_env() -> TestEnv {
    let body = body_bytes(0xa5, 3000);
    let slot = SlotImage::signed(1, 1, &body);
    FwEnv::new(
        MockHost::new(GbbFlags::empty(), slot.clone(), slot),
        MockTpm::provisioned(0x10001, FirmwareFlags::empty()),
    )
}

pub fn body_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

/// Outcome of one simulated boot
#[derive(Debug)]
pub struct BootReport {
    pub phase1: VbootResult<()>,
    pub phase2: Option<VbootResult<()>>,
    pub phase3: Option<VbootResult<()>>,
    pub check: Option<VbootResult<()>>,
    pub commit: VbootResult<()>,
    pub state: BootState,
    pub flags: ContextFlags,
    pub info: FwBootInfo,
    pub fw_slot: FwSlot,
    pub fw_version: u32,
}

/// Run every phase, hash the selected body in chunks and commit
pub fn run_boot(env: &mut TestEnv, flags: ContextFlags) -> BootReport {
    let mut workbuf = vec![0u8; WORKBUF_RECOMMENDED_SIZE];
    let nvdata = env.host.nvdata;
    let mut ctx = VbootContext::new(&mut workbuf, &nvdata, flags).unwrap();

    let phase1 = fw_phase1(&mut ctx, env);
    let phase2 = phase1.is_ok().then(|| fw_phase2(&mut ctx, env));
    let phase3 = matches!(phase2, Some(Ok(())))
        .then(|| fw_phase3(&mut ctx, env));

    let check = if matches!(phase3, Some(Ok(()))) {
        let body = env.host.body(ctx.shared_data().fw_slot).to_vec();
        Some(hash_body(&mut ctx, env, &body, 1000))
    } else {
        None
    };

    let commit = commit_data(&mut ctx, env);
    BootReport {
        phase1,
        phase2,
        phase3,
        check,
        commit,
        state: ctx.state(),
        flags: ctx.flags(),
        info: get_fw_boot_info(&ctx),
        fw_slot: ctx.shared_data().fw_slot,
        fw_version: ctx.shared_data().fw_version,
    }
}

/// Stream `body` through the body digest and check it
pub fn hash_body(
    ctx: &mut VbootContext,
    env: &mut TestEnv,
    body: &[u8],
    chunk: usize,
) -> VbootResult<()> {
    init_hash(ctx, env, HashTag::FwBody)?;
    for part in body.chunks(chunk) {
        extend_hash(ctx, env, part)?;
    }
    check_hash(ctx, env)
}
