/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains the top level dispatch of the firmware phase flows.

--*/

mod phase1;
mod phase2;
mod phase3;

use crate::context::{BootState, VbootContext};
use crate::fw_env::{FwEnv, FwHost};
use vboot_drivers::{Tlcl, VbootError, VbootResult};

/// Execute the flow for the context's current phase and advance the state
///
/// # Arguments
///
/// * `ctx` - Boot context
/// * `env` - Firmware Environment
pub(crate) fn run_phase<H: FwHost, T: Tlcl>(
    ctx: &mut VbootContext,
    env: &mut FwEnv<H, T>,
) -> VbootResult<()> {
    match ctx.state {
        BootState::Phase1 => {
            let result = phase1::Phase1Flow::run(ctx, env);
            ctx.state = match result {
                Ok(()) => BootState::Phase2,
                Err(VbootError::API_PHASE1_SECDATA_REBOOT) => BootState::Reboot,
                Err(_) => BootState::Recovery(ctx.sd.recovery_reason),
            };
            result
        }

        BootState::Phase2 => {
            let result = phase2::Phase2Flow::run(ctx, env);
            ctx.state = match result {
                Ok(()) => BootState::Phase3,
                Err(_) => BootState::Recovery(ctx.sd.fail_reason),
            };
            result
        }

        BootState::Phase3 => {
            let result = phase3::Phase3Flow::run(ctx, env);
            ctx.state = match result {
                Ok(()) => BootState::HashCheck,
                Err(_) => BootState::Recovery(ctx.sd.fail_reason),
            };
            result
        }

        _ => Err(VbootError::API_PHASE_ORDER),
    }
}
