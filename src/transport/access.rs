//! ACCESS_REG command envelope.
//!
//! ```text
//! inbox:  ┌────────┬─────┬──────────┬────────┬──────────┬─────────────┬──────────┬─────────────────┐
//!         │ opcode │ uid │ reserved │ op_mod │ reserved │ register_id │ argument │ register data…  │
//!         │ 16     │ 16  │ 16       │ 16     │ 16       │ 16          │ 32       │                 │
//!         └────────┴─────┴──────────┴────────┴──────────┴─────────────┴──────────┴─────────────────┘
//! outbox: ┌────────┬──────────┬──────────┬──────────┬─────────────────┐
//!         │ status │ reserved │ syndrome │ reserved │ register data…  │
//!         │ 8      │ 24       │ 32       │ 64       │                 │
//!         └────────┴──────────┴──────────┴──────────┴─────────────────┘
//! ```
//!
//! A non-zero status in the outbox is a firmware failure and becomes
//! [`TransportError::Firmware`].

use bytes::Bytes;

use super::Transport;
use crate::error::TransportError;
use crate::layout::prm::{access_register_in as inbox, access_register_out as outbox, MLX5_CMD_OP_ACCESS_REG};
use crate::layout::{self, addr_of, addr_of_mut};

/// Direction of a register access, encoded in `op_mod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOp {
    Write = 0,
    Read = 1,
}

/// Execute one ACCESS_REG command and return the register data of the reply.
///
/// The reply register is the same size as `data`.
pub fn access_register<T: Transport + ?Sized>(
    transport: &mut T,
    op: RegisterOp,
    register_id: u16,
    argument: u32,
    data: &[u8],
) -> Result<Bytes, TransportError> {
    let inlen = inbox::LAYOUT.size_bytes() + data.len();
    let outlen = outbox::LAYOUT.size_bytes() + data.len();
    let max = transport.max_rpc_size();
    if inlen.max(outlen) > max {
        return Err(TransportError::Oversize {
            len: inlen.max(outlen),
            max,
        });
    }

    let mut request = vec![0u8; inlen];
    layout::set(&inbox::LAYOUT, &inbox::OPCODE, &mut request, MLX5_CMD_OP_ACCESS_REG as u64);
    layout::set(&inbox::LAYOUT, &inbox::OP_MOD, &mut request, op as u64);
    layout::set(&inbox::LAYOUT, &inbox::ARGUMENT, &mut request, argument as u64);
    layout::set(&inbox::LAYOUT, &inbox::REGISTER_ID, &mut request, register_id as u64);
    addr_of_mut(&inbox::LAYOUT, &inbox::REGISTER_DATA, &mut request).copy_from_slice(data);

    tracing::trace!(
        "accessing register {:#x} op {:?} argument {:#x}",
        register_id,
        op,
        argument
    );

    let response = transport.rpc(&request, outlen)?;
    if response.len() < outlen {
        return Err(TransportError::ShortResponse {
            expected: outlen,
            actual: response.len(),
        });
    }

    let status = layout::get(&outbox::LAYOUT, &outbox::STATUS, &response) as u8;
    if status != 0 {
        let syndrome = layout::get(&outbox::LAYOUT, &outbox::SYNDROME, &response) as u32;
        return Err(TransportError::Firmware { status, syndrome });
    }

    Ok(Bytes::from(response).slice(outbox::LAYOUT.size_bytes()..outlen))
}

/// Decoded view of an ACCESS_REG inbox.
///
/// Lets firmware emulators (and tests) answer requests built by
/// [`access_register`].
#[derive(Debug, Clone, Copy)]
pub struct InboxView<'a> {
    pub opcode: u16,
    pub op_mod: u16,
    pub register_id: u16,
    pub argument: u32,
    pub register_data: &'a [u8],
}

impl<'a> InboxView<'a> {
    /// Decode an inbox; `None` if it is shorter than the command header.
    pub fn decode(request: &'a [u8]) -> Option<Self> {
        if request.len() < inbox::LAYOUT.size_bytes() {
            return None;
        }
        Some(Self {
            opcode: layout::get(&inbox::LAYOUT, &inbox::OPCODE, request) as u16,
            op_mod: layout::get(&inbox::LAYOUT, &inbox::OP_MOD, request) as u16,
            register_id: layout::get(&inbox::LAYOUT, &inbox::REGISTER_ID, request) as u16,
            argument: layout::get(&inbox::LAYOUT, &inbox::ARGUMENT, request) as u32,
            register_data: addr_of(&inbox::LAYOUT, &inbox::REGISTER_DATA, request),
        })
    }
}

/// Build an ACCESS_REG outbox carrying `register_data`.
pub fn build_outbox(status: u8, syndrome: u32, register_data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; outbox::LAYOUT.size_bytes() + register_data.len()];
    layout::set(&outbox::LAYOUT, &outbox::STATUS, &mut out, status as u64);
    layout::set(&outbox::LAYOUT, &outbox::SYNDROME, &mut out, syndrome as u64);
    addr_of_mut(&outbox::LAYOUT, &outbox::REGISTER_DATA, &mut out).copy_from_slice(register_data);
    out
}
