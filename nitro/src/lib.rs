//! Client-side pieces for recording external-ledger slots on the nitro chain: request
//! validation, keys, transaction signing, the node wire format and the broadcast pipeline.

pub mod account;
pub mod broadcast;
pub mod builder;
pub mod command;
pub mod context;
pub mod msg;
pub mod pki;
pub mod tx;
pub mod wire;
