//! Account number and sequence lookup for the signer.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::broadcast::{BroadcastError, NodeClient};
use crate::wire::FrameType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Account {
    pub account_number: u64,
    pub sequence: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AccountQuery {
    pub address: String,
}

/// Reply to an `AccountQuery` frame. `None` when the node has never seen the address.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AccountInfo {
    pub address: String,
    pub account: Option<Account>,
}

#[allow(async_fn_in_trait)]
pub trait AccountRetriever {
    async fn account(&self, address: &str) -> Result<Account, BroadcastError>;
}

/// Offline mode: `--account-number` and `--sequence` given on the command line.
#[derive(Clone, Copy, Debug)]
pub struct FixedAccount(pub Account);

impl AccountRetriever for FixedAccount {
    async fn account(&self, _address: &str) -> Result<Account, BroadcastError> {
        Ok(self.0)
    }
}

/// Asks the node over the datagram protocol.
#[derive(Clone, Debug)]
pub struct NodeAccountRetriever {
    client: NodeClient,
}

impl NodeAccountRetriever {
    pub fn new(client: NodeClient) -> Self {
        Self { client }
    }
}

impl AccountRetriever for NodeAccountRetriever {
    async fn account(&self, address: &str) -> Result<Account, BroadcastError> {
        let query = AccountQuery { address: address.to_string() };
        let payload = borsh::to_vec(&query).map_err(BroadcastError::Encode)?;
        let reply = self.client.request(FrameType::AccountQuery, payload, FrameType::AccountInfo).await?;
        let info: AccountInfo = borsh::from_slice(&reply.payload).map_err(BroadcastError::Encode)?;
        if info.address != address {
            return Err(BroadcastError::UnexpectedReply(format!("account info for {} while asking for {address}", info.address)));
        }
        info.account.ok_or_else(|| BroadcastError::AccountNotFound(address.to_string()))
    }
}
