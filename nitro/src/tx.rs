//! Transaction factory: wraps a [`RecordRequest`] with fee/sequence data and signs it.

use borsh::{BorshDeserialize, BorshSerialize};
use log::debug;
use secp256k1::Keypair;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::account::Account;
use crate::builder::ValidationError;
use crate::msg::RecordRequest;
use crate::pki::{address_of, sign_message, to_message, verify_signature, PubKey, Sig};

pub const DEFAULT_GAS: u64 = 200_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxError {
    #[error("invalid message: {0}")]
    InvalidMsg(#[from] ValidationError),
    #[error("signer {signer} does not match message sender {sender}")]
    SignerMismatch { signer: String, sender: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Fee {
    pub amount: u64,
    pub gas_limit: u64,
}

impl Default for Fee {
    fn default() -> Self {
        Self { amount: 0, gas_limit: DEFAULT_GAS }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TxBody {
    pub type_url: String,
    pub msg: RecordRequest,
    pub memo: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AuthInfo {
    pub fee: Fee,
    pub sequence: u64,
}

/// What `--generate-only` prints: everything but the signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct UnsignedTx {
    pub chain_id: String,
    pub account_number: u64,
    pub body: TxBody,
    pub auth_info: AuthInfo,
}

#[derive(BorshSerialize)]
struct SignDoc<'a> {
    chain_id: &'a str,
    account_number: u64,
    body: &'a TxBody,
    auth_info: &'a AuthInfo,
}

impl UnsignedTx {
    fn sign_doc(&self) -> SignDoc<'_> {
        SignDoc { chain_id: &self.chain_id, account_number: self.account_number, body: &self.body, auth_info: &self.auth_info }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedTx {
    pub tx: UnsignedTx,
    pub pubkey: PubKey,
    pub signature: Sig,
}

impl SignedTx {
    pub fn encode(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("borsh serialization into a Vec does not fail")
    }

    pub fn decode(bytes: &[u8]) -> std::io::Result<Self> {
        borsh::from_slice(bytes)
    }

    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(self.encode()).into()
    }

    /// Upper-case hex of [`SignedTx::hash`].
    pub fn hash_hex(&self) -> String {
        faster_hex::hex_string(&self.hash()).to_uppercase()
    }

    /// Signature matches the sign doc and the key belongs to the message sender.
    pub fn verify(&self) -> bool {
        address_of(&self.pubkey) == self.tx.body.msg.sender
            && verify_signature(&self.pubkey, &to_message(&self.tx.sign_doc()), &self.signature)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxFactory {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub fee: Fee,
    pub memo: String,
}

impl TxFactory {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self { chain_id: chain_id.into(), account_number: 0, sequence: 0, fee: Fee::default(), memo: String::new() }
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account_number = account.account_number;
        self.sequence = account.sequence;
        self
    }

    pub fn with_fee(mut self, fee: Fee) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn build_unsigned(&self, msg: RecordRequest) -> Result<UnsignedTx, TxError> {
        msg.validate_basic()?;
        Ok(UnsignedTx {
            chain_id: self.chain_id.clone(),
            account_number: self.account_number,
            body: TxBody { type_url: RecordRequest::TYPE_URL.to_string(), msg, memo: self.memo.clone() },
            auth_info: AuthInfo { fee: self.fee.clone(), sequence: self.sequence },
        })
    }

    pub fn sign(&self, unsigned: UnsignedTx, keypair: &Keypair) -> Result<SignedTx, TxError> {
        let pubkey = PubKey(keypair.public_key());
        let signer = address_of(&pubkey);
        if signer != unsigned.body.msg.sender {
            return Err(TxError::SignerMismatch { signer, sender: unsigned.body.msg.sender.clone() });
        }
        let signature = sign_message(&keypair.secret_key(), &to_message(&unsigned.sign_doc()));
        let signed = SignedTx { tx: unsigned, pubkey, signature };
        debug!("signed tx {} (sequence {})", signed.hash_hex(), signed.tx.auth_info.sequence);
        Ok(signed)
    }

    pub fn build_and_sign(&self, msg: RecordRequest, keypair: &Keypair) -> Result<SignedTx, TxError> {
        let unsigned = self.build_unsigned(msg)?;
        self.sign(unsigned, keypair)
    }
}
