//! The `record-txs` command body and the table of nitro tx subcommands.

use std::io::Write;

use log::info;
use thiserror::Error;

use crate::account::{Account, AccountRetriever};
use crate::broadcast::{factory_for, generate_or_broadcast, BroadcastError, BroadcastOutcome, Broadcaster};
use crate::builder::{ErrorKind, RecordRequestBuilder, ValidationError};
use crate::context::ClientContext;

pub const MODULE_NAME: &str = "nitro";
pub const RECORD_TXS: &str = "record-txs";

/// Module name and its tx subcommands. The CLI command tree is built to match this table.
pub fn tx_commands() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![(MODULE_NAME, vec![RECORD_TXS])]
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unable to get account {address}: {source}")]
    Account { address: String, source: BroadcastError },
    #[error("unable to broadcast transaction: {0}")]
    Broadcast(BroadcastError),
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Validation(e) => e.kind(),
            CommandError::Account { .. } | CommandError::Broadcast(_) => ErrorKind::Upstream,
        }
    }
}

/// Validates `args` (`<slot> <root> [tx...]`) into a record request from the context signer,
/// then generates or broadcasts it. Nothing touches the network unless validation passed.
pub async fn record_txs<S, A, B, W>(
    ctx: &ClientContext,
    args: &[S],
    accounts: &A,
    broadcaster: &B,
    out: &mut W,
) -> Result<BroadcastOutcome, CommandError>
where
    S: AsRef<str>,
    A: AccountRetriever,
    B: Broadcaster,
    W: Write,
{
    let msg = RecordRequestBuilder::new(ctx.from_address.clone()).build(args)?;
    info!("recording {} tx(s) for slot {} from {}", msg.transactions.len(), msg.slot, msg.sender);

    let account = match ctx.account {
        Some(account) => account,
        // Unsigned output has no use for a sequence, so stay offline
        None if ctx.generate_only => Account::default(),
        None => accounts
            .account(&ctx.from_address)
            .await
            .map_err(|source| CommandError::Account { address: ctx.from_address.clone(), source })?,
    };

    let factory = factory_for(ctx, account);
    generate_or_broadcast(ctx, &factory, msg, broadcaster, out).await.map_err(CommandError::Broadcast)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::account::FixedAccount;
    use crate::broadcast::BroadcastResult;
    use crate::msg::Slot;
    use crate::pki::keypair_from_hex;
    use crate::tx::SignedTx;

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<SignedTx>>,
    }

    impl Broadcaster for Recorder {
        async fn broadcast(&self, tx: &SignedTx) -> Result<BroadcastResult, BroadcastError> {
            self.sent.borrow_mut().push(tx.clone());
            Ok(BroadcastResult { tx_hash: tx.hash_hex(), code: 0, raw_log: String::new(), mode: Default::default() })
        }
    }

    struct Unreachable;

    impl AccountRetriever for Unreachable {
        async fn account(&self, _address: &str) -> Result<Account, BroadcastError> {
            Err(BroadcastError::Timeout { node: "nowhere".to_string(), attempts: 1 })
        }
    }

    fn ctx() -> ClientContext {
        ClientContext::new(keypair_from_hex(&"5a".repeat(32)).unwrap())
    }

    fn args(slot: &str, root: &str, txs: &[&str]) -> Vec<String> {
        let mut v = vec![slot.to_string(), root.to_string()];
        v.extend(txs.iter().map(|s| s.to_string()));
        v
    }

    #[test]
    fn registry_lists_record_txs() {
        assert_eq!(tx_commands(), vec![("nitro", vec!["record-txs"])]);
    }

    #[tokio::test]
    async fn broadcasts_signed_request() {
        let ctx = ctx();
        let recorder = Recorder::default();
        let accounts = FixedAccount(Account { account_number: 2, sequence: 5 });
        let mut out = Vec::<u8>::new();
        let outcome = record_txs(&ctx, &args("42", &"a".repeat(64), &["ff", "00ab"]), &accounts, &recorder, &mut out).await.unwrap();

        let sent = recorder.sent.borrow();
        assert_eq!(sent.len(), 1);
        let tx = &sent[0];
        assert!(tx.verify());
        assert_eq!(tx.tx.body.msg.slot, Slot(42));
        assert_eq!(tx.tx.body.msg.sender, ctx.from_address);
        assert_eq!(tx.tx.auth_info.sequence, 5);
        let txs: Vec<&str> = tx.tx.body.msg.transactions.iter().map(|t| t.as_str()).collect();
        assert_eq!(txs, vec!["ff", "00ab"]);

        match outcome {
            BroadcastOutcome::Broadcast(result) => assert_eq!(result.tx_hash, tx.hash_hex()),
            other => panic!("expected broadcast, got {other:?}"),
        }
        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["code"], 0);
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_collaborators() {
        let ctx = ctx();
        let recorder = Recorder::default();
        let mut out = Vec::<u8>::new();
        let cases = [
            (args("42", &"a".repeat(63), &[]), ErrorKind::Format),
            (args("-1", &"a".repeat(64), &[]), ErrorKind::Argument),
            (args("42", &"a".repeat(64), &["zz"]), ErrorKind::Format),
            (vec!["42".to_string()], ErrorKind::Argument),
        ];
        for (input, kind) in cases {
            let err = record_txs(&ctx, &input, &Unreachable, &recorder, &mut out).await.unwrap_err();
            assert_eq!(err.kind(), kind, "{input:?}");
        }
        assert!(recorder.sent.borrow().is_empty());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn account_failure_is_upstream() {
        let ctx = ctx();
        let err = record_txs(&ctx, &args("1", &"0".repeat(64), &[]), &Unreachable, &Recorder::default(), &mut Vec::<u8>::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(err.to_string().starts_with("unable to get account"));
    }

    #[tokio::test]
    async fn offline_account_skips_retriever() {
        let mut ctx = ctx();
        ctx.account = Some(Account { account_number: 7, sequence: 8 });
        let recorder = Recorder::default();
        record_txs(&ctx, &args("1", &"0".repeat(64), &[]), &Unreachable, &recorder, &mut Vec::<u8>::new()).await.unwrap();
        assert_eq!(recorder.sent.borrow()[0].tx.account_number, 7);
    }

    #[tokio::test]
    async fn generate_only_prints_unsigned_and_stays_offline() {
        let mut ctx = ctx();
        ctx.generate_only = true;
        let recorder = Recorder::default();
        let mut out = Vec::<u8>::new();
        let outcome = record_txs(&ctx, &args("3", &"B".repeat(64), &["01"]), &Unreachable, &recorder, &mut out).await.unwrap();
        assert!(matches!(outcome, BroadcastOutcome::Generated(_)));
        assert!(recorder.sent.borrow().is_empty());

        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["body"]["msg"]["slot"], 3);
        assert_eq!(printed["body"]["msg"]["root"], "B".repeat(64));
        assert_eq!(printed["body"]["msg"]["transactions"][0], "01");
        assert_eq!(printed["body"]["type_url"], "/nitro.MsgRecordTransactionData");
    }
}
