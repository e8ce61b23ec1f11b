//! 流水线各接缝的内存替身，仅供单元测试使用。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

use super::assembler::AssembledLeg;
use super::signer::SignedTransaction;
use crate::api::{
    BuildRequest, FeeSource, PriorityFeeTiers, QuoteRequest, QuoteSource, ServiceError,
    SwapBuilder, SwapQuote,
};
use crate::ledger::{
    Commitment, LedgerError, LedgerRpc, Settlement, SignatureObservation, encode_transaction_blob,
};
use crate::network::ApiMeter;

#[derive(Debug, Clone)]
pub(crate) enum SendOutcome {
    Accept,
    Ambiguous,
    Reject(String),
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, Vec<u8>>,
    send_script: VecDeque<SendOutcome>,
    sent: Vec<VersionedTransaction>,
    /// 按首次提交顺序排列的不同签名。
    submitted: Vec<Signature>,
    status_by_signature: HashMap<Signature, VecDeque<SignatureObservation>>,
    status_by_submission: HashMap<usize, VecDeque<SignatureObservation>>,
    settlement: Option<Settlement>,
}

/// 脚本化账本：发送结果按顺序消费，脚本耗尽后一律接受；
/// 已提交的签名默认以 `Landed` 返回，未提交的为 `NotFound`。
#[derive(Default)]
pub(crate) struct FakeLedger {
    state: Mutex<LedgerState>,
    account_reads: AtomicUsize,
    status_calls: AtomicUsize,
    hang_status: AtomicBool,
}

impl FakeLedger {
    pub(crate) fn put_account(&self, address: Pubkey, data: Vec<u8>) {
        self.state.lock().accounts.insert(address, data);
    }

    pub(crate) fn account_reads(&self) -> usize {
        self.account_reads.load(Ordering::SeqCst)
    }

    pub(crate) fn script_sends(&self, outcomes: impl IntoIterator<Item = SendOutcome>) {
        self.state.lock().send_script.extend(outcomes);
    }

    pub(crate) fn sent(&self) -> Vec<VersionedTransaction> {
        self.state.lock().sent.clone()
    }

    /// 最后一个观察结果会被重复返回。
    pub(crate) fn script_status(
        &self,
        signature: Signature,
        observations: impl IntoIterator<Item = SignatureObservation>,
    ) {
        self.state
            .lock()
            .status_by_signature
            .insert(signature, observations.into_iter().collect());
    }

    /// 按提交顺序（从 0 开始）为第 `submission` 笔不同交易编排状态。
    pub(crate) fn script_submission_status(
        &self,
        submission: usize,
        observations: impl IntoIterator<Item = SignatureObservation>,
    ) {
        self.state
            .lock()
            .status_by_submission
            .insert(submission, observations.into_iter().collect());
    }

    pub(crate) fn hang_status_queries(&self) {
        self.hang_status.store(true, Ordering::SeqCst);
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_settlement(&self, settlement: Settlement) {
        self.state.lock().settlement = Some(settlement);
    }
}

fn next_observation(queue: &mut VecDeque<SignatureObservation>) -> Option<SignatureObservation> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, LedgerError> {
        let mut state = self.state.lock();
        state.sent.push(tx.clone());
        let signature = tx.signatures.first().copied().unwrap_or_default();
        if !state.submitted.contains(&signature) {
            state.submitted.push(signature);
        }
        match state.send_script.pop_front().unwrap_or(SendOutcome::Accept) {
            SendOutcome::Accept => Ok(signature),
            SendOutcome::Ambiguous => Err(LedgerError::Ambiguous("operation timed out".to_string())),
            SendOutcome::Reject(message) => Err(LedgerError::Rejected(message)),
        }
    }

    async fn signature_status(
        &self,
        signature: &Signature,
        _commitment: Commitment,
    ) -> Result<SignatureObservation, LedgerError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_status.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock();
        if let Some(observation) = state
            .status_by_signature
            .get_mut(signature)
            .and_then(next_observation)
        {
            return Ok(observation);
        }
        let Some(submission) = state.submitted.iter().position(|sent| sent == signature) else {
            return Ok(SignatureObservation::NotFound);
        };
        if let Some(observation) = state
            .status_by_submission
            .get_mut(&submission)
            .and_then(next_observation)
        {
            return Ok(observation);
        }
        Ok(SignatureObservation::Landed {
            slot: 1_000 + submission as u64,
        })
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        self.account_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().accounts.get(address).cloned())
    }

    async fn settlement(
        &self,
        _signature: &Signature,
        _owner: &Pubkey,
        _output_mint: &Pubkey,
        _native_output: bool,
    ) -> Result<Settlement, LedgerError> {
        self.state
            .lock()
            .settlement
            .ok_or_else(|| LedgerError::Unavailable("no settlement scripted".to_string()))
    }
}

type BlobFactory = Box<dyn Fn() -> Vec<String> + Send + Sync>;

/// 返回预设交易块，并记录收到的构建请求。
pub(crate) struct FakeBuilder {
    blobs: BlobFactory,
    requests: Mutex<Vec<BuildRequest>>,
}

impl FakeBuilder {
    pub(crate) fn with_blobs(blobs: Vec<String>) -> Self {
        Self::from_factory(Box::new(move || blobs.clone()))
    }

    /// 每次构建都生成新的 blockhash，模拟互不相关的并发交易。
    pub(crate) fn fresh(payer: Pubkey, legs: usize) -> Self {
        Self::from_factory(Box::new(move || {
            (0..legs).map(|_| unsigned_blob(&payer, &[])).collect()
        }))
    }

    fn from_factory(blobs: BlobFactory) -> Self {
        Self {
            blobs,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SwapBuilder for FakeBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<Vec<String>, ServiceError> {
        self.requests.lock().push(request.clone());
        Ok((self.blobs)())
    }
}

pub(crate) struct FakeQuotes {
    raw: Value,
    meter: Option<Arc<ApiMeter>>,
    requests: Mutex<Vec<QuoteRequest>>,
}

impl FakeQuotes {
    pub(crate) fn new(raw: Value) -> Self {
        Self {
            raw,
            meter: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn metered(mut self, meter: Arc<ApiMeter>) -> Self {
        self.meter = Some(meter);
        self
    }

    pub(crate) fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote, ServiceError> {
        if let Some(meter) = &self.meter {
            meter.acquire("quote")?;
        }
        self.requests.lock().push(request.clone());
        SwapQuote::try_from_value(self.raw.clone())
            .map_err(|err| ServiceError::schema("quote", err.to_string()))
    }
}

pub(crate) struct FakeFees {
    tiers: PriorityFeeTiers,
    meter: Option<Arc<ApiMeter>>,
    calls: AtomicUsize,
}

impl FakeFees {
    pub(crate) fn new(tiers: PriorityFeeTiers) -> Self {
        Self {
            tiers,
            meter: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn metered(mut self, meter: Arc<ApiMeter>) -> Self {
        self.meter = Some(meter);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeeSource for FakeFees {
    async fn priority_fees(&self) -> Result<PriorityFeeTiers, ServiceError> {
        if let Some(meter) = &self.meter {
            meter.acquire("fees")?;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tiers)
    }
}

pub(crate) fn sample_quote_value() -> Value {
    json!({
        "inAmount": "1500000000",
        "outAmount": "231450000",
        "priceImpactPct": "0.0012",
        "slippageBps": 100,
        "routePlan": [{"label": "pool-a"}]
    })
}

pub(crate) fn sample_quote() -> SwapQuote {
    SwapQuote::try_from_value(sample_quote_value()).expect("sample quote")
}

fn unsigned_transaction(payer: &Pubkey, extra_signers: &[Pubkey]) -> VersionedTransaction {
    let mut accounts = vec![AccountMeta::new(*payer, true)];
    accounts.extend(
        extra_signers
            .iter()
            .map(|signer| AccountMeta::new_readonly(*signer, true)),
    );
    let instruction = Instruction::new_with_bytes(Pubkey::new_unique(), &[1], accounts);
    let message = Message::new_with_blockhash(&[instruction], Some(payer), &Hash::new_unique());
    let required = usize::from(message.header.num_required_signatures);
    VersionedTransaction {
        signatures: vec![Signature::default(); required],
        message: VersionedMessage::Legacy(message),
    }
}

/// 构建服务风格的 base64 交易块；每次调用使用不同的 blockhash。
pub(crate) fn unsigned_blob(payer: &Pubkey, extra_signers: &[Pubkey]) -> String {
    encode_transaction_blob(&unsigned_transaction(payer, extra_signers)).expect("encode blob")
}

pub(crate) fn unsigned_leg(index: usize, payer: &Pubkey, extra_signers: &[Pubkey]) -> AssembledLeg {
    AssembledLeg {
        index,
        transaction: unsigned_transaction(payer, extra_signers),
    }
}

pub(crate) fn signed_leg(index: usize) -> SignedTransaction {
    let keypair = Keypair::new();
    let mut transaction = unsigned_transaction(&keypair.pubkey(), &[]);
    transaction.signatures[0] = keypair.sign_message(&transaction.message.serialize());
    SignedTransaction {
        leg: index,
        signature: transaction.signatures[0],
        transaction,
    }
}
