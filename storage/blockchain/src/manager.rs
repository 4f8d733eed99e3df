//! The chain manager (§4.4): main-chain storage, alternative chains,
//! orphan buffering, the block-validation pipeline, and reorg/switch. The
//! one component in this crate that owns mutable state directly rather
//! than behind a [`tower::Service`] — [`service`] wraps it in exactly the
//! same spawned-task pattern `cn-consensus-context` and `cn-txpool` use.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cn_constants::deposit::calculate_interest;
use cn_constants::Currency;
use cn_consensus_context::BlockchainContext;
use cn_consensus_rules::reward;
use cn_txpool::{ChainSpentView, RejectReason, TxPool};
use cn_types::{
    Amount, BlockTemplate, CachedBlock, CachedTransaction, Decode, Encode, Hash, KeyImage, RawBlock,
    Transaction, TransactionInput, TransactionOutput, TransactionTarget,
};
use thiserror::Error;

use crate::error::{AddResult, BlockError};
use crate::hasher::{hash_meets_difficulty, Hasher, SignatureVerifier};
use crate::outputs::{KeyOutputRecord, MultisigOutputRecord, OutputIndex};

/// A block living on the main chain, plus everything rollback needs to
/// undo it without re-deriving it from the raw bytes (§4.4 "Alternative
/// chain" switch / rollback).
#[derive(Debug, Clone)]
pub struct ChainCacheNode {
    pub cached_block: CachedBlock,
    /// Non-coinbase transactions, in block order.
    pub transactions: Vec<CachedTransaction>,
    pub cumulative_difficulty: u128,
    pub cumulative_coins: u64,
    pub cumulative_size: usize,
    /// Coins minted by this block alone (reward + matured deposit
    /// interest), i.e. the delta `push_block` applied to
    /// `already_generated_coins`.
    pub generated_coins: u64,
    key_images_spent: Vec<KeyImage>,
    multisig_refs_spent: Vec<(Amount, u32, u32)>,
    key_outputs_created: Vec<Amount>,
    multisig_outputs_created: Vec<(Amount, u32)>,
}

impl ChainCacheNode {
    pub fn block_hash(&self) -> Hash {
        self.cached_block.block_hash()
    }

    pub fn timestamp(&self) -> u64 {
        self.cached_block.template.timestamp
    }

    fn raw_block(&self) -> RawBlock {
        RawBlock {
            block_bytes: self.cached_block.template.to_bytes(),
            transactions_bytes: self.transactions.iter().map(|t| t.binary_array().to_vec()).collect(),
        }
    }
}

/// A block living on a branch that has not (yet) overtaken the main
/// chain's cumulative difficulty (§4.4 "Alternative chain").
#[derive(Debug, Clone)]
pub struct AltChainNode {
    pub cached_block: CachedBlock,
    pub transactions: Vec<CachedTransaction>,
    pub cumulative_difficulty: u128,
    pub cumulative_coins: u64,
    pub cumulative_size: usize,
    pub generated_coins: u64,
    pub parent_hash: Hash,
    pub height: u64,
}

#[derive(Debug, Error)]
pub enum PoolSubmitError {
    #[error(transparent)]
    Codec(#[from] cn_types::CodecError),
    #[error(transparent)]
    Rejected(#[from] RejectReason),
}

/// Borrows just the two spent-set fields the pool needs, so adding a
/// transaction doesn't require holding `&self` of the whole manager while
/// also borrowing `self.pool` mutably.
struct SpentSetsView<'a> {
    key_images: &'a HashSet<KeyImage>,
    multisig_refs: &'a HashSet<(Amount, u32, u32)>,
}

impl ChainSpentView for SpentSetsView<'_> {
    fn key_image_spent(&self, key_image: &KeyImage) -> bool {
        self.key_images.contains(key_image)
    }

    fn multisig_reference_spent(&self, reference: &(Amount, u32, u32)) -> bool {
        self.multisig_refs.contains(reference)
    }
}

/// The chain manager: owns the canonical chain, every alternative branch
/// still being tracked, the orphan-block buffer, the spent-output
/// indexes, and the mempool (§3 "Core owns the mempool directly"; §4.4,
/// §4.5).
pub struct BlockchainManager {
    currency: Currency,
    hasher: Arc<dyn Hasher>,
    verifier: Arc<dyn SignatureVerifier>,

    main: Vec<ChainCacheNode>,
    main_hash_to_height: HashMap<Hash, u64>,
    alt: HashMap<Hash, AltChainNode>,
    orphans: HashMap<Hash, Vec<RawBlock>>,

    spent_key_images: HashSet<KeyImage>,
    spent_multisig_refs: HashSet<(Amount, u32, u32)>,
    outputs: OutputIndex,

    context: BlockchainContext,
    pool: TxPool,
}

impl BlockchainManager {
    /// Builds a fresh chain from a genesis block. The genesis block
    /// skips almost all of the ordinary pipeline (§4.4: there is nothing
    /// to retarget against, no median to penalize reward by, and no
    /// previous-hash link to check) — only its claimed block index and
    /// coinbase shape matter.
    pub fn new(
        currency: Currency,
        hasher: Arc<dyn Hasher>,
        verifier: Arc<dyn SignatureVerifier>,
        genesis_raw: RawBlock,
        pool_params: cn_constants::mempool::MempoolParams,
    ) -> Result<Self, BlockError> {
        let template = BlockTemplate::from_bytes(&genesis_raw.block_bytes)?;
        let hash_fn = |b: &[u8]| hasher.fast_hash(b);
        let base_tx_hash = CachedTransaction::new(template.base_transaction.clone(), hash_fn).hash();
        let cached_block = CachedBlock::new(template.clone(), base_tx_hash, hash_fn);

        match cached_block.block_index() {
            Some(0) => {}
            other => {
                return Err(BlockError::WrongBlockIndex {
                    expected: 0,
                    found: other.unwrap_or(u32::MAX),
                })
            }
        }
        if template.base_transaction.outputs.iter().any(|o| o.amount == 0) {
            return Err(BlockError::ZeroOutputAmount);
        }

        let mut manager = Self {
            context: BlockchainContext::new(currency.clone()),
            pool: TxPool::new(pool_params),
            currency,
            hasher,
            verifier,
            main: Vec::new(),
            main_hash_to_height: HashMap::new(),
            alt: HashMap::new(),
            orphans: HashMap::new(),
            spent_key_images: HashSet::new(),
            spent_multisig_refs: HashSet::new(),
            outputs: OutputIndex::new(),
        };

        let coinbase_sum: u64 = template.base_transaction.outputs.iter().map(|o| o.amount).sum();
        let (key_outputs_created, multisig_outputs_created) =
            manager.register_outputs(&template.base_transaction, 0);
        let block_size = template.to_bytes().len();

        manager.main_hash_to_height.insert(cached_block.block_hash(), 0);
        manager
            .context
            .push_block(0, template.timestamp, 1, block_size, coinbase_sum, template.major_version, template.minor_version);
        manager.main.push(ChainCacheNode {
            cached_block,
            transactions: Vec::new(),
            cumulative_difficulty: 1,
            cumulative_coins: coinbase_sum,
            cumulative_size: block_size,
            generated_coins: coinbase_sum,
            key_images_spent: Vec::new(),
            multisig_refs_spent: Vec::new(),
            key_outputs_created,
            multisig_outputs_created,
        });

        Ok(manager)
    }

    // ---- read-only accessors -------------------------------------------------

    pub fn top_height(&self) -> u64 {
        self.main.len() as u64 - 1
    }

    pub fn top_hash(&self) -> Hash {
        self.main.last().expect("genesis always present").block_hash()
    }

    pub fn cumulative_difficulty(&self) -> u128 {
        self.main.last().expect("genesis always present").cumulative_difficulty
    }

    pub fn total_generated_coins(&self) -> u64 {
        self.main.last().expect("genesis always present").cumulative_coins
    }

    pub fn context(&self) -> &BlockchainContext {
        &self.context
    }

    /// Registers a hard-coded checkpoint (§4.10), e.g. from the daemon's
    /// `--checkpoint height:hash` CLI overrides. Must be called before any
    /// block at or past `height` is validated to have effect.
    pub fn add_checkpoint(&mut self, height: u64, hash: Hash) {
        self.context.add_checkpoint(height, hash);
    }

    /// Total non-coinbase transactions ever committed to the main chain
    /// (§6 `get_info`'s `tx_count`).
    pub fn tx_count(&self) -> u64 {
        self.main.iter().map(|node| node.transactions.len() as u64).sum()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    pub fn block_at_height(&self, height: u64) -> Option<RawBlock> {
        self.main.get(height as usize).map(ChainCacheNode::raw_block)
    }

    /// A sparse backward locator ending at genesis (§4.6
    /// `NOTIFY_REQUEST_CHAIN`): the most recent several heights densely,
    /// then exponentially widening steps.
    pub fn chain_locator(&self) -> Vec<Hash> {
        let top = self.top_height();
        let mut heights = Vec::new();
        let mut step = 1u64;
        let mut h = top;
        loop {
            heights.push(h);
            if h == 0 {
                break;
            }
            if heights.len() >= 10 {
                step = step.saturating_mul(2);
            }
            h = h.saturating_sub(step);
        }
        heights.into_iter().map(|h| self.main[h as usize].block_hash()).collect()
    }

    /// The deepest hash in `locator` we recognize, plus a forward run of
    /// hashes from there (§4.6 `NOTIFY_RESPONSE_CHAIN_ENTRY`), capped so a
    /// single reply can't demand the whole chain.
    pub fn find_common_ancestor(&self, locator: &[Hash]) -> (u64, u64, Vec<Hash>) {
        const MAX_ENTRIES: u64 = 10_000;
        let ancestor_height = locator
            .iter()
            .find_map(|h| self.main_hash_to_height.get(h).copied())
            .unwrap_or(0);
        let top = self.top_height();
        let end = (ancestor_height + MAX_ENTRIES).min(top);
        let hashes = (ancestor_height..=end).map(|h| self.main[h as usize].block_hash()).collect();
        (ancestor_height, top, hashes)
    }

    /// Looks up raw blocks by hash across both the main chain and tracked
    /// alternative branches (§4.4 `getBlocks`).
    pub fn get_blocks(&self, wanted: &[Hash]) -> (Vec<RawBlock>, Vec<Hash>) {
        let mut found = Vec::new();
        let mut missed = Vec::new();
        for hash in wanted {
            if let Some(&height) = self.main_hash_to_height.get(hash) {
                found.push(self.main[height as usize].raw_block());
            } else if let Some(node) = self.alt.get(hash) {
                found.push(RawBlock {
                    block_bytes: node.cached_block.template.to_bytes(),
                    transactions_bytes: node.transactions.iter().map(|t| t.binary_array().to_vec()).collect(),
                });
            } else {
                missed.push(*hash);
            }
        }
        (found, missed)
    }

    pub fn block_hash_of(&self, raw: &RawBlock) -> Option<Hash> {
        let template = BlockTemplate::from_bytes(&raw.block_bytes).ok()?;
        let hash_fn = |b: &[u8]| self.hasher.fast_hash(b);
        let base_tx_hash = CachedTransaction::new(template.base_transaction.clone(), hash_fn).hash();
        Some(CachedBlock::new(template, base_tx_hash, hash_fn).block_hash())
    }

    pub fn pool_hashes(&self) -> Vec<Hash> {
        self.pool.hashes()
    }

    pub fn pool_transactions(&self, missing: &[Hash]) -> Vec<Vec<u8>> {
        missing
            .iter()
            .filter_map(|h| self.pool.get(h))
            .map(Encode::to_bytes)
            .collect()
    }

    /// Looks a transaction up by hash, checking the pool first and then
    /// scanning the main chain (§6 `get_transactions`). There is no
    /// persistent tx-hash index over committed blocks, so the chain half
    /// of this is a linear scan; fine for a node that keeps everything
    /// in memory, but the first thing to replace with a real index if
    /// this ever grows a disk-backed store.
    pub fn find_transaction(&self, hash: &Hash) -> Option<Vec<u8>> {
        if let Some(tx) = self.pool.get(hash) {
            return Some(tx.to_bytes());
        }
        self.main.iter().find_map(|node| {
            let base_tx = &node.cached_block.template.base_transaction;
            if self.hasher.fast_hash(&base_tx.to_bytes()) == *hash {
                return Some(base_tx.to_bytes());
            }
            node.transactions
                .iter()
                .find(|tx| tx.hash() == *hash)
                .map(|tx| tx.binary_array().to_vec())
        })
    }

    // ---- mempool ----------------------------------------------------------

    /// Decodes and admits a transaction into the pool (§4.5).
    pub fn add_transaction_to_pool(&mut self, bytes: &[u8]) -> Result<Hash, PoolSubmitError> {
        let tx = Transaction::from_bytes(bytes)?;
        self.add_tx_to_pool(tx, false).map_err(PoolSubmitError::from)
    }

    fn add_tx_to_pool(&mut self, tx: Transaction, kept_by_block: bool) -> Result<Hash, RejectReason> {
        let hasher = Arc::clone(&self.hasher);
        let view = SpentSetsView {
            key_images: &self.spent_key_images,
            multisig_refs: &self.spent_multisig_refs,
        };
        self.pool.add(tx, move |b| hasher.fast_hash(b), &view, kept_by_block)
    }

    /// Evicts TTL-expired pool entries; call periodically (§4.5).
    pub fn expire_pool(&mut self, now: u64) -> Vec<Hash> {
        self.pool.expire(now)
    }

    // ---- block submission ---------------------------------------------------

    /// Assembles a raw block from an already-built template and the
    /// transactions its hashes reference (§4.9 step 4: the miner supplies
    /// only the header/nonce it mutated, not the bodies it already
    /// fetched via `getBlockTemplate`).
    pub fn submit_block(&mut self, block_bytes: Vec<u8>, now: u64) -> AddResult {
        let template = match BlockTemplate::from_bytes(&block_bytes) {
            Ok(t) => t,
            Err(e) => return AddResult::Rejected(BlockError::Codec(e)),
        };
        let mut transactions_bytes = Vec::with_capacity(template.transaction_hashes.len());
        for hash in &template.transaction_hashes {
            match self.pool.get(hash) {
                Some(tx) => transactions_bytes.push(tx.to_bytes()),
                None => return AddResult::Rejected(BlockError::MissingTransaction(*hash)),
            }
        }
        self.add_block(RawBlock { block_bytes, transactions_bytes }, now)
    }

    /// The full validation pipeline entry point (§4.4): decodes, dedups,
    /// resolves the block's place relative to what's already known
    /// (main tip, a mid-chain fork, an orphan, or nothing at all), and
    /// dispatches accordingly.
    pub fn add_block(&mut self, raw: RawBlock, now: u64) -> AddResult {
        let template = match BlockTemplate::from_bytes(&raw.block_bytes) {
            Ok(t) => t,
            Err(e) => return AddResult::Rejected(BlockError::Codec(e)),
        };
        let hash_fn = |b: &[u8]| self.hasher.fast_hash(b);
        let base_tx_hash = CachedTransaction::new(template.base_transaction.clone(), hash_fn).hash();
        let cached_block = CachedBlock::new(template.clone(), base_tx_hash, hash_fn);
        let block_hash = cached_block.block_hash();

        if self.main_hash_to_height.contains_key(&block_hash) || self.alt.contains_key(&block_hash) {
            return AddResult::AlreadyExists;
        }

        let parent_in_main = self.main_hash_to_height.get(&template.previous_block_hash).copied();
        let parent_in_alt = self.alt.contains_key(&template.previous_block_hash);

        if parent_in_main.is_none() && !parent_in_alt {
            self.buffer_orphan(template.previous_block_hash, raw);
            return AddResult::Orphaned;
        }

        let transactions = match self.decode_and_match_transactions(&template, &raw) {
            Ok(txs) => txs,
            Err(e) => return AddResult::Rejected(e),
        };

        let result = if parent_in_main == Some(self.top_height()) {
            match self.validate_and_append_main(cached_block, transactions, now) {
                Ok(()) => AddResult::AddedToMain,
                Err(e) => AddResult::Rejected(e),
            }
        } else {
            let height = match parent_in_main {
                Some(h) => h + 1,
                None => self.alt[&template.previous_block_hash].height + 1,
            };
            self.add_alt_block(cached_block, transactions, template.previous_block_hash, height, now)
        };

        if result.is_success() {
            self.retry_orphans(block_hash, now);
        }
        result
    }

    fn buffer_orphan(&mut self, missing_parent: Hash, raw: RawBlock) {
        let bucket = self.orphans.entry(missing_parent).or_default();
        if bucket.len() < self.currency.block.orphan_buffer_capacity {
            bucket.push(raw);
        }
    }

    fn retry_orphans(&mut self, newly_added: Hash, now: u64) {
        let Some(waiting) = self.orphans.remove(&newly_added) else { return };
        for raw in waiting {
            self.add_block(raw, now);
        }
    }

    fn decode_and_match_transactions(
        &self,
        template: &BlockTemplate,
        raw: &RawBlock,
    ) -> Result<Vec<CachedTransaction>, BlockError> {
        if raw.transactions_bytes.len() != template.transaction_hashes.len() {
            return Err(BlockError::MissingTransaction(
                template.transaction_hashes.first().copied().unwrap_or(Hash::ZERO),
            ));
        }
        let mut out = Vec::with_capacity(raw.transactions_bytes.len());
        for (bytes, expected_hash) in raw.transactions_bytes.iter().zip(template.transaction_hashes.iter()) {
            let tx = Transaction::from_bytes(bytes)?;
            let cached = CachedTransaction::new(tx, |b| self.hasher.fast_hash(b));
            if cached.hash() != *expected_hash {
                return Err(BlockError::MissingTransaction(*expected_hash));
            }
            out.push(cached);
        }
        Ok(out)
    }

    /// Steps 3-9 of §4.4 against `self.context` (assumed to reflect the
    /// chain up to `self.top_height()`), followed by the main-chain
    /// append if everything checks out.
    fn validate_and_append_main(
        &mut self,
        cached_block: CachedBlock,
        transactions: Vec<CachedTransaction>,
        now: u64,
    ) -> Result<(), BlockError> {
        let height = self.top_height() + 1;
        let template = cached_block.template.clone();

        let claimed = cached_block.block_index().ok_or(BlockError::MissingCoinbase)?;
        if u64::from(claimed) != height {
            return Err(BlockError::WrongBlockIndex { expected: height, found: claimed });
        }

        self.context.check_version(height, template.major_version)?;

        if let Some(median) = self.context.timestamp_check_median() {
            if template.timestamp <= median {
                return Err(BlockError::TimestampNotIncreasing);
            }
        }
        if template.timestamp > now.saturating_add(self.currency.block.future_time_limit) {
            return Err(BlockError::TimestampTooFarInFuture);
        }

        self.context.checkpoints().check(height, &cached_block.block_hash())?;
        let difficulty = self.context.next_difficulty();
        if !self.context.checkpoints().allows_pow_skip(height) {
            let pow_hash = self.hasher.pow_hash(cached_block.block_hashing_binary_array());
            if !hash_meets_difficulty(&pow_hash, difficulty) {
                return Err(BlockError::InsufficientProofOfWork);
            }
        }

        let mut fees = 0u64;
        let mut block_key_images: HashSet<KeyImage> = HashSet::new();
        let mut block_multisig_refs: HashSet<(Amount, u32, u32)> = HashSet::new();
        for cached_tx in &transactions {
            if cached_tx.transaction.is_coinbase() {
                return Err(BlockError::EmptyInputsOrOutputs);
            }
            let fee = self.validate_transaction(
                &cached_tx.transaction,
                cached_tx.prefix_hash(),
                template.major_version,
                height,
                now,
                &mut block_key_images,
                &mut block_multisig_refs,
            )?;
            fees = fees.saturating_add(fee);
        }

        let block_size = template.to_bytes().len() + transactions.iter().map(|t| t.binary_array().len()).sum::<usize>();
        if block_size > 2 * self.context.median_block_size() {
            return Err(BlockError::BlockTooLarge);
        }
        let coinbase_sum: u64 = template.base_transaction.outputs.iter().map(|o| o.amount).sum();
        let effective_reward = self.context.validate_coinbase_sum(coinbase_sum, block_size, fees)?;

        let mut deposit_interest = 0u64;
        for cached_tx in &transactions {
            for input in &cached_tx.transaction.inputs {
                if let TransactionInput::Multisignature { amount, term, .. } = input {
                    if *term > 0 {
                        deposit_interest = deposit_interest
                            .saturating_add(calculate_interest(*amount, *term, &self.currency.deposit));
                    }
                }
            }
        }
        let generated_coins = effective_reward.saturating_add(deposit_interest);

        let (key_outputs_created, multisig_outputs_created) =
            self.register_outputs(&template.base_transaction, height);
        let mut all_key_outputs_created = key_outputs_created;
        let mut all_multisig_outputs_created = multisig_outputs_created;
        let mut all_key_images_spent = Vec::new();
        let mut all_multisig_refs_spent = Vec::new();
        for cached_tx in &transactions {
            let (k, m) = self.register_outputs(&cached_tx.transaction, height);
            all_key_outputs_created.extend(k);
            all_multisig_outputs_created.extend(m);
            for input in &cached_tx.transaction.inputs {
                if let Some(ki) = input.key_image() {
                    self.spent_key_images.insert(ki);
                    all_key_images_spent.push(ki);
                }
                if let Some(r) = input.multisig_reference() {
                    self.spent_multisig_refs.insert(r);
                    all_multisig_refs_spent.push(r);
                }
            }
        }

        let cumulative_difficulty = self.cumulative_difficulty() + difficulty;
        let cumulative_coins = self.total_generated_coins() + generated_coins;

        for cached_tx in &transactions {
            self.pool.remove(&cached_tx.hash());
        }

        self.context.push_block(
            height,
            template.timestamp,
            cumulative_difficulty,
            block_size,
            generated_coins,
            template.major_version,
            template.minor_version,
        );
        self.main_hash_to_height.insert(cached_block.block_hash(), height);
        self.main.push(ChainCacheNode {
            cached_block,
            transactions,
            cumulative_difficulty,
            cumulative_coins,
            cumulative_size: block_size,
            generated_coins,
            key_images_spent: all_key_images_spent,
            multisig_refs_spent: all_multisig_refs_spent,
            key_outputs_created: all_key_outputs_created,
            multisig_outputs_created: all_multisig_outputs_created,
        });

        Ok(())
    }

    /// Step 6 of §4.4 for one non-coinbase transaction: shape checks,
    /// per-input resolution/maturity/signature verification, and the fee.
    #[allow(clippy::too_many_arguments)]
    fn validate_transaction(
        &self,
        tx: &Transaction,
        prefix_hash: Hash,
        major_version: u8,
        height: u64,
        now: u64,
        block_key_images: &mut HashSet<KeyImage>,
        block_multisig_refs: &mut HashSet<(Amount, u32, u32)>,
    ) -> Result<u64, BlockError> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() {
            return Err(BlockError::EmptyInputsOrOutputs);
        }
        if tx.outputs.iter().any(|o| o.amount == 0) {
            return Err(BlockError::ZeroOutputAmount);
        }
        if tx.version >= 2 && major_version < 2 {
            return Err(BlockError::WrongTransactionVersion);
        }

        let mut tx_key_images = HashSet::new();
        for input in &tx.inputs {
            if let Some(ki) = input.key_image() {
                if !tx_key_images.insert(ki) {
                    return Err(BlockError::DuplicateKeyImageWithinTransaction);
                }
            }
        }

        let mut sum_in: u64 = 0;
        for (i, input) in tx.inputs.iter().enumerate() {
            match input {
                TransactionInput::Coinbase { .. } => return Err(BlockError::EmptyInputsOrOutputs),
                TransactionInput::Key { amount, key_image, .. } => {
                    if self.spent_key_images.contains(key_image) {
                        return Err(BlockError::KeyImageAlreadySpent);
                    }
                    if !block_key_images.insert(*key_image) {
                        return Err(BlockError::DuplicateKeyImageWithinBlock);
                    }
                    let offsets = input
                        .absolute_output_offsets()
                        .filter(|o| !o.is_empty())
                        .ok_or(BlockError::UnresolvedOutputReference)?;
                    let mut ring = Vec::with_capacity(offsets.len());
                    for offset in &offsets {
                        let record = self
                            .outputs
                            .key_output(*amount, *offset)
                            .ok_or(BlockError::UnresolvedOutputReference)?;
                        if !crate::outputs::output_matured(record.unlock_time, height, now) {
                            return Err(BlockError::ImmatureOutput);
                        }
                        ring.push(record.one_time_public_key);
                    }
                    let sigs = tx.signatures.get(i).ok_or(BlockError::InvalidRingSignature)?;
                    if sigs.len() != ring.len() {
                        return Err(BlockError::InvalidRingSignature);
                    }
                    if !self.verifier.verify_ring_signature(&prefix_hash, key_image, &ring, sigs) {
                        return Err(BlockError::InvalidRingSignature);
                    }
                    sum_in += amount;
                }
                TransactionInput::Multisignature { amount, required_signature_count, output_index, term } => {
                    let reference = (*amount, *output_index, *term);
                    if self.spent_multisig_refs.contains(&reference) {
                        return Err(BlockError::MultisigReferenceAlreadySpent);
                    }
                    if !block_multisig_refs.insert(reference) {
                        return Err(BlockError::MultisigReferenceAlreadySpent);
                    }
                    let record = self
                        .outputs
                        .multisig_output(&reference)
                        .ok_or(BlockError::UnresolvedOutputReference)?;
                    if record.required_signature_count != *required_signature_count {
                        return Err(BlockError::MultisigTermMismatch);
                    }
                    if !crate::outputs::output_matured(record.unlock_height, height, now) {
                        return Err(if *term > 0 {
                            BlockError::ImmatureDeposit
                        } else {
                            BlockError::ImmatureOutput
                        });
                    }
                    let sigs = tx.signatures.get(i).ok_or(BlockError::InvalidMultisigSignature)?;
                    if !self
                        .verifier
                        .verify_multisig_signatures(&prefix_hash, &record.keys, *required_signature_count, sigs)
                    {
                        return Err(BlockError::InvalidMultisigSignature);
                    }
                    sum_in += amount;
                }
            }
        }

        let sum_out: u64 = tx.outputs.iter().map(|o| o.amount).sum();
        sum_in.checked_sub(sum_out).ok_or(BlockError::NegativeFee)
    }

    /// Registers every output a transaction creates into [`OutputIndex`],
    /// returning what was created so rollback can undo it in reverse
    /// (§4.4, §4.10).
    fn register_outputs(&mut self, tx: &Transaction, height: u64) -> (Vec<Amount>, Vec<(Amount, u32)>) {
        let mut key_created = Vec::new();
        let mut multisig_created = Vec::new();
        for output in &tx.outputs {
            match &output.target {
                TransactionTarget::Key { one_time_public_key } => {
                    self.outputs.push_key_output(
                        output.amount,
                        KeyOutputRecord {
                            one_time_public_key: *one_time_public_key,
                            unlock_time: tx.unlock_time,
                        },
                    );
                    key_created.push(output.amount);
                }
                TransactionTarget::Multisignature { keys, required_signature_count, term } => {
                    let unlock_height = if *term > 0 { height + u64::from(*term) } else { height };
                    self.outputs.push_multisig_output(
                        output.amount,
                        *term,
                        MultisigOutputRecord {
                            keys: keys.clone(),
                            required_signature_count: *required_signature_count,
                            unlock_height,
                        },
                    );
                    multisig_created.push((output.amount, *term));
                }
            }
        }
        (key_created, multisig_created)
    }

    fn unregister_outputs(&mut self, node: &ChainCacheNode) {
        for amount in node.key_outputs_created.iter().rev() {
            self.outputs.pop_key_output(*amount);
        }
        for (amount, term) in node.multisig_outputs_created.iter().rev() {
            self.outputs.pop_multisig_output(*amount, *term);
        }
    }

    /// Walks `hash`'s alt-chain ancestry back to the first hash found on
    /// the main chain, returning that fork height and the alt ancestors
    /// in ascending-height order (oldest first).
    fn alt_ancestors_and_fork_height(&self, mut hash: Hash) -> (u64, Vec<Hash>) {
        let mut chain = Vec::new();
        loop {
            if let Some(&h) = self.main_hash_to_height.get(&hash) {
                chain.reverse();
                return (h, chain);
            }
            let node = self.alt.get(&hash).expect("alt chain ancestry must terminate on the main chain");
            chain.push(hash);
            hash = node.parent_hash;
        }
    }

    /// Validates a block whose parent is not the main tip: replays the
    /// chain up to the fork point into a scratch [`BlockchainContext`],
    /// then validates the candidate against it (§4.4 "Alternative
    /// chain"). Reuses the exact same retarget/reward/version machinery
    /// as the main-chain path at the cost of O(depth) replay — acceptable
    /// since branching off main is the rare path.
    fn add_alt_block(
        &mut self,
        cached_block: CachedBlock,
        transactions: Vec<CachedTransaction>,
        parent_hash: Hash,
        height: u64,
        now: u64,
    ) -> AddResult {
        let (fork_height, alt_ancestors) = if self.main_hash_to_height.contains_key(&parent_hash) {
            (self.main_hash_to_height[&parent_hash], Vec::new())
        } else {
            self.alt_ancestors_and_fork_height(parent_hash)
        };

        let mut scratch = BlockchainContext::new(self.currency.clone());
        for node in &self.main[..=fork_height as usize] {
            scratch.push_block(
                self.main_hash_to_height[&node.block_hash()],
                node.timestamp(),
                node.cumulative_difficulty,
                node.cumulative_size,
                node.generated_coins,
                node.cached_block.template.major_version,
                node.cached_block.template.minor_version,
            );
        }
        for ancestor_hash in &alt_ancestors {
            let node = &self.alt[ancestor_hash];
            scratch.push_block(
                node.height,
                node.cached_block.template.timestamp,
                node.cumulative_difficulty,
                node.cumulative_size,
                node.generated_coins,
                node.cached_block.template.major_version,
                node.cached_block.template.minor_version,
            );
        }

        let parent_cumulative_difficulty = scratch.cumulative_difficulty;
        let parent_cumulative_coins = scratch.already_generated_coins;

        let fees = match self.validate_alt_candidate(&scratch, &cached_block, &transactions, height, now) {
            Ok(fees) => fees,
            Err(e) => return AddResult::Rejected(e),
        };
        let difficulty = scratch.next_difficulty();
        let block_size = cached_block.template.to_bytes().len()
            + transactions.iter().map(|t| t.binary_array().len()).sum::<usize>();
        let coinbase_sum: u64 = cached_block.template.base_transaction.outputs.iter().map(|o| o.amount).sum();
        let effective_reward = match scratch.validate_coinbase_sum(coinbase_sum, block_size, fees) {
            Ok(r) => r,
            Err(e) => return AddResult::Rejected(BlockError::from(e)),
        };
        let mut deposit_interest = 0u64;
        for cached_tx in &transactions {
            for input in &cached_tx.transaction.inputs {
                if let TransactionInput::Multisignature { amount, term, .. } = input {
                    if *term > 0 {
                        deposit_interest =
                            deposit_interest.saturating_add(calculate_interest(*amount, *term, &self.currency.deposit));
                    }
                }
            }
        }

        let cumulative_difficulty = parent_cumulative_difficulty + difficulty;
        let cumulative_coins = parent_cumulative_coins + effective_reward + deposit_interest;
        let block_hash = cached_block.block_hash();

        self.alt.insert(
            block_hash,
            AltChainNode {
                cached_block,
                transactions,
                cumulative_difficulty,
                cumulative_coins,
                cumulative_size: block_size,
                generated_coins: effective_reward.saturating_add(deposit_interest),
                parent_hash,
                height,
            },
        );

        if cumulative_difficulty > self.cumulative_difficulty() {
            match self.switch_to_alt(block_hash, now) {
                Ok(()) => AddResult::AddedToAlternativeAndSwitched,
                Err(_) => AddResult::AddedToAlternative,
            }
        } else {
            AddResult::AddedToAlternative
        }
    }

    /// The shape/timestamp/PoW/checkpoint checks plus full per-transaction
    /// validation for an alt-chain candidate, against a scratch context
    /// replaying its branch (§4.4). Output/key-image resolution still
    /// goes through `self.outputs`/`self.spent_key_images`, since those
    /// indexes are shared across branches until a branch is promoted
    /// (§9 design note: a documented simplification — a double-spend
    /// confined entirely within one not-yet-promoted alt branch, spent
    /// and created in two different blocks of that same branch, is not
    /// caught until promotion re-runs the pipeline against committed
    /// state).
    fn validate_alt_candidate(
        &self,
        scratch: &BlockchainContext,
        cached_block: &CachedBlock,
        transactions: &[CachedTransaction],
        height: u64,
        now: u64,
    ) -> Result<u64, BlockError> {
        let template = &cached_block.template;
        let claimed = cached_block.block_index().ok_or(BlockError::MissingCoinbase)?;
        if u64::from(claimed) != height {
            return Err(BlockError::WrongBlockIndex { expected: height, found: claimed });
        }
        scratch.check_version(height, template.major_version)?;
        if let Some(median) = scratch.timestamp_check_median() {
            if template.timestamp <= median {
                return Err(BlockError::TimestampNotIncreasing);
            }
        }
        if template.timestamp > now.saturating_add(self.currency.block.future_time_limit) {
            return Err(BlockError::TimestampTooFarInFuture);
        }
        scratch.checkpoints().check(height, &cached_block.block_hash())?;
        let difficulty = scratch.next_difficulty();
        if !scratch.checkpoints().allows_pow_skip(height) {
            let pow_hash = self.hasher.pow_hash(cached_block.block_hashing_binary_array());
            if !hash_meets_difficulty(&pow_hash, difficulty) {
                return Err(BlockError::InsufficientProofOfWork);
            }
        }

        let block_size = template.to_bytes().len() + transactions.iter().map(|t| t.binary_array().len()).sum::<usize>();
        if block_size > 2 * scratch.median_block_size() {
            return Err(BlockError::BlockTooLarge);
        }

        let mut fees = 0u64;
        let mut block_key_images = HashSet::new();
        let mut block_multisig_refs = HashSet::new();
        for cached_tx in transactions {
            if cached_tx.transaction.is_coinbase() {
                return Err(BlockError::EmptyInputsOrOutputs);
            }
            let fee = self.validate_transaction(
                &cached_tx.transaction,
                cached_tx.prefix_hash(),
                template.major_version,
                height,
                now,
                &mut block_key_images,
                &mut block_multisig_refs,
            )?;
            fees = fees.saturating_add(fee);
        }
        Ok(fees)
    }

    /// Rolls main back to the fork point, re-applies the alt branch
    /// through the full validation pipeline, and on any failure restores
    /// the pre-switch state exactly (§4.4 "Alternative chain" switch;
    /// §4.10 checkpoint protection).
    fn switch_to_alt(&mut self, new_tip_hash: Hash, now: u64) -> Result<(), BlockError> {
        let (fork_height, mut alt_chain) = self.alt_ancestors_and_fork_height(new_tip_hash);
        alt_chain.push(new_tip_hash);

        self.context.checkpoints().check_reorg_allowed(fork_height)?;

        let snapshot_main = self.main.clone();
        let snapshot_hash_to_height = self.main_hash_to_height.clone();
        let snapshot_spent_ki = self.spent_key_images.clone();
        let snapshot_spent_ms = self.spent_multisig_refs.clone();
        let snapshot_outputs = self.outputs.clone();
        let snapshot_context = self.context.clone();

        let mut returned_to_pool: Vec<Transaction> = Vec::new();
        while self.top_height() > fork_height {
            let node = self.main.pop().expect("loop condition guarantees a node");
            self.main_hash_to_height.remove(&node.block_hash());
            for ki in &node.key_images_spent {
                self.spent_key_images.remove(ki);
            }
            for r in &node.multisig_refs_spent {
                self.spent_multisig_refs.remove(r);
            }
            self.unregister_outputs(&node);
            for tx in &node.transactions {
                returned_to_pool.push(tx.transaction.clone());
            }
        }

        self.context = BlockchainContext::new(self.currency.clone());
        for node in &self.main {
            self.context.push_block(
                self.main_hash_to_height[&node.block_hash()],
                node.timestamp(),
                node.cumulative_difficulty,
                node.cumulative_size,
                node.generated_coins,
                node.cached_block.template.major_version,
                node.cached_block.template.minor_version,
            );
        }

        let mut failed = false;
        for hash in &alt_chain {
            let node = self.alt.get(hash).cloned().expect("alt chain entries must exist");
            if self
                .validate_and_append_main(node.cached_block, node.transactions, now)
                .is_err()
            {
                failed = true;
                break;
            }
        }

        if failed {
            self.main = snapshot_main;
            self.main_hash_to_height = snapshot_hash_to_height;
            self.spent_key_images = snapshot_spent_ki;
            self.spent_multisig_refs = snapshot_spent_ms;
            self.outputs = snapshot_outputs;
            self.context = snapshot_context;
            for hash in &alt_chain {
                self.alt.remove(hash);
            }
            return Err(BlockError::InvalidAltChain);
        }

        for hash in &alt_chain {
            self.alt.remove(hash);
        }
        for (i, node) in snapshot_main.iter().enumerate().skip(fork_height as usize + 1) {
            let height = i as u64;
            let parent_hash = snapshot_main[i - 1].block_hash();
            self.alt.insert(
                node.block_hash(),
                AltChainNode {
                    cached_block: node.cached_block.clone(),
                    transactions: node.transactions.clone(),
                    cumulative_difficulty: node.cumulative_difficulty,
                    cumulative_coins: node.cumulative_coins,
                    cumulative_size: node.cumulative_size,
                    generated_coins: node.generated_coins,
                    parent_hash,
                    height,
                },
            );
        }

        for tx in returned_to_pool {
            let _ = self.add_tx_to_pool(tx, true);
        }

        Ok(())
    }

    // ---- mining -------------------------------------------------------------

    /// Assembles a block template for a miner (§4.9 `getBlockTemplate`).
    /// The one-time output key is derived directly from the miner's
    /// spend key rather than via a tx-key/view-key Diffie-Hellman, since
    /// wallet-side key derivation is out of scope (§1 Non-goals) — a real
    /// miner supplies its own pre-derived one-time key via `extra_nonce`
    /// in a production deployment.
    pub fn get_block_template(&self, miner_spend_key: cn_types::PublicKey, extra_nonce: &[u8], now: u64) -> (BlockTemplate, u128) {
        let height = self.top_height() + 1;
        let major_version = self.context.major_version_for_next_height();
        let minor_version = u8::from(major_version == 1);

        let budget = self.currency.block.initial_max_cumulative_size.max(2 * self.context.median_block_size());
        let transactions = self.pool.take(budget);
        let fees: u64 = transactions.iter().map(|t| t.fee().unwrap_or(0)).sum();
        let block_size_without_coinbase: usize = transactions.iter().map(|t| t.to_bytes().len()).sum();

        let base_reward = self.context.base_reward();
        let effective_reward =
            reward::penalised_reward(base_reward, block_size_without_coinbase, self.context.median_block_size())
                .unwrap_or(base_reward);
        let coinbase_amount = effective_reward.saturating_add(fees);

        let base_transaction = Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Coinbase { block_index: height as u32 }],
            outputs: vec![TransactionOutput {
                amount: coinbase_amount,
                target: TransactionTarget::Key { one_time_public_key: miner_spend_key },
            }],
            extra: extra_nonce.to_vec(),
            signatures: vec![],
        };

        let hash_fn = |b: &[u8]| self.hasher.fast_hash(b);
        let transaction_hashes: Vec<Hash> = transactions
            .iter()
            .map(|tx| CachedTransaction::new(tx.clone(), hash_fn).hash())
            .collect();

        let timestamp = now.max(self.context.timestamp_check_median().map(|m| m + 1).unwrap_or(now));
        let template = BlockTemplate {
            major_version,
            minor_version,
            previous_block_hash: self.top_hash(),
            timestamp,
            nonce: 0,
            parent_block: None,
            base_transaction,
            transaction_hashes,
        };
        (template, self.context.next_difficulty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::test_support::{PermissiveVerifier, TestHasher};
    use cn_types::{PublicKey, Signature};

    const GENESIS_TS: u64 = 1_700_000_000;

    fn currency() -> Currency {
        Currency::mainnet()
    }

    fn miner_key(b: u8) -> PublicKey {
        PublicKey([b; 32])
    }

    fn genesis_raw(coinbase_amount: u64) -> RawBlock {
        let template = BlockTemplate {
            major_version: 1,
            minor_version: 0,
            previous_block_hash: Hash::ZERO,
            timestamp: GENESIS_TS,
            nonce: 0,
            parent_block: None,
            base_transaction: Transaction {
                version: 1,
                unlock_time: 0,
                inputs: vec![TransactionInput::Coinbase { block_index: 0 }],
                outputs: vec![TransactionOutput {
                    amount: coinbase_amount,
                    target: TransactionTarget::Key { one_time_public_key: miner_key(1) },
                }],
                extra: vec![],
                signatures: vec![],
            },
            transaction_hashes: vec![],
        };
        RawBlock { block_bytes: template.to_bytes(), transactions_bytes: vec![] }
    }

    fn new_manager(coinbase_amount: u64) -> BlockchainManager {
        BlockchainManager::new(
            currency(),
            Arc::new(TestHasher),
            Arc::new(PermissiveVerifier),
            genesis_raw(coinbase_amount),
            cn_constants::mempool::MempoolParams::default(),
        )
        .unwrap()
    }

    /// Hand-builds a coinbase-only block extending `prev_hash`, using the
    /// same reward formula `validate_and_append_main` checks against, so
    /// tests don't have to go through `get_block_template`'s pool plumbing
    /// for blocks with no transactions.
    fn child_block(prev_hash: Hash, height: u64, timestamp: u64, already_generated_coins: u64) -> RawBlock {
        let reward = reward::base_reward(already_generated_coins, &currency().money);
        let template = BlockTemplate {
            major_version: 1,
            minor_version: 0,
            previous_block_hash: prev_hash,
            timestamp,
            nonce: 0,
            parent_block: None,
            base_transaction: Transaction {
                version: 1,
                unlock_time: 0,
                inputs: vec![TransactionInput::Coinbase { block_index: height as u32 }],
                outputs: vec![TransactionOutput {
                    amount: reward,
                    target: TransactionTarget::Key { one_time_public_key: miner_key(2) },
                }],
                extra: vec![],
                signatures: vec![],
            },
            transaction_hashes: vec![],
        };
        RawBlock { block_bytes: template.to_bytes(), transactions_bytes: vec![] }
    }

    #[test]
    fn genesis_constructs_with_height_zero() {
        let manager = new_manager(1000);
        assert_eq!(manager.top_height(), 0);
        assert_eq!(manager.total_generated_coins(), 1000);
    }

    #[test]
    fn appends_a_valid_block_to_main() {
        let mut manager = new_manager(1000);
        let genesis_hash = manager.top_hash();
        let block1 = child_block(genesis_hash, 1, GENESIS_TS + 1000, 1000);
        let result = manager.add_block(block1, GENESIS_TS + 1000);
        assert_eq!(result, AddResult::AddedToMain);
        assert_eq!(manager.top_height(), 1);
    }

    #[test]
    fn rejects_block_with_wrong_claimed_index() {
        let mut manager = new_manager(1000);
        let genesis_hash = manager.top_hash();
        let mut block1 = child_block(genesis_hash, 1, GENESIS_TS + 1000, 1000);
        // Rewrite with a coinbase claiming the wrong block index.
        let mut template = BlockTemplate::from_bytes(&block1.block_bytes).unwrap();
        template.base_transaction.inputs = vec![TransactionInput::Coinbase { block_index: 7 }];
        block1.block_bytes = template.to_bytes();

        let result = manager.add_block(block1, GENESIS_TS + 1000);
        assert_eq!(
            result,
            AddResult::Rejected(BlockError::WrongBlockIndex { expected: 1, found: 7 })
        );
    }

    #[test]
    fn buffers_and_resolves_an_orphan() {
        // Derive two chained blocks against a scratch manager first, then
        // feed them to a fresh one out of order.
        let mut scratch = new_manager(1000);
        let genesis_hash = scratch.top_hash();
        let block_a = child_block(genesis_hash, 1, GENESIS_TS + 1000, 1000);
        assert_eq!(scratch.add_block(block_a.clone(), GENESIS_TS + 1000), AddResult::AddedToMain);
        let a_hash = scratch.top_hash();
        let a_generated = scratch.total_generated_coins();
        let block_b = child_block(a_hash, 2, GENESIS_TS + 2000, a_generated);

        let mut manager = new_manager(1000);
        let orphan_result = manager.add_block(block_b.clone(), GENESIS_TS + 2000);
        assert_eq!(orphan_result, AddResult::Orphaned);
        assert_eq!(manager.top_height(), 0);

        let resolved = manager.add_block(block_a, GENESIS_TS + 1000);
        assert_eq!(resolved, AddResult::AddedToMain);
        assert_eq!(manager.top_height(), 2);
        assert_eq!(manager.top_hash(), manager.block_hash_of(&block_b).unwrap());
    }

    #[test]
    fn alternative_chain_overtakes_main_on_higher_cumulative_difficulty() {
        let mut manager = new_manager(1000);
        let genesis_hash = manager.top_hash();

        let a1 = child_block(genesis_hash, 1, GENESIS_TS + 1000, 1000);
        assert_eq!(manager.add_block(a1, GENESIS_TS + 1000), AddResult::AddedToMain);
        let main_tip = manager.top_hash();

        let mut b1 = child_block(genesis_hash, 1, GENESIS_TS + 1500, 1000);
        // Differ from `a1` so the two blocks hash differently.
        let mut b1_template = BlockTemplate::from_bytes(&b1.block_bytes).unwrap();
        b1_template.base_transaction.extra = vec![0xAB];
        b1.block_bytes = b1_template.to_bytes();
        assert_eq!(manager.add_block(b1.clone(), GENESIS_TS + 1500), AddResult::AddedToAlternative);
        assert_eq!(manager.top_hash(), main_tip, "single alt block must not overtake main yet");

        let b1_hash = manager.block_hash_of(&b1).unwrap();
        let b1_generated = reward::base_reward(1000, &currency().money);
        let b2 = child_block(b1_hash, 2, GENESIS_TS + 2500, 1000 + b1_generated);
        let result = manager.add_block(b2.clone(), GENESIS_TS + 2500);
        assert_eq!(result, AddResult::AddedToAlternativeAndSwitched);
        assert_eq!(manager.top_height(), 2);
        assert_eq!(manager.top_hash(), manager.block_hash_of(&b2).unwrap());
    }

    #[test]
    fn pool_accepts_a_transaction_and_expires_it() {
        let mut manager = new_manager(1000);
        let tx = Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Key {
                amount: 1000,
                key_image: KeyImage([9; 32]),
                output_offsets: vec![0],
            }],
            outputs: vec![TransactionOutput {
                amount: 900,
                target: TransactionTarget::Key { one_time_public_key: miner_key(3) },
            }],
            extra: vec![],
            signatures: vec![vec![Signature([0; 64])]],
        };
        let hash = manager.add_transaction_to_pool(&tx.to_bytes()).unwrap();
        assert!(manager.pool_hashes().contains(&hash));

        let expired = manager.expire_pool(u64::MAX);
        assert_eq!(expired, vec![hash]);
        assert!(manager.pool_hashes().is_empty());
    }

    #[test]
    fn block_template_transaction_spends_a_real_genesis_output() {
        let mut manager = new_manager(1000);
        let tx = Transaction {
            version: 1,
            unlock_time: 0,
            inputs: vec![TransactionInput::Key {
                amount: 1000,
                key_image: KeyImage([4; 32]),
                output_offsets: vec![0],
            }],
            outputs: vec![TransactionOutput {
                amount: 900,
                target: TransactionTarget::Key { one_time_public_key: miner_key(5) },
            }],
            extra: vec![],
            signatures: vec![vec![Signature([0; 64])]],
        };
        manager.add_transaction_to_pool(&tx.to_bytes()).unwrap();

        let now = GENESIS_TS + 1000;
        let (template, _difficulty) = manager.get_block_template(miner_key(6), &[], now);
        assert_eq!(template.transaction_hashes.len(), 1);

        let result = manager.submit_block(template.to_bytes(), now);
        assert_eq!(result, AddResult::AddedToMain);
        assert_eq!(manager.top_height(), 1);
        assert!(manager.pool_hashes().is_empty(), "spent tx must leave the pool on confirm");
    }
}

/// The read-only half of step 3-9 validation (§4.4), usable against a
/// scratch context that hasn't been committed to yet (alt-chain path).
/// Doesn't touch spent-set/output-index state, since an alt-chain
/// candidate's references must still resolve against the *shared*
/// `OutputIndex` (alt branches don't get their own output namespace until
/// promoted, §9 design note).
