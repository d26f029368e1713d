//! In-memory EIP-1193 wallet backed by a tiny simulated chain: one staking
//! contract, its two ERC-20 tokens and a counter contract.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use parking_lot::{Mutex, MutexGuard};
use serde_json::{Value, json};
use tokio::sync::{Notify, OwnedRwLockWriteGuard, RwLock, broadcast};

use monad_chain::abi::{self, Function, Token};
use monad_chain::{
    Address, Counter, Eip1193Provider, Erc20, ProviderError, RpcClient, StakingRewards,
    WalletEvent, WalletEventHub, monad_testnet,
};
use monad_sync::{ChainStateSync, CounterModel, StakingDashboard, SyncSettings};

pub const MONAD: u64 = 10143;
const NOW: u64 = 1_700_000_000;

pub fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address::from_bytes(bytes)
}

pub fn staking_addr() -> Address {
    addr(0x51)
}
pub fn stake_token_addr() -> Address {
    addr(0x52)
}
pub fn reward_token_addr() -> Address {
    addr(0x53)
}
pub fn counter_addr() -> Address {
    addr(0x54)
}
pub fn owner() -> Address {
    addr(0xaa)
}
pub fn alice() -> Address {
    addr(0xa1)
}
pub fn bob() -> Address {
    addr(0xb0)
}

/// `n` whole tokens at 18 decimals.
pub fn tokens(n: u64) -> BigUint {
    BigUint::from(n) * BigUint::from(10u64).pow(18)
}

// ---------------------------------------------------------------------------
// Simulated contracts
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TokenState {
    pub symbol: String,
    pub decimals: u8,
    pub balances: HashMap<Address, BigUint>,
    pub allowances: HashMap<(Address, Address), BigUint>,
}

impl TokenState {
    fn new(symbol: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            ..Default::default()
        }
    }

    pub fn balance(&self, who: Address) -> BigUint {
        self.balances.get(&who).cloned().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> BigUint {
        self.allowances
            .get(&(owner, spender))
            .cloned()
            .unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, amount: &BigUint) -> bool {
        let balance = self.balance(from);
        if &balance < amount {
            return false;
        }
        self.balances.insert(from, balance - amount);
        *self.balances.entry(to).or_default() += amount;
        true
    }
}

#[derive(Debug, Default)]
pub struct StakingState {
    pub owner: Address,
    pub duration: u64,
    pub finish_at: u64,
    pub reward_rate: BigUint,
    pub reward_per_token: BigUint,
    pub total_supply: BigUint,
    pub staked: HashMap<Address, BigUint>,
    pub earned: HashMap<Address, BigUint>,
}

impl StakingState {
    pub fn staked(&self, who: Address) -> BigUint {
        self.staked.get(&who).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct CounterState {
    pub total: u64,
    pub counts: HashMap<Address, u64>,
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: Option<String>,
}

impl SentTx {
    pub fn selector(&self) -> [u8; 4] {
        selector(&self.data)
    }
}

#[derive(Debug)]
pub struct ChainState {
    pub chain_id: u64,
    pub known_chains: HashSet<u64>,
    pub accounts: Vec<Address>,

    pub reject_sends: bool,
    pub revert_sends: bool,
    pub insufficient_funds: bool,
    pub fail_reads: bool,

    pub staking: StakingState,
    pub tokens: HashMap<Address, TokenState>,
    pub counter: CounterState,

    pub sent: Vec<SentTx>,
    receipts: HashMap<String, bool>,
    next_tx: u64,
}

impl ChainState {
    fn new() -> Self {
        let mut stake_token = TokenState::new("STK", 18);
        stake_token.balances.insert(alice(), tokens(1_000));
        stake_token.balances.insert(bob(), tokens(50));
        let mut reward_token = TokenState::new("RWD", 18);
        reward_token.balances.insert(owner(), tokens(10_000));
        reward_token.balances.insert(staking_addr(), tokens(500));

        let mut counter = CounterState {
            total: 5,
            ..Default::default()
        };
        counter.counts.insert(alice(), 2);

        Self {
            chain_id: MONAD,
            known_chains: HashSet::from([MONAD, 1]),
            accounts: vec![alice()],
            reject_sends: false,
            revert_sends: false,
            insufficient_funds: false,
            fail_reads: false,
            staking: StakingState {
                owner: owner(),
                duration: 604_800,
                reward_per_token: BigUint::from(42u32),
                ..Default::default()
            },
            tokens: HashMap::from([
                (stake_token_addr(), stake_token),
                (reward_token_addr(), reward_token),
            ]),
            counter,
            sent: Vec::new(),
            receipts: HashMap::new(),
            next_tx: 0,
        }
    }

    pub fn token(&self, address: Address) -> &TokenState {
        &self.tokens[&address]
    }

    fn call(&self, tx: &Value) -> Result<Value, ProviderError> {
        if self.fail_reads {
            return Err(ProviderError::Transport("connection refused".into()));
        }
        let to = parse_address(&tx["to"]);
        let from = tx.get("from").map(parse_address);
        let data = abi::from_hex(tx["data"].as_str().unwrap_or_default()).expect("call data");
        let sel = selector(&data);

        let out = if to == staking_addr() {
            self.staking_view(sel, &data)
        } else if let Some(token) = self.tokens.get(&to) {
            if sel == Erc20::SYMBOL.selector() {
                Some(abi::encode_string(&token.symbol))
            } else if sel == Erc20::DECIMALS.selector() {
                Some(uint_word(BigUint::from(token.decimals)))
            } else if sel == Erc20::BALANCE_OF.selector() {
                Some(uint_word(token.balance(arg_address(&data, 0))))
            } else if sel == Erc20::ALLOWANCE.selector() {
                Some(uint_word(
                    token.allowance(arg_address(&data, 0), arg_address(&data, 1)),
                ))
            } else {
                None
            }
        } else if to == counter_addr() {
            let count = |who: Option<Address>| {
                who.and_then(|w| self.counter.counts.get(&w).copied())
                    .unwrap_or(0)
            };
            if sel == Counter::TOTAL_COUNT.selector() {
                Some(uint_word(BigUint::from(self.counter.total)))
            } else if sel == Counter::GET_MY_COUNT.selector() {
                Some(uint_word(BigUint::from(count(from))))
            } else if sel == Counter::GET_COUNT.selector() {
                Some(uint_word(BigUint::from(count(Some(arg_address(&data, 0))))))
            } else {
                None
            }
        } else {
            None
        };

        out.map(|bytes| json!(abi::to_hex(&bytes)))
            .ok_or_else(|| ProviderError::rpc(3, "execution reverted"))
    }

    fn staking_view(&self, sel: [u8; 4], data: &[u8]) -> Option<Vec<u8>> {
        let s = &self.staking;
        let is = |f: &Function| sel == f.selector();
        let word = if is(&StakingRewards::OWNER) {
            return Some(abi::encode_word(&Token::Address(s.owner)).expect("address word"));
        } else if is(&StakingRewards::DURATION) {
            BigUint::from(s.duration)
        } else if is(&StakingRewards::FINISH_AT) {
            BigUint::from(s.finish_at)
        } else if is(&StakingRewards::REWARD_RATE) {
            s.reward_rate.clone()
        } else if is(&StakingRewards::TOTAL_SUPPLY) {
            s.total_supply.clone()
        } else if is(&StakingRewards::REWARD_PER_TOKEN) {
            s.reward_per_token.clone()
        } else if is(&StakingRewards::BALANCE_OF) {
            s.staked(arg_address(data, 0))
        } else if is(&StakingRewards::EARNED) || is(&StakingRewards::REWARDS) {
            s.earned
                .get(&arg_address(data, 0))
                .cloned()
                .unwrap_or_default()
        } else {
            return None;
        };
        Some(uint_word(word))
    }

    fn send(&mut self, tx: &Value) -> Result<Value, ProviderError> {
        if self.reject_sends {
            return Err(ProviderError::rpc(
                4001,
                "MetaMask Tx Signature: User denied transaction signature.",
            ));
        }
        if self.insufficient_funds {
            return Err(ProviderError::rpc(
                -32000,
                "insufficient funds for gas * price + value",
            ));
        }

        let sent = SentTx {
            from: parse_address(&tx["from"]),
            to: parse_address(&tx["to"]),
            data: abi::from_hex(tx["data"].as_str().unwrap_or_default()).expect("tx data"),
            value: tx.get("value").and_then(Value::as_str).map(str::to_string),
        };
        let ok = !self.revert_sends && self.execute(&sent);
        self.sent.push(sent);

        self.next_tx += 1;
        let hash = format!("0x{:064x}", self.next_tx);
        self.receipts.insert(hash.clone(), ok);
        Ok(json!(hash))
    }

    /// Apply a transaction. Returns `false` (and changes nothing) when the
    /// contract would revert.
    fn execute(&mut self, tx: &SentTx) -> bool {
        let sel = tx.selector();
        let data = &tx.data;

        if let Some(token) = self.tokens.get_mut(&tx.to) {
            if sel == Erc20::APPROVE.selector() {
                token
                    .allowances
                    .insert((tx.from, arg_address(data, 0)), arg_uint(data, 1));
                return true;
            }
            if sel == Erc20::TRANSFER.selector() {
                return token.transfer(tx.from, arg_address(data, 0), &arg_uint(data, 1));
            }
            return false;
        }

        if tx.to == counter_addr() && sel == Counter::INCREASE_COUNTER.selector() {
            self.counter.total += 1;
            *self.counter.counts.entry(tx.from).or_default() += 1;
            return true;
        }

        if tx.to == staking_addr() {
            return self.execute_staking(tx.from, sel, data);
        }
        false
    }

    fn execute_staking(&mut self, from: Address, sel: [u8; 4], data: &[u8]) -> bool {
        let staking = staking_addr();
        let is = |f: &Function| sel == f.selector();

        if is(&StakingRewards::STAKE) {
            let amount = arg_uint(data, 0);
            let Some(token) = self.tokens.get_mut(&stake_token_addr()) else {
                return false;
            };
            let allowance = token.allowance(from, staking);
            if allowance < amount || token.balance(from) < amount {
                return false;
            }
            token.allowances.insert((from, staking), allowance - &amount);
            token.transfer(from, staking, &amount);
            *self.staking.staked.entry(from).or_default() += &amount;
            self.staking.total_supply += amount;
            true
        } else if is(&StakingRewards::WITHDRAW) {
            let amount = arg_uint(data, 0);
            let staked = self.staking.staked(from);
            if staked < amount {
                return false;
            }
            let Some(token) = self.tokens.get_mut(&stake_token_addr()) else {
                return false;
            };
            token.transfer(staking, from, &amount);
            self.staking.staked.insert(from, staked - &amount);
            self.staking.total_supply -= amount;
            true
        } else if is(&StakingRewards::GET_REWARD) {
            let reward = self.staking.earned.remove(&from).unwrap_or_default();
            if reward == BigUint::default() {
                return true;
            }
            match self.tokens.get_mut(&reward_token_addr()) {
                Some(token) => token.transfer(staking, from, &reward),
                None => false,
            }
        } else if is(&StakingRewards::SET_REWARDS_DURATION) {
            if from != self.staking.owner {
                return false;
            }
            self.staking.duration = u64::try_from(arg_uint(data, 0)).unwrap_or(u64::MAX);
            true
        } else if is(&StakingRewards::NOTIFY_REWARD_AMOUNT) {
            if from != self.staking.owner || self.staking.duration == 0 {
                return false;
            }
            self.staking.reward_rate = arg_uint(data, 0) / BigUint::from(self.staking.duration);
            self.staking.finish_at = NOW + self.staking.duration;
            true
        } else {
            false
        }
    }

    fn receipt(&self, hash: &str) -> Value {
        match self.receipts.get(hash) {
            Some(ok) => json!({
                "transactionHash": hash,
                "status": if *ok { "0x1" } else { "0x0" },
                "blockNumber": "0x1",
                "gasUsed": "0x5208",
            }),
            None => Value::Null,
        }
    }
}

fn selector(data: &[u8]) -> [u8; 4] {
    data[..4].try_into().expect("selector")
}

fn arg_address(data: &[u8], index: usize) -> Address {
    abi::decode_address(&data[4 + 32 * index..]).expect("address argument")
}

fn arg_uint(data: &[u8], index: usize) -> BigUint {
    abi::decode_uint(&data[4 + 32 * index..]).expect("uint argument")
}

fn uint_word(value: BigUint) -> Vec<u8> {
    abi::encode_word(&Token::Uint(value)).expect("uint word")
}

fn parse_address(value: &Value) -> Address {
    Address::from_str(value.as_str().expect("address string")).expect("address")
}

fn parse_chain(params: &Value) -> u64 {
    let hex = params[0]["chainId"].as_str().expect("chainId");
    u64::from_str_radix(hex.trim_start_matches("0x"), 16).expect("hex chain id")
}

// ---------------------------------------------------------------------------
// MockWallet
// ---------------------------------------------------------------------------

pub struct MockWallet {
    state: Mutex<ChainState>,
    calls: Mutex<Vec<(String, Value)>>,
    events: WalletEventHub,
    send_gate: Mutex<Option<Arc<Notify>>>,
    read_gate: Arc<RwLock<()>>,
}

impl MockWallet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState::new()),
            calls: Mutex::new(Vec::new()),
            events: WalletEventHub::new(),
            send_gate: Mutex::new(None),
            read_gate: Arc::new(RwLock::new(())),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock()
    }

    pub fn events(&self) -> &WalletEventHub {
        &self.events
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn count_of(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(m, _)| m == method).count()
    }

    /// Park every `eth_call` until the returned guard is dropped. Calls read
    /// chain state only after they are released.
    pub async fn hold_reads(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.read_gate).write_owned().await
    }

    /// Hold every `eth_sendTransaction` until the returned notify fires.
    pub fn gate_sends(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.send_gate.lock() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl Eip1193Provider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls.lock().push((method.to_string(), params.clone()));

        if method == "eth_call" {
            drop(self.read_gate.read().await);
        }
        if method == "eth_sendTransaction" {
            let gate = self.send_gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
        }

        let mut state = self.state.lock();
        match method {
            "eth_chainId" => Ok(json!(format!("0x{:x}", state.chain_id))),
            "eth_accounts" | "eth_requestAccounts" => Ok(json!(
                state
                    .accounts
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
            )),
            "eth_call" => state.call(&params[0]),
            "eth_sendTransaction" => state.send(&params[0]),
            "eth_getTransactionReceipt" => {
                Ok(state.receipt(params[0].as_str().unwrap_or_default()))
            }
            "wallet_switchEthereumChain" => {
                let id = parse_chain(&params);
                if state.known_chains.contains(&id) {
                    state.chain_id = id;
                    Ok(Value::Null)
                } else {
                    Err(ProviderError::rpc(4902, "Unrecognized chain ID"))
                }
            }
            "wallet_addEthereumChain" => {
                let id = parse_chain(&params);
                state.known_chains.insert(id);
                state.chain_id = id;
                Ok(Value::Null)
            }
            other => Err(ProviderError::rpc(-32601, format!("{other} not supported"))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn test_settings() -> SyncSettings {
    SyncSettings {
        chain: monad_testnet(),
        poll_interval: Duration::from_secs(3600),
        receipt_timeout: Duration::from_secs(5),
        receipt_poll_interval: Duration::from_millis(10),
    }
}

pub fn staking_sync(wallet: &Arc<MockWallet>) -> Arc<ChainStateSync<StakingDashboard>> {
    let model = StakingDashboard::new(staking_addr(), stake_token_addr(), reward_token_addr());
    Arc::new(ChainStateSync::new(
        model,
        RpcClient::new(wallet.clone()),
        test_settings(),
    ))
}

pub fn counter_sync(wallet: &Arc<MockWallet>) -> Arc<ChainStateSync<CounterModel>> {
    Arc::new(ChainStateSync::new(
        CounterModel::new(counter_addr()),
        RpcClient::new(wallet.clone()),
        test_settings(),
    ))
}

/// A staking sync with the wallet state loaded and one refresh done.
pub async fn connected_staking() -> (Arc<MockWallet>, Arc<ChainStateSync<StakingDashboard>>) {
    let wallet = MockWallet::new();
    let sync = staking_sync(&wallet);
    sync.load_wallet_state().await.expect("wallet state");
    sync.refresh().await.expect("initial refresh");
    (wallet, sync)
}
