//! Immutable snapshots of contract views.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use monad_chain::{Address, format_token, format_units};

/// Whether a view depends on the connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewScope {
    Contract,
    User,
}

/// A fixed-point amount read from a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewValue {
    pub raw: BigUint,
    pub decimals: u8,
    pub scope: ViewScope,
}

impl ViewValue {
    pub fn new(raw: BigUint, decimals: u8, scope: ViewScope) -> Self {
        Self {
            raw,
            decimals,
            scope,
        }
    }

    pub fn zero(decimals: u8, scope: ViewScope) -> Self {
        Self::new(BigUint::default(), decimals, scope)
    }

    pub fn is_zero(&self) -> bool {
        self.raw == BigUint::default()
    }

    /// Full-precision decimal rendering.
    pub fn display(&self) -> String {
        format_units(&self.raw, self.decimals)
    }

    /// Rendering with at most `max_fraction_digits` fraction digits.
    pub fn display_truncated(&self, max_fraction_digits: usize) -> String {
        format_token(&self.raw, self.decimals, max_fraction_digits)
    }
}

/// A non-numeric view, e.g. an owner address or a token symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextValue {
    pub value: String,
    pub scope: ViewScope,
}

/// The output of one complete read pass, before it is stamped into a
/// [`ChainStateSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotBody {
    values: BTreeMap<String, ViewValue>,
    text: BTreeMap<String, TextValue>,
}

impl SnapshotBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract(&mut self, name: &str, raw: BigUint, decimals: u8) -> &mut Self {
        self.values
            .insert(name.to_string(), ViewValue::new(raw, decimals, ViewScope::Contract));
        self
    }

    pub fn user(&mut self, name: &str, raw: BigUint, decimals: u8) -> &mut Self {
        self.values
            .insert(name.to_string(), ViewValue::new(raw, decimals, ViewScope::User));
        self
    }

    pub fn text(&mut self, name: &str, value: impl Into<String>, scope: ViewScope) -> &mut Self {
        self.text.insert(
            name.to_string(),
            TextValue {
                value: value.into(),
                scope,
            },
        );
        self
    }

    pub fn value(&self, name: &str) -> Option<&ViewValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every cached contract read at one point in time.
///
/// Snapshots are never edited in place. Each refresh builds a new one and
/// swaps it in whole, so a reader holding an `Arc<ChainStateSnapshot>` always
/// sees the output of exactly one read pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStateSnapshot {
    generation: u64,
    account: Option<Address>,
    chain_id: Option<u64>,
    values: BTreeMap<String, ViewValue>,
    text: BTreeMap<String, TextValue>,
    taken_at: DateTime<Utc>,
}

impl ChainStateSnapshot {
    /// The placeholder published before the first refresh completes.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            account: None,
            chain_id: None,
            values: BTreeMap::new(),
            text: BTreeMap::new(),
            taken_at: Utc::now(),
        }
    }

    pub fn from_body(
        generation: u64,
        account: Option<Address>,
        chain_id: Option<u64>,
        body: SnapshotBody,
    ) -> Self {
        Self {
            generation,
            account,
            chain_id,
            values: body.values,
            text: body.text,
            taken_at: Utc::now(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn value(&self, name: &str) -> Option<&ViewValue> {
        self.values.get(name)
    }

    /// Raw amount of a view; zero when the view is absent.
    pub fn raw(&self, name: &str) -> BigUint {
        self.values
            .get(name)
            .map(|v| v.raw.clone())
            .unwrap_or_default()
    }

    /// Decimal scale of a view; `fallback` when the view is absent.
    pub fn decimals(&self, name: &str, fallback: u8) -> u8 {
        self.values.get(name).map_or(fallback, |v| v.decimals)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(|t| t.value.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &ViewValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.text.is_empty()
    }

    /// A copy with every user-scoped view reset (amounts to zero, text to
    /// empty) and no account. Contract-scoped views are kept as-is.
    pub fn with_user_scope_cleared(&self, generation: u64) -> Self {
        let values = self
            .values
            .iter()
            .map(|(name, v)| {
                let v = match v.scope {
                    ViewScope::User => ViewValue::zero(v.decimals, ViewScope::User),
                    ViewScope::Contract => v.clone(),
                };
                (name.clone(), v)
            })
            .collect();
        let text = self
            .text
            .iter()
            .map(|(name, t)| {
                let t = match t.scope {
                    ViewScope::User => TextValue {
                        value: String::new(),
                        scope: ViewScope::User,
                    },
                    ViewScope::Contract => t.clone(),
                };
                (name.clone(), t)
            })
            .collect();

        Self {
            generation,
            account: None,
            chain_id: self.chain_id,
            values,
            text,
            taken_at: Utc::now(),
        }
    }
}
