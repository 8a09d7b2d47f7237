use crate::core::asset::{AccountId, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors arising from ledger debit/credit operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance: {holder} holds {available} {token}, needs {required}")]
    InsufficientBalance {
        token: TokenId,
        holder: AccountId,
        available: u128,
        required: u128,
    },
    #[error("transfer amount must be positive")]
    ZeroAmount,
    #[error("balance overflow crediting {amount} {token} to {holder}")]
    BalanceOverflow {
        token: TokenId,
        holder: AccountId,
        amount: u128,
    },
}

/// Fungible-asset ledger consumed by the protocol engine.
///
/// Debit/credit only, fail-fast: a transfer either moves the full amount
/// or returns an error having moved nothing. There are no partial
/// transfers and no ambient trust — the engine checks every result.
pub trait AssetLedger {
    /// Balance of `holder` in `token`.
    fn balance_of(&self, token: &TokenId, holder: &AccountId) -> u128;

    /// Move `amount` of `token` from `from` to `to`.
    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError>;
}

/// In-memory asset ledger keyed by (token, holder).
///
/// This is the reference implementation used by the engine, the CLI, and
/// every test. `mint` exists to seed balances; engine operations only
/// ever `transfer`, so per-token total supply is conserved across them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    #[serde(with = "balances_serde")]
    balances: HashMap<(TokenId, AccountId), u128>,
}

mod balances_serde {
    use super::*;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;

    pub fn serialize<S: serde::Serializer>(
        balances: &HashMap<(TokenId, AccountId), u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(balances.len()))?;
        for ((token, holder), amount) in balances {
            map.serialize_entry(&format!("{}:{}", token, holder), amount)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<(TokenId, AccountId), u128>, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = HashMap<(TokenId, AccountId), u128>;
            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map with \"token:holder\" keys")
            }
            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut map = HashMap::new();
                while let Some((key, value)) = access.next_entry::<String, u128>()? {
                    let (token, holder) = key
                        .split_once(':')
                        .ok_or_else(|| de::Error::custom(format!("invalid key: {key}")))?;
                    map.insert((TokenId::new(token), AccountId::new(holder)), value);
                }
                Ok(map)
            }
        }
        deserializer.deserialize_map(V)
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `token` to `holder` out of thin air.
    ///
    /// The only supply-changing operation; used to seed scenarios and tests.
    pub fn mint(
        &mut self,
        token: &TokenId,
        holder: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let entry = self
            .balances
            .entry((token.clone(), holder.clone()))
            .or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                token: token.clone(),
                holder: holder.clone(),
                amount,
            })?;
        Ok(())
    }

    /// Total circulating supply of a token across all holders.
    pub fn total_supply(&self, token: &TokenId) -> u128 {
        self.balances
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, amount)| amount)
            .sum()
    }

    /// All non-zero balances for a given holder.
    pub fn balances_for(&self, holder: &AccountId) -> HashMap<TokenId, u128> {
        self.balances
            .iter()
            .filter(|((_, h), amount)| h == holder && **amount > 0)
            .map(|((t, _), &amount)| (t.clone(), amount))
            .collect()
    }
}

impl AssetLedger for InMemoryLedger {
    fn balance_of(&self, token: &TokenId, holder: &AccountId) -> u128 {
        self.balances
            .get(&(token.clone(), holder.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token: token.clone(),
                holder: from.clone(),
                available,
                required: amount,
            });
        }
        // Debit first; the credit cannot fail after the overflow check.
        let credited = self
            .balance_of(token, to)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                token: token.clone(),
                holder: to.clone(),
                amount,
            })?;
        self.balances
            .insert((token.clone(), from.clone()), available - amount);
        self.balances.insert((token.clone(), to.clone()), credited);
        Ok(())
    }
}
