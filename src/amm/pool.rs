use crate::core::asset::TokenId;
use crate::core::error::EngineError;
use crate::core::hash::Digest32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum pool fee: 10%.
pub const MAX_FEE_BPS: u32 = 1_000;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Content-derived pool identifier.
///
/// Deterministic hash of `(token_a, token_b, fee_bps)` — no randomness and
/// no counters, so the same pair and fee always name the same pool. The
/// tuple is hashed in the order given: `(A, B, fee)` and `(B, A, fee)` are
/// distinct pools.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PoolId(Digest32);

impl PoolId {
    pub fn derive(token_a: &TokenId, token_b: &TokenId, fee_bps: u32) -> Self {
        Self(Digest32::of_parts(&[
            token_a.as_str().as_bytes(),
            token_b.as_str().as_bytes(),
            &fee_bps.to_be_bytes(),
        ]))
    }

    pub fn digest(&self) -> &Digest32 {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Floor of `a * b / denominator`, widened so the product cannot silently
/// wrap. Errors when the quotient itself exceeds `u128`.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, EngineError> {
    if denominator == 0 {
        return Err(EngineError::ArithmeticOverflow("division by zero"));
    }
    match a.checked_mul(b) {
        Some(product) => Ok(product / denominator),
        // Product needs more than 128 bits; fall back to wide arithmetic.
        None => wide_mul_div(a, b, denominator),
    }
}

/// 256-bit `a * b / d` using schoolbook limbs. Only reached when the
/// 128-bit product overflows.
fn wide_mul_div(a: u128, b: u128, d: u128) -> Result<u128, EngineError> {
    const MASK: u128 = (1u128 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    // 256-bit product as four 64-bit limbs (little-endian).
    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | ((mid & MASK) << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);

    if hi == 0 {
        return Ok(lo / d);
    }
    if hi >= d {
        return Err(EngineError::ArithmeticOverflow("mul_div quotient"));
    }
    // Long division of the 256-bit value [hi, lo] by d, bit by bit.
    // rem stays < d; when shifting pushes its top bit out, the true
    // remainder is 2^128 + rem and wrapping subtraction of d is exact.
    let mut rem: u128 = 0;
    let mut quot: u128 = 0;
    for i in (0..256).rev() {
        let bit = if i >= 128 {
            (hi >> (i - 128)) & 1
        } else {
            (lo >> i) & 1
        };
        let carry = rem >> 127;
        rem = (rem << 1) | bit;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            if i < 128 {
                quot |= 1 << i;
            } else {
                return Err(EngineError::ArithmeticOverflow("mul_div quotient"));
            }
        }
    }
    Ok(quot)
}

/// Integer square root (floor), Newton's method.
pub fn integer_sqrt(value: u128) -> u128 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// Constant-product swap quote with a basis-point fee taken on the input.
///
/// `out = in * (10000 - fee) * r_out / (r_in * 10000 + in * (10000 - fee))`
pub fn quote_out(
    amount_in: u128,
    reserve_in: u128,
    reserve_out: u128,
    fee_bps: u32,
) -> Result<u128, EngineError> {
    if fee_bps as u128 >= BPS_DENOMINATOR {
        return Err(EngineError::InvalidParameter(format!(
            "fee {fee_bps} bps consumes the whole input"
        )));
    }
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return Ok(0);
    }
    let amount_in_after_fee = amount_in
        .checked_mul(BPS_DENOMINATOR - fee_bps as u128)
        .ok_or(EngineError::ArithmeticOverflow("swap input"))?;
    let numerator_denom = reserve_in
        .checked_mul(BPS_DENOMINATOR)
        .and_then(|v| v.checked_add(amount_in_after_fee))
        .ok_or(EngineError::ArithmeticOverflow("swap denominator"))?;
    mul_div(amount_in_after_fee, reserve_out, numerator_denom)
}

/// A constant-product liquidity pool.
///
/// Holds reserves of two tokens and mints proportional shares against
/// deposits. The defining invariant: `reserve_a * reserve_b` never
/// decreases across a swap, and strictly increases when `fee_bps > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    id: PoolId,
    token_a: TokenId,
    token_b: TokenId,
    reserve_a: u128,
    reserve_b: u128,
    total_shares: u128,
    fee_bps: u32,
    active: bool,
}

impl LiquidityPool {
    /// Create an empty pool. Callers validate tokens and fee beforehand.
    pub fn new(token_a: TokenId, token_b: TokenId, fee_bps: u32) -> Self {
        let id = PoolId::derive(&token_a, &token_b, fee_bps);
        Self {
            id,
            token_a,
            token_b,
            reserve_a: 0,
            reserve_b: 0,
            total_shares: 0,
            fee_bps,
            active: true,
        }
    }

    // --- Accessors ---

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn token_a(&self) -> &TokenId {
        &self.token_a
    }

    pub fn token_b(&self) -> &TokenId {
        &self.token_b
    }

    pub fn reserve_a(&self) -> u128 {
        self.reserve_a
    }

    pub fn reserve_b(&self) -> u128 {
        self.reserve_b
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn contains(&self, token: &TokenId) -> bool {
        token == &self.token_a || token == &self.token_b
    }

    /// The constant-product invariant value `reserve_a * reserve_b`.
    pub fn k(&self) -> Result<u128, EngineError> {
        self.reserve_a
            .checked_mul(self.reserve_b)
            .ok_or(EngineError::ArithmeticOverflow("pool invariant"))
    }

    /// Mid price of token A in units of token B, for display only.
    pub fn spot_price(&self) -> f64 {
        if self.reserve_a == 0 {
            return 0.0;
        }
        self.reserve_b as f64 / self.reserve_a as f64
    }

    /// Shares to mint for a deposit, and the ratio check on follow-up
    /// deposits. Does not touch reserves.
    pub fn preview_deposit(&self, amount_a: u128, amount_b: u128) -> Result<u128, EngineError> {
        if amount_a == 0 || amount_b == 0 {
            return Err(EngineError::InvalidParameter(
                "deposit amounts must be positive".into(),
            ));
        }
        if self.total_shares == 0 {
            let product = amount_a
                .checked_mul(amount_b)
                .ok_or(EngineError::ArithmeticOverflow("initial deposit"))?;
            let shares = integer_sqrt(product);
            if shares == 0 {
                return Err(EngineError::InvalidParameter(
                    "initial deposit too small to mint shares".into(),
                ));
            }
            return Ok(shares);
        }
        // Follow-up deposits must preserve the reserve ratio.
        let required_b = mul_div(amount_a, self.reserve_b, self.reserve_a)?;
        if amount_b < required_b {
            return Err(EngineError::RatioMismatch {
                required: required_b,
                provided: amount_b,
            });
        }
        mul_div(amount_a, self.total_shares, self.reserve_a)
    }

    /// Record a deposit previously previewed. Reserves grow by the full
    /// deposited amounts.
    pub fn apply_deposit(
        &mut self,
        amount_a: u128,
        amount_b: u128,
        shares: u128,
    ) -> Result<(), EngineError> {
        self.reserve_a = self
            .reserve_a
            .checked_add(amount_a)
            .ok_or(EngineError::ArithmeticOverflow("reserve A"))?;
        self.reserve_b = self
            .reserve_b
            .checked_add(amount_b)
            .ok_or(EngineError::ArithmeticOverflow("reserve B"))?;
        self.total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(EngineError::ArithmeticOverflow("total shares"))?;
        Ok(())
    }

    /// Amounts returned for burning `shares`. Does not touch reserves.
    pub fn preview_withdraw(&self, shares: u128) -> Result<(u128, u128), EngineError> {
        if shares == 0 || self.total_shares == 0 {
            return Err(EngineError::InvalidParameter(
                "shares to burn must be positive".into(),
            ));
        }
        let amount_a = mul_div(shares, self.reserve_a, self.total_shares)?;
        let amount_b = mul_div(shares, self.reserve_b, self.total_shares)?;
        Ok((amount_a, amount_b))
    }

    /// Record a withdrawal previously previewed.
    pub fn apply_withdraw(&mut self, amount_a: u128, amount_b: u128, shares: u128) {
        self.reserve_a -= amount_a;
        self.reserve_b -= amount_b;
        self.total_shares -= shares;
    }

    /// Compute the output amount for swapping `amount_in` of `token_in`.
    pub fn preview_swap(
        &self,
        token_in: &TokenId,
        amount_in: u128,
    ) -> Result<(TokenId, u128), EngineError> {
        if !self.contains(token_in) {
            return Err(EngineError::TokenNotInPool(token_in.clone()));
        }
        let (reserve_in, reserve_out, token_out) = if token_in == &self.token_a {
            (self.reserve_a, self.reserve_b, self.token_b.clone())
        } else {
            (self.reserve_b, self.reserve_a, self.token_a.clone())
        };
        let amount_out = quote_out(amount_in, reserve_in, reserve_out, self.fee_bps)?;
        Ok((token_out, amount_out))
    }

    /// Record a swap previously previewed. Both reserves move in the same
    /// commit.
    pub fn apply_swap(&mut self, token_in: &TokenId, amount_in: u128, amount_out: u128) {
        if token_in == &self.token_a {
            self.reserve_a += amount_in;
            self.reserve_b -= amount_out;
        } else {
            self.reserve_b += amount_in;
            self.reserve_a -= amount_out;
        }
    }
}
