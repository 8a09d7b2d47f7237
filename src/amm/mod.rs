//! Constant-product liquidity pools.

pub mod pool;
