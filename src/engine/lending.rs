use super::DefiEngine;
use crate::amm::pool::{mul_div, BPS_DENOMINATOR};
use crate::core::asset::{AccountId, TokenId};
use crate::core::error::EngineError;
use crate::core::event::EngineEvent;
use crate::core::ledger::AssetLedger;
use crate::loan::{FlashBorrower, FlashLoanReceipt};
use log::{info, warn};

impl DefiEngine {
    /// Lend `amount` of `token` from custody for the duration of the
    /// borrower callback.
    ///
    /// The whole loan is one atomic operation: principal out, callback,
    /// repayment check, fee sweep. If the callback errors or custody is
    /// not made whole (principal plus fee) afterwards, every state change
    /// made since entry is rolled back and the loan never happened.
    pub fn flash_loan(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        amount: u128,
        data: &[u8],
        borrower: &mut dyn FlashBorrower,
    ) -> Result<FlashLoanReceipt, EngineError> {
        let token = token.clone();
        self.run(true, |engine| {
            if amount == 0 {
                return Err(EngineError::InvalidParameter(
                    "loan amount must be positive".into(),
                ));
            }
            let custody = engine.config.custody_account.clone();
            let fee = mul_div(amount, engine.config.flash_fee_bps as u128, BPS_DENOMINATOR)?;
            let pre_balance = engine.ledger.balance_of(&token, &custody);

            engine.ledger.transfer(&token, &custody, caller, amount)?;
            borrower.execute_operation(engine, &token, amount, fee, data)?;

            let expected = pre_balance
                .checked_add(fee)
                .ok_or(EngineError::ArithmeticOverflow("flash loan repayment"))?;
            let actual = engine.ledger.balance_of(&token, &custody);
            if actual < expected {
                warn!(
                    "flash loan of {} {} by {} under-repaid: {} < {}",
                    amount, token, caller, actual, expected
                );
                return Err(EngineError::RepaymentShortfall { expected, actual });
            }

            if fee > 0 {
                let collector = engine.config.fee_collector.clone();
                engine.ledger.transfer(&token, &custody, &collector, fee)?;
            }

            engine.emit(EngineEvent::FlashLoanExecuted {
                borrower: caller.clone(),
                token: token.clone(),
                amount,
                fee,
            });
            info!("flash loan of {} {} by {} repaid, fee {}", amount, token, caller, fee);
            Ok(FlashLoanReceipt { token, amount, fee })
        })
    }
}
