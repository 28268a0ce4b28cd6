//! Betting ledger
//!
//! Owns the player's balance and the single bet of the current round. Every
//! command either applies completely or is rejected without touching state.

use crate::games::types::{
    Bet, BetError, CashOutError, CashOutReceipt, GameState, RoundId, RoundSettlement,
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BettingLedger {
    balance: f64,
    current_bet: Option<Bet>,
    win_amount: f64,
}

impl BettingLedger {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            balance: starting_balance.max(0.0),
            current_bet: None,
            win_amount: 0.0,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn current_bet(&self) -> Option<&Bet> {
        self.current_bet.as_ref()
    }

    pub fn has_placed_bet(&self) -> bool {
        self.current_bet.is_some()
    }

    pub fn has_cashed_out(&self) -> bool {
        self.current_bet.as_ref().map_or(false, |bet| bet.cashed_out)
    }

    /// Winnings of the most recent cash-out in this round, 0 otherwise
    pub fn win_amount(&self) -> f64 {
        self.win_amount
    }

    /// Bet left over from a round other than `upcoming`, which would block it from starting
    pub fn stale_bet(&self, upcoming: RoundId) -> Option<&Bet> {
        self.current_bet
            .as_ref()
            .filter(|bet| bet.placed_in_round != upcoming)
    }

    /// Stake `amount` on `round_id`, debiting the balance
    pub fn place_bet(
        &mut self,
        amount: f64,
        state: GameState,
        round_id: RoundId,
    ) -> Result<Bet, BetError> {
        if state != GameState::Waiting {
            return Err(BetError::NotAccepting { state });
        }
        if let Some(bet) = &self.current_bet {
            return Err(BetError::AlreadyPlaced {
                round_id: bet.placed_in_round,
            });
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(BetError::InvalidAmount(amount));
        }
        if amount > self.balance {
            return Err(BetError::InsufficientBalance {
                amount,
                balance: self.balance,
            });
        }

        let bet = Bet {
            bet_id: Uuid::new_v4().to_string(),
            amount,
            placed_in_round: round_id,
            cashed_out: false,
            cash_out_multiplier: None,
            placed_at: Utc::now(),
        };
        self.balance -= amount;
        self.current_bet = Some(bet.clone());
        debug!("Bet {} of {} placed for round {}", bet.bet_id, amount, round_id);
        Ok(bet)
    }

    /// Lock in `bet × multiplier` and credit it to the balance
    pub fn cash_out(
        &mut self,
        state: GameState,
        multiplier: f64,
    ) -> Result<CashOutReceipt, CashOutError> {
        let bet = self.current_bet.as_mut().ok_or(CashOutError::NoActiveBet)?;
        if bet.cashed_out {
            return Err(CashOutError::AlreadyCashedOut {
                round_id: bet.placed_in_round,
            });
        }
        if state != GameState::Running {
            return Err(CashOutError::NotRunning { state });
        }

        let winnings = bet.amount * multiplier;
        bet.cashed_out = true;
        bet.cash_out_multiplier = Some(multiplier);
        self.balance += winnings;
        self.win_amount = winnings;

        Ok(CashOutReceipt {
            round_id: bet.placed_in_round,
            bet_amount: bet.amount,
            multiplier,
            winnings,
            balance: self.balance,
        })
    }

    /// Round-end hook: retire the bet. The stake of an uncashed bet was
    /// already debited at placement, so the balance does not change here.
    pub fn settle_round(&mut self) -> Option<RoundSettlement> {
        let bet = self.current_bet.take()?;
        Some(match bet.winnings() {
            Some(winnings) => RoundSettlement::Won { bet, winnings },
            None => RoundSettlement::Forfeited { bet },
        })
    }

    /// Clear the last win before a new round begins
    pub fn begin_round(&mut self) {
        self.win_amount = 0.0;
    }
}
