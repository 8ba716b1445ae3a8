use ethers::types::{Address, TxHash};
use crate::data::types::{Side, TxInclusion};

/// Where a submission stands. `Confirmed` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Encrypting,
    AwaitingSignature,
    Pending { tx_hash: TxHash },
    Confirmed { tx_hash: TxHash, block_number: u64 },
    Failed { message: String },
}

impl SubmissionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SubmissionState::Idle)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Confirmed { .. } | SubmissionState::Failed { .. })
    }

    /// A submission is between the first encryption step and a terminal state.
    pub fn is_in_flight(&self) -> bool {
        !self.is_idle() && !self.is_terminal()
    }
}

/// Caller-side order ticket: the chosen side and the amount as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDraft {
    pub side: Side,
    pub amount: String,
}

impl TicketDraft {
    pub fn new(side: Side, amount: impl Into<String>) -> Self {
        Self {
            side,
            amount: amount.into(),
        }
    }

    /// Whole share to encrypt. Unparsable, non-finite or non-positive
    /// amounts fall back to one share.
    pub fn share_value(&self) -> u64 {
        match self.amount.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => (v.floor() as u64).max(1),
            _ => 1,
        }
    }

    pub fn clear_amount(&mut self) {
        self.amount.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No account was connected; a connection was requested instead.
    ConnectRequested(Option<Address>),
    Confirmed(TxInclusion),
}
