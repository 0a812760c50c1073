//! Flow kinds, states, and the handle a caller awaits.

use std::fmt;
use tokio::task::JoinHandle;

use crate::result_handler::OperationOutcome;
use crate::CoreError;

/// One user-initiated multi-step operation. Each kind owns one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Stake,
    Unstake,
    Claim,
    Faucet,
}

impl FlowKind {
    pub const ALL: [FlowKind; 4] = [Self::Stake, Self::Unstake, Self::Claim, Self::Faucet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stake => "stake",
            Self::Unstake => "unstake",
            Self::Claim => "claim",
            Self::Faucet => "faucet",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowState {
    Idle,
    CheckingAllowance,
    Approving,
    WaitingApproval,
    Staking,
    WaitingStake,
    Unstaking,
    WaitingUnstake,
    AutoClaiming,
    Claiming,
    WaitingClaim,
    Done,
    Failed,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// An approval for the flow has been or is being submitted but not yet settled.
    pub fn awaiting_approval(&self) -> bool {
        matches!(self, Self::Approving | Self::WaitingApproval)
    }
}

/// A state change, as broadcast to flow observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowTransition {
    pub kind: FlowKind,
    pub state: FlowState,
}

/// How a flow ended.
#[derive(Clone, Debug)]
pub struct FlowReport {
    pub kind: FlowKind,
    /// Outcomes reported during the flow, in order.
    pub outcomes: Vec<OperationOutcome>,
    pub result: Result<(), CoreError>,
}

impl FlowReport {
    pub fn final_state(&self) -> FlowState {
        if self.result.is_ok() {
            FlowState::Done
        } else {
            FlowState::Failed
        }
    }

    pub fn is_done(&self) -> bool {
        self.result.is_ok()
    }
}

/// A running flow. Dropping the handle does not stop the flow.
pub struct FlowHandle {
    kind: FlowKind,
    task: JoinHandle<FlowReport>,
}

impl FlowHandle {
    pub(crate) fn new(kind: FlowKind, task: JoinHandle<FlowReport>) -> Self {
        Self { kind, task }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the flow to reach `Done` or `Failed`.
    pub async fn wait(self) -> Result<FlowReport, CoreError> {
        self.task
            .await
            .map_err(|e| CoreError::TaskFailed(e.to_string()))
    }
}
