pub mod domain;
pub mod ledger;

pub use domain::{
    Direction, VoteAction, VoteCommand, VoteError, VoteOutcome, VoteReceipt, VoteRequest,
    VoteTarget,
};
pub use ledger::{DynVoteLedger, SqliteVoteLedger, VoteLedger};
