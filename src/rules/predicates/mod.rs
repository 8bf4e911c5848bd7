//! Built-in predicates, one per known condition key.

pub mod identity;
pub mod loan;
pub mod verification;

pub use identity::{
    DuplicatePhonePredicate, FraudDbMatchPredicate, NidExpiredPredicate, NidSuspendedPredicate,
};
pub use loan::{ActiveLoanPredicate, ExcessiveReapplyPredicate, RapidReapplyPredicate};
pub use verification::{NidKycMismatchPredicate, TinMismatchPredicate};
