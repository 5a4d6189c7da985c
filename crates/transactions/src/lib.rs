//! Transactions domain: sales, rentals, purchases and returns.
//!
//! Holds the transaction state machine, line arithmetic, payment and refund
//! bookkeeping, and the rental return inspection workflow. No IO.

pub mod line;
pub mod numbering;
pub mod rental_return;
pub mod reports;
pub mod transaction;

pub use line::{LineInput, LineType, RentalPeriodUnit, TransactionLine};
pub use rental_return::{
    DEFAULT_DAILY_LATE_FEE, DamageLevel, RentalReturn, ReturnInput, ReturnLine, ReturnLineInput, ReturnLineStatus,
    ReturnLineUpdate, ReturnStatus, ReturnType, ReturnUpdate, ensure_no_open_return,
};
pub use reports::{Bucket, TransactionSummary};
pub use transaction::{
    PaymentMethod, PaymentRecord, PaymentStatus, Transaction, TransactionInput, TransactionStatus, TransactionType,
    TransactionUpdate,
};
