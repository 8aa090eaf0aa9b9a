//! Pure business rules used by the repositories.

pub mod numbering;
pub mod totals;
pub mod xrechnung;

pub use numbering::next_customer_number;
pub use totals::{DocumentTotals, TaxedLine};
