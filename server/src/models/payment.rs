use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment details recorded alongside an issued ticket.
///
/// Settlement happens elsewhere; the ledger only keeps what the issuing
/// flow hands over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub reference: String,
    pub method: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}
