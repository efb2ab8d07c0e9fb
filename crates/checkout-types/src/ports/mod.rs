pub mod gateways;
pub mod order_ledger;
