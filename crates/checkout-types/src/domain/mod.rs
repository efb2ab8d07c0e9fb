pub mod cart;
pub mod money;
pub mod notification;
pub mod order;
pub mod payment;
