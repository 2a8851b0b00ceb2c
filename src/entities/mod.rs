pub mod discrepancy_authorization;
pub mod product;
pub mod register_session;
pub mod register_transaction;
pub mod stock_movement;
pub mod transaction_line;
pub mod transaction_payment;

pub use discrepancy_authorization::Entity as DiscrepancyAuthorization;
pub use product::Entity as Product;
pub use register_session::Entity as RegisterSession;
pub use register_transaction::Entity as RegisterTransaction;
pub use stock_movement::Entity as StockMovement;
pub use transaction_line::Entity as TransactionLine;
pub use transaction_payment::Entity as TransactionPayment;
