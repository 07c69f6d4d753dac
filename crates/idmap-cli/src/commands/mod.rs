pub mod customer;
pub mod scenario;
