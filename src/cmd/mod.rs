pub mod coordinator;
pub mod standalone;
pub mod worker;
