pub mod input;
pub mod sensor;
pub mod worker;
