pub mod intake;
pub mod laundry;
