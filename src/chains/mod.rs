pub mod evm;
pub mod traits;
