pub mod sweeper;

pub use sweeper::SettlementSweeperWorker;
