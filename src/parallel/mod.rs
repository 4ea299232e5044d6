pub mod batch;
pub mod pool;

pub use batch::{batch_ranges, run_sharded};
pub use pool::WorkerPool;
