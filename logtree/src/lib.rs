// Life of a node:
// 1. A tree algorithm creates a node (fresh id from the environment's allocator)
//    or faults one in from the log (id read from the record, then post-fetch init)
// 2. The log writer marshals it through the `Loggable` contract
// 3. Structural mutations query it through the `TreeNode` contract
//    (ancestry, deletability, duplicate-subtree search)
// 4. On subtree removal it deregisters from the INList and reports its
//    obsolete log space to the utilization tracker
//
// System components:
//  - Node id allocation and generation clock
//  - Node variants (IN, BIN, DIN, DBIN, LN, DupCountLN) and enum dispatch
//  - Log entry framing, in-memory log and node-id replay

pub mod config;
pub mod environment;
pub mod log;
pub mod recovery;
pub mod tree;

pub use config::{ConfigError, EngineConfig};
pub use environment::{Checkpoint, Environment};
