//! The fixed set of filesystem operations the bridge dispatches.

use serde::{Deserialize, Serialize};
use strum::Display;

/// A dispatchable filesystem operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Open,
    Read,
    Write,
    #[strum(to_string = "getattr")]
    GetAttr,
    #[strum(to_string = "readdir")]
    ReadDir,
}

impl Operation {
    /// Every operation, in registration order.
    pub const ALL: [Operation; 5] = [
        Operation::Open,
        Operation::Read,
        Operation::Write,
        Operation::GetAttr,
        Operation::ReadDir,
    ];
}
