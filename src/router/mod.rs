pub mod branch;
pub mod catalog;
pub mod flags;
pub mod plan;
pub mod stage;

pub use branch::select_branch;
pub use flags::{derive_flags, Flag, Flags};
pub use plan::{build_plan, Plan};
pub use stage::{Branch, ChannelName, Stage, StageId};
