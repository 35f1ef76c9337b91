mod dbool;
mod dtimestamp;
mod duuid;

pub use dbool::DBool;
pub use dtimestamp::DTimestamp;
pub use duuid::DUuid;
