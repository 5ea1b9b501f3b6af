pub mod order_changes;
pub mod orders;

pub use order_changes::{ChangeParseError, ChangeRow, OrderChange};
pub use orders::{Order, OrderStatus};
