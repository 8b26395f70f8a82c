pub mod category;
pub mod transaction;
pub mod user;

pub use category::{Category, Kind};
pub use transaction::{Transaction, TransactionWithCategory};
pub use user::{Role, User, UserWithStats};
