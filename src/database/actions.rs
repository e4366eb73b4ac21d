pub mod favorites;
pub mod follows;
pub mod ingredients;
pub mod recipes;
pub mod shoplist;
pub mod tags;
pub mod users;

pub use favorites::*;
pub use follows::*;
pub use ingredients::*;
pub use recipes::*;
pub use shoplist::*;
pub use tags::*;
pub use users::*;
