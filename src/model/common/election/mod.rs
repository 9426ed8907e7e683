mod category;
mod state;

pub use category::ElectionCategory;
pub use state::ElectionStatus;
