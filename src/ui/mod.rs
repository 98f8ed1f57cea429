pub mod render;
pub mod state;

pub use render::{render_feed, render_row};
pub use state::{FeedRow, FeedState, Reaction};
