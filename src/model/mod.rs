//! Plain data: coordinates, validated orders, the wire format, and the published view.

pub mod geo;
pub mod order;
pub mod payload;
pub mod view;

pub use geo::*;
pub use order::*;
pub use payload::*;
pub use view::*;
