pub mod provider;
pub mod wst;

pub use provider::SnapshotSource;
pub use wst::WstApi;
