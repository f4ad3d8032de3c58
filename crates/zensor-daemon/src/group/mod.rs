mod directory;
mod registry;

pub use directory::{endpoint_url, GroupCredentials, GroupDirectoryClient, GroupInfo};
pub use registry::{GroupRegistry, GroupSummary};
