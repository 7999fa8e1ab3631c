pub mod update_workspaces;

pub use update_workspaces::update_workspaces;
