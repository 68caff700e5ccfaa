pub mod permission_factory;
pub mod permissions;
pub mod predicate_factory;
pub mod roles;
pub mod service;
pub mod variables;
