// Configuration runs over one or more hosts
pub mod config;

// Object declaration from manifests
pub mod emulator;
