// Lead-video pipeline - worker core
//
// This crate provides the durable task queue behind the outreach video
// pipeline: screenshotting a lead's site, composing a personalized video,
// and uploading it to cloud storage. Any number of worker processes poll
// the same PostgreSQL store; an atomic lease protocol keeps them from
// ever executing the same task twice.
//
// The web front end, CSV ingestion, and the rendering/upload tooling are
// external collaborators reached through narrow interfaces.

pub mod collaborators;
pub mod config;
pub mod deps;
pub mod handlers;
pub mod tasks;

pub use config::*;
