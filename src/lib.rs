//! jobflow - job listing discovery, company research and application drafts.
//!
//! Listings are extracted from a job board search page, enriched with
//! LLM summaries of the hiring company, and turned into cover email drafts.
//! Every stage is resumable and retried a bounded number of times.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
