//! inbox-pilot — message triage and auto-reply suggestion core.

pub mod brand;
pub mod config;
pub mod connectors;
pub mod error;
pub mod llm;
pub mod review;
pub mod triage;
