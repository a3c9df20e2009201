// src/sources/providers/mod.rs
pub mod arxiv;
pub mod discord;
pub mod fixture;
pub mod hackernews;
pub mod reddit;
pub mod stackexchange;
