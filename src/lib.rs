pub mod chat;
pub mod constants;
pub mod error;
pub mod formatter;
pub mod links;
pub mod llm_interaction;
pub mod probe;
pub mod sitemap;
pub mod taxonomy;
pub mod web_server;
