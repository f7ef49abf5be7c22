pub mod auth;
pub mod catalog;
pub mod client;
pub mod company;
pub mod document;
pub mod engagement;
pub mod lead;
pub mod purchase;
pub mod settings;
pub mod subscription;
