// Library interface for newsflash modules
// This allows tests and other binaries to import modules

pub mod article;
pub mod ingestion;
pub mod notify;
pub mod scraping;
pub mod storage;
pub mod subscribers;
pub mod telegram;
pub mod worker;
