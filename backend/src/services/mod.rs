pub mod extraction_cache;
pub mod extraction_service;
pub mod ledger_repository;
pub mod search_service;
pub mod solr_repository;
pub mod source_client;
pub mod storage;
