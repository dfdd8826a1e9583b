//! HTTP adapters: the Solr index and the activities origin.

mod activities_client;
mod solr;

pub use activities_client::HttpDocumentSource;
pub use solr::SolrIndex;
