pub mod enrichment;
pub mod sink;

pub use enrichment::{
    HttpPriceMetadataService, HttpWalletEnrichment, PriceCache, PriceMetadataService, TokenMetadata,
    WalletEnrichment,
};
pub use sink::{AppendSink, HttpAppendSink};
