pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod importer;
pub mod llm;
pub mod media;
pub mod ocr;
pub mod rehost;
pub mod render;
pub mod signals;
pub mod speech;
pub mod text;
pub mod types;

pub use cache::{
    import_with_cache, normalize_url, CacheOutcome, CacheStore, FetchedImport, MemoryStore,
};
pub use config::Settings;
pub use error::ImportError;
pub use fetch::{sniff_platform, Platform};
pub use http::{HttpClient, MockClient, WebClient};
pub use importer::{ImportContext, Importer};
pub use types::{GlobalRecipe, ImportedIngredient, ImportedRecipe, InstructionStep};
