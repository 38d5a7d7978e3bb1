pub mod ripgrep;
pub mod runner;
pub mod walk;

use std::sync::Arc;

use crate::config::{SearchBackend, SearchConfig};
use crate::keywords::KeywordCatalog;
use crate::narrow::NarrowGroups;

pub use ripgrep::RipgrepSearcher;
pub use runner::{spawn_run, DirectorySearcher, RunFailure, RunId, RunOutcome, SearchEvent};
pub use walk::WalkSearcher;

/// Build the directory searcher selected by `config.backend`.
///
/// `auto` uses ripgrep when `rg_path` runs and the walker otherwise.
pub fn searcher_from_config(
    config: &SearchConfig,
    catalog: Arc<dyn KeywordCatalog>,
    narrow: NarrowGroups,
) -> Arc<dyn DirectorySearcher> {
    let use_rg = match config.backend {
        SearchBackend::Ripgrep => true,
        SearchBackend::Walk => false,
        SearchBackend::Auto => {
            let found = RipgrepSearcher::available(&config.rg_path);
            if !found {
                tracing::info!(rg = %config.rg_path, "ripgrep not found, using the built-in walker");
            }
            found
        }
    };
    if use_rg {
        Arc::new(RipgrepSearcher::new(config, catalog, narrow))
    } else {
        Arc::new(WalkSearcher::new(config, catalog, narrow))
    }
}
