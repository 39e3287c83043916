// Trust & Safety enforcement engine.
//
// **Architecture Overview:**
// - `core/` = Business logic (normalizer, lexicon, classifier adapters, enforcement)
// - `infra/` = Implementations of core traits (HTTP classifiers, trust stores)
// - `config` = Environment-driven settings used by the composition root
//
// The binary in `main.rs` wires these together; callers embedding the engine
// do the same with their own stores.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;

pub mod config;
