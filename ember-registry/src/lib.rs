//! The content tables: blocks with their property specs, state tables, shape
//! models, tags and behaviour lists, plus the minimal item table the
//! placement path needs. Everything is built once at startup and read-only
//! afterwards; the engine never mutates registry data.

pub mod behaviour;
pub mod blocks;
pub mod items;
pub mod properties;
pub mod shapes;
pub mod vanilla_blocks;

use std::sync::LazyLock;

pub use behaviour::BehaviourKind;
pub use blocks::{Block, BlockId, BlockStateInfo, BlockTag, Registry};
pub use properties::{Property, PropertySpec};
pub use shapes::{BlockModel, ModelId};

/// The global registry, frozen on first access.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::vanilla);
