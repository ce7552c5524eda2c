//! Deterministic prompt assembly and take orchestration over loaded worlds.

pub mod director;
pub mod freeze;
pub mod picker;
pub mod seeds;
pub mod selector;

pub use director::{
    advance_take_seed, direct, Director, DirectorConfig, DirectorOutcome, DirectorRun,
    RealmChoice, Separator, MAX_TAKES, WORLD_NOT_FOUND,
};
pub use freeze::{compute_overrides, FreezeMemory, FreezeMode, FreezeScope, FreezeSettings};
pub use picker::{best_index, score, score_take};
pub use seeds::{derive_seed, ControlAfterGenerate, TakeRng, SEED_MODULUS};
pub use selector::{assemble_prompt, select, select_all, CustomIntroMode, Locks, SelectionConfig};
