use std::borrow::Cow;
use std::fmt::Write as _;
use std::str::FromStr;

use director_contracts::events::{DirectorEvent, EventLog};
use director_contracts::runs::session::{
    new_session_id, Chosen, PickedResult, PickerConfig, Session, Take, TakeSeedMode, SESSION_TYPE,
};
use director_contracts::runs::session_files::now_local_iso;
use director_contracts::world::{Category, World, WorldRegistry};

use crate::freeze::{FreezeMemory, FreezeSettings};
use crate::picker::{best_index, score_take};
use crate::seeds::{fresh_seed, increment_seed, ControlAfterGenerate, TakeRng};
use crate::selector::{assemble_prompt, select_all, CustomIntroMode, Locks, SelectionConfig};

pub const WORLD_NOT_FOUND: &str = "(world not found)";

/// Upper bound on takes per batch; larger requests are clamped.
pub const MAX_TAKES: u32 = 64;

/// Text placed between the system prompt and the assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Separator {
    #[default]
    DoubleNewline,
    Newline,
    EmDash,
    Pipe,
    Comma,
    Custom(String),
}

impl Separator {
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Separator::DoubleNewline => Cow::Borrowed("\n\n"),
            Separator::Newline => Cow::Borrowed("\n"),
            Separator::EmDash => Cow::Borrowed(" \u{2014} "),
            Separator::Pipe => Cow::Borrowed(" | "),
            Separator::Comma => Cow::Borrowed(", "),
            Separator::Custom(raw) => Cow::Owned(unescape(raw)),
        }
    }
}

impl FromStr for Separator {
    type Err = String;

    /// Named choices first; anything else is a custom literal.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw {
            "double_newline" | "\\n\\n" | "\n\n" => Separator::DoubleNewline,
            "newline" | "\\n" | "\n" => Separator::Newline,
            "em_dash" | " \u{2014} " => Separator::EmDash,
            "pipe" | " | " => Separator::Pipe,
            "comma" | ", " => Separator::Comma,
            other => Separator::Custom(other.to_string()),
        })
    }
}

/// Interprets `\n`, `\t`, `\r`, `\\`, `\"` and `\'`; other backslashes stay.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Which color realm feeds realm-keyed categories.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RealmChoice {
    /// Union of every realm.
    #[default]
    Union,
    Named(String),
    /// Drawn once per session from the `color_realm` stream of the start seed.
    Seeded,
}

impl RealmChoice {
    /// Flat world for the selector plus the realm actually used.
    pub fn resolve(&self, world: &World, seed: u64) -> (World, Option<String>) {
        let realm = match self {
            RealmChoice::Union => None,
            RealmChoice::Named(name) => Some(name.clone()),
            RealmChoice::Seeded => TakeRng::derived(seed, "color_realm")
                .pick(world.color_realms.as_slice())
                .cloned(),
        };
        (world.flatten(realm.as_deref()), realm)
    }
}

impl FromStr for RealmChoice {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "" | "none" | "all" => RealmChoice::Union,
            "seeded" | "random" => RealmChoice::Seeded,
            _ => RealmChoice::Named(trimmed.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorConfig {
    pub world: String,
    pub seed: u64,
    pub take_count: u32,
    pub take_seed_mode: TakeSeedMode,
    pub control_after_generate: ControlAfterGenerate,
    pub custom_intro_mode: CustomIntroMode,
    pub custom_intro_index: Option<u32>,
    pub locks: Locks,
    pub freeze: FreezeSettings,
    pub realm: RealmChoice,
    pub include_system_prompt: bool,
    pub separator: Separator,
    pub picker: PickerConfig,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            world: String::new(),
            seed: 0,
            take_count: 1,
            take_seed_mode: TakeSeedMode::default(),
            control_after_generate: ControlAfterGenerate::default(),
            custom_intro_mode: CustomIntroMode::default(),
            custom_intro_index: None,
            locks: Locks::default(),
            freeze: FreezeSettings::default(),
            realm: RealmChoice::default(),
            include_system_prompt: true,
            separator: Separator::default(),
            picker: PickerConfig::default(),
        }
    }
}

impl DirectorConfig {
    pub fn new(world: impl Into<String>, seed: u64) -> Self {
        Self {
            world: world.into(),
            seed,
            ..Self::default()
        }
    }

    fn selection(&self, seed: u64, overrides: Chosen) -> SelectionConfig {
        SelectionConfig {
            seed,
            custom_intro_mode: self.custom_intro_mode,
            custom_intro_index: self.custom_intro_index,
            locks: self.locks,
            overrides,
        }
    }
}

/// A finished batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectorRun {
    pub session: Session,
    /// Seed the node reports after the batch.
    pub next_seed: u64,
}

impl DirectorRun {
    pub fn picked(&self) -> Option<PickedResult> {
        self.session.picked()
    }

    pub fn final_prompt(&self) -> &str {
        self.session
            .picked_take()
            .map(|take| take.final_prompt.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectorOutcome {
    WorldNotFound { world: String },
    Completed(Box<DirectorRun>),
}

impl DirectorOutcome {
    pub fn run(&self) -> Option<&DirectorRun> {
        match self {
            DirectorOutcome::Completed(run) => Some(run.as_ref()),
            DirectorOutcome::WorldNotFound { .. } => None,
        }
    }

    /// Picked final prompt, or the not-found sentinel.
    pub fn final_prompt(&self) -> String {
        match self {
            DirectorOutcome::Completed(run) => run.final_prompt().to_string(),
            DirectorOutcome::WorldNotFound { world } => format!("{WORLD_NOT_FOUND} {world}"),
        }
    }
}

/// Take orchestrator bound to a world registry and an optional event log.
#[derive(Debug)]
pub struct Director {
    registry: WorldRegistry,
    events: Option<EventLog>,
}

impl Director {
    pub fn new(registry: WorldRegistry) -> Self {
        Self {
            registry,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Runs one batch. A missing world is reported as an outcome, not an error.
    pub fn run(&mut self, config: &DirectorConfig, memory: &mut FreezeMemory) -> DirectorOutcome {
        let Some(world) = self.registry.get(&config.world) else {
            tracing::warn!(world = %config.world, "world not found");
            return DirectorOutcome::WorldNotFound {
                world: config.world.clone(),
            };
        };
        let run = direct(world, config, memory, self.events.as_ref());
        DirectorOutcome::Completed(Box::new(run))
    }
}

/// Generates `take_count` takes from `world`, updating `memory` after each.
pub fn direct(
    world: &World,
    config: &DirectorConfig,
    memory: &mut FreezeMemory,
    events: Option<&EventLog>,
) -> DirectorRun {
    let session_id = new_session_id();
    let emit = |event: DirectorEvent| {
        let Some(log) = events else {
            return;
        };
        if let Err(err) = log.append(&session_id, &event) {
            tracing::warn!(event = event.name(), error = %err, "failed to write event");
        }
    };
    let take_count = config.take_count.clamp(1, MAX_TAKES);
    if take_count != config.take_count {
        tracing::warn!(requested = config.take_count, take_count, "take count clamped");
    }
    let (world, realm) = config.realm.resolve(world, config.seed);
    let system_prompt = world.system_prompt.trim().to_string();

    emit(DirectorEvent::SessionStarted {
        world: world.name.clone(),
        realm: realm.clone(),
        seed_start: config.seed,
        take_count,
        take_seed_mode: config.take_seed_mode,
    });

    let mut takes: Vec<Take> = Vec::new();
    let mut current_seed = config.seed;
    for take_index in 1..=take_count {
        let overrides = memory.overrides(&config.freeze);
        let forced: Vec<Category> = overrides.categories().collect();
        let chosen = select_all(&world, &config.selection(current_seed, overrides));
        let prompt = assemble_prompt(&world, &chosen);
        let final_prompt = if config.include_system_prompt && !system_prompt.is_empty() {
            format!("{system_prompt}{}{prompt}", config.separator.text())
        } else {
            prompt.clone()
        };
        let score = score_take(&config.picker, &chosen, &final_prompt);
        let notes = render_notes(&NotesContext {
            take_index,
            take_count,
            seed: current_seed,
            world: &world.name,
            realm: realm.as_deref(),
            freeze: &config.freeze,
            forced: &forced,
            score,
            picker: &config.picker,
            chosen: &chosen,
        });

        tracing::debug!(take_index, seed = current_seed, ?score, "take recorded");
        emit(DirectorEvent::TakeRecorded {
            take_index,
            seed: current_seed,
            score,
            overrides: forced.clone(),
        });

        memory.remember(&config.freeze, &chosen);
        takes.push(Take {
            take_index,
            seed: current_seed,
            chosen,
            prompt,
            system_prompt: system_prompt.clone(),
            final_prompt,
            notes,
            score,
        });
        current_seed = advance_take_seed(current_seed, config.take_seed_mode);
    }

    let scores: Vec<Option<i64>> = takes.iter().map(|take| take.score).collect();
    let picked_take_index = best_index(&scores) as u32 + 1;
    let next_seed = config.control_after_generate.next_seed(config.seed);

    let session = Session {
        kind: SESSION_TYPE.to_string(),
        session_id: session_id.clone(),
        created_at: now_local_iso(),
        world: world.name.clone(),
        realm,
        take_count,
        seed_start: config.seed,
        take_seed_mode: config.take_seed_mode,
        picker: config.picker.clone(),
        picked_take_index,
        takes,
    };
    let picked_score = session.picked_take().and_then(|take| take.score);

    tracing::info!(
        world = %session.world,
        take_count,
        picked_take_index,
        ?picked_score,
        "director session finished"
    );
    emit(DirectorEvent::SessionFinished {
        picked_take_index,
        picked_score,
        next_seed,
    });

    DirectorRun { session, next_seed }
}

/// Seed for the take after one seeded with `seed`.
pub fn advance_take_seed(seed: u64, mode: TakeSeedMode) -> u64 {
    match mode {
        TakeSeedMode::Keep => seed,
        TakeSeedMode::Increment => increment_seed(seed),
        TakeSeedMode::Randomize => fresh_seed(),
    }
}

struct NotesContext<'a> {
    take_index: u32,
    take_count: u32,
    seed: u64,
    world: &'a str,
    realm: Option<&'a str>,
    freeze: &'a FreezeSettings,
    forced: &'a [Category],
    score: Option<i64>,
    picker: &'a PickerConfig,
    chosen: &'a Chosen,
}

fn render_notes(ctx: &NotesContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TAKE {}/{}", ctx.take_index, ctx.take_count);
    let _ = writeln!(out, "seed: {}", ctx.seed);
    let _ = writeln!(out, "world: {}", ctx.world);
    let _ = writeln!(out, "realm: {}", ctx.realm.unwrap_or("all"));
    let _ = writeln!(
        out,
        "freeze: {} | scope: {} | change_one: {}",
        ctx.freeze.mode,
        ctx.freeze.scope,
        ctx.freeze.change_one_label()
    );
    if ctx.forced.is_empty() {
        let _ = writeln!(out, "overrides: none");
    } else {
        let names: Vec<&str> = ctx.forced.iter().map(|c| c.as_str()).collect();
        let _ = writeln!(out, "overrides: {}", names.join(", "));
    }
    match ctx.score {
        Some(score) => {
            let _ = writeln!(out, "score: {score} ({})", ctx.picker.rule);
        }
        None => {
            let _ = writeln!(out, "score: off");
        }
    }
    let _ = writeln!(out, "chosen:");
    for category in Category::ALL {
        let _ = writeln!(out, "- {}: {}", category, ctx.chosen.get(category));
    }
    out.trim_end().to_string()
}
