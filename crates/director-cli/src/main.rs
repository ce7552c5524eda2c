use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use director_contracts::events::{DirectorEvent, EventLog};
use director_contracts::history::{HistoryBrowser, HistoryEntry, HistoryFilter, HistoryWriter};
use director_contracts::runs::load::load_session;
use director_contracts::runs::memory::MemoryStore;
use director_contracts::runs::merge::merge_report;
use director_contracts::runs::session::{new_session_id, PickRule, PickerConfig, TakeSeedMode};
use director_contracts::runs::session_files::{file_stamp, write_session, SessionFiles};
use director_contracts::tags::{extract_tags, TagOptions};
use director_contracts::world::WorldRegistry;
use director_engine::freeze::parse_change_one;
use director_engine::{
    ControlAfterGenerate, CustomIntroMode, Director, DirectorConfig, DirectorOutcome,
    FreezeMemory, FreezeMode, FreezeScope, FreezeSettings, Locks, RealmChoice, Separator,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_WORLDS_DIR: &str = "data/worlds";

#[derive(Debug, Parser)]
#[command(name = "director-rs", version, about = "Director prompt engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a batch of takes from a world.
    Run(RunArgs),
    /// Merge stored session files into one.
    Merge(MergeArgs),
    /// Reopen a stored session and print one take.
    Load(LoadArgs),
    /// List the worlds available in the worlds directory.
    Worlds(WorldsArgs),
    /// Browse or replay the prompt history log.
    Replay(ReplayArgs),
    /// Extract ranked tags from a prompt.
    Tags(TagsArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    world: String,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 1)]
    takes: u32,
    #[arg(long, default_value = "increment")]
    take_seed_mode: TakeSeedMode,
    #[arg(long, default_value = "fixed")]
    control_after_generate: ControlAfterGenerate,
    #[arg(long, default_value = "auto")]
    custom_intro_mode: CustomIntroMode,
    #[arg(long)]
    custom_intro_index: Option<u32>,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    lock_camera: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    lock_lighting: bool,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    lock_outfit: bool,
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    lock_pose: bool,
    #[arg(long, default_value = "off")]
    freeze: FreezeMode,
    #[arg(long, default_value = "all")]
    freeze_scope: FreezeScope,
    #[arg(long, default_value = "none")]
    change_one: String,
    /// `none` for every realm, `seeded`, or a realm name.
    #[arg(long, default_value = "none")]
    realm: String,
    #[arg(long)]
    no_system_prompt: bool,
    /// `double_newline`, `newline`, `em_dash`, `pipe`, `comma` or a literal.
    #[arg(long, default_value = "double_newline")]
    separator: String,
    #[arg(long, default_value = "balanced")]
    pick_rule: PickRule,
    #[arg(long, default_value = "")]
    keyword: String,
    #[arg(long)]
    no_picker: bool,
    #[arg(long)]
    worlds_dir: Option<PathBuf>,
    /// Directory for `_shots.json`, `_picked.json` and `_shots.txt`.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value = "director")]
    prefix: String,
    #[arg(long)]
    compact: bool,
    #[arg(long)]
    no_text: bool,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Freeze memory file; repeated runs with the same instance share it.
    #[arg(long)]
    memory: Option<PathBuf>,
    #[arg(long, default_value = "director")]
    instance: String,
    #[arg(long)]
    history: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct MergeArgs {
    /// Session file; repeatable. Entries may also be `;`-separated.
    #[arg(long = "path", required = true)]
    paths: Vec<String>,
    #[arg(long)]
    keep_first: bool,
    #[arg(long)]
    compact: bool,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value = "director")]
    prefix: String,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct LoadArgs {
    #[arg(long)]
    path: String,
    /// 1-based take; 0 uses the stored pick.
    #[arg(long, default_value_t = 0)]
    take_index: i64,
    #[arg(long)]
    notes: bool,
    #[arg(long)]
    shot_list: bool,
}

#[derive(Debug, Parser)]
struct WorldsArgs {
    #[arg(long)]
    worlds_dir: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ReplayArgs {
    #[arg(long)]
    history: PathBuf,
    #[arg(long, default_value_t = 80)]
    max_entries: usize,
    #[arg(long, default_value = "all")]
    source: String,
    #[arg(long, default_value = "")]
    world: String,
    #[arg(long, default_value = "")]
    system: String,
    /// Option label or bare index to replay; lists options when absent.
    #[arg(long)]
    pick: Option<String>,
}

#[derive(Debug, Parser)]
struct TagsArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value_t = 30)]
    top_k: usize,
    #[arg(long, default_value_t = 4)]
    min_len: usize,
    #[arg(long, default_value = "")]
    keep: String,
    #[arg(long)]
    spaced: bool,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("director-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_director(args),
        Command::Merge(args) => run_merge(args),
        Command::Load(args) => run_load(args),
        Command::Worlds(args) => run_worlds(args),
        Command::Replay(args) => run_replay(args),
        Command::Tags(args) => run_tags(args),
    }
}

fn init_tracing() {
    let debug = non_empty_env("DIRECTOR_DEBUG").is_some_and(|value| value == "1");
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("DIRECTOR_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_director(args: RunArgs) -> Result<i32> {
    let config = director_config(&args)?;
    let registry = WorldRegistry::new(worlds_dir(args.worlds_dir.as_deref()));
    let mut director = Director::new(registry);
    if let Some(path) = &args.events {
        director = director.with_events(EventLog::new(path));
    }

    let mut store = args.memory.as_ref().map(MemoryStore::new);
    let mut memory = match store.as_mut() {
        Some(store) => FreezeMemory::from_chosen(store.load(&args.instance)),
        None => FreezeMemory::new(),
    };

    let outcome = director.run(&config, &mut memory);
    let run = match &outcome {
        DirectorOutcome::Completed(run) => run,
        DirectorOutcome::WorldNotFound { .. } => {
            println!("{}", outcome.final_prompt());
            return Ok(2);
        }
    };

    if let Some(store) = store.as_mut() {
        store
            .store(&args.instance, memory.last())
            .with_context(|| format!("failed to persist memory to {}", store.path().display()))?;
    }

    if let Some(dir) = &args.out {
        let files = SessionFiles::new(dir, &args.prefix, &file_stamp(Local::now()));
        write_session(&files, &run.session, !args.compact, !args.no_text)?;
        eprintln!("Wrote {}", files.shots_json.display());
        eprintln!("Wrote {}", files.picked_json.display());
    }

    if let (Some(path), Some(picked)) = (&args.history, run.picked()) {
        let mode = if config.include_system_prompt {
            "world"
        } else {
            "none"
        };
        let mut entry =
            HistoryEntry::generated(&run.session.world, mode, &picked.picked_final_prompt);
        entry.seed = picked.picked_seed;
        entry.take_index = Some(picked.picked_take_index);
        HistoryWriter::new(path).record(&entry)?;
    }

    println!("{}", run.final_prompt());
    eprintln!(
        "picked take {}/{} next_seed={}",
        run.session.picked_take_index, run.session.take_count, run.next_seed
    );
    Ok(0)
}

fn director_config(args: &RunArgs) -> Result<DirectorConfig> {
    let change_one = parse_change_one(&args.change_one).map_err(anyhow::Error::msg)?;
    let realm: RealmChoice = args.realm.parse().map_err(anyhow::Error::msg)?;
    let separator: Separator = args.separator.parse().map_err(anyhow::Error::msg)?;
    Ok(DirectorConfig {
        world: args.world.clone(),
        seed: args.seed,
        take_count: args.takes,
        take_seed_mode: args.take_seed_mode,
        control_after_generate: args.control_after_generate,
        custom_intro_mode: args.custom_intro_mode,
        custom_intro_index: args.custom_intro_index,
        locks: Locks {
            camera: args.lock_camera,
            lighting: args.lock_lighting,
            outfit: args.lock_outfit,
            pose: args.lock_pose,
        },
        freeze: FreezeSettings {
            mode: args.freeze,
            scope: args.freeze_scope,
            change_one,
        },
        realm,
        include_system_prompt: !args.no_system_prompt,
        separator,
        picker: PickerConfig {
            enabled: !args.no_picker,
            rule: args.pick_rule,
            keyword: args.keyword.clone(),
        },
    })
}

fn run_merge(args: MergeArgs) -> Result<i32> {
    let pretty = !args.compact;
    let report = merge_report(&args.paths.join(";"), pretty, !args.keep_first);
    println!("{}", report.merged_json);
    let Some(merged) = &report.merged else {
        return Ok(1);
    };
    for err in &merged.load_errors {
        tracing::warn!(error = %err, "merge input skipped");
    }

    if let Some(dir) = &args.out {
        let (shots, picked) = merged.save(dir, &args.prefix, &file_stamp(Local::now()), pretty)?;
        eprintln!("Wrote {}", shots.display());
        eprintln!("Wrote {}", picked.display());
    }
    if let Some(path) = &args.events {
        EventLog::new(path).append(
            &new_session_id(),
            &DirectorEvent::SessionMerged {
                source_files: merged.source_files.clone(),
                take_count: merged.take_count,
                picked_take_index: merged.picked.picked_take_index,
                load_errors: merged.load_errors.clone(),
            },
        )?;
    }
    eprintln!(
        "merged {} takes, picked take {}",
        report.take_count, report.picked_take_index
    );
    Ok(0)
}

fn run_load(args: LoadArgs) -> Result<i32> {
    let report = load_session(&args.path, args.take_index);
    if args.shot_list {
        println!("{}", report.shot_list_json);
        return Ok(0);
    }
    if report.take_count == 0 {
        println!("{}", report.picked_notes);
        return Ok(1);
    }
    if args.notes {
        println!("{}\n", report.picked_notes);
    }
    println!("{}", report.picked_final_prompt);
    eprintln!("take {}/{}", report.picked_take_index, report.take_count);
    Ok(0)
}

fn run_worlds(args: WorldsArgs) -> Result<i32> {
    let mut registry = WorldRegistry::new(worlds_dir(args.worlds_dir.as_deref()));
    let names = registry.list_names();
    if names.is_empty() {
        println!("(no worlds found) {}", registry.dir().display());
        return Ok(1);
    }
    for name in names {
        println!("{name}");
    }
    Ok(0)
}

fn run_replay(args: ReplayArgs) -> Result<i32> {
    let filter = HistoryFilter {
        max_entries: args.max_entries,
        source: args.source.clone(),
        world: args.world.clone(),
        system: args.system.clone(),
    };
    let mut browser = HistoryBrowser::new(&args.history);
    browser.reload(&filter);

    let Some(pick) = &args.pick else {
        for option in browser.options() {
            println!("{option}");
        }
        return Ok(0);
    };
    let label = if pick.trim().chars().all(|ch| ch.is_ascii_digit()) {
        format!("{} |", pick.trim())
    } else {
        pick.clone()
    };
    match browser.replay(&label) {
        Ok(replay) => {
            println!("{}", replay.prompt);
            eprintln!("{}", serde_json::to_string_pretty(&replay.meta)?);
            Ok(0)
        }
        Err(miss) => {
            println!("{}", miss.as_str());
            Ok(1)
        }
    }
}

fn run_tags(args: TagsArgs) -> Result<i32> {
    let options = TagOptions {
        top_k: args.top_k,
        min_len: args.min_len,
        keep_csv: args.keep.clone(),
    };
    let tags = extract_tags(&args.prompt, &options);
    if args.spaced {
        println!("{}", tags.spaced());
    } else {
        println!("{}", tags.csv());
    }
    Ok(0)
}

fn worlds_dir(flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| non_empty_env("DIRECTOR_WORLDS_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORLDS_DIR))
}

fn non_empty_env(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use serde_json::{json, Value};

    use super::{director_config, worlds_dir, Cli, Command, DEFAULT_WORLDS_DIR};
    use director_contracts::runs::session::PickRule;
    use director_contracts::world::Category;
    use director_engine::{FreezeMode, RealmChoice, Separator};

    fn run_args(extra: &[&str]) -> super::RunArgs {
        let mut argv = vec!["director-rs", "run", "--world", "noir"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Run(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_flags_map_onto_director_config() -> anyhow::Result<()> {
        let args = run_args(&[
            "--seed",
            "42",
            "--takes",
            "3",
            "--lock-pose",
            "true",
            "--freeze",
            "freeze",
            "--change-one",
            "camera",
            "--realm",
            "crimson",
            "--separator",
            "pipe",
            "--pick-rule",
            "closeup",
        ]);
        let config = director_config(&args)?;
        assert_eq!(config.seed, 42);
        assert_eq!(config.take_count, 3);
        assert!(config.locks.pose);
        assert!(config.locks.camera);
        assert_eq!(config.freeze.mode, FreezeMode::Freeze);
        assert_eq!(config.freeze.change_one, Some(Category::Camera));
        assert_eq!(config.realm, RealmChoice::Named("crimson".into()));
        assert_eq!(config.separator, Separator::Pipe);
        assert_eq!(config.picker.rule, PickRule::Closeup);
        assert!(config.include_system_prompt);
        Ok(())
    }

    #[test]
    fn bad_change_one_is_rejected() {
        let args = run_args(&["--change-one", "weather"]);
        assert!(director_config(&args).is_err());
    }

    #[test]
    fn worlds_dir_prefers_the_flag() {
        let dir = worlds_dir(Some(std::path::Path::new("/tmp/worlds")));
        assert_eq!(dir, std::path::PathBuf::from("/tmp/worlds"));
        if std::env::var("DIRECTOR_WORLDS_DIR").is_err() {
            assert_eq!(worlds_dir(None), std::path::PathBuf::from(DEFAULT_WORLDS_DIR));
        }
    }

    #[test]
    fn run_writes_session_files_memory_and_history() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let worlds = temp.path().join("worlds");
        fs::create_dir_all(&worlds)?;
        fs::write(
            worlds.join("noir.json"),
            serde_json::to_string(&json!({
                "OUTFITS": ["red dress"],
                "LIGHTING": ["dim light"],
                "CAMERA_ANGLES": ["close-up, 85mm"]
            }))?,
        )?;
        let out = temp.path().join("out");
        let memory = temp.path().join("memory.json");
        let history = temp.path().join("history.jsonl");

        let args = run_args(&[
            "--seed",
            "42",
            "--takes",
            "2",
            "--worlds-dir",
            worlds.to_str().unwrap_or_default(),
            "--out",
            out.to_str().unwrap_or_default(),
            "--memory",
            memory.to_str().unwrap_or_default(),
            "--history",
            history.to_str().unwrap_or_default(),
        ]);
        assert_eq!(super::run_director(args)?, 0);

        let mut names: Vec<String> = fs::read_dir(&out)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names.len(), 3);
        assert!(names[0].ends_with("_picked.json"));
        assert!(names[1].ends_with("_shots.json"));
        assert!(names[2].ends_with("_shots.txt"));

        let stored: Value = serde_json::from_str(&fs::read_to_string(&memory)?)?;
        assert_eq!(stored["director"]["camera"], json!("close-up, 85mm"));

        let line = fs::read_to_string(&history)?;
        let entry: Value = serde_json::from_str(line.trim())?;
        assert_eq!(
            entry["final_prompt"],
            json!("red dress, dim light, close-up, 85mm")
        );
        assert_eq!(entry["json_world"], json!("noir"));
        Ok(())
    }

    #[test]
    fn bundled_sample_world_loads() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/worlds");
        let mut registry = director_contracts::world::WorldRegistry::new(dir);
        let world = registry.get("noir").cloned().unwrap_or_default();
        assert_eq!(world.color_realms, vec!["crimson", "azure"]);
        assert!(world.provides(Category::Camera));
        assert!(!world.system_prompt.is_empty());
    }

    #[test]
    fn merge_saves_and_logs_through_one_path() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let session = |world: &str, score: i64| {
            json!({
                "world": world,
                "takes": [{"take_index": 1, "seed": 5, "final_prompt": world, "score": score}]
            })
        };
        let a = temp.path().join("a_shots.json");
        let b = temp.path().join("b_shots.json");
        fs::write(&a, session("first", 1).to_string())?;
        fs::write(&b, session("second", 9).to_string())?;
        let out = temp.path().join("merged");
        let events = temp.path().join("events.jsonl");

        let argv = vec![
            "director-rs".to_string(),
            "merge".to_string(),
            "--path".to_string(),
            format!("{};{}", a.display(), b.display()),
            "--out".to_string(),
            out.display().to_string(),
            "--events".to_string(),
            events.display().to_string(),
        ];
        let Command::Merge(args) = Cli::parse_from(argv).command else {
            panic!("expected merge");
        };
        assert_eq!(super::run_merge(args)?, 0);

        assert_eq!(fs::read_dir(&out)?.count(), 2);
        let event: Value = serde_json::from_str(fs::read_to_string(&events)?.trim())?;
        assert_eq!(event["type"], json!("session_merged"));
        assert_eq!(event["take_count"], json!(2));
        assert_eq!(event["picked_take_index"], json!(2));

        let Command::Merge(args) =
            Cli::parse_from(["director-rs", "merge", "--path", "# only a comment"]).command
        else {
            panic!("expected merge");
        };
        assert_eq!(super::run_merge(args)?, 1);
        Ok(())
    }

    #[test]
    fn run_reports_missing_world() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let args = run_args(&["--worlds-dir", temp.path().to_str().unwrap_or_default()]);
        assert_eq!(super::run_director(args)?, 2);
        Ok(())
    }
}
