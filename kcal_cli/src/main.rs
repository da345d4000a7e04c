use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{ArgAction, Parser, Subcommand};
use kcal_core::fasting::{self, FastingStatus};
use kcal_core::*;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "kcal")]
#[command(about = "Calorie and fasting tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's calorie summary and entries (default)
    Today,

    /// Log a food or activity entry
    Add {
        #[command(subcommand)]
        entry: AddCommand,
    },

    /// Delete a calorie entry by id
    Rm { id: Uuid },

    /// List every calorie entry, newest first
    Log,

    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Fasting timer
    Fast {
        #[command(subcommand)]
        action: FastCommand,
    },

    /// Export calorie and fasting logs as CSV
    Export {
        /// Directory to write calorie_logs.csv and fasting_logs.csv into
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum AddCommand {
    /// Calories eaten
    Food { name: String, calories: f64 },

    /// Calories burned
    Activity {
        name: String,
        calories: f64,

        /// walking, running, cycling, swimming, strength, yoga, or free text
        #[arg(long)]
        subtype: Option<ActivitySubtype>,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Show the profile and daily target
    Show,

    /// Update profile fields; unspecified fields keep their value
    Set {
        #[arg(long)]
        name: Option<String>,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<NaiveDate>,

        /// Height in centimetres
        #[arg(long)]
        height: Option<f64>,

        /// Weight in kilograms
        #[arg(long)]
        weight: Option<f64>,

        /// male or female
        #[arg(long)]
        gender: Option<Gender>,

        /// sedentary, light, moderate, active, very-active, or none
        #[arg(long, value_parser = parse_activity)]
        activity: Option<ActivityArg>,

        /// Daily deficit goal in kcal
        #[arg(long)]
        deficit: Option<f64>,

        /// Fixed daily target overriding the computed one
        #[arg(long, conflicts_with = "clear_manual_limit")]
        manual_limit: Option<f64>,

        #[arg(long)]
        clear_manual_limit: bool,
    },
}

#[derive(Subcommand)]
enum FastCommand {
    /// Start a fast now or at a past time
    Start {
        /// RFC 3339 or local `YYYY-MM-DDTHH:MM`
        #[arg(long, value_parser = parse_start_time)]
        at: Option<DateTime<Utc>>,
    },

    /// End the running fast
    End,

    /// Elapsed time, stage and progress
    Status,

    /// Live display until the fast ends
    Watch {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Completed fasts, newest first
    History,

    /// Delete a completed fast by id
    Rm { id: Uuid },

    /// The metabolic stage milestones
    Stages,
}

#[derive(Clone, Debug)]
struct ActivityArg(Option<ActivityLevel>);

fn parse_activity(s: &str) -> std::result::Result<ActivityArg, String> {
    if s.trim().eq_ignore_ascii_case("none") {
        return Ok(ActivityArg(None));
    }
    s.parse().map(|level| ActivityArg(Some(level)))
}

fn parse_start_time(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("unrecognised time '{}'", s))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("'{}' does not exist in the local time zone", s))
}

fn main() {
    let cli = Cli::parse();
    kcal_core::logging::init_with_level(kcal_core::logging::level_for_verbosity(cli.verbose));

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let mut tracker = Tracker::open(FileStore::new(&data_dir));

    // Any run counts as a visit for the day rollover marker
    tracker.check_rollover(&Local::now())?;

    match cli.command.unwrap_or(Commands::Today) {
        Commands::Today => cmd_today(&tracker),
        Commands::Add { entry } => cmd_add(&mut tracker, entry),
        Commands::Rm { id } => cmd_rm(&mut tracker, id),
        Commands::Log => cmd_log(&tracker),
        Commands::Profile { action } => cmd_profile(&mut tracker, action),
        Commands::Fast { action } => cmd_fast(tracker, action, &config),
        Commands::Export { out } => cmd_export(&tracker, &out),
    }
}

fn cmd_today(tracker: &Tracker<FileStore>) -> Result<()> {
    let now = Local::now();
    let target = tracker.daily_target(now.date_naive());
    let summary = tracker.today_summary(&now);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  TODAY  {}", now.format("%A %Y-%m-%d"));
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Target:     {:>6.0} kcal", target);
    println!("  Consumed:   {:>6.0} kcal", summary.consumed);
    println!("  Burned:     {:>6.0} kcal", summary.burned);
    println!("  Net:        {:>6.0} kcal", summary.net);
    println!("  Remaining:  {:>6.0} kcal", summary.remaining);
    println!("  {} {:.0}%", progress_bar(summary.percentage), summary.percentage);
    if summary.is_over_limit {
        println!("  ⚠ Over daily limit");
    }
    println!();

    let entries = tracker.entries_on(&now);
    if entries.is_empty() {
        println!("  No entries yet today.");
    }
    for entry in entries {
        print_entry(entry);
    }
    println!();
    Ok(())
}

fn cmd_add(tracker: &mut Tracker<FileStore>, command: AddCommand) -> Result<()> {
    let new = match command {
        AddCommand::Food { name, calories } => NewEntry::food(name, calories),
        AddCommand::Activity {
            name,
            calories,
            subtype,
        } => NewEntry::activity(name, calories, subtype),
    };

    let entry = tracker.add_entry(new, Utc::now())?;
    println!(
        "✓ Logged {} '{}' ({:.0} kcal)  id: {}",
        entry.kind, entry.name, entry.calories, entry.id
    );

    let summary = tracker.today_summary(&Local::now());
    println!("  Remaining today: {:.0} kcal", summary.remaining);
    Ok(())
}

fn cmd_rm(tracker: &mut Tracker<FileStore>, id: Uuid) -> Result<()> {
    match tracker.delete_entry(id)? {
        Some(entry) => println!("✓ Deleted '{}'", entry.name),
        None => println!("No entry with id {}", id),
    }
    Ok(())
}

fn cmd_log(tracker: &Tracker<FileStore>) -> Result<()> {
    if tracker.entries().is_empty() {
        println!("No entries.");
    }
    for entry in tracker.entries() {
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &LogEntry) {
    let sign = match entry.kind {
        EntryKind::Food => '+',
        EntryKind::Activity => '-',
    };
    let subtype = entry
        .activity_subtype
        .as_ref()
        .map(|s| format!(" ({})", s))
        .unwrap_or_default();
    println!(
        "  {}  {}  {}{:>5.0} kcal  {}{}",
        entry.id,
        entry.logged_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        sign,
        entry.calories,
        entry.name,
        subtype
    );
}

fn cmd_profile(tracker: &mut Tracker<FileStore>, action: ProfileCommand) -> Result<()> {
    match action {
        ProfileCommand::Show => {}
        ProfileCommand::Set {
            name,
            dob,
            height,
            weight,
            gender,
            activity,
            deficit,
            manual_limit,
            clear_manual_limit,
        } => {
            let mut profile = tracker.profile().clone();
            if let Some(name) = name {
                profile.name = name;
            }
            if let Some(dob) = dob {
                profile.date_of_birth = Some(dob);
            }
            if let Some(height) = height {
                profile.height_cm = height;
            }
            if let Some(weight) = weight {
                profile.weight_kg = weight;
            }
            if let Some(gender) = gender {
                profile.gender = gender;
            }
            if let Some(ActivityArg(level)) = activity {
                profile.activity_level = level;
            }
            if let Some(deficit) = deficit {
                profile.deficit_goal = deficit;
            }
            if manual_limit.is_some() {
                profile.manual_limit = manual_limit;
            }
            if clear_manual_limit {
                profile.manual_limit = None;
            }
            tracker.save_profile(profile)?;
            println!("✓ Profile saved");
        }
    }

    let profile = tracker.profile();
    let today = Local::now().date_naive();
    println!();
    println!("  Name:        {}", profile.name);
    println!(
        "  Born:        {}",
        profile
            .date_of_birth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!("  Height:      {} cm", profile.height_cm);
    println!("  Weight:      {} kg", profile.weight_kg);
    println!("  Gender:      {}", profile.gender);
    println!(
        "  Activity:    {}",
        profile
            .activity_level
            .map(|l| l.to_string())
            .unwrap_or_else(|| "none".into())
    );
    println!("  Deficit:     {} kcal", profile.deficit_goal);
    if let Some(limit) = profile.manual_limit {
        println!("  Manual limit: {:.0} kcal", limit);
    }
    println!(
        "  Computed target: {:.0} kcal",
        compute_daily_target(profile, today)
    );
    println!("  Daily target:    {:.0} kcal", tracker.daily_target(today));
    Ok(())
}

fn cmd_fast(mut tracker: Tracker<FileStore>, action: FastCommand, config: &Config) -> Result<()> {
    let goal_hours = config.fasting.goal_hours;
    match action {
        FastCommand::Start { at } => {
            let now = Utc::now();
            let at = at.unwrap_or(now);
            if tracker.start_fast(at, now)? {
                println!(
                    "✓ Fast started at {}",
                    at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                );
            } else {
                println!("A fast is already running.");
                print_status(&tracker.fasting_status(now, goal_hours));
            }
        }
        FastCommand::End => match tracker.end_fast(Utc::now())? {
            Some(log) => {
                let hours = fasting::hours(log.duration());
                println!("✓ Fast ended after {:.1} hours", hours);
                println!("  Reached: {}", stage_for(hours).name);
            }
            None => println!("No active fast."),
        },
        FastCommand::Status => {
            let status = tracker.fasting_status(Utc::now(), goal_hours);
            if status.active {
                print_status(&status);
            } else {
                println!("No active fast.");
            }
        }
        FastCommand::Watch { ticks } => cmd_fast_watch(tracker, ticks, config)?,
        FastCommand::History => {
            if tracker.fasting_logs().is_empty() {
                println!("No completed fasts.");
            }
            for log in tracker.fasting_logs() {
                let hours = fasting::hours(log.duration());
                println!(
                    "  {}  {} → {}  {:>6.1} h  {}",
                    log.id,
                    log.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    log.ended_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    hours,
                    stage_for(hours).name
                );
            }
        }
        FastCommand::Rm { id } => match tracker.delete_fasting_log(id)? {
            Some(_) => println!("✓ Deleted fast {}", id),
            None => println!("No fast with id {}", id),
        },
        FastCommand::Stages => {
            let elapsed = fasting::hours(tracker.fasting_state().elapsed(Utc::now()));
            for milestone in fasting::milestones(elapsed) {
                let marker = if milestone.current {
                    "▶"
                } else if milestone.reached {
                    "✓"
                } else {
                    " "
                };
                println!(
                    "  {} {:>3}h  {:<22} {}",
                    marker,
                    milestone.stage.from_hours,
                    milestone.stage.name,
                    milestone.stage.description
                );
            }
        }
    }
    Ok(())
}

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Live display: one ticker refreshes the status line, another watches for
/// the calendar day changing. Both stop when the fast is no longer active.
fn cmd_fast_watch(tracker: Tracker<FileStore>, ticks: Option<u64>, config: &Config) -> Result<()> {
    if !tracker.fasting_state().is_active() {
        println!("No active fast.");
        return Ok(());
    }

    let goal_hours = config.fasting.goal_hours;
    let shared = Arc::new(Mutex::new(tracker));

    let display = {
        let shared = Arc::clone(&shared);
        let mut count = 0u64;
        Ticker::spawn("display", config.timers.tick_interval(), move || {
            let mut tracker = lock(&shared);
            // Another kcal process may have ended the fast
            tracker.reload();
            let status = tracker.fasting_status(Utc::now(), goal_hours);
            if !status.active {
                println!("Fast ended.");
                return ControlFlow::Break(());
            }
            print_status_line(&status);

            count += 1;
            if ticks.is_some_and(|limit| count >= limit) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?
    };

    let rollover = {
        let shared = Arc::clone(&shared);
        Ticker::spawn("rollover", config.timers.rollover_interval(), move || {
            match lock(&shared).check_rollover(&Local::now()) {
                Ok(true) => tracing::info!("New day started"),
                Ok(false) => {}
                Err(e) => tracing::warn!("Rollover check failed: {}", e),
            }
            ControlFlow::Continue(())
        })?
    };

    display.join();
    rollover.stop();
    Ok(())
}

fn print_status(status: &FastingStatus) {
    if let Some(started_at) = status.started_at {
        println!(
            "  Started:  {}",
            started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    println!("  Elapsed:  {}", status.elapsed_clock());
    println!("  Stage:    {} ({})", status.stage.name, status.stage.description);
    println!(
        "  Goal:     {} {:.0}% of {}h",
        progress_bar(status.progress),
        status.progress,
        status.goal_hours
    );
}

fn print_status_line(status: &FastingStatus) {
    println!(
        "{}  {:<22} {} {:>3.0}%",
        status.elapsed_clock(),
        status.stage.name,
        progress_bar(status.progress),
        status.progress
    );
}

fn progress_bar(percent: f64) -> String {
    const WIDTH: usize = 20;
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(WIDTH - filled))
}

fn cmd_export(tracker: &Tracker<FileStore>, out: &std::path::Path) -> Result<()> {
    let entries = kcal_core::export::export_entries_csv(
        tracker.entries(),
        &out.join("calorie_logs.csv"),
    )?;
    let fasts =
        kcal_core::export::export_fasting_csv(tracker.fasting_logs(), &out.join("fasting_logs.csv"))?;
    println!("✓ Exported {} entries and {} fasts to {}", entries, fasts, out.display());
    Ok(())
}
