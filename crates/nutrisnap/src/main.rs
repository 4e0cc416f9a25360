//! `nutrisnap` - CLI for the nutrisnap food log
//!
//! This binary logs meals, shows progress and history, and syncs the log with
//! a nutrisnap backend.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use tracing::{info, warn};

use nutrisnap::cli::{
    AddCommand, AuthCommand, Cli, Command, ConfigCommand, EditCommand, GoalsCommand,
    HistoryCommand, LanguageCommand, PortionCommand, SearchCommand, SyncCommand, TodayCommand,
};
use nutrisnap::dates::{now_millis, today};
use nutrisnap::food_search::{local_food, search_local, FoodSearchClient};
use nutrisnap::i18n::LanguageSettings;
use nutrisnap::model::{FoodItem, PartialGoals};
use nutrisnap::sync::{self, SyncScheduler};
use nutrisnap::{init_logging, AuthSession, Config, HttpBackend, Storage, Tracker};

/// Everything a command needs, opened once per invocation.
struct App {
    config: Config,
    storage: Arc<Storage>,
}

impl App {
    fn open(config: Config) -> anyhow::Result<Self> {
        let storage = Storage::open(config.database_path())
            .with_context(|| format!("opening {}", config.database_path().display()))?;
        Ok(Self {
            config,
            storage: Arc::new(storage),
        })
    }

    fn tracker(&self) -> nutrisnap::Result<Tracker> {
        Tracker::load(self.storage.clone(), self.config.default_goals(), today())
    }

    fn backend(&self) -> nutrisnap::Result<HttpBackend> {
        HttpBackend::new(&self.config.sync.server_url, self.config.request_timeout())
    }

    fn session(&self) -> nutrisnap::Result<AuthSession> {
        AuthSession::load(self.storage.clone())
    }

    fn language(&self) -> nutrisnap::Result<LanguageSettings> {
        LanguageSettings::load(self.storage.clone())
    }

    /// Push after a local change when signed in. Failures only warn; the
    /// change is already stored locally.
    async fn push_if_signed_in(&self, tracker: &mut Tracker) -> anyhow::Result<()> {
        if !self.config.sync.enabled {
            return Ok(());
        }
        let session = self.session()?;
        let Some(token) = session.token() else {
            return Ok(());
        };
        if let Err(e) = sync::push(tracker, &self.backend()?, token).await {
            warn!("Saved locally, will sync later: {}", e);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Config(cmd) => handle_config(&config, cmd),
        command => {
            let app = App::open(config)?;
            run(&app, command).await
        }
    }
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Add(cmd) => handle_add(app, cmd).await,
        Command::Portion(cmd) => handle_portion(app, &cmd).await,
        Command::Edit(cmd) => handle_edit(app, &cmd).await,
        Command::Delete { id } => handle_delete(app, &id).await,
        Command::Today(cmd) => handle_today(app, &cmd),
        Command::Goals(cmd) => handle_goals(app, cmd).await,
        Command::History(cmd) => handle_history(app, &cmd),
        Command::Search(cmd) => handle_search(app, &cmd).await,
        Command::Auth(cmd) => handle_auth(app, cmd).await,
        Command::Sync(cmd) => handle_sync(app, &cmd).await,
        Command::Language(cmd) => handle_language(app, &cmd),
        Command::Config(cmd) => handle_config(&app.config, cmd),
    }
}

async fn handle_add(app: &App, cmd: AddCommand) -> anyhow::Result<()> {
    let mut food = FoodItem::quick(&cmd.name, cmd.calories, cmd.protein, now_millis())?;
    food.quantity = cmd.quantity;

    let mut tracker = app.tracker()?;
    tracker.add_food(food.clone())?;
    println!(
        "Added {} ({} kcal, {} g protein) as {}",
        food.name, food.calories, food.protein, food.id
    );
    app.push_if_signed_in(&mut tracker).await
}

async fn handle_portion(app: &App, cmd: &PortionCommand) -> anyhow::Result<()> {
    let now = now_millis();
    let (food, extra) = if cmd.local {
        let item = local_food(&cmd.food_id)
            .ok_or_else(|| anyhow!("no built-in food with id '{}'", cmd.food_id))?;
        (item.portion(cmd.grams, now), None)
    } else {
        let client = FoodSearchClient::new(&app.config.food_search, app.config.request_timeout())?;
        let item = client.details(&cmd.food_id).await.ok_or_else(|| {
            anyhow!("could not load food '{}' from the food database", cmd.food_id)
        })?;
        let extra = (item.fat_for(cmd.grams), item.carbs_for(cmd.grams));
        (item.portion(cmd.grams, now), Some(extra))
    };

    let mut tracker = app.tracker()?;
    tracker.add_food(food.clone())?;
    println!(
        "Added {} g of {} ({} kcal, {} g protein) as {}",
        cmd.grams, food.name, food.calories, food.protein, food.id
    );
    if let Some((fat, carbs)) = extra {
        println!("  Also {fat} g fat and {carbs} g carbs (not tracked)");
    }
    app.push_if_signed_in(&mut tracker).await
}

async fn handle_edit(app: &App, cmd: &EditCommand) -> anyhow::Result<()> {
    let patch = cmd.patch();
    if patch.is_empty() {
        bail!("nothing to change; pass --name, --calories, --protein or --quantity");
    }

    let mut tracker = app.tracker()?;
    let updated = tracker.edit_food(&cmd.id, &patch)?;
    println!(
        "Updated {}: {} ({} kcal, {} g protein)",
        updated.id, updated.name, updated.calories, updated.protein
    );
    app.push_if_signed_in(&mut tracker).await
}

async fn handle_delete(app: &App, id: &str) -> anyhow::Result<()> {
    let mut tracker = app.tracker()?;
    let removed = tracker.delete_food(id)?;
    println!("Removed {} ({})", removed.name, removed.id);
    app.push_if_signed_in(&mut tracker).await
}

fn handle_today(app: &App, cmd: &TodayCommand) -> anyhow::Result<()> {
    let tracker = app.tracker()?;
    let goals = tracker.goals();
    let totals = tracker.today_totals();
    let progress = tracker.progress();

    if cmd.json {
        let report = serde_json::json!({
            "date": tracker.current_date(),
            "goals": goals,
            "totals": totals,
            "progress": progress,
            "foods": tracker.today_foods(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let lang = app.language()?;
    let filled = progress.clamped();
    println!("{} ({})", lang.t("todaysProgress"), tracker.current_date());
    println!(
        "  {:<10} {:>7.0} / {:<7.0} {:>4.0}% {}",
        lang.t("calories"),
        totals.calories,
        goals.calories,
        progress.calories * 100.0,
        progress_bar(filled.calories)
    );
    println!(
        "  {:<10} {:>7.1} / {:<7.1} {:>4.0}% {}",
        lang.t("protein"),
        totals.protein,
        goals.protein,
        progress.protein * 100.0,
        progress_bar(filled.protein)
    );
    println!();
    println!("{}", lang.t("todaysFood"));
    if tracker.today_foods().is_empty() {
        println!("  {}", lang.t("noFoodLogged"));
    }
    for food in tracker.today_foods() {
        let quantity = food
            .quantity
            .map(|q| format!(" ({q} g)"))
            .unwrap_or_default();
        println!(
            "  {:<24} {:>6.0} kcal {:>6.1} g  {}{}",
            food.name, food.calories, food.protein, food.id, quantity
        );
    }
    Ok(())
}

/// A fixed-width bar for a fraction in `0.0..=1.0`.
fn progress_bar(fraction: f64) -> String {
    const WIDTH: usize = 20;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    let filled = ((fraction * WIDTH as f64).round() as usize).min(WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

async fn handle_goals(app: &App, cmd: GoalsCommand) -> anyhow::Result<()> {
    let mut tracker = app.tracker()?;
    match cmd {
        GoalsCommand::Show { json } => {
            let goals = tracker.goals();
            if json {
                println!("{}", serde_json::to_string_pretty(&goals)?);
            } else {
                println!("Calories: {} kcal", goals.calories);
                println!("Protein:  {} g", goals.protein);
            }
            Ok(())
        }
        GoalsCommand::Set { calories, protein } => {
            if calories.is_none() && protein.is_none() {
                bail!("pass --calories and/or --protein");
            }
            let goals = PartialGoals { calories, protein }.merged_over(tracker.goals());
            tracker.update_goals(goals)?;
            println!(
                "Goals set to {} kcal and {} g protein",
                goals.calories, goals.protein
            );
            app.push_if_signed_in(&mut tracker).await
        }
    }
}

fn handle_history(app: &App, cmd: &HistoryCommand) -> anyhow::Result<()> {
    const BAR_WIDTH: f64 = 40.0;

    let tracker = app.tracker()?;
    let bars = tracker.chart_series(cmd.period.into(), today(), cmd.metric.into());

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&bars)?);
        return Ok(());
    }

    let lang = app.language()?;
    println!("{} ({:?}, {:?})", lang.t("history"), cmd.period, cmd.metric);
    if bars.is_empty() {
        println!("  {}", lang.t("noHistory"));
    }
    for bar in &bars {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = (bar.height * BAR_WIDTH).round() as usize;
        println!("  {:>6} {:>7.0} {}", bar.label, bar.value, "#".repeat(width));
    }
    Ok(())
}

async fn handle_search(app: &App, cmd: &SearchCommand) -> anyhow::Result<()> {
    let lang = app.language()?;

    if cmd.local {
        let results = search_local(&cmd.query);
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else if results.is_empty() {
            println!("{} \"{}\"", lang.t("noLocalFoodsFound"), cmd.query);
        } else {
            for food in &results {
                println!(
                    "  {:<18} {:<28} {:>5.0} kcal {:>5.1} g protein /100g",
                    food.id, food.name, food.calories_per_100g, food.protein_per_100g
                );
            }
        }
        return Ok(());
    }

    let client = FoodSearchClient::new(&app.config.food_search, app.config.request_timeout())?;
    let results = client.search(&cmd.query).await?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("{} \"{}\"", lang.t("noFoodsFound"), cmd.query);
    } else {
        for food in &results {
            let brand = food
                .brand
                .as_deref()
                .map(|b| format!(" [{b}]"))
                .unwrap_or_default();
            println!(
                "  {:<8} {}{} - {:.0} kcal, {:.1} g protein, {:.1} g fat, {:.1} g carbs /100g",
                food.id,
                food.name,
                brand,
                food.calories_per_100g,
                food.protein_per_100g,
                food.fat_per_100g,
                food.carbs_per_100g
            );
        }
    }
    Ok(())
}

async fn handle_auth(app: &App, cmd: AuthCommand) -> anyhow::Result<()> {
    let backend = app.backend()?;
    let mut session = app.session()?;

    match cmd {
        AuthCommand::Signup {
            email,
            name,
            password,
        } => {
            let user = session.signup(&backend, &email, &password, &name).await?;
            println!("Signed up as {} <{}>", user.name, user.email);
            // A new account starts from the local log.
            let mut tracker = app.tracker()?;
            sync::push(&mut tracker, &backend, session.require_token()?).await?;
        }
        AuthCommand::Login { email, password } => {
            let user = session.login(&backend, &email, &password).await?;
            println!("Logged in as {} <{}>", user.name, user.email);
            let mut tracker = app.tracker()?;
            if sync::pull(&mut tracker, &backend, session.require_token()?)
                .await
                .is_err()
            {
                println!("Could not load data from the backend; using the local log.");
            }
        }
        AuthCommand::Logout => {
            session.logout()?;
            println!("Logged out.");
        }
        AuthCommand::Status => {
            let session = AuthSession::restore(app.storage.clone(), &backend).await?;
            let lang = app.language()?;
            match session.user() {
                Some(user) => println!("{} {} <{}>", lang.t("signedInAs"), user.name, user.email),
                None => println!("{}", lang.t("notSignedIn")),
            }
            if let Some(ms) = sync::last_sync(&app.tracker()?)? {
                if let Some(at) = chrono::DateTime::from_timestamp_millis(ms) {
                    println!("{}: {}", lang.t("lastSync"), at.to_rfc3339());
                }
            }
        }
    }
    Ok(())
}

async fn handle_sync(app: &App, cmd: &SyncCommand) -> anyhow::Result<()> {
    if !app.config.sync.enabled {
        bail!("sync is disabled in the configuration");
    }
    let backend = app.backend()?;
    let session = app.session()?;
    let token = session.require_token()?;

    match cmd {
        SyncCommand::Push => {
            let mut tracker = app.tracker()?;
            sync::push(&mut tracker, &backend, token).await?;
            println!("Pushed {} days of history.", tracker.history().len());
        }
        SyncCommand::Pull => {
            let mut tracker = app.tracker()?;
            sync::pull(&mut tracker, &backend, token).await?;
            println!("Pulled {} days of history.", tracker.history().len());
        }
        SyncCommand::Run => {
            let server = backend.base_url().to_string();
            let tracker = Arc::new(tokio::sync::Mutex::new(app.tracker()?));
            let scheduler = SyncScheduler::new(
                tracker,
                Arc::new(backend),
                Some(token.to_string()),
                app.config.sync_interval(),
                app.config.day_check_interval(),
            );

            let handle = scheduler.handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping sync");
                }
                handle.stop();
            });

            println!(
                "Syncing with {} every {:?}. Press Ctrl-C to stop.",
                server,
                app.config.sync_interval()
            );
            let stats = scheduler.run().await?;
            println!(
                "Stopped after {} pushes ({} failed).",
                stats.pushes, stats.failures
            );
        }
    }
    Ok(())
}

fn handle_language(app: &App, cmd: &LanguageCommand) -> anyhow::Result<()> {
    let mut settings = app.language()?;
    match cmd {
        LanguageCommand::Show => {
            let direction = if settings.is_rtl() { "rtl" } else { "ltr" };
            println!("{} ({direction})", settings.current());
        }
        LanguageCommand::Set { language } => {
            settings.set((*language).into())?;
            println!("Language set to {}", settings.current());
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Sync]");
                println!("  Enabled:            {}", config.sync.enabled);
                println!("  Server URL:         {}", config.sync.server_url);
                println!("  Interval (s):       {}", config.sync.interval_secs);
                println!("  Timeout (s):        {}", config.sync.request_timeout_secs);
                println!();
                println!("[Tracker]");
                println!("  Default calories:   {}", config.tracker.default_calories);
                println!("  Default protein:    {}", config.tracker.default_protein);
                println!(
                    "  Day check (s):      {}",
                    config.tracker.day_check_interval_secs
                );
                println!();
                println!("[Food search]");
                println!("  Base URL:           {}", config.food_search.base_url);
                println!("  Page size:          {}", config.food_search.page_size);

                if let Ok(Some(storage)) = Storage::open_existing(config.database_path()) {
                    if let Ok(stats) = storage.stats() {
                        println!();
                        println!("[Local store]");
                        println!("  Keys:               {}", stats.total_keys);
                        println!("  Size (bytes):       {}", stats.db_size_bytes);
                        if let Some(at) = stats.last_updated {
                            println!("  Last write:         {}", at.to_rfc3339());
                        }
                    }
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use nutrisnap::model::Progress;

    use super::*;

    #[test]
    fn test_progress_bar_uses_clamped_fraction() {
        let progress = Progress {
            calories: 1.6,
            protein: 0.25,
        }
        .clamped();

        assert_eq!(progress_bar(progress.calories), format!("[{}]", "#".repeat(20)));
        assert_eq!(
            progress_bar(progress.protein),
            format!("[{}{}]", "#".repeat(5), "-".repeat(15))
        );
        assert_eq!(progress_bar(0.0), format!("[{}]", "-".repeat(20)));
    }
}
