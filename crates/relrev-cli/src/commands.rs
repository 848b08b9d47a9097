use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use relrev_engine::{
    ActivityEntry, ActivityType, Actor, Engine, EngineConfig, ItemType, Release, StoreBackend,
};
use serde_json::json;

use crate::cli::*;

const DEFAULT_DATA_DIR: &str = ".relrev";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let engine = Engine::open(load_config(&cli)?).await?;
    let format = cli.format;
    let result = match cli.command {
        Command::Export(args) => cmd_export(&engine, args).await,
        Command::Import(args) => cmd_import(&engine, args, format).await,
        Command::Releases => cmd_releases(&engine, format).await,
        Command::Status(args) => cmd_status(&engine, args, format).await,
        Command::History(args) => cmd_history(&engine, args, format).await,
        Command::Contributors(args) => cmd_contributors(&engine, args, format).await,
        Command::Approve(args) => cmd_approve(&engine, args, format).await,
        Command::Flag(args) => cmd_flag(&engine, args, format).await,
        Command::Resolve(args) => cmd_resolve(&engine, args, format).await,
        Command::Users(args) => cmd_users(&engine, args, format).await,
    };
    engine.close().await;
    result
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig {
            backend: StoreBackend::Directory {
                path: PathBuf::from(DEFAULT_DATA_DIR),
                quota_bytes: None,
            },
            ..EngineConfig::default()
        },
    };
    if let Some(dir) = &cli.data_dir {
        config.backend = StoreBackend::Directory {
            path: dir.clone(),
            quota_bytes: config.backend.quota_bytes(),
        };
    }
    if let StoreBackend::Directory { path, .. } = &config.backend {
        std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn acting_user(engine: &Engine, user: Option<&str>) -> anyhow::Result<Actor> {
    let users = engine.users();
    let found = match user {
        Some(id) => users
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("unknown user {id}"))?,
        None => users
            .current_user()
            .await?
            .ok_or_else(|| anyhow!("no users defined; pass --user or import a user list"))?,
    };
    Ok(found.actor())
}

async fn release(engine: &Engine, id: &str) -> anyhow::Result<Release> {
    engine
        .get_release_by_id(id)
        .await?
        .ok_or_else(|| anyhow!("release {id} not found"))
}

async fn cmd_export(engine: &Engine, args: ExportArgs) -> anyhow::Result<()> {
    let document = engine.export_json().await?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, document).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} Exported to {}", "✓".green().bold(), path.display().to_string().bold());
        }
        None => println!("{document}"),
    }
    Ok(())
}

async fn cmd_import(engine: &Engine, args: ImportArgs, format: OutputFormat) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let report = engine.import_json(&document).await?;
    if format == OutputFormat::Json {
        let degraded: Vec<_> = report
            .degraded
            .iter()
            .map(|(key, outcome)| json!({"key": key.to_string(), "outcome": outcome.to_string()}))
            .collect();
        return print_json(&json!({
            "releases": report.releases,
            "reviewedPartitions": report.reviewed_partitions,
            "issuePartitions": report.issue_partitions,
            "activities": report.activities,
            "users": report.users,
            "degraded": degraded,
        }));
    }
    println!("{} Imported {}", "✓".green().bold(), args.file.display().to_string().bold());
    println!("  Releases: {}", report.releases);
    println!("  Review partitions: {}", report.reviewed_partitions);
    println!("  Issue partitions: {}", report.issue_partitions);
    println!("  Activity entries: {}", report.activities);
    for (key, outcome) in &report.degraded {
        println!("  {} {} {}", "!".yellow().bold(), key, outcome.to_string().yellow());
    }
    Ok(())
}

async fn cmd_releases(engine: &Engine, format: OutputFormat) -> anyhow::Result<()> {
    let releases = engine.get_all_releases().await?;
    if format == OutputFormat::Json {
        return print_json(&releases);
    }
    if releases.is_empty() {
        println!("No releases.");
    }
    for r in &releases {
        println!(
            "{}  {} / {}  ({})  {} plans, {} designs, {} units",
            r.id.yellow().bold(),
            r.compound_name,
            r.release_name.bold(),
            r.release_date.dimmed(),
            r.payment_plans.len(),
            r.unit_designs.len(),
            r.units.len(),
        );
    }
    Ok(())
}

async fn cmd_status(engine: &Engine, args: StatusArgs, format: OutputFormat) -> anyhow::Result<()> {
    let release = release(engine, &args.release).await?;
    let mut rows = Vec::new();
    for item_type in ItemType::ALL {
        let reviews = engine.reviews(&release.id, item_type).await?;
        let issues = engine.issues(&release.id, item_type).await?;
        let total = match item_type {
            ItemType::PaymentPlan => release.payment_plans.len(),
            ItemType::UnitDesign => release.unit_designs.len(),
        };
        rows.push((item_type, total, reviews.reviewed_count(), issues.flagged_ids()));
    }
    if format == OutputFormat::Json {
        let out: Vec<_> = rows
            .iter()
            .map(|(item_type, total, reviewed, flagged)| {
                json!({"itemType": item_type, "total": total, "reviewed": reviewed, "flagged": flagged})
            })
            .collect();
        return print_json(&out);
    }
    println!("{} {}", release.id.yellow().bold(), release.release_name.bold());
    for (item_type, total, reviewed, flagged) in rows {
        println!(
            "  {:<13} {} of {} reviewed, {} flagged",
            item_type.to_string(),
            reviewed.to_string().green(),
            total,
            flagged.len().to_string().red(),
        );
        for id in flagged {
            println!("    {} {}", "⚑".red(), release.item_name(item_type, &id));
        }
    }
    Ok(())
}

fn activity_color(kind: ActivityType) -> colored::ColoredString {
    let label = kind.as_str();
    match kind {
        ActivityType::Approved | ActivityType::IssueResolved => label.green(),
        ActivityType::Flagged => label.red(),
        ActivityType::Unapproved | ActivityType::IssueDeleted => label.yellow(),
    }
}

fn print_activity(entry: &ActivityEntry) {
    let a = &entry.activity;
    println!(
        "{}  {}  {} {} by {}",
        entry.timestamp.to_string().dimmed(),
        activity_color(a.activity_type),
        a.item_type,
        a.item_name.bold(),
        a.user_name.cyan(),
    );
    if let Some(details) = &a.details {
        println!("    {details}");
    }
}

async fn cmd_history(engine: &Engine, args: HistoryArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut entries = engine.activity().get_activities_by_release(&args.release).await?;
    if let Some(user) = &args.user {
        entries.retain(|e| e.user_id() == user);
    }
    entries.truncate(args.limit);
    if format == OutputFormat::Json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No activity for {}.", args.release.yellow());
    }
    entries.iter().for_each(print_activity);
    Ok(())
}

async fn cmd_contributors(
    engine: &Engine,
    args: ContributorsArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let contributors = engine.activity().get_contributors(args.release.as_deref()).await?;
    if format == OutputFormat::Json {
        return print_json(&contributors);
    }
    for (rank, c) in contributors.iter().enumerate() {
        println!("{:>3}. {} ({})  {}", rank + 1, c.user_name.bold(), c.user_id.dimmed(), c.activity_count);
    }
    Ok(())
}

async fn cmd_approve(engine: &Engine, args: ItemArgs, format: OutputFormat) -> anyhow::Result<()> {
    let actor = acting_user(engine, args.user.as_deref()).await?;
    let release = release(engine, &args.release).await?;
    let name = release.item_name(args.item_type, &args.item_id);
    let workflow = engine.workflow(&release.id, args.item_type).await?;
    if workflow.issues().has_issues(&args.item_id) {
        bail!("{name} has open issues; resolve them first");
    }
    let reviewed = workflow
        .toggle_approval(&args.item_id, &name, &actor)
        .await
        .durable()
        .await?;
    if format == OutputFormat::Json {
        return print_json(&json!({"itemId": args.item_id, "reviewed": reviewed}));
    }
    if reviewed {
        println!("{} {} reviewed by {}", "✓".green().bold(), name.bold(), actor.user_name);
    } else {
        println!("{} {} back to pending", "○".yellow(), name.bold());
    }
    Ok(())
}

async fn cmd_flag(engine: &Engine, args: FlagArgs, format: OutputFormat) -> anyhow::Result<()> {
    let item = args.item;
    let actor = acting_user(engine, item.user.as_deref()).await?;
    let release = release(engine, &item.release).await?;
    let name = release.item_name(item.item_type, &item.item_id);
    let attachment = args.file_name.zip(args.file_size);
    let issue = engine
        .workflow(&release.id, item.item_type)
        .await?
        .flag(&item.item_id, &name, &args.text, attachment, &actor)
        .await
        .durable()
        .await?;
    if format == OutputFormat::Json {
        return print_json(&issue);
    }
    println!("{} {} flagged: {}", "⚑".red().bold(), name.bold(), issue.text);
    Ok(())
}

async fn cmd_resolve(engine: &Engine, args: ResolveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let item = args.item;
    let actor = acting_user(engine, item.user.as_deref()).await?;
    let release = release(engine, &item.release).await?;
    let name = release.item_name(item.item_type, &item.item_id);
    let workflow = engine.workflow(&release.id, item.item_type).await?;
    let step = if args.discard {
        workflow.delete_issue(&item.item_id, &name, &actor).await
    } else {
        workflow.resolve(&item.item_id, &name, &actor).await
    };
    let cleared = step.durable().await?;
    if format == OutputFormat::Json {
        return print_json(&json!({"itemId": item.item_id, "cleared": cleared.len(), "reviewed": !args.discard}));
    }
    let verb = if args.discard { "discarded" } else { "resolved" };
    println!("{} {} {} issue(s) on {}", "✓".green().bold(), verb, cleared.len(), name.bold());
    Ok(())
}

async fn cmd_users(engine: &Engine, args: UsersArgs, format: OutputFormat) -> anyhow::Result<()> {
    let users = engine.users();
    if let Some(id) = &args.set_current {
        let user = users
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("unknown user {id}"))?;
        users.set_current_user(&user).await?;
    }
    let all = users.list_users().await?;
    let current = users.current_user().await?;
    if format == OutputFormat::Json {
        return print_json(&json!({"users": all, "current": current}));
    }
    for u in &all {
        let marker = if current.as_ref().is_some_and(|c| c.id == u.id) { "*" } else { " " };
        println!(
            "{} {}  {}  {}",
            marker.green().bold(),
            u.id.yellow(),
            u.name.bold(),
            u.email.as_deref().unwrap_or("").dimmed()
        );
    }
    Ok(())
}
