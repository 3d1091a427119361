// ABOUTME: Entry point for the intray binary.
// ABOUTME: Loads configuration, initializes tracing, opens the configured store and runs one subcommand.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use intray_core::model::{format_timestamp, now_utc};
use intray_core::record::escape_message;
use intray_core::{
    Filter, GroupOptions, GroupResult, ListOrder, Matcher, NewNotification, Notification,
    PaneAddress, Querier, Query, QueryEngine, RegexMatcher, SearchOptions, SortOptions,
    SubstringMatcher, TokenMatcher,
};
use intray_store::{
    MigrationOptions, MigrationReport, MigrationStats, Migrator, SqliteStore, Store, TsvStore,
    TsvToSqlite,
};

mod cli;
mod config;

use cli::{Cli, Command, ListOpts, MigrateOpts, StoreCommand};
use config::{Backend, IntrayConfig};

fn main() -> anyhow::Result<()> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    let filter = std::env::var("INTRAY_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let mut config = IntrayConfig::from_env().context("loading configuration")?;
    if let Some(dir) = args.state_dir {
        config.state_dir = dir;
    }
    tracing::debug!(state_dir = %config.state_dir.display(), backend = ?config.backend, "configuration loaded");

    match args.command {
        Command::Migrate(opts) => run_migrate(&config, opts),
        Command::Store(command) => {
            let store = open_store(&config)?;
            run_store_command(store.as_ref(), &config, command)
        }
    }
}

fn run_store_command(
    store: &dyn Store,
    config: &IntrayConfig,
    command: StoreCommand,
) -> anyhow::Result<()> {
    match command {
        StoreCommand::Add(opts) => {
            let address = PaneAddress::from_parts(
                opts.session.as_deref(),
                opts.window.as_deref(),
                opts.pane.as_deref(),
            )?;
            let mut input = NewNotification::new(opts.message).with_level(opts.level);
            input.address = address;
            input.pane_created = opts.pane_created.filter(|p| !p.is_empty());
            let id = store.add(input)?;
            println!("{id}");
        }
        StoreCommand::List(opts) => run_list(store, opts)?,
        StoreCommand::Get { id } => println!("{}", format_line(&store.get(id)?)),
        StoreCommand::Dismiss { id } => store.dismiss(id)?,
        StoreCommand::DismissAll => {
            let count = store.dismiss_all()?;
            println!("dismissed {count} notifications");
        }
        StoreCommand::MarkRead { id } => store.mark_read(id)?,
        StoreCommand::MarkUnread { id } => store.mark_unread(id)?,
        StoreCommand::Cleanup(opts) => {
            let days = opts.days.unwrap_or(config.auto_cleanup_days);
            let report = store.cleanup(days, opts.dry_run)?;
            let verb = if report.dry_run { "would remove" } else { "removed" };
            println!(
                "{verb} {} dismissed notifications older than {days} days",
                report.removed()
            );
            for id in &report.ids {
                println!("{id}");
            }
        }
        StoreCommand::Count => println!("{}", store.active_count()?),
    }
    Ok(())
}

fn open_store(config: &IntrayConfig) -> anyhow::Result<Box<dyn Store>> {
    Ok(match config.backend {
        Backend::Tsv => Box::new(
            TsvStore::open(&config.tsv_path(), config.store_options())
                .with_context(|| format!("opening {}", config.tsv_path().display()))?,
        ),
        Backend::Sqlite => {
            ensure_dir(&config.state_dir)?;
            Box::new(
                SqliteStore::open(&config.sqlite_path(), config.store_options())
                    .with_context(|| format!("opening {}", config.sqlite_path().display()))?,
            )
        }
    })
}

fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

fn run_list(store: &dyn Store, opts: ListOpts) -> anyhow::Result<()> {
    let now = now_utc();
    let mut filter = Filter::new().with_state(opts.state);
    filter.level = opts.level;
    filter.session = opts.session;
    filter.window = opts.window;
    filter.pane = opts.pane;
    filter.read = opts.read_status;
    if let Some(days) = opts.older_than {
        filter = filter.older_than_days(days, now);
    }
    if let Some(days) = opts.newer_than {
        filter = filter.newer_than_days(days, now);
    }
    let records = store.list(&filter)?;

    let search_opts = SearchOptions::default().case_insensitive(opts.case_insensitive);
    let matcher: Option<Box<dyn Matcher>> = match opts.search {
        Some(q) if opts.regex => Some(Box::new(RegexMatcher::new(&q, search_opts)?)),
        Some(q) if opts.tokens => Some(Box::new(TokenMatcher::new(&q, search_opts))),
        Some(q) => Some(Box::new(SubstringMatcher::new(q, search_opts))),
        None => None,
    };
    let order = match opts.sort_by {
        Some(field) => ListOrder::Sorted(SortOptions::new(field, opts.sort_order)),
        None => ListOrder::Preserve,
    };
    let mut query = Query::default().with_order(order);
    if let Some(matcher) = matcher {
        query = query.with_matcher(matcher);
    }
    let engine = QueryEngine;
    let selected = engine.select(records, &query);

    if let Some(by) = opts.group_by {
        let grouped = engine.group(
            selected,
            by,
            &GroupOptions {
                count_only: opts.count_only,
                ..GroupOptions::default()
            },
        );
        if opts.json {
            println!("{}", serde_json::to_string_pretty(&grouped)?);
        } else {
            print_groups(&grouped);
        }
        return Ok(());
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
    } else {
        for n in &selected {
            println!("{}", format_line(n));
        }
    }
    Ok(())
}

fn print_groups(grouped: &GroupResult) {
    for group in &grouped.groups {
        println!(
            "{}\t{} total\t{} unread",
            group.display_name, group.count, group.unread_count
        );
        for n in &group.members {
            println!("  {}", format_line(n));
        }
    }
}

/// One notification as a tab-separated line for terminal output.
fn format_line(n: &Notification) -> String {
    let address = match &n.address {
        Some(a) => format!("{}:{}.{}", a.session, a.window, a.pane),
        None => "-".to_string(),
    };
    let read = if n.is_read() { "read" } else { "unread" };
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        n.id,
        format_timestamp(&n.timestamp),
        n.state,
        n.level,
        read,
        address,
        escape_message(&n.message)
    )
}

fn run_migrate(config: &IntrayConfig, opts: MigrateOpts) -> anyhow::Result<()> {
    let migration = MigrationOptions {
        tsv_path: opts.tsv_path.unwrap_or_else(|| config.tsv_path()),
        sqlite_path: opts.sqlite_path.unwrap_or_else(|| config.sqlite_path()),
        backup_path: opts.backup_path,
        dry_run: opts.dry_run,
        rollback: opts.rollback,
    };
    let report = TsvToSqlite::new(config.store_options()).run(&migration)?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    match report {
        MigrationReport::RolledBack {
            tsv_path,
            sqlite_path,
            ..
        } => println!(
            "rollback completed: restored {} and removed {}",
            tsv_path.display(),
            sqlite_path.display()
        ),
        MigrationReport::Migrated(stats) => print_stats(&stats, migration.dry_run),
    }
    Ok(())
}

fn print_stats(stats: &MigrationStats, dry_run: bool) {
    if dry_run {
        println!("migration dry run completed");
    } else {
        println!("migration completed");
    }
    println!(
        "total={} migrated={} skipped={} failed={} duplicates={}",
        stats.total, stats.migrated, stats.skipped, stats.failed, stats.duplicates
    );
    if let Some(backup) = &stats.backup_path {
        println!("backup={}", backup.display());
    }
    for warning in &stats.warnings {
        println!("warning: {warning}");
    }
}
