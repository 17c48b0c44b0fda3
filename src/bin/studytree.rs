// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use studytree::{
    command::{Command, CommandDto},
    matrix::FsMatrixStore,
    path::default_settings_path,
    settings::Settings,
    study::FileStudy,
    tree::{path::Depth, reference::Reference, TreeContext},
    variant::generate_with,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::{
    fs::read_to_string,
    io::{stdout, Write},
    path::PathBuf,
    process::exit,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  studytree [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Cmd,
}

impl Cli {
    async fn run(self, settings: Settings) -> Result<()> {
        match self.command {
            Cmd::Get(opts) => run_get(opts, &settings),
            Cmd::Set(opts) => run_set(opts, &settings),
            Cmd::Delete(opts) => run_delete(opts, &settings),
            Cmd::Fetch(opts) => run_fetch(opts, &settings),
            Cmd::Generate(opts) => run_generate(opts, &settings).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Cmd {
    /// Read value of study tree node as JSON.
    #[command(override_usage = "studytree get [options] <study> [<path>]")]
    Get(GetOptions),

    /// Write JSON value into study tree node.
    #[command(override_usage = "studytree set [options] <study> <path> <json>")]
    Set(SetOptions),

    /// Delete study tree node.
    #[command(override_usage = "studytree delete [options] <study> <path>")]
    Delete(DeleteOptions),

    /// Resolve reference into matrix or file content.
    #[command(override_usage = "studytree fetch [options] <study> <reference>")]
    Fetch(FetchOptions),

    /// Generate variant study from base study and command log.
    #[command(override_usage = "studytree generate [options] <base> <target> <commands>")]
    Generate(GenerateOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct GetOptions {
    /// Path to study root.
    #[arg(required = true, value_name = "study")]
    pub study: PathBuf,

    /// Slash-delimited tree path.
    #[arg(default_value = "", value_name = "path")]
    pub path: String,

    /// Expansion depth, -1 for unbounded.
    #[arg(short, long, allow_negative_numbers = true, value_name = "depth")]
    pub depth: Option<i64>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetOptions {
    /// Path to study root.
    #[arg(required = true, value_name = "study")]
    pub study: PathBuf,

    /// Slash-delimited tree path.
    #[arg(required = true, value_name = "path")]
    pub path: String,

    /// JSON value to write.
    #[arg(required = true, value_name = "json")]
    pub value: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// Path to study root.
    #[arg(required = true, value_name = "study")]
    pub study: PathBuf,

    /// Slash-delimited tree path.
    #[arg(required = true, value_name = "path")]
    pub path: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct FetchOptions {
    /// Path to study root.
    #[arg(required = true, value_name = "study")]
    pub study: PathBuf,

    /// Reference of the form file://<path> or matrix://<id>.
    #[arg(required = true, value_name = "reference")]
    pub reference: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct GenerateOptions {
    /// Path to base study root.
    #[arg(required = true, value_name = "base")]
    pub base: PathBuf,

    /// Path to variant study root, must not exist yet.
    #[arg(required = true, value_name = "target")]
    pub target: PathBuf,

    /// JSON file holding an array of commands.
    #[arg(required = true, value_name = "commands")]
    pub commands: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = match load_settings(cli.settings.clone()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("{error:?}");
            exit(1);
        }
    };

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let fallback = settings.log.filter.clone().unwrap_or_else(|| "info".into());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run(settings).await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = match path {
        Some(path) => path,
        None => default_settings_path()?,
    };

    Settings::load(&path).with_context(|| format!("cannot load settings {:?}", path.display()))
}

fn context(settings: &Settings) -> Result<TreeContext> {
    let store = FsMatrixStore::open(settings.matrix_dir()?)?;
    Ok(TreeContext::new(Arc::new(store)))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let mut out = stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;

    Ok(())
}

fn run_get(opts: GetOptions, settings: &Settings) -> Result<()> {
    let study = FileStudy::open(&opts.study, context(settings)?)?;
    let depth = Depth::from_sentinel(opts.depth.unwrap_or(settings.tree.depth))?;
    let value = study.get(&opts.path, depth)?;
    print_json(&value)
}

fn run_set(opts: SetOptions, settings: &Settings) -> Result<()> {
    let study = FileStudy::open(&opts.study, context(settings)?)?;
    let value: Value = serde_json::from_str(&opts.value).context("value is not valid JSON")?;
    study.set(&opts.path, value)?;
    info!("wrote {}", opts.path);

    Ok(())
}

fn run_delete(opts: DeleteOptions, settings: &Settings) -> Result<()> {
    let study = FileStudy::open(&opts.study, context(settings)?)?;
    study.delete(&opts.path)?;
    info!("deleted {}", opts.path);

    Ok(())
}

fn run_fetch(opts: FetchOptions, settings: &Settings) -> Result<()> {
    let study = FileStudy::open(&opts.study, context(settings)?)?;
    let reference: Reference = opts.reference.parse()?;
    let mut out = stdout().lock();
    match reference {
        Reference::Matrix(_) => out.write_all(study.fetch_matrix(&opts.reference)?.to_tsv().as_bytes())?,
        Reference::File(ref path) if path.extension().is_some_and(|ext| ext == "txt") => {
            out.write_all(study.fetch_matrix(&opts.reference)?.to_tsv().as_bytes())?
        }
        Reference::File(_) => out.write_all(&study.fetch_bytes(&opts.reference)?)?,
    }

    Ok(())
}

async fn run_generate(opts: GenerateOptions, settings: &Settings) -> Result<()> {
    let context = context(settings)?;
    let data = read_to_string(&opts.commands)
        .with_context(|| format!("cannot read commands {:?}", opts.commands.display()))?;
    let dtos: Vec<CommandDto> = serde_json::from_str(&data).context("commands are not a JSON array")?;
    let commands = dtos
        .iter()
        .map(|dto| {
            let mut command = Command::from_dto(dto)?;
            command.normalize(context.matrices())?;
            Ok(command)
        })
        .collect::<Result<Vec<_>>>()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancel requested, stopping after current command");
            signal.store(true, Ordering::Relaxed);
        }
    });

    let bar = ProgressBar::new(commands.len() as u64);
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));

    let worker_bar = bar.clone();
    let generation = tokio::task::spawn_blocking(move || {
        generate_with(
            &opts.base,
            &opts.target,
            &commands,
            context,
            &cancel,
            |entry| {
                worker_bar.set_message(entry.signature.clone());
                worker_bar.inc(1);
            },
        )
    })
    .await??;
    bar.finish_and_clear();

    print_json(&generation.report)?;
    if !generation.succeeded() {
        warn!("some commands failed, see report");
    }

    Ok(())
}
