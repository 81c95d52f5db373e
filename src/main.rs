// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use qcdispatch::config::{self, HostDefaults, TaskConfig, HOST_CONFIG_ENV};
use qcdispatch::dispatch::{Dispatcher, RunOptions};
use qcdispatch::models::Task;
use qcdispatch::procedures;
use qcdispatch::registry::{ProcedureRegistry, ProgramRegistry};

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <command> [arguments]\n\
         \n\
         Commands:\n\
         \x20 run <program> <data> [resource flags]\n\
         \x20 run-procedure <procedure> <data> [resource flags]\n\
         \x20 info [version|programs|procedures|config|all]\n\
         \n\
         <data> is an inline JSON document, a file path, or '-' for STDIN.\n\
         \n\
         Resource flags:\n\
         \x20 --ncores <n>              cores for the computation\n\
         \x20 --nnodes <n>              nodes for the computation\n\
         \x20 --memory <gib>            memory budget in GiB\n\
         \x20 --scratch-directory <dir> root for scratch workspaces\n\
         \x20 --scratch-messy           keep the scratch directory afterwards\n\
         \x20 --retries <n>             retry budget for transient failures\n\
         \x20 --timeout <seconds>       wall-clock budget per attempt\n\
         \x20 --mpiexec-command <tmpl>  MPI launch template\n\
         \x20 --use-mpiexec             launch external programs under MPI\n\
         \x20 --cores-per-rank <n>      cores per MPI rank\n\
         \x20 --raise-error             exit non-zero on computation failure"
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("qcdispatch");

    initialize_host_defaults()?;

    match args.get(1).map(String::as_str) {
        Some("--version") => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some("run") => {
            let (name, data, task_config, options) = parse_job_args(&args[2..], program)?;
            let task: Task = serde_json::from_value(data).context("invalid task document")?;
            let dispatcher = Dispatcher::new(Arc::new(ProgramRegistry::with_builtins()));
            let record = dispatcher.run(&task, &name, &task_config, &options).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Some("run-procedure") => {
            let (name, data, task_config, options) = parse_job_args(&args[2..], program)?;
            let dispatcher = Dispatcher::new(Arc::new(ProgramRegistry::with_builtins()));
            let registry = ProcedureRegistry::with_builtins();
            let output =
                procedures::run_procedure(&name, data, &dispatcher, &registry, &task_config, &options)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Some("info") => print_info(args.get(2).map(String::as_str).unwrap_or("all")),
        Some(other) => bail!("unknown command '{other}'\n\n{}", usage(program)),
        None => bail!("{}", usage(program)),
    }
}

/// Seed the process-wide host defaults, from the YAML file named by
/// `QCDISPATCH_HOST_CONFIG` when set, otherwise by detection.
fn initialize_host_defaults() -> Result<()> {
    let defaults = match env::var_os(HOST_CONFIG_ENV) {
        Some(path) => HostDefaults::from_yaml_file(Path::new(&path))
            .with_context(|| format!("loading host config from {}", path.to_string_lossy()))?,
        None => HostDefaults::detect(),
    };
    config::initialize(defaults);
    Ok(())
}

/// Parse `<name> <data> [flags]` for `run` and `run-procedure`.
fn parse_job_args(args: &[String], program: &str) -> Result<(String, Value, TaskConfig, RunOptions)> {
    let [name, data, flags @ ..] = args else {
        bail!("expected <name> and <data>\n\n{}", usage(program));
    };
    let data = read_data(data)?;
    let (task_config, options) = parse_flags(flags)?;
    Ok((name.clone(), data, task_config, options))
}

/// `<data>` is STDIN for `-`, a file if one exists at that path, and an
/// inline JSON document otherwise.
fn read_data(arg: &str) -> Result<Value> {
    let text = if arg == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading STDIN")?;
        buffer
    } else if Path::new(arg).is_file() {
        std::fs::read_to_string(arg).with_context(|| format!("reading {arg}"))?
    } else {
        arg.to_string()
    };
    serde_json::from_str(&text).context("input is not valid JSON")
}

fn parse_flags(flags: &[String]) -> Result<(TaskConfig, RunOptions)> {
    let mut config = TaskConfig::default();
    let mut options = RunOptions::default();
    let mut iter = flags.iter();

    fn value<'a>(
        iter: &mut impl Iterator<Item = &'a String>,
        flag: &str,
    ) -> Result<&'a String> {
        iter.next().with_context(|| format!("{flag} requires a value"))
    }

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--ncores" => config.ncores = Some(value(&mut iter, flag)?.parse()?),
            "--nnodes" => config.nnodes = Some(value(&mut iter, flag)?.parse()?),
            "--memory" => config.memory_gib = Some(value(&mut iter, flag)?.parse()?),
            "--scratch-directory" => {
                config.scratch_directory = Some(PathBuf::from(value(&mut iter, flag)?))
            }
            "--scratch-messy" => config.scratch_messy = Some(true),
            "--retries" => config.retries = Some(value(&mut iter, flag)?.parse()?),
            "--timeout" => config.timeout_seconds = Some(value(&mut iter, flag)?.parse()?),
            "--mpiexec-command" => {
                config.mpiexec_command = Some(value(&mut iter, flag)?.clone())
            }
            "--use-mpiexec" => config.use_mpiexec = Some(true),
            "--cores-per-rank" => config.cores_per_rank = Some(value(&mut iter, flag)?.parse()?),
            "--raise-error" => options.raise_error = true,
            other => bail!("unknown flag '{other}'"),
        }
    }
    Ok((config, options))
}

fn print_info(topic: &str) -> Result<()> {
    if !matches!(topic, "version" | "programs" | "procedures" | "config" | "all") {
        bail!("unknown info topic '{topic}'");
    }
    let programs = ProgramRegistry::with_builtins();
    let registry = ProcedureRegistry::with_builtins();

    if matches!(topic, "version" | "all") {
        println!("qcdispatch {}", env!("CARGO_PKG_VERSION"));
        println!();
    }
    if matches!(topic, "programs" | "all") {
        println!("Available programs:");
        for name in programs.list_available() {
            let version = programs
                .get(&name)
                .and_then(|h| h.get_version())
                .unwrap_or_else(|| "unknown version".to_string());
            println!("  {name} {version}");
        }
        let available = programs.list_available();
        let other: Vec<String> = programs
            .list_all()
            .into_iter()
            .filter(|name| !available.contains(name))
            .collect();
        if !other.is_empty() {
            println!("Other supported programs:");
            for name in other {
                println!("  {name}");
            }
        }
        println!();
    }
    if matches!(topic, "procedures" | "all") {
        println!("Available procedures:");
        for name in registry.list_available() {
            println!("  {name}");
        }
        println!();
    }
    if matches!(topic, "config" | "all") {
        println!("Host configuration:");
        println!("{}", config::global_repr());
    }
    Ok(())
}
