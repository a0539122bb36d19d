// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod env;
mod logging;
mod routes;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::{BackendMode, Config};
use erp_app::{AppState, EmployeeId, ListQuery, MAX_PAGE_SIZE};
use erp_db::Store;
use runtime::{DbRuntime, RemoteRuntime};
use std::path::PathBuf;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(std::env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    if options.check_env {
        let (lines, result) = env::check(|name| std::env::var(name).ok());
        for line in lines {
            println!("{line}");
        }
        return result;
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `erp --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    logging::init(&config.log_settings()?)?;
    let mut state = AppState::with_module(config.start_module());

    // --demo always runs against the seeded local store.
    if config.backend_mode() == BackendMode::Remote && !options.demo {
        let url = config.backend_url()?;
        let key = env::require(env::SERVICE_ROLE_KEY)?;
        let client = erp_api::Client::new(&url, &key, config.backend_timeout()?)
            .with_context(|| {
                format!(
                    "invalid [backend] config in {}; fix url/timeout values",
                    options.config_path.display()
                )
            })?;
        if options.check_only {
            client
                .ping()
                .with_context(|| format!("backend {url} is unreachable"))?;
            return Ok(());
        }
        info!(url = %url, "starting in remote mode");
        let mut runtime = RemoteRuntime::new(
            client,
            config.employee_id(),
            config.company_id(),
            config.page_size(),
        );
        return erp_tui::run_app(&mut state, &mut runtime);
    }

    let mut store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or ERP_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    store.set_max_document_size(config.max_document_size())?;
    if options.demo {
        store.seed_demo_data()?;
    }

    let employee_id = match config.employee_id() {
        Some(id) => id,
        None => default_operator(&store)?.ok_or_else(|| {
            anyhow!(
                "no active employee in {} -- run with --demo or set [session].employee_id",
                db_path.display()
            )
        })?,
    };
    let company_id = config.company_id();
    let session = store.create_session(Some(&employee_id), Some(&company_id))?;
    // Fails early when the configured employee does not exist.
    store.session_permissions(&session).with_context(|| {
        format!("cannot sign in as {employee_id}; check [session].employee_id")
    })?;
    if options.check_only {
        store.destroy_session(&session.token)?;
        return Ok(());
    }

    info!(employee = %employee_id, company = %company_id, db = %db_path.display(), "starting in local mode");
    let mut runtime = DbRuntime::new(&store, session).with_page_size(config.page_size());
    erp_tui::run_app(&mut state, &mut runtime)
}

/// The first active employee holding any capability, falling back to the
/// first active one.
pub(crate) fn default_operator(store: &Store) -> Result<Option<EmployeeId>> {
    let active: Vec<EmployeeId> = store
        .list_employees(&ListQuery::with_limit(MAX_PAGE_SIZE))?
        .rows
        .into_iter()
        .filter(|employee| employee.active)
        .map(|employee| employee.id)
        .collect();
    for id in &active {
        if !store.user_permissions(id)?.granted.is_empty() {
            return Ok(Some(id.clone()));
        }
    }
    Ok(active.into_iter().next())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    check_env: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        check_env: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => options.print_config_path = true,
            "--print-path" => options.print_db_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            "--check-env" => options.check_env = true,
            "--help" | "-h" => options.show_help = true,
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("erp");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --check                  Validate config, storage and backend, then exit");
    println!("  --check-env              Report backend environment variables (secrets masked)");
    println!("  --help                   Show this help");
}
