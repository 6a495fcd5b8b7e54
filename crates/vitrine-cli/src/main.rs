// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod render;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use runtime::{CellEdit, TableSession, bulk_properties};
use std::env;
use std::path::PathBuf;
use vitrine_app::{Artwork, ArtworkId, NoticeLevel, TableBackend, TableCommand, TableSpec};
use vitrine_db::Store;

const DEMO_SEED: u64 = 2026;
const DEMO_ROWS: usize = 120;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
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

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `vitrine --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    logging::init(config.log_filter())?;

    let spec = table_spec(&options.resource, &config)?;
    let backend = open_backend(&options, &config, &spec)?;
    if options.check_only {
        return Ok(());
    }

    let mut session = TableSession::open(spec, backend, &options.query);
    for edit in &options.edits {
        session.edit(edit)?;
    }
    for row_id in &options.selects {
        session.run(TableCommand::ToggleRow(ArtworkId::new(*row_id)));
    }
    if options.bulk_delete {
        session.run(TableCommand::BulkDelete);
    }
    if !options.bulk_set.is_empty() {
        let properties = bulk_properties(&options.bulk_set)?;
        session.run(TableCommand::BulkPatch(properties));
    }

    print!("{}", render::render_page(session.controller()));
    let mut failures = 0usize;
    for notice in session.notices() {
        if notice.level == NoticeLevel::Error {
            failures += 1;
        }
        eprintln!("{}: {}", render::render_notice_prefix(notice.level), notice.message);
    }
    if failures > 0 {
        bail!("{failures} action(s) failed");
    }
    Ok(())
}

fn table_spec(resource: &str, config: &Config) -> Result<TableSpec> {
    let base = match resource {
        "artworks" => TableSpec::artworks(),
        other => bail!("unknown resource {other:?}; supported resources: artworks"),
    };
    Ok(TableSpec {
        default_page_size: config.page_size(),
        sibling_count: config.sibling_count(),
        jump_stride: config.jump_stride(),
        cache_capacity: config.cache_capacity(),
        ..base
    })
}

fn open_backend(
    options: &CliOptions,
    config: &Config,
    spec: &TableSpec,
) -> Result<Box<dyn TableBackend<Artwork>>> {
    if options.demo {
        tracing::info!(rows = DEMO_ROWS, "using seeded in-memory catalogue");
        return Ok(Box::new(vitrine_testkit::demo_store(DEMO_SEED, DEMO_ROWS)?));
    }

    if let Some(db_path) = config.db_path() {
        let store = Store::open(&db_path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, fix [storage].db_path",
                db_path.display()
            )
        })?;
        store.bootstrap()?;
        return Ok(Box::new(store));
    }

    let client = vitrine_api::ApiClient::new(config.api_base_url(), config.api_timeout()?)
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;
    Ok(Box::new(client.resource::<Artwork>(&spec.resource)?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    demo: bool,
    resource: String,
    query: String,
    selects: Vec<i64>,
    edits: Vec<CellEdit>,
    bulk_delete: bool,
    bulk_set: Vec<String>,
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
        print_example: false,
        check_only: false,
        demo: false,
        resource: "artworks".to_owned(),
        query: String::new(),
        selects: Vec::new(),
        edits: Vec::new(),
        bulk_delete: false,
        bulk_set: Vec::new(),
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str, what: &str| -> Result<String> {
            iter.next()
                .map(|value| value.as_ref().to_owned())
                .ok_or_else(|| anyhow!("{flag} requires {what}"))
        };
        match arg.as_ref() {
            "--config" => {
                options.config_path = PathBuf::from(value_for("--config", "a file path")?);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--resource" => {
                options.resource = value_for("--resource", "a resource name")?;
            }
            "--query" => {
                options.query = value_for("--query", "a query string")?;
            }
            "--select" => {
                let raw = value_for("--select", "a row id")?;
                let row_id = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("--select expects a numeric row id, got {raw:?}"))?;
                options.selects.push(row_id);
            }
            "--edit" => {
                let raw = value_for("--edit", "ID.FIELD=VALUE")?;
                options.edits.push(CellEdit::parse(&raw)?);
            }
            "--bulk-delete" => {
                options.bulk_delete = true;
            }
            "--bulk-set" => {
                options.bulk_set.push(value_for("--bulk-set", "FIELD=VALUE")?);
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
        }
    }

    if (options.bulk_delete || !options.bulk_set.is_empty()) && options.selects.is_empty() {
        bail!("bulk actions need at least one --select ID");
    }
    Ok(options)
}

fn print_help() {
    println!("vitrine");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and backend, then exit");
    println!("  --demo                   Use a seeded in-memory catalogue");
    println!("  --resource <name>        List page to open (default: artworks)");
    println!("  --query <qs>             Page URL query, e.g. storeType=lend&pageIndex=2");
    println!("  --select <id>            Select a row on the shown page (repeatable)");
    println!("  --edit <id.field=value>  Save one cell (repeatable)");
    println!("  --bulk-delete            Delete the selected rows");
    println!("  --bulk-set <field=value> Set a field on the selected rows (repeatable)");
    println!("  --help                   Show this help");
}
