pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod render;
pub mod session;
pub mod shell;
pub mod task;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args)?;
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting tether");
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.tetherrc.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let server_url = config::resolve_server_url(&cfg, cli.server.as_deref())
        .context("failed to resolve server url")?;

    let api = api::ApiClient::new(server_url);
    let mut renderer = render::Renderer::new(&cfg)?;

    let mut shell = shell::Shell::new(&api, &cfg, &mut renderer);
    shell.run(&mut io::stdin().lock())?;

    info!("done");
    Ok(())
}
