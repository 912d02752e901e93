//! Operational check against the hosted backend.
//!
//! Loads `DASHBOARD_*` settings, optionally signs in, then reads a few
//! client companies and projects through the REST adapters and prints how
//! many came back.

use std::ffi::OsString;
use std::io::{self, Write};

use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use dashboard::DashboardSettings;
use dashboard::domain::ports::{
    AuthSession, Credentials, Direction, EntityStore, Query, Table,
};
use dashboard::outbound::rest::{RestAuthSession, RestClient, RestEntityStore};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Verify the backend URL, API key and (optionally) a login.
#[derive(Debug, Parser)]
#[command(name = "check-connection")]
struct Args {
    /// Sign in with this email before querying.
    #[arg(long, requires = "password")]
    email: Option<String>,
    /// Password for `--email`.
    #[arg(long, requires = "email")]
    password: Option<String>,
    /// Rows to read from each table.
    #[arg(long, default_value_t = 5)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = Args::parse();
    let settings = DashboardSettings::load_from_iter([OsString::from("check-connection")])
        .map_err(|err| eyre!("failed to load settings: {err}"))?;
    let client = RestClient::from_settings(&settings).wrap_err("invalid backend settings")?;
    info!(backend = %client.base(), "checking backend connection");

    let auth = RestAuthSession::new(client.clone());
    if let (Some(email), Some(password)) = (args.email, args.password) {
        let user = auth
            .sign_in(&Credentials { email, password })
            .await
            .wrap_err("sign-in failed")?;
        info!(user_id = %user.id, "signed in");
    }

    let store = RestEntityStore::new(client);
    let companies = count(&store, Table::ClientCompanies, "name", args.limit).await?;
    let projects = count(&store, Table::Projects, "updated_at", args.limit).await?;
    report(companies, projects)?;

    if let Err(err) = auth.sign_out().await {
        warn!(error = %err, "sign-out failed");
    }
    Ok(())
}

fn report(companies: usize, projects: usize) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "client_companies: {companies}")?;
    writeln!(stdout, "projects: {projects}")
}

async fn count(store: &RestEntityStore, table: Table, order: &str, limit: usize) -> Result<usize> {
    let query = Query::from(table)
        .order_by(order, Direction::Ascending)
        .limit(limit);
    let rows = store
        .select(&query)
        .await
        .wrap_err_with(|| format!("failed to read {table}"))?;
    info!(%table, rows = rows.len(), "table readable");
    Ok(rows.len())
}
