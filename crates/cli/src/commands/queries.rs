//! Queries Command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use searchperf_e2e::{QueryCatalog, QuerySpec};

use crate::config::PerfConfig;
use crate::output::{or_dash, print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct QueriesArgs {
    /// YAML query catalog to list instead of the configured one
    #[arg(long)]
    pub query_file: Option<PathBuf>,
}

impl TableDisplay for QuerySpec {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Query", "Refinement", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.query.clone(),
            or_dash(self.refinement.as_deref()),
            self.description.clone(),
        ]
    }
}

pub async fn execute(args: QueriesArgs, config: PerfConfig, format: OutputFormat) -> Result<()> {
    let path = args.query_file.or(config.collection.queries_file);
    let catalog = QueryCatalog::load(path.as_deref()).context("failed to load query catalog")?;
    print_list(&catalog.queries, format);
    Ok(())
}
