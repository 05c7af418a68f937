use anyhow::{Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use pagerun_core::{RenderRequest, Renderer};
use std::collections::BTreeMap;
use std::path::Path;

use super::config_arg;
use crate::config::PagerunConfig;

pub fn make_subcommand() -> Command {
    Command::new("render")
        .about("Render template modules to stdout")
        .arg(config_arg())
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .help("Template modules to render")
                .required(true)
                .num_args(1..),
        )
}

fn separator(file: &str) -> String {
    format!("-------------------- output of {file} --------------------")
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = PagerunConfig::load(args)?;
    let renderer = Renderer::new(&config.template);
    let files: Vec<&String> = args
        .get_many::<String>("files")
        .map(|files| files.collect())
        .unwrap_or_default();

    let mut failed = 0;
    for file in &files {
        if files.len() > 1 {
            println!("{}", separator(file));
        }

        let request = RenderRequest::get(
            format!("http://{}:{}/{}", config.build.host, config.build.port, file),
            BTreeMap::new(),
        );
        let result = renderer.render(Path::new(file.as_str()), &request).await?;

        println!("{}", result.output);
        if result.has_diagnostics() {
            eprint!("{}", result.diagnostics);
        }
        if !result.exit_status.success() {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(anyhow!("{failed} of {} renders failed", files.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_names_file() {
        assert!(separator("src/about.tsx").contains(" output of src/about.tsx "));
    }
}
