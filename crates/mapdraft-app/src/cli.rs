//! Command line parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Render and check annotated map documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct RenderArgs {
    /// Exported map document.
    pub document: PathBuf,
    /// PNG file to write.
    pub output: PathBuf,
    /// Container width in pixels, overriding the document's view.
    #[arg(long, value_name = "PX", value_parser = dimension)]
    pub width: Option<f64>,
    /// Container height in pixels, overriding the document's view.
    #[arg(long, value_name = "PX", value_parser = dimension)]
    pub height: Option<f64>,
    /// Export settings as JSON.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Background raster drawn under the geometries.
    #[arg(long, value_name = "IMAGE")]
    pub base: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Render a document to PNG.
    Render(RenderArgs),
    /// Import a document and verify that it survives a round-trip.
    Check { document: PathBuf },
    /// Normalize a document and add it to the store.
    Save {
        document: PathBuf,
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
    },
    /// List stored documents.
    List {
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
    },
}

fn dimension(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 1.0 => Ok(v),
        _ => Err(format!("expected a number of pixels >= 1, got '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("mapdraft").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn test_parse_render() {
        let cmd = parse(&[
            "render", "map.json", "out.png", "--width", "800", "--config", "c.json",
        ])
        .unwrap();
        assert_eq!(
            cmd,
            Command::Render(RenderArgs {
                document: "map.json".into(),
                output: "out.png".into(),
                width: Some(800.0),
                height: None,
                config: Some("c.json".into()),
                base: None,
            })
        );
    }

    #[test]
    fn test_parse_check_and_list() {
        assert_eq!(
            parse(&["check", "a.json"]).unwrap(),
            Command::Check {
                document: "a.json".into()
            }
        );
        assert_eq!(
            parse(&["list", "--store", "/tmp/s"]).unwrap(),
            Command::List {
                store: Some("/tmp/s".into())
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["draw"]).is_err());
        assert!(parse(&["check"]).is_err());
        assert!(parse(&["render", "a", "b", "--width"]).is_err());
        assert!(parse(&["render", "a", "b", "--width", "0.5"]).is_err());
        assert!(parse(&["render", "a", "b", "--height", "wide"]).is_err());
        assert!(parse(&["check", "a", "--store", "x"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
