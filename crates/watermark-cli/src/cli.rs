//! Command-line arguments

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Add a text or image watermark to image files
#[derive(Parser, Debug)]
#[command(name = "watermark")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Plugin settings JSON file (`enabled`, `type`, `text`, `imagePath`, ...)
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    /// Read settings from this key of a settings store instead of the top level
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Images to watermark
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for output files (default: next to each input)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Appended to each input's file stem
    #[arg(short = 's', long = "suffix", default_value = "-watermarked")]
    pub suffix: String,

    /// Extra font files for text watermarks
    #[arg(short = 'f', long = "font", action = ArgAction::Append)]
    pub fonts: Vec<PathBuf>,

    /// Skip loading system fonts
    #[arg(long = "no-system-fonts")]
    pub no_system_fonts: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Output path for `input`: `<stem><suffix>.<ext>`
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!("{stem}{}", self.suffix);
        if let Some(ext) = input.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }

        match &self.output_dir {
            Some(dir) => dir.join(name),
            None => input.with_file_name(name),
        }
    }

    /// Output paths for all inputs, in input order
    ///
    /// Fails when an output would overwrite an input or another output.
    pub fn output_paths(&self) -> Result<Vec<PathBuf>> {
        if self.suffix.is_empty() && self.output_dir.is_none() {
            bail!("An empty --suffix requires --output-dir, otherwise inputs are overwritten");
        }

        let mut seen = HashSet::new();
        let mut outputs = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let output = self.output_path(input);
            if self.inputs.contains(&output) {
                bail!("Output {} would overwrite an input", output.display());
            }
            if !seen.insert(output.clone()) {
                bail!(
                    "Several inputs would be written to {}; use distinct file names",
                    output.display()
                );
            }
            outputs.push(output);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["watermark", "--config", "s.json", "a.jpg", "b.png"]);
        assert_eq!(cli.config, PathBuf::from("s.json"));
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.suffix, "-watermarked");
        assert!(cli.fonts.is_empty());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_inputs_required() {
        assert!(Cli::try_parse_from(["watermark", "--config", "s.json"]).is_err());
    }

    #[test]
    fn test_repeated_fonts() {
        let cli = parse(&[
            "watermark", "-c", "s.json", "--font", "a.ttf", "--font", "b.otf", "x.jpg",
        ]);
        assert_eq!(
            cli.fonts,
            vec![PathBuf::from("a.ttf"), PathBuf::from("b.otf")]
        );
    }

    #[test]
    fn test_output_path_next_to_input() {
        let cli = parse(&["watermark", "-c", "s.json", "photos/cat.jpg"]);
        assert_eq!(
            cli.output_path(Path::new("photos/cat.jpg")),
            PathBuf::from("photos/cat-watermarked.jpg")
        );
    }

    #[test]
    fn test_output_path_in_output_dir() {
        let cli = parse(&[
            "watermark", "-c", "s.json", "-o", "out", "-s", "_wm", "photos/cat.jpg",
        ]);
        assert_eq!(
            cli.output_path(Path::new("photos/cat.jpg")),
            PathBuf::from("out/cat_wm.jpg")
        );
    }

    #[test]
    fn test_output_path_without_extension() {
        let cli = parse(&["watermark", "-c", "s.json", "README"]);
        assert_eq!(
            cli.output_path(Path::new("README")),
            PathBuf::from("README-watermarked")
        );
    }

    #[test]
    fn test_output_paths_in_input_order() {
        let cli = parse(&["watermark", "-c", "s.json", "a/one.jpg", "b/two.png"]);
        assert_eq!(
            cli.output_paths().unwrap(),
            vec![
                PathBuf::from("a/one-watermarked.jpg"),
                PathBuf::from("b/two-watermarked.png")
            ]
        );
    }

    #[test]
    fn test_empty_suffix_without_output_dir_is_rejected() {
        let cli = parse(&["watermark", "-c", "s.json", "--suffix", "", "cat.jpg"]);
        let err = cli.output_paths().unwrap_err();
        assert!(err.to_string().contains("--output-dir"), "{err}");
    }

    #[test]
    fn test_empty_suffix_with_output_dir_is_allowed() {
        let cli = parse(&["watermark", "-c", "s.json", "-s", "", "-o", "out", "in/cat.jpg"]);
        assert_eq!(
            cli.output_paths().unwrap(),
            vec![PathBuf::from("out/cat.jpg")]
        );
    }

    #[test]
    fn test_colliding_outputs_are_rejected() {
        let cli = parse(&[
            "watermark", "-c", "s.json", "-o", "out", "2023/cat.jpg", "2024/cat.jpg",
        ]);
        let err = cli.output_paths().unwrap_err();
        assert!(err.to_string().contains("out/cat-watermarked.jpg"), "{err}");
    }

    #[test]
    fn test_output_over_input_is_rejected() {
        let cli = parse(&[
            "watermark", "-c", "s.json", "-s", "", "-o", "photos", "photos/cat.jpg",
        ]);
        assert!(cli.output_paths().is_err());
    }
}
