// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface. Flags override the loaded configuration field by field.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Parser;
use scanwerk_core::PipelineConfig;
use scanwerk_core::error::{Result, ScanwerkError};

#[derive(Parser, Debug)]
#[command(name = "scanwerk")]
#[command(about = "Scan a stack of paper into one corrected, searchable PDF")]
#[command(version)]
pub struct Cli {
    /// Scan resolution in dpi
    #[arg(short, long, value_name = "DPI")]
    pub resolution: Option<u32>,

    /// Output file; its directory must exist
    #[arg(short, long, value_name = "PATH")]
    pub outfile: Option<PathBuf>,

    /// Name the output from recognised text (%o organization, %d date,
    /// %s store, %t transaction, %a total)
    #[arg(long, value_name = "TEMPLATE")]
    pub auto: Option<String>,

    /// SANE device name (default: first device that looks like a scanner)
    #[arg(long, env = "SCANWERK_DEVICE")]
    pub device: Option<String>,

    /// Replay the images in this directory instead of scanning
    #[arg(long, value_name = "DIR")]
    pub from_dir: Option<PathBuf>,

    /// Ask before discarding pages that look blank
    #[arg(long)]
    pub interactive: bool,

    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Mirror log events into a file (default: scanwerk.log in the data dir)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// List available scanners and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Cli {
    /// Apply flags on top of `config` and validate the result.
    pub fn apply(&self, config: &mut PipelineConfig) -> Result<()> {
        if let Some(dpi) = self.resolution {
            config.scanner.resolution = dpi;
        }
        if let Some(device) = &self.device {
            config.scanner.device = Some(device.clone());
        }
        if self.interactive {
            config.output.interactive_blank_gate = true;
        }
        if let Some(outfile) = &self.outfile {
            config.output.destination = check_outfile(outfile)?;
        }
        if let Some(template) = &self.auto {
            let dir = self
                .outfile
                .as_deref()
                .and_then(Path::parent)
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            config.output.destination = force_pdf_extension(&dir.join(template));
            config.output.auto_name = true;
        }
        config.validate()
    }
}

/// The parent directory must already exist; the extension is forced to `.pdf`.
pub fn check_outfile(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent.filter(|p| !p.is_dir()) {
        return Err(ScanwerkError::Config(format!(
            "output directory {} does not exist",
            parent.display()
        )));
    }
    Ok(force_pdf_extension(path))
}

/// Append `.pdf` unless the name already ends in it (any case).
pub fn force_pdf_extension(path: &Path) -> PathBuf {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".pdf");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scanwerk").chain(args.iter().copied())).expect("parse")
    }

    #[test]
    fn extension_is_forced() {
        assert_eq!(force_pdf_extension(Path::new("a/receipt")), PathBuf::from("a/receipt.pdf"));
        assert_eq!(force_pdf_extension(Path::new("scan.v2")), PathBuf::from("scan.v2.pdf"));
        assert_eq!(force_pdf_extension(Path::new("Scan.PDF")), PathBuf::from("Scan.PDF"));
    }

    #[test]
    fn outfile_parent_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ok = check_outfile(&dir.path().join("out")).expect("existing parent");
        assert_eq!(ok, dir.path().join("out.pdf"));
        assert!(matches!(
            check_outfile(&dir.path().join("missing/out.pdf")),
            Err(ScanwerkError::Config(_))
        ));
        assert!(check_outfile(Path::new("bare-name")).is_ok());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&["-r", "200", "--device", "epson:001", "--interactive"]);
        let mut config = PipelineConfig::default();
        cli.apply(&mut config).expect("apply");
        assert_eq!(config.scanner.resolution, 200);
        assert_eq!(config.scanner.device.as_deref(), Some("epson:001"));
        assert!(config.output.interactive_blank_gate);
        assert!(!config.output.auto_name);
    }

    #[test]
    fn auto_template_lands_next_to_outfile() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outfile = dir.path().join("ignored.pdf");
        let outfile = outfile.to_str().expect("utf8 path");
        let cli = parse(&["-o", outfile, "--auto", "%o_%d"]);
        let mut config = PipelineConfig::default();
        cli.apply(&mut config).expect("apply");
        assert!(config.output.auto_name);
        assert_eq!(config.output.destination, dir.path().join("%o_%d.pdf"));
    }

    #[test]
    fn out_of_range_resolution_is_rejected() {
        let cli = parse(&["-r", "5000"]);
        assert!(cli.apply(&mut PipelineConfig::default()).is_err());
    }

    #[test]
    fn log_file_path_is_optional() {
        assert_eq!(parse(&[]).log_file, None);
        assert_eq!(parse(&["--log-file"]).log_file, Some(None));
        assert_eq!(
            parse(&["--log-file", "/tmp/s.log"]).log_file,
            Some(Some(PathBuf::from("/tmp/s.log")))
        );
    }
}
