// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE scanner backend driven through the `scanimage` command.
//
// Each page is one `scanimage --format=pnm` child. The PNM header gives the
// frame geometry; rows are then streamed as scanlines from the child's stdout.
// Exit status 7 (SANE_STATUS_NO_DOCS) means the feeder is empty.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use scanwerk_core::config::{OptionValue, ScannerConfig, ScannerOption};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument, warn};

use crate::source::{Frame, ScanParameters, ScannerSource};

/// `scanimage` exit status for "document feeder out of documents".
const STATUS_NO_DOCS: i32 = 7;

/// A device reported by `scanimage -L`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub description: String,
}

/// Parse `device `name' is a Vendor Model type` lines.
pub fn parse_device_list(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("device `")?;
            let (name, description) = rest.split_once('\'')?;
            let description = description.trim().strip_prefix("is a ").unwrap_or(description.trim());
            Some(DeviceInfo {
                name: name.to_string(),
                description: description.to_string(),
            })
        })
        .collect()
}

/// List attached SANE devices.
pub fn list_devices(binary: &std::path::Path) -> Result<Vec<DeviceInfo>> {
    let output = Command::new(binary)
        .arg("-L")
        .output()
        .map_err(|err| ScanwerkError::Scanner(format!("cannot run {}: {err}", binary.display())))?;
    if !output.status.success() {
        return Err(ScanwerkError::Scanner(format!(
            "device listing failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(parse_device_list(&String::from_utf8_lossy(&output.stdout)))
}

/// First device whose type is some kind of scanner.
pub fn pick_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices
        .iter()
        .find(|d| d.description.to_lowercase().ends_with("scanner"))
}

/// Options a device accepts, with the numeric range where one is advertised.
#[derive(Debug, Default, Clone)]
pub struct DeviceOptions {
    ranges: HashMap<String, Option<(f64, f64)>>,
}

impl DeviceOptions {
    /// Parse the device-specific section of `scanimage --help`, e.g.
    /// `    --page-height 0..355.6mm [279.4]`.
    pub fn parse_help(help: &str) -> Self {
        let ranges = help
            .lines()
            .filter_map(|line| {
                let line = line.trim_start().strip_prefix("--")?;
                let mut parts = line.split_whitespace();
                let name = parts.next()?.split(['[', '=']).next()?.to_string();
                let range = parts.next().and_then(parse_range);
                Some((name, range))
            })
            .collect();
        Self { ranges }
    }

    pub fn supports(&self, name: &str) -> bool {
        self.ranges.contains_key(name)
    }

    /// Clamp numeric values into the advertised range.
    pub fn fit(&self, option: &ScannerOption) -> ScannerOption {
        let Some(Some((min, max))) = self.ranges.get(&option.name) else {
            return option.clone();
        };
        let value = match option.value {
            OptionValue::Fixed(v) => OptionValue::Fixed(v.clamp(*min, *max)),
            OptionValue::Int(v) => OptionValue::Int((v as f64).clamp(*min, *max) as i32),
            ref other => other.clone(),
        };
        if value != option.value {
            debug!(option = %option.name, from = %option.value, to = %value, "Clamped option");
        }
        ScannerOption::new(option.name.clone(), value)
    }
}

/// `0..355.6mm` → (0.0, 355.6).
fn parse_range(spec: &str) -> Option<(f64, f64)> {
    let (low, high) = spec.split_once("..")?;
    let number = |s: &str| {
        let end = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(s.len());
        s[..end].parse::<f64>().ok()
    };
    Some((number(low)?, number(high)?))
}

/// Format one option as a `scanimage` flag.
pub fn option_flag(option: &ScannerOption) -> String {
    format!("--{}={}", option.name, option.value)
}

/// Read the next whitespace-delimited PNM header token, skipping comments.
fn header_token<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut token = String::new();
    let mut byte = [0u8; 1];
    loop {
        if reader.read(&mut byte)? == 0 {
            return Ok((!token.is_empty()).then_some(token));
        }
        match byte[0] {
            b'#' => {
                let mut comment = Vec::new();
                reader.read_until(b'\n', &mut comment)?;
                if !token.is_empty() {
                    return Ok(Some(token));
                }
            }
            b if b.is_ascii_whitespace() => {
                if !token.is_empty() {
                    return Ok(Some(token));
                }
            }
            b => token.push(b as char),
        }
    }
}

/// Parse a binary PNM header (`P4`, `P5`, `P6`). `None` on an empty stream.
pub fn parse_pnm_header<R: BufRead>(reader: &mut R) -> Result<Option<ScanParameters>> {
    let Some(magic) = header_token(reader)? else {
        return Ok(None);
    };
    let mut number = |what: &str| -> Result<u32> {
        header_token(reader)?
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| ScanwerkError::Scanner(format!("bad PNM header: missing {what}")))
    };

    let (frame, bitmap) = match magic.as_str() {
        "P4" => (Frame::Gray, true),
        "P5" => (Frame::Gray, false),
        "P6" => (Frame::Rgb, false),
        other => return Err(ScanwerkError::Scanner(format!("unsupported PNM type {other}"))),
    };
    let pixels_per_line = number("width")?;
    let lines = number("height")?;
    let depth = if bitmap {
        1
    } else {
        match number("maxval")? {
            255 => 8,
            65535 => 16,
            other => return Err(ScanwerkError::Scanner(format!("unsupported PNM maxval {other}"))),
        }
    };

    Ok(Some(ScanParameters {
        frame,
        pixels_per_line,
        lines,
        depth,
    }))
}

struct ActivePage {
    child: Child,
    stdout: BufReader<ChildStdout>,
    params: ScanParameters,
}

/// Scanner source backed by `scanimage`. The running child is killed on drop.
pub struct ScanimageSource {
    binary: PathBuf,
    device: String,
    flags: Vec<String>,
    resolution: u32,
    active: Option<ActivePage>,
    pages: usize,
}

impl ScanimageSource {
    /// Probe the device's options and keep only the ones it understands.
    #[instrument(skip(config))]
    pub fn open(config: &ScannerConfig, device: &str) -> Result<Self> {
        let help = Command::new(&config.scanimage_path)
            .args(["-d", device, "--help"])
            .output()
            .map_err(|err| ScanwerkError::Scanner(format!("cannot run scanimage: {err}")))?;
        if !help.status.success() {
            return Err(ScanwerkError::Scanner(format!(
                "cannot open {device}: {}",
                String::from_utf8_lossy(&help.stderr).trim()
            )));
        }
        let supported = DeviceOptions::parse_help(&String::from_utf8_lossy(&help.stdout));

        let flags = config
            .effective_options()
            .iter()
            .filter_map(|option| {
                if supported.supports(&option.name) {
                    Some(option_flag(&supported.fit(option)))
                } else {
                    warn!(option = %option.name, "Device does not support option; skipping");
                    None
                }
            })
            .collect::<Vec<_>>();
        info!(device, options = ?flags, "Scanner opened");

        Ok(Self {
            binary: config.scanimage_path.clone(),
            device: device.to_string(),
            flags,
            resolution: config.resolution,
            active: None,
            pages: 0,
        })
    }

    /// Wait for the child and turn its exit status into a result.
    fn finish(child: Child) -> Result<Option<i32>> {
        let output = child.wait_with_output()?;
        if output.status.success() {
            return Ok(None);
        }
        match output.status.code() {
            Some(STATUS_NO_DOCS) => Ok(Some(STATUS_NO_DOCS)),
            _ => Err(ScanwerkError::Scanner(format!(
                "scanimage exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

impl ScannerSource for ScanimageSource {
    fn start_page(&mut self) -> Result<bool> {
        if let Some(previous) = self.active.take() {
            Self::finish(previous.child)?;
        }

        let mut child = Command::new(&self.binary)
            .args(["-d", &self.device, "--format=pnm"])
            .args(&self.flags)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ScanwerkError::Scanner(format!("cannot run scanimage: {err}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanwerkError::Scanner("scanimage stdout unavailable".into()))?;
        let mut stdout = BufReader::new(stdout);

        match parse_pnm_header(&mut stdout)? {
            Some(params) => {
                self.pages += 1;
                debug!(page = self.pages, ?params, "Page started");
                self.active = Some(ActivePage {
                    child,
                    stdout,
                    params,
                });
                Ok(true)
            }
            None => {
                drop(stdout);
                let status = Self::finish(child)?;
                if status != Some(STATUS_NO_DOCS) {
                    warn!("scanimage produced no image; treating as end of documents");
                }
                Ok(false)
            }
        }
    }

    fn parameters(&self) -> Result<ScanParameters> {
        self.active
            .as_ref()
            .map(|a| a.params)
            .ok_or_else(|| ScanwerkError::Scanner("no page in progress".into()))
    }

    fn read_line(&mut self, line: &mut [u8]) -> Result<bool> {
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };
        let mut filled = 0;
        while filled < line.len() {
            match active.stdout.read(&mut line[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        if filled == 0 {
            if let Some(done) = self.active.take() {
                Self::finish(done.child)?;
            }
            return Ok(false);
        }
        if filled < line.len() {
            return Err(ScanwerkError::Scanner(format!(
                "truncated scanline ({filled} of {} bytes)",
                line.len()
            )));
        }
        Ok(true)
    }

    fn resolution(&self) -> u32 {
        self.resolution
    }
}

impl Drop for ScanimageSource {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(err) = active.child.kill() {
                debug!(%err, "scanimage already exited");
            }
            let _ = active.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_device_list() {
        let out = "device `epjitsu:libusb:001:004' is a FUJITSU ScanSnap S1500 sheetfed scanner\n\
                   device `v4l:/dev/video0' is a Noname Integrated Camera virtual device\n";
        let devices = parse_device_list(out);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "epjitsu:libusb:001:004");
        assert_eq!(pick_device(&devices).map(|d| d.name.as_str()), Some("epjitsu:libusb:001:004"));
        assert!(pick_device(&devices[1..]).is_none());
    }

    #[test]
    fn parses_help_options_and_ranges() {
        let help = "Options specific to device `fujitsu:fi-6130dj':\n  Standard:\n    \
                    --source ADF Front|ADF Back|ADF Duplex [ADF Front]\n    \
                    --mode Lineart|Gray|Color [Lineart]\n    \
                    --resolution 50..600dpi (in steps of 1) [600]\n    \
                    --page-height 0..355.6mm (in steps of 0.0211639) [279.364]\n    \
                    --ald[=(yes|no)] [no]\n";
        let options = DeviceOptions::parse_help(help);
        assert!(options.supports("source"));
        assert!(options.supports("ald"));
        assert!(!options.supports("page-width"));

        let fitted = options.fit(&ScannerOption::new("page-height", OptionValue::Fixed(10000.0)));
        assert_eq!(fitted.value, OptionValue::Fixed(355.6));
        let dpi = options.fit(&ScannerOption::new("resolution", OptionValue::Int(300)));
        assert_eq!(dpi.value, OptionValue::Int(300));
    }

    #[test]
    fn formats_flags() {
        assert_eq!(
            option_flag(&ScannerOption::new("ald", OptionValue::Bool(false))),
            "--ald=no"
        );
        assert_eq!(
            option_flag(&ScannerOption::new("source", OptionValue::Str("ADF Duplex".into()))),
            "--source=ADF Duplex"
        );
    }

    #[test]
    fn parses_pnm_headers() {
        let mut p6 = Cursor::new(b"P6\n# SANE data follows\n850 1100\n255\n".to_vec());
        let params = parse_pnm_header(&mut p6).expect("header").expect("params");
        assert_eq!(params.frame, Frame::Rgb);
        assert_eq!((params.pixels_per_line, params.lines, params.depth), (850, 1100, 8));

        let mut p4 = Cursor::new(b"P4\n16 2\n\xff\xff".to_vec());
        let params = parse_pnm_header(&mut p4).expect("header").expect("params");
        assert_eq!((params.frame, params.depth), (Frame::Gray, 1));

        let mut p5 = Cursor::new(b"P5 4 4 65535\n".to_vec());
        assert_eq!(parse_pnm_header(&mut p5).expect("header").expect("params").depth, 16);
    }

    #[test]
    fn empty_stream_has_no_header() {
        let mut empty = Cursor::new(Vec::new());
        assert!(parse_pnm_header(&mut empty).expect("no error").is_none());
    }

    #[test]
    fn rejects_ascii_pnm() {
        let mut p3 = Cursor::new(b"P3\n1 1\n255\n".to_vec());
        assert!(parse_pnm_header(&mut p3).is_err());
    }
}
