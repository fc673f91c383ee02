//! Builders for the project-flow commands of `gw_sh`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::quote::{bare_word, quote, word};
use crate::ports::CoreError;

/// Run synthesis on the open project.
pub const RUN_SYNTHESIS: &str = "run syn";

/// Run place and route on the open project.
pub const RUN_PLACE_AND_ROUTE: &str = "run pnr";

/// Run the complete flow on the open project.
pub const RUN_ALL: &str = "run all";

/// Device version used when the caller does not name one.
pub const DEFAULT_DEVICE_VERSION: &str = "C";

/// Kinds of files `add_file -type` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Verilog,
    Vhdl,
    /// Physical constraints.
    Cst,
    /// Timing constraints.
    Sdc,
    /// Gowin analyzer oscilloscope configuration.
    Gao,
}

impl FileType {
    /// Tcl spelling of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verilog => "verilog",
            Self::Vhdl => "vhdl",
            Self::Cst => "cst",
            Self::Sdc => "sdc",
            Self::Gao => "gao",
        }
    }

    /// Infer the type from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "v" | "sv" | "vh" | "svh" => Some(Self::Verilog),
            "vhd" | "vhdl" => Some(Self::Vhdl),
            "cst" => Some(Self::Cst),
            "sdc" => Some(Self::Sdc),
            "gao" => Some(Self::Gao),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verilog" => Ok(Self::Verilog),
            "vhdl" => Ok(Self::Vhdl),
            "cst" => Ok(Self::Cst),
            "sdc" => Ok(Self::Sdc),
            "gao" => Ok(Self::Gao),
            other => Err(CoreError::Validation(format!(
                "unknown file type '{other}' (expected verilog, vhdl, cst, sdc or gao)"
            ))),
        }
    }
}

/// `create_project -name <name> -dir "<dir>" -pn <part> -device_version <v> [-force]`
pub fn create_project(
    name: &str,
    dir: &Path,
    part_number: &str,
    device_version: &str,
    force: bool,
) -> Result<String, CoreError> {
    let dir = dir.to_string_lossy();
    if dir.is_empty() {
        return Err(CoreError::Validation("directory cannot be empty".into()));
    }
    let mut cmd = format!(
        "create_project -name {} -dir {} -pn {} -device_version {}",
        bare_word("project name", name)?,
        quote(&dir),
        bare_word("part number", part_number)?,
        bare_word("device version", device_version)?,
    );
    if force {
        cmd.push_str(" -force");
    }
    Ok(cmd)
}

/// `add_file -type <type> "<path>"`, inferring the type when not given.
pub fn add_file(path: &Path, file_type: Option<FileType>) -> Result<String, CoreError> {
    let file_type = match file_type {
        Some(t) => t,
        None => FileType::from_path(path).ok_or_else(|| {
            CoreError::Validation(format!(
                "cannot infer file type from {}; pass one explicitly",
                path.display()
            ))
        })?,
    };
    let path = path.to_string_lossy();
    if path.is_empty() {
        return Err(CoreError::Validation("file path cannot be empty".into()));
    }
    Ok(format!("add_file -type {file_type} {}", quote(&path)))
}

/// `set_option -top_module <name>`
pub fn set_top_module(name: &str) -> Result<String, CoreError> {
    Ok(format!(
        "set_option -top_module {}",
        bare_word("module name", name)?
    ))
}

/// `set_option -output_base_name <name>`
pub fn set_output_base_name(name: &str) -> Result<String, CoreError> {
    Ok(format!(
        "set_option -output_base_name {}",
        bare_word("output base name", name)?
    ))
}

/// `set_option -<key> <value>`; a leading dash on `key` is tolerated.
pub fn set_option(key: &str, value: &str) -> Result<String, CoreError> {
    let key = bare_word("option name", key.trim_start_matches('-'))?;
    Ok(format!("set_option -{key} {}", word(value)))
}
