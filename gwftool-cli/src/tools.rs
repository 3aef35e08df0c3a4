//! Tool descriptor loading (spec section 6, "Tool descriptor dependency").
//!
//! Real Galaxy tool XML parsing is out of scope for the engine; this module
//! is the CLI's concrete external collaborator, using a deliberately simpler
//! convention: each tool lives in its own directory under a `--tooldir` root
//! and carries a `tool.json` manifest describing the fields the engine's
//! `Tool` trait actually needs. Mirrors the original `ToolBox.scan_dir`
//! directory walk, substituting JSON manifests for Galaxy XML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gwftool_core::{InMemoryToolBox, SimpleTool, ToolOutputSpec};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct OutputManifest {
    #[serde(default)]
    from_work_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolManifest {
    tool_id: String,
    docker_image: String,
    command_template: String,
    #[serde(default)]
    outputs: BTreeMap<String, OutputManifest>,
}

/// Scans every immediate subdirectory of `tooldir` for a `tool.json`
/// manifest and registers the resulting tool under its `tool_id`. Directories
/// without a manifest are silently skipped, matching the original scanner's
/// tolerance for stray, non-tool directories.
pub fn scan_dir(tooldir: &Path, toolbox: &mut InMemoryToolBox) -> anyhow::Result<()> {
    let entries = match std::fs::read_dir(tooldir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let manifest_path = entry.path().join("tool.json");
        if !manifest_path.exists() {
            continue;
        }
        let tool = load_manifest(&entry.path(), &manifest_path)?;
        toolbox.insert(Box::new(tool));
    }
    Ok(())
}

fn load_manifest(tool_dir: &Path, manifest_path: &Path) -> anyhow::Result<SimpleTool> {
    let content = std::fs::read_to_string(manifest_path)?;
    let manifest: ToolManifest = serde_json::from_str(&content)?;

    let outputs = manifest
        .outputs
        .into_iter()
        .map(|(name, spec)| {
            (
                name.clone(),
                ToolOutputSpec {
                    name,
                    from_work_dir: spec.from_work_dir,
                },
            )
        })
        .collect();

    Ok(SimpleTool {
        tool_id: manifest.tool_id,
        tool_dir: tool_dir.to_path_buf(),
        docker_image: manifest.docker_image,
        outputs,
        command_template: manifest.command_template,
    })
}

/// Builds a toolbox from every `--tooldir` root, in the order given.
pub fn build_toolbox(tooldirs: &[PathBuf]) -> anyhow::Result<InMemoryToolBox> {
    let mut toolbox = InMemoryToolBox::new();
    for dir in tooldirs {
        scan_dir(dir, &mut toolbox)?;
    }
    Ok(toolbox)
}
