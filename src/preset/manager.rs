use super::Preset;
use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A preset on disk: the flat preset object plus its name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPreset {
    pub name: String,
    #[serde(flatten)]
    pub preset: Preset,
}

impl StoredPreset {
    pub fn new(name: impl Into<String>, preset: Preset) -> Self {
        Self {
            name: name.into(),
            preset,
        }
    }
}

/// Directory of named presets, one pretty-printed JSON file each.
pub struct Manager {
    presets_dir: PathBuf,
    presets: Vec<StoredPreset>,
}

impl Manager {
    pub fn new(preset_dir: impl AsRef<Path>) -> Result<Self> {
        let presets_dir = preset_dir.as_ref().to_path_buf();
        fs::create_dir_all(&presets_dir).context("Failed to create presets directory")?;

        let mut manager = Self {
            presets_dir,
            presets: Vec::new(),
        };

        manager.load_presets()?;

        Ok(manager)
    }

    pub fn load_presets(&mut self) -> Result<()> {
        self.presets.clear();

        if !self.presets_dir.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(&self.presets_dir)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match load_preset_file(&path) {
                    Ok(preset) => self.presets.push(preset),
                    Err(e) => {
                        error!("Failed to load preset {}: {e:#}", path.display());
                    }
                }
            }
        }

        self.presets.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            "Loaded {} presets from {}",
            self.presets.len(),
            self.presets_dir.display()
        );

        Ok(())
    }

    pub fn save_preset(&mut self, preset: &StoredPreset) -> Result<PathBuf> {
        let path = self.path_for(&preset.name);

        let json = serde_json::to_string_pretty(preset).context("Failed to serialize preset")?;
        fs::write(&path, json).context("Failed to write preset file")?;

        self.load_presets()?;

        Ok(path)
    }

    pub fn delete_preset(&mut self, preset_name: &str) -> Result<()> {
        let path = self.path_for(preset_name);

        if path.exists() {
            fs::remove_file(&path).context("Failed to delete preset file")?;
            self.load_presets()?;
            Ok(())
        } else {
            Err(anyhow::anyhow!("Preset file not found: {preset_name}"))
        }
    }

    pub fn preset_exists(&self, name: &str) -> bool {
        self.presets.iter().any(|p| p.name == name)
    }

    pub fn get_presets(&self) -> &[StoredPreset] {
        &self.presets
    }

    pub fn get_preset_by_name(&self, name: &str) -> Option<&StoredPreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.presets_dir
            .join(format!("{}.json", sanitize_filename(name)))
    }
}

fn load_preset_file(path: &Path) -> Result<StoredPreset> {
    let content = fs::read_to_string(path).context("Failed to read preset file")?;
    serde_json::from_str(&content).context("Failed to parse preset JSON")
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
