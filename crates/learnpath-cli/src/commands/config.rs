use std::collections::BTreeMap;

use clap::Subcommand;
use learnpath_core::Config;
use serde::Serialize;
use serde_json::Value;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting
    Get {
        /// Dotted setting name (e.g. "engagement.tick_ms", "quiz.fast_track_sample_size")
        key: String,
    },
    /// Change one setting and save it
    Set {
        /// Dotted setting name
        key: String,
        value: String,
    },
    /// Every setting as a flat `section.field` map
    List,
    /// Restore defaults for one section, or for everything
    Reset {
        /// engagement | quiz | storage
        #[arg(long)]
        section: Option<String>,
    },
    /// Location of config.toml
    Path,
}

#[derive(Serialize)]
struct SettingChange<'a> {
    key: &'a str,
    previous: Option<String>,
    value: Option<String>,
}

/// `{"engagement": {"tick_ms": 1000}}` becomes `{"engagement.tick_ms": 1000}`.
fn flatten(prefix: &str, value: Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (field, inner) in map {
                let key = if prefix.is_empty() {
                    field
                } else {
                    format!("{prefix}.{field}")
                };
                flatten(&key, inner, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf);
        }
    }
}

fn reset_section(config: &mut Config, section: &str) -> Result<(), String> {
    let defaults = Config::default();
    match section {
        "engagement" => config.engagement = defaults.engagement,
        "quiz" => config.quiz = defaults.quiz,
        "storage" => config.storage = defaults.storage,
        other => return Err(format!("unknown config section: {other}")),
    }
    Ok(())
}

pub fn run(action: ConfigAction) -> CmdResult {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            let previous = config.get(&key);
            config.set(&key, &value)?;
            tracing::info!(%key, %value, "config updated");
            print_json(&SettingChange {
                key: &key,
                previous,
                value: config.get(&key),
            })?;
        }
        ConfigAction::List => {
            let mut flat = BTreeMap::new();
            flatten("", serde_json::to_value(Config::load()?)?, &mut flat);
            print_json(&flat)?;
        }
        ConfigAction::Reset { section } => {
            let label = section.clone().unwrap_or_else(|| "all".into());
            let config = match section {
                Some(section) => {
                    let mut config = Config::load()?;
                    reset_section(&mut config, &section)?;
                    config
                }
                None => Config::default(),
            };
            config.save()?;
            tracing::info!(section = %label, "config reset");
            print_json(&config)?;
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_sections_to_dotted_keys() {
        let mut flat = BTreeMap::new();
        flatten("", serde_json::to_value(Config::default()).unwrap(), &mut flat);
        assert_eq!(flat["engagement.tick_ms"], 1000);
        assert_eq!(flat["quiz.fast_track_sample_size"], 5);
        assert!(flat.contains_key("storage.database_file"));
    }

    #[test]
    fn resets_one_section_only() {
        let mut config = Config::default();
        config.engagement.tick_ms = 50;
        config.quiz.standard_sample_size = 20;
        reset_section(&mut config, "quiz").unwrap();
        assert_eq!(config.engagement.tick_ms, 50);
        assert_eq!(config.quiz.standard_sample_size, 10);
        assert!(reset_section(&mut config, "theme").is_err());
    }
}
