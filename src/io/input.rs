use crate::defaults::CONFIG_FILE_NAME;
use crate::io::Configuration;
use crate::model::{DenseModel, ModelInput};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// The configuration file is read from the working directory. If it does not exist
/// the default settings are used and written to the directory, so that the user can
/// see all the used options.
pub fn read_config() -> Result<Configuration> {
    read_config_from(Path::new(CONFIG_FILE_NAME))
}

pub fn read_config_from(config_file_path: &Path) -> Result<Configuration> {
    let config_string: String = if config_file_path.exists() {
        fs::read_to_string(config_file_path)
            .with_context(|| format!("Unable to read config file {:?}", config_file_path))?
    } else {
        String::new()
    };
    let config: Configuration = toml::from_str(&config_string)
        .with_context(|| format!("Invalid config file {:?}", config_file_path))?;
    config.check()?;

    if !config_file_path.exists() {
        let config_string: String =
            toml::to_string(&config).context("Unable to serialize the configuration")?;
        fs::write(config_file_path, config_string)
            .with_context(|| format!("Unable to write config file {:?}", config_file_path))?;
    }
    Ok(config)
}

/// A dense model is read from a TOML or JSON file, chosen by the file extension.
pub fn read_model(model_file: &Path) -> Result<DenseModel> {
    let content: String = fs::read_to_string(model_file)
        .with_context(|| format!("Unable to read model file {:?}", model_file))?;
    let input: ModelInput = match model_file.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML model file {:?}", model_file))?,
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON model file {:?}", model_file))?,
        _ => bail!(
            "Unknown format of model file {:?}, expected .toml or .json",
            model_file
        ),
    };
    let model: DenseModel = DenseModel::try_from(input)
        .with_context(|| format!("Inconsistent model in {:?}", model_file))?;
    Ok(model)
}
