use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FsgConfig {
    /// Build configuration
    pub build: BuildConfig,
    /// Site layout configuration (from fsg-core)
    #[serde(flatten)]
    pub site: fsg_core::config::SiteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Source directory containing the site tree
    pub source: String,
    /// Output directory for the generated site
    pub output: String,
    /// Configuration file path
    pub config: String,
    /// Include draft posts in the output
    pub drafts: bool,
    /// Host for dev server
    pub host: String,
    /// Port for dev server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "./site".to_string(),
            output: "./out".to_string(),
            config: "./fsg.toml".to_string(),
            drafts: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
            open: false,
        }
    }
}

impl Default for FsgConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            site: fsg_core::config::SiteConfig::default(),
        }
    }
}

impl FsgConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (FSG_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args.get_one::<String>("config")
            .unwrap_or(&"./fsg.toml".to_string())
            .clone();

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::with_name(&config_file.replace(".toml", "")));
        }

        // 3. Add environment variables with FSG_ prefix
        builder = builder.add_source(
            Environment::with_prefix("FSG")
                .prefix_separator("_")
                .separator("__") // Use double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        let mut cli_overrides = std::collections::HashMap::new();

        if let Some(source) = args.get_one::<String>("source") {
            cli_overrides.insert("build.source".to_string(), source.clone());
        }
        if let Some(output) = args.get_one::<String>("output") {
            cli_overrides.insert("build.output".to_string(), output.clone());
        }
        if let Some(config) = args.get_one::<String>("config") {
            cli_overrides.insert("build.config".to_string(), config.clone());
        }
        if args.try_get_one::<bool>("drafts").unwrap_or(None).unwrap_or(&false) == &true {
            cli_overrides.insert("build.drafts".to_string(), "true".to_string());
        }
        // Only override with CLI args that are actually defined for this command
        if let Some(host) = args.try_get_one::<String>("host").unwrap_or(None) {
            cli_overrides.insert("build.host".to_string(), host.clone());
        }
        if let Some(port) = args.try_get_one::<String>("port").unwrap_or(None) {
            if let Ok(port_num) = port.parse::<u16>() {
                cli_overrides.insert("build.port".to_string(), port_num.to_string());
            }
        }
        if args.try_get_one::<bool>("open").unwrap_or(None).unwrap_or(&false) == &true {
            cli_overrides.insert("build.open".to_string(), "true".to_string());
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(config::Config::try_from(&cli_overrides)?);
        }

        // Build and deserialize
        let config = builder.build()?;
        let fsg_config: FsgConfig = config.try_deserialize()?;

        Ok(fsg_config)
    }

    /// Get just the site layout configuration for passing to fsg-core
    pub fn site_config(&self) -> &fsg_core::config::SiteConfig {
        &self.site
    }

    /// Get the build configuration
    pub fn build_config(&self) -> &BuildConfig {
        &self.build
    }
}
