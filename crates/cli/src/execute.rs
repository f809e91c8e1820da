use crate::commands::Commands;
use avp_config::ConfigLoader;
use avp_core::Result;

impl Commands {
    pub async fn execute(self) -> Result<()> {
        match self {
            Commands::Generate {
                path,
                config_path,
                secret_dir,
                verbose_sensitive_output,
            } => {
                let mut loader = ConfigLoader::new().verbose(verbose_sensitive_output);
                if let Some(config_path) = config_path {
                    loader = loader.config_path(config_path);
                }
                if let Some(secret_dir) = secret_dir {
                    loader = loader.secret_dir(secret_dir);
                }
                let config = loader.load()?;

                crate::commands::generate::execute(&path, &config).await
            }
        }
    }
}
