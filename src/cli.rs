use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// JSON configuration file.
    #[clap(long, env = "SUNFORECAST_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP port, overrides `server.port` from the configuration.
    #[clap(long, env = "SUNFORECAST_PORT")]
    pub port: Option<u16>,

    /// Use the built-in clear-sky weather instead of Open-Meteo.
    #[clap(long)]
    pub offline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["sunforecast"]).unwrap();
        assert_eq!(args.config, PathBuf::from("config.json"));
        assert!(!args.offline);
    }

    #[test]
    fn test_overrides() {
        let args =
            Args::try_parse_from(["sunforecast", "--config", "/etc/pv.json", "--port", "9000", "--offline"])
                .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/pv.json"));
        assert_eq!(args.port, Some(9000));
        assert!(args.offline);
    }
}
