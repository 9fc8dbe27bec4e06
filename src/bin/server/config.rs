use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cfmwrap::Predictor;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    /// The address to listen on.
    pub(crate) host: String,

    pub(crate) port: u16,

    /// The `cfm-predict` executable.
    pub(crate) program: String,

    /// The trained model parameter file passed to `cfm-predict`.
    pub(crate) param_file: PathBuf,

    /// The model configuration file passed to `cfm-predict`.
    pub(crate) config_file: PathBuf,

    pub(crate) annotate: bool,

    pub(crate) apply_postproc: bool,

    pub(crate) suppress_exceptions: bool,

    /// The probability threshold used when a request doesn't give one.
    pub(crate) prob_thresh: f64,

    /// Seconds to wait for `cfm-predict` before killing it. Zero disables the
    /// timeout.
    pub(crate) timeout_secs: u64,

    /// The largest batch upload accepted, in bytes.
    pub(crate) max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        let p = Predictor::default();
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5001,
            program: p.program,
            param_file: p.param_file,
            config_file: p.config_file,
            annotate: p.annotate,
            apply_postproc: p.apply_postproc,
            suppress_exceptions: p.suppress_exceptions,
            prob_thresh: 0.001,
            timeout_secs: 600,
            max_upload_bytes: 10 << 20,
        }
    }
}

impl Config {
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let s = read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&s)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))
    }

    pub(crate) fn predictor(&self) -> Predictor {
        Predictor {
            program: self.program.clone(),
            param_file: self.param_file.clone(),
            config_file: self.config_file.clone(),
            annotate: self.annotate,
            apply_postproc: self.apply_postproc,
            suppress_exceptions: self.suppress_exceptions,
            timeout: (self.timeout_secs > 0)
                .then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial() {
        let c: Config = toml::from_str(
            r#"
port = 8080
program = "/opt/cfm/bin/cfm-predict"
timeout_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.max_upload_bytes, 10 * 1024 * 1024);

        let p = c.predictor();
        assert_eq!(p.program, "/opt/cfm/bin/cfm-predict");
        assert!(p.timeout.is_none());
        assert!(p.annotate);
        assert!(p.param_file.ends_with("param_output.log"));
    }

    #[test]
    fn default_timeout() {
        let p = Config::default().predictor();
        assert_eq!(p.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn example_file() {
        let c: Config =
            toml::from_str(include_str!("../../../server.example.toml"))
                .unwrap();
        let d = Config::default();
        assert_eq!(c.port, d.port);
        assert_eq!(c.param_file, d.param_file);
        assert_eq!(c.max_upload_bytes, d.max_upload_bytes);
        assert_eq!(c.timeout_secs, d.timeout_secs);
    }

    #[test]
    fn unknown_key() {
        assert!(toml::from_str::<Config>("prot = 1").is_err());
    }
}
