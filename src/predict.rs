//! invocation of the external `cfm-predict` program

use std::{
    path::PathBuf,
    process::{Output, Stdio},
    time::Duration,
};

use log::{debug, warn};
use tempfile::{Builder, NamedTempFile};
use tokio::process::Command;

use crate::{
    input::{to_input, Molecule},
    Error, Result,
};

/// The fixed parts of a `cfm-predict` command line. Everything but the input
/// file, output file, and probability threshold is the same for every
/// request.
#[derive(Clone, Debug)]
pub struct Predictor {
    /// The program to run, looked up in `PATH` if it isn't a path.
    pub program: String,

    /// The trained model parameters, `param_output.log` in the CFM-ID
    /// distribution.
    pub param_file: PathBuf,

    /// The model configuration, `param_config.txt` in the CFM-ID
    /// distribution.
    pub config_file: PathBuf,

    /// Whether to ask for fragment annotations.
    pub annotate: bool,

    /// Whether to post-process the predicted spectra.
    pub apply_postproc: bool,

    /// Whether to keep going past molecules that raise exceptions.
    pub suppress_exceptions: bool,

    /// How long to wait for the program before killing it. `None` waits
    /// forever.
    pub timeout: Option<Duration>,
}

impl Default for Predictor {
    fn default() -> Self {
        let model = PathBuf::from("/trained_models_cfmid4.0/cfmid4/[M+H]+");
        Self {
            program: "cfm-predict".to_owned(),
            param_file: model.join("param_output.log"),
            config_file: model.join("param_config.txt"),
            annotate: true,
            apply_postproc: true,
            suppress_exceptions: false,
            timeout: None,
        }
    }
}

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

fn temp_file(prefix: &str) -> Result<NamedTempFile> {
    Ok(Builder::new().prefix(prefix).suffix(".txt").tempfile()?)
}

impl Predictor {
    /// the full command line for reading molecules from `input` and writing
    /// predictions to `output`
    fn command(
        &self,
        input: &NamedTempFile,
        output: &NamedTempFile,
        prob_thresh: f64,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(input.path())
            .arg(prob_thresh.to_string())
            .arg(&self.param_file)
            .arg(&self.config_file)
            .arg(flag(self.annotate))
            .arg(output.path())
            .arg(flag(self.apply_postproc))
            .arg(flag(self.suppress_exceptions))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn wait(&self, mut cmd: Command) -> Result<Output> {
        let child = cmd.spawn().map_err(|source| Error::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let output = child.wait_with_output();
        let Some(after) = self.timeout else {
            return Ok(output.await?);
        };
        // dropping the unfinished future drops the child, which kills it
        match tokio::time::timeout(after, output).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(Error::Timeout {
                program: self.program.clone(),
                after,
            }),
        }
    }

    /// run the predictor on `mols` with probability threshold `prob_thresh`
    /// and return the raw text it writes to its output file. the temporary
    /// input and output files are removed before returning
    pub async fn predict(
        &self,
        mols: &[Molecule],
        prob_thresh: f64,
    ) -> Result<String> {
        let input = temp_file("cfm-in-")?;
        tokio::fs::write(input.path(), to_input(mols)).await?;
        let output = temp_file("cfm-out-")?;

        debug!(
            "running {} on {} molecules from {}",
            self.program,
            mols.len(),
            input.path().display()
        );
        let out = self
            .wait(self.command(&input, &output, prob_thresh))
            .await
            .inspect_err(|e| warn!("{e}"))?;

        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_owned();
        if !out.status.success() {
            warn!("{} exited with {}", self.program, out.status);
            return Err(Error::Exit {
                program: self.program.clone(),
                status: out.status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            debug!("{} stderr: {stderr}", self.program);
        }

        // a stray invalid byte only spoils its own line, which the parser then
        // skips, rather than the whole batch
        let bytes = tokio::fs::read(output.path()).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
