use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use super::PdfSigningEngine;
use super::protocol::{EngineReply, EngineRequest, read_frame, read_message, write_frame, write_message};
use crate::params::SignatureSpec;

/// Delegates signing to an external program, one child process per document.
///
/// The child reads a `Sign` request and the source document from stdin and
/// answers on stdout with a reply, followed by the signed document when the
/// reply is `Signed`. Diagnostics on its stderr are passed through.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Kills and reaps the child unless it was waited on.
struct ChildGuard(Option<Child>);

impl ChildGuard {
    fn child(&mut self) -> Result<&mut Child> {
        self.0.as_mut().context("signing engine already reaped")
    }

    fn finish(mut self) -> Result<()> {
        let mut child = self.0.take().context("signing engine already reaped")?;
        let status = child.wait().context("waiting for signing engine")?;
        if !status.success() {
            bail!("signing engine exited with {status}");
        }
        Ok(())
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.0.take() {
            if let Err(e) = child.kill() {
                debug!(error = %e, "Signing engine already exited");
            }
            if let Err(e) = child.wait() {
                warn!(error = %e, "Failed to reap signing engine");
            }
        }
    }
}

impl PdfSigningEngine for ProcessEngine {
    fn sign(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        spec: &SignatureSpec<'_>,
    ) -> Result<()> {
        let mut document = Vec::new();
        input
            .read_to_end(&mut document)
            .context("reading source document")?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("starting signing engine {}", self.program.display()))?;
        let mut guard = ChildGuard(Some(child));

        let sent = {
            let mut stdin = guard
                .child()?
                .stdin
                .take()
                .context("signing engine stdin unavailable")?;
            write_message(&mut stdin, &EngineRequest::sign(spec))
                .context("sending sign request")
                .and_then(|_| {
                    write_frame(&mut stdin, &document).context("sending source document")
                })
        };

        let mut stdout = guard
            .child()?
            .stdout
            .take()
            .context("signing engine stdout unavailable")?;

        // An engine may reject the job and exit before reading all of it.
        if let Err(e) = sent {
            if let Ok(EngineReply::Failed { message }) =
                read_message::<_, EngineReply>(&mut stdout)
            {
                bail!("signing engine rejected document: {message}");
            }
            return Err(e);
        }

        let reply: EngineReply = read_message(&mut stdout).context("reading engine reply")?;
        match reply {
            EngineReply::Signed => {
                let signed = read_frame(&mut stdout).context("reading signed document")?;
                output
                    .write_all(&signed)
                    .context("writing signed document")?;
                output.flush().context("flushing signed document")?;
            }
            EngineReply::Failed { message } => bail!("signing engine rejected document: {message}"),
        }
        drop(stdout);

        guard.finish()
    }

    fn name(&self) -> &str {
        "process"
    }
}
